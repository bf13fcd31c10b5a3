//! Data layer for booking analytics.
//!
//! Reads raw scheduled-event exports, normalises them into canonical
//! records, and runs the analyzers that make up an analytics snapshot.

pub mod aggregator;
pub mod analysis;
pub mod conversion;
pub mod normalizer;
pub mod notes;
pub mod questions;
pub mod reader;
pub mod temporal;

#[cfg(test)]
mod test_support;

pub use booking_core as core;
