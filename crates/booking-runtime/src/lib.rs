//! Runtime layer for booking analytics.
//!
//! Owns the published snapshot, drives refreshes from a data source with
//! retry, and schedules periodic refreshes for watch mode.

pub mod data_manager;
pub mod orchestrator;
pub mod scheduler;

pub use booking_core as core;
pub use booking_data as data;
