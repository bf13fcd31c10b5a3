//! Export-file discovery and loading.
//!
//! Reads scheduled-event dumps (`.json` or `.jsonl`) from a file or a
//! directory tree and concatenates them into one raw batch for the
//! normalizer.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use booking_core::error::{AnalyticsError, Result};
use serde_json::Value;
use tracing::{debug, warn};

use crate::normalizer::envelope_items;

// ── Public API ────────────────────────────────────────────────────────────────

/// Whether `path` has a `.json` or `.jsonl` extension.
pub fn is_data_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext == "json" || ext == "jsonl")
        .unwrap_or(false)
}

/// Find all data files under `data_path`, sorted by path.
///
/// A path naming a single data file yields just that file.
pub fn find_data_files(data_path: &Path) -> Vec<PathBuf> {
    if !data_path.exists() {
        warn!("Data path does not exist: {}", data_path.display());
        return Vec::new();
    }
    if data_path.is_file() {
        return if is_data_file(data_path) {
            vec![data_path.to_path_buf()]
        } else {
            Vec::new()
        };
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(data_path)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_data_file(entry.path()))
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Load every data file under `data_path` into one raw batch.
///
/// The result is always a [`Value::Array`] of raw event objects in file
/// order. A missing path, an empty directory, an unreadable file or a
/// malformed `.json` file fail the whole batch; malformed `.jsonl` lines are
/// skipped.
pub fn load_raw_batch(data_path: &Path) -> Result<Value> {
    if !data_path.exists() {
        return Err(AnalyticsError::DataPathNotFound(data_path.to_path_buf()));
    }

    let files = find_data_files(data_path);
    if files.is_empty() {
        return Err(AnalyticsError::NoDataFiles(data_path.to_path_buf()));
    }

    let mut items: Vec<Value> = Vec::new();
    for file in &files {
        let before = items.len();
        if file.extension().is_some_and(|ext| ext == "jsonl") {
            read_jsonl_file(file, &mut items)?;
        } else {
            read_json_file(file, &mut items)?;
        }
        debug!("File {}: {} raw records", file.display(), items.len() - before);
    }

    debug!(
        "Loaded {} raw records from {} files",
        items.len(),
        files.len()
    );
    Ok(Value::Array(items))
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn read_json_file(path: &Path, out: &mut Vec<Value>) -> Result<()> {
    let content = std::fs::read_to_string(path).map_err(|source| AnalyticsError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&content)?;

    match envelope_items(&value) {
        Some(records) => out.extend(records.iter().cloned()),
        None => out.push(value),
    }
    Ok(())
}

fn read_jsonl_file(path: &Path, out: &mut Vec<Value>) -> Result<()> {
    let file = std::fs::File::open(path).map_err(|source| AnalyticsError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let reader = std::io::BufReader::new(file);
    for (line_no, line_result) in reader.lines().enumerate() {
        let line = line_result.map_err(|source| AnalyticsError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => out.push(value),
            Err(e) => debug!(
                "Skipping malformed line {} in {}: {}",
                line_no + 1,
                path.display(),
                e
            ),
        }
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::TempDir;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn write_lines(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        path
    }

    fn event_line(id: &str) -> String {
        json!({
            "id": id,
            "status": "active",
            "created_at": "2024-01-15T10:00:00Z",
            "start_time": "2024-01-16T10:00:00Z",
        })
        .to_string()
    }

    fn batch_len(value: &Value) -> usize {
        value.as_array().map(Vec::len).unwrap_or(0)
    }

    // ── find_data_files ───────────────────────────────────────────────────────

    #[test]
    fn test_find_data_files_recursive_and_sorted() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("2024");
        std::fs::create_dir_all(&sub).unwrap();
        write_lines(dir.path(), "c.jsonl", &["x"]);
        write_lines(dir.path(), "a.json", &["[]"]);
        write_lines(&sub, "b.jsonl", &["x"]);
        write_lines(dir.path(), "notes.txt", &["ignored"]);

        let files = find_data_files(dir.path());
        let names: Vec<&str> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["b.jsonl", "a.json", "c.jsonl"]);
    }

    #[test]
    fn test_find_data_files_single_file() {
        let dir = TempDir::new().unwrap();
        let path = write_lines(dir.path(), "events.json", &["[]"]);
        assert_eq!(find_data_files(&path), vec![path]);

        let other = write_lines(dir.path(), "events.csv", &["id"]);
        assert!(find_data_files(&other).is_empty());
    }

    #[test]
    fn test_find_data_files_nonexistent_path() {
        let files = find_data_files(Path::new("/tmp/does-not-exist-booking-test-xyz"));
        assert!(files.is_empty());
    }

    // ── load_raw_batch ────────────────────────────────────────────────────────

    #[test]
    fn test_load_raw_batch_jsonl_skips_malformed_lines() {
        let dir = TempDir::new().unwrap();
        let good = event_line("evt-1");
        write_lines(dir.path(), "events.jsonl", &["{not valid json{{", &good, ""]);

        let batch = load_raw_batch(dir.path()).unwrap();
        assert_eq!(batch_len(&batch), 1);
        assert_eq!(batch[0]["id"], "evt-1");
    }

    #[test]
    fn test_load_raw_batch_json_array_and_envelope() {
        let dir = TempDir::new().unwrap();
        let array = json!([{"id": "a"}, {"id": "b"}]).to_string();
        let envelope = json!({"collection": [{"id": "c"}], "pagination": {}}).to_string();
        write_lines(dir.path(), "1-array.json", &[&array]);
        write_lines(dir.path(), "2-envelope.json", &[&envelope]);

        let batch = load_raw_batch(dir.path()).unwrap();
        let ids: Vec<&str> = batch
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_load_raw_batch_single_object_file() {
        let dir = TempDir::new().unwrap();
        let path = write_lines(dir.path(), "one.json", &[&event_line("solo")]);

        let batch = load_raw_batch(&path).unwrap();
        assert_eq!(batch_len(&batch), 1);
    }

    #[test]
    fn test_load_raw_batch_missing_path() {
        let err = load_raw_batch(Path::new("/tmp/does-not-exist-booking-test-xyz")).unwrap_err();
        assert!(matches!(err, AnalyticsError::DataPathNotFound(_)));
    }

    #[test]
    fn test_load_raw_batch_empty_directory() {
        let dir = TempDir::new().unwrap();
        let err = load_raw_batch(dir.path()).unwrap_err();
        assert!(matches!(err, AnalyticsError::NoDataFiles(_)));
    }

    #[test]
    fn test_load_raw_batch_malformed_json_file_fails() {
        let dir = TempDir::new().unwrap();
        write_lines(dir.path(), "broken.json", &["[{\"id\": "]);

        let err = load_raw_batch(dir.path()).unwrap_err();
        assert!(matches!(err, AnalyticsError::JsonParse(_)));
    }
}
