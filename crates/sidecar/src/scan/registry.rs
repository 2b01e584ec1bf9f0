//! Shipper registry decoding — read offsets per source file.
//!
//! The registry file is a stream of concatenated JSON values, not a
//! single document: the shipper appends op-records and snapshots as it
//! checkpoints. Offset records look like
//! `{"k": "<path>", "v": {"source": "...", "offset": N, ...}}`;
//! anything else in the stream is skipped. The last record for a
//! source wins.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use super::ScanError;

#[derive(Debug, Deserialize)]
struct RegistryEntry {
    #[allow(dead_code)]
    k: String,
    v: RegistryValue,
}

#[derive(Debug, Deserialize)]
struct RegistryValue {
    source: String,
    offset: u64,
}

/// Read the registry stream into `source path -> read offset`.
pub fn load_registry(path: &Path) -> Result<HashMap<String, u64>, ScanError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut offsets = HashMap::new();
    for value in serde_json::Deserializer::from_reader(reader).into_iter::<Value>() {
        let value = match value {
            Ok(value) => value,
            // a torn tail write ends the usable stream
            Err(_) => break,
        };
        if let Ok(entry) = serde_json::from_value::<RegistryEntry>(value) {
            offsets.insert(entry.v.source, entry.v.offset);
        }
    }
    Ok(offsets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn registry(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_reads_concatenated_records() {
        let (_dir, path) = registry(concat!(
            r#"{"k":"filebeat::logs::/var/log/a.log","v":{"source":"/var/log/a.log","offset":100}}"#,
            r#"{"k":"filebeat::logs::/var/log/b.log","v":{"source":"/var/log/b.log","offset":7}}"#,
        ));
        let offsets = load_registry(&path).unwrap();
        assert_eq!(offsets.get("/var/log/a.log"), Some(&100));
        assert_eq!(offsets.get("/var/log/b.log"), Some(&7));
    }

    #[test]
    fn test_skips_op_records() {
        let (_dir, path) = registry(concat!(
            r#"{"op":"set","id":12}"#,
            r#"{"k":"filebeat::logs::/var/log/a.log","v":{"source":"/var/log/a.log","offset":100}}"#,
        ));
        let offsets = load_registry(&path).unwrap();
        assert_eq!(offsets.len(), 1);
        assert_eq!(offsets.get("/var/log/a.log"), Some(&100));
    }

    #[test]
    fn test_last_record_wins() {
        let (_dir, path) = registry(concat!(
            r#"{"k":"x","v":{"source":"/var/log/a.log","offset":100}}"#,
            r#"{"k":"x","v":{"source":"/var/log/a.log","offset":250}}"#,
        ));
        let offsets = load_registry(&path).unwrap();
        assert_eq!(offsets.get("/var/log/a.log"), Some(&250));
    }

    #[test]
    fn test_torn_tail_keeps_earlier_records() {
        let (_dir, path) = registry(concat!(
            r#"{"k":"x","v":{"source":"/var/log/a.log","offset":100}}"#,
            r#"{"k":"y","v":{"sou"#,
        ));
        let offsets = load_registry(&path).unwrap();
        assert_eq!(offsets.get("/var/log/a.log"), Some(&100));
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(load_registry(Path::new("/nonexistent/log.json")).is_err());
    }
}
