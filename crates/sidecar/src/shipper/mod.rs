//! Shipper domain — filebeat filesystem layout and process supervision.

pub mod supervisor;

use std::path::PathBuf;

pub use supervisor::{Supervisor, SupervisorError};

const BASE_DIR: &str = "/usr/share/filebeat";

/// Shipper executable.
pub fn exec_path() -> PathBuf {
    PathBuf::from(BASE_DIR).join("filebeat")
}

/// Main shipper configuration, which includes the inputs directory.
pub fn conf_file() -> PathBuf {
    PathBuf::from(BASE_DIR).join("filebeat.yml")
}

/// Directory the artifact store writes per-container inputs into.
pub fn conf_dir() -> PathBuf {
    PathBuf::from(BASE_DIR).join("inputs.d")
}

/// Registry file holding the shipper's read offsets.
pub fn registry_file() -> PathBuf {
    PathBuf::from(BASE_DIR).join("data/registry/filebeat/log.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        assert_eq!(exec_path(), PathBuf::from("/usr/share/filebeat/filebeat"));
        assert_eq!(conf_dir(), PathBuf::from("/usr/share/filebeat/inputs.d"));
        assert_eq!(
            registry_file(),
            PathBuf::from("/usr/share/filebeat/data/registry/filebeat/log.json")
        );
    }
}
