//! Artifact store — per-container shipper config files.
//!
//! One container maps to one file, `{conf_dir}/{id}.yml`. The store
//! never mutates a file in place; callers either write the whole
//! artifact or remove it.

pub mod render;

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::collect::LogSourceSpec;

const ARTIFACT_SUFFIX: &str = ".yml";
const ARTIFACT_MODE: u32 = 0o644;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("artifact io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("artifact parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    conf_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(conf_dir: impl Into<PathBuf>) -> Self {
        Self {
            conf_dir: conf_dir.into(),
        }
    }

    pub fn conf_dir(&self) -> &Path {
        &self.conf_dir
    }

    /// Artifact path for a container id. Pure; the file may not exist.
    pub fn path(&self, id: &str) -> PathBuf {
        self.conf_dir.join(format!("{}{}", id, ARTIFACT_SUFFIX))
    }

    pub fn exists(&self, id: &str) -> bool {
        self.path(id).is_file()
    }

    /// Write the artifact for a container. A compiled spec list that is
    /// empty is a deliberate no-op, not an empty file.
    pub fn write(
        &self,
        id: &str,
        identity: &BTreeMap<String, String>,
        specs: &[LogSourceSpec],
        output: &str,
    ) -> Result<(), StoreError> {
        if specs.is_empty() {
            return Ok(());
        }
        let document = render::render(specs, identity, output)?;
        let path = self.path(id);
        fs::write(&path, document)?;
        fs::set_permissions(&path, fs::Permissions::from_mode(ARTIFACT_MODE))?;
        Ok(())
    }

    /// Remove the artifact. A missing file is surfaced as an error; the
    /// caller decides whether already-gone is fatal.
    pub fn remove(&self, id: &str) -> Result<(), StoreError> {
        fs::remove_file(self.path(id))?;
        Ok(())
    }

    /// Parse an existing artifact back into its declared path globs.
    pub fn read_paths(&self, id: &str) -> Result<Vec<String>, StoreError> {
        let document = fs::read_to_string(self.path(id))?;
        Ok(render::read_paths(&document)?)
    }

    /// Remove every regular file in the conf dir. Startup sweep: any
    /// artifact from a previous run is stale until reconciliation
    /// rewrites it.
    pub fn clean(&self) -> Result<(), StoreError> {
        for entry in fs::read_dir(&self.conf_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }

    /// Path glob → container id for every artifact whose id does not
    /// match `skip`. Unreadable artifacts are ignored; the scanner must
    /// not stall on one corrupt file.
    pub fn claimed_paths(&self, skip: impl Fn(&str) -> bool) -> HashMap<String, String> {
        let mut claimed = HashMap::new();
        let entries = match fs::read_dir(&self.conf_dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read artifact directory");
                return claimed;
            }
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(id) = name.to_str().and_then(|n| n.strip_suffix(ARTIFACT_SUFFIX)) else {
                continue;
            };
            if skip(id) {
                continue;
            }
            let Ok(paths) = self.read_paths(id) else {
                continue;
            };
            for path in paths {
                claimed.entry(path).or_insert_with(|| id.to_string());
            }
        }
        claimed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::LogSourceSpec;

    fn spec(name: &str, host_dir: &str) -> LogSourceSpec {
        LogSourceSpec {
            name: name.to_string(),
            host_dir: host_dir.to_string(),
            file_glob: format!("{}.log*", name),
            format: "nonex".to_string(),
            format_props: BTreeMap::new(),
            tags: BTreeMap::from([
                ("index".to_string(), name.to_string()),
                ("topic".to_string(), name.to_string()),
            ]),
            stdout: true,
            time_sorted: false,
            log_type: "container".to_string(),
        }
    }

    fn store() -> (tempfile::TempDir, ArtifactStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_path_is_pure() {
        let store = ArtifactStore::new("/etc/shipper/inputs.d");
        assert_eq!(
            store.path("abc123"),
            PathBuf::from("/etc/shipper/inputs.d/abc123.yml")
        );
    }

    #[test]
    fn test_write_then_read_paths() {
        let (_dir, store) = store();
        store
            .write("abc", &BTreeMap::new(), &[spec("app", "/var/log/app")], "")
            .unwrap();
        assert!(store.exists("abc"));
        assert_eq!(store.read_paths("abc").unwrap(), vec!["/var/log/app/app.log*"]);
    }

    #[test]
    fn test_empty_specs_write_nothing() {
        let (_dir, store) = store();
        store.write("abc", &BTreeMap::new(), &[], "").unwrap();
        assert!(!store.exists("abc"));
    }

    #[test]
    fn test_remove_missing_is_error() {
        let (_dir, store) = store();
        assert!(store.remove("ghost").is_err());
    }

    #[test]
    fn test_clean_sweeps_regular_files_only() {
        let (dir, store) = store();
        store
            .write("abc", &BTreeMap::new(), &[spec("app", "/var/log/app")], "")
            .unwrap();
        fs::create_dir(dir.path().join("subdir")).unwrap();
        store.clean().unwrap();
        assert!(!store.exists("abc"));
        assert!(dir.path().join("subdir").is_dir());
    }

    #[test]
    fn test_claimed_paths_skips_excluded_ids() {
        let (_dir, store) = store();
        store
            .write("one", &BTreeMap::new(), &[spec("app", "/var/log/app")], "")
            .unwrap();
        store
            .write("two", &BTreeMap::new(), &[spec("web", "/var/log/web")], "")
            .unwrap();

        let claimed = store.claimed_paths(|id| id == "two");
        assert_eq!(
            claimed.get("/var/log/app/app.log*").map(String::as_str),
            Some("one")
        );
        assert!(!claimed.contains_key("/var/log/web/web.log*"));
    }
}
