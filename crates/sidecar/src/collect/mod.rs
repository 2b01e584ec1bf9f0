//! Collection grammar — compiles namespaced container labels into
//! log-source specs.
//!
//! A container declares log sources through dot-separated label keys
//! under a configurable prefix (`watchlog.<name>...`). The keys build a
//! tree ([`tree::TreeNode`]); each direct child of the root compiles to
//! one [`LogSourceSpec`]. Format properties are checked against the
//! per-format allow-lists in [`formats::FormatRegistry`].

pub mod compile;
pub mod formats;
pub mod tree;

use std::collections::BTreeMap;

use thiserror::Error;

pub use compile::{compile, fold_env_labels, parse_tags};
pub use formats::FormatRegistry;
pub use tree::TreeNode;

/// One compiled log-collection unit for a single container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSourceSpec {
    /// Logical source name (the first key segment after the prefix).
    pub name: String,
    /// Host directory holding the log files.
    pub host_dir: String,
    /// File glob relative to `host_dir`.
    pub file_glob: String,
    /// Format identifier, or a `/pattern/` literal for regexp sources.
    pub format: String,
    /// Format-specific properties, validated by the registry.
    pub format_props: BTreeMap<String, String>,
    /// Tag mapping; always carries `index` and `topic` after compilation.
    pub tags: BTreeMap<String, String>,
    /// Whether this source tracks the container's standard output.
    pub stdout: bool,
    /// Whether log lines are known to arrive in time order.
    pub time_sorted: bool,
    /// Shipper-facing source type.
    pub log_type: String,
}

impl LogSourceSpec {
    /// The full host path glob this source watches.
    pub fn path(&self) -> String {
        format!("{}/{}", self.host_dir.trim_end_matches('/'), self.file_glob)
    }
}

/// Any of these aborts compilation for the whole container: a malformed
/// declaration must not produce a partial artifact.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CompileError {
    #[error("key {0} has no parent node")]
    MissingParent(String),
    #[error("log source {0} has an empty path")]
    EmptyPath(String),
    #[error("invalid tag pair: {0}")]
    MalformedTag(String),
    #[error("unsupported log format: {0}")]
    UnknownFormat(String),
    #[error("{property} is not a valid property for format {format}")]
    InvalidProperty { property: String, format: String },
    #[error("regexp pattern can not be empty")]
    MissingPattern,
}
