//! Load — config loading from file and environment variables.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::model::{RuntimeKind, SidecarConfig};

impl SidecarConfig {
    /// Load configuration from file or environment variables
    /// Priority: Environment Variables > Config File > Defaults
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = std::env::var("SIDECAR_CONFIG_FILE")
            .unwrap_or_else(|_| "/etc/watchlog/sidecar.toml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            tracing::info!("Loading configuration from: {}", config_path);
            Self::from_file(&config_path)?
        } else {
            tracing::info!(
                "Config file not found at {}, using environment variables",
                config_path
            );
            Self::from_env()
        };

        // Environment variables override file config for critical settings
        if let Ok(runtime) = std::env::var("RUNTIME_TYPE") {
            config.runtime = RuntimeKind::parse(&runtime);
        }
        if let Ok(prefix) = std::env::var("LOG_PREFIX") {
            if !prefix.is_empty() {
                config.log_prefix = prefix;
            }
        }
        if let Ok(base_dir) = std::env::var("LOG_BASE_DIR") {
            if !base_dir.is_empty() {
                config.base_dir = base_dir;
            }
        }
        if let Ok(socket) = std::env::var("DOCKER_SOCKET") {
            config.docker_socket = socket;
        }
        if let Ok(socket) = std::env::var("CONTAINERD_SOCKET") {
            config.containerd_socket = socket;
        }
        if let Ok(node) = std::env::var("NODE_NAME") {
            config.node_name = node;
        }
        if let Some(output) = output_from_env() {
            config.output = output;
        }

        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let config: SidecarConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            runtime: std::env::var("RUNTIME_TYPE")
                .ok()
                .and_then(|raw| RuntimeKind::parse(&raw)),
            log_prefix: std::env::var("LOG_PREFIX")
                .ok()
                .filter(|p| !p.is_empty())
                .unwrap_or(defaults.log_prefix),
            base_dir: std::env::var("LOG_BASE_DIR")
                .ok()
                .filter(|d| !d.is_empty())
                .unwrap_or(defaults.base_dir),
            docker_socket: std::env::var("DOCKER_SOCKET").unwrap_or(defaults.docker_socket),
            containerd_socket: std::env::var("CONTAINERD_SOCKET")
                .unwrap_or(defaults.containerd_socket),
            containerd_namespace: defaults.containerd_namespace,
            node_name: std::env::var("NODE_NAME").unwrap_or(defaults.node_name),
            output: output_from_env().unwrap_or(defaults.output),
            scan_interval_secs: std::env::var("SCAN_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.scan_interval_secs),
        }
    }

    /// Validate configuration values. Failures here are fatal at startup.
    pub fn validate(&self) -> Result<(), String> {
        if self.runtime.is_none() {
            return Err("RUNTIME_TYPE must be set to docker or containerd".to_string());
        }
        if self.log_prefix.is_empty() {
            return Err("log_prefix must not be empty".to_string());
        }
        if self.base_dir.is_empty() {
            return Err("base_dir must not be empty".to_string());
        }
        if self.scan_interval_secs == 0 {
            return Err("scan_interval_secs must be > 0".to_string());
        }
        Ok(())
    }
}

/// The shipper output tag has a primary and a legacy env name.
fn output_from_env() -> Option<String> {
    std::env::var("FILEBEAT_OUTPUT")
        .or_else(|_| std::env::var("LOGGING_OUTPUT"))
        .ok()
        .filter(|o| !o.is_empty())
}
