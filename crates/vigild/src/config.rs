//! Configuration management for vigild.
//!
//! Loads settings from /etc/vigil/config.toml or uses defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/vigil/config.toml";

/// Daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VigilConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Directory for targets.json and persisted audit records
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Ollama API base URL
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Model used when a start request names none
    #[serde(default = "default_model")]
    pub default_model: String,

    /// SSH connection establishment timeout
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Per-command execution timeout
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// Timeout for the bundled collection script run
    #[serde(default = "default_script_timeout")]
    pub script_timeout_secs: u64,

    /// Timeout for the generative analysis call (minutes-scale)
    #[serde(default = "default_analysis_timeout")]
    pub analysis_timeout_secs: u64,

    /// Sessions idle longer than this are reaped
    #[serde(default = "default_session_max_idle")]
    pub session_max_idle_secs: u64,

    /// How often the idle reaper runs
    #[serde(default = "default_reap_interval")]
    pub reap_interval_secs: u64,
}

fn default_listen_addr() -> String {
    // Localhost only; operators front this with their own proxy if needed
    "127.0.0.1:7710".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/vigil")
}

fn default_ollama_url() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_model() -> String {
    "qwen2.5:7b-instruct".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_command_timeout() -> u64 {
    30
}

fn default_script_timeout() -> u64 {
    120
}

fn default_analysis_timeout() -> u64 {
    300 // generative-text latency runs minutes, not seconds
}

fn default_session_max_idle() -> u64 {
    600
}

fn default_reap_interval() -> u64 {
    120
}

impl Default for VigilConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            data_dir: default_data_dir(),
            ollama_url: default_ollama_url(),
            default_model: default_model(),
            connect_timeout_secs: default_connect_timeout(),
            command_timeout_secs: default_command_timeout(),
            script_timeout_secs: default_script_timeout(),
            analysis_timeout_secs: default_analysis_timeout(),
            session_max_idle_secs: default_session_max_idle(),
            reap_interval_secs: default_reap_interval(),
        }
    }
}

impl VigilConfig {
    /// Load config from the default path, falling back to defaults on
    /// any error.
    pub fn load() -> Self {
        Self::load_from(Path::new(CONFIG_PATH))
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Invalid config at {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("No config at {}, using defaults", path.display());
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = VigilConfig::default();
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.analysis_timeout_secs, 300);
        assert!(config.listen_addr.starts_with("127.0.0.1"));
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: VigilConfig = toml::from_str("connect_timeout_secs = 5").unwrap();
        assert_eq!(config.connect_timeout_secs, 5);
        assert_eq!(config.command_timeout_secs, 30);
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = VigilConfig::load_from(Path::new("/nonexistent/vigil.toml"));
        assert_eq!(config.session_max_idle_secs, 600);
    }
}
