//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MSGHTML_CONFIG` (environment variable)
//! 2. `~/.config/msghtml/config.toml` (Linux/macOS)
//!    `%APPDATA%\msghtml\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::render::RenderOptions;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Body rendering settings.
    pub render: RenderConfig,
    /// Export defaults.
    pub export: ExportConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Body rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Per-image resolution limit in milliseconds (0 = no limit).
    pub image_timeout_ms: u64,
}

/// Export defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Default output directory.
    pub default_output_dir: Option<PathBuf>,
    /// Replace existing files instead of picking a fresh name.
    pub overwrite: bool,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            image_timeout_ms: 10_000,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            default_output_dir: None,
            overwrite: false,
        }
    }
}

impl RenderConfig {
    /// Rendering options for these settings, with the default image sniffer.
    pub fn to_options(&self) -> RenderOptions {
        let timeout = (self.image_timeout_ms > 0).then(|| Duration::from_millis(self.image_timeout_ms));
        RenderOptions::default().with_image_timeout(timeout)
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Save configuration to the standard location.
pub fn save_config(config: &Config) -> anyhow::Result<()> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(&path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MSGHTML_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("msghtml").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("msghtml")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("msghtml.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(cfg.render.image_timeout_ms, 10_000);
        assert!(!cfg.export.overwrite);
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let mut cfg = Config::default();
        cfg.render.image_timeout_ms = 250;
        cfg.export.default_output_dir = Some(PathBuf::from("/tmp/out"));
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.render.image_timeout_ms, 250);
        assert_eq!(parsed.export.default_output_dir, cfg.export.default_output_dir);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[render]
image_timeout_ms = 0
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.render.image_timeout_ms, 0);
        // Other sections use defaults
        assert_eq!(cfg.general.log_level, "warn");
        assert!(!cfg.export.overwrite);
    }

    #[test]
    fn test_render_options_timeout() {
        let none = RenderConfig { image_timeout_ms: 0 }.to_options();
        assert_eq!(none.image_timeout, None);
        let some = RenderConfig { image_timeout_ms: 1500 }.to_options();
        assert_eq!(some.image_timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_log_file_in_cache_dir() {
        let mut cfg = Config::default();
        cfg.general.cache_dir = Some(PathBuf::from("/var/tmp/msghtml-test"));
        assert_eq!(
            log_file_path(&cfg),
            PathBuf::from("/var/tmp/msghtml-test/msghtml.log")
        );
    }
}
