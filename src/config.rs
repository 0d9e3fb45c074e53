//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILNORM_CONFIG` (environment variable)
//! 2. `~/.config/mailnorm/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailnorm\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::normalize::body::DEFAULT_BODY_ENCODING;
use crate::normalize::conversation::ConversationIdMode;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Conversation identity policy.
    pub conversation: ConversationConfig,
    /// Body decoding.
    pub body: BodyConfig,
    /// Where `save` writes MIME files.
    pub save: SaveConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// `"index"` or `"guid-only"`.
    pub id_mode: ConversationIdMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyConfig {
    /// Encoding label used to decode the binary HTML property.
    pub encoding: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveConfig {
    /// Default directory for saved MIME files (system temp dir when unset).
    pub default_dir: Option<PathBuf>,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
        }
    }
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            encoding: DEFAULT_BODY_ENCODING.to_string(),
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load the configuration file, or the defaults when there is none.
///
/// A file that cannot be read or parsed is reported with `warn!` and
/// replaced by the defaults.
pub fn load_config() -> Config {
    let Some(path) = config_file_path().filter(|p| p.exists()) else {
        return Config::default();
    };

    read_config(&path).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "Ignoring config file");
        Config::default()
    })
}

/// Parse one config file.
pub fn read_config(path: &Path) -> anyhow::Result<Config> {
    let text = std::fs::read_to_string(path)?;
    let config = toml::from_str(&text)?;
    tracing::info!(path = %path.display(), "Loaded config");
    Ok(config)
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
    if let Ok(env_path) = std::env::var("MAILNORM_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mailnorm").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailnorm")
}

/// Directory `save_to_file` falls back to when no path is given.
pub fn save_dir(config: &Config) -> PathBuf {
    config
        .save
        .default_dir
        .clone()
        .unwrap_or_else(std::env::temp_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(cfg.conversation.id_mode, ConversationIdMode::Index);
        assert_eq!(cfg.body.encoding, "utf-8");
        assert!(cfg.save.default_dir.is_none());
        assert_eq!(save_dir(&cfg), std::env::temp_dir());
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let mut cfg = Config::default();
        cfg.conversation.id_mode = ConversationIdMode::GuidOnly;
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        assert!(toml_str.contains("guid-only"));
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.conversation.id_mode, ConversationIdMode::GuidOnly);
        assert_eq!(parsed.body.encoding, cfg.body.encoding);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[conversation]
id_mode = "guid-only"

[save]
default_dir = "/var/spool/mailnorm"
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.conversation.id_mode, ConversationIdMode::GuidOnly);
        assert_eq!(save_dir(&cfg), PathBuf::from("/var/spool/mailnorm"));
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(cfg.body.encoding, "utf-8");
    }

    #[test]
    fn test_read_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[body]\nencoding = \"windows-1252\"\n").unwrap();
        let cfg = read_config(&path).unwrap();
        assert_eq!(cfg.body.encoding, "windows-1252");

        std::fs::write(&path, "[body\n").unwrap();
        assert!(read_config(&path).is_err());
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        let bad = "[conversation]\nid_mode = \"thread\"\n";
        assert!(toml::from_str::<Config>(bad).is_err());
    }
}
