//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.livechat/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.

use log::{LevelFilter, debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::backend::WINDOW_SIZE;
use crate::backend::firebase::{Endpoints, FirebaseSettings, credentials};

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LiveChatConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub firebase: FirebaseConfig,
    #[serde(default)]
    pub local: LocalConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    pub default_backend: Option<String>,
    pub window_size: Option<usize>,
    pub log_level: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct FirebaseConfig {
    pub api_key: Option<String>,
    pub project_id: Option<String>,
    pub oauth_client_id: Option<String>,
    pub oauth_client_secret: Option<String>,
    pub collection: Option<String>,
    pub poll_interval_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LocalConfig {
    pub display_name: Option<String>,
    pub user_id: Option<String>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_BACKEND: &str = "firebase";
pub const DEFAULT_COLLECTION: &str = "messages";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Debug;
const MIN_POLL_INTERVAL_MS: u64 = 250;

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub backend: String,
    pub window_size: usize,
    pub log_level: LevelFilter,
    pub firebase_api_key: Option<String>,
    pub firebase_project_id: Option<String>,
    pub oauth_client_id: Option<String>,
    pub oauth_client_secret: Option<String>,
    pub collection: String,
    pub poll_interval_ms: u64,
    pub local_display_name: String,
    pub local_user_id: String,
}

impl ResolvedConfig {
    /// Settings for the Firebase adapters. Fails if a required key is missing.
    pub fn firebase_settings(&self) -> Result<FirebaseSettings, ConfigError> {
        let api_key = self
            .firebase_api_key
            .clone()
            .ok_or(ConfigError::Missing("firebase.api_key (or FIREBASE_API_KEY)"))?;
        let project_id = self
            .firebase_project_id
            .clone()
            .ok_or(ConfigError::Missing("firebase.project_id (or FIREBASE_PROJECT_ID)"))?;
        let oauth_client_id = self.oauth_client_id.clone().ok_or(ConfigError::Missing(
            "firebase.oauth_client_id (or GOOGLE_OAUTH_CLIENT_ID)",
        ))?;

        Ok(FirebaseSettings {
            api_key,
            project_id,
            oauth_client_id,
            oauth_client_secret: self.oauth_client_secret.clone(),
            collection: self.collection.clone(),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            credentials_path: credentials::default_path(),
            endpoints: Endpoints::default(),
        })
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    /// A setting the selected backend can't run without.
    Missing(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
            ConfigError::Missing(key) => write!(f, "missing setting: {key}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// Returns the path to `~/.livechat/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".livechat").join("config.toml"))
}

/// Load config from `~/.livechat/config.toml`.
///
/// If the file doesn't exist, generates a commented-out default and
/// returns `LiveChatConfig::default()`. If it exists but is malformed,
/// returns `ConfigError::Parse`.
pub fn load_config() -> Result<LiveChatConfig, ConfigError> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            warn!("Could not determine home directory, using default config");
            return Ok(LiveChatConfig::default());
        }
    };

    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(&path);
        return Ok(LiveChatConfig::default());
    }

    let contents = fs::read_to_string(&path).map_err(ConfigError::Io)?;
    let config: LiveChatConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", config);
    Ok(config)
}

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &PathBuf) {
    let default_content = r#"# LiveChat Configuration
# All settings are optional; defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [general]
# default_backend = "firebase"       # "firebase" or "local"
# window_size = 25                   # newest messages shown (max 25)
# log_level = "debug"                # written to livechat.log

# [firebase]
# api_key = "AIza..."                # Or set FIREBASE_API_KEY env var
# project_id = "my-chat-project"     # Or set FIREBASE_PROJECT_ID env var
# oauth_client_id = "...apps.googleusercontent.com"  # Or GOOGLE_OAUTH_CLIENT_ID
# oauth_client_secret = "..."        # Or GOOGLE_OAUTH_CLIENT_SECRET
# collection = "messages"
# poll_interval_ms = 1000

# [local]
# display_name = "Alice"             # Or set LIVECHAT_NAME env var
# user_id = "local-alice"
"#;

    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            warn!("Failed to create config directory: {}", e);
            return;
        }
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
///
/// `cli_backend` and `cli_name` are from CLI flags (None = not specified).
pub fn resolve(
    config: &LiveChatConfig,
    cli_backend: Option<&str>,
    cli_name: Option<&str>,
) -> ResolvedConfig {
    // Backend: CLI → env → config → default
    let backend = cli_backend
        .map(|s| s.to_string())
        .or_else(|| std::env::var("LIVECHAT_BACKEND").ok())
        .or_else(|| config.general.default_backend.clone())
        .unwrap_or_else(|| DEFAULT_BACKEND.to_string());

    // The window never grows past the platform query limit
    let window_size = config
        .general
        .window_size
        .unwrap_or(WINDOW_SIZE)
        .clamp(1, WINDOW_SIZE);

    let log_level = config
        .general
        .log_level
        .as_deref()
        .and_then(|level| match level.parse::<LevelFilter>() {
            Ok(l) => Some(l),
            Err(_) => {
                warn!("Unknown log level '{}', using default", level);
                None
            }
        })
        .unwrap_or(DEFAULT_LOG_LEVEL);

    // Firebase credentials: env → config
    let firebase_api_key = std::env::var("FIREBASE_API_KEY")
        .ok()
        .or_else(|| config.firebase.api_key.clone());
    let firebase_project_id = std::env::var("FIREBASE_PROJECT_ID")
        .ok()
        .or_else(|| config.firebase.project_id.clone());
    let oauth_client_id = std::env::var("GOOGLE_OAUTH_CLIENT_ID")
        .ok()
        .or_else(|| config.firebase.oauth_client_id.clone());
    let oauth_client_secret = std::env::var("GOOGLE_OAUTH_CLIENT_SECRET")
        .ok()
        .or_else(|| config.firebase.oauth_client_secret.clone());

    // Local identity: CLI → env → config → OS user
    let local_display_name = cli_name
        .map(|s| s.to_string())
        .or_else(|| std::env::var("LIVECHAT_NAME").ok())
        .or_else(|| config.local.display_name.clone())
        .or_else(|| std::env::var("USER").ok())
        .unwrap_or_else(|| "Anonymous".to_string());
    let local_user_id = config
        .local
        .user_id
        .clone()
        .unwrap_or_else(|| format!("local-{}", local_display_name.to_lowercase()));

    ResolvedConfig {
        backend,
        window_size,
        log_level,
        firebase_api_key,
        firebase_project_id,
        oauth_client_id,
        oauth_client_secret,
        collection: config
            .firebase
            .collection
            .clone()
            .unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
        poll_interval_ms: config
            .firebase
            .poll_interval_ms
            .unwrap_or(DEFAULT_POLL_INTERVAL_MS)
            .max(MIN_POLL_INTERVAL_MS),
        local_display_name,
        local_user_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config = LiveChatConfig::default();
        assert!(config.general.default_backend.is_none());
        assert!(config.firebase.project_id.is_none());
    }

    #[test]
    fn test_resolve_uses_defaults_when_empty() {
        let config = LiveChatConfig::default();
        let resolved = resolve(&config, None, None);
        assert_eq!(resolved.window_size, WINDOW_SIZE);
        assert_eq!(resolved.collection, DEFAULT_COLLECTION);
        assert_eq!(resolved.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(resolved.log_level, DEFAULT_LOG_LEVEL);
    }

    #[test]
    fn test_resolve_config_values_override_defaults() {
        let config = LiveChatConfig {
            general: GeneralConfig {
                default_backend: Some("local".to_string()),
                window_size: Some(10),
                log_level: Some("warn".to_string()),
            },
            firebase: FirebaseConfig {
                collection: Some("rooms/main/messages".to_string()),
                poll_interval_ms: Some(2000),
                ..Default::default()
            },
            local: LocalConfig {
                display_name: Some("Alice".to_string()),
                user_id: Some("u1".to_string()),
            },
        };
        let resolved = resolve(&config, Some("local"), None);
        assert_eq!(resolved.backend, "local");
        assert_eq!(resolved.window_size, 10);
        assert_eq!(resolved.log_level, LevelFilter::Warn);
        assert_eq!(resolved.collection, "rooms/main/messages");
        assert_eq!(resolved.poll_interval_ms, 2000);
        assert_eq!(resolved.local_user_id, "u1");
    }

    #[test]
    fn test_window_size_capped_at_platform_limit() {
        let config = LiveChatConfig {
            general: GeneralConfig {
                window_size: Some(500),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(resolve(&config, None, None).window_size, WINDOW_SIZE);

        let config = LiveChatConfig {
            general: GeneralConfig {
                window_size: Some(0),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(resolve(&config, None, None).window_size, 1);
    }

    #[test]
    fn test_resolve_cli_backend_and_name_win() {
        let config = LiveChatConfig {
            general: GeneralConfig {
                default_backend: Some("firebase".to_string()),
                ..Default::default()
            },
            local: LocalConfig {
                display_name: Some("Config Name".to_string()),
                user_id: None,
            },
            ..Default::default()
        };
        let resolved = resolve(&config, Some("local"), Some("Bob"));
        assert_eq!(resolved.backend, "local");
        assert_eq!(resolved.local_display_name, "Bob");
        assert_eq!(resolved.local_user_id, "local-bob");
    }

    #[test]
    fn test_unknown_log_level_falls_back() {
        let config = LiveChatConfig {
            general: GeneralConfig {
                log_level: Some("chatty".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(resolve(&config, None, None).log_level, DEFAULT_LOG_LEVEL);
    }

    #[test]
    fn test_poll_interval_has_floor() {
        let config = LiveChatConfig {
            firebase: FirebaseConfig {
                poll_interval_ms: Some(10),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(resolve(&config, None, None).poll_interval_ms, MIN_POLL_INTERVAL_MS);
    }

    #[test]
    fn test_firebase_settings_require_project() {
        let mut resolved = resolve(&LiveChatConfig::default(), None, None);
        resolved.firebase_api_key = Some("key".to_string());
        resolved.oauth_client_id = Some("client".to_string());
        resolved.firebase_project_id = None;

        let err = resolved.firebase_settings().unwrap_err();
        assert!(matches!(err, ConfigError::Missing(key) if key.starts_with("firebase.project_id")));

        resolved.firebase_project_id = Some("proj".to_string());
        let settings = resolved.firebase_settings().unwrap();
        assert_eq!(settings.project_id, "proj");
        assert_eq!(settings.collection, DEFAULT_COLLECTION);
        assert_eq!(settings.poll_interval, Duration::from_millis(resolved.poll_interval_ms));
    }

    #[test]
    fn test_toml_round_trip() {
        let toml_str = r#"
[general]
default_backend = "local"
window_size = 20
log_level = "info"

[firebase]
api_key = "AIza-test"
project_id = "chat-test"
oauth_client_id = "client.apps.googleusercontent.com"

[local]
display_name = "Alice"
"#;
        let config: LiveChatConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.default_backend.as_deref(), Some("local"));
        assert_eq!(config.general.window_size, Some(20));
        assert_eq!(config.firebase.api_key.as_deref(), Some("AIza-test"));
        assert_eq!(config.firebase.project_id.as_deref(), Some("chat-test"));
        assert_eq!(config.local.display_name.as_deref(), Some("Alice"));
        assert!(config.local.user_id.is_none());
    }

    #[test]
    fn test_sparse_toml_parses() {
        // Only override one thing, everything else stays default
        let toml_str = r#"
[firebase]
project_id = "only-this"
"#;
        let config: LiveChatConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.firebase.project_id.as_deref(), Some("only-this"));
        assert!(config.general.default_backend.is_none());
        assert!(config.firebase.collection.is_none());
    }
}
