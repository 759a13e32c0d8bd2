//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. explicit path (e.g. the `--config` CLI flag)
//! 2. `~/.kotoba/config.toml` (user)
//! 3. `/etc/kotoba/config.toml` (system)
//! 4. built-in defaults
//!
//! API keys are loaded separately with mandatory permission checks:
//! 1. `~/.kotoba/secrets.toml` (user, must be 0600)
//! 2. `/etc/kotoba/secrets.toml` (system, must be 0600)
//! 3. `KOTOBA_API_KEYS` (comma-separated), then `GOOGLE_API_KEY`

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::gateway::{DEFAULT_MODELS, InferenceGateway, Kotoba};
use crate::providers::{Backoff, RetryPolicy};
use crate::session::{DEFAULT_CONTEXT_TURNS, Instructions};
use crate::types::Credential;
use crate::{KotobaError, Result};

/// Environment variable holding an ordered, comma-separated key list.
pub const API_KEYS_ENV: &str = "KOTOBA_API_KEYS";

/// Single-key fallback environment variable.
pub const GOOGLE_API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub instructions: Instructions,
}

/// Backend candidates and HTTP settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Models to probe, most capable first.
    #[serde(default = "default_models")]
    pub models: Vec<String>,
    /// Override the provider base URL.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Per-request HTTP timeout in seconds (default: 60).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            models: default_models(),
            base_url: None,
            timeout_secs: default_timeout(),
        }
    }
}

fn default_models() -> Vec<String> {
    DEFAULT_MODELS.iter().map(|m| (*m).to_string()).collect()
}

fn default_timeout() -> u64 {
    60
}

/// Backoff schedule names accepted in config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    #[default]
    Linear,
    Exponential,
    Fixed,
    None,
}

/// Retry settings shared by every invocation.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Attempts per invocation, first one included (default: 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Schedule shape (default: linear).
    #[serde(default)]
    pub backoff: BackoffKind,
    /// Base step in seconds (default: 5).
    #[serde(default = "default_step_secs")]
    pub step_secs: u64,
    /// Cap for exponential backoff in seconds (default: 60).
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff: BackoffKind::default(),
            step_secs: default_step_secs(),
            max_delay_secs: default_max_delay_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_step_secs() -> u64 {
    5
}

fn default_max_delay_secs() -> u64 {
    60
}

impl RetryConfig {
    /// Turn the settings into the policy object the gateway uses.
    pub fn policy(&self) -> RetryPolicy {
        let step = Duration::from_secs(self.step_secs);
        let backoff = match self.backoff {
            BackoffKind::Linear => Backoff::Linear { step },
            BackoffKind::Exponential => Backoff::Exponential {
                initial: step,
                max: Duration::from_secs(self.max_delay_secs),
            },
            BackoffKind::Fixed => Backoff::Fixed(step),
            BackoffKind::None => Backoff::None,
        };
        RetryPolicy::new()
            .max_attempts(self.max_attempts)
            .backoff(backoff)
    }
}

/// Session settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Past turns sent with each dialogue reply (default: 20).
    #[serde(default = "default_context_turns")]
    pub context_turns: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            context_turns: default_context_turns(),
        }
    }
}

fn default_context_turns() -> usize {
    DEFAULT_CONTEXT_TURNS
}

/// API keys, highest priority first.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub api_keys: Vec<String>,
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// An explicit path must exist. Without one, the first existing standard
    /// file is used, or built-in defaults if there is none.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Parse a specific config file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            KotobaError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            KotobaError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(KotobaError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".kotoba").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/kotoba/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    /// Retry policy described by the `[retry]` section.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.policy()
    }
}

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Returns secrets from the environment if no file exists.
    pub fn load() -> Result<Self> {
        // Try user secrets first
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".kotoba").join("secrets.toml");
            if user_secrets.exists() {
                return Self::load_from_file(&user_secrets);
            }
        }

        // Try system secrets
        let system_secrets = PathBuf::from("/etc/kotoba/secrets.toml");
        if system_secrets.exists() {
            return Self::load_from_file(&system_secrets);
        }

        Ok(Self::from_env())
    }

    /// Parse a specific secrets file after checking its permissions.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        Self::check_permissions(path)?;
        let content = fs::read_to_string(path).map_err(|e| {
            KotobaError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            KotobaError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Keys from `KOTOBA_API_KEYS`, falling back to `GOOGLE_API_KEY`.
    pub fn from_env() -> Self {
        let lookup = |name: &str| std::env::var(name).ok();
        Self::from_lookup(lookup)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut api_keys: Vec<String> = lookup(API_KEYS_ENV)
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if api_keys.is_empty() {
            api_keys.extend(lookup(GOOGLE_API_KEY_ENV));
        }
        Self { api_keys }
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            KotobaError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        // Reject if group or other bits are set
        if mode & 0o077 != 0 {
            return Err(KotobaError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// Ranked credentials in configured order.
    pub fn credentials(&self) -> Vec<Credential> {
        Credential::ranked(self.api_keys.iter().cloned())
    }
}

/// Build an [`InferenceGateway`] from configuration.
pub fn build_gateway(config: &Config, secrets: &Secrets) -> Result<InferenceGateway> {
    let mut builder = Kotoba::builder()
        .api_keys(secrets.api_keys.iter().cloned())
        .models(config.gateway.models.iter().map(String::as_str))
        .timeout(config.gateway.timeout_secs)
        .retry(config.retry_policy());

    if let Some(ref url) = config.gateway.base_url {
        builder = builder.base_url(url);
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.gateway.models[0], "gemini-2.5-flash");
        assert_eq!(config.gateway.timeout_secs, 60);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.backoff, BackoffKind::Linear);
        assert_eq!(config.session.context_turns, 20);
    }

    #[test]
    fn default_retry_policy_is_linear_five_seconds() {
        let policy = Config::default().retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(5));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(10));
    }

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
            [gateway]
            models = ["gemini-1.5-pro"]
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.gateway.models, ["gemini-1.5-pro"]);
        // Defaults preserved
        assert_eq!(config.gateway.timeout_secs, 60);
        assert_eq!(config.retry.step_secs, 5);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            [gateway]
            models = ["gemini-2.5-pro", "gemini-2.5-flash"]
            base_url = "http://localhost:8080"
            timeout_secs = 30

            [retry]
            max_attempts = 5
            backoff = "exponential"
            step_secs = 1
            max_delay_secs = 8

            [session]
            context_turns = 6

            [instructions]
            role_play = "Play a waiter. Lesson:\n{lesson}"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.gateway.models.len(), 2);
        assert_eq!(
            config.gateway.base_url.as_deref(),
            Some("http://localhost:8080")
        );
        assert_eq!(config.session.context_turns, 6);
        assert!(config.instructions.role_play.starts_with("Play a waiter."));
        // Untouched templates keep their defaults
        assert_eq!(
            config.instructions.extract_lesson,
            Instructions::default().extract_lesson
        );

        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(8));
    }

    #[test]
    fn unknown_backoff_is_rejected() {
        let toml = r#"
            [retry]
            backoff = "fibonacci"
        "#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn parse_secrets_keeps_order() {
        let toml = r#"
            api_keys = ["primary", "backup"]
        "#;
        let secrets: Secrets = toml::from_str(toml).unwrap();
        let creds = secrets.credentials();
        assert_eq!(creds[0].secret(), "primary");
        assert_eq!(creds[1].rank(), 1);
    }

    #[test]
    fn env_list_takes_precedence_over_single_key() {
        let secrets = Secrets::from_lookup(|name| match name {
            API_KEYS_ENV => Some("a, b,,c".to_string()),
            GOOGLE_API_KEY_ENV => Some("single".to_string()),
            _ => None,
        });
        assert_eq!(secrets.api_keys, ["a", "b", "c"]);

        let secrets = Secrets::from_lookup(|name| match name {
            GOOGLE_API_KEY_ENV => Some("single".to_string()),
            _ => None,
        });
        assert_eq!(secrets.api_keys, ["single"]);

        assert!(Secrets::from_lookup(|_| None).api_keys.is_empty());
    }

    #[test]
    fn config_not_found_returns_error() {
        let result = Config::load(Some(Path::new("/nonexistent/config.toml")));
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Config file not found"));
    }

    #[test]
    fn load_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[session]\ncontext_turns = 4").unwrap();
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.session.context_turns, 4);
    }

    #[cfg(unix)]
    #[test]
    fn insecure_secrets_file_is_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "api_keys = [\"k\"]").unwrap();
        fs::set_permissions(file.path(), fs::Permissions::from_mode(0o644)).unwrap();
        let err = Secrets::load_from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("insecure permissions"));

        fs::set_permissions(file.path(), fs::Permissions::from_mode(0o600)).unwrap();
        let secrets = Secrets::load_from_file(file.path()).unwrap();
        assert_eq!(secrets.api_keys, ["k"]);
    }

    #[cfg(feature = "gemini")]
    #[test]
    fn build_gateway_wires_candidates() {
        let config: Config = toml::from_str(
            r#"
            [gateway]
            models = ["m1", "m2"]
        "#,
        )
        .unwrap();
        let secrets = Secrets {
            api_keys: vec!["k1".into(), "k2".into(), "k3".into()],
        };
        let gateway = build_gateway(&config, &secrets).unwrap();
        assert_eq!(gateway.resolver().candidate_count(), 6);
        assert!(gateway.resolved().is_none());
    }
}
