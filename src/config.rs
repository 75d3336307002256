// src/config.rs

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::classifier::default_signatures;
use crate::store::memory::{DEFAULT_MAX_RESULTS, DEFAULT_MAX_RUNS};

#[derive(Debug, Deserialize, Clone)]
pub struct ScanConfig {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_dns_timeout")]
    pub dns_timeout_secs: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_targets_file")]
    pub targets_file: String,
    #[serde(default)]
    pub domains: Option<Vec<String>>,  // Inline list, takes precedence over targets_file
    #[serde(default)]
    pub nameservers: Option<Vec<String>>,  // ip:port, system resolver when absent
}

fn default_interval() -> u64 { 300 }
fn default_dns_timeout() -> u64 { 10 }
fn default_max_concurrency() -> usize { 8 }
fn default_targets_file() -> String { "subdomains.txt".to_string() }

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            dns_timeout_secs: default_dns_timeout(),
            max_concurrency: default_max_concurrency(),
            targets_file: default_targets_file(),
            domains: None,
            nameservers: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SignatureConfig {
    #[serde(default = "default_signatures")]
    pub providers: Vec<String>,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            providers: default_signatures(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: Option<String>,
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebhookConfig {
    pub url: String,
    pub secret: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationsConfig {
    #[serde(default = "default_notify_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,
}

fn default_notify_timeout() -> u64 { 15 }

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_notify_timeout(),
            telegram: None,
            webhook: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub enabled: bool,
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Retention of the in-memory store used while `enabled = false`
    #[serde(default = "default_memory_max_runs")]
    pub memory_max_runs: usize,
    #[serde(default = "default_memory_max_results")]
    pub memory_max_results: usize,
}

fn default_database_url() -> String {
    "postgresql://localhost/cname_sentry".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_memory_max_runs() -> usize { DEFAULT_MAX_RUNS }
fn default_memory_max_results() -> usize { DEFAULT_MAX_RESULTS }

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_database_url(),
            max_connections: default_max_connections(),
            memory_max_runs: default_memory_max_runs(),
            memory_max_results: default_memory_max_results(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AlertsConfig {
    /// Keep alert history across restarts
    #[serde(default)]
    pub persist: bool,
    #[serde(default = "default_alert_state_file")]
    pub state_file: String,
}

fn default_alert_state_file() -> String { "cname-sentry-alerts.toml".to_string() }

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            persist: false,
            state_file: default_alert_state_file(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,
}

fn default_snapshot_path() -> String { "scans.json".to_string() }

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub dir: Option<String>,  // Daily-rotated log files, stdout only when absent
}

fn default_log_level() -> String { "info".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub signatures: SignatureConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let cfg: Config = toml::from_str(&contents)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::warn!("Config file {:?} not found, using defaults", path);
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.scan.interval_secs == 0 {
            anyhow::bail!("scan.interval_secs must be greater than 0");
        }
        if self.scan.max_concurrency == 0 {
            anyhow::bail!("scan.max_concurrency must be greater than 0");
        }
        if self.scan.dns_timeout_secs == 0 {
            anyhow::bail!("scan.dns_timeout_secs must be greater than 0");
        }
        if self.database.memory_max_runs == 0 || self.database.memory_max_results == 0 {
            anyhow::bail!("database.memory_max_runs and memory_max_results must be greater than 0");
        }
        Ok(())
    }

    /// Pull Telegram credentials from the environment so they stay out of config files
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("TELEGRAM_BOT_TOKEN").filter(|v| !v.is_empty());
        let chat_id = lookup("TELEGRAM_CHAT_ID").filter(|v| !v.is_empty());

        if token.is_none() && chat_id.is_none() {
            return;
        }

        let telegram = self
            .notifications
            .telegram
            .get_or_insert_with(|| TelegramConfig {
                bot_token: None,
                chat_id: None,
                api_base: default_telegram_api_base(),
            });

        if token.is_some() {
            telegram.bot_token = token;
        }
        if chat_id.is_some() {
            telegram.chat_id = chat_id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_from_valid_toml() {
        let toml_content = r#"
[scan]
interval_secs = 60
dns_timeout_secs = 5
max_concurrency = 4
targets_file = "targets.txt"
nameservers = ["1.1.1.1:53"]

[signatures]
providers = ["amazonaws", "fastly"]

[notifications]
timeout_secs = 10

[notifications.telegram]
bot_token = "123:abc"
chat_id = "42"

[notifications.webhook]
url = "https://example.com/webhook"
secret = "test_secret"
timeout_secs = 5

[database]
enabled = true
url = "postgresql://db/scans"
memory_max_runs = 10
memory_max_results = 500

[alerts]
persist = true
state_file = "alerts.toml"

[export]
snapshot_path = "out/scans.json"

[logging]
level = "debug"
dir = "logs"
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();

        assert_eq!(config.scan.interval_secs, 60);
        assert_eq!(config.scan.dns_timeout_secs, 5);
        assert_eq!(config.scan.max_concurrency, 4);
        assert_eq!(config.scan.targets_file, "targets.txt");
        assert_eq!(config.scan.nameservers, Some(vec!["1.1.1.1:53".to_string()]));
        assert_eq!(config.signatures.providers, vec!["amazonaws", "fastly"]);
        assert_eq!(config.notifications.timeout_secs, 10);
        let telegram = config.notifications.telegram.as_ref().unwrap();
        assert_eq!(telegram.bot_token.as_deref(), Some("123:abc"));
        assert_eq!(telegram.api_base, "https://api.telegram.org");
        let webhook = config.notifications.webhook.as_ref().unwrap();
        assert_eq!(webhook.secret, Some("test_secret".to_string()));
        assert!(config.database.enabled);
        assert_eq!(config.database.max_connections, 5);
        assert!(config.alerts.persist);
        assert_eq!(config.alerts.state_file, "alerts.toml");
        assert_eq!(config.export.snapshot_path, "out/scans.json");
        assert_eq!(config.database.memory_max_runs, 10);
        assert_eq!(config.database.memory_max_results, 500);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.dir.as_deref(), Some("logs"));
    }

    #[test]
    fn test_config_empty_toml_uses_defaults() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.flush().unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();

        assert_eq!(config.scan.interval_secs, 300);
        assert_eq!(config.scan.dns_timeout_secs, 10);
        assert_eq!(config.scan.targets_file, "subdomains.txt");
        assert!(config.scan.domains.is_none());
        assert!(config.signatures.providers.contains(&"heroku".to_string()));
        assert_eq!(config.notifications.timeout_secs, 15);
        assert!(config.notifications.telegram.is_none());
        assert!(!config.database.enabled);
        assert!(!config.alerts.persist);
        assert_eq!(config.export.snapshot_path, "scans.json");
        assert_eq!(config.database.memory_max_runs, DEFAULT_MAX_RUNS);
        assert_eq!(config.database.memory_max_results, DEFAULT_MAX_RESULTS);
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.dir.is_none());
    }

    #[test]
    fn test_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"invalid toml content {{{").unwrap();
        temp_file.flush().unwrap();

        assert!(Config::from_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_config_rejects_zero_interval() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[scan]\ninterval_secs = 0\n").unwrap();
        temp_file.flush().unwrap();

        assert!(Config::from_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_config_rejects_zero_memory_retention() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[database]\nenabled = false\nmemory_max_runs = 0\n").unwrap();
        temp_file.flush().unwrap();

        assert!(Config::from_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_config_nonexistent_file() {
        let result = Config::from_file(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());

        let fallback = Config::load_or_default(Path::new("/nonexistent/path/config.toml")).unwrap();
        assert_eq!(fallback.scan.interval_secs, 300);
    }

    #[test]
    fn test_env_overrides_fill_telegram_credentials() {
        let env: HashMap<&str, &str> = [
            ("TELEGRAM_BOT_TOKEN", "999:xyz"),
            ("TELEGRAM_CHAT_ID", "-100"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides_from(|k| env.get(k).map(|v| v.to_string()));

        let telegram = config.notifications.telegram.unwrap();
        assert_eq!(telegram.bot_token.as_deref(), Some("999:xyz"));
        assert_eq!(telegram.chat_id.as_deref(), Some("-100"));
        assert_eq!(telegram.api_base, "https://api.telegram.org");
    }

    #[test]
    fn test_env_overrides_absent_leave_config_untouched() {
        let mut config = Config::default();
        config.apply_overrides_from(|_| None);
        assert!(config.notifications.telegram.is_none());
    }
}
