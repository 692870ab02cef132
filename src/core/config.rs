use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

pub const CONFIG_PATH_VAR: &str = "EVENT_STATUS_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "event-status.toml";

/// Runtime settings. Field names double as the upper-cased environment
/// variable names that override them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub backend_url: String,
    pub scheduler_interval_seconds: u64,
    pub cleanup_interval_seconds: u64,
    pub scheduler_misfire_grace_seconds: u64,
    pub scheduler_coalesce: bool,
    pub host: String,
    pub port: u16,
    pub http_timeout: u64,
    pub log_level: String,
    pub superadmin_email: Option<String>,
    pub superadmin_password: Option<String>,
    pub superadmin_token: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:8000".to_string(),
            scheduler_interval_seconds: 60,
            cleanup_interval_seconds: 3600,
            scheduler_misfire_grace_seconds: 5,
            scheduler_coalesce: true,
            host: "0.0.0.0".to_string(),
            port: 8001,
            http_timeout: 30,
            log_level: "INFO".to_string(),
            superadmin_email: None,
            superadmin_password: None,
            superadmin_token: None,
        }
    }
}

impl Settings {
    /// Defaults, then the optional TOML file, then process environment.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        let base = Self::from_file(&path)?;
        base.with_env(|key| std::env::var(key).ok())
    }

    /// A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        settings.validated()
    }

    /// Applies overrides from `lookup`, which maps an environment variable
    /// name to its value.
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("BACKEND_URL") {
            self.backend_url = v;
        }
        if let Some(v) = get("SCHEDULER_INTERVAL_SECONDS") {
            self.scheduler_interval_seconds = parse_number("SCHEDULER_INTERVAL_SECONDS", &v)?;
        }
        if let Some(v) = get("CLEANUP_INTERVAL_SECONDS") {
            self.cleanup_interval_seconds = parse_number("CLEANUP_INTERVAL_SECONDS", &v)?;
        }
        if let Some(v) = get("SCHEDULER_MISFIRE_GRACE_SECONDS") {
            self.scheduler_misfire_grace_seconds =
                parse_number("SCHEDULER_MISFIRE_GRACE_SECONDS", &v)?;
        }
        if let Some(v) = get("SCHEDULER_COALESCE") {
            self.scheduler_coalesce = parse_bool("SCHEDULER_COALESCE", &v)?;
        }
        if let Some(v) = get("HOST") {
            self.host = v;
        }
        if let Some(v) = get("PORT") {
            self.port = parse_number("PORT", &v)?;
        }
        if let Some(v) = get("HTTP_TIMEOUT") {
            self.http_timeout = parse_number("HTTP_TIMEOUT", &v)?;
        }
        if let Some(v) = get("LOG_LEVEL") {
            self.log_level = v;
        }
        if let Some(v) = get("SUPERADMIN_EMAIL") {
            self.superadmin_email = Some(v);
        }
        if let Some(v) = get("SUPERADMIN_PASSWORD") {
            self.superadmin_password = Some(v);
        }
        if let Some(v) = get("SUPERADMIN_TOKEN") {
            self.superadmin_token = Some(v);
        }

        self.validated()
    }

    fn validated(mut self) -> Result<Self> {
        self.backend_url = self.backend_url.trim().trim_end_matches('/').to_string();
        url::Url::parse(&self.backend_url)
            .with_context(|| format!("BACKEND_URL is not a valid URL: {}", self.backend_url))?;

        if self.scheduler_interval_seconds == 0 {
            bail!("SCHEDULER_INTERVAL_SECONDS must be greater than zero");
        }
        if self.cleanup_interval_seconds == 0 {
            bail!("CLEANUP_INTERVAL_SECONDS must be greater than zero");
        }
        if self.http_timeout == 0 {
            bail!("HTTP_TIMEOUT must be greater than zero");
        }
        self.log_level = self.log_level.trim().to_uppercase();
        self.level()?;
        Ok(self)
    }

    pub fn level(&self) -> Result<Level> {
        match self.log_level.to_uppercase().as_str() {
            "TRACE" => Ok(Level::TRACE),
            "DEBUG" => Ok(Level::DEBUG),
            "INFO" => Ok(Level::INFO),
            "WARN" | "WARNING" => Ok(Level::WARN),
            "ERROR" | "CRITICAL" => Ok(Level::ERROR),
            other => Err(anyhow!("Unknown LOG_LEVEL '{}'", other)),
        }
    }

    pub fn lifecycle_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler_interval_seconds)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_seconds)
    }

    pub fn misfire_grace(&self) -> Duration {
        Duration::from_secs(self.scheduler_misfire_grace_seconds)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Copy that is safe to print.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.superadmin_password.is_some() {
            copy.superadmin_password = Some("********".to_string());
        }
        if copy.superadmin_token.is_some() {
            copy.superadmin_token = Some("********".to_string());
        }
        copy
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| anyhow!("{} has invalid value '{}': {}", key, value, e))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow!("{} has invalid boolean '{}'", key, other)),
    }
}
