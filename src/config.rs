//! Configuration loading.
//!
//! Settings are resolved in layers, later layers winning:
//!
//! 1. built-in defaults
//! 2. a YAML file (explicit path, `JIRA_CONFIG`, or `<config dir>/jira-lib/config.yaml`)
//! 3. environment variables (`JIRA_URL`, `JIRA_EMAIL`, `JIRA_API_TOKEN`, ...)
//! 4. the OS keyring, only when no token has been found yet
//!
//! ```yaml
//! base_url: https://example.atlassian.net
//! email: dev@example.com
//! max_concurrent: 8
//! cache:
//!   default_ttl_secs: 1800
//!   category_ttl_secs:
//!     fields: 86400
//! ```

use crate::transport::Credentials;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const KEYRING_SERVICE: &str = "jira-lib";

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JiraConfig {
    pub base_url: String,
    pub email: Option<String>,
    pub api_token: Option<String>,
    pub personal_access_token: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub max_concurrent: usize,
    pub rate_limit_rps: Option<f64>,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    /// Defaults to `<cache dir>/jira-lib`.
    pub dir: Option<PathBuf>,
    pub default_ttl_secs: u64,
    /// Per-category TTL overrides, e.g. `fields: 86400`.
    pub category_ttl_secs: HashMap<String, u64>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
            default_ttl_secs: 3600,
            category_ttl_secs: HashMap::new(),
        }
    }
}

impl CacheSettings {
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("jira-lib")
        })
    }
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            email: None,
            api_token: None,
            personal_access_token: None,
            timeout_secs: 30,
            max_retries: 3,
            max_concurrent: 10,
            rate_limit_rps: None,
            cache: CacheSettings::default(),
        }
    }
}

impl std::fmt::Debug for JiraConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "***");
        f.debug_struct("JiraConfig")
            .field("base_url", &self.base_url)
            .field("email", &self.email)
            .field("api_token", &redact(&self.api_token))
            .field("personal_access_token", &redact(&self.personal_access_token))
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("max_concurrent", &self.max_concurrent)
            .field("rate_limit_rps", &self.rate_limit_rps)
            .field("cache", &self.cache)
            .finish()
    }
}

impl JiraConfig {
    /// Resolve configuration from every layer and validate it.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let cfg = Self::resolve(path)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Same layering as [`load`](Self::load) without validation, for commands
    /// that never talk to the server (cache maintenance).
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match Self::locate_file(path) {
            Some(p) => Self::from_file(&p)?,
            None => Self::default(),
        };
        cfg.apply_env(|key| std::env::var(key).ok());
        cfg.apply_keyring();
        Ok(cfg)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("jira-lib").join("config.yaml"))
    }

    fn locate_file(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(p) = explicit {
            return Some(p.to_path_buf());
        }
        if let Ok(p) = std::env::var("JIRA_CONFIG") {
            return Some(PathBuf::from(p));
        }
        Self::default_path().filter(|p| p.exists())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("cannot read config file: {e}"),
                ErrorContext::new()
                    .with_details(path.display().to_string())
                    .with_source("config_loader"),
            )
        })?;
        debug!(path = %path.display(), "loaded config file");
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(s: &str) -> Result<Self> {
        if s.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(s)?)
    }

    /// Overlay environment variables. `lookup` is `std::env::var` outside of tests.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("JIRA_URL").or_else(|| non_empty("JIRA_BASE_URL")) {
            self.base_url = url;
        }
        if let Some(v) = non_empty("JIRA_EMAIL") {
            self.email = Some(v);
        }
        if let Some(v) = non_empty("JIRA_API_TOKEN") {
            self.api_token = Some(v);
        }
        if let Some(v) = non_empty("JIRA_PAT") {
            self.personal_access_token = Some(v);
        }
        if let Some(v) = non_empty("JIRA_MAX_CONCURRENT").and_then(|s| s.parse().ok()) {
            self.max_concurrent = v;
        }
        if let Some(v) = non_empty("JIRA_MAX_RETRIES").and_then(|s| s.parse().ok()) {
            self.max_retries = v;
        }
        if let Some(v) = non_empty("JIRA_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            self.timeout_secs = v;
        }
        if let Some(v) = non_empty("JIRA_CACHE_DIR") {
            self.cache.dir = Some(PathBuf::from(v));
        }
    }

    fn apply_keyring(&mut self) {
        if self.api_token.is_some() || self.personal_access_token.is_some() {
            return;
        }
        let Some(email) = self.email.as_deref() else {
            return;
        };
        if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, email) {
            if let Ok(token) = entry.get_password() {
                debug!(email, "api token loaded from keyring");
                self.api_token = Some(token);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let ctx = |field: &str| {
            ErrorContext::new()
                .with_field_path(field)
                .with_source("config_validator")
        };

        if self.base_url.trim().is_empty() {
            return Err(Error::configuration_with_context(
                "JIRA base URL is not set (use JIRA_URL or base_url)",
                ctx("base_url"),
            ));
        }
        let parsed = url::Url::parse(&self.base_url).map_err(|e| {
            Error::configuration_with_context(format!("invalid base URL: {e}"), ctx("base_url"))
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(Error::configuration_with_context(
                format!("unsupported URL scheme '{}'", parsed.scheme()),
                ctx("base_url"),
            ));
        }

        if self.max_concurrent == 0 {
            return Err(Error::configuration_with_context(
                "max_concurrent must be at least 1",
                ctx("max_concurrent"),
            ));
        }
        if let Some(rps) = self.rate_limit_rps {
            if !rps.is_finite() || rps < 0.0 {
                return Err(Error::configuration_with_context(
                    "rate_limit_rps must be a non-negative number",
                    ctx("rate_limit_rps"),
                ));
            }
        }

        self.credentials().map(|_| ())
    }

    /// Pick the authentication scheme. A personal access token takes precedence.
    pub fn credentials(&self) -> Result<Credentials> {
        if let Some(token) = &self.personal_access_token {
            return Ok(Credentials::Bearer {
                token: token.clone(),
            });
        }
        match (&self.email, &self.api_token) {
            (Some(email), Some(token)) => Ok(Credentials::Basic {
                email: email.clone(),
                api_token: token.clone(),
            }),
            (None, _) => Err(Error::configuration_with_context(
                "no credentials: set JIRA_EMAIL and JIRA_API_TOKEN, or JIRA_PAT",
                ErrorContext::new()
                    .with_field_path("email")
                    .with_source("config_validator"),
            )),
            (Some(_), None) => Err(Error::configuration_with_context(
                "API token is missing (JIRA_API_TOKEN or keyring)",
                ErrorContext::new()
                    .with_field_path("api_token")
                    .with_source("config_validator"),
            )),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}
