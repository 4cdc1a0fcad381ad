//! Application configuration for the sales cycle engine.
//!
//! User config lives at `~/.salescycle/salescycle.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, SalesCycleError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "salescycle.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".salescycle";

// ---------------------------------------------------------------------------
// Config structs (matching salescycle.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// CRM connection settings.
    #[serde(default)]
    pub crm: CrmConfig,

    /// Engine fetch and batching settings.
    #[serde(default)]
    pub engine: EngineSection,

    /// Funnel aggregation settings.
    #[serde(default)]
    pub funnel: FunnelSection,
}

/// `[crm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmConfig {
    /// Base URL of the CRM REST API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl CrmConfig {
    /// Parse and validate the configured base URL.
    pub fn base_url(&self) -> Result<Url> {
        let url = Url::parse(&self.base_url).map_err(|e| {
            SalesCycleError::config(format!("invalid crm.base_url '{}': {e}", self.base_url))
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(SalesCycleError::config(format!(
                "crm.base_url must be http or https, got '{other}'"
            ))),
        }
    }
}

fn default_base_url() -> String {
    "https://api.acculynx.com/api/v2".into()
}
fn default_api_key_env() -> String {
    "ACCULYNX_API_KEY".into()
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[engine]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSection {
    /// Cap on jobs fetched per milestone category.
    #[serde(default = "default_max_jobs")]
    pub max_jobs_per_milestone: usize,

    /// Cap on users fetched for the rep directory.
    #[serde(default = "default_max_users")]
    pub max_users: usize,

    /// Number of concurrent per-job calls in one enrichment batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Drop duplicate job ids returned by different milestone fetches.
    #[serde(default)]
    pub dedupe_jobs: bool,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            max_jobs_per_milestone: default_max_jobs(),
            max_users: default_max_users(),
            batch_size: default_batch_size(),
            dedupe_jobs: false,
        }
    }
}

fn default_max_jobs() -> usize {
    500
}
fn default_max_users() -> usize {
    100
}
fn default_batch_size() -> usize {
    5
}

/// `[funnel]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunnelSection {
    /// Representatives excluded from the primary funnel view and rep breakdowns.
    #[serde(default)]
    pub inactive_reps: Vec<String>,
}

// ---------------------------------------------------------------------------
// Engine config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime engine configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Cap on jobs fetched per milestone category.
    pub max_jobs_per_milestone: usize,
    /// Cap on users fetched for the rep directory.
    pub max_users: usize,
    /// Concurrent per-job calls per batch (never below 1).
    pub batch_size: usize,
    /// Drop duplicate job ids across milestone fetches.
    pub dedupe_jobs: bool,
    /// Inactive representative names.
    pub inactive_reps: Vec<String>,
    /// Date that anchors MTD/YTD windows; `None` means today (local time).
    pub reference_date: Option<NaiveDate>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for EngineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_jobs_per_milestone: config.engine.max_jobs_per_milestone,
            max_users: config.engine.max_users,
            batch_size: config.engine.batch_size.max(1),
            dedupe_jobs: config.engine.dedupe_jobs,
            inactive_reps: config.funnel.inactive_reps.clone(),
            reference_date: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.salescycle/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SalesCycleError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.salescycle/salescycle.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SalesCycleError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| SalesCycleError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SalesCycleError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SalesCycleError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SalesCycleError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the CRM API key from the env var named in the config.
pub fn resolve_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.crm.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(SalesCycleError::config(format!(
            "CRM API key not found. Set the {var_name} environment variable."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("base_url"));
        assert!(toml_str.contains("ACCULYNX_API_KEY"));
        assert!(toml_str.contains("batch_size"));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[engine]
batch_size = 3

[funnel]
inactive_reps = ["Former Rep", "someone else"]
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.engine.batch_size, 3);
        assert_eq!(config.engine.max_jobs_per_milestone, 500);
        assert_eq!(config.crm.timeout_secs, 30);
        assert_eq!(config.funnel.inactive_reps.len(), 2);
    }

    #[test]
    fn engine_config_from_app_config() {
        let mut app = AppConfig::default();
        app.engine.batch_size = 0;
        app.funnel.inactive_reps = vec!["ajtaft".into()];

        let engine = EngineConfig::from(&app);
        assert_eq!(engine.batch_size, 1);
        assert_eq!(engine.max_users, 100);
        assert!(!engine.dedupe_jobs);
        assert_eq!(engine.inactive_reps, vec!["ajtaft".to_string()]);
        assert!(engine.reference_date.is_none());
    }

    #[test]
    fn base_url_validation() {
        let mut crm = CrmConfig::default();
        assert!(crm.base_url().is_ok());

        crm.base_url = "ftp://example.com".into();
        assert!(crm.base_url().is_err());

        crm.base_url = "not a url".into();
        assert!(crm.base_url().is_err());
    }

    #[test]
    fn api_key_resolution() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.crm.api_key_env = "SC_TEST_NONEXISTENT_KEY_12345".into();
        let result = resolve_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
