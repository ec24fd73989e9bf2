//! Client configuration types.
//!
//! The CLI reads and writes `marketlens.toml` using these types. Path
//! resolution (`$HOME/.config/marketlens`) lives in the CLI crate; this crate
//! only knows the file format and its compatibility fallbacks.

use marketlens_core::{Budget, LlmConfigs};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Canonical config file name.
pub const CONFIG_FILE_NAME: &str = "marketlens.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Top-level client configuration (persisted as `marketlens.toml`).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ClientConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub workflow: WorkflowSettings,
    #[serde(default)]
    pub display: DisplaySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSettings {
    #[serde(default = "default_server_url")]
    pub url: String,
    /// Applies to REST calls; the event stream has no total timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowSettings {
    #[serde(default)]
    pub budget: Budget,
    #[serde(default = "default_researcher_credits")]
    pub researcher_credits: u32,
    #[serde(default = "default_market_credits")]
    pub market_credits: u32,
    #[serde(default)]
    pub coder_credits: u32,
    #[serde(default = "default_browser_credits")]
    pub browser_credits: u32,
    #[serde(default = "default_recursion_limit")]
    pub recursion_limit: u32,
    #[serde(default)]
    pub llm: LlmConfigs,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            budget: Budget::Low,
            researcher_credits: default_researcher_credits(),
            market_credits: default_market_credits(),
            coder_credits: 0,
            browser_credits: default_browser_credits(),
            recursion_limit: default_recursion_limit(),
            llm: LlmConfigs::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisplaySettings {
    /// Print plan-step containers expanded instead of collapsed.
    #[serde(default)]
    pub expand_plan_steps: bool,
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            expand_plan_steps: false,
            recent_limit: default_recent_limit(),
        }
    }
}

// ── Serde default functions ─────────────────────────────────────────────

fn default_server_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_researcher_credits() -> u32 {
    6
}
fn default_market_credits() -> u32 {
    6
}
fn default_browser_credits() -> u32 {
    3
}
fn default_recursion_limit() -> u32 {
    150
}
fn default_recent_limit() -> usize {
    5
}

/// Apply compatibility fallbacks after loading raw TOML.
/// Returns true when any field was updated.
pub fn apply_compat_fallbacks(config: &mut ClientConfig) -> bool {
    let mut changed = false;

    if config.workflow.budget == Budget::Unknown {
        config.workflow.budget = Budget::Low;
        changed = true;
    }

    // A half-filled LLM table is worse than none: reset every role.
    if !config.workflow.llm.is_complete() {
        config.workflow.llm = LlmConfigs::default();
        changed = true;
    }

    if config.workflow.llm.normalize_providers() {
        changed = true;
    }

    let trimmed = config.server.url.trim().trim_end_matches('/');
    if trimmed != config.server.url {
        config.server.url = trimmed.to_string();
        changed = true;
    }
    if config.server.url.is_empty() {
        config.server.url = default_server_url();
        changed = true;
    }

    changed
}

/// Load a config file. A missing file yields defaults.
pub fn load_from_path(path: &Path) -> Result<ClientConfig, ConfigError> {
    if !path.exists() {
        return Ok(ClientConfig::default());
    }
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config: ClientConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    apply_compat_fallbacks(&mut config);
    Ok(config)
}

/// Write a config file, creating parent directories as needed.
pub fn save_to_path(path: &Path, config: &ClientConfig) -> Result<(), ConfigError> {
    let encoded = toml::to_string_pretty(config)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, encoded).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_stable() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.server.url, "http://localhost:8000");
        assert_eq!(cfg.server.timeout_secs, 30);
        assert_eq!(cfg.workflow.budget, Budget::Low);
        assert_eq!(
            (
                cfg.workflow.researcher_credits,
                cfg.workflow.market_credits,
                cfg.workflow.coder_credits,
                cfg.workflow.browser_credits
            ),
            (6, 6, 0, 3)
        );
        assert_eq!(cfg.workflow.recursion_limit, 150);
        assert!(!cfg.display.expand_plan_steps);
        assert_eq!(cfg.display.recent_limit, 5);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let cfg: ClientConfig = toml::from_str(
            r#"
[server]
url = "https://research.example.com"

[workflow]
budget = "high"
"#,
        )
        .expect("parse toml");

        assert_eq!(cfg.server.url, "https://research.example.com");
        assert_eq!(cfg.server.timeout_secs, 30);
        assert_eq!(cfg.workflow.budget, Budget::High);
        assert_eq!(cfg.workflow.llm, LlmConfigs::default());
    }

    #[test]
    fn apply_compat_fallbacks_repairs_bad_values() {
        let mut cfg: ClientConfig = toml::from_str(
            r#"
[server]
url = "http://localhost:9000/"

[workflow]
budget = "unlimited"

[workflow.llm.basic]
model = "gpt-4.1"
provider = "openai"
"#,
        )
        .expect("parse toml");
        assert_eq!(cfg.workflow.budget, Budget::Unknown);

        let changed = apply_compat_fallbacks(&mut cfg);
        assert!(changed);
        assert_eq!(cfg.workflow.budget, Budget::Low);
        assert_eq!(cfg.workflow.llm, LlmConfigs::default());
        assert_eq!(cfg.server.url, "http://localhost:9000");
    }

    #[test]
    fn apply_compat_fallbacks_upper_cases_providers() {
        let mut cfg = ClientConfig::default();
        cfg.workflow.llm.economic.provider = "gemini".to_string();
        assert!(apply_compat_fallbacks(&mut cfg));
        assert_eq!(cfg.workflow.llm.economic.provider, "GEMINI");
        assert_eq!(cfg.workflow.llm.economic.model, "gpt-4.1-mini");
    }

    #[test]
    fn apply_compat_fallbacks_is_noop_for_modern_values() {
        let mut cfg = ClientConfig::default();
        let before = cfg.clone();
        assert!(!apply_compat_fallbacks(&mut cfg));
        assert_eq!(cfg, before);
    }

    #[test]
    fn save_then_load_preserves_settings() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let mut cfg = ClientConfig::default();
        cfg.workflow.budget = Budget::Medium;
        cfg.display.expand_plan_steps = true;
        save_to_path(&path, &cfg).expect("save");

        let encoded = std::fs::read_to_string(&path).expect("read back");
        assert!(encoded.contains("[workflow.llm.reasoning]"));

        let loaded = load_from_path(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn missing_file_loads_defaults_and_garbage_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        assert_eq!(load_from_path(&path).expect("load"), ClientConfig::default());

        std::fs::write(&path, "[server\nurl=").expect("write");
        assert!(matches!(
            load_from_path(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
