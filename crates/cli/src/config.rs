use anyhow::{Context, Result, bail};
use marketlens_api::{StreamConfig, WorkflowConfig};
use marketlens_api_client::ApiClient;
use marketlens_core::{Budget, LlmConfigs, ModelConfig};
use marketlens_runtime_config::{
    CONFIG_FILE_NAME, ClientConfig, apply_compat_fallbacks, load_from_path, save_to_path,
};
use std::path::PathBuf;
use std::time::Duration;

/// Get the config directory path (~/.config/marketlens/)
pub fn config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .context("Could not determine home directory")?;
    Ok(PathBuf::from(home).join(".config").join("marketlens"))
}

/// Canonical config file path.
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load config from disk, or defaults when no file exists yet.
pub fn load_config() -> Result<ClientConfig> {
    let path = config_path()?;
    load_from_path(&path).with_context(|| format!("Failed to load config at {}", path.display()))
}

pub fn save_config(config: &ClientConfig) -> Result<PathBuf> {
    let path = config_path()?;
    save_to_path(&path, config)
        .with_context(|| format!("Failed to save config at {}", path.display()))?;
    Ok(path)
}

/// Build an API client for the configured server.
pub fn api_client(config: &ClientConfig) -> Result<ApiClient> {
    ApiClient::new(
        &config.server.url,
        Duration::from_secs(config.server.timeout_secs),
    )
    .context("Failed to build HTTP client")
}

/// Build the per-run workflow configuration sent with a submission.
pub fn workflow_config(config: &ClientConfig, budget: Option<Budget>) -> WorkflowConfig {
    let workflow = &config.workflow;
    let mut llm = workflow.llm.clone();
    if !llm.is_complete() {
        llm = LlmConfigs::default();
    }
    llm.normalize_providers();
    WorkflowConfig {
        team_members: None,
        researcher_credits: workflow.researcher_credits,
        market_credits: workflow.market_credits,
        coder_credits: workflow.coder_credits,
        browser_credits: workflow.browser_credits,
        stream_config: StreamConfig {
            recursion_limit: workflow.recursion_limit,
        },
        budget: budget.unwrap_or(workflow.budget),
        llm_configs: Some(llm),
    }
}

/// Apply `ROLE=PROVIDER:MODEL`.
pub fn apply_model_override(config: &mut ClientConfig, spec: &str) -> Result<()> {
    let Some((role, target)) = spec.split_once('=') else {
        bail!("invalid model override '{spec}' (expected ROLE=PROVIDER:MODEL)");
    };
    let Some((provider, model)) = target.split_once(':') else {
        bail!("invalid model override '{spec}' (expected ROLE=PROVIDER:MODEL)");
    };
    let (provider, model) = (provider.trim(), model.trim());
    if provider.is_empty() || model.is_empty() {
        bail!("invalid model override '{spec}': provider and model must be non-empty");
    }
    let Some(slot) = config.workflow.llm.role_mut(role) else {
        bail!(
            "unknown LLM role '{}' (expected one of: {})",
            role.trim(),
            LlmConfigs::ROLES.join(", ")
        );
    };
    *slot = ModelConfig::new(model, &provider.to_ascii_uppercase());
    Ok(())
}

pub fn show_config() -> Result<()> {
    let path = config_path()?;
    let config = load_config()?;
    println!("Config file: {}", path.display());
    if !path.exists() {
        println!("(not created yet; showing defaults)");
    }
    println!();
    print!(
        "{}",
        toml::to_string_pretty(&config).context("Failed to render config")?
    );
    Ok(())
}

pub fn set_config(
    server: Option<String>,
    budget: Option<Budget>,
    models: Vec<String>,
    reset: bool,
) -> Result<()> {
    let mut config = if reset {
        ClientConfig::default()
    } else {
        load_config()?
    };

    if let Some(url) = server {
        let url = url.trim();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            bail!("server URL must start with http:// or https:// (got '{url}')");
        }
        config.server.url = url.to_string();
    }
    if let Some(budget) = budget {
        config.workflow.budget = budget;
    }
    for spec in &models {
        apply_model_override(&mut config, spec)?;
    }
    apply_compat_fallbacks(&mut config);

    let path = save_config(&config)?;
    println!("Config saved to {}", path.display());
    println!("  server: {}", config.server.url);
    println!("  budget: {}", config.workflow.budget);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_override_updates_one_role() {
        let mut config = ClientConfig::default();
        apply_model_override(&mut config, "coding=anthropic:claude-sonnet").expect("override");
        assert_eq!(
            config.workflow.llm.coding,
            ModelConfig::new("claude-sonnet", "ANTHROPIC")
        );
        assert_eq!(config.workflow.llm.basic, LlmConfigs::default().basic);
    }

    #[test]
    fn model_override_rejects_bad_specs() {
        let mut config = ClientConfig::default();
        assert!(apply_model_override(&mut config, "coding").is_err());
        assert!(apply_model_override(&mut config, "coding=openai").is_err());
        assert!(apply_model_override(&mut config, "coding=:gpt").is_err());
        let err = apply_model_override(&mut config, "writer=openai:gpt-4.1").expect_err("role");
        assert!(err.to_string().contains("reasoning, basic, coding, economic"));
    }

    #[test]
    fn workflow_config_carries_settings_and_override() {
        let mut config = ClientConfig::default();
        config.workflow.coder_credits = 2;
        config.workflow.recursion_limit = 80;
        config.workflow.llm.basic.provider = "openai".to_string();

        let workflow = workflow_config(&config, Some(Budget::High));
        assert_eq!(workflow.budget, Budget::High);
        assert_eq!(workflow.coder_credits, 2);
        assert_eq!(workflow.stream_config.recursion_limit, 80);
        let llm = workflow.llm_configs.expect("llm");
        assert_eq!(llm.basic.provider, "OPENAI");

        assert_eq!(workflow_config(&config, None).budget, Budget::Low);
    }
}
