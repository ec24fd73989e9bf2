use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Research budget tier; the server scales agent credits and model choice by it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Budget {
    #[default]
    Low,
    Medium,
    High,
    /// Unknown values are normalized by config fallbacks.
    #[serde(other)]
    Unknown,
}

impl Budget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Budget {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown budget '{other}' (expected low, medium or high)")),
        }
    }
}

/// Model/provider pair for one LLM role.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelConfig {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub provider: String,
}

impl ModelConfig {
    pub fn new(model: &str, provider: &str) -> Self {
        Self {
            model: model.to_string(),
            provider: provider.to_string(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.model.trim().is_empty() && !self.provider.trim().is_empty()
    }
}

/// LLM role assignments used by the workflow.
///
/// A role missing from the input decodes as an empty (incomplete) entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LlmConfigs {
    #[serde(default)]
    pub reasoning: ModelConfig,
    #[serde(default)]
    pub basic: ModelConfig,
    #[serde(default)]
    pub coding: ModelConfig,
    #[serde(default)]
    pub economic: ModelConfig,
}

impl Default for LlmConfigs {
    fn default() -> Self {
        Self {
            reasoning: ModelConfig::new("gemini-2.5-pro-preview-05-06", "GEMINI"),
            basic: ModelConfig::new("gpt-4.1", "OPENAI"),
            coding: ModelConfig::new("gemini-2.5-pro-preview-05-06", "GEMINI"),
            economic: ModelConfig::new("gpt-4.1-mini", "OPENAI"),
        }
    }
}

impl LlmConfigs {
    pub const ROLES: [&'static str; 4] = ["reasoning", "basic", "coding", "economic"];

    pub fn is_complete(&self) -> bool {
        [&self.reasoning, &self.basic, &self.coding, &self.economic]
            .iter()
            .all(|cfg| cfg.is_complete())
    }

    pub fn role_mut(&mut self, role: &str) -> Option<&mut ModelConfig> {
        match role.trim().to_ascii_lowercase().as_str() {
            "reasoning" => Some(&mut self.reasoning),
            "basic" => Some(&mut self.basic),
            "coding" => Some(&mut self.coding),
            "economic" => Some(&mut self.economic),
            _ => None,
        }
    }

    /// Providers are sent upper-cased.
    pub fn normalize_providers(&mut self) -> bool {
        let mut changed = false;
        for cfg in [
            &mut self.reasoning,
            &mut self.basic,
            &mut self.coding,
            &mut self.economic,
        ] {
            let upper = cfg.provider.trim().to_ascii_uppercase();
            if upper != cfg.provider {
                cfg.provider = upper;
                changed = true;
            }
        }
        changed
    }
}
