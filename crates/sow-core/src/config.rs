//! Configuration for scheme generation.
//!
//! Load order: `.sow/config.toml` → environment variables → defaults.

use crate::allocator::AllocationStrategy;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SowConfig {
    pub generation: GenerationConfig,
    pub allocation: AllocationConfig,
    pub pipeline: PipelineConfig,
    pub provider: ProviderConfig,
}

/// Generate → validate → retry loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Attempts per slot before the slot is reported as failed.
    pub max_attempts: usize,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Backend call timeout; an expired call counts as a failed attempt.
    pub timeout_secs: u64,
    /// Confidence of validated content is `min(base + attempt * step, max)`.
    pub base_confidence: f64,
    pub confidence_step: f64,
    pub max_confidence: f64,
}

/// Topic allocation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    pub strategy: AllocationStrategy,
}

/// Pipeline execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Slots resolved concurrently. 1 keeps the pipeline sequential.
    pub workers: usize,
}

/// Text-generation backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// "openai" or "endpoint".
    pub name: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            temperature: 0.3,
            max_tokens: 1200,
            timeout_secs: 30,
            base_confidence: 0.85,
            confidence_step: 0.03,
            max_confidence: 0.92,
        }
    }
}

impl GenerationConfig {
    /// Confidence assigned to content accepted on the given 1-based attempt.
    pub fn confidence_for_attempt(&self, attempt: usize) -> f64 {
        (self.base_confidence + attempt as f64 * self.confidence_step).min(self.max_confidence)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { workers: 1 }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: "openai".to_string(),
            model: None,
            base_url: None,
            api_key_env: "SOW_API_KEY".to_string(),
        }
    }
}

/// Helper to parse an env var and apply it to a config field.
fn env_override<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(v) = std::env::var(var)
        && let Ok(n) = v.parse()
    {
        *target = n;
    }
}

fn env_override_opt(var: &str, target: &mut Option<String>) {
    if let Ok(v) = std::env::var(var)
        && !v.trim().is_empty()
    {
        *target = Some(v);
    }
}

impl SowConfig {
    /// Load config from `.sow/config.toml` in the project root, with env var overrides.
    /// Falls back to defaults if no config file exists.
    pub fn load(project_root: &Path) -> Result<Self> {
        let config_path = project_root.join(".sow").join("config.toml");

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };

        // Environment variable overrides
        env_override("SOW_MAX_ATTEMPTS", &mut config.generation.max_attempts);
        env_override("SOW_TEMPERATURE", &mut config.generation.temperature);
        env_override("SOW_TIMEOUT_SECS", &mut config.generation.timeout_secs);
        env_override("SOW_WORKERS", &mut config.pipeline.workers);
        env_override("SOW_PROVIDER", &mut config.provider.name);
        env_override_opt("SOW_MODEL", &mut config.provider.model);
        env_override_opt("SOW_BASE_URL", &mut config.provider.base_url);

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let generation = &self.generation;
        if generation.max_attempts < 1 {
            anyhow::bail!("generation.max_attempts must be at least 1");
        }
        if self.pipeline.workers < 1 {
            anyhow::bail!("pipeline.workers must be at least 1");
        }
        if !(0.0..=2.0).contains(&generation.temperature) {
            anyhow::bail!(
                "generation.temperature ({}) must be between 0 and 2",
                generation.temperature
            );
        }
        if generation.base_confidence > generation.max_confidence
            || generation.max_confidence > 1.0
        {
            anyhow::bail!(
                "base_confidence ({}) must not exceed max_confidence ({}), which must not exceed 1.0",
                generation.base_confidence,
                generation.max_confidence,
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SowConfig::default();
        assert_eq!(config.generation.max_attempts, 3);
        assert_eq!(config.generation.timeout_secs, 30);
        assert_eq!(config.generation.temperature, 0.3);
        assert_eq!(config.allocation.strategy, AllocationStrategy::Rounded);
        assert_eq!(config.pipeline.workers, 1);
        assert_eq!(config.provider.name, "openai");
        assert_eq!(config.provider.api_key_env, "SOW_API_KEY");
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
[generation]
max_attempts = 5
timeout_secs = 10

[allocation]
strategy = "largest_remainder"

[provider]
name = "endpoint"
base_url = "https://example.invalid/generate"
"#;
        let config: SowConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.generation.max_attempts, 5);
        assert_eq!(config.generation.timeout_secs, 10);
        assert_eq!(
            config.allocation.strategy,
            AllocationStrategy::LargestRemainder
        );
        assert_eq!(config.provider.name, "endpoint");
        // Defaults for unspecified fields
        assert_eq!(config.generation.max_confidence, 0.92);
        assert_eq!(config.pipeline.workers, 1);
        assert_eq!(config.provider.api_key_env, "SOW_API_KEY");
    }

    #[test]
    fn test_confidence_for_attempt_is_capped() {
        let config = GenerationConfig::default();
        assert!((config.confidence_for_attempt(1) - 0.88).abs() < 1e-9);
        assert!((config.confidence_for_attempt(2) - 0.91).abs() < 1e-9);
        assert_eq!(config.confidence_for_attempt(3), 0.92);
        assert_eq!(config.confidence_for_attempt(10), 0.92);
    }

    #[test]
    fn test_config_load_nonexistent() {
        let config = SowConfig::load(Path::new("/nonexistent/path")).unwrap();
        assert_eq!(config.generation.max_attempts, 3);
    }

    #[test]
    fn test_load_rejects_zero_attempts() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join(".sow");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("config.toml"),
            "[generation]\nmax_attempts = 0\n",
        )
        .unwrap();

        let err = SowConfig::load(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("max_attempts"));
    }
}
