use crate::types::{DedupStrategy, ExternalResearchStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
    #[error("invalid configuration: {0}")]
    ValidationError(String),
}

/// Per-model cost rates used by the Provider Gateway's cost accounting
/// (§4.A): `cost_usd = input_tokens/1000 * in_rate + output_tokens/1000 * out_rate`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelRates {
    pub in_rate_per_1k: f64,
    pub out_rate_per_1k: f64,
}

/// Per-provider circuit breaker tuning (§4.A).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub window_secs: u64,
    pub recovery_timeout_secs: u64,
    pub half_open_probe_count: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            window_secs: 60,
            recovery_timeout_secs: 60,
            half_open_probe_count: 3,
        }
    }
}

/// Per-provider retry/timeout tuning (§4.A, §5).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProviderTuning {
    pub max_retries: u32,
    pub read_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for ProviderTuning {
    fn default() -> Self {
        Self {
            max_retries: 3,
            read_timeout_secs: 30,
            connect_timeout_secs: 5,
        }
    }
}

/// Recognized configuration options, closed enumeration (§6 Configuration).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    #[serde(default = "default_true")]
    pub parallel_section_generation: bool,
    #[serde(default = "default_section_batch_size")]
    pub section_generation_batch_size: usize,
    #[serde(default = "default_embedding_dim")]
    pub embedding_dimensionality: usize,
    #[serde(default)]
    pub dedup_strategy: DedupStrategyConfig,
    #[serde(default = "default_dedup_threshold")]
    pub dedup_threshold: f32,
    /// Stage-3/4 source dedup threshold (0.85 per §4.C); kept distinct from
    /// §4.J's chapter-dedup threshold, per the Open Question in §9.
    #[serde(default = "default_chapter_dedup_threshold")]
    pub chapter_dedup_threshold: f32,
    #[serde(default = "default_true")]
    pub ai_relevance_filter_enabled: bool,
    #[serde(default = "default_relevance_threshold")]
    pub ai_relevance_threshold: f32,
    #[serde(default)]
    pub external_research_strategy: ExternalResearchStrategyConfig,
    #[serde(default = "default_true")]
    pub external_research_parallel: bool,
    #[serde(default = "default_true")]
    pub auto_gap_analysis_enabled: bool,
    #[serde(default)]
    pub halt_on_critical_gaps: bool,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
    #[serde(default)]
    pub provider_tuning: ProviderTuning,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Task checkpoint retention window (§3 Lifecycle: "reaped after a
    /// retention window"); defaults to 7 days.
    #[serde(default = "default_checkpoint_ttl_secs")]
    pub checkpoint_ttl_secs: u64,
    #[serde(default = "default_internal_query_parallelism")]
    pub internal_query_parallelism: usize,
    #[serde(default)]
    pub model_rates: HashMap<String, ModelRates>,
}

/// Serde-friendly mirror of `DedupStrategy` so the wire/TOML shape matches
/// the closed set in §6 without requiring a custom serde impl on the core type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupStrategyConfig {
    Exact,
    Fuzzy,
    Semantic,
}

impl Default for DedupStrategyConfig {
    fn default() -> Self {
        DedupStrategyConfig::Fuzzy
    }
}

impl From<DedupStrategyConfig> for DedupStrategy {
    fn from(c: DedupStrategyConfig) -> Self {
        match c {
            DedupStrategyConfig::Exact => DedupStrategy::Exact,
            DedupStrategyConfig::Fuzzy => DedupStrategy::Fuzzy,
            DedupStrategyConfig::Semantic => DedupStrategy::Semantic,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalResearchStrategyConfig {
    EvidenceOnly,
    AiOnly,
    Hybrid,
}

impl Default for ExternalResearchStrategyConfig {
    fn default() -> Self {
        ExternalResearchStrategyConfig::Hybrid
    }
}

impl From<ExternalResearchStrategyConfig> for ExternalResearchStrategy {
    fn from(c: ExternalResearchStrategyConfig) -> Self {
        match c {
            ExternalResearchStrategyConfig::EvidenceOnly => ExternalResearchStrategy::EvidenceOnly,
            ExternalResearchStrategyConfig::AiOnly => ExternalResearchStrategy::AiOnly,
            ExternalResearchStrategyConfig::Hybrid => ExternalResearchStrategy::Hybrid,
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_section_batch_size() -> usize {
    5
}
fn default_embedding_dim() -> usize {
    1536
}
fn default_dedup_threshold() -> f32 {
    0.85
}
fn default_chapter_dedup_threshold() -> f32 {
    0.95
}
fn default_relevance_threshold() -> f32 {
    0.75
}
fn default_cache_ttl_secs() -> u64 {
    24 * 3600
}
fn default_checkpoint_ttl_secs() -> u64 {
    7 * 24 * 3600
}
fn default_internal_query_parallelism() -> usize {
    5
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        let mut model_rates = HashMap::new();
        model_rates.insert(
            "claude-3-5-sonnet-20241022".to_string(),
            ModelRates { in_rate_per_1k: 0.003, out_rate_per_1k: 0.015 },
        );
        model_rates.insert(
            "gpt-4o".to_string(),
            ModelRates { in_rate_per_1k: 0.0025, out_rate_per_1k: 0.010 },
        );
        model_rates.insert(
            "text-embedding-3-large".to_string(),
            ModelRates { in_rate_per_1k: 0.00013, out_rate_per_1k: 0.0 },
        );

        Self {
            parallel_section_generation: true,
            section_generation_batch_size: default_section_batch_size(),
            embedding_dimensionality: default_embedding_dim(),
            dedup_strategy: DedupStrategyConfig::default(),
            dedup_threshold: default_dedup_threshold(),
            chapter_dedup_threshold: default_chapter_dedup_threshold(),
            ai_relevance_filter_enabled: true,
            ai_relevance_threshold: default_relevance_threshold(),
            external_research_strategy: ExternalResearchStrategyConfig::default(),
            external_research_parallel: true,
            auto_gap_analysis_enabled: true,
            halt_on_critical_gaps: false,
            circuit_breaker: CircuitBreakerConfig::default(),
            provider_tuning: ProviderTuning::default(),
            cache_ttl_secs: default_cache_ttl_secs(),
            checkpoint_ttl_secs: default_checkpoint_ttl_secs(),
            internal_query_parallelism: default_internal_query_parallelism(),
            model_rates,
        }
    }
}

impl SynthesisConfig {
    /// Layers configuration: defaults, then an optional TOML file, then
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) if p.exists() => Self::read_toml_file(p)?,
            _ => {
                info!("no synthesis config file found, using defaults");
                Self::default()
            }
        };

        if let Ok(batch) = std::env::var("SYNTH_SECTION_BATCH_SIZE") {
            if let Ok(n) = batch.parse() {
                config.section_generation_batch_size = n;
            } else {
                warn!("ignoring invalid SYNTH_SECTION_BATCH_SIZE={}", batch);
            }
        }
        if let Ok(v) = std::env::var("SYNTH_HALT_ON_CRITICAL_GAPS") {
            config.halt_on_critical_gaps = v == "1" || v.eq_ignore_ascii_case("true");
        }

        Self::validate(&config)?;
        Ok(config)
    }

    fn read_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    fn validate(config: &SynthesisConfig) -> Result<(), ConfigError> {
        if config.section_generation_batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "section_generation_batch_size must be >= 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&config.dedup_threshold) {
            return Err(ConfigError::ValidationError(
                "dedup_threshold must be in [0,1]".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&config.ai_relevance_threshold) {
            return Err(ConfigError::ValidationError(
                "ai_relevance_threshold must be in [0,1]".to_string(),
            ));
        }
        Ok(())
    }

    pub fn write_default(path: &Path) -> Result<(), ConfigError> {
        let config = SynthesisConfig::default();
        let toml_str =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::ReadError(e.to_string()))?;
        }
        std::fs::write(path, toml_str).map_err(|e| ConfigError::ReadError(e.to_string()))
    }
}

pub fn default_config_search_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".synthesis").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SynthesisConfig::default();
        assert!(SynthesisConfig::validate(&config).is_ok());
        assert_eq!(config.section_generation_batch_size, 5);
        assert_eq!(config.dedup_threshold, 0.85);
        assert_eq!(config.chapter_dedup_threshold, 0.95);
    }

    #[test]
    fn rejects_bad_threshold() {
        let mut config = SynthesisConfig::default();
        config.dedup_threshold = 1.5;
        assert!(SynthesisConfig::validate(&config).is_err());
    }

    #[test]
    fn roundtrips_through_toml() {
        let config = SynthesisConfig::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        SynthesisConfig::write_default(&path).unwrap();
        let loaded = SynthesisConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded.section_generation_batch_size, config.section_generation_batch_size);
    }
}
