use crate::direct::TieBreak;
use crate::error::RefineryError;
use crate::precision::PrecisionPolicy;
use crate::unifier::DedupKey;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    /// Per-pair skip / unrouted / tie-break records
    #[serde(default = "default_record_logs")]
    pub record_logs: bool,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub refinery: RefineryConfig,
}

fn default_record_logs() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PathsConfig {
    pub pairs: String,
    pub tickers: String,
    pub output_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            pairs: "fixtures/pairs.csv".to_string(),
            tickers: "fixtures/tickers.json".to_string(),
            output_dir: "output".to_string(),
        }
    }
}

/// Everything the refinery stages need, passed explicitly to each of them.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RefineryConfig {
    /// Settlement asset all equivalences are expressed against
    pub reference_currency: String,
    pub precision: PrecisionPolicy,
    /// Coverage below this percentage is reported as a data-quality warning
    pub coverage_warn_percent: f64,
    pub tie_break: TieBreak,
    pub dedup_key: DedupKey,
}

impl Default for RefineryConfig {
    fn default() -> Self {
        Self {
            reference_currency: "USDT".to_string(),
            precision: PrecisionPolicy::default(),
            coverage_warn_percent: 50.0,
            tie_break: TieBreak::default(),
            dedup_key: DedupKey::default(),
        }
    }
}

impl RefineryConfig {
    pub fn with_reference(reference: &str) -> Self {
        Self {
            reference_currency: reference.to_string(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), RefineryError> {
        if self.reference_currency.trim().is_empty() {
            return Err(RefineryError::Config(
                "reference_currency must not be empty".into(),
            ));
        }
        if self.reference_currency != self.reference_currency.trim().to_uppercase() {
            return Err(RefineryError::Config(format!(
                "reference_currency must be trimmed upper case, got '{}'",
                self.reference_currency
            )));
        }
        if !(0.0..=100.0).contains(&self.coverage_warn_percent) {
            return Err(RefineryError::Config(format!(
                "coverage_warn_percent must be within 0..=100, got {}",
                self.coverage_warn_percent
            )));
        }
        self.precision.validate().map_err(RefineryError::Config)
    }
}

impl AppConfig {
    /// Load `config/<env>.yaml`.
    pub fn load(env: &str) -> anyhow::Result<Self> {
        Self::load_from(format!("config/{}.yaml", env))
    }

    pub fn load_from(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::from_yaml_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> anyhow::Result<Self> {
        let config: AppConfig =
            serde_yaml::from_str(content).context("Failed to parse config yaml")?;
        config.refinery.validate()?;
        Ok(config)
    }
}
