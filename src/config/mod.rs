use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_non_negative, validate_positive_number, validate_url,
    Validate,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "multi-source-etl")]
#[command(about = "Aggregates paginated product data from multiple remote sources")]
pub struct CliConfig {
    #[arg(long, default_value = "config.json")]
    pub config: String,

    #[arg(long, default_value = "./output")]
    pub output_path: String,

    #[arg(long, default_value = "results.json")]
    pub output_file: String,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

/// Runtime knobs for the fetch-retry-aggregate pipeline. Every field carries
/// a default so a partial (or empty) config file still loads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub num_retries: u32,
    pub first_retry_delay_seconds: f64,
    pub retry_backoff_multiplier: f64,
    pub endpoint_delay_between_requests_seconds: f64,
    pub worker_thread_count: usize,
    pub timeout_seconds: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            num_retries: 3,
            first_retry_delay_seconds: 0.5,
            retry_backoff_multiplier: 2.0,
            endpoint_delay_between_requests_seconds: 0.1,
            worker_thread_count: 4,
            timeout_seconds: 10.0,
        }
    }
}

impl PipelineConfig {
    /// Geometric backoff: `first_delay * multiplier^retry_count`.
    pub fn backoff_delay(&self, retry_count: u32) -> Duration {
        let seconds =
            self.first_retry_delay_seconds * self.retry_backoff_multiplier.powi(retry_count as i32);
        Duration::from_secs_f64(seconds)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_secs_f64(self.endpoint_delay_between_requests_seconds)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_seconds)
    }
}

impl Validate for PipelineConfig {
    fn validate(&self) -> Result<()> {
        validate_positive_number("worker_thread_count", self.worker_thread_count, 1)?;
        validate_non_negative("first_retry_delay_seconds", self.first_retry_delay_seconds)?;
        validate_non_negative("retry_backoff_multiplier", self.retry_backoff_multiplier)?;
        validate_non_negative(
            "endpoint_delay_between_requests_seconds",
            self.endpoint_delay_between_requests_seconds,
        )?;
        validate_non_negative("timeout_seconds", self.timeout_seconds)?;
        Ok(())
    }
}

/// One configured upstream source. The endpoint is a template: `{skip}`,
/// `{limit}` and `{page}` placeholders are substituted per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub name: String,
    pub id_prefix: String,
    pub endpoint: String,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Dot path to the item array inside the response body,
    /// e.g. "products" or "data.items". Empty means the body is the array.
    #[serde(default)]
    pub items_path: String,

    /// Raw field renames applied before normalization, for sources whose
    /// records use different field names.
    #[serde(default)]
    pub field_aliases: HashMap<String, String>,
}

fn default_page_size() -> u32 {
    20
}

impl Validate for SourceDescriptor {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("name", &self.name)?;
        validate_non_empty_string("id_prefix", &self.id_prefix)?;
        validate_url("endpoint", &self.endpoint)?;
        validate_positive_number("page_size", self.page_size as usize, 1)?;
        Ok(())
    }
}

/// Root of the JSON config file: the pipeline options at the top level plus
/// the source list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(flatten)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub sources: Vec<SourceDescriptor>,
}

impl AppConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        Ok(config)
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.pipeline.validate()?;

        let mut prefixes = HashSet::new();
        for source in &self.sources {
            source.validate()?;
            // Distinct prefixes are what make ids globally unique.
            if !prefixes.insert(source.id_prefix.as_str()) {
                return Err(EtlError::ConfigError {
                    message: format!("duplicate id_prefix: {}", source.id_prefix),
                });
            }
        }
        Ok(())
    }
}
