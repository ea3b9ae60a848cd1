//! Pipeline configuration (§6 External Interfaces).
//!
//! Mirrors the shape of `production_etl_pipeline.py::ETLConfig`, loaded from
//! YAML the way `tic_mrf_scraper/__main__.py` loads `config.yaml` via
//! `yaml.safe_load`, here via `serde_yaml`.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub payer_endpoints: HashMap<String, String>,
    pub cpt_whitelist: Vec<String>,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_parallel_workers")]
    pub parallel_workers: usize,
    pub max_files_per_payer: Option<usize>,
    pub max_records_per_file: Option<usize>,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default = "default_processing_version")]
    pub processing_version: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_local_dir")]
    pub local_dir: String,
    pub remote_bucket: Option<String>,
    #[serde(default = "default_remote_prefix")]
    pub remote_prefix: String,
}

fn default_batch_size() -> usize {
    10_000
}
fn default_parallel_workers() -> usize {
    4
}
fn default_schema_version() -> String {
    "v1.0.0".to_string()
}
fn default_processing_version() -> String {
    "tic-mrf-pipeline-v1".to_string()
}
fn default_local_dir() -> String {
    "data".to_string()
}
fn default_remote_prefix() -> String {
    "healthcare-rates".to_string()
}

impl Config {
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let mut config: Config = serde_yaml::from_str(s)?;
        if let Ok(bucket) = std::env::var("TIC_MRF_SINK_BUCKET") {
            config.output.remote_bucket = Some(bucket);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.payer_endpoints.is_empty() {
            return Err(ConfigError::Invalid("payer_endpoints must not be empty".to_string()));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be greater than zero".to_string()));
        }
        if self.parallel_workers == 0 {
            return Err(ConfigError::Invalid("parallel_workers must be greater than zero".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config_with_defaults() {
        let yaml = r#"
payer_endpoints:
  centene_fidelis: https://example.com/index.json
cpt_whitelist:
  - "99213"
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.batch_size, 10_000);
        assert_eq!(config.parallel_workers, 4);
        assert_eq!(config.output.local_dir, "data");
    }

    #[test]
    fn rejects_empty_payer_endpoints() {
        let yaml = r#"
payer_endpoints: {}
cpt_whitelist: []
"#;
        assert!(matches!(Config::from_yaml_str(yaml), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn env_override_sets_remote_bucket() {
        std::env::set_var("TIC_MRF_SINK_BUCKET", "my-test-bucket");
        let yaml = r#"
payer_endpoints:
  aetna: https://example.com/index.json
cpt_whitelist: []
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.output.remote_bucket.as_deref(), Some("my-test-bucket"));
        std::env::remove_var("TIC_MRF_SINK_BUCKET");
    }
}
