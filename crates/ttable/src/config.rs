//! Table configuration
//!
//! Loaded from TOML. Every field has a default, so an empty document is a
//! valid configuration:
//!
//! ```toml
//! hash_mb = 256
//! threads = 8
//!
//! [replacement]
//! depth_slack = 4
//! decay_threshold = 5
//! age_weight = 2
//! ```

use crate::error::TtError;
use crate::pool::{ThreadPool, WorkerPool};
use crate::tt::{ReplacementParams, TranspositionTable};
use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Size, clear parallelism and replacement tuning of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtConfig {
    /// Table size in megabytes
    pub hash_mb: usize,
    /// Workers used by the parallel clear
    pub threads: usize,
    pub replacement: ReplacementParams,
}

impl Default for TtConfig {
    fn default() -> Self {
        Self {
            hash_mb: 16,
            threads: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            replacement: ReplacementParams::default(),
        }
    }
}

impl TtConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: TtConfig = toml::from_str(s).context("failed to parse TT config")?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read TT config {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.hash_mb >= 1, "hash_mb must be at least 1, got {}", self.hash_mb);
        ensure!(self.threads >= 1, "threads must be at least 1, got {}", self.threads);
        self.replacement
            .validate()
            .context("invalid [replacement] section")?;
        Ok(())
    }

    /// Worker pool sized for the parallel clear
    pub fn build_pool(&self) -> ThreadPool {
        ThreadPool::new(self.threads)
    }

    /// Allocate and clear a table as configured
    pub fn build_table<P: WorkerPool + ?Sized>(
        &self,
        pool: &P,
    ) -> Result<TranspositionTable, TtError> {
        TranspositionTable::try_with_params(self.hash_mb, self.replacement, pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = TtConfig::from_toml_str("").unwrap();
        assert_eq!(config.hash_mb, 16);
        assert!(config.threads >= 1);
        assert_eq!(config.replacement, ReplacementParams::DEFAULT);
    }

    #[test]
    fn test_partial_replacement_section() {
        let config = TtConfig::from_toml_str(
            r#"
            hash_mb = 2
            threads = 3

            [replacement]
            age_weight = 1
            "#,
        )
        .unwrap();
        assert_eq!(config.hash_mb, 2);
        assert_eq!(config.threads, 3);
        assert_eq!(config.replacement.age_weight, 1);
        assert_eq!(config.replacement.depth_slack, 4);
        assert_eq!(config.replacement.decay_threshold, 5);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(TtConfig::from_toml_str("hash_mb = 0").is_err());
        assert!(TtConfig::from_toml_str("threads = 0").is_err());
        assert!(TtConfig::from_toml_str("[replacement]\nage_weight = -1").is_err());
        assert!(TtConfig::from_toml_str("hash_mb = \"big\"").is_err());
    }

    #[test]
    fn test_oversized_replacement_params_are_rejected() {
        let err = TtConfig::from_toml_str("hash_mb = 1\n[replacement]\nage_weight = 300000000")
            .unwrap_err();
        assert!(format!("{err:#}").contains("age_weight"));
        assert!(TtConfig::from_toml_str("[replacement]\ndepth_slack = 2147483647").is_err());
        assert!(TtConfig::from_toml_str("[replacement]\ndepth_slack = -255").is_ok());
    }

    #[test]
    fn test_missing_file_has_context() {
        let err = TtConfig::from_file("/nonexistent/tt.toml").unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/tt.toml"));
    }

    #[test]
    fn test_build_table_from_config() {
        let config = TtConfig::from_toml_str("hash_mb = 1\nthreads = 2").unwrap();
        let pool = config.build_pool();
        let tt = config.build_table(&pool).unwrap();
        assert_eq!(tt.size_bytes(), 1024 * 1024);
        assert_eq!(pool.num_threads(), 2);
    }

    #[test]
    fn test_round_trips_through_toml() {
        let config = TtConfig {
            hash_mb: 64,
            threads: 4,
            replacement: ReplacementParams {
                depth_slack: 3,
                decay_threshold: 6,
                age_weight: 1,
            },
        };
        let text = toml::to_string(&config).unwrap();
        assert_eq!(TtConfig::from_toml_str(&text).unwrap(), config);
    }
}
