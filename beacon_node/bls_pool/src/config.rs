use crate::Error;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Large submissions are split into jobs of at most this many signature sets so that they can be
/// spread across workers.
pub const DEFAULT_MAX_SIGNATURE_SETS_PER_JOB: usize = 128;

/// A worker takes jobs from the queue until it holds this many signature sets.
pub const DEFAULT_MAX_BATCH_SIGS: usize = 128;

/// Buffered batchable jobs are released early once they hold more than this many sets.
pub const DEFAULT_MAX_BUFFERED_SIGS: usize = 32;

/// Buffered batchable jobs are released after this long, even if the buffer is not full.
pub const DEFAULT_MAX_BUFFER_WAIT_MS: u64 = 100;

/// New submissions are rejected once this many jobs are waiting.
pub const DEFAULT_MAX_QUEUED_JOBS: usize = 512;

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of worker threads, which is also the maximum number of batches in flight.
    pub pool_size: usize,
    pub max_signature_sets_per_job: usize,
    pub max_batch_sigs: usize,
    pub max_buffered_sigs: usize,
    pub max_buffer_wait_ms: u64,
    pub max_queued_jobs: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Leave one core for the thread that submits work.
            pool_size: num_cpus::get().saturating_sub(1).max(1),
            max_signature_sets_per_job: DEFAULT_MAX_SIGNATURE_SETS_PER_JOB,
            max_batch_sigs: DEFAULT_MAX_BATCH_SIGS,
            max_buffered_sigs: DEFAULT_MAX_BUFFERED_SIGS,
            max_buffer_wait_ms: DEFAULT_MAX_BUFFER_WAIT_MS,
            max_queued_jobs: DEFAULT_MAX_QUEUED_JOBS,
        }
    }
}

impl Config {
    /// Parses a YAML document. Missing fields take their default values.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, Error> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        for (name, value) in [
            ("pool_size", self.pool_size),
            ("max_signature_sets_per_job", self.max_signature_sets_per_job),
            ("max_batch_sigs", self.max_batch_sigs),
            ("max_queued_jobs", self.max_queued_jobs),
        ] {
            if value == 0 {
                return Err(Error::InvalidConfig(format!("{name} must be non-zero")));
            }
        }
        Ok(())
    }

    pub fn max_buffer_wait(&self) -> Duration {
        Duration::from_millis(self.max_buffer_wait_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();

        assert!(config.pool_size >= 1);
        assert_eq!(config.max_buffer_wait(), Duration::from_millis(100));
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn yaml_fills_missing_fields_with_defaults() {
        let config = Config::from_yaml_str("pool_size: 3\nmax_buffered_sigs: 8\n").unwrap();

        assert_eq!(
            config,
            Config {
                pool_size: 3,
                max_buffered_sigs: 8,
                ..Config::default()
            }
        );
    }

    #[test]
    fn invalid_yaml_is_rejected() {
        assert!(matches!(
            Config::from_yaml_str("pool_size: 0"),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            Config::from_yaml_str("pool_size: [1, 2]"),
            Err(Error::InvalidConfig(_))
        ));
    }
}
