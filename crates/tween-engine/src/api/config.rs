use serde::{Deserialize, Serialize};

use crate::api::error::SchedulerError;

/// Configuration for a [`Scheduler`](crate::core::scheduler::Scheduler).
/// Loaded from JSON or built in code; every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Worker threads for the position batch. 0 lets rayon pick (one per core).
    pub worker_threads: usize,
    /// Minimum rows a single worker processes before the batch is split further.
    pub min_rows_per_job: usize,
    /// Rows reserved up front in the batch columns (default: 64).
    pub initial_batch_capacity: usize,
    /// Fixed physics timestep in seconds (default: 1/50).
    pub fixed_dt: f32,
    /// Cap on fixed steps run per frame, to avoid a spiral of death.
    pub max_fixed_steps: u32,
    /// Initial multiplier applied to the scaled clock.
    pub time_scale: f32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            min_rows_per_job: 64,
            initial_batch_capacity: 64,
            fixed_dt: 1.0 / 50.0,
            max_fixed_steps: 10,
            time_scale: 1.0,
        }
    }
}

impl SchedulerConfig {
    /// Parse a config from a JSON string and validate it.
    pub fn from_json(json: &str) -> Result<Self, SchedulerError> {
        let config: SchedulerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SchedulerError> {
        if !(self.fixed_dt.is_finite() && self.fixed_dt > 0.0) {
            return Err(SchedulerError::InvalidConfig(format!(
                "fixed_dt must be positive, got {}",
                self.fixed_dt
            )));
        }
        if !(self.time_scale.is_finite() && self.time_scale >= 0.0) {
            return Err(SchedulerError::InvalidConfig(format!(
                "time_scale must be non-negative, got {}",
                self.time_scale
            )));
        }
        if self.max_fixed_steps == 0 {
            return Err(SchedulerError::InvalidConfig(
                "max_fixed_steps must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_partial_config_keeps_defaults() {
        let json = r#"{ "worker_threads": 2, "fixed_dt": 0.01 }"#;
        let config = SchedulerConfig::from_json(json).unwrap();
        assert_eq!(config.worker_threads, 2);
        assert_eq!(config.fixed_dt, 0.01);
        assert_eq!(config.min_rows_per_job, 64);
        assert_eq!(config.time_scale, 1.0);
    }

    #[test]
    fn rejects_non_positive_fixed_dt() {
        let err = SchedulerConfig::from_json(r#"{ "fixed_dt": 0.0 }"#).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = SchedulerConfig::from_json("{ worker_threads: }").unwrap_err();
        assert!(matches!(err, SchedulerError::ConfigParse(_)));
    }

    #[test]
    fn default_config_is_valid() {
        assert!(SchedulerConfig::default().validate().is_ok());
    }
}
