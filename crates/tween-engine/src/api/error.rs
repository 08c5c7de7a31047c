use thiserror::Error;

/// Failures while building or configuring a scheduler.
///
/// Ticking never fails: timing math is clamped and invalid handles are
/// resolved by eviction, so only construction returns these.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("failed to build batch worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("failed to parse scheduler config: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("invalid scheduler config: {0}")]
    InvalidConfig(String),
}
