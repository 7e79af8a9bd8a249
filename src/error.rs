use thiserror::Error;

use crate::runner::Step;

/// The one failure kind of a run. Any rejection from the database ends the sequence;
/// the cause is carried as-is, without further classification.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("{step} failed: {source}")]
    DatabaseOperationFailed {
        step: Step,
        #[source]
        source: anyhow::Error,
    },
    #[error("Failed to write the report: {0}")]
    Output(#[from] std::io::Error),
}

impl RunnerError {
    pub fn step(&self) -> Option<Step> {
        match self {
            RunnerError::DatabaseOperationFailed { step, .. } => Some(*step),
            RunnerError::Output(_) => None,
        }
    }
}

/// Wrap a store error as the failure of `step`, for use with `map_err`.
pub fn failed(step: Step) -> impl FnOnce(anyhow::Error) -> RunnerError {
    move |source| RunnerError::DatabaseOperationFailed { step, source }
}
