use thiserror::Error;

use wmring::RingError;

pub type ScenarioResult<T> = Result<T, ScenarioError>;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("ring error: {0}")]
    Ring(#[from] RingError),

    #[error("invalid scenario configuration: {0}")]
    InvalidConfig(String),

    #[error("corrupt frame at offset {offset}: {reason}")]
    Corrupt { offset: usize, reason: &'static str },

    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),
}

impl ScenarioError {
    pub fn config(msg: impl Into<String>) -> Self {
        ScenarioError::InvalidConfig(msg.into())
    }
}
