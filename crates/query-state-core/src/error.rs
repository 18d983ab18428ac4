use thiserror::Error;

/// Errors raised by the core vocabulary types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QueryStateError {
    /// A history mode string was neither `push` nor `replace`.
    #[error("invalid history mode '{value}' (expected 'push' or 'replace')")]
    InvalidHistoryMode { value: String },
}

impl QueryStateError {
    pub fn invalid_history_mode(value: impl Into<String>) -> Self {
        Self::InvalidHistoryMode {
            value: value.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, QueryStateError>;
