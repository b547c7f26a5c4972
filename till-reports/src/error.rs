use thiserror::Error;
use till_ledger::{ErrorKind, LedgerError};

pub type ReportResult<T> = Result<T, ReportError>;

/// Errors raised while aggregating ledger data.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("invalid window: {0}")]
    InvalidWindow(String),
    #[error("{0} overflows")]
    Overflow(&'static str),
}

impl ReportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReportError::Ledger(err) => err.kind(),
            ReportError::InvalidWindow(_) | ReportError::Overflow(_) => ErrorKind::ValidationFailed,
        }
    }
}
