use cf_core::CoreError;
use cf_core::ErrorKind;
use std::fmt;

/// A [`CoreError`] surfaced across the `GetMove`/`AnalyseBoards` boundary,
/// carrying the correlation id of the span it failed under.
#[derive(Clone, Debug)]
pub struct RequestError {
    pub kind: ErrorKind,
    pub message: String,
    pub correlation_id: uuid::Uuid,
}

impl RequestError {
    pub(crate) fn new(error: CoreError, correlation_id: uuid::Uuid) -> Self {
        Self { kind: error.kind(), message: error.to_string(), correlation_id }
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (correlation_id={})", self.message, self.correlation_id)
    }
}

impl std::error::Error for RequestError {}
