use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::store::ResultsStore;

/// Failure reported by the annotation service boundary.
#[derive(Debug, Error)]
pub enum AnnotateError {
    /// Transient; the caller should back off and send the same request again.
    #[error("rate limited: {0}")]
    RateLimited(String),
    /// Anything else (auth, malformed request, server fault). Not retried.
    #[error("annotation service error: {0}")]
    Service(String),
}

impl AnnotateError {
    pub fn is_rate_limited(&self) -> bool { matches!(self, AnnotateError::RateLimited(_)) }
}

/// Failure to read or write the results store.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("results store not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("results store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("results store {} does not hold a JSON object", .0.display())]
    Corrupt(PathBuf),
}

impl PersistError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        PersistError::Io { path: path.into(), source }
    }
}

/// Why a driver run stopped early.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("annotation of item '{id}' failed: {source}")]
    Service {
        id: String,
        #[source]
        source: AnnotateError,
    },
    #[error("gave up on item '{id}' after {attempts} rate-limited attempts")]
    RetriesExhausted { id: String, attempts: u32 },
    #[error(transparent)]
    Persistence(#[from] PersistError),
}

/// Fatal end of a run, together with everything collected before it.
///
/// For service failures `results` equals the last persisted snapshot.
#[derive(Debug, Error)]
#[error("annotation run aborted with {} results collected: {kind}", .results.len())]
pub struct RunError {
    pub kind: DriverError,
    pub results: ResultsStore,
}

impl RunError {
    pub fn new(kind: impl Into<DriverError>, results: ResultsStore) -> Self {
        Self { kind: kind.into(), results }
    }
}
