use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can stop a shipping run.
///
/// Slowlog read problems are deliberately absent: the reader degrades to
/// whatever it managed to fetch instead of failing the run.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Missing or unrecognisable cache host. Raised before any network call.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The cache could not be reached within the configured timeout.
    #[error("cannot reach cache at {endpoint}: {detail}")]
    Connectivity { endpoint: String, detail: String },

    /// The metrics backend did not answer a query with an `ok` status.
    #[error("metrics query `{query}` failed: {detail}")]
    BackendQuery { query: String, detail: String },

    /// The metrics backend rejected a point submission.
    #[error("submitting {metric} for {replication_group} failed: {detail}")]
    BackendSubmit {
        metric: String,
        replication_group: String,
        detail: String,
    },

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
