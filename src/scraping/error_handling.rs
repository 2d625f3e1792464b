use thiserror::Error;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Failure taxonomy for the listing walk. Page-local problems (a retried
/// request running out of attempts) terminate only the current walk segment;
/// a missing required hidden field means the replayed form state would
/// desync from the server, so it aborts the run outright.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("request failed after {attempts} attempts: {method} {url}")]
    ExecutorExhausted {
        method: String,
        url: String,
        attempts: u32,
    },

    #[error("required hidden field '{field}' missing from page")]
    MissingViewState { field: String },
}
