use thiserror::Error;

#[derive(Debug, Error)]
pub enum HookError {
    /// A handler could not complete the event in time — callers must still
    /// return a usable (if empty) result rather than propagate this.
    #[error("hook timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Raised only by handler implementations that choose to surface an
    /// internal failure instead of degrading gracefully; the engine never
    /// lets this escape a turn-path call (see §7 error handling policy).
    #[error("hook execution failed: {0}")]
    ExecutionFailed(String),
}

pub type Result<T> = std::result::Result<T, HookError>;
