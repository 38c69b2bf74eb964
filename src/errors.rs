use thiserror::Error;

/// Errors surfaced by the index store, query engine and task manager.
///
/// Propagation policy: transport errors propagate unchanged, data-corruption
/// errors are wrapped with the offending id, invalid-input errors are
/// returned synchronously from the control-plane API, and user-task errors
/// never unwind the caller — they are recorded on the task's stats instead
/// of surfacing here (see `task::TaskInfo::last_error`).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("redis transport error: {0}")]
    Transport(#[from] anyhow::Error),

    #[error("data corruption: {0}")]
    DataCorruption(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("task `{task}` failed: {source}")]
    UserTask {
        task: String,
        #[source]
        source: anyhow::Error,
    },
}

pub type CoreResult<T> = Result<T, CoreError>;

pub fn invalid_input(msg: impl Into<String>) -> CoreError {
    CoreError::InvalidInput(msg.into())
}
