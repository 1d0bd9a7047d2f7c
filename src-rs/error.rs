use thiserror::Error;

/// Errors surfaced by the queue to its callers.
///
/// Worker failures never reach the submitter as an `Err`; they are recorded on
/// the task itself and the sequencer moves on.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("{0}")]
    Validation(String),
    #[error("task not found: {0}")]
    NotFound(String),
    #[error("queue is full ({capacity} tasks waiting)")]
    QueueFull { capacity: usize },
    #[error("server is shutting down")]
    ShuttingDown,
    #[error("{0}")]
    Process(String),
}

impl QueueError {
    pub fn validation(message: impl Into<String>) -> Self {
        QueueError::Validation(message.into())
    }
}
