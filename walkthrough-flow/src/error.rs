use thiserror::Error;

/// Boxed error raised by a task, kept intact so callers can downcast it.
pub type TaskError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error(transparent)]
    Task(TaskError),

    #[error("Context error: {0}")]
    ContextError(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

impl FlowError {
    /// Wrap any error raised inside a task.
    pub fn task<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        FlowError::Task(Box::new(err))
    }

    /// Borrow the task error as `E`, if that is what the task raised.
    pub fn downcast_task_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            FlowError::Task(source) => source.downcast_ref::<E>(),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for FlowError {
    fn from(err: anyhow::Error) -> Self {
        FlowError::Task(err.into())
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
