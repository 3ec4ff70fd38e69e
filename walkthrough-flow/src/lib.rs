pub mod context;
pub mod error;
pub mod pipeline;
pub mod runner;
pub mod storage;
pub mod task;

// Re-export commonly used types
pub use context::{ChatMessage, Context, MessageRole};
pub use error::{FlowError, Result, TaskError};
pub use pipeline::{ExecutionResult, Pipeline, PipelineBuilder};
pub use runner::FlowRunner;
pub use storage::{InMemorySessionStorage, Session, SessionStorage};
pub use task::{NextAction, Task, TaskResult};
