use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    context::Context,
    error::{FlowError, Result},
    storage::Session,
    task::{NextAction, Task, TaskResult},
};

/// An ordered chain of tasks executed against one session's context.
///
/// Tasks run in insertion order. Execution stops at the first task that
/// returns [`NextAction::End`] or an error; later tasks never see a context
/// left behind by a failed task.
pub struct Pipeline {
    pub id: String,
    tasks: Vec<Arc<dyn Task>>,
}

impl Pipeline {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tasks: Vec::new(),
        }
    }

    /// Add a task to the end of the pipeline
    pub fn add_task(&mut self, task: Arc<dyn Task>) -> &mut Self {
        self.tasks.push(task);
        self
    }

    pub fn task_ids(&self) -> Vec<String> {
        self.tasks.iter().map(|t| t.id().to_string()).collect()
    }

    pub fn get_task(&self, task_id: &str) -> Option<Arc<dyn Task>> {
        self.tasks.iter().find(|t| t.id() == task_id).cloned()
    }

    /// Execute every task against the session and record the final status.
    pub async fn execute_session(&self, session: &mut Session) -> Result<ExecutionResult> {
        let result = self.execute(session.context.clone()).await?;
        session.status_message = result.status_message.clone();
        session.last_task_id = result.last_task_id.clone();
        session.touch();
        Ok(result)
    }

    /// Execute the pipeline on a bare context
    pub async fn execute(&self, context: Context) -> Result<ExecutionResult> {
        if self.tasks.is_empty() {
            return Err(FlowError::TaskNotFound(format!(
                "pipeline '{}' has no tasks",
                self.id
            )));
        }

        let mut last: Option<(String, TaskResult)> = None;
        for (position, task) in self.tasks.iter().enumerate() {
            debug!(pipeline = %self.id, task_id = %task.id(), position, "Running task");
            let result = task.run(context.clone()).await?;
            let stop = result.next_action == NextAction::End;
            last = Some((task.id().to_string(), result));

            if stop {
                let remaining = self.tasks.len() - position - 1;
                if remaining > 0 {
                    info!(pipeline = %self.id, task_id = %task.id(), remaining, "Pipeline ended early");
                }
                break;
            }
        }

        let (last_task_id, result) = last.ok_or_else(|| {
            FlowError::TaskNotFound(format!("pipeline '{}' produced no result", self.id))
        })?;

        Ok(ExecutionResult {
            response: result.response,
            status_message: result.status_message,
            last_task_id: Some(last_task_id),
        })
    }
}

/// Builder for creating pipelines
pub struct PipelineBuilder {
    pipeline: Pipeline,
}

impl PipelineBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            pipeline: Pipeline::new(id),
        }
    }

    pub fn add_task(mut self, task: Arc<dyn Task>) -> Self {
        self.pipeline.add_task(task);
        self
    }

    pub fn build(self) -> Pipeline {
        self.pipeline
    }
}

/// Outcome of a full pipeline run
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub response: Option<String>,
    pub status_message: Option<String>,
    pub last_task_id: Option<String>,
}
