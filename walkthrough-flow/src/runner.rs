//! Load a session, run the pipeline against its context, store it again.
//!
//! One runner is built at startup and shared by every request. Call
//! [`Pipeline::execute_session`] directly to inspect a session before saving.

use std::sync::Arc;
use tracing::info;

use crate::{
    error::{FlowError, Result},
    pipeline::{ExecutionResult, Pipeline},
    storage::SessionStorage,
};

/// Runs a pipeline for sessions kept in a [`SessionStorage`].
#[derive(Clone)]
pub struct FlowRunner {
    pipeline: Arc<Pipeline>,
    storage: Arc<dyn SessionStorage>,
}

impl FlowRunner {
    pub fn new(pipeline: Arc<Pipeline>, storage: Arc<dyn SessionStorage>) -> Self {
        Self { pipeline, storage }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Run the pipeline for `session_id` and persist the updated session.
    ///
    /// Session metadata (status message, last task, `updated_at`) is only
    /// saved when every task succeeded. The context is shared by every clone
    /// of a session, so context writes made before a failing task stay
    /// visible to later reads.
    pub async fn run(&self, session_id: &str) -> Result<ExecutionResult> {
        let mut session = self
            .storage
            .get(session_id)
            .await?
            .ok_or_else(|| FlowError::SessionNotFound(session_id.to_string()))?;

        let result = self.pipeline.execute_session(&mut session).await?;
        info!(
            session_id = %session_id,
            pipeline = %self.pipeline.id,
            last_task = ?result.last_task_id,
            "Pipeline completed"
        );

        self.storage.save(session).await?;

        Ok(result)
    }
}
