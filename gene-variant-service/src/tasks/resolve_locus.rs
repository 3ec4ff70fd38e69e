use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use walkthrough_flow::{Context, NextAction, Result, Task, TaskResult};

use super::session_keys;
use crate::ensembl::{GenomeService, resolve_locus};

/// Places the submitted gene on its chromosome.
///
/// Output left by a previous submission is cleared first, so a failed
/// lookup leaves no stale walkthrough behind.
pub struct ResolveLocusTask {
    genome: Arc<dyn GenomeService>,
}

impl ResolveLocusTask {
    pub fn new(genome: Arc<dyn GenomeService>) -> Self {
        Self { genome }
    }
}

#[async_trait]
impl Task for ResolveLocusTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        for key in session_keys::DERIVED {
            context.remove(key).await;
        }

        let gene: String = context.require(session_keys::GENE).await?;
        info!(task_id = %self.id(), gene = %gene, "Resolving gene locus");

        let locus = resolve_locus(self.genome.as_ref(), &gene).await?;
        let status = format!("{} is on chromosome {}", locus.gene, locus.band_label());
        context.set(session_keys::LOCUS, locus).await?;

        Ok(TaskResult::new_with_status(
            None,
            NextAction::Continue,
            Some(status),
        ))
    }
}
