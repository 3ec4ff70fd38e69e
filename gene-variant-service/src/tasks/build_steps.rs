use async_trait::async_trait;
use std::sync::Arc;
use walkthrough_flow::{Context, NextAction, Result, Task, TaskResult};

use super::session_keys;
use crate::assets::{AssetCatalog, StepOptions, build_steps};
use crate::models::{Locus, MutationCategory};
use crate::walkthrough::StepCursor;

/// Assembles the step list and puts the cursor on the first step.
pub struct BuildStepsTask {
    catalog: Arc<AssetCatalog>,
    options: StepOptions,
}

impl BuildStepsTask {
    pub fn new(catalog: Arc<AssetCatalog>, options: StepOptions) -> Self {
        Self { catalog, options }
    }
}

#[async_trait]
impl Task for BuildStepsTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let locus: Locus = context.require(session_keys::LOCUS).await?;
        let category: MutationCategory = context.require(session_keys::CATEGORY).await?;

        let steps = build_steps(&locus, category, &self.catalog, &self.options).await?;
        let first_caption = steps.first().map(|step| step.caption.clone());
        let status = format!(
            "Walkthrough ready: {} steps for {} {}",
            steps.len(),
            locus.gene,
            category
        );

        context
            .set(session_keys::CURSOR, StepCursor::new(steps.len()))
            .await?;
        context.set(session_keys::STEPS, steps).await?;

        Ok(TaskResult::new_with_status(
            first_caption,
            NextAction::End,
            Some(status),
        ))
    }
}
