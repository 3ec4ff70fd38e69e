use async_trait::async_trait;
use tracing::info;
use walkthrough_flow::{Context, NextAction, Result, Task, TaskResult};

use super::session_keys;
use crate::classifier::Classifier;

pub struct ClassifyVariantTask {
    classifier: Classifier,
}

impl ClassifyVariantTask {
    pub fn new(classifier: Classifier) -> Self {
        Self { classifier }
    }
}

#[async_trait]
impl Task for ClassifyVariantTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let variant: String = context.require(session_keys::VARIANT).await?;
        let category = self.classifier.classify(&variant);

        info!(
            task_id = %self.id(),
            variant = %variant,
            category = %category,
            "Variant classified"
        );
        context.set(session_keys::CATEGORY, category).await?;

        Ok(TaskResult::new_with_status(
            None,
            NextAction::Continue,
            Some(format!("{} classified as {}", variant, category)),
        ))
    }
}
