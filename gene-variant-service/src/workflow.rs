use std::sync::Arc;
use walkthrough_flow::{FlowRunner, Pipeline, PipelineBuilder, Session, SessionStorage};

use crate::assets::{AssetCatalog, StepOptions};
use crate::classifier::Classifier;
use crate::ensembl::GenomeService;
use crate::error::Result;
use crate::tasks::*;

pub const PIPELINE_ID: &str = "gene_variant_walkthrough";

pub fn build_walkthrough_pipeline(
    genome: Arc<dyn GenomeService>,
    classifier: Classifier,
    catalog: Arc<AssetCatalog>,
    options: StepOptions,
) -> Pipeline {
    PipelineBuilder::new(PIPELINE_ID)
        .add_task(Arc::new(ResolveLocusTask::new(genome)))
        .add_task(Arc::new(ClassifyVariantTask::new(classifier)))
        .add_task(Arc::new(BuildStepsTask::new(catalog, options)))
        .build()
}

pub fn create_walkthrough_session() -> Session {
    Session::generate(PIPELINE_ID)
}

/// Store the submitted gene and variant on the session.
pub async fn set_submission(session: &Session, gene: &str, variant: &str) -> Result<()> {
    session
        .context
        .set(session_keys::GENE, gene.trim().to_string())
        .await?;
    session
        .context
        .set(session_keys::VARIANT, variant.trim().to_string())
        .await?;
    Ok(())
}

pub fn create_flow_runner(pipeline: Pipeline, session_storage: Arc<dyn SessionStorage>) -> FlowRunner {
    FlowRunner::new(Arc::new(pipeline), session_storage)
}
