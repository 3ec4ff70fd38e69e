// Submission pipeline: resolve the gene, classify the variant, build the steps
pub mod build_steps;
pub mod classify_variant;
pub mod resolve_locus;

pub mod types;

pub use build_steps::BuildStepsTask;
pub use classify_variant::ClassifyVariantTask;
pub use resolve_locus::ResolveLocusTask;

pub use types::session_keys;
