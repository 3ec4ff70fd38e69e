/// Context keys shared by the pipeline tasks and the HTTP handlers
pub mod session_keys {
    pub const GENE: &str = "gene";
    pub const VARIANT: &str = "variant";
    pub const LOCUS: &str = "locus";
    pub const CATEGORY: &str = "category";
    /// Built once per submission, never touched by navigation
    pub const STEPS: &str = "steps";
    /// The only key navigation rewrites
    pub const CURSOR: &str = "cursor";

    /// Keys derived from a submission; cleared before a new one runs
    pub const DERIVED: [&str; 4] = [LOCUS, CATEGORY, STEPS, CURSOR];
}
