//! Lexical classification of variant notation.
//!
//! Variant strings arrive as HGVS coding (`c.240A>G`), HGVS protein
//! (`p.Gly12Ter`) or informal shorthand, so no grammar is enforced. The
//! normalised text is checked against an ordered rule list and the first
//! rule that matches decides the category. Categories overlap in raw text
//! (`c.35delAfs*12` mentions a deletion, a frameshift and a stop), which is
//! why the order below must not change.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::models::MutationCategory;

/// Three-letter residue, position, `x` stop shorthand (`trp24x`)
static STOP_SHORTHAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z]{3}\d+x").expect("stop shorthand pattern"));

/// Three-letter residue, position, three-letter residue (`gly12asp`)
static PROTEIN_SUBSTITUTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z]{3}\d+[a-z]{3}").expect("protein substitution pattern"));

/// Category for a frameshift that names neither an insertion nor a deletion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FrameshiftDefault {
    #[default]
    Deletion,
    Insertion,
}

impl FrameshiftDefault {
    fn category(self) -> MutationCategory {
        match self {
            FrameshiftDefault::Deletion => MutationCategory::FrameshiftDeletion,
            FrameshiftDefault::Insertion => MutationCategory::FrameshiftInsertion,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub unmarked_frameshift: FrameshiftDefault,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Classifier {
    config: ClassifierConfig,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> ClassifierConfig {
        self.config
    }

    /// Map a variant notation to exactly one category. Never fails.
    pub fn classify(&self, variant: &str) -> MutationCategory {
        let text = variant.trim().to_lowercase();

        if text.contains("dup") {
            return MutationCategory::Duplication;
        }

        if text.contains("fs") || text.contains("frameshift") {
            if text.contains("ins") {
                return MutationCategory::FrameshiftInsertion;
            }
            if text.contains("del") {
                return MutationCategory::FrameshiftDeletion;
            }
            return self.config.unmarked_frameshift.category();
        }

        // "fs" is already ruled out here
        if text.contains("del") {
            return MutationCategory::FrameshiftDeletion;
        }
        if text.contains("ins") {
            return MutationCategory::FrameshiftInsertion;
        }

        if text.contains('*') || text.contains("ter") || STOP_SHORTHAND.is_match(&text) {
            return MutationCategory::Nonsense;
        }

        if text.contains('>') || PROTEIN_SUBSTITUTION.is_match(&text) {
            return MutationCategory::Missense;
        }

        MutationCategory::Missense
    }
}

/// Classify with the default configuration.
pub fn classify(variant: &str) -> MutationCategory {
    Classifier::default().classify(variant)
}
