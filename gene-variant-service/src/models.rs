use serde::{Deserialize, Serialize};
use std::fmt;

use crate::assets::AssetKey;

/// Coarse mutation bucket used to pick the illustration of the last step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutationCategory {
    Duplication,
    #[serde(rename = "Frameshift-Insertion")]
    FrameshiftInsertion,
    #[serde(rename = "Frameshift-Deletion")]
    FrameshiftDeletion,
    Nonsense,
    Missense,
}

impl MutationCategory {
    pub const ALL: [MutationCategory; 5] = [
        MutationCategory::Duplication,
        MutationCategory::FrameshiftInsertion,
        MutationCategory::FrameshiftDeletion,
        MutationCategory::Nonsense,
        MutationCategory::Missense,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MutationCategory::Duplication => "Duplication",
            MutationCategory::FrameshiftInsertion => "Frameshift-Insertion",
            MutationCategory::FrameshiftDeletion => "Frameshift-Deletion",
            MutationCategory::Nonsense => "Nonsense",
            MutationCategory::Missense => "Missense",
        }
    }

    /// Lower-case identifier used in asset keys
    pub fn slug(&self) -> &'static str {
        match self {
            MutationCategory::Duplication => "duplication",
            MutationCategory::FrameshiftInsertion => "frameshift_insertion",
            MutationCategory::FrameshiftDeletion => "frameshift_deletion",
            MutationCategory::Nonsense => "nonsense",
            MutationCategory::Missense => "missense",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.slug() == slug)
    }
}

impl fmt::Display for MutationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Chromosome arm: `p` is the short arm, `q` the long arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arm {
    P,
    Q,
}

impl Arm {
    /// `p` when the coordinate lies strictly before the chromosome midpoint.
    ///
    /// Compared as `2 * coordinate < length` so odd lengths split exactly;
    /// the midpoint itself and an unknown coordinate both give `q`.
    pub fn from_position(coordinate: Option<u64>, chromosome_length: u64) -> Self {
        match coordinate {
            Some(c) if c.saturating_mul(2) < chromosome_length => Arm::P,
            _ => Arm::Q,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Arm::P => "p",
            Arm::Q => "q",
        }
    }
}

impl fmt::Display for Arm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved physical location of a gene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locus {
    pub gene: String,
    pub stable_id: String,
    pub chromosome_id: String,
    pub chromosome_length: u64,
    pub coordinate: Option<u64>,
    pub arm: Arm,
}

impl Locus {
    pub fn new(
        gene: impl Into<String>,
        stable_id: impl Into<String>,
        chromosome_id: impl Into<String>,
        chromosome_length: u64,
        coordinate: Option<u64>,
    ) -> Self {
        Self {
            gene: gene.into(),
            stable_id: stable_id.into(),
            chromosome_id: chromosome_id.into(),
            chromosome_length,
            coordinate,
            arm: Arm::from_position(coordinate, chromosome_length),
        }
    }

    /// Band label such as `19p`
    pub fn band_label(&self) -> String {
        format!("{}{}", self.chromosome_id, self.arm)
    }
}

/// What a walkthrough step displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepAsset {
    Image {
        png_base64: String,
    },
    /// Embedded chromosome band widget centred on the gene
    BandDiagram {
        chromosome: String,
        start: u64,
        end: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkthroughStep {
    pub key: AssetKey,
    pub asset: StepAsset,
    pub caption: String,
}

/// Where a session stands in its walkthrough.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCursor {
    pub step_index: usize,
    pub gene: String,
    pub variant: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub session_id: Option<String>,
    pub gene: String,
    pub variant: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub reply: String,
}

/// State returned by the submit and navigation endpoints
#[derive(Debug, Serialize)]
pub struct WalkthroughResponse {
    pub session_id: String,
    pub cursor: SessionCursor,
    pub step_count: usize,
    pub locus: Locus,
    pub category: MutationCategory,
    pub current_step: StepSummary,
    pub status_message: Option<String>,
}

/// Step metadata without the image payload
#[derive(Debug, Serialize)]
pub struct StepSummary {
    pub key: AssetKey,
    pub caption: String,
}
