use clap::Parser;
use std::path::PathBuf;

use crate::assets::{GridLayout, StepOptions};
use crate::chat::DEFAULT_CHAT_MODEL;
use crate::classifier::{ClassifierConfig, FrameshiftDefault};
use crate::ensembl::DEFAULT_ENSEMBL_URL;

/// Service settings; every flag can also come from the environment.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "gene-variant-service",
    version,
    about = "Guided chromosome-to-mutation walkthrough for a gene variant"
)]
pub struct ServiceConfig {
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    #[arg(long, env = "ENSEMBL_BASE_URL", default_value = DEFAULT_ENSEMBL_URL)]
    pub ensembl_base_url: String,

    /// Directory holding the walkthrough images
    #[arg(long, env = "ASSET_DIR", default_value = "assets")]
    pub asset_dir: PathBuf,

    /// YAML manifest replacing the built-in file names and captions
    #[arg(long, env = "ASSET_MANIFEST")]
    pub asset_manifest: Option<PathBuf>,

    /// Include the chromosome band diagram step
    #[arg(long, env = "BAND_DIAGRAM", default_value_t = true, action = clap::ArgAction::Set)]
    pub band_diagram: bool,

    /// Category for frameshifts that name neither an insertion nor a deletion
    #[arg(long, env = "UNMARKED_FRAMESHIFT", value_enum, default_value_t = FrameshiftDefault::Deletion)]
    pub unmarked_frameshift: FrameshiftDefault,

    /// Minutes without activity before a session is dropped
    #[arg(long, env = "SESSION_TTL_MINUTES", default_value_t = 120)]
    pub session_ttl_minutes: u32,

    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub openrouter_api_key: Option<String>,

    #[arg(long, env = "CHAT_MODEL", default_value = DEFAULT_CHAT_MODEL)]
    pub chat_model: String,

    /// `json` or `pretty`
    #[arg(long, env = "LOG_FORMAT", default_value = "json")]
    pub log_format: String,
}

impl ServiceConfig {
    pub fn classifier_config(&self) -> ClassifierConfig {
        ClassifierConfig {
            unmarked_frameshift: self.unmarked_frameshift,
        }
    }

    pub fn step_options(&self) -> StepOptions {
        StepOptions {
            band_diagram: self.band_diagram,
            layout: GridLayout::OVERVIEW,
        }
    }

    pub fn session_idle_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.session_ttl_minutes))
    }

    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}
