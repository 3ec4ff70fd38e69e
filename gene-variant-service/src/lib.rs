pub mod assets;
pub mod chat;
pub mod classifier;
pub mod config;
pub mod ensembl;
pub mod error;
pub mod models;
pub mod render;
pub mod service;
pub mod tasks;
pub mod walkthrough;
pub mod workflow;

pub use config::ServiceConfig;
pub use error::{Result, WalkthroughError};
pub use models::*;
pub use service::{AppState, build_router, create_app};
pub use workflow::{
    PIPELINE_ID, build_walkthrough_pipeline, create_flow_runner, create_walkthrough_session,
    set_submission,
};
