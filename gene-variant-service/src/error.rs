use thiserror::Error;
use walkthrough_flow::FlowError;

/// Message shown when a gene cannot be placed on a chromosome.
pub const GENE_NOT_FOUND_MESSAGE: &str = "Gene not found in Ensembl (check symbol).";

#[derive(Debug, Error)]
pub enum WalkthroughError {
    /// Gene unknown upstream, or upstream data incomplete or malformed.
    #[error("Gene not found in Ensembl (check symbol). {0}")]
    ResolutionNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Upstream error: {0}")]
    UpstreamError(String),

    /// Asset catalog is missing an entry or a file cannot be used.
    #[error("Asset error: {0}")]
    AssetError(String),

    /// Session has no built walkthrough (nothing submitted, or the last submission failed).
    #[error("No walkthrough available: {0}")]
    NoWalkthrough(String),

    #[error("Step {index} is out of range (walkthrough has {len} steps)")]
    StepOutOfRange { index: usize, len: usize },

    #[error(transparent)]
    Flow(FlowError),
}

impl WalkthroughError {
    pub fn not_found(detail: impl Into<String>) -> Self {
        WalkthroughError::ResolutionNotFound(detail.into())
    }

    pub fn asset(detail: impl Into<String>) -> Self {
        WalkthroughError::AssetError(detail.into())
    }
}

impl From<WalkthroughError> for FlowError {
    fn from(err: WalkthroughError) -> Self {
        match err {
            WalkthroughError::Flow(inner) => inner,
            other => FlowError::task(other),
        }
    }
}

impl From<FlowError> for WalkthroughError {
    fn from(err: FlowError) -> Self {
        match err {
            FlowError::Task(source) => match source.downcast::<WalkthroughError>() {
                Ok(domain) => *domain,
                Err(source) => WalkthroughError::Flow(FlowError::Task(source)),
            },
            other => WalkthroughError::Flow(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, WalkthroughError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_error_survives_the_flow_boundary() {
        let flow: FlowError = WalkthroughError::not_found("xref lookup for FOO was empty").into();
        let back = WalkthroughError::from(flow);
        assert!(matches!(back, WalkthroughError::ResolutionNotFound(msg) if msg.contains("FOO")));
    }

    #[test]
    fn engine_errors_stay_engine_errors() {
        let back = WalkthroughError::from(FlowError::SessionNotFound("abc".to_string()));
        assert!(matches!(
            back,
            WalkthroughError::Flow(FlowError::SessionNotFound(id)) if id == "abc"
        ));
    }

    #[test]
    fn user_facing_message_leads_the_display() {
        let err = WalkthroughError::not_found("no xref");
        assert!(err.to_string().starts_with(GENE_NOT_FOUND_MESSAGE));
    }
}
