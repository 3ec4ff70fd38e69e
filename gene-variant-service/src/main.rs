use clap::Parser;
use gene_variant_service::{ServiceConfig, create_app};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(log_format: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "gene_variant_service=debug,walkthrough_flow=debug,tower_http=debug".into()
    });

    match log_format {
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::parse();
    init_tracing(&config.log_format);

    let app = create_app(&config)?;
    let listener = TcpListener::bind(config.bind_address()).await?;
    let addr = listener.local_addr()?;

    info!("Gene variant walkthrough service starting on {}", addr);
    info!("Submission form: http://{}/", addr);
    info!("Health check endpoint: http://{}/health", addr);
    info!("Walkthrough endpoint: POST http://{}/walkthrough", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
