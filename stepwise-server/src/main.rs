use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use stepwise::engine::Engine;
use stepwise::events::LoggingEventSink;
use stepwise_server::api::{self, AppState};
use stepwise_server::config::Cli;
use stepwise_server::definition::PipelineDefinition;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stepwise=info,stepwise_server=info,tower_http=info".into()),
        )
        .with(cli.log_json.then(|| fmt::layer().json()))
        .with((!cli.log_json).then(fmt::layer))
        .init();

    tracing::info!("Starting stepwise server...");

    let definition = PipelineDefinition::from_file(&cli.pipeline)
        .with_context(|| format!("loading {}", cli.pipeline.display()))?;
    let tree = definition
        .compile()
        .with_context(|| format!("compiling pipeline '{}'", definition.name))?;

    tracing::info!(
        pipeline = %tree.name(),
        steps = tree.step_count(),
        "Pipeline loaded"
    );

    let engine = Arc::new(
        Engine::in_memory(tree)
            .with_config(cli.engine_config())
            .with_event_sink(Arc::new(LoggingEventSink::default())),
    );

    if cli.start_build {
        let handle = engine
            .start_build()
            .await
            .context("starting initial build")?;
        tracing::info!(build_id = %handle.build_id(), "Initial build started");
    }

    // Build router with all API endpoints
    let app = api::create_router(AppState::new(engine, cli.state_mode));

    tracing::info!("Listening on {}", cli.bind);

    let listener = tokio::net::TcpListener::bind(&cli.bind)
        .await
        .with_context(|| format!("binding to {}", cli.bind))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
