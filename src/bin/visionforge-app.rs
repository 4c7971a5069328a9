use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;

use visionforge::app::api::{AppState, router};
use visionforge::bria::BriaClient;
use visionforge::config::Settings;
use visionforge::fetch::HttpImageFetcher;
use visionforge::gemini::GeminiClient;
use visionforge::studio::Studio;
use visionforge::studio::progress::PipelineEvent;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct AppArgs {
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: SocketAddr,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let settings = Settings::from_env().context("load settings")?;
    visionforge::logging::init(settings.log_format)?;

    let args = AppArgs::parse();
    tracing::info!(?args, ?settings, "starting visionforge-app");

    let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            match event {
                PipelineEvent::Progress { step, percent } => {
                    tracing::info!(percent, "{step}");
                }
                PipelineEvent::Finished { operation } => {
                    tracing::info!(?operation, "operation finished");
                }
                PipelineEvent::Failed { operation, error } => {
                    tracing::warn!(?operation, %error, "operation failed");
                }
            }
        }
    });

    let studio = Studio::new(
        Arc::new(BriaClient::from_settings(&settings).context("configure image generation")?),
        Arc::new(GeminiClient::from_settings(&settings).context("configure story analysis")?),
        Arc::new(HttpImageFetcher::new(settings.http_client()?)),
    )
    .with_regeneration_scope(settings.regeneration_scope)
    .with_events(events_tx);

    let app = router(AppState::new(studio));

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .map_err(|err| anyhow::anyhow!("bind {}: {err}", args.addr))?;
    tracing::info!(addr = %args.addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
