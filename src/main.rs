//! Freshen - recent media discovery and transfer service
//!
//! Runs on a cron schedule, on startup, or when an action token is posted
//! to /api/actions/{token}. `--once` and `--trigger <token>` run a single
//! pass from the command line and exit.

mod cli;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use freshen::config::Config;
use freshen::pipeline::{
    PathMapper, RunCoordinator, RunSummary, ServerHandle, TransferExecutor, TriggerDispatcher,
};
use freshen::services::{
    EmbyClient, FilenameRecognizer, LibraryMover, LogNotifier, MediaRecognizer, MediaServer,
    MetadataService, NotificationSink, TmdbClient, WebhookNotifier,
};

use crate::cli::CliOptions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "freshen=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let options = CliOptions::from_args();
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(mode = %config.mode, servers = config.servers.len(), "Configuration loaded");

    let cancel = CancellationToken::new();
    let coordinator = Arc::new(build_coordinator(&config)?);
    let dispatcher = Arc::new(TriggerDispatcher::new(coordinator, cancel.clone()));

    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested, cancelling active run");
            signal_token.cancel();
        }
    });

    if options.once {
        let summary = dispatcher.run().await?;
        return print_summary(&summary);
    }

    if let Some(token) = options.trigger {
        return match dispatcher.handle_remote_trigger(&token).await? {
            Some(summary) => print_summary(&summary),
            None => anyhow::bail!(
                "Action '{}' does not match this instance ('{}')",
                token,
                dispatcher.action().as_str()
            ),
        };
    }

    if !config.enabled {
        tracing::info!("Pipeline disabled, nothing to schedule");
        return Ok(());
    }

    let mut scheduler = freshen::jobs::start_scheduler(&config, dispatcher.clone()).await?;

    let app = freshen::api::router(dispatcher.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.clone().cancelled_owned())
        .await?;

    if dispatcher.is_running() {
        tracing::info!("Waiting for the active run to finish");
    }
    dispatcher.wait_idle().await;
    scheduler.shutdown().await?;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Wire configured servers and services into a coordinator
fn build_coordinator(config: &Config) -> anyhow::Result<RunCoordinator> {
    let servers = config
        .servers
        .iter()
        .map(|target| -> anyhow::Result<ServerHandle> {
            let client = EmbyClient::new(target.clone(), config.request_timeout)
                .with_context(|| format!("Failed to create client for {}", target.name))?;
            Ok(ServerHandle {
                target: target.clone(),
                client: Arc::new(client) as Arc<dyn MediaServer>,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let notifier: Arc<dyn NotificationSink> = match &config.notify_webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone(), config.request_timeout)?),
        None => Arc::new(LogNotifier),
    };

    let mut coordinator = RunCoordinator::new(
        config.run_settings(),
        servers,
        PathMapper::new(config.path_mappings.clone()),
        notifier,
    );

    if let Some(library_path) = &config.library_path {
        let metadata: Option<Arc<dyn MetadataService>> = match &config.tmdb_api_key {
            Some(key) => Some(Arc::new(TmdbClient::new(key.clone(), config.request_timeout)?)),
            None => {
                tracing::warn!("TMDB_API_KEY not set, episode titles will be omitted");
                None
            }
        };

        let recognizer: Arc<dyn MediaRecognizer> = match &metadata {
            Some(metadata) => Arc::new(FilenameRecognizer::with_metadata(metadata.clone())),
            None => Arc::new(FilenameRecognizer::new()),
        };

        coordinator = coordinator.with_executor(TransferExecutor::new(
            recognizer,
            metadata,
            Arc::new(LibraryMover::new(library_path.clone())),
            config.request_timeout,
        ));
        tracing::info!(library = %library_path.display(), "Library mover configured");
    }

    Ok(coordinator)
}

fn print_summary(summary: &RunSummary) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    if summary.is_success() {
        Ok(())
    } else {
        anyhow::bail!("{} of {} items failed", summary.failed, summary.total)
    }
}
