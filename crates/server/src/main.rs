use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use droughtwatch_core::{
    archive::ArchiveStage, command_stages, load_config, publish::PublishStage, validate_config,
    CalibrationCalendar, CommandChannel, ConnectivityProbe, GeoServerPublisher, HttpSubsetService,
    ImapMailbox, Mailbox, NotificationService, Notifier, PipelineOrchestrator, ProcessedMessages,
    ProductCatalog, RasterPublisher, RunHistory, SmtpNotifier, SqliteHistoryStore, Stage,
    SubsetJobClient, TcpProbe, CONFIG_PATH_ENV,
};

use droughtwatch_server::api::create_router;
use droughtwatch_server::scheduler::spawn_schedules;
use droughtwatch_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        version = VERSION,
        config_hash = &config_hash[..16],
        "Configuration loaded successfully"
    );
    info!("Database path: {:?}", config.database.path);

    // Run history and processed-message ledger share one database
    let store = Arc::new(
        SqliteHistoryStore::new(&config.database.path)
            .context("Failed to create history store")?,
    );
    let history: Arc<dyn RunHistory> = store.clone();
    let ledger: Arc<dyn ProcessedMessages> = store;

    let calendar =
        CalibrationCalendar::new(config.calendar.reset_day).context("Invalid calendar config")?;

    // Data service
    let service = Arc::new(
        HttpSubsetService::new(&config.subset).context("Failed to create subset client")?,
    );
    let client = SubsetJobClient::new(service, config.subset.clone());
    info!("Subset service at {}", config.subset.endpoint);

    // Notifications
    let probe: Arc<dyn ConnectivityProbe> = Arc::new(TcpProbe::new(&config.notify.probe));
    let notifier: Option<Arc<dyn Notifier>> = match &config.notify.smtp {
        Some(smtp) => {
            info!("Notifications via SMTP relay {}", smtp.host);
            Some(Arc::new(
                SmtpNotifier::new(smtp).context("Failed to create SMTP notifier")?,
            ))
        }
        None => {
            info!("No SMTP relay configured, run reports are only logged");
            None
        }
    };
    let notifications = Arc::new(NotificationService::new(probe, notifier));

    // Stages, in pipeline order once sorted by the orchestrator
    let products = ProductCatalog::new(
        &config.paths.downloadable_dir,
        config.products.clone(),
        config.stages.scales.clone(),
    );
    let mut stages: Vec<Arc<dyn Stage>> = command_stages(&config.stages);
    match &config.publish {
        Some(publish) => {
            let publisher: Arc<dyn RasterPublisher> = Arc::new(
                GeoServerPublisher::new(publish).context("Failed to create map server client")?,
            );
            stages.push(Arc::new(PublishStage::new(publisher, publish.clone())));
            info!("Publishing to {}", publish.url);
        }
        None => info!("No map server configured, publishing disabled"),
    }
    if config.stages.archive {
        stages.push(Arc::new(ArchiveStage::new(products.clone())));
    }
    info!(stages = stages.len(), "Pipeline stages configured");

    let orchestrator = Arc::new(
        PipelineOrchestrator::new(
            config.orchestrator.clone(),
            calendar,
            client,
            config.paths.clone(),
            notifications,
        )
        .with_stages(stages)
        .with_stage_settings(&config.stages)
        .with_history(Arc::clone(&history))
        .with_subject_prefix(config.notify.subject_prefix.clone()),
    );

    // Command mailbox
    let channel = config.mailbox.as_ref().map(|mailbox_config| {
        info!(
            "Command mailbox {}@{}",
            mailbox_config.username, mailbox_config.host
        );
        let mailbox: Arc<dyn Mailbox> = Arc::new(ImapMailbox::new(mailbox_config));
        Arc::new(CommandChannel::new(
            mailbox,
            mailbox_config.clone(),
            Some(Arc::clone(&ledger)),
        ))
    });

    // Schedules
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let schedules = spawn_schedules(
        &config.schedule,
        Arc::clone(&orchestrator),
        channel,
        shutdown_rx,
    )
    .context("Invalid schedule")?;

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        orchestrator,
        Some(history),
        products,
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // A run in progress is allowed to finish
    info!("Server shutting down, waiting for schedules...");
    let _ = shutdown_tx.send(true);
    for handle in schedules {
        let _ = handle.await;
    }
    info!("Schedules stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
