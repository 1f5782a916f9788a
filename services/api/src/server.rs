use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryDocumentStore, InMemoryEventBus};
use crate::routes::with_scoring_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use candidate_scoring::config::AppConfig;
use candidate_scoring::error::AppError;
use candidate_scoring::telemetry;
use candidate_scoring::workflows::scoring::{
    GeminiScorerClient, ScoringOrchestrator, ScoringSettings,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = match args.seed.take() {
        Some(path) => InMemoryDocumentStore::load_seed(&path)?,
        None => InMemoryDocumentStore::default(),
    };
    let store = Arc::new(store);

    if config.scorer.api_key.is_none() {
        warn!("GEMINI_API_KEY is not set; scoring requests will fail until it is configured");
    }
    let scorer = Arc::new(GeminiScorerClient::new(&config.scorer)?);
    let bus = Arc::new(InMemoryEventBus::default());

    let orchestrator = Arc::new(ScoringOrchestrator::new(
        store.clone(),
        scorer,
        store,
        bus,
        ScoringSettings::from(&config),
    ));

    let app = with_scoring_routes(orchestrator.clone())
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        model = %config.scorer.model,
        "candidate scoring service ready"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(readiness_flag, move || orchestrator.shutdown()))
        .await?;

    info!("candidate scoring service stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM after marking the service unready and closing the pipeline.
async fn shutdown_signal(readiness: Arc<AtomicBool>, close_pipeline: impl FnOnce()) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => error!(error = %err, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }

    readiness.store(false, Ordering::Release);
    close_pipeline();
}
