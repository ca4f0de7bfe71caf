pub mod api;
pub mod bridge;
pub mod chain;
pub mod claims;
pub mod clients;
pub mod error;
pub mod serde_helpers;
pub mod state;
pub mod storage;
pub mod trade;
pub mod utils;

use crate::bridge::BridgeProgressTracker;
use crate::chain::ClaimStatus;
use crate::claims::{ClaimOutbox, ClaimQuery, ClaimStatusMonitor, ClaimsRepository};
use crate::clients::{ExplorerRelayClient, HttpBridgeStateSource, HttpClaimsRepository, JsonRpcChainReader};
use crate::state::{AppSettings, AppState};
use crate::storage::Storage;
use flexi_logger::{
    Cleanup, Criterion, Duplicate, FileSpec, FlexiLoggerError, Logger, LoggerHandle, Naming,
    WriteMode,
};
use std::sync::Arc;
use std::time::Duration;

/// Starts file logging under `log_dir`. Keep the handle alive for the
/// lifetime of the process so the async writer flushes.
pub fn init_logging(spec: &str, log_dir: &str) -> Result<LoggerHandle, FlexiLoggerError> {
    Logger::try_with_str(spec)?
        .log_to_file(FileSpec::default().directory(log_dir).basename("claims-node"))
        .write_mode(WriteMode::Async)
        .duplicate_to_stderr(Duplicate::Info)
        .rotate(
            Criterion::Size(10 * 1024 * 1024), // 10MB
            Naming::Timestamps,
            Cleanup::KeepLogFiles(7),
        )
        .start()
}

/// Opens the store, resolves settings and serves until Ctrl-C.
pub async fn run() -> anyhow::Result<()> {
    // The database path has to be known before stored settings can be read.
    let bootstrap = AppSettings::default().with_env_overrides();
    if let Some(dir) = std::path::Path::new(&bootstrap.db_path).parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let storage = Arc::new(Storage::new(&bootstrap.db_path)?);

    let mut settings = AppSettings::load(&storage).with_env_overrides();
    settings.db_path = bootstrap.db_path;
    if storage.get_setting(state::SETTINGS_KEY)?.is_none() {
        settings.save(&storage)?;
    }

    serve(storage, settings).await
}

pub async fn serve(storage: Arc<Storage>, settings: AppSettings) -> anyhow::Result<()> {
    let http = clients::http_client(Duration::from_secs(settings.request_timeout_secs))?;

    let repository: Arc<dyn ClaimsRepository> = if settings.repository_url.is_empty() {
        storage.clone()
    } else {
        log::info!("Using remote claims repository at {}", settings.repository_url);
        Arc::new(HttpClaimsRepository::new(http.clone(), &settings.repository_url))
    };
    let relay = Arc::new(ExplorerRelayClient::new(http.clone(), &settings.relay_api_url));
    let chain_reader = Arc::new(JsonRpcChainReader::new(
        &settings.l2_rpc_url,
        &settings.bonding_curve_address,
        &settings.bridge_address,
    )?);
    let bridge_source = Arc::new(HttpBridgeStateSource::new(http, &settings.coin_api_url));

    let outbox = Arc::new(ClaimOutbox::new(storage.clone(), repository.clone()));
    let monitor = Arc::new(
        ClaimStatusMonitor::new(relay, chain_reader, repository.clone(), storage.clone())
            .with_outbox(outbox)
            .with_interval(Duration::from_secs(settings.poll_interval_secs)),
    );
    let tracker = Arc::new(BridgeProgressTracker::new(bridge_source, storage.clone()));

    // Failed claims are settled for good; received ones still get second-wave checks.
    let open_claims: Vec<_> = match repository.list_all(&ClaimQuery::default()).await {
        Ok(claims) => claims
            .into_iter()
            .filter(|c| c.status != ClaimStatus::Failed)
            .collect(),
        Err(e) => {
            log::warn!("Could not load claims, starting with an empty session: {}", e);
            Vec::new()
        }
    };
    log::info!("Monitoring {} claim(s)", open_claims.len());
    monitor.start_monitoring(open_claims);

    let app_state = Arc::new(AppState {
        storage,
        evt_sender: monitor.event_sender(),
        monitor: monitor.clone(),
        tracker,
        settings: settings.clone(),
    });

    let listener = tokio::net::TcpListener::bind(&settings.listen_addr).await?;
    log::info!("Claims API listening on http://{}", settings.listen_addr);
    axum::serve(listener, api::router(app_state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    monitor.stop_monitoring();
    log::info!("Claims node stopped");
    Ok(())
}
