use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::FixedOffset;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::info;

use labslot::config::Catalog;
use labslot::engine::Scheduler;
use labslot::notify::NotifyHub;
use labslot::store::TableFileStore;
use labslot::wire::{self, Shell};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let metrics_port: Option<u16> = std::env::var("LABSLOT_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok());
    labslot::observability::init(metrics_port);

    let port = std::env::var("LABSLOT_PORT").unwrap_or_else(|_| "5460".into());
    let bind = std::env::var("LABSLOT_BIND").unwrap_or_else(|_| "0.0.0.0".into());
    let data_dir = std::env::var("LABSLOT_DATA_DIR").unwrap_or_else(|_| "./data".into());
    let max_connections: usize = std::env::var("LABSLOT_MAX_CONNECTIONS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(64);
    let store_timeout_ms: u64 = std::env::var("LABSLOT_STORE_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(5_000);
    // Reference clock for "today": defaults to UTC+10, the lab's offset.
    let offset_minutes: i32 = std::env::var("LABSLOT_UTC_OFFSET_MINUTES")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(600);
    let offset = FixedOffset::east_opt(offset_minutes * 60)
        .ok_or("LABSLOT_UTC_OFFSET_MINUTES out of range")?;

    let catalog = match std::env::var("LABSLOT_CATALOG") {
        Ok(path) => Catalog::load(&PathBuf::from(&path))?,
        Err(_) => Catalog::builtin(),
    };

    std::fs::create_dir_all(&data_dir)?;
    let store = Arc::new(TableFileStore::new(
        PathBuf::from(&data_dir).join("schedule.json"),
    ));
    let notify = Arc::new(NotifyHub::new());
    let scheduler = Arc::new(Scheduler::new(
        store,
        notify.clone(),
        offset,
        Duration::from_millis(store_timeout_ms),
    ));
    let shell = Arc::new(Shell {
        scheduler,
        catalog: Arc::new(catalog),
        notify,
    });

    let semaphore = Arc::new(Semaphore::new(max_connections));

    let addr = format!("{bind}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!("labslot listening on {addr}");
    info!("  data_dir: {data_dir}");
    info!("  max_connections: {max_connections}");
    info!("  utc_offset_minutes: {offset_minutes}");
    info!(
        "  metrics: {}",
        metrics_port.map_or("disabled".to_string(), |p| format!(
            "http://0.0.0.0:{p}/metrics"
        ))
    );

    // Graceful shutdown: stop accepting on SIGTERM/ctrl-c, drain in-flight connections
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to register SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (socket, peer) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::error!("accept error: {e}");
                        continue;
                    }
                };

                let permit = match semaphore.clone().try_acquire_owned() {
                    Ok(permit) => permit,
                    Err(_) => {
                        tracing::warn!("connection limit reached, rejecting {peer}");
                        metrics::counter!(labslot::observability::CONNECTIONS_REJECTED_TOTAL)
                            .increment(1);
                        drop(socket);
                        continue;
                    }
                };

                info!("connection from {peer}");
                metrics::counter!(labslot::observability::CONNECTIONS_TOTAL).increment(1);
                metrics::gauge!(labslot::observability::CONNECTIONS_ACTIVE).increment(1.0);
                let shell = shell.clone();

                tokio::spawn(async move {
                    let _permit = permit; // held until connection closes
                    if let Err(e) = wire::process_connection(socket, shell).await {
                        tracing::error!("connection error from {peer}: {e}");
                    }
                    metrics::gauge!(labslot::observability::CONNECTIONS_ACTIVE).decrement(1.0);
                });
            }
            _ = &mut shutdown => {
                info!("shutdown signal received, stopping accept loop");
                break;
            }
        }
    }

    // Wait for in-flight connections to finish (up to 10s)
    info!("draining connections...");
    let drain_deadline = tokio::time::sleep(Duration::from_secs(10));
    tokio::pin!(drain_deadline);

    loop {
        if semaphore.available_permits() == max_connections {
            info!("all connections drained");
            break;
        }
        tokio::select! {
            _ = &mut drain_deadline => {
                let remaining = max_connections - semaphore.available_permits();
                tracing::warn!("drain timeout, {remaining} connections still open");
                break;
            }
            _ = tokio::time::sleep(Duration::from_millis(100)) => {}
        }
    }

    info!("labslot stopped");
    Ok(())
}
