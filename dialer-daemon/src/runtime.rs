use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::broadcast;

use dialer_core::Config;
use dialer_sync::pipeline;

use crate::error::{io_err, DaemonError};
use crate::http::router;
use crate::scheduler::scheduler_task;
use crate::state::AppState;

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(config: Config) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio runtime", e))?;
    runtime.block_on(run(config))
}

/// Run the daemon against the collaborators described by `config`.
pub async fn run(config: Config) -> Result<(), DaemonError> {
    let engine = pipeline::engine_from_config(&config)?;
    let state = Arc::new(AppState::new(
        engine,
        config.sync.clone(),
        config.server.sync_interval,
    ));
    serve(state, config.server.bind).await
}

/// Serve the HTTP surface (and the scheduler, if configured) until ctrl-c.
pub async fn serve(state: Arc<AppState>, bind: SocketAddr) -> Result<(), DaemonError> {
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|e| io_err(format!("bind {bind}"), e))?;
    let local = listener
        .local_addr()
        .map_err(|e| io_err("listener address", e))?;
    tracing::info!(addr = %local, "dialer daemon listening");

    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let server_handle = {
        let shutdown = shutdown_tx.clone();
        let mut shutdown_rx = shutdown.subscribe();
        let app = router(state.clone());
        tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await
                .map_err(|e| io_err("http server", e));
            let _ = shutdown.send(());
            result
        })
    };

    let scheduler_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown.subscribe();
        let state = state.clone();
        tokio::spawn(async move {
            let Some(period) = state.sync_interval else {
                return Ok(());
            };
            let result = scheduler_task(state, period, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        let mut shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Task(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (server_result, scheduler_result, signal_result) =
        tokio::join!(server_handle, scheduler_handle, signal_handle);

    handle_join("http_server", server_result)?;
    handle_join("scheduler", scheduler_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Task(format!("{task} task join failure: {err}"))),
    }
}

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// `info` filter; set `DIALER_LOG_FORMAT=json` for JSON lines.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("DIALER_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
