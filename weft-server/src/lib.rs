pub mod card;
pub mod dispatcher;
pub mod state;
pub mod tasks;

pub use card::{build_agent_card, CardCache};
pub use state::AppState;
pub use tasks::{CancelOutcome, Task, TaskManager, TaskStatus};

use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use weft_a2a::WELL_KNOWN_CARD_PATH;
use weft_core::Result;

/// How long in-flight turns get to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route(WELL_KNOWN_CARD_PATH, get(dispatcher::get_agent_card))
        .route("/", post(dispatcher::handle_jsonrpc))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn health_check() -> &'static str {
    "OK"
}

/// Bind, attach boot capabilities, and run until the shutdown signal. After
/// the signal, in-flight turns drain up to a grace deadline, then the server
/// task is aborted and every handle's transport state drops with it.
pub async fn serve(state: AppState) -> Result<()> {
    state.attach_initial_capabilities().await;

    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(agent_id = %state.config.agent_id, %addr, "agent listening");

    let app = create_app(state);
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    info!("shutdown requested, draining in-flight turns");
    let _ = stop_tx.send(());

    match tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await {
        Ok(joined) => {
            joined.map_err(std::io::Error::other)??;
        }
        Err(_) => {
            warn!("grace deadline elapsed, aborting remaining work");
            server.abort();
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
