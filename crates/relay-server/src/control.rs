//! HTTP control surface
//!
//! Thin text-over-HTTP layer mapping one request onto one controller
//! operation. It never touches adapters directly.

use crate::controller::{BridgeController, BridgeStatus, StartOutcome, StopOutcome};
use axum::Router;
use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Upper bound on how long `/start` waits for both endpoints to connect
pub const DEFAULT_START_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
struct ControlState {
    controller: BridgeController,
    start_timeout: Duration,
}

/// Build the control surface router
pub fn router(controller: BridgeController, start_timeout: Duration) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/start", get(start))
        .route("/stop", get(stop))
        .route("/status", get(status))
        .route("/position", get(position))
        .with_state(ControlState {
            controller,
            start_timeout,
        })
}

/// Serve `app` on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = listener.local_addr()?;
    info!("Control surface listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn start(State(state): State<ControlState>) -> String {
    match tokio::time::timeout(state.start_timeout, state.controller.start()).await {
        Ok(Ok(StartOutcome::Started)) => "Bot started!".into(),
        Ok(Ok(StartOutcome::AlreadyRunning)) => "Bot is already running.".into(),
        Ok(Err(e)) => format!("Failed to start bot: {}", e),
        Err(_) => {
            warn!(
                "Start did not complete within {:?}, stopping",
                state.start_timeout
            );
            state.controller.stop().await;
            format!(
                "Failed to start bot: timed out after {}s",
                state.start_timeout.as_secs()
            )
        }
    }
}

async fn stop(State(state): State<ControlState>) -> &'static str {
    match state.controller.stop().await {
        StopOutcome::Stopped => "Bot stopped!",
        StopOutcome::NotRunning => "Bot is not running.",
    }
}

async fn status(State(state): State<ControlState>) -> &'static str {
    match state.controller.status().await {
        BridgeStatus::Online => "Bot is online!",
        BridgeStatus::Offline => "Bot is offline!",
    }
}

async fn position(State(state): State<ControlState>) -> String {
    match state.controller.position().await {
        Some(pos) => format!("Bot Position: {}", pos),
        None => "Bot Position: unknown".into(),
    }
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <title>Bedrock Relay</title>
  </head>
  <body>
    <h1>Bedrock Relay Control</h1>
    <p>Status: <span id="status">Loading...</span></p>
    <button onclick="control('/start')">Start Bot</button>
    <button onclick="control('/stop')">Stop Bot</button>
    <p id="result"></p>
    <h2>Bot Position</h2>
    <pre id="position">Loading...</pre>
    <script>
      async function refresh() {
        const status = await fetch('/status');
        document.getElementById('status').textContent = await status.text();
        const position = await fetch('/position');
        document.getElementById('position').textContent = await position.text();
      }

      async function control(path) {
        const response = await fetch(path);
        document.getElementById('result').textContent = await response.text();
        refresh();
      }

      refresh();
      setInterval(refresh, 2000);
    </script>
  </body>
</html>
"#;
