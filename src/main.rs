//! Assist Learning · lesson summary and exercise trainer
//!
//! - Axum HTTP + WebSocket API driving a single learning session
//! - Lessons persisted as JSON under DATA_DIR
//! - Optional Gemini integration (via environment variables)
//! - Static renderer fallback (./static/index.html)
//!
//! Important env variables:
//!   BIND_ADDRESS        : socket address (default 127.0.0.1:3000)
//!   PORT                : u16, loopback only, used when BIND_ADDRESS is unset
//!   DATA_DIR            : lesson store directory (default ./data)
//!   GEMINI_API_KEY      : enables content generation if present
//!   GEMINI_BASE_URL     : default "https://generativelanguage.googleapis.com/v1beta"
//!   GEMINI_MODEL        : default "gemini-3-flash-preview"
//!   GEMINI_TIMEOUT_SECS : HTTP timeout for one generation call (default 120)
//!   ASSIST_CONFIG_PATH  : path to TOML config (prompt template + notice messages)
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod config;
mod store;
mod repository;
mod machine;
mod generator;
mod gemini;
mod session;
mod protocol;
mod state;
mod routes;

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::Settings;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let settings = Settings::from_env()?;

  // Build the single session (lesson store, generator, prompts).
  let state = Arc::new(AppState::from_settings(&settings));

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state.clone());

  let listener = TcpListener::bind(settings.bind_address).await?;
  info!(target: "assist_learning", addr = %settings.bind_address, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "assist_learning", "Shut down");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "assist_learning", error = %e, "Failed to listen for shutdown signal");
  }
}
