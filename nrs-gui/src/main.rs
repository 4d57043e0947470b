//! # NRS.gui
//!
//! Backend of the graphical editor for NRS node and variable graphs.
//!
//! ## Responsibilities
//!
//! - Hold the node graph being edited and validate every change to it
//! - Notify node and variable listeners of graph changes
//! - Track the online/offline mode and each node's sync status
//! - Serve the editor API and the WebSocket event stream to the front-end
//!
//! All state lives in the [`app::AppManager`] built here and passed down;
//! there is no global instance.

mod api;
mod app;
mod events;
mod graph;
mod websocket;

use anyhow::Result;
use nrs_libs::GuiConfig;
use tracing::info;

use app::AppManager;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nrs_gui=info,tower_http=info".into()),
        )
        .init();

    info!("Starting NRS.gui");

    let config = GuiConfig::from_env()?;
    let args: Vec<String> = std::env::args().skip(1).collect();

    AppManager::new(config).startup(args).await
}
