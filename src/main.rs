#![deny(clippy::all)]

mod api;
mod app;
mod audio;
mod auth;
mod export;
mod session;
mod store;
mod transcript;

use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application configuration
#[derive(serde::Deserialize)]
struct Config {
    server: ServerConfig,
    capture: CaptureConfig,
}

#[derive(serde::Deserialize)]
struct ServerConfig {
    base_url: String,
}

#[derive(serde::Deserialize)]
struct CaptureConfig {
    duration_secs: u64,
}

/// Load configuration from the embedded config.toml, with the backend
/// address overridable through PARLEY_BASE_URL.
fn load_config() -> anyhow::Result<Config> {
    const CONFIG_TOML: &str = include_str!("../config.toml");
    let mut config: Config = toml::from_str(CONFIG_TOML).context("Invalid embedded config.toml")?;
    if let Ok(base_url) = std::env::var("PARLEY_BASE_URL") {
        config.server.base_url = base_url;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("parley=info")),
        )
        .init();

    let config = load_config()?;
    info!("Chat backend: {}", config.server.base_url);

    let store = store::DiskStore::open_default().context("Failed to open local state store")?;
    let session = session::SessionManager::restore(store);

    let api = api::HttpApi::new(&config.server.base_url)?;
    let transcriber = Box::new(api.clone());
    let auth = auth::AuthClient::new(&config.server.base_url)?;
    let capturer = Box::new(audio::MicCapturer);

    let mut app = app::App::new(
        session,
        api,
        auth,
        capturer,
        transcriber,
        Duration::from_secs(config.capture.duration_secs),
    );
    app.run().await
}
