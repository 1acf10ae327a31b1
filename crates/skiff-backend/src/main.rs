mod aleph;
mod configuration;
mod error;
mod routes;
mod secrets;
mod state;
mod storage;
mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use aleph::{AlephClient, KeySigner};
use configuration::Settings;
use secrets::SecretSealer;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let settings = Settings::new()?;

    let sender_key =
        hex::decode(&settings.aleph.sender_key).context("sender key must be hex encoded")?;
    let signer = KeySigner::new(settings.aleph.sender_address.clone(), sender_key);
    let aleph = AlephClient::new(
        settings.aleph.api_url.clone(),
        settings.aleph.channel.clone(),
        Box::new(signer),
    )?;
    let sealer = SecretSealer::from_hex(&settings.backend.master_key)?;

    let state = AppState {
        aleph: Arc::new(aleph),
        sealer: Arc::new(sealer),
        password: settings.backend.password.clone(),
        agent_post_type: settings.aleph.agent_post_type.clone(),
        gateway_url: settings.aleph.gateway_url.clone(),
    };

    let origins = settings
        .server
        .origins()
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("invalid CORS origin {origin}"))
        })
        .collect::<Result<Vec<_>>>()?;
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::configure(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(settings.server.socket_addr()).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
