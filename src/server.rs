// A deliberately vulnerable web service exposing a CBC padding oracle.
use crate::{config::BLOCK_SIZE, CbcOracle};

use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::get, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::{debug, info};

use std::sync::Arc;

const INFO: &str = "Padding oracle exploit exercise.\n\n\
POST a base64 encoded ciphertext to this URL. The reply is 200 if it decrypts \
to valid PKCS#7 padding and 403 if it does not.\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 12345,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub fn router(oracle: CbcOracle) -> Router {
    Router::new()
        .route("/", get(info).post(check_padding))
        .with_state(Arc::new(oracle))
}

/// Serve the oracle on `address` until the process is stopped.
pub async fn serve(address: impl ToSocketAddrs, oracle: CbcOracle) -> std::io::Result<()> {
    let listener = TcpListener::bind(address).await?;
    info!(address = %listener.local_addr()?, "padding oracle listening");
    axum::serve(listener, router(oracle)).await
}

/// Serve the oracle in the background and return its base URL.
pub async fn spawn_server(
    address: impl ToSocketAddrs,
    oracle: CbcOracle,
) -> std::io::Result<String> {
    let listener = TcpListener::bind(address).await?;
    let addr = listener.local_addr()?;
    let app = router(oracle);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "padding oracle server stopped");
        }
    });
    Ok(format!("http://{}", addr))
}

async fn info() -> &'static str {
    INFO
}

async fn check_padding(State(oracle): State<Arc<CbcOracle>>, body: String) -> impl IntoResponse {
    let ciphertext = match STANDARD.decode(body.trim()) {
        Ok(c) => c,
        Err(e) => return (StatusCode::BAD_REQUEST, format!("Illegal base64: {}", e)),
    };
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return (
            StatusCode::BAD_REQUEST,
            format!("Ciphertext must be a multiple of {} bytes", BLOCK_SIZE),
        );
    }

    if oracle.padding_valid(&ciphertext) {
        debug!("valid padding");
        (StatusCode::OK, "OK".to_string())
    } else {
        (StatusCode::FORBIDDEN, "Invalid padding".to_string())
    }
}
