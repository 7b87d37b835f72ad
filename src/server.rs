use axum::{response::IntoResponse, Router};
use hyper::Server;
use std::net::{SocketAddr, TcpListener};
use tracing::info;

use crate::constants::HEALTHY_BODY;
use crate::error::Result;

/// Platform health check; answers every path.
async fn health() -> impl IntoResponse {
    HEALTHY_BODY
}

pub fn create_server() -> Router {
    Router::new().fallback(health)
}

/// Serve the health check on `0.0.0.0:port` until the process exits.
pub async fn start_server(port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "health check listening");
    Server::bind(&addr)
        .serve(create_server().into_make_service())
        .await?;
    Ok(())
}

/// Serve the health check on an already bound listener.
pub async fn serve_on(listener: TcpListener) -> Result<()> {
    Server::from_tcp(listener)?
        .serve(create_server().into_make_service())
        .await?;
    Ok(())
}
