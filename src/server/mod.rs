pub mod api;

use crate::error::BoxError;
use crate::llm::ModelBackend;
use std::sync::Arc;
use log::{ info, warn };

pub struct Server {
    addr: String,
    backend: Arc<dyn ModelBackend>,
}

impl Server {
    pub fn new(addr: String, backend: Arc<dyn ModelBackend>) -> Self {
        Self { addr, backend }
    }

    /// Serve until Ctrl-C.
    pub async fn run(&self) -> Result<(), BoxError> {
        let listener = tokio::net::TcpListener::bind(&self.addr).await
            .map_err(|e| format!("Failed to bind HTTP server to {}: {}. Try a different port.", self.addr, e))?;
        info!("Relay listening on http://{}", listener.local_addr()?);

        let app = api::router(self.backend.clone());
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(shutdown_signal()).await?;

        info!("Relay stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
