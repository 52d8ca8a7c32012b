//! HTTP server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::routes::create_router;
use crate::state::AppState;

/// Listen address.
#[derive(Debug, Clone)]
pub struct ServerAddr {
    pub host: String,
    pub port: u16,
}

impl ServerAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for ServerAddr {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

pub struct ApiServer {
    addr: ServerAddr,
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(addr: ServerAddr, state: Arc<AppState>) -> Self {
        Self { addr, state }
    }

    /// Get the server address.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.addr.host, self.addr.port)
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests.
    pub async fn run<F>(&self, shutdown: F) -> Result<(), Box<dyn std::error::Error>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = create_router(self.state.clone());

        let addr: SocketAddr = self.addr().parse()?;
        let listener = TcpListener::bind(addr).await?;

        info!("API server listening on {}", addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("API server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cronsentry_core::{JobService, MemoryJobStore, PingHandler, ScheduleRecompute, SystemClock};

    fn state() -> Arc<AppState> {
        let store = Arc::new(MemoryJobStore::new());
        let clock = Arc::new(SystemClock);
        Arc::new(AppState::new(
            JobService::new(store.clone(), store.clone(), clock.clone()),
            PingHandler::new(store.clone(), clock, ScheduleRecompute::default()),
            store,
        ))
    }

    #[test]
    fn test_server_addr_default() {
        let addr = ServerAddr::default();
        assert_eq!(addr.host, "127.0.0.1");
        assert_eq!(addr.port, 8080);
    }

    #[test]
    fn test_server_addr_format() {
        let server = ApiServer::new(ServerAddr::new("0.0.0.0", 9090), state());
        assert_eq!(server.addr(), "0.0.0.0:9090");
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let server = ApiServer::new(ServerAddr::new("127.0.0.1", 0), state());
        server.run(async {}).await.unwrap();
    }

    #[tokio::test]
    async fn test_run_rejects_bad_address() {
        let server = ApiServer::new(ServerAddr::new("not a host", 80), state());
        assert!(server.run(async {}).await.is_err());
    }
}
