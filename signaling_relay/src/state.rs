//! Shared server state
//!
//! One [`ServerState`] is created at startup and cloned into every
//! connection task. All mutable state lives in the router's registry and
//! room table; the handle itself is just an `Arc`.

use crate::config::ServerConfig;
use crate::connection::ChannelConnection;
use crate::router::Router;
use std::sync::Arc;

/// Router over WebSocket-backed connections with in-memory stores
pub type SignalRouter = Router<ChannelConnection>;

struct Inner {
    config: ServerConfig,
    router: SignalRouter,
}

/// Cheaply cloneable handle to the relay's state
#[derive(Clone)]
pub struct ServerState {
    inner: Arc<Inner>,
}

impl ServerState {
    pub fn new(config: ServerConfig) -> Self {
        let router = Router::new(config.router_config());
        Self {
            inner: Arc::new(Inner { config, router }),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    pub fn router(&self) -> &SignalRouter {
        &self.inner.router
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}
