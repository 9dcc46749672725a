//! Command-line and environment configuration

use crate::error::SignalingError;
use crate::router::RouterConfig;
use clap::Parser;
use std::net::SocketAddr;

/// CLI arguments for the relay.
#[derive(Parser, Debug, Clone)]
#[command(name = "signaling-relay")]
#[command(about = "WebRTC signaling relay")]
#[command(version)]
pub struct Args {
    /// Socket address to listen on.
    #[arg(long, default_value = "0.0.0.0:8080", env = "SIGNALING_LISTEN")]
    pub listen: SocketAddr,
    /// Request path clients upgrade on.
    #[arg(long, default_value = "/ws/signaling", env = "SIGNALING_PATH")]
    pub path: String,
    /// Participant count at which a call is announced READY.
    #[arg(long, default_value = "2", env = "SIGNALING_READY_THRESHOLD")]
    pub ready_threshold: usize,
    /// Keep a closed connection's identity in its rooms instead of leaving them.
    #[arg(long, env = "SIGNALING_KEEP_ROOMS_ON_CLOSE")]
    pub keep_rooms_on_close: bool,
    /// Maximum inbound WebSocket message size in bytes.
    #[arg(long, default_value = "65536", env = "SIGNALING_MAX_MESSAGE_SIZE")]
    pub max_message_size: usize,
    /// Outbound frames buffered per connection before sends are dropped.
    #[arg(long, default_value = "256", env = "SIGNALING_SEND_QUEUE")]
    pub send_queue: usize,
}

/// Runtime configuration derived from [`Args`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub listen: SocketAddr,
    /// Request path clients upgrade on.
    pub path: String,
    /// Participant count at which a call is announced READY.
    pub ready_threshold: usize,
    /// Leave every joined room when a connection closes.
    pub leave_on_close: bool,
    /// Maximum inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Outbound frames buffered per connection.
    pub send_queue: usize,
}

impl ServerConfig {
    /// Validates the configuration values are within acceptable bounds.
    pub fn validate(&self) -> Result<(), SignalingError> {
        if self.ready_threshold < 2 {
            return Err(SignalingError::InvalidConfig(
                "ready_threshold must be at least 2".to_string(),
            ));
        }
        if !self.path.starts_with('/') {
            return Err(SignalingError::InvalidConfig(
                "path must start with '/'".to_string(),
            ));
        }
        if self.max_message_size == 0 {
            return Err(SignalingError::InvalidConfig(
                "max_message_size must be greater than 0".to_string(),
            ));
        }
        if self.send_queue == 0 {
            return Err(SignalingError::InvalidConfig(
                "send_queue must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            ready_threshold: self.ready_threshold,
            leave_on_close: self.leave_on_close,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
            path: "/ws/signaling".to_string(),
            ready_threshold: 2,
            leave_on_close: true,
            max_message_size: 64 * 1024,
            send_queue: 256,
        }
    }
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        Self {
            listen: args.listen,
            path: args.path,
            ready_threshold: args.ready_threshold,
            leave_on_close: !args.keep_rooms_on_close,
            max_message_size: args.max_message_size,
            send_queue: args.send_queue,
        }
    }
}
