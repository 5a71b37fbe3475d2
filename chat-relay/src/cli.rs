use std::net::SocketAddr;

use clap::Parser;

pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

const MAX_ALLOWED_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Socket address the relay should bind to. Use port 0 for an ephemeral port.
    #[arg(long, default_value = "0.0.0.0:8080", env = "CHAT_RELAY_LISTEN")]
    pub listen: SocketAddr,

    /// Largest inbound WebSocket message accepted, in bytes.
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_MESSAGE_SIZE,
        env = "CHAT_RELAY_MAX_MESSAGE_SIZE"
    )]
    pub max_message_size: usize,
}

/// Runtime settings handed to the relay.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub max_message_size: usize,
}

impl RelayConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_message_size == 0 {
            return Err("max_message_size must be greater than 0".to_string());
        }
        if self.max_message_size > MAX_ALLOWED_MESSAGE_SIZE {
            return Err(format!(
                "max_message_size exceeds maximum allowed ({MAX_ALLOWED_MESSAGE_SIZE} bytes)"
            ));
        }
        Ok(())
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl From<&Cli> for RelayConfig {
    fn from(cli: &Cli) -> Self {
        Self {
            max_message_size: cli.max_message_size,
        }
    }
}
