//! Client configuration and its CLI/environment overrides.

use std::time::Duration;

use clap::Args;
use dropwire_core::capacity::{
    CapacityError, CapacityModel, MAX_CONNECTIONS, RESERVED_TOPICS_PER_CONNECTION, TOPICS_PER_CHANNEL,
    TOPICS_PER_CONNECTION,
};

use crate::identity::ClientKind;
use crate::logging::{LogConfig, LogFormat};

/// Top-level client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientConfig {
    /// Identity presented to the remote service.
    pub client: ClientKind,
    /// Socket pool limits.
    pub capacity: CapacityModel,
    /// Keepalive and polling intervals.
    pub intervals: IntervalConfig,
    pub log: LogConfig,
}

/// Timing used by the transport and watch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalConfig {
    /// Time between socket keepalive pings.
    pub ping_interval: Duration,
    /// How long to wait for a pong before reconnecting.
    pub ping_timeout: Duration,
    /// Grace period after a channel goes online before watching it.
    pub online_delay: Duration,
    /// Time between watch heartbeats.
    pub watch_interval: Duration,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(3 * 60),
            ping_timeout: Duration::from_secs(10),
            online_delay: Duration::from_secs(120),
            watch_interval: Duration::from_secs(20),
        }
    }
}

/// Invalid configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Capacity(#[from] CapacityError),
    #[error("{name} must be greater than zero")]
    ZeroInterval { name: &'static str },
}

/// Command-line and environment overrides for [`ClientConfig`].
#[derive(Debug, Clone, Args)]
pub struct ClientArgs {
    /// Client identity to present.
    #[arg(long, env = "DROPWIRE_CLIENT", value_enum, default_value_t = ClientKind::default())]
    pub client: ClientKind,

    /// Number of socket connections in the pool.
    #[arg(long, env = "DROPWIRE_POOL_SIZE", default_value_t = MAX_CONNECTIONS)]
    pub pool_size: usize,

    /// Protocol topic limit per connection.
    #[arg(long, env = "DROPWIRE_TOPICS_PER_CONNECTION", default_value_t = TOPICS_PER_CONNECTION)]
    pub topics_per_connection: usize,

    /// Topics per connection kept free.
    #[arg(long, env = "DROPWIRE_RESERVED_TOPICS", default_value_t = RESERVED_TOPICS_PER_CONNECTION)]
    pub reserved_topics: usize,

    /// Topics consumed by one watched channel.
    #[arg(long, env = "DROPWIRE_TOPICS_PER_CHANNEL", default_value_t = TOPICS_PER_CHANNEL)]
    pub topics_per_channel: usize,

    /// Seconds between keepalive pings.
    #[arg(long, env = "DROPWIRE_PING_INTERVAL_SECS", default_value_t = 180)]
    pub ping_interval_secs: u64,

    /// Seconds to wait for a pong.
    #[arg(long, env = "DROPWIRE_PING_TIMEOUT_SECS", default_value_t = 10)]
    pub ping_timeout_secs: u64,

    /// Seconds to wait after a channel goes online.
    #[arg(long, env = "DROPWIRE_ONLINE_DELAY_SECS", default_value_t = 120)]
    pub online_delay_secs: u64,

    /// Seconds between watch heartbeats.
    #[arg(long, env = "DROPWIRE_WATCH_INTERVAL_SECS", default_value_t = 20)]
    pub watch_interval_secs: u64,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, env = "DROPWIRE_LOG", default_value = "info")]
    pub log_level: String,

    /// Log output format.
    #[arg(long, env = "DROPWIRE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

impl ClientArgs {
    /// Validates the overrides into a config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for inconsistent capacity constants or a zero interval.
    pub fn into_config(self) -> Result<ClientConfig, ConfigError> {
        let capacity = CapacityModel::new(
            self.pool_size,
            self.topics_per_connection,
            self.reserved_topics,
            self.topics_per_channel,
        )?;
        let intervals = IntervalConfig {
            ping_interval: non_zero("ping interval", self.ping_interval_secs)?,
            ping_timeout: non_zero("ping timeout", self.ping_timeout_secs)?,
            online_delay: Duration::from_secs(self.online_delay_secs),
            watch_interval: non_zero("watch interval", self.watch_interval_secs)?,
        };
        Ok(ClientConfig {
            client: self.client,
            capacity,
            intervals,
            log: LogConfig {
                level: self.log_level,
                format: self.log_format,
            },
        })
    }
}

fn non_zero(name: &'static str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::ZeroInterval { name });
    }
    Ok(Duration::from_secs(secs))
}
