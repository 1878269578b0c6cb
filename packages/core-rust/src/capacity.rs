//! Connection-pool capacity arithmetic for the pub/sub socket protocol.
//!
//! Each socket connection may hold at most [`TOPICS_PER_CONNECTION`] topics,
//! of which [`RESERVED_TOPICS_PER_CONNECTION`] are kept free for overhead.
//! A watched channel needs [`TOPICS_PER_CHANNEL`] topics. With the defaults:
//!
//! ```
//! use dropwire_core::capacity::CapacityModel;
//!
//! let model = CapacityModel::DEFAULT;
//! assert_eq!(model.usable_topics_per_connection(), 47);
//! assert_eq!(model.total_usable_topics(), 376);
//! assert_eq!(model.max_channels(), 188);
//! ```

use serde::Serialize;

/// Number of socket connections in the pool.
pub const MAX_CONNECTIONS: usize = 8;

/// Protocol limit of topics per connection.
pub const TOPICS_PER_CONNECTION: usize = 50;

/// Topics per connection kept free for overhead.
pub const RESERVED_TOPICS_PER_CONNECTION: usize = 3;

/// Topics consumed by one watched channel.
pub const TOPICS_PER_CHANNEL: usize = 2;

/// Largest pool accepted by [`CapacityModel::new`].
pub const MAX_POOL_SIZE: usize = 1024;

/// Rejected capacity constants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapacityError {
    #[error("connection pool size must be at least 1")]
    EmptyPool,
    #[error("reserved topics ({reserved}) must be below the per-connection limit ({limit})")]
    ReservedExceedsLimit { reserved: usize, limit: usize },
    #[error("topics per channel must be at least 1")]
    ZeroTopicsPerChannel,
    #[error("connection pool size {pool_size} exceeds the maximum of {max}")]
    PoolTooLarge { pool_size: usize, max: usize },
    #[error("total topic capacity overflows: {pool_size} connections x {usable} topics")]
    Overflow { pool_size: usize, usable: usize },
}

/// Fixed protocol limits and the pool size, with the derived capacities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityModel {
    pool_size: usize,
    topics_per_connection: usize,
    reserved_per_connection: usize,
    topics_per_channel: usize,
}

impl CapacityModel {
    /// The protocol's published limits.
    pub const DEFAULT: Self = Self {
        pool_size: MAX_CONNECTIONS,
        topics_per_connection: TOPICS_PER_CONNECTION,
        reserved_per_connection: RESERVED_TOPICS_PER_CONNECTION,
        topics_per_channel: TOPICS_PER_CHANNEL,
    };

    /// Validates and builds a model.
    ///
    /// # Errors
    ///
    /// Returns a [`CapacityError`] for an empty or oversized pool, a
    /// reservation that leaves no usable topic, zero topics per channel, or a
    /// total capacity that does not fit in `usize`.
    pub fn new(
        pool_size: usize,
        topics_per_connection: usize,
        reserved_per_connection: usize,
        topics_per_channel: usize,
    ) -> Result<Self, CapacityError> {
        if pool_size == 0 {
            return Err(CapacityError::EmptyPool);
        }
        if pool_size > MAX_POOL_SIZE {
            return Err(CapacityError::PoolTooLarge {
                pool_size,
                max: MAX_POOL_SIZE,
            });
        }
        if reserved_per_connection >= topics_per_connection {
            return Err(CapacityError::ReservedExceedsLimit {
                reserved: reserved_per_connection,
                limit: topics_per_connection,
            });
        }
        if topics_per_channel == 0 {
            return Err(CapacityError::ZeroTopicsPerChannel);
        }
        let usable = topics_per_connection - reserved_per_connection;
        if pool_size.checked_mul(usable).is_none() {
            return Err(CapacityError::Overflow { pool_size, usable });
        }
        Ok(Self {
            pool_size,
            topics_per_connection,
            reserved_per_connection,
            topics_per_channel,
        })
    }

    #[must_use]
    pub const fn pool_size(&self) -> usize {
        self.pool_size
    }

    #[must_use]
    pub const fn topics_per_connection(&self) -> usize {
        self.topics_per_connection
    }

    #[must_use]
    pub const fn reserved_per_connection(&self) -> usize {
        self.reserved_per_connection
    }

    #[must_use]
    pub const fn topics_per_channel(&self) -> usize {
        self.topics_per_channel
    }

    /// `limit - reserved`.
    #[must_use]
    pub const fn usable_topics_per_connection(&self) -> usize {
        self.topics_per_connection - self.reserved_per_connection
    }

    /// `pool_size * usable_topics_per_connection`. Cannot overflow: `new`
    /// rejects models where it would.
    #[must_use]
    pub const fn total_usable_topics(&self) -> usize {
        self.pool_size * self.usable_topics_per_connection()
    }

    /// Whole channels that fit: `total_usable_topics / topics_per_channel`.
    #[must_use]
    pub const fn max_channels(&self) -> usize {
        self.total_usable_topics() / self.topics_per_channel
    }

    /// Whether `topics` more topics fit on top of `in_use`.
    #[must_use]
    pub const fn fits(&self, in_use: usize, topics: usize) -> bool {
        match in_use.checked_add(topics) {
            Some(total) => total <= self.total_usable_topics(),
            None => false,
        }
    }
}

impl Default for CapacityModel {
    fn default() -> Self {
        Self::DEFAULT
    }
}
