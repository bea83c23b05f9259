//! Read-only slices of [`ServerConfig`] for the subsystems that consume it.
//!
//! Each view copies the handful of fields one consumer needs, so the
//! listener bootstrap, the query executor and the announcer do not depend on
//! the whole configuration.

use std::time::Duration;

use crate::config::ServerConfig;

/// Parameters for the HTTP listener and its thread pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerSettings {
    pub num_threads: u32,
    pub queue_size: u32,
    pub max_idle_time: Duration,
    pub max_request_header_size: u32,
    pub graceful_shutdown_timeout: Duration,
    pub inflate_buffer_size: u32,
    pub compression_level: i32,
}

/// Limits the query execution layer enforces per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    pub default_query_timeout: Duration,
    pub max_query_timeout: Duration,
    pub max_scatter_gather_bytes: u64,
    pub enable_request_limit: bool,
}

impl QueryLimits {
    /// Timeout for a query that asked for `requested`.
    ///
    /// Queries without a timeout get the default. Returns `None` when the
    /// requested timeout is above the configured maximum; such queries must
    /// be rejected rather than silently clamped.
    #[must_use]
    pub fn effective_timeout(&self, requested: Option<Duration>) -> Option<Duration> {
        match requested {
            None => Some(self.default_query_timeout),
            Some(timeout) if timeout > self.max_query_timeout => None,
            Some(timeout) => Some(timeout),
        }
    }
}

/// Timing for leaving cluster membership on shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnouncementSettings {
    pub unannounce_propagation_delay: Duration,
}

impl ServerConfig {
    /// Settings for the HTTP listener bootstrap.
    #[must_use]
    pub fn listener(&self) -> ListenerSettings {
        ListenerSettings {
            num_threads: self.num_threads(),
            queue_size: self.queue_size(),
            max_idle_time: self.max_idle_time(),
            max_request_header_size: self.max_request_header_size(),
            graceful_shutdown_timeout: self.graceful_shutdown_timeout(),
            inflate_buffer_size: self.inflate_buffer_size(),
            compression_level: self.compression_level(),
        }
    }

    /// Limits for the query execution layer.
    #[must_use]
    pub fn query_limits(&self) -> QueryLimits {
        QueryLimits {
            default_query_timeout: self.default_query_timeout_duration(),
            max_query_timeout: self.max_query_timeout_duration(),
            max_scatter_gather_bytes: self.max_scatter_gather_bytes(),
            enable_request_limit: self.enable_request_limit(),
        }
    }

    /// Settings for cluster announcement.
    #[must_use]
    pub fn announcement(&self) -> AnnouncementSettings {
        AnnouncementSettings {
            unannounce_propagation_delay: self.unannounce_propagation_delay(),
        }
    }
}
