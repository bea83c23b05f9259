//! Query server core — validated HTTP listener and query-limit configuration.

pub mod config;
pub mod constraint;
pub mod error;
pub mod hardware;
pub mod period;
pub mod views;

pub use config::{ServerConfig, ServerConfigOverrides, Setting};
pub use constraint::{Constraint, FieldRule, FIELD_RULES};
pub use error::ValidationError;
pub use hardware::{FixedProcessors, HostProcessors, ProcessorCount};
pub use views::{AnnouncementSettings, ListenerSettings, QueryLimits};
