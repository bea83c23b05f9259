//! Query server bootstrap — loads, validates and logs the HTTP server configuration.

pub mod loader;
pub mod logging;

pub use loader::{resolve, LoadError, DEFAULT_PROPERTY_PREFIX};
pub use logging::{init_logging, LogFormat};
