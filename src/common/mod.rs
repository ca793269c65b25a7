//! Shared infrastructure: configuration loading, logging setup and the
//! crate-wide error type.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{ConfigError, LoggerConfig, PolicyConfig};
pub use error::{Result, SigLogError};
pub use logging::{init_logging, LogLevel, LoggingError};
