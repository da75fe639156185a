//! # Utility Modules
//!
//! - **Logging**: `tracing-subscriber` setup driven by [`LoggingConfig`](crate::config::LoggingConfig)
//! - **Time**: unix clock helpers for token validity windows and cache expiry

pub mod logging;
pub mod time;

pub use logging::init_logging;
