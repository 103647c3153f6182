//! Infrastructure - configuration, errors, and logging
//!
//! This module contains infrastructure concerns:
//! - `config` - engine configuration (TOML loading, defaults)
//! - `error` - the engine error taxonomy
//! - `logging` - tracing subscriber setup

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::Config;
pub use error::EngineError;
