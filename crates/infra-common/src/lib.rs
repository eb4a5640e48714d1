//! Shared infrastructure for voxcall
//!
//! - `errors`: the infrastructure error type and error context helpers
//! - `logging`: tracing subscriber setup
//! - `config`: TOML configuration loading

pub mod config;
pub mod errors;
pub mod logging;

pub use config::{load_toml_file, parse_toml};
pub use errors::{Error, ErrorContext, ErrorExt, Result};
pub use logging::{log_welcome, parse_log_level, setup_logging, LoggingConfig};
