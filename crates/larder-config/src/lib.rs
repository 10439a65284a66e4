//! Configuration system for Larder.
//!
//! Provides TOML-based configuration with:
//! - Session lifetimes (`[session]`)
//! - Storage location, encryption and password hashing cost (`[storage]`)
//! - Logging filters and optional JSON log files (`[logging]`)
//! - Config file layering (user config dir + project-local overrides)

pub mod discovery;
pub mod error;
pub mod logging;
pub mod types;

pub use discovery::{
    LoadedConfig, load_config, load_config_file, load_config_with_options, user_config_dir,
    user_config_path,
};
pub use error::{ConfigError, Result};
pub use logging::init_tracing;
pub use types::*;
