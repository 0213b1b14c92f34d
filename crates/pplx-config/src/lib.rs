//! Configuration system for pplx.
//!
//! Provides TOML-based configuration with:
//! - API connection settings (`[api]`)
//! - Default query parameters (`[defaults]`) merged under CLI flags and MCP
//!   tool arguments
//! - Config file layering (user config dir + project-local override)
//! - API key resolution (env var, then config file)

pub mod discovery;
pub mod error;
pub mod secrets;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, config_dir, load_config, load_config_file, load_config_from,
    load_config_with_options, log_dir, user_config_path,
};
pub use error::{ConfigError, Result};
pub use secrets::{
    API_KEY_ENV_VARS, ResolvedSecret, SecretSource, mask_secret, resolve_api_key,
    resolve_api_key_with,
};
pub use types::{ApiConfig, PplxConfig, QueryDefaults};
