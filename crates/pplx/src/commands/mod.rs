//! CLI command handlers.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};

use pplx_client::PerplexityClient;
use pplx_config::LoadedConfig;
use pplx_core::SharedTransport;

pub mod config;
pub mod mcp;
pub mod query;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    /// Explicit config file, replacing discovery.
    pub config_path: Option<PathBuf>,
}

impl Context {
    /// Load the config file(s) this invocation should use.
    pub fn load_config(&self) -> Result<LoadedConfig> {
        let loaded = match &self.config_path {
            Some(path) => pplx_config::load_config_from(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => pplx_config::load_config(None)?,
        };
        for warning in &loaded.warnings {
            tracing::warn!("{}", warning);
        }
        Ok(loaded)
    }
}

/// Build the Perplexity transport from config and the resolved API key.
///
/// `timeout` overrides `[api].timeout_secs` when given.
pub fn build_transport(loaded: &LoadedConfig, timeout: Option<u64>) -> Result<SharedTransport> {
    let secret = loaded.api_key()?;
    tracing::debug!(source = %secret.source, "Resolved API key");

    let mut builder = PerplexityClient::builder().api_key(secret.value);
    if let Some(base_url) = &loaded.config.api.base_url {
        builder = builder.base_url(base_url.clone());
    }
    if let Some(secs) = timeout.or(loaded.config.api.timeout_secs) {
        builder = builder.timeout(Duration::from_secs(secs));
    }

    let client = builder.build().context("creating Perplexity client")?;
    tracing::debug!(endpoint = %client.endpoint(), timeout = ?client.timeout(), "Client ready");
    Ok(Arc::new(client))
}
