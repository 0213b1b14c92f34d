//! HTTP transport for the Perplexity chat-completions API.
//!
//! [`PerplexityClient`] implements [`pplx_core::Transport`]: it turns a
//! compiled directive sequence into the API's JSON request body, sends it,
//! and parses either the single JSON answer or the server-sent event stream.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use pplx_client::PerplexityClient;
//! use pplx_core::{Dispatcher, ParameterSet, compile};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = PerplexityClient::builder()
//!     .api_key("pplx-...")
//!     .timeout(Duration::from_secs(60))
//!     .build()?;
//!
//! let request = compile(&ParameterSet::new("What is new in Rust 2024?"))?;
//! let answer = Dispatcher::new(Arc::new(client)).dispatch(&request, false).await?;
//! println!("{}", answer.content());
//! # Ok(())
//! # }
//! ```

mod client;
mod request;
mod stream;

pub use client::{ClientBuilder, DEFAULT_BASE_URL, DEFAULT_TIMEOUT, PerplexityClient};
pub use request::{ChatCompletionRequest, UserLocation, WebSearchOptions, WireMessage};
