//! Query compilation and execution engine for pplx.
//!
//! This crate owns everything between "the caller has a bag of query
//! parameters" and "the caller has one final answer". Both the terminal
//! `query` command and the MCP `perplexity_query` tool go through it, so the
//! two entry points behave identically.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────┐   ┌────────────┐   ┌────────────┐
//! │ ParameterSet │──▶│ validate  │──▶│  compile   │──▶│ Dispatcher │
//! └──────────────┘   └───────────┘   └────────────┘   └────────────┘
//!                                                          │
//!                          ┌───────────────────────────────┤
//!                          ▼                               ▼
//!                  Transport::send              Transport::send_stream
//!                          │                               │ mpsc (cap 1)
//!                          │                               ▼
//!                          │                        StreamReducer task
//!                          │                     (IncrementalRenderer hook)
//!                          ▼                               ▼
//!                  ┌──────────────────────────────────────────┐
//!                  │ format(CompletionResponse, Sink)         │
//!                  └──────────────────────────────────────────┘
//! ```
//!
//! The wire format itself lives behind the [`Transport`] trait; see the
//! `pplx-client` crate for the HTTP implementation.

pub mod compile;
pub mod dispatch;
pub mod error;
pub mod format;
pub mod params;
pub mod render;
pub mod types;
pub mod validate;

pub use compile::{CompileWarning, CompiledRequest, Directive, KNOWN_IMAGE_FORMATS, compile};
pub use dispatch::{
    Dispatcher, MockReply, MockTransport, SharedTransport, StreamReducer, Transport,
    TransportResult,
};
pub use error::{CompileError, Error, Result, TransportError, ValidationError};
pub use format::{Formatted, Sink, format};
pub use params::{
    ContextSize, DATE_LAYOUT, DEFAULT_MODEL, ParameterSet, ReasoningEffort, Recency, SearchMode,
    UnknownVariant,
};
pub use render::IncrementalRenderer;
pub use types::{Choice, CompletionResponse, ImageResult, Message, SearchResult, Sources, Usage};
pub use validate::validate;
