//! Request dispatch and stream reduction.
//!
//! The wire protocol lives behind the [`Transport`] trait. The [`Dispatcher`]
//! drives it either as one blocking call or as a stream whose events are
//! handed to a single [`StreamReducer`] task over a capacity-1 channel, so the
//! producer cannot run ahead of the consumer by more than one observation.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::compile::{CompiledRequest, Directive};
use crate::error::{Error, Result, TransportError};
use crate::types::{CompletionResponse, Usage};

/// Result type for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Capacity of the producer/consumer hand-off channel.
///
/// tokio channels cannot be zero-capacity; one slot is the closest to a
/// rendezvous hand-off.
const STREAM_CHANNEL_CAPACITY: usize = 1;

// ─────────────────────────────────────────────────────────────────────────────
// Transport Trait
// ─────────────────────────────────────────────────────────────────────────────

/// The remote completion API.
///
/// Implementations own the wire format, authentication and the per-session
/// timeout. They never retry.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and wait for the complete answer.
    async fn send(&self, directives: &[Directive]) -> TransportResult<CompletionResponse>;

    /// Send one streaming request and push every event into `tx`.
    ///
    /// Each event is the full answer so far, never a delta. Returning drops
    /// `tx`, which closes the channel. Implementations should stop early if
    /// the receiver is gone.
    async fn send_stream(
        &self,
        directives: &[Directive],
        tx: mpsc::Sender<CompletionResponse>,
    ) -> TransportResult<()>;

    /// Name used in logs.
    fn name(&self) -> &str {
        "transport"
    }
}

/// A transport that can be shared across tasks.
pub type SharedTransport = Arc<dyn Transport>;

// ─────────────────────────────────────────────────────────────────────────────
// Stream Reducer
// ─────────────────────────────────────────────────────────────────────────────

/// Keeps only the latest observation of a cumulative stream.
///
/// Every observation replaces the held result; nothing is concatenated. The
/// optional observer sees each observation before it is stored, which is
/// where incremental rendering hooks in.
pub struct StreamReducer<F> {
    latest: Option<CompletionResponse>,
    observations: usize,
    observer: F,
}

impl StreamReducer<fn(&CompletionResponse)> {
    /// A reducer with no observer.
    pub fn silent() -> Self {
        fn ignore(_: &CompletionResponse) {}
        StreamReducer::new(ignore as fn(&CompletionResponse))
    }
}

impl<F> StreamReducer<F>
where
    F: FnMut(&CompletionResponse),
{
    /// Create a reducer that calls `observer` on every observation.
    pub fn new(observer: F) -> Self {
        Self {
            latest: None,
            observations: 0,
            observer,
        }
    }

    /// Record one observation.
    pub fn observe(&mut self, response: CompletionResponse) {
        (self.observer)(&response);
        self.latest = Some(response);
        self.observations += 1;
    }

    /// Number of observations so far.
    pub fn observations(&self) -> usize {
        self.observations
    }

    /// Consume the reducer, yielding the last observation if there was one.
    pub fn finish(self) -> Option<CompletionResponse> {
        self.latest
    }

    /// Drain `rx` until the producer closes it.
    pub async fn run(
        mut self,
        mut rx: mpsc::Receiver<CompletionResponse>,
    ) -> Option<CompletionResponse> {
        while let Some(response) = rx.recv().await {
            self.observe(response);
        }
        tracing::trace!(observations = self.observations, "Stream closed");
        self.finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatcher
// ─────────────────────────────────────────────────────────────────────────────

/// Issues compiled requests against a transport.
#[derive(Clone)]
pub struct Dispatcher {
    transport: SharedTransport,
}

impl Dispatcher {
    /// Create a dispatcher over the given transport.
    pub fn new(transport: SharedTransport) -> Self {
        Self { transport }
    }

    /// Dispatch a request, returning the final result.
    pub async fn dispatch(
        &self,
        request: &CompiledRequest,
        streaming: bool,
    ) -> Result<CompletionResponse> {
        if streaming {
            self.dispatch_with_observer(request, |_: &CompletionResponse| {})
                .await
        } else {
            self.dispatch_blocking(request).await
        }
    }

    /// Dispatch a streaming request, calling `observer` on each observation.
    ///
    /// Exactly one consumer task is spawned; the caller waits on it before
    /// reading the reduced result.
    pub async fn dispatch_with_observer<F>(
        &self,
        request: &CompiledRequest,
        observer: F,
    ) -> Result<CompletionResponse>
    where
        F: FnMut(&CompletionResponse) + Send + 'static,
    {
        tracing::debug!(
            transport = self.transport.name(),
            model = request.model().unwrap_or_default(),
            "Dispatching streaming request"
        );

        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let consumer = tokio::spawn(StreamReducer::new(observer).run(rx));

        let produced = self.transport.send_stream(&request.directives, tx).await;

        let reduced = consumer
            .await
            .map_err(|e| Error::Stream(format!("stream consumer failed: {}", e)))?;

        if let Err(e) = produced {
            tracing::warn!(error = %e, "Streaming request failed");
            return Err(Error::Request(e));
        }

        reduced.ok_or_else(|| Error::Stream("no response received".to_string()))
    }

    async fn dispatch_blocking(&self, request: &CompiledRequest) -> Result<CompletionResponse> {
        tracing::debug!(
            transport = self.transport.name(),
            model = request.model().unwrap_or_default(),
            "Dispatching request"
        );

        let response = self.transport.send(&request.directives).await.map_err(|e| {
            tracing::warn!(error = %e, "Request failed");
            Error::Request(e)
        })?;

        tracing::debug!(
            model = %response.model,
            total_tokens = response.usage.total_tokens,
            "Received response"
        );
        Ok(response)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock Transport
// ─────────────────────────────────────────────────────────────────────────────

/// One scripted reply of a [`MockTransport`].
#[derive(Debug, Clone)]
pub enum MockReply {
    /// A single complete response.
    Response(CompletionResponse),
    /// A sequence of cumulative events, optionally ending in an error.
    Stream {
        events: Vec<CompletionResponse>,
        error: Option<TransportError>,
    },
    /// An immediate failure.
    Error(TransportError),
}

/// A transport for testing.
///
/// Replies are consumed in order, one per request. Every request's
/// directives are recorded.
#[derive(Debug, Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<Vec<Directive>>>,
}

impl MockTransport {
    /// Create a mock with the given replies.
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A mock answering once with `text`.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::new(vec![MockReply::Response(CompletionResponse::new(
            "sonar",
            text,
            Usage::new(10, 20),
        ))])
    }

    /// A mock streaming the given cumulative texts.
    pub fn streaming<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let events = texts
            .into_iter()
            .enumerate()
            .map(|(i, t)| CompletionResponse::new("sonar", t, Usage::new(10, i as u32 + 1)))
            .collect();
        Self::new(vec![MockReply::Stream {
            events,
            error: None,
        }])
    }

    /// A mock failing once with `error`.
    pub fn failing(error: TransportError) -> Self {
        Self::new(vec![MockReply::Error(error)])
    }

    /// Directives of every request made so far.
    pub fn requests(&self) -> Vec<Vec<Directive>> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of requests made.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn next_reply(&self, directives: &[Directive]) -> TransportResult<MockReply> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(directives.to_vec());
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .ok_or_else(|| TransportError::Network("MockTransport: no more replies".to_string()))
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, directives: &[Directive]) -> TransportResult<CompletionResponse> {
        match self.next_reply(directives)? {
            MockReply::Response(r) => Ok(r),
            MockReply::Stream { events, error } => match error {
                Some(e) => Err(e),
                None => events
                    .into_iter()
                    .last()
                    .ok_or_else(|| TransportError::Decode("empty response".to_string())),
            },
            MockReply::Error(e) => Err(e),
        }
    }

    async fn send_stream(
        &self,
        directives: &[Directive],
        tx: mpsc::Sender<CompletionResponse>,
    ) -> TransportResult<()> {
        let (events, error) = match self.next_reply(directives)? {
            MockReply::Response(r) => (vec![r], None),
            MockReply::Stream { events, error } => (events, error),
            MockReply::Error(e) => return Err(e),
        };
        for event in events {
            if tx.send(event).await.is_err() {
                break;
            }
        }
        match error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
