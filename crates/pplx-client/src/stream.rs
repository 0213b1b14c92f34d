//! Server-sent event parsing for streamed completions.

use pplx_core::{CompletionResponse, TransportError};

/// Sentinel sent after the last event.
const DONE_MARKER: &str = "[DONE]";

/// Parse one SSE `data:` payload.
///
/// Returns `None` for keep-alives and the end marker.
pub(crate) fn parse_event(data: &str) -> Option<Result<CompletionResponse, TransportError>> {
    let data = data.trim();
    if data.is_empty() || data == DONE_MARKER {
        return None;
    }
    Some(serde_json::from_str(data).map_err(|e| {
        tracing::warn!(data = %data, error = %e, "Failed to parse stream event");
        TransportError::Decode(format!("invalid stream event: {}", e))
    }))
}

/// Turns a stream of events into a stream of cumulative results.
///
/// An event whose message is non-empty is already cumulative and replaces
/// the running text. An event carrying only a delta is appended to it.
/// Every event leaves with the full running text, including events that
/// have no choices at all.
#[derive(Debug, Default)]
pub(crate) struct StreamAccumulator {
    text: String,
}

impl StreamAccumulator {
    pub(crate) fn absorb(&mut self, mut event: CompletionResponse) -> CompletionResponse {
        if let Some(choice) = event.choices.first() {
            match (&choice.message, &choice.delta) {
                (Some(message), _) if !message.content.is_empty() => {
                    self.text.clone_from(&message.content);
                }
                (_, Some(delta)) => self.text.push_str(&delta.content),
                _ => {}
            }
        }
        // Choice-less events (usage trailers) still carry the running text
        event.set_content(self.text.clone());
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(json: &str) -> CompletionResponse {
        parse_event(json).unwrap().unwrap()
    }

    #[test]
    fn test_skips_done_and_blank() {
        assert!(parse_event("[DONE]").is_none());
        assert!(parse_event("  ").is_none());
    }

    #[test]
    fn test_malformed_event_is_decode_error() {
        let err = parse_event("{not json").unwrap().unwrap_err();
        assert!(matches!(err, TransportError::Decode(_)));
    }

    #[test]
    fn test_cumulative_messages_replace() {
        let mut acc = StreamAccumulator::default();
        let a = acc.absorb(event(
            r#"{"choices":[{"message":{"content":"Hel"},"delta":{"content":"Hel"}}]}"#,
        ));
        let b = acc.absorb(event(
            r#"{"choices":[{"message":{"content":"Hello"},"delta":{"content":"lo"}}]}"#,
        ));
        assert_eq!(a.content(), "Hel");
        assert_eq!(b.content(), "Hello");
    }

    #[test]
    fn test_delta_only_events_accumulate() {
        let mut acc = StreamAccumulator::default();
        let mut last = CompletionResponse::default();
        for chunk in ["Ru", "st", "acean"] {
            let json = format!(r#"{{"choices":[{{"delta":{{"content":"{}"}}}}]}}"#, chunk);
            last = acc.absorb(event(&json));
        }
        assert_eq!(last.content(), "Rustacean");
    }

    #[test]
    fn test_final_event_keeps_metadata() {
        let mut acc = StreamAccumulator::default();
        acc.absorb(event(r#"{"choices":[{"delta":{"content":"done"}}]}"#));
        let last = acc.absorb(event(
            r#"{"model":"sonar","citations":["https://a.example"],
                "usage":{"prompt_tokens":1,"completion_tokens":2,"total_tokens":3},
                "choices":[{"delta":{"content":""},"finish_reason":"stop"}]}"#,
        ));
        assert_eq!(last.content(), "done");
        assert_eq!(last.usage.total_tokens, 3);
        assert!(!last.sources().is_empty());
    }

    #[test]
    fn test_usage_trailer_keeps_running_text() {
        let mut acc = StreamAccumulator::default();
        acc.absorb(event(r#"{"choices":[{"delta":{"content":"The answer"}}]}"#));
        let last = acc.absorb(event(
            r#"{"model":"sonar","choices":[],
                "usage":{"prompt_tokens":3,"completion_tokens":2,"total_tokens":5}}"#,
        ));
        assert_eq!(last.content(), "The answer");
        assert_eq!(last.model, "sonar");
        assert_eq!(last.usage.total_tokens, 5);
    }
}
