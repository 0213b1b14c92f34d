//! Rendering a final result for one of the output sinks.

use serde_json::{Map, Value, json};
use std::fmt::{self, Write as _};

use crate::types::{CompletionResponse, Sources};

/// Where a formatted result is headed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sink {
    /// Human-readable text. `include_content` is false when the answer was
    /// already rendered incrementally.
    Text { include_content: bool },
    /// A structured JSON object.
    Json,
    /// An MCP tool-call result envelope.
    ToolResult,
}

/// A formatted result.
#[derive(Debug, Clone, PartialEq)]
pub enum Formatted {
    Text(String),
    Json(Value),
    ToolResult(Value),
}

impl fmt::Display for Formatted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formatted::Text(text) => f.write_str(text),
            Formatted::Json(value) | Formatted::ToolResult(value) => {
                let pretty = serde_json::to_string_pretty(value).map_err(|_| fmt::Error)?;
                f.write_str(&pretty)
            }
        }
    }
}

/// Format `response` for `sink`.
///
/// Content, model and usage are always present. Sources, images and related
/// questions appear only when the response carries a non-empty list.
pub fn format(response: &CompletionResponse, sink: Sink) -> Formatted {
    match sink {
        Sink::Text { include_content } => Formatted::Text(render_text(response, include_content)),
        Sink::Json => Formatted::Json(render_json(response)),
        Sink::ToolResult => Formatted::ToolResult(json!({
            "content": [{ "type": "text", "text": render_text(response, true) }],
            "isError": false,
        })),
    }
}

fn render_text(response: &CompletionResponse, include_content: bool) -> String {
    let mut out = String::new();

    if include_content {
        out.push_str(response.content().trim_end());
        out.push('\n');
    }

    match response.sources() {
        Sources::SearchResults(results) if !results.is_empty() => {
            out.push_str("\nSources:\n");
            for (i, r) in results.iter().enumerate() {
                let title = if r.title.is_empty() { &r.url } else { &r.title };
                let _ = write!(out, "  [{}] {}\n      {}", i + 1, title, r.url);
                match (&r.date, &r.last_updated) {
                    (Some(date), Some(updated)) => {
                        let _ = write!(out, " (published {}, updated {})", date, updated);
                    }
                    (Some(date), None) => {
                        let _ = write!(out, " (published {})", date);
                    }
                    (None, Some(updated)) => {
                        let _ = write!(out, " (updated {})", updated);
                    }
                    (None, None) => {}
                }
                out.push('\n');
            }
        }
        Sources::Citations(urls) if !urls.is_empty() => {
            out.push_str("\nCitations:\n");
            for (i, url) in urls.iter().enumerate() {
                let _ = writeln!(out, "  [{}] {}", i + 1, url);
            }
        }
        _ => {}
    }

    let images = response.images();
    if !images.is_empty() {
        out.push_str("\nImages:\n");
        for (i, img) in images.iter().enumerate() {
            let _ = write!(out, "  [{}] {}", i + 1, img.image_url);
            if img.width > 0 && img.height > 0 {
                let _ = write!(out, " ({}x{})", img.width, img.height);
            }
            if !img.origin_url.is_empty() {
                let _ = write!(out, "\n      from {}", img.origin_url);
            }
            out.push('\n');
        }
    }

    let related = response.related_questions();
    if !related.is_empty() {
        out.push_str("\nRelated questions:\n");
        for q in related {
            let _ = writeln!(out, "  - {}", q);
        }
    }

    let usage = &response.usage;
    let _ = writeln!(
        out,
        "\nModel: {} | Tokens: {} prompt, {} completion, {} total",
        response.model, usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
    );

    out
}

fn render_json(response: &CompletionResponse) -> Value {
    let mut obj = Map::new();
    obj.insert("content".into(), json!(response.content()));
    obj.insert("model".into(), json!(response.model));
    obj.insert("usage".into(), json!(response.usage));

    match response.sources() {
        Sources::SearchResults(results) if !results.is_empty() => {
            obj.insert("search_results".into(), json!(results));
        }
        Sources::Citations(urls) if !urls.is_empty() => {
            obj.insert("citations".into(), json!(urls));
        }
        _ => {}
    }

    if !response.images().is_empty() {
        obj.insert("images".into(), json!(response.images()));
    }
    if !response.related_questions().is_empty() {
        obj.insert("related_questions".into(), json!(response.related_questions()));
    }

    Value::Object(obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ImageResult, SearchResult, Usage};

    fn response() -> CompletionResponse {
        CompletionResponse::new("sonar", "Rust 1.85 stabilised async closures.", Usage::new(12, 30))
    }

    #[test]
    fn test_text_minimal() {
        let Formatted::Text(text) = format(&response(), Sink::Text { include_content: true }) else {
            panic!("expected text");
        };
        assert!(text.starts_with("Rust 1.85 stabilised async closures.\n"));
        assert!(text.contains("Model: sonar | Tokens: 12 prompt, 30 completion, 42 total"));
        assert!(!text.contains("Sources:"));
        assert!(!text.contains("Citations:"));
        assert!(!text.contains("Images:"));
        assert!(!text.contains("Related questions:"));
    }

    #[test]
    fn test_text_without_content() {
        let text = format(&response(), Sink::Text { include_content: false }).to_string();
        assert!(!text.contains("async closures"));
        assert!(text.contains("Model: sonar"));
    }

    #[test]
    fn test_search_results_preferred_over_citations() {
        let mut resp = response();
        resp.citations = Some(vec!["https://old.example".to_string()]);
        resp.search_results = Some(vec![SearchResult {
            title: "Release notes".to_string(),
            url: "https://blog.rust-lang.org".to_string(),
            date: Some("2025-02-20".to_string()),
            last_updated: None,
        }]);

        let text = format(&resp, Sink::Text { include_content: true }).to_string();
        assert!(text.contains("[1] Release notes"));
        assert!(text.contains("(published 2025-02-20)"));
        assert!(!text.contains("old.example"));

        let Formatted::Json(value) = format(&resp, Sink::Json) else {
            panic!("expected json");
        };
        assert!(value.get("search_results").is_some());
        assert!(value.get("citations").is_none());
    }

    #[test]
    fn test_citations_fallback_when_search_results_absent() {
        let mut resp = response();
        resp.citations = Some(vec!["https://a.example".to_string()]);
        let text = format(&resp, Sink::Text { include_content: true }).to_string();
        assert!(text.contains("Citations:\n  [1] https://a.example"));

        let Formatted::Json(value) = format(&resp, Sink::Json) else {
            panic!("expected json");
        };
        assert_eq!(value["citations"][0], "https://a.example");
    }

    #[test]
    fn test_empty_search_results_do_not_fall_back() {
        let mut resp = response();
        resp.search_results = Some(vec![]);
        resp.citations = Some(vec!["https://a.example".to_string()]);
        let text = format(&resp, Sink::Text { include_content: true }).to_string();
        assert!(!text.contains("a.example"));
    }

    #[test]
    fn test_images_and_related_questions() {
        let mut resp = response();
        resp.images = Some(vec![ImageResult {
            image_url: "https://img.example/crab.png".to_string(),
            origin_url: "https://rustacean.net".to_string(),
            width: 800,
            height: 600,
        }]);
        resp.related_questions = Some(vec!["What is Rust 2024?".to_string()]);

        let text = format(&resp, Sink::Text { include_content: true }).to_string();
        assert!(text.contains("https://img.example/crab.png (800x600)"));
        assert!(text.contains("from https://rustacean.net"));
        assert!(text.contains("  - What is Rust 2024?"));

        let Formatted::Json(value) = format(&resp, Sink::Json) else {
            panic!("expected json");
        };
        assert_eq!(value["images"][0]["width"], 800);
        assert_eq!(value["related_questions"][0], "What is Rust 2024?");
    }

    #[test]
    fn test_json_always_has_core_fields() {
        let Formatted::Json(value) = format(&response(), Sink::Json) else {
            panic!("expected json");
        };
        assert_eq!(value["content"], "Rust 1.85 stabilised async closures.");
        assert_eq!(value["model"], "sonar");
        assert_eq!(value["usage"]["total_tokens"], 42);
        assert!(value.get("images").is_none());
        assert!(value.get("related_questions").is_none());
    }

    #[test]
    fn test_tool_result_envelope() {
        let Formatted::ToolResult(value) = format(&response(), Sink::ToolResult) else {
            panic!("expected tool result");
        };
        assert_eq!(value["isError"], false);
        assert_eq!(value["content"][0]["type"], "text");
        assert!(
            value["content"][0]["text"]
                .as_str()
                .unwrap()
                .contains("async closures")
        );
    }
}
