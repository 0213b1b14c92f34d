//! Result types returned by the completion API.
//!
//! These mirror the JSON the API returns for both blocking and streamed
//! responses. Everything beyond the answer text is optional and parsed
//! leniently: absent, `null` and empty are all treated as "nothing to show".

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Token accounting for one completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub prompt_tokens: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub completion_tokens: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_search_queries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_context_size: Option<String>,
}

impl Usage {
    /// Create usage counters from prompt and completion tokens.
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            ..Default::default()
        }
    }
}

/// A chat message as returned inside a choice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, deserialize_with = "null_as_default")]
    pub role: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
}

/// One completion choice.
///
/// Streamed events may carry the text in `message`, in `delta`, or both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// A web source the answer was grounded on.
///
/// Entries without a `url` are dropped while parsing the response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

/// An image returned alongside the answer.
///
/// Entries without an `image_url` are dropped while parsing the response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageResult {
    pub image_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub origin_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub width: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub height: u32,
}

/// A complete (or, mid-stream, cumulative) completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub usage: Usage,
    #[serde(default)]
    pub choices: Vec<Choice>,
    /// Newer structured sources.
    #[serde(default, deserialize_with = "lenient_list", skip_serializing_if = "Option::is_none")]
    pub search_results: Option<Vec<SearchResult>>,
    /// Deprecated flat list of source URLs.
    #[serde(default, deserialize_with = "lenient_list", skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_list", skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<ImageResult>>,
    /// Not populated by the API today.
    #[serde(default, deserialize_with = "lenient_list", skip_serializing_if = "Option::is_none")]
    pub related_questions: Option<Vec<String>>,
}

impl CompletionResponse {
    /// Create a response holding a single assistant message.
    pub fn new(model: impl Into<String>, content: impl Into<String>, usage: Usage) -> Self {
        Self {
            model: model.into(),
            usage,
            choices: vec![Choice {
                index: 0,
                message: Some(Message {
                    role: "assistant".to_string(),
                    content: content.into(),
                }),
                delta: None,
                finish_reason: None,
            }],
            ..Default::default()
        }
    }

    /// The answer text of the first choice.
    ///
    /// Prefers the full message and falls back to the delta.
    pub fn content(&self) -> &str {
        let Some(choice) = self.choices.first() else {
            return "";
        };
        match (&choice.message, &choice.delta) {
            (Some(m), _) if !m.content.is_empty() => &m.content,
            (_, Some(d)) => &d.content,
            (Some(m), None) => &m.content,
            (None, None) => "",
        }
    }

    /// Replace the first choice's message content.
    pub fn set_content(&mut self, content: String) {
        if self.choices.is_empty() {
            self.choices.push(Choice::default());
        }
        let choice = &mut self.choices[0];
        match choice.message.as_mut() {
            Some(message) => message.content = content,
            None => {
                choice.message = Some(Message {
                    role: "assistant".to_string(),
                    content,
                })
            }
        }
    }

    /// Sources to display: structured search results when the field is
    /// present, otherwise the flat citation list. Never both.
    pub fn sources(&self) -> Sources<'_> {
        match (&self.search_results, &self.citations) {
            (Some(results), _) => Sources::SearchResults(results),
            (None, Some(urls)) => Sources::Citations(urls),
            (None, None) => Sources::None,
        }
    }

    /// Images, if any were returned.
    pub fn images(&self) -> &[ImageResult] {
        self.images.as_deref().unwrap_or_default()
    }

    /// Related questions, if any were returned.
    pub fn related_questions(&self) -> &[String] {
        self.related_questions.as_deref().unwrap_or_default()
    }
}

/// Which source list a response carries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sources<'a> {
    SearchResults(&'a [SearchResult]),
    Citations(&'a [String]),
    None,
}

impl Sources<'_> {
    /// Returns true if there is nothing to show.
    pub fn is_empty(&self) -> bool {
        match self {
            Sources::SearchResults(r) => r.is_empty(),
            Sources::Citations(c) => c.is_empty(),
            Sources::None => true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Lenient decoding
// ─────────────────────────────────────────────────────────────────────────────

/// Treats an explicit `null` like an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decodes a list item by item, skipping entries that do not fit `T`.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Some(items) = Option::<Vec<Value>>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let kept = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping malformed list entry");
                None
            }
        })
        .collect();
    Ok(Some(kept))
}
