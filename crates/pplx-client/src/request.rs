//! The chat-completions request body.

use serde::Serialize;
use serde_json::{Value, json};

use pplx_core::{DATE_LAYOUT, DEFAULT_MODEL, Directive};

/// Temperature sent when the directive leaves it at zero.
pub const DEFAULT_TEMPERATURE: f64 = 0.2;

/// Top-p sent when the directive leaves it at zero.
pub const DEFAULT_TOP_P: f64 = 0.9;

/// A message in the request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireMessage {
    pub role: &'static str,
    pub content: String,
}

/// Approximate user location for localised search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserLocation {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// Web search tuning.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WebSearchOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_context_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_location: Option<UserLocation>,
}

/// Request body for `POST /chat/completions`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub temperature: f64,
    pub top_p: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub stream: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_domain_filter: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_recency_filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_search_options: Option<WebSearchOptions>,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub return_images: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub return_related_questions: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_domain_filter: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_format_filter: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_after_date_filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_before_date_filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated_after_filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated_before_filter: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,
}

impl Default for ChatCompletionRequest {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            messages: Vec::new(),
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            top_k: None,
            frequency_penalty: None,
            presence_penalty: None,
            max_tokens: None,
            stream: false,
            search_domain_filter: None,
            search_recency_filter: None,
            search_mode: None,
            web_search_options: None,
            return_images: false,
            return_related_questions: false,
            image_domain_filter: None,
            image_format_filter: None,
            response_format: None,
            search_after_date_filter: None,
            search_before_date_filter: None,
            last_updated_after_filter: None,
            last_updated_before_filter: None,
            reasoning_effort: None,
        }
    }
}

impl ChatCompletionRequest {
    /// Build a request by applying directives in order.
    ///
    /// Later directives override earlier ones.
    pub fn from_directives(directives: &[Directive]) -> Self {
        let mut request = Self::default();
        for directive in directives {
            request.apply(directive);
        }
        request
    }

    fn apply(&mut self, directive: &Directive) {
        match directive {
            Directive::Model(model) => self.model = model.clone(),
            Directive::Messages { system, user } => {
                self.messages.clear();
                if !system.is_empty() {
                    self.messages.push(WireMessage {
                        role: "system",
                        content: system.clone(),
                    });
                }
                self.messages.push(WireMessage {
                    role: "user",
                    content: user.clone(),
                });
            }
            Directive::Temperature(t) => {
                self.temperature = if *t > 0.0 { *t } else { DEFAULT_TEMPERATURE };
            }
            Directive::TopK(k) => self.top_k = (*k > 0).then_some(*k),
            Directive::TopP(p) => self.top_p = if *p > 0.0 { *p } else { DEFAULT_TOP_P },
            Directive::FrequencyPenalty(v) => self.frequency_penalty = non_zero(*v),
            Directive::PresencePenalty(v) => self.presence_penalty = non_zero(*v),
            Directive::MaxTokens(n) => self.max_tokens = (*n > 0).then_some(*n),
            Directive::SearchDomains(domains) => self.search_domain_filter = Some(domains.clone()),
            Directive::SearchRecency(recency) => {
                self.search_recency_filter = recency.map(|r| r.as_str().to_string());
            }
            Directive::Location {
                latitude,
                longitude,
                country,
            } => {
                self.web_search_options
                    .get_or_insert_with(WebSearchOptions::default)
                    .user_location = Some(UserLocation {
                    latitude: *latitude,
                    longitude: *longitude,
                    country: (!country.is_empty()).then(|| country.clone()),
                });
            }
            Directive::ReturnImages(on) => self.return_images = *on,
            Directive::ReturnRelated(on) => self.return_related_questions = *on,
            Directive::Stream(on) => self.stream = *on,
            Directive::ImageDomains(domains) => self.image_domain_filter = Some(domains.clone()),
            Directive::ImageFormats(formats) => self.image_format_filter = Some(formats.clone()),
            Directive::JsonSchema(schema) => {
                self.response_format = Some(json!({
                    "type": "json_schema",
                    "json_schema": { "schema": schema },
                }));
            }
            Directive::Regex(regex) => {
                self.response_format = Some(json!({
                    "type": "regex",
                    "regex": { "regex": regex },
                }));
            }
            Directive::SearchMode(mode) => self.search_mode = Some(mode.as_str().to_string()),
            Directive::SearchContextSize(size) => {
                self.web_search_options
                    .get_or_insert_with(WebSearchOptions::default)
                    .search_context_size = Some(size.as_str().to_string());
            }
            Directive::SearchAfterDate(d) => {
                self.search_after_date_filter = Some(d.format(DATE_LAYOUT).to_string());
            }
            Directive::SearchBeforeDate(d) => {
                self.search_before_date_filter = Some(d.format(DATE_LAYOUT).to_string());
            }
            Directive::LastUpdatedAfter(d) => {
                self.last_updated_after_filter = Some(d.format(DATE_LAYOUT).to_string());
            }
            Directive::LastUpdatedBefore(d) => {
                self.last_updated_before_filter = Some(d.format(DATE_LAYOUT).to_string());
            }
            Directive::ReasoningEffort(effort) => {
                self.reasoning_effort = Some(effort.as_str().to_string());
            }
        }
    }
}

fn non_zero(v: f64) -> Option<f64> {
    (v != 0.0).then_some(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pplx_core::{ParameterSet, compile};

    fn body(params: &ParameterSet) -> Value {
        let request = ChatCompletionRequest::from_directives(&compile(params).unwrap().directives);
        serde_json::to_value(request).unwrap()
    }

    #[test]
    fn test_minimal_request_uses_defaults() {
        let v = body(&ParameterSet::new("hello"));
        assert_eq!(v["model"], "sonar");
        assert_eq!(v["temperature"], 0.2);
        assert_eq!(v["top_p"], 0.9);
        assert_eq!(v["stream"], false);
        assert_eq!(v["messages"], json!([{ "role": "user", "content": "hello" }]));
        for absent in [
            "top_k",
            "max_tokens",
            "frequency_penalty",
            "presence_penalty",
            "search_recency_filter",
            "return_images",
            "web_search_options",
            "response_format",
        ] {
            assert!(v.get(absent).is_none(), "{absent} should be omitted");
        }
    }

    #[test]
    fn test_sampling_and_system_prompt() {
        let mut p = ParameterSet::new("hello").with_system_prompt("be terse");
        p.temperature = 0.7;
        p.top_k = 40;
        p.top_p = 0.5;
        p.presence_penalty = -0.5;
        p.max_tokens = 256;
        let v = body(&p);
        assert_eq!(v["messages"][0]["role"], "system");
        assert_eq!(v["messages"][1]["content"], "hello");
        assert_eq!(v["temperature"], 0.7);
        assert_eq!(v["top_k"], 40);
        assert_eq!(v["top_p"], 0.5);
        assert_eq!(v["presence_penalty"], -0.5);
        assert_eq!(v["max_tokens"], 256);
    }

    #[test]
    fn test_images_override_recency() {
        let mut p = ParameterSet::new("show me crabs");
        p.search_recency = "week".to_string();
        p.return_images = true;
        let v = body(&p);
        assert_eq!(v["return_images"], true);
        assert!(v.get("search_recency_filter").is_none());
    }

    #[test]
    fn test_search_options() {
        let mut p = ParameterSet::new("weather");
        p.search_domains = vec!["example.com".to_string()];
        p.search_recency = "day".to_string();
        p.search_mode = "academic".to_string();
        p.search_context_size = "high".to_string();
        p.location_lat = 48.85;
        p.location_lon = 2.35;
        p.location_country = "FR".to_string();
        let v = body(&p);
        assert_eq!(v["search_domain_filter"], json!(["example.com"]));
        assert_eq!(v["search_recency_filter"], "day");
        assert_eq!(v["search_mode"], "academic");
        assert_eq!(v["web_search_options"]["search_context_size"], "high");
        assert_eq!(
            v["web_search_options"]["user_location"],
            json!({ "latitude": 48.85, "longitude": 2.35, "country": "FR" })
        );
    }

    #[test]
    fn test_response_formats() {
        let mut p = ParameterSet::new("json please");
        p.response_format_json_schema = r#"{"type":"object"}"#.to_string();
        let v = body(&p);
        assert_eq!(
            v["response_format"],
            json!({ "type": "json_schema", "json_schema": { "schema": { "type": "object" } } })
        );

        let mut p = ParameterSet::new("digits please");
        p.response_format_regex = "[0-9]+".to_string();
        let v = body(&p);
        assert_eq!(
            v["response_format"],
            json!({ "type": "regex", "regex": { "regex": "[0-9]+" } })
        );
    }

    #[test]
    fn test_dates_keep_fixed_layout() {
        let mut p = ParameterSet::new("news");
        p.search_after_date = "01/05/2024".to_string();
        p.last_updated_before = "12/31/2024".to_string();
        let v = body(&p);
        assert_eq!(v["search_after_date_filter"], "01/05/2024");
        assert_eq!(v["last_updated_before_filter"], "12/31/2024");
        assert!(v.get("search_before_date_filter").is_none());
    }

    #[test]
    fn test_later_directives_override() {
        let request = ChatCompletionRequest::from_directives(&[
            Directive::SearchRecency(Some(pplx_core::Recency::Week)),
            Directive::SearchRecency(None),
            Directive::Model("sonar".to_string()),
            Directive::Model("sonar-pro".to_string()),
        ]);
        assert_eq!(request.search_recency_filter, None);
        assert_eq!(request.model, "sonar-pro");
    }
}
