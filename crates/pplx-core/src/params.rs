//! The parameter set for one query and its enumerated values.
//!
//! A [`ParameterSet`] is deliberately loosely typed: enum-like fields are
//! plain strings where empty means "unset". Whichever entry point built it
//! (CLI flags, MCP tool arguments, config defaults) never has to know the
//! legal values; [`validate`](crate::validate) and
//! [`compile`](crate::compile) do.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The only accepted date layout, `MM/DD/YYYY`.
pub const DATE_LAYOUT: &str = "%m/%d/%Y";

/// Model used when nothing else is configured.
pub const DEFAULT_MODEL: &str = "sonar";

/// All inputs of one query.
///
/// Sampling fields left at zero mean "use the library default".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterSet {
    // identity / model
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,

    // sampling
    pub temperature: f64,
    pub top_k: u32,
    pub top_p: f64,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
    pub max_tokens: u32,

    // web search filters
    pub search_domains: Vec<String>,
    pub search_recency: String,
    pub location_lat: f64,
    pub location_lon: f64,
    pub location_country: String,

    // response enhancement
    pub return_images: bool,
    pub return_related: bool,
    pub stream: bool,

    // image filters
    pub image_domains: Vec<String>,
    pub image_formats: Vec<String>,

    // response shape, at most one set
    pub response_format_json_schema: String,
    pub response_format_regex: String,

    // search behaviour
    pub search_mode: String,
    pub search_context_size: String,

    // temporal filters, MM/DD/YYYY
    pub search_after_date: String,
    pub search_before_date: String,
    pub last_updated_after: String,
    pub last_updated_before: String,

    pub reasoning_effort: String,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            system_prompt: String::new(),
            user_prompt: String::new(),
            temperature: 0.0,
            top_k: 0,
            top_p: 0.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            max_tokens: 0,
            search_domains: Vec::new(),
            search_recency: String::new(),
            location_lat: 0.0,
            location_lon: 0.0,
            location_country: String::new(),
            return_images: false,
            return_related: false,
            stream: false,
            image_domains: Vec::new(),
            image_formats: Vec::new(),
            response_format_json_schema: String::new(),
            response_format_regex: String::new(),
            search_mode: String::new(),
            search_context_size: String::new(),
            search_after_date: String::new(),
            search_before_date: String::new(),
            last_updated_after: String::new(),
            last_updated_before: String::new(),
            reasoning_effort: String::new(),
        }
    }
}

impl ParameterSet {
    /// Create a parameter set for a single prompt with default settings.
    pub fn new(user_prompt: impl Into<String>) -> Self {
        Self {
            user_prompt: user_prompt.into(),
            ..Default::default()
        }
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Enable streaming.
    pub fn streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Returns true if either response-shape field is set.
    pub fn has_response_format(&self) -> bool {
        !self.response_format_json_schema.is_empty() || !self.response_format_regex.is_empty()
    }

    /// Returns true if any part of the geographic hint differs from its default.
    pub fn has_location(&self) -> bool {
        self.location_lat != 0.0 || self.location_lon != 0.0 || !self.location_country.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Enumerated Values
// ─────────────────────────────────────────────────────────────────────────────

/// Error returned when a string is not one of an enum's legal values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub value: String,
    pub expected: &'static [&'static str],
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown value '{}', must be one of: {}",
            self.value,
            self.expected.join(", ")
        )
    }
}

impl std::error::Error for UnknownVariant {}

/// Declares a string-backed enum with `as_str`, `VALUES`, `Display` and `FromStr`.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every legal value, in declaration order.
            pub const VALUES: &'static [&'static str] = &[$($text),+];

            /// The wire spelling of this value.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        value: other.to_string(),
                        expected: Self::VALUES,
                    }),
                }
            }
        }
    };
}

string_enum! {
    /// How recent search results must be.
    Recency {
        Hour => "hour",
        Day => "day",
        Week => "week",
        Month => "month",
        Year => "year",
    }
}

string_enum! {
    /// Which corpus the search runs against.
    SearchMode {
        Web => "web",
        Academic => "academic",
    }
}

string_enum! {
    /// How much search context is retrieved.
    ContextSize {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
}

string_enum! {
    /// Reasoning depth for deep-research models.
    ReasoningEffort {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
}
