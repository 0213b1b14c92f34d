//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [api]
//! base_url = "https://api.perplexity.ai"
//! timeout_secs = 120
//!
//! [defaults]
//! model = "sonar-pro"
//! search_context_size = "medium"
//! search_domains = ["docs.rs", "doc.rust-lang.org"]
//! ```

use serde::{Deserialize, Serialize};

use pplx_core::ParameterSet;

use crate::secrets::mask_secret;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// Every field is optional so that partial files (e.g. a project-local
/// override) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PplxConfig {
    /// API connection settings.
    pub api: ApiConfig,

    /// Default query parameters.
    pub defaults: QueryDefaults,
}

impl PplxConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: PplxConfig) {
        self.api.merge(other.api);
        self.defaults.merge(other.defaults);
    }

    /// A copy safe to print, with the API key masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.api.api_key = copy.api.api_key.as_deref().map(mask_secret);
        copy
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// API Section
// ─────────────────────────────────────────────────────────────────────────────

/// `[api]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API key stored in plaintext. Prefer `PPLX_API_KEY`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// API base URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Overall request deadline in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl ApiConfig {
    /// Merge another section on top of this one (other takes priority).
    pub fn merge(&mut self, other: ApiConfig) {
        if other.api_key.is_some() {
            self.api_key = other.api_key;
        }
        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        if other.timeout_secs.is_some() {
            self.timeout_secs = other.timeout_secs;
        }
    }

    /// Returns true if an API key is stored in the file.
    pub fn has_plaintext_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Query Defaults
// ─────────────────────────────────────────────────────────────────────────────

/// Declares `QueryDefaults` with one optional field per parameter and the
/// field-by-field merge/apply helpers.
macro_rules! query_defaults {
    ($($field:ident: $ty:ty),+ $(,)?) => {
        /// Optional values for every query parameter except the prompt.
        ///
        /// Used for the `[defaults]` config section and as the override
        /// layer built from CLI flags or MCP tool arguments.
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(default)]
        pub struct QueryDefaults {
            $(
                #[serde(skip_serializing_if = "Option::is_none")]
                pub $field: Option<$ty>,
            )+
        }

        impl QueryDefaults {
            /// Merge another layer on top of this one (other takes priority).
            pub fn merge(&mut self, other: QueryDefaults) {
                $(
                    if other.$field.is_some() {
                        self.$field = other.$field;
                    }
                )+
            }

            /// Overwrite the fields of `params` that this layer sets.
            pub fn apply_to(&self, params: &mut ParameterSet) {
                $(
                    if let Some(value) = &self.$field {
                        params.$field = value.clone();
                    }
                )+
            }
        }
    };
}

query_defaults! {
    model: String,
    system_prompt: String,
    temperature: f64,
    top_k: u32,
    top_p: f64,
    frequency_penalty: f64,
    presence_penalty: f64,
    max_tokens: u32,
    search_domains: Vec<String>,
    search_recency: String,
    location_lat: f64,
    location_lon: f64,
    location_country: String,
    return_images: bool,
    return_related: bool,
    stream: bool,
    image_domains: Vec<String>,
    image_formats: Vec<String>,
    response_format_json_schema: String,
    response_format_regex: String,
    search_mode: String,
    search_context_size: String,
    search_after_date: String,
    search_before_date: String,
    last_updated_after: String,
    last_updated_before: String,
    reasoning_effort: String,
}

impl QueryDefaults {
    /// Build a parameter set for `user_prompt` from these defaults.
    pub fn to_parameter_set(&self, user_prompt: impl Into<String>) -> ParameterSet {
        let mut params = ParameterSet::new(user_prompt);
        self.apply_to(&mut params);
        params
    }

    /// Return a copy with `overrides` merged on top.
    pub fn layered(&self, overrides: QueryDefaults) -> QueryDefaults {
        let mut merged = self.clone();
        merged.merge(overrides);
        merged
    }
}
