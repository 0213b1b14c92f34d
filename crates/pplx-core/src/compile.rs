//! Compilation of a validated [`ParameterSet`] into request directives.
//!
//! The directive order is fixed so compiled requests are deterministic:
//! base sampling, search, response enhancement, image filters, response
//! shape, search mode and context, date filters, reasoning effort.
//! Transports apply directives in order, so a later directive overrides an
//! earlier one touching the same request field.

use chrono::NaiveDate;

use crate::error::CompileError;
use crate::params::{ContextSize, DATE_LAYOUT, ParameterSet, ReasoningEffort, Recency, SearchMode};

/// Image formats the API is known to filter on.
pub const KNOWN_IMAGE_FORMATS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "svg", "bmp"];

/// Substring identifying models that accept a reasoning effort.
const REASONING_MODEL_MARKER: &str = "deep-research";

/// One atomic instruction applied to the outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Model(String),
    Messages { system: String, user: String },
    Temperature(f64),
    TopK(u32),
    TopP(f64),
    FrequencyPenalty(f64),
    PresencePenalty(f64),
    MaxTokens(u32),
    SearchDomains(Vec<String>),
    /// `None` clears any recency filter set earlier.
    SearchRecency(Option<Recency>),
    Location {
        latitude: f64,
        longitude: f64,
        country: String,
    },
    ReturnImages(bool),
    ReturnRelated(bool),
    Stream(bool),
    ImageDomains(Vec<String>),
    ImageFormats(Vec<String>),
    JsonSchema(serde_json::Value),
    Regex(String),
    SearchMode(SearchMode),
    SearchContextSize(ContextSize),
    SearchAfterDate(NaiveDate),
    SearchBeforeDate(NaiveDate),
    LastUpdatedAfter(NaiveDate),
    LastUpdatedBefore(NaiveDate),
    ReasoningEffort(ReasoningEffort),
}

/// Non-fatal issue found while compiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileWarning {
    /// An image format outside [`KNOWN_IMAGE_FORMATS`].
    UnknownImageFormat(String),
    /// Reasoning effort requested for a model that probably ignores it.
    ReasoningEffortUnsupported { model: String },
}

impl std::fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownImageFormat(format) => write!(
                f,
                "unknown image format '{}' (known: {})",
                format,
                KNOWN_IMAGE_FORMATS.join(", ")
            ),
            Self::ReasoningEffortUnsupported { model } => write!(
                f,
                "reasoning effort is only honoured by {} models, '{}' may ignore it",
                REASONING_MODEL_MARKER, model
            ),
        }
    }
}

/// A compiled request: ordered directives plus any warnings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompiledRequest {
    pub directives: Vec<Directive>,
    pub warnings: Vec<CompileWarning>,
}

impl CompiledRequest {
    /// Returns true if the request asks for a streamed answer.
    pub fn is_streaming(&self) -> bool {
        self.directives
            .iter()
            .rev()
            .find_map(|d| match d {
                Directive::Stream(s) => Some(*s),
                _ => None,
            })
            .unwrap_or(false)
    }

    /// The model named by the last model directive.
    pub fn model(&self) -> Option<&str> {
        self.directives.iter().rev().find_map(|d| match d {
            Directive::Model(m) => Some(m.as_str()),
            _ => None,
        })
    }

    fn push(&mut self, directive: Directive) {
        self.directives.push(directive);
    }

    fn warn(&mut self, warning: CompileWarning) {
        tracing::warn!(%warning, "Compiling query");
        self.warnings.push(warning);
    }
}

/// Compile a parameter set into directives.
///
/// Assumes [`validate`](crate::validate) already passed. Fails only when a
/// field's content is malformed (JSON schema, dates).
pub fn compile(params: &ParameterSet) -> Result<CompiledRequest, CompileError> {
    let mut out = CompiledRequest::default();

    // Base directives, always present
    out.push(Directive::Model(params.model.clone()));
    out.push(Directive::Messages {
        system: params.system_prompt.clone(),
        user: params.user_prompt.clone(),
    });
    out.push(Directive::Temperature(params.temperature));
    out.push(Directive::TopK(params.top_k));
    out.push(Directive::TopP(params.top_p));
    out.push(Directive::FrequencyPenalty(params.frequency_penalty));
    out.push(Directive::PresencePenalty(params.presence_penalty));
    out.push(Directive::MaxTokens(params.max_tokens));

    // Search
    if !params.search_domains.is_empty() {
        out.push(Directive::SearchDomains(params.search_domains.clone()));
    }
    if params.return_images {
        // Image results and recency filtering conflict; images win.
        if !params.search_recency.is_empty() {
            tracing::debug!(
                recency = %params.search_recency,
                "Dropping recency filter because images are requested"
            );
        }
        out.push(Directive::SearchRecency(None));
    } else if !params.search_recency.is_empty() {
        let recency = parse_enum::<Recency>("search_recency", &params.search_recency)?;
        out.push(Directive::SearchRecency(Some(recency)));
    }
    if params.has_location() {
        out.push(Directive::Location {
            latitude: params.location_lat,
            longitude: params.location_lon,
            country: params.location_country.clone(),
        });
    }

    // Response enhancement
    if params.return_images {
        out.push(Directive::ReturnImages(true));
        out.push(Directive::SearchRecency(None));
    }
    if params.return_related {
        out.push(Directive::ReturnRelated(true));
    }
    if params.stream {
        out.push(Directive::Stream(true));
    }

    // Image filters
    if !params.image_domains.is_empty() {
        out.push(Directive::ImageDomains(params.image_domains.clone()));
    }
    if !params.image_formats.is_empty() {
        for format in &params.image_formats {
            if !is_known_image_format(format) {
                out.warn(CompileWarning::UnknownImageFormat(format.clone()));
            }
        }
        out.push(Directive::ImageFormats(params.image_formats.clone()));
    }

    // Response shape
    if !params.response_format_json_schema.is_empty() {
        let schema: serde_json::Value = serde_json::from_str(&params.response_format_json_schema)
            .map_err(|e| {
                CompileError::new(
                    "response_format_json_schema",
                    params.response_format_json_schema.clone(),
                    format!("not a valid JSON document: {}", e),
                )
            })?;
        out.push(Directive::JsonSchema(schema));
    }
    if !params.response_format_regex.is_empty() {
        out.push(Directive::Regex(params.response_format_regex.clone()));
    }

    // Search mode and context
    if !params.search_mode.is_empty() {
        out.push(Directive::SearchMode(parse_enum(
            "search_mode",
            &params.search_mode,
        )?));
    }
    if !params.search_context_size.is_empty() {
        out.push(Directive::SearchContextSize(parse_enum(
            "search_context_size",
            &params.search_context_size,
        )?));
    }

    // Date filters
    if !params.search_after_date.is_empty() {
        let date = parse_date("search_after_date", &params.search_after_date)?;
        out.push(Directive::SearchAfterDate(date));
    }
    if !params.search_before_date.is_empty() {
        let date = parse_date("search_before_date", &params.search_before_date)?;
        out.push(Directive::SearchBeforeDate(date));
    }
    if !params.last_updated_after.is_empty() {
        let date = parse_date("last_updated_after", &params.last_updated_after)?;
        out.push(Directive::LastUpdatedAfter(date));
    }
    if !params.last_updated_before.is_empty() {
        let date = parse_date("last_updated_before", &params.last_updated_before)?;
        out.push(Directive::LastUpdatedBefore(date));
    }

    // Reasoning effort
    if !params.reasoning_effort.is_empty() {
        let effort = parse_enum::<ReasoningEffort>("reasoning_effort", &params.reasoning_effort)?;
        if !params.model.contains(REASONING_MODEL_MARKER) {
            out.warn(CompileWarning::ReasoningEffortUnsupported {
                model: params.model.clone(),
            });
        }
        out.push(Directive::ReasoningEffort(effort));
    }

    tracing::debug!(
        model = %params.model,
        directives = out.directives.len(),
        warnings = out.warnings.len(),
        "Compiled query"
    );

    Ok(out)
}

/// Parse a date in the fixed `MM/DD/YYYY` layout.
///
/// The shape is checked before parsing so that unpadded or reordered dates
/// are rejected even where chrono would be lenient.
pub fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, CompileError> {
    let bytes = value.as_bytes();
    let well_shaped = bytes.len() == 10
        && bytes[2] == b'/'
        && bytes[5] == b'/'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 2 || i == 5 || b.is_ascii_digit());

    if !well_shaped {
        return Err(CompileError::new(
            field,
            value,
            "expected a date in MM/DD/YYYY format",
        ));
    }

    NaiveDate::parse_from_str(value, DATE_LAYOUT)
        .map_err(|e| CompileError::new(field, value, format!("not a calendar date: {}", e)))
}

fn is_known_image_format(format: &str) -> bool {
    KNOWN_IMAGE_FORMATS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(format))
}

/// Enum fields are checked by `validate`; this only guards direct callers.
fn parse_enum<T>(field: &'static str, value: &str) -> Result<T, CompileError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| CompileError::new(field, value, e.to_string()))
}
