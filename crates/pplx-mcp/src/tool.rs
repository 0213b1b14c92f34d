//! The `perplexity_query` tool: schema and argument handling.

use serde::Deserialize;
use serde_json::{Value, json};

use pplx_config::QueryDefaults;
use pplx_core::{ContextSize, ParameterSet, ReasoningEffort, Recency, SearchMode};

use crate::protocol::{JsonRpcError, ToolInfo};

/// Name of the only tool this server exposes.
pub const TOOL_NAME: &str = "perplexity_query";

/// Arguments of a `perplexity_query` call.
///
/// Everything except `query` is optional and merged over the configured
/// defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryArguments {
    /// The user prompt.
    pub query: String,
    #[serde(flatten)]
    pub overrides: QueryDefaults,
}

impl QueryArguments {
    /// Parse tool-call arguments.
    pub fn parse(arguments: Option<Value>) -> Result<Self, JsonRpcError> {
        let arguments = arguments
            .ok_or_else(|| JsonRpcError::invalid_params("missing arguments: 'query' is required"))?;
        let args: Self = serde_json::from_value(arguments)
            .map_err(|e| JsonRpcError::invalid_params(format!("invalid arguments: {}", e)))?;
        if args.query.trim().is_empty() {
            return Err(JsonRpcError::invalid_params("'query' must not be empty"));
        }
        Ok(args)
    }

    /// Build the parameter set, layering these arguments over `defaults`.
    pub fn into_parameter_set(self, defaults: &QueryDefaults) -> ParameterSet {
        defaults.layered(self.overrides).to_parameter_set(self.query)
    }
}

/// The tool advertised by `tools/list`.
pub fn tool_info() -> ToolInfo {
    ToolInfo {
        name: TOOL_NAME.to_string(),
        description: Some(
            "Ask Perplexity a question and get a web-grounded answer with sources. \
             Supports sampling controls, search filters (domains, recency, dates, location), \
             image results and structured output."
                .to_string(),
        ),
        input_schema: input_schema(),
    }
}

fn input_schema() -> Value {
    let string = |description: &str| json!({ "type": "string", "description": description });
    let number = |description: &str| json!({ "type": "number", "description": description });
    let integer =
        |description: &str| json!({ "type": "integer", "minimum": 0, "description": description });
    let boolean = |description: &str| json!({ "type": "boolean", "description": description });
    let strings = |description: &str| {
        json!({ "type": "array", "items": { "type": "string" }, "description": description })
    };
    let one_of = |values: &[&str], description: &str| {
        json!({ "type": "string", "enum": values, "description": description })
    };
    let date = |description: &str| {
        json!({
            "type": "string",
            "pattern": "^[0-9]{2}/[0-9]{2}/[0-9]{4}$",
            "description": format!("{} (MM/DD/YYYY)", description),
        })
    };

    json!({
        "type": "object",
        "properties": {
            "query": string("The question to ask"),
            "model": string(
                "Model name, e.g. sonar, sonar-pro, sonar-reasoning, sonar-deep-research"
            ),
            "system_prompt": string("System prompt"),
            "temperature": number("Sampling temperature; 0 uses the default"),
            "top_k": integer("Top-K sampling; 0 disables"),
            "top_p": number("Nucleus sampling; 0 uses the default"),
            "frequency_penalty": number("Frequency penalty"),
            "presence_penalty": number("Presence penalty"),
            "max_tokens": integer("Maximum output tokens; 0 uses the default"),
            "search_domains": strings("Restrict search to these domains"),
            "search_recency": one_of(Recency::VALUES, "Only use results from this period"),
            "location_lat": number("Latitude hint for localised search"),
            "location_lon": number("Longitude hint for localised search"),
            "location_country": string("Country code hint, e.g. US"),
            "return_images": boolean("Include images; disables the recency filter"),
            "return_related": boolean("Include related questions"),
            "stream": boolean("Stream the answer internally before returning it"),
            "image_domains": strings("Restrict images to these domains"),
            "image_formats": strings("Restrict images to these formats, e.g. png"),
            "response_format_json_schema": string(
                "JSON schema the answer must follow (sonar models only)"
            ),
            "response_format_regex": string("Regex the answer must match (sonar models only)"),
            "search_mode": one_of(SearchMode::VALUES, "Search corpus"),
            "search_context_size": one_of(
                ContextSize::VALUES,
                "How much search context to retrieve"
            ),
            "search_after_date": date("Only results published after"),
            "search_before_date": date("Only results published before"),
            "last_updated_after": date("Only results updated after"),
            "last_updated_before": date("Only results updated before"),
            "reasoning_effort": one_of(
                ReasoningEffort::VALUES,
                "Reasoning depth for deep-research models"
            ),
        },
        "required": ["query"],
    })
}
