//! Static checks over a [`ParameterSet`].
//!
//! Validation is pure and runs before any network resource is acquired.

use std::str::FromStr;

use crate::error::ValidationError;
use crate::params::{ContextSize, ParameterSet, ReasoningEffort, Recency, SearchMode};

/// Model family prefix required by response-shape constraints.
pub const RESPONSE_FORMAT_MODEL_PREFIX: &str = "sonar";

/// Check a parameter set against the enum and cross-field rules.
///
/// Checks run in a fixed order and the first failure wins:
/// recency, response-shape exclusivity, response-shape model family,
/// search mode, search context size, reasoning effort.
pub fn validate(params: &ParameterSet) -> Result<(), ValidationError> {
    check_enum::<Recency>("search_recency", &params.search_recency, Recency::VALUES)?;

    if !params.response_format_json_schema.is_empty() && !params.response_format_regex.is_empty()
    {
        return Err(ValidationError::combination(
            "response_format",
            "json schema and regex response formats are mutually exclusive",
        ));
    }

    if params.has_response_format() && !params.model.starts_with(RESPONSE_FORMAT_MODEL_PREFIX) {
        return Err(ValidationError::new(
            "response_format",
            params.model.clone(),
            format!(
                "response formats are only supported by {}* models",
                RESPONSE_FORMAT_MODEL_PREFIX
            ),
        ));
    }

    check_enum::<SearchMode>("search_mode", &params.search_mode, SearchMode::VALUES)?;
    check_enum::<ContextSize>(
        "search_context_size",
        &params.search_context_size,
        ContextSize::VALUES,
    )?;
    check_enum::<ReasoningEffort>(
        "reasoning_effort",
        &params.reasoning_effort,
        ReasoningEffort::VALUES,
    )?;

    Ok(())
}

/// An empty value is unset and always passes.
fn check_enum<T: FromStr>(
    field: &'static str,
    value: &str,
    expected: &[&str],
) -> Result<(), ValidationError> {
    if value.is_empty() || value.parse::<T>().is_ok() {
        return Ok(());
    }
    Err(ValidationError::new(
        field,
        value,
        format!("must be one of: {}", expected.join(", ")),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ParameterSet {
        ParameterSet::new("what changed in rust 1.85?")
    }

    #[test]
    fn test_defaults_pass() {
        assert!(validate(&params()).is_ok());
    }

    #[test]
    fn test_all_legal_values_pass() {
        for recency in Recency::VALUES {
            for mode in SearchMode::VALUES {
                for size in ContextSize::VALUES {
                    let mut p = params();
                    p.search_recency = recency.to_string();
                    p.search_mode = mode.to_string();
                    p.search_context_size = size.to_string();
                    p.reasoning_effort = "medium".to_string();
                    assert!(validate(&p).is_ok(), "{recency}/{mode}/{size}");
                }
            }
        }
    }

    #[test]
    fn test_bad_recency() {
        let mut p = params();
        p.search_recency = "decade".to_string();
        let err = validate(&p).unwrap_err();
        assert_eq!(err.field, "search_recency");
        assert_eq!(err.value, "decade");
    }

    #[test]
    fn test_both_response_formats_rejected() {
        let mut p = params().with_model("sonar-pro");
        p.response_format_json_schema = "{}".to_string();
        p.response_format_regex = ".*".to_string();
        let err = validate(&p).unwrap_err();
        assert_eq!(err.field, "response_format");
        assert!(err.value.is_empty());
    }

    #[test]
    fn test_response_format_requires_sonar_family() {
        for (schema, regex) in [("{}", ""), ("", "[0-9]+")] {
            let mut p = params().with_model("r1-1776");
            p.response_format_json_schema = schema.to_string();
            p.response_format_regex = regex.to_string();
            let err = validate(&p).unwrap_err();
            assert_eq!(err.field, "response_format");
            assert_eq!(err.value, "r1-1776");
        }

        let mut p = params().with_model("sonar-reasoning-pro");
        p.response_format_regex = "[0-9]+".to_string();
        assert!(validate(&p).is_ok());
    }

    #[test]
    fn test_exclusivity_checked_before_model_family() {
        let mut p = params().with_model("llama");
        p.response_format_json_schema = "{}".to_string();
        p.response_format_regex = ".*".to_string();
        let err = validate(&p).unwrap_err();
        assert!(err.value.is_empty());
    }

    #[test]
    fn test_bad_search_mode_context_and_effort() {
        let mut p = params();
        p.search_mode = "news".to_string();
        assert_eq!(validate(&p).unwrap_err().field, "search_mode");

        let mut p = params();
        p.search_context_size = "huge".to_string();
        assert_eq!(validate(&p).unwrap_err().field, "search_context_size");

        let mut p = params();
        p.reasoning_effort = "max".to_string();
        assert_eq!(validate(&p).unwrap_err().field, "reasoning_effort");
    }

    #[test]
    fn test_first_failure_wins() {
        let mut p = params();
        p.search_recency = "never".to_string();
        p.search_mode = "news".to_string();
        assert_eq!(validate(&p).unwrap_err().field, "search_recency");
    }
}
