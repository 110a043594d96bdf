//! Model response validation
//!
//! Enforces the profile's response contract: the output must be a JSON
//! object containing a usable value for every required field. All missing
//! fields are reported at once. Category membership is only checked when the
//! profile constrains categories, and an unknown category is rewritten to
//! `"Other"` rather than failing the request.

use serde_json::Value;
use thiserror::Error;

use super::cache::Metadata;
use crate::profiles::ProcessingProfile;

/// Substitute for categories outside the profile's permitted set
pub const FALLBACK_CATEGORY: &str = "Other";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidateError {
    #[error("malformed model response: {0}")]
    Malformed(String),

    #[error("model response missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),
}

/// Parse and validate raw model output against the profile contract.
/// On success the result contains exactly the profile's required fields.
pub fn validate(raw: &str, profile: &ProcessingProfile) -> Result<Metadata, ValidateError> {
    if raw.trim().is_empty() {
        return Err(ValidateError::Malformed("empty response".to_string()));
    }

    let parsed: Value = serde_json::from_str(raw)
        .map_err(|e| ValidateError::Malformed(format!("not valid JSON: {e}")))?;

    let Value::Object(fields) = parsed else {
        return Err(ValidateError::Malformed(
            "response is not a JSON object".to_string(),
        ));
    };

    let missing: Vec<String> = profile
        .required_fields
        .iter()
        .filter(|name| !is_usable(fields.get(name.as_str())))
        .cloned()
        .collect();

    if !missing.is_empty() {
        return Err(ValidateError::MissingFields(missing));
    }

    let mut metadata = Metadata::new();
    for name in &profile.required_fields {
        // is_usable above guarantees presence
        let value = stringify(&fields[name.as_str()]);
        metadata.insert(name.clone(), value);
    }

    if profile.constrains_categories() {
        if let Some(category) = metadata.get_mut("category") {
            if !profile.categories.contains(category.as_str()) {
                *category = FALLBACK_CATEGORY.to_string();
            }
        }
    }

    Ok(metadata)
}

/// A field is usable unless it is absent, null, an empty string, `false`,
/// or the number zero
fn is_usable(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

/// Strings pass through verbatim; structured values keep their JSON text
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
