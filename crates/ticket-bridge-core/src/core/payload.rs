// crates/ticket-bridge-core/src/core/payload.rs
// ============================================================================
// Module: Webhook Payload Access
// Description: Field-path lookups over untrusted JSON webhook payloads.
// Purpose: Give adapters uniform, field-named validation errors.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! Adapters describe where fields live with static [`FieldPath`] values and
//! read them through the helpers here. Every failure is a
//! [`ValidationError`] carrying the dotted path of the offending field.
//! JSON `null` is treated the same as an absent field.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

use crate::core::errors::ValidationError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted webhook body size in bytes.
pub const MAX_WEBHOOK_BODY_BYTES: usize = 1024 * 1024;

/// Field label used for errors about the payload as a whole.
pub const PAYLOAD_ROOT_FIELD: &str = "$";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Static path of object keys from the payload root to a field.
pub type FieldPath = &'static [&'static str];

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Parses raw webhook bytes into a JSON object.
///
/// # Errors
///
/// Returns [`ValidationError`] when the body is too large, is not JSON, or is
/// not a JSON object.
pub fn parse_json_object(body: &[u8]) -> Result<Value, ValidationError> {
    if body.len() > MAX_WEBHOOK_BODY_BYTES {
        return Err(ValidationError::new(PAYLOAD_ROOT_FIELD, "payload exceeds size limit"));
    }
    let value: Value = serde_json::from_slice(body)
        .map_err(|_| ValidationError::new(PAYLOAD_ROOT_FIELD, "payload is not valid json"))?;
    if !value.is_object() {
        return Err(ValidationError::new(PAYLOAD_ROOT_FIELD, "payload must be a json object"));
    }
    Ok(value)
}

// ============================================================================
// SECTION: Lookups
// ============================================================================

/// Renders a field path as a dotted string.
#[must_use]
pub fn display_path(path: &[&str]) -> String {
    path.join(".")
}

/// Resolves a field path, treating `null` as absent.
#[must_use]
pub fn lookup<'a>(payload: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = payload;
    for key in path {
        current = current.as_object()?.get(*key)?;
    }
    if current.is_null() { None } else { Some(current) }
}

/// Reads a required, non-empty string field.
///
/// # Errors
///
/// Returns [`ValidationError`] when the field is absent, not a string, or blank.
pub fn required_str<'a>(payload: &'a Value, path: &[&str]) -> Result<&'a str, ValidationError> {
    let value = lookup(payload, path)
        .ok_or_else(|| ValidationError::new(display_path(path), "field is required"))?;
    let text = value
        .as_str()
        .ok_or_else(|| ValidationError::new(display_path(path), "field must be a string"))?;
    if text.trim().is_empty() {
        return Err(ValidationError::new(display_path(path), "field must be non-empty"));
    }
    Ok(text)
}

/// Reads an optional string field.
///
/// # Errors
///
/// Returns [`ValidationError`] when the field is present but not a string.
pub fn optional_str<'a>(
    payload: &'a Value,
    path: &[&str],
) -> Result<Option<&'a str>, ValidationError> {
    match lookup(payload, path) {
        None => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.as_str())),
        Some(_) => Err(ValidationError::new(display_path(path), "field must be a string")),
    }
}

/// Reads a required identifier that may be encoded as a string or integer.
///
/// # Errors
///
/// Returns [`ValidationError`] when the field is absent or has another type.
pub fn required_identifier(payload: &Value, path: &[&str]) -> Result<String, ValidationError> {
    match lookup(payload, path) {
        None => Err(ValidationError::new(display_path(path), "field is required")),
        Some(Value::String(text)) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        Some(Value::Number(number)) if number.is_u64() || number.is_i64() => Ok(number.to_string()),
        Some(_) => Err(ValidationError::new(
            display_path(path),
            "field must be a non-empty string or integer",
        )),
    }
}
