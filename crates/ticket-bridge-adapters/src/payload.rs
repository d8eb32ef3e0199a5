// crates/ticket-bridge-adapters/src/payload.rs
// ============================================================================
// Module: Adapter Payload Helpers
// Description: Typed field extraction shared by the built-in adapters.
// Purpose: Turn raw webhook fields into validated identifiers and instants.
// Dependencies: serde_json, ticket-bridge-core
// ============================================================================

//! ## Overview
//! Wraps the core field-path lookups with identifier and timestamp parsing so
//! every adapter reports the same field-named [`ValidationError`]s.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use ticket_bridge_core::TenantId;
use ticket_bridge_core::TicketId;
use ticket_bridge_core::ValidationError;
use ticket_bridge_core::payload::display_path;
use ticket_bridge_core::payload::required_identifier;
use ticket_bridge_core::payload::required_str;
use ticket_bridge_core::timestamp::parse_iso8601;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Field Parsing
// ============================================================================

/// Reads and validates a tenant identifier.
///
/// # Errors
///
/// Returns [`ValidationError`] when the field is missing or malformed.
pub fn parse_tenant_id(payload: &Value, path: &[&str]) -> Result<TenantId, ValidationError> {
    let raw = required_str(payload, path)?;
    TenantId::parse(raw).map_err(|err| ValidationError::new(display_path(path), err.to_string()))
}

/// Reads and validates a ticket identifier encoded as a string or integer.
///
/// # Errors
///
/// Returns [`ValidationError`] when the field is missing or malformed.
pub fn parse_ticket_id(payload: &Value, path: &[&str]) -> Result<TicketId, ValidationError> {
    let raw = required_identifier(payload, path)?;
    TicketId::parse(raw).map_err(|err| ValidationError::new(display_path(path), err.to_string()))
}

/// Reads an ISO-8601 creation time and normalizes it to UTC.
///
/// # Errors
///
/// Returns [`ValidationError`] when the field is missing or unparsable.
pub fn parse_created_at(payload: &Value, path: &[&str]) -> Result<OffsetDateTime, ValidationError> {
    let raw = required_str(payload, path)?;
    parse_iso8601(raw).map_err(|err| ValidationError::new(display_path(path), err.to_string()))
}
