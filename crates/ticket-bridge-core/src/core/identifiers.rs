// crates/ticket-bridge-core/src/core/identifiers.rs
// ============================================================================
// Module: Ticket Bridge Identifiers
// Description: Validated identifiers for tenants, tools, and tickets.
// Purpose: Provide strongly typed, serializable IDs with enforced formats.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Identifiers are validated at construction so that every downstream
//! component can rely on their format. Tenant identifiers follow
//! `^[a-z0-9-]+$`, tool identifiers follow `^[a-z0-9_-]+$`, and ticket
//! identifiers are bounded, non-empty strings without control characters.
//! All identifiers serialize as plain strings and re-validate on deserialize.
//!
//! Security posture: identifiers arrive inside untrusted webhook payloads and
//! are validated before they are used as map keys or URL path segments.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum length of a tenant identifier.
pub const MAX_TENANT_ID_LENGTH: usize = 64;
/// Maximum length of a tool identifier.
pub const MAX_TOOL_ID_LENGTH: usize = 64;
/// Maximum length of a ticket identifier.
pub const MAX_TICKET_ID_LENGTH: usize = 100;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Identifier validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// Identifier was empty.
    #[error("{kind} identifier must be non-empty")]
    Empty {
        /// Identifier kind label.
        kind: &'static str,
    },
    /// Identifier exceeded its length limit.
    #[error("{kind} identifier exceeds {max} characters")]
    TooLong {
        /// Identifier kind label.
        kind: &'static str,
        /// Maximum permitted length.
        max: usize,
    },
    /// Identifier contained a disallowed character.
    #[error("{kind} identifier contains invalid characters")]
    InvalidCharacters {
        /// Identifier kind label.
        kind: &'static str,
    },
}

// ============================================================================
// SECTION: Tenant Identifier
// ============================================================================

/// Tenant identifier matching `^[a-z0-9-]+$`.
///
/// # Invariants
/// - Non-empty, at most [`MAX_TENANT_ID_LENGTH`] characters.
/// - Only lowercase ASCII letters, digits, and `-`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Parses and validates a tenant identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] when the value violates the tenant format.
    pub fn parse(value: impl Into<String>) -> Result<Self, IdentifierError> {
        let value = value.into();
        validate_charset(&value, "tenant", MAX_TENANT_ID_LENGTH, |ch| {
            ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-'
        })?;
        Ok(Self(value))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for TenantId {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<TenantId> for String {
    fn from(value: TenantId) -> Self {
        value.0
    }
}

// ============================================================================
// SECTION: Tool Identifier
// ============================================================================

/// Ticketing tool identifier matching `^[a-z0-9_-]+$`.
///
/// # Invariants
/// - Non-empty, at most [`MAX_TOOL_ID_LENGTH`] characters.
/// - Only lowercase ASCII letters, digits, `_`, and `-`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ToolId(String);

impl ToolId {
    /// Parses and validates a tool identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] when the value violates the tool format.
    pub fn parse(value: impl Into<String>) -> Result<Self, IdentifierError> {
        let value = value.into();
        validate_charset(&value, "tool", MAX_TOOL_ID_LENGTH, is_tool_char)?;
        Ok(Self(value))
    }

    /// Builds a tool identifier from a compile-time constant.
    ///
    /// Constants passed here are checked by unit tests rather than at runtime.
    #[must_use]
    pub fn from_static(value: &'static str) -> Self {
        debug_assert!(Self::parse(value).is_ok(), "static tool id must be valid");
        Self(value.to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for ToolId {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ToolId> for String {
    fn from(value: ToolId) -> Self {
        value.0
    }
}

// ============================================================================
// SECTION: Ticket Identifier
// ============================================================================

/// Ticket identifier as issued by the ticketing tool.
///
/// # Invariants
/// - Non-empty after trimming, at most [`MAX_TICKET_ID_LENGTH`] characters.
/// - No ASCII control characters or path separators.
/// - Never a dot segment (`.` or `..`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TicketId(String);

impl TicketId {
    /// Parses and validates a ticket identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] when the value violates the ticket format.
    pub fn parse(value: impl Into<String>) -> Result<Self, IdentifierError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(IdentifierError::Empty { kind: "ticket" });
        }
        if trimmed.chars().count() > MAX_TICKET_ID_LENGTH {
            return Err(IdentifierError::TooLong { kind: "ticket", max: MAX_TICKET_ID_LENGTH });
        }
        if trimmed.chars().any(|ch| ch.is_control() || ch == '/' || ch == '\\') {
            return Err(IdentifierError::InvalidCharacters { kind: "ticket" });
        }
        // URL builders drop dot segments, which would retarget the request.
        if trimmed == "." || trimmed == ".." {
            return Err(IdentifierError::InvalidCharacters { kind: "ticket" });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for TicketId {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<TicketId> for String {
    fn from(value: TicketId) -> Self {
        value.0
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns true when the character is permitted in a tool identifier.
const fn is_tool_char(ch: char) -> bool {
    ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_'
}

/// Validates length and character set for slug-style identifiers.
fn validate_charset(
    value: &str,
    kind: &'static str,
    max: usize,
    allowed: impl Fn(char) -> bool,
) -> Result<(), IdentifierError> {
    if value.is_empty() {
        return Err(IdentifierError::Empty { kind });
    }
    if value.len() > max {
        return Err(IdentifierError::TooLong { kind, max });
    }
    if !value.chars().all(allowed) {
        return Err(IdentifierError::InvalidCharacters { kind });
    }
    Ok(())
}
