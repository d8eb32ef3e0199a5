// crates/ticket-bridge-core/src/core/errors.rs
// ============================================================================
// Module: Ticket Bridge Error Taxonomy
// Description: Typed errors shared across validation and outbound calls.
// Purpose: Give callers one error enum per boundary with stable variants.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! [`TicketingError`] is the error returned by the service facade for
//! outbound operations and routing failures. [`ValidationError`] is the
//! field-named error produced while normalizing webhook payloads. Webhook
//! authentication uses its own closed rejection enum in the runtime crate and
//! never surfaces these errors directly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use thiserror::Error;

use crate::core::identifiers::TenantId;
use crate::core::identifiers::ToolId;
use crate::interfaces::AdapterCallError;
use crate::interfaces::CredentialError;

// ============================================================================
// SECTION: Validation Errors
// ============================================================================

/// Payload validation failure naming the offending field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid field {field}: {reason}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// Human-readable failure reason.
    pub reason: String,
}

impl ValidationError {
    /// Builds a validation error for a field.
    #[must_use]
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { field: field.into(), reason: reason.into() }
    }
}

// ============================================================================
// SECTION: Ticketing Errors
// ============================================================================

/// Errors surfaced by ticketing operations.
#[derive(Debug, Error)]
pub enum TicketingError {
    /// Payload failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The tool rejected the tenant's credentials.
    #[error("authentication failed for tenant {tenant_id} on {tool_id} (status {status})")]
    AuthenticationFailure {
        /// Tenant identifier.
        tenant_id: TenantId,
        /// Tool identifier.
        tool_id: ToolId,
        /// HTTP status returned by the tool.
        status: u16,
    },
    /// Rate limit was exceeded.
    #[error("rate limit exceeded; retry after {}ms", .retry_after.as_millis())]
    RateLimitExceeded {
        /// Time until capacity is available.
        retry_after: Duration,
    },
    /// The circuit for the tenant and tool is open.
    #[error("circuit open for tenant {tenant_id} on {tool_id}; retry in {}ms", .retry_in.as_millis())]
    CircuitOpen {
        /// Tenant identifier.
        tenant_id: TenantId,
        /// Tool identifier.
        tool_id: ToolId,
        /// Time until a probe is permitted.
        retry_in: Duration,
    },
    /// The tool API failed after the retry budget was applied.
    #[error("tool api error after {attempts} attempt(s): {cause}")]
    ApiError {
        /// Network attempts made.
        attempts: u32,
        /// Last adapter failure.
        cause: AdapterCallError,
    },
    /// No configuration exists for the tenant.
    #[error("tenant not found: {tenant_id}")]
    TenantNotFound {
        /// Tenant identifier.
        tenant_id: TenantId,
    },
    /// The tenant is soft-deleted.
    #[error("tenant inactive: {tenant_id}")]
    TenantInactive {
        /// Tenant identifier.
        tenant_id: TenantId,
    },
    /// No adapter is registered for the tool.
    #[error("no adapter registered for {tool_id}; registered: [{}]", join_tool_ids(.registered))]
    AdapterNotFound {
        /// Requested tool identifier.
        tool_id: String,
        /// Registered tool identifiers.
        registered: Vec<ToolId>,
    },
    /// An adapter candidate failed registration checks.
    #[error("invalid adapter {tool_id}: {reason}")]
    InvalidAdapter {
        /// Candidate tool identifier.
        tool_id: String,
        /// Failed check.
        reason: String,
    },
    /// Credential lookup or decryption failed.
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

/// Joins tool identifiers for display.
#[must_use]
pub fn join_tool_ids(ids: &[ToolId]) -> String {
    ids.iter().map(ToolId::as_str).collect::<Vec<_>>().join(", ")
}
