// crates/ticket-bridge-core/src/core/mod.rs
// ============================================================================
// Module: Ticket Bridge Core Types
// Description: Identifiers, tenant model, canonical metadata, and primitives.
// Purpose: Provide stable, serializable types shared by adapters and runtime.
// Dependencies: serde, serde_json, time, hmac, sha2, subtle
// ============================================================================

//! ## Overview
//! Core types are the canonical vocabulary of Ticket Bridge: validated
//! identifiers, tenant configuration, the normalized ticket model, and the
//! signature and timestamp primitives every adapter builds on.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod errors;
pub mod identifiers;
pub mod metadata;
pub mod payload;
pub mod signature;
pub mod tenant;
pub mod timestamp;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use errors::TicketingError;
pub use errors::ValidationError;
pub use identifiers::IdentifierError;
pub use identifiers::TenantId;
pub use identifiers::TicketId;
pub use identifiers::ToolId;
pub use metadata::CanonicalTicketMetadata;
pub use metadata::EnhancementContent;
pub use metadata::Priority;
pub use metadata::PriorityTable;
pub use metadata::Ticket;
pub use payload::FieldPath;
pub use signature::SignatureError;
pub use signature::SignatureScheme;
pub use tenant::EncryptedSecret;
pub use tenant::HELPDESK_TOOL_ID;
pub use tenant::JIRA_TOOL_ID;
pub use tenant::RateLimitPolicy;
pub use tenant::Secret;
pub use tenant::TenantConfig;
pub use tenant::ToolSettings;
pub use timestamp::TimeParseError;
pub use timestamp::TimestampFormat;
