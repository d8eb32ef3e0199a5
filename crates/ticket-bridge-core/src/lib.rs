// crates/ticket-bridge-core/src/lib.rs
// ============================================================================
// Module: Ticket Bridge Core Library
// Description: Public API surface for the Ticket Bridge core.
// Purpose: Expose core types, interfaces, audit events, and runtime helpers.
// Dependencies: crate::{audit, core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Ticket Bridge core holds the vocabulary shared by the multi-tenant
//! ticketing integration: validated identifiers, tenant configuration, the
//! canonical ticket model, webhook signature primitives, and the interfaces
//! through which adapters and credential stores are plugged in.
//!
//! Security posture: webhook payloads and signature headers are untrusted;
//! secrets are redacted from debug output and never serialized in audit events.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use audit::AuditSink;
pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use interfaces::AdapterCallError;
pub use interfaces::AdapterDescriptor;
pub use interfaces::CallDisposition;
pub use interfaces::Clock;
pub use interfaces::ContentFormat;
pub use interfaces::CredentialError;
pub use interfaces::CredentialStore;
pub use interfaces::TicketingAdapter;
pub use interfaces::ToolSession;
pub use interfaces::WebhookProfile;
pub use runtime::FixedClock;
pub use runtime::InMemoryCredentialStore;
pub use runtime::PlaintextDecryptor;
pub use runtime::SecretDecryptor;
pub use runtime::SystemClock;
