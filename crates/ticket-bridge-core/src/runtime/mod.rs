// crates/ticket-bridge-core/src/runtime/mod.rs
// ============================================================================
// Module: Ticket Bridge Core Runtime Helpers
// Description: In-memory credential store and clock implementations.
// Purpose: Provide default interface implementations for hosts and tests.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime helpers implement the core interfaces without external services.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod clock;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use clock::FixedClock;
pub use clock::SystemClock;
pub use store::InMemoryCredentialStore;
pub use store::PlaintextDecryptor;
pub use store::SecretDecryptor;
