// crates/ticket-bridge-config/src/lib.rs
// ============================================================================
// Module: Ticket Bridge Config Library
// Description: Canonical config model and fail-closed validation.
// Purpose: Single source of truth for ticket-bridge.toml semantics.
// Dependencies: serde, toml, ticket-bridge-adapters, ticket-bridge-core
// ============================================================================

//! ## Overview
//! `ticket-bridge-config` defines the configuration model for Ticket Bridge
//! hosts: authenticator limits, retry and circuit settings, outbound HTTP
//! deadlines, latency budgets, sweeping, audit output, and adapter selection.
//!
//! Security posture: config inputs are untrusted and validated before use.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
