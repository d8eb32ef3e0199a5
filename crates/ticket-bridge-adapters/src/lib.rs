// crates/ticket-bridge-adapters/src/lib.rs
// ============================================================================
// Module: Ticket Bridge Adapters Library
// Description: Adapter registry and built-in ticketing adapters.
// Purpose: Route tool identifiers to adapters that speak each tool's API.
// Dependencies: ticket-bridge-core, reqwest
// ============================================================================

//! ## Overview
//! This crate holds the [`AdapterRegistry`], the shared outbound HTTP
//! plumbing, and the built-in `helpdesk` and `jira` adapters. Hosts build a
//! registry, run [`AdapterRegistry::discover`] over [`builtin_factories`] (or
//! their own factories), and resolve adapters by tool identifier.
//!
//! Security posture: tool responses are untrusted and size-limited; tenant
//! base URLs must be `https` unless explicitly relaxed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod discovery;
pub mod helpdesk;
pub mod http;
pub mod jira;
pub mod payload;
pub mod registry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use discovery::AdapterFactory;
pub use discovery::DiscoveryReport;
pub use discovery::HelpdeskFactory;
pub use discovery::JiraFactory;
pub use discovery::SkippedAdapter;
pub use discovery::builtin_factories;
pub use discovery::enabled_factories;
pub use helpdesk::HelpdeskAdapter;
pub use http::AdapterBuildError;
pub use http::AdapterHttp;
pub use http::HttpClientConfig;
pub use jira::JiraAdapter;
pub use registry::AdapterRegistry;
pub use registry::RegistryError;
