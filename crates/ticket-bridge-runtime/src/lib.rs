// crates/ticket-bridge-runtime/src/lib.rs
// ============================================================================
// Module: Ticket Bridge Runtime Library
// Description: Webhook authentication and resilient outbound ticketing calls.
// Purpose: Host-facing service combining adapters, limits, and breakers.
// Dependencies: ticket-bridge-adapters, ticket-bridge-config, ticket-bridge-core, tokio
// ============================================================================

//! ## Overview
//! The runtime turns the adapter registry into a multi-tenant service.
//! [`WebhookAuthenticator`] admits inbound webhooks after tenant, freshness,
//! signature, and rate-limit checks. [`CallExecutor`] drives outbound calls
//! with bounded retries behind per-tenant [`CircuitBreakers`].
//! [`TicketingService`] is the facade hosts share across requests.
//!
//! Security posture: webhook bodies and tool responses are untrusted; tenant
//! secrets are decrypted per call and never logged.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod authenticator;
pub mod circuit;
pub mod executor;
pub mod rate_limit;
pub mod service;
pub mod telemetry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use authenticator::AuthenticatedWebhook;
pub use authenticator::AuthenticatorPolicy;
pub use authenticator::RejectionReason;
pub use authenticator::WebhookAuthenticator;
pub use authenticator::WebhookRequest;
pub use circuit::CallOutcome;
pub use circuit::CircuitBreakers;
pub use circuit::CircuitKey;
pub use circuit::CircuitPhase;
pub use circuit::CircuitPolicy;
pub use circuit::Permit;
pub use circuit::PermitGuard;
pub use executor::CallExecutor;
pub use executor::Execution;
pub use executor::ExecutorError;
pub use executor::RetryPolicy;
pub use rate_limit::RateLimitKey;
pub use rate_limit::SlidingWindowLimiter;
pub use service::RunningService;
pub use service::ServiceDependencies;
pub use service::ServiceError;
pub use service::ServiceSettings;
pub use service::SweepReport;
pub use service::TicketingService;
pub use telemetry::BridgeMetricEvent;
pub use telemetry::BridgeMetrics;
pub use telemetry::BridgeOperation;
pub use telemetry::BridgeOutcome;
pub use telemetry::LatencyBudgets;
pub use telemetry::NoopMetrics;
