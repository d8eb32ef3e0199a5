// crates/ticket-bridge-runtime/src/telemetry.rs
// ============================================================================
// Module: Ticket Bridge Telemetry
// Description: Observability hooks for webhook intake and outbound calls.
// Purpose: Provide metric events and latency buckets without hard deps.
// Dependencies: serde, ticket-bridge-config, ticket-bridge-core
// ============================================================================

//! ## Overview
//! This module exposes a thin metrics interface for outbound call counters
//! and latency histograms. Deployments plug in Prometheus or OpenTelemetry
//! by implementing [`BridgeMetrics`]. Soft latency budgets are checked
//! here too; an overrun is audited, never raised.
//! Security posture: labels carry identifiers and outcome codes only, never
//! payload bodies or credentials.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use serde::Serialize;
use ticket_bridge_config::BudgetsConfig;
use ticket_bridge_core::AuditSink;
use ticket_bridge_core::audit::LatencyAuditEvent;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default latency buckets in milliseconds for bridge histograms.
pub const BRIDGE_LATENCY_BUCKETS_MS: &[u64] =
    &[1, 5, 10, 25, 50, 100, 250, 500, 1_000, 2_000, 5_000, 10_000, 30_000, 60_000];

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// Bridge operation classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BridgeOperation {
    /// Inbound webhook authentication.
    Authenticate,
    /// Webhook signature validation.
    ValidateSignature,
    /// Canonical metadata extraction.
    Extract,
    /// Ticket retrieval.
    GetTicket,
    /// Internal note posting.
    UpdateTicket,
}

impl BridgeOperation {
    /// Returns a stable label for the operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authenticate => "authenticate",
            Self::ValidateSignature => "validate_webhook",
            Self::Extract => "extract_metadata",
            Self::GetTicket => "get_ticket",
            Self::UpdateTicket => "update_ticket",
        }
    }
}

/// Bridge call outcome classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BridgeOutcome {
    /// The call succeeded.
    Ok,
    /// The ticket does not exist.
    NotFound,
    /// The tool definitively refused the update.
    Refused,
    /// The tool rejected the tenant's credentials.
    AuthenticationFailed,
    /// The circuit was open; no request was sent.
    CircuitOpen,
    /// The retry budget ran out.
    Exhausted,
    /// A non-retryable error ended the call.
    Rejected,
    /// Tenant, credential, or routing lookup failed before any request.
    ConfigError,
}

impl BridgeOutcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::NotFound => "not_found",
            Self::Refused => "refused",
            Self::AuthenticationFailed => "authentication_failed",
            Self::CircuitOpen => "circuit_open",
            Self::Exhausted => "exhausted",
            Self::Rejected => "rejected",
            Self::ConfigError => "config_error",
        }
    }
}

/// Bridge metric event payload.
///
/// # Invariants
/// - Optional fields are `None` when the metadata is unavailable.
#[derive(Debug, Clone)]
pub struct BridgeMetricEvent {
    /// Operation classification.
    pub operation: BridgeOperation,
    /// Tenant identifier when known.
    pub tenant_id: Option<String>,
    /// Tool identifier when known.
    pub tool_id: Option<String>,
    /// Call outcome.
    pub outcome: BridgeOutcome,
    /// Network attempts made.
    pub attempts: u32,
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Metrics sink for bridge calls and latencies.
pub trait BridgeMetrics: Send + Sync {
    /// Records a call counter event.
    fn record_call(&self, event: BridgeMetricEvent);
    /// Records a latency observation for the call.
    fn record_latency(&self, event: BridgeMetricEvent, latency: Duration);
}

/// No-op metrics sink.
///
/// # Invariants
/// - Metrics are discarded.
pub struct NoopMetrics;

impl BridgeMetrics for NoopMetrics {
    fn record_call(&self, _event: BridgeMetricEvent) {}

    fn record_latency(&self, _event: BridgeMetricEvent, _latency: Duration) {}
}

// ============================================================================
// SECTION: Latency Budgets
// ============================================================================

/// Soft latency budgets per operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyBudgets {
    /// Signature validation budget.
    pub signature: Duration,
    /// Metadata extraction budget.
    pub extract: Duration,
    /// Ticket fetch budget.
    pub fetch: Duration,
    /// Ticket update budget, retries included.
    pub update: Duration,
}

impl Default for LatencyBudgets {
    fn default() -> Self {
        Self {
            signature: Duration::from_millis(100),
            extract: Duration::from_millis(10),
            fetch: Duration::from_secs(2),
            update: Duration::from_secs(5),
        }
    }
}

impl From<&BudgetsConfig> for LatencyBudgets {
    fn from(config: &BudgetsConfig) -> Self {
        Self {
            signature: Duration::from_millis(config.signature_ms),
            extract: Duration::from_millis(config.extract_ms),
            fetch: Duration::from_millis(config.fetch_ms),
            update: Duration::from_millis(config.update_ms),
        }
    }
}

/// Labels attached to a latency observation.
pub struct LatencyLabels<'a> {
    /// Operation observed.
    pub operation: BridgeOperation,
    /// Tenant identifier when known.
    pub tenant_id: Option<&'a str>,
    /// Tool identifier when known.
    pub tool_id: Option<&'a str>,
}

/// Audits `elapsed` when it exceeds `budget`; returns true on overrun.
pub fn check_budget(
    audit: &dyn AuditSink,
    labels: &LatencyLabels<'_>,
    elapsed: Duration,
    budget: Duration,
) -> bool {
    if elapsed <= budget {
        return false;
    }
    audit.record_latency(&LatencyAuditEvent::new(
        labels.operation.as_str(),
        labels.tenant_id.map(str::to_string),
        labels.tool_id.map(str::to_string),
        elapsed.as_millis(),
        budget.as_millis(),
    ));
    true
}

// ============================================================================
// SECTION: Tests
// ============================================================================
