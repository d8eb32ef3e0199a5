// crates/ticket-bridge-core/src/audit.rs
// ============================================================================
// Module: Ticket Bridge Audit Logging
// Description: Structured audit events for webhooks, calls, and circuits.
// Purpose: Emit redacted JSON-lines audit records without hard dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! This module defines audit event payloads and sinks. Events are plain
//! serializable structs so deployments can route them into their preferred
//! logging pipeline. Sinks never fail the operation being audited.
//!
//! Security posture: events carry identifiers, outcome codes, and timings only.
//! Secrets and payload bodies are never recorded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Event Names
// ============================================================================

/// Webhook passed authentication.
pub const EVENT_WEBHOOK_ACCEPTED: &str = "webhook_accepted";
/// Webhook was rejected.
pub const EVENT_WEBHOOK_REJECTED: &str = "webhook_rejected";
/// Outbound adapter call completed.
pub const EVENT_OUTBOUND_CALL: &str = "outbound_call";
/// Circuit breaker changed phase.
pub const EVENT_CIRCUIT_TRANSITION: &str = "circuit_transition";
/// Adapter was registered.
pub const EVENT_ADAPTER_REGISTERED: &str = "adapter_registered";
/// Adapter candidate was skipped during discovery.
pub const EVENT_ADAPTER_SKIPPED: &str = "adapter_skipped";
/// Adapter was unregistered.
pub const EVENT_ADAPTER_UNREGISTERED: &str = "adapter_unregistered";
/// Operation exceeded its soft latency budget.
pub const EVENT_LATENCY_BUDGET_EXCEEDED: &str = "latency_budget_exceeded";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Webhook authentication audit event.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Tenant identifier when known.
    pub tenant_id: Option<String>,
    /// Tool identifier when known.
    pub tool_id: Option<String>,
    /// Event type when known.
    pub event_type: Option<String>,
    /// Stable outcome code (`accepted` or a rejection code).
    pub code: &'static str,
    /// Redacted detail message.
    pub detail: Option<String>,
}

/// Inputs required to construct a webhook audit event.
pub struct WebhookAuditEventParams {
    /// Tenant identifier when known.
    pub tenant_id: Option<String>,
    /// Tool identifier when known.
    pub tool_id: Option<String>,
    /// Event type when known.
    pub event_type: Option<String>,
    /// Stable outcome code.
    pub code: &'static str,
    /// Redacted detail message.
    pub detail: Option<String>,
}

impl WebhookAuditEvent {
    /// Creates an acceptance event.
    #[must_use]
    pub fn accepted(params: WebhookAuditEventParams) -> Self {
        Self::with_event(EVENT_WEBHOOK_ACCEPTED, params)
    }

    /// Creates a rejection event.
    #[must_use]
    pub fn rejected(params: WebhookAuditEventParams) -> Self {
        Self::with_event(EVENT_WEBHOOK_REJECTED, params)
    }

    /// Builds the event with a consistent timestamp.
    fn with_event(event: &'static str, params: WebhookAuditEventParams) -> Self {
        Self {
            event,
            timestamp_ms: now_ms(),
            tenant_id: params.tenant_id,
            tool_id: params.tool_id,
            event_type: params.event_type,
            code: params.code,
            detail: params.detail,
        }
    }
}

/// Outbound call audit event.
#[derive(Debug, Clone, Serialize)]
pub struct CallAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Tenant identifier.
    pub tenant_id: String,
    /// Tool identifier.
    pub tool_id: String,
    /// Operation label (`get_ticket` or `update_ticket`).
    pub operation: &'static str,
    /// Outcome label.
    pub outcome: &'static str,
    /// Network attempts made.
    pub attempts: u32,
    /// Total elapsed time in milliseconds, retries included.
    pub elapsed_ms: u128,
    /// Error message when the call failed.
    pub error: Option<String>,
}

/// Inputs required to construct a call audit event.
pub struct CallAuditEventParams {
    /// Tenant identifier.
    pub tenant_id: String,
    /// Tool identifier.
    pub tool_id: String,
    /// Operation label.
    pub operation: &'static str,
    /// Outcome label.
    pub outcome: &'static str,
    /// Network attempts made.
    pub attempts: u32,
    /// Total elapsed time in milliseconds.
    pub elapsed_ms: u128,
    /// Error message when the call failed.
    pub error: Option<String>,
}

impl CallAuditEvent {
    /// Creates a new call audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: CallAuditEventParams) -> Self {
        Self {
            event: EVENT_OUTBOUND_CALL,
            timestamp_ms: now_ms(),
            tenant_id: params.tenant_id,
            tool_id: params.tool_id,
            operation: params.operation,
            outcome: params.outcome,
            attempts: params.attempts,
            elapsed_ms: params.elapsed_ms,
            error: params.error,
        }
    }
}

/// Circuit breaker transition audit event.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Tenant identifier.
    pub tenant_id: String,
    /// Tool identifier.
    pub tool_id: String,
    /// Phase before the transition.
    pub from: &'static str,
    /// Phase after the transition.
    pub to: &'static str,
    /// Consecutive failures at transition time.
    pub consecutive_failures: u32,
}

impl CircuitAuditEvent {
    /// Creates a new circuit audit event with a consistent timestamp.
    #[must_use]
    pub fn new(
        tenant_id: String,
        tool_id: String,
        from: &'static str,
        to: &'static str,
        consecutive_failures: u32,
    ) -> Self {
        Self {
            event: EVENT_CIRCUIT_TRANSITION,
            timestamp_ms: now_ms(),
            tenant_id,
            tool_id,
            from,
            to,
            consecutive_failures,
        }
    }
}

/// Adapter registry audit event.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Tool identifier or candidate label.
    pub tool_id: String,
    /// Failure reason for skipped candidates.
    pub reason: Option<String>,
}

impl RegistryAuditEvent {
    /// Creates a new registry audit event with a consistent timestamp.
    #[must_use]
    pub fn new(event: &'static str, tool_id: String, reason: Option<String>) -> Self {
        Self { event, timestamp_ms: now_ms(), tool_id, reason }
    }
}

/// Soft latency budget audit event.
#[derive(Debug, Clone, Serialize)]
pub struct LatencyAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Operation label.
    pub operation: &'static str,
    /// Tenant identifier when known.
    pub tenant_id: Option<String>,
    /// Tool identifier when known.
    pub tool_id: Option<String>,
    /// Observed elapsed time in milliseconds.
    pub elapsed_ms: u128,
    /// Configured budget in milliseconds.
    pub budget_ms: u128,
}

impl LatencyAuditEvent {
    /// Creates a new latency audit event with a consistent timestamp.
    #[must_use]
    pub fn new(
        operation: &'static str,
        tenant_id: Option<String>,
        tool_id: Option<String>,
        elapsed_ms: u128,
        budget_ms: u128,
    ) -> Self {
        Self {
            event: EVENT_LATENCY_BUDGET_EXCEEDED,
            timestamp_ms: now_ms(),
            operation,
            tenant_id,
            tool_id,
            elapsed_ms,
            budget_ms,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for Ticket Bridge events.
pub trait AuditSink: Send + Sync {
    /// Record a webhook authentication event.
    fn record_webhook(&self, event: &WebhookAuditEvent);

    /// Record an outbound call event.
    fn record_call(&self, _event: &CallAuditEvent) {}

    /// Record a circuit transition event.
    fn record_circuit(&self, _event: &CircuitAuditEvent) {}

    /// Record an adapter registry event.
    fn record_registry(&self, _event: &RegistryAuditEvent) {}

    /// Record a latency budget event.
    fn record_latency(&self, _event: &LatencyAuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record_webhook(&self, event: &WebhookAuditEvent) {
        write_json_line(&mut io::stderr(), event);
    }

    fn record_call(&self, event: &CallAuditEvent) {
        write_json_line(&mut io::stderr(), event);
    }

    fn record_circuit(&self, event: &CircuitAuditEvent) {
        write_json_line(&mut io::stderr(), event);
    }

    fn record_registry(&self, event: &RegistryAuditEvent) {
        write_json_line(&mut io::stderr(), event);
    }

    fn record_latency(&self, event: &LatencyAuditEvent) {
        write_json_line(&mut io::stderr(), event);
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file: Mutex::new(file) })
    }

    /// Appends one event under the file lock.
    fn append<T: Serialize>(&self, event: &T) {
        if let Ok(mut file) = self.file.lock() {
            write_json_line(&mut *file, event);
            let _ = file.flush();
        }
    }
}

impl AuditSink for FileAuditSink {
    fn record_webhook(&self, event: &WebhookAuditEvent) {
        self.append(event);
    }

    fn record_call(&self, event: &CallAuditEvent) {
        self.append(event);
    }

    fn record_circuit(&self, event: &CircuitAuditEvent) {
        self.append(event);
    }

    fn record_registry(&self, event: &RegistryAuditEvent) {
        self.append(event);
    }

    fn record_latency(&self, event: &LatencyAuditEvent) {
        self.append(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record_webhook(&self, _event: &WebhookAuditEvent) {}
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the current time in milliseconds since the Unix epoch.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

/// Serializes an event and writes it as one line.
fn write_json_line<W: Write, T: Serialize>(writer: &mut W, event: &T) {
    if let Ok(payload) = serde_json::to_string(event) {
        let _ = writeln!(writer, "{payload}");
    }
}
