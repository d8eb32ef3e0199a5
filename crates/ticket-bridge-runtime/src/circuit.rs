// crates/ticket-bridge-runtime/src/circuit.rs
// ============================================================================
// Module: Circuit Breakers
// Description: Per-tenant, per-tool circuit breakers for outbound calls.
// Purpose: Stop calling a failing tool and probe it again after a cooldown.
// Dependencies: tokio, ticket-bridge-core
// ============================================================================

//! ## Overview
//! One breaker exists per `(tenant_id, tool_id)`, created lazily in the
//! `closed` phase. Consecutive failures open it; after the cooldown a single
//! probe permit is granted in `half-open`. The probe's outcome either closes
//! the breaker or reopens it with a fresh cooldown. Every phase change is
//! emitted as a `circuit_transition` audit event.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;

use ticket_bridge_config::CircuitBreakerConfig;
use ticket_bridge_core::AuditSink;
use ticket_bridge_core::TenantId;
use ticket_bridge_core::ToolId;
use ticket_bridge_core::audit::CircuitAuditEvent;
use tokio::time::Instant;

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Breaker thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitPolicy {
    /// Consecutive failures that open the breaker.
    pub failure_threshold: u32,
    /// Time the breaker stays open before a probe.
    pub cooldown: Duration,
}

impl Default for CircuitPolicy {
    fn default() -> Self {
        Self { failure_threshold: 5, cooldown: Duration::from_secs(60) }
    }
}

impl From<&CircuitBreakerConfig> for CircuitPolicy {
    fn from(config: &CircuitBreakerConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold,
            cooldown: Duration::from_millis(config.cooldown_ms),
        }
    }
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// Breaker key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CircuitKey {
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Tool identifier.
    pub tool_id: ToolId,
}

impl CircuitKey {
    /// Builds a key for a tenant and tool.
    #[must_use]
    pub const fn new(tenant_id: TenantId, tool_id: ToolId) -> Self {
        Self { tenant_id, tool_id }
    }
}

/// Breaker phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitPhase {
    /// Calls flow; failures are counted.
    Closed,
    /// Calls are rejected until the cooldown elapses.
    Open,
    /// One probe call decides whether to close.
    HalfOpen,
}

impl CircuitPhase {
    /// Returns a stable label for the phase.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// How a permitted call ended, from the breaker's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    /// The dependency answered.
    Success,
    /// The dependency failed or did not answer.
    Failure,
    /// The dependency asked the caller to slow down.
    Neutral,
}

/// Permission to make one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permit {
    /// True when this call is the half-open probe.
    pub probe: bool,
}

/// Transient state for one key.
#[derive(Debug, Clone)]
struct CircuitState {
    /// Current phase.
    phase: CircuitPhase,
    /// Consecutive failures.
    consecutive_failures: u32,
    /// Instant of the most recent failure.
    last_failure: Option<Instant>,
    /// Instant the breaker last opened.
    opened_at: Option<Instant>,
    /// True while the half-open probe is outstanding.
    probe_in_flight: bool,
    /// Last time the key was touched.
    last_seen: Instant,
}

impl CircuitState {
    /// Creates a closed breaker.
    const fn new(now: Instant) -> Self {
        Self {
            phase: CircuitPhase::Closed,
            consecutive_failures: 0,
            last_failure: None,
            opened_at: None,
            probe_in_flight: false,
            last_seen: now,
        }
    }
}

/// Phase change to audit once the lock is released.
struct Transition {
    /// Phase before the change.
    from: CircuitPhase,
    /// Phase after the change.
    to: CircuitPhase,
    /// Consecutive failures at the change.
    consecutive_failures: u32,
}

// ============================================================================
// SECTION: Breakers
// ============================================================================

/// Concurrent map of circuit breakers.
///
/// # Invariants
/// - At most one probe is in flight per key while half-open.
/// - No `.await` happens while the map lock is held.
pub struct CircuitBreakers {
    /// Thresholds applied to every key.
    policy: CircuitPolicy,
    /// Breaker state keyed by tenant and tool.
    states: Mutex<HashMap<CircuitKey, CircuitState>>,
    /// Sink for transition events.
    audit: Arc<dyn AuditSink>,
}

impl CircuitBreakers {
    /// Creates an empty breaker map.
    #[must_use]
    pub fn new(policy: CircuitPolicy, audit: Arc<dyn AuditSink>) -> Self {
        Self { policy, states: Mutex::new(HashMap::new()), audit }
    }

    /// Returns the breaker thresholds.
    #[must_use]
    pub const fn policy(&self) -> CircuitPolicy {
        self.policy
    }

    /// Requests permission for one call.
    ///
    /// # Errors
    ///
    /// Returns the time until a call may be attempted when the breaker is
    /// open, or when the half-open probe is already in flight.
    pub fn try_acquire(&self, key: &CircuitKey, now: Instant) -> Result<Permit, Duration> {
        let (decision, transition) = {
            let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
            let state = states.entry(key.clone()).or_insert_with(|| CircuitState::new(now));
            state.last_seen = now;
            self.acquire_locked(state, now)
        };
        if let Some(transition) = transition {
            self.emit(key, &transition);
        }
        decision
    }

    /// Requests a permit that settles itself when dropped.
    ///
    /// A guard dropped without [`PermitGuard::settle`] records a failure, so
    /// a cancelled call never leaves the half-open probe outstanding.
    ///
    /// # Errors
    ///
    /// Returns the time until a call may be attempted, as for
    /// [`CircuitBreakers::try_acquire`].
    pub fn acquire_guard<'a>(
        &'a self,
        key: &'a CircuitKey,
        now: Instant,
    ) -> Result<PermitGuard<'a>, Duration> {
        let permit = self.try_acquire(key, now)?;
        Ok(PermitGuard { breakers: self, key, permit, settled: false })
    }

    /// Records the outcome of a permitted call.
    pub fn record(&self, key: &CircuitKey, permit: Permit, outcome: CallOutcome, now: Instant) {
        let transition = {
            let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
            let state = states.entry(key.clone()).or_insert_with(|| CircuitState::new(now));
            state.last_seen = now;
            self.record_locked(state, permit, outcome, now)
        };
        if let Some(transition) = transition {
            self.emit(key, &transition);
        }
    }

    /// Returns the current phase for a key; unknown keys are closed.
    #[must_use]
    pub fn phase(&self, key: &CircuitKey) -> CircuitPhase {
        let states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        states.get(key).map_or(CircuitPhase::Closed, |state| state.phase)
    }

    /// Returns consecutive failures for a key.
    #[must_use]
    pub fn consecutive_failures(&self, key: &CircuitKey) -> u32 {
        let states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        states.get(key).map_or(0, |state| state.consecutive_failures)
    }

    /// Removes keys untouched for `idle_after`; returns the count removed.
    ///
    /// Open breakers are kept until their cooldown has elapsed.
    pub fn prune_idle(&self, idle_after: Duration, now: Instant) -> usize {
        let cooldown = self.policy.cooldown;
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        let before = states.len();
        states.retain(|_, state| {
            let idle = now.saturating_duration_since(state.last_seen) >= idle_after;
            let cooling = state.phase == CircuitPhase::Open
                && state
                    .opened_at
                    .is_some_and(|opened| now.saturating_duration_since(opened) < cooldown);
            !idle || cooling
        });
        before - states.len()
    }

    /// Returns the number of tracked keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true when no keys are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Applies the permit rules to locked state.
    fn acquire_locked(
        &self,
        state: &mut CircuitState,
        now: Instant,
    ) -> (Result<Permit, Duration>, Option<Transition>) {
        match state.phase {
            CircuitPhase::Closed => (Ok(Permit { probe: false }), None),
            CircuitPhase::Open => {
                let elapsed = state.opened_at.map_or(self.policy.cooldown, |opened| {
                    now.saturating_duration_since(opened)
                });
                if elapsed < self.policy.cooldown {
                    return (Err(self.policy.cooldown - elapsed), None);
                }
                let transition = transition(state, CircuitPhase::HalfOpen);
                state.probe_in_flight = true;
                (Ok(Permit { probe: true }), Some(transition))
            }
            CircuitPhase::HalfOpen => {
                if state.probe_in_flight {
                    return (Err(self.policy.cooldown), None);
                }
                state.probe_in_flight = true;
                (Ok(Permit { probe: true }), None)
            }
        }
    }

    /// Applies a call outcome to locked state.
    fn record_locked(
        &self,
        state: &mut CircuitState,
        permit: Permit,
        outcome: CallOutcome,
        now: Instant,
    ) -> Option<Transition> {
        match (state.phase, outcome) {
            (CircuitPhase::Closed, CallOutcome::Success) => {
                state.consecutive_failures = 0;
                None
            }
            (CircuitPhase::Closed, CallOutcome::Failure) => {
                state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                state.last_failure = Some(now);
                if state.consecutive_failures >= self.policy.failure_threshold {
                    state.opened_at = Some(now);
                    Some(transition(state, CircuitPhase::Open))
                } else {
                    None
                }
            }
            (CircuitPhase::HalfOpen, CallOutcome::Success) if permit.probe => {
                state.consecutive_failures = 0;
                state.probe_in_flight = false;
                state.opened_at = None;
                Some(transition(state, CircuitPhase::Closed))
            }
            (CircuitPhase::HalfOpen, CallOutcome::Failure) if permit.probe => {
                state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                state.last_failure = Some(now);
                state.probe_in_flight = false;
                state.opened_at = Some(now);
                Some(transition(state, CircuitPhase::Open))
            }
            (CircuitPhase::HalfOpen, CallOutcome::Neutral) if permit.probe => {
                state.probe_in_flight = false;
                None
            }
            (CircuitPhase::Open, CallOutcome::Failure) => {
                state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                state.last_failure = Some(now);
                None
            }
            // Results of calls permitted before the phase changed do not
            // move the breaker.
            _ => None,
        }
    }

    /// Emits a transition audit event.
    fn emit(&self, key: &CircuitKey, transition: &Transition) {
        self.audit.record_circuit(&CircuitAuditEvent::new(
            key.tenant_id.to_string(),
            key.tool_id.to_string(),
            transition.from.as_str(),
            transition.to.as_str(),
            transition.consecutive_failures,
        ));
    }
}

// ============================================================================
// SECTION: Permit Guard
// ============================================================================

/// Outstanding permit bound to its breaker.
pub struct PermitGuard<'a> {
    /// Breakers that granted the permit.
    breakers: &'a CircuitBreakers,
    /// Key the permit belongs to.
    key: &'a CircuitKey,
    /// The granted permit.
    permit: Permit,
    /// True once an outcome was recorded.
    settled: bool,
}

impl PermitGuard<'_> {
    /// Returns the underlying permit.
    #[must_use]
    pub const fn permit(&self) -> Permit {
        self.permit
    }

    /// Records the call outcome and releases the permit.
    pub fn settle(mut self, outcome: CallOutcome) {
        self.settled = true;
        self.breakers.record(self.key, self.permit, outcome, Instant::now());
    }
}

impl Drop for PermitGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breakers.record(self.key, self.permit, CallOutcome::Failure, Instant::now());
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Moves state to `to` and describes the change.
const fn transition(state: &mut CircuitState, to: CircuitPhase) -> Transition {
    let from = state.phase;
    state.phase = to;
    Transition { from, to, consecutive_failures: state.consecutive_failures }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
