// crates/ticket-bridge-runtime/src/rate_limit.rs
// ============================================================================
// Module: Webhook Rate Limiter
// Description: Sliding-log request limiter keyed by tenant and event type.
// Purpose: Enforce per-tenant webhook ceilings with exact trailing windows.
// Dependencies: tokio, ticket-bridge-core
// ============================================================================

//! ## Overview
//! Each `(tenant_id, event_type)` key owns a log of accepted request instants.
//! A request is admitted when fewer than `ceiling` instants fall inside the
//! trailing window, and the admitted instant is appended under the same lock.
//! Logs are created lazily and pruned when idle or when the key map is full.
//!
//! Security posture: webhook senders control event types, so the key map is
//! bounded twice. Each tenant holds at most `max_keys_per_tenant` keys, and a
//! tenant at its cap recycles its own least-recently-used key. When the whole
//! map is full, the tenant holding the most keys gives one up, so one tenant
//! cycling event types cannot reset another tenant's windows.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;

use ticket_bridge_core::TenantId;
use tokio::time::Instant;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Rate-limit key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Webhook event type.
    pub event_type: String,
}

impl RateLimitKey {
    /// Builds a key for a tenant and event type.
    #[must_use]
    pub fn new(tenant_id: TenantId, event_type: impl Into<String>) -> Self {
        Self { tenant_id, event_type: event_type.into() }
    }
}

/// Accepted request instants for one key.
#[derive(Debug)]
struct SlidingLog {
    /// Admitted instants, oldest first.
    hits: VecDeque<Instant>,
    /// Window the log was last checked against.
    window: Duration,
    /// Last time the key was checked.
    last_seen: Instant,
}

impl SlidingLog {
    /// Creates an empty log.
    const fn new(window: Duration, now: Instant) -> Self {
        Self { hits: VecDeque::new(), window, last_seen: now }
    }

    /// Drops instants that have left the window.
    fn expire(&mut self, now: Instant) {
        while let Some(oldest) = self.hits.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                self.hits.pop_front();
            } else {
                break;
            }
        }
    }
}

// ============================================================================
// SECTION: Limiter
// ============================================================================

/// Sliding-log limiter over a bounded key map.
///
/// # Invariants
/// - Test and increment happen under one lock; no `.await` while held.
/// - The map never holds more than `max_entries` keys.
/// - No tenant holds more than `max_keys_per_tenant` keys.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    /// Maximum tracked keys.
    max_entries: usize,
    /// Maximum tracked keys for one tenant.
    max_keys_per_tenant: usize,
    /// Logs keyed by tenant and event type.
    logs: Mutex<HashMap<RateLimitKey, SlidingLog>>,
}

impl SlidingWindowLimiter {
    /// Creates a limiter tracking at most `max_entries` keys.
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self { max_entries, max_keys_per_tenant: max_entries, logs: Mutex::new(HashMap::new()) }
    }

    /// Caps the keys one tenant may hold.
    #[must_use]
    pub fn with_tenant_cap(mut self, max_keys_per_tenant: usize) -> Self {
        self.max_keys_per_tenant = max_keys_per_tenant.clamp(1, self.max_entries);
        self
    }

    /// Admits a request or returns the wait until capacity frees up.
    ///
    /// # Errors
    ///
    /// Returns the retry-after duration when `ceiling` requests already fall
    /// inside the trailing `window`.
    pub fn check(
        &self,
        key: &RateLimitKey,
        ceiling: u32,
        window: Duration,
        now: Instant,
    ) -> Result<(), Duration> {
        let mut logs = self.logs.lock().unwrap_or_else(PoisonError::into_inner);
        if !logs.contains_key(key) {
            make_tenant_room(&mut logs, &key.tenant_id, self.max_keys_per_tenant, now);
            if logs.len() >= self.max_entries {
                make_room(&mut logs, self.max_entries, now);
            }
        }
        let log = logs.entry(key.clone()).or_insert_with(|| SlidingLog::new(window, now));
        log.window = window;
        log.last_seen = now;
        log.expire(now);

        if ceiling == 0 {
            return Err(window);
        }
        let limit = usize::try_from(ceiling).unwrap_or(usize::MAX);
        if log.hits.len() >= limit {
            let retry_after = log.hits.front().map_or(window, |oldest| {
                window.saturating_sub(now.saturating_duration_since(*oldest))
            });
            return Err(retry_after);
        }
        log.hits.push_back(now);
        Ok(())
    }

    /// Removes keys not checked within `idle_after`; returns the count removed.
    pub fn prune_idle(&self, idle_after: Duration, now: Instant) -> usize {
        let mut logs = self.logs.lock().unwrap_or_else(PoisonError::into_inner);
        let before = logs.len();
        logs.retain(|_, log| now.saturating_duration_since(log.last_seen) < idle_after);
        before - logs.len()
    }

    /// Returns the number of tracked keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.logs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true when no keys are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Frees a slot for `tenant_id` once it holds `cap` keys.
///
/// Only the tenant's own keys are touched: expired logs first, then the
/// least-recently-used key.
fn make_tenant_room(
    logs: &mut HashMap<RateLimitKey, SlidingLog>,
    tenant_id: &TenantId,
    cap: usize,
    now: Instant,
) {
    if logs.keys().filter(|key| &key.tenant_id == tenant_id).count() < cap {
        return;
    }
    logs.retain(|key, log| {
        if &key.tenant_id != tenant_id {
            return true;
        }
        log.expire(now);
        !log.hits.is_empty()
    });
    if logs.keys().filter(|key| &key.tenant_id == tenant_id).count() < cap {
        return;
    }
    let oldest = logs
        .iter()
        .filter(|(key, _)| &key.tenant_id == tenant_id)
        .min_by_key(|(_, log)| log.last_seen)
        .map(|(key, _)| key.clone());
    if let Some(key) = oldest {
        logs.remove(&key);
    }
}

/// Drops fully expired logs, then evicts the least-recently-used key of the
/// tenant holding the most keys if the map is still full.
fn make_room(logs: &mut HashMap<RateLimitKey, SlidingLog>, max_entries: usize, now: Instant) {
    logs.retain(|_, log| {
        log.expire(now);
        !log.hits.is_empty()
    });
    if logs.len() < max_entries {
        return;
    }
    let mut per_tenant: HashMap<&TenantId, usize> = HashMap::new();
    for key in logs.keys() {
        *per_tenant.entry(&key.tenant_id).or_default() += 1;
    }
    let heaviest = per_tenant.values().copied().max().unwrap_or(0);
    let oldest = logs
        .iter()
        .filter(|(key, _)| per_tenant.get(&key.tenant_id).copied() == Some(heaviest))
        .min_by_key(|(_, log)| log.last_seen)
        .map(|(key, _)| key.clone());
    if let Some(key) = oldest {
        logs.remove(&key);
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
