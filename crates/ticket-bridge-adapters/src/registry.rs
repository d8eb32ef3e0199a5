// crates/ticket-bridge-adapters/src/registry.rs
// ============================================================================
// Module: Adapter Registry
// Description: Tool identifier to ticketing adapter routing table.
// Purpose: Validate adapters at registration and resolve them at lookup time.
// Dependencies: ticket-bridge-core
// ============================================================================

//! ## Overview
//! The adapter registry maps tool identifiers to [`TicketingAdapter`] trait
//! objects. It is an explicitly constructed value shared through `Arc`, so
//! every test and host wires its own isolated table.
//! Invariants:
//! - At most one adapter is registered per tool identifier.
//! - Registration validates the adapter's self-description before insert.
//! - Lookups return sorted, read-only snapshots.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;

use thiserror::Error;
use ticket_bridge_core::AuditSink;
use ticket_bridge_core::NoopAuditSink;
use ticket_bridge_core::TicketingAdapter;
use ticket_bridge_core::TicketingError;
use ticket_bridge_core::ToolId;
use ticket_bridge_core::audit::EVENT_ADAPTER_REGISTERED;
use ticket_bridge_core::audit::EVENT_ADAPTER_UNREGISTERED;
use ticket_bridge_core::audit::RegistryAuditEvent;
use ticket_bridge_core::errors::join_tool_ids;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Adapter registry failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The candidate failed registration checks.
    #[error("invalid adapter {tool_id}: {reason}")]
    InvalidAdapter {
        /// Candidate tool identifier.
        tool_id: String,
        /// Failed check.
        reason: String,
    },
    /// No adapter is registered for the tool.
    #[error("no adapter registered for {tool_id}; registered: [{}]", join_tool_ids(.registered))]
    AdapterNotFound {
        /// Requested tool identifier.
        tool_id: String,
        /// Registered tool identifiers, sorted.
        registered: Vec<ToolId>,
    },
}

impl RegistryError {
    /// Builds an invalid-adapter error.
    fn invalid(tool_id: &str, reason: impl Into<String>) -> Self {
        Self::InvalidAdapter { tool_id: tool_id.to_string(), reason: reason.into() }
    }
}

impl From<RegistryError> for TicketingError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::InvalidAdapter { tool_id, reason } => {
                Self::InvalidAdapter { tool_id, reason }
            }
            RegistryError::AdapterNotFound { tool_id, registered } => {
                Self::AdapterNotFound { tool_id, registered }
            }
        }
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Routing table from tool identifier to adapter.
///
/// # Invariants
/// - Entries are only inserted after [`validate_adapter`] passes.
/// - No lock is held across an `.await`; adapters are cloned out as `Arc`s.
pub struct AdapterRegistry {
    /// Registered adapters keyed by tool identifier.
    adapters: RwLock<BTreeMap<ToolId, Arc<dyn TicketingAdapter>>>,
    /// Audit sink for registry events.
    audit: Arc<dyn AuditSink>,
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterRegistry {
    /// Creates an empty registry that discards audit events.
    #[must_use]
    pub fn new() -> Self {
        Self::with_audit(Arc::new(NoopAuditSink))
    }

    /// Creates an empty registry that records events to `audit`.
    #[must_use]
    pub fn with_audit(audit: Arc<dyn AuditSink>) -> Self {
        Self { adapters: RwLock::new(BTreeMap::new()), audit }
    }

    /// Returns the registry's audit sink.
    pub(crate) fn audit(&self) -> &dyn AuditSink {
        self.audit.as_ref()
    }

    /// Registers an adapter under `tool_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidAdapter`] when the identifier is
    /// malformed, already registered, or the adapter's self-description fails
    /// validation.
    pub fn register(
        &self,
        tool_id: &str,
        adapter: Arc<dyn TicketingAdapter>,
    ) -> Result<(), RegistryError> {
        let key =
            ToolId::parse(tool_id).map_err(|err| RegistryError::invalid(tool_id, err.to_string()))?;
        validate_adapter(&key, adapter.as_ref())?;
        {
            let mut adapters = self.adapters.write().unwrap_or_else(PoisonError::into_inner);
            if adapters.contains_key(&key) {
                return Err(RegistryError::invalid(tool_id, "adapter already registered"));
            }
            adapters.insert(key.clone(), adapter);
        }
        self.audit.record_registry(&RegistryAuditEvent::new(
            EVENT_ADAPTER_REGISTERED,
            key.to_string(),
            None,
        ));
        Ok(())
    }

    /// Resolves the adapter registered for `tool_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AdapterNotFound`] listing every registered
    /// tool when nothing matches.
    pub fn resolve(&self, tool_id: &str) -> Result<Arc<dyn TicketingAdapter>, RegistryError> {
        let adapters = self.adapters.read().unwrap_or_else(PoisonError::into_inner);
        let found = ToolId::parse(tool_id).ok().and_then(|key| adapters.get(&key).cloned());
        found.ok_or_else(|| RegistryError::AdapterNotFound {
            tool_id: tool_id.to_string(),
            registered: adapters.keys().cloned().collect(),
        })
    }

    /// Returns the registered tool identifiers in sorted order.
    #[must_use]
    pub fn list(&self) -> Vec<ToolId> {
        self.adapters.read().unwrap_or_else(PoisonError::into_inner).keys().cloned().collect()
    }

    /// Returns a snapshot of registered adapters in tool order.
    #[must_use]
    pub fn adapters(&self) -> Vec<(ToolId, Arc<dyn TicketingAdapter>)> {
        self.adapters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(tool_id, adapter)| (tool_id.clone(), Arc::clone(adapter)))
            .collect()
    }

    /// Removes the adapter for `tool_id`; returns whether one was removed.
    pub fn unregister(&self, tool_id: &str) -> bool {
        let Ok(key) = ToolId::parse(tool_id) else {
            return false;
        };
        let removed = self
            .adapters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key)
            .is_some();
        if removed {
            self.audit.record_registry(&RegistryAuditEvent::new(
                EVENT_ADAPTER_UNREGISTERED,
                key.to_string(),
                None,
            ));
        }
        removed
    }
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Checks an adapter's self-description against the registration key.
///
/// # Errors
///
/// Returns [`RegistryError::InvalidAdapter`] naming the first failed check.
pub fn validate_adapter(
    tool_id: &ToolId,
    adapter: &dyn TicketingAdapter,
) -> Result<(), RegistryError> {
    let key = tool_id.as_str();
    let descriptor = adapter.descriptor();
    if descriptor.tool_id != *tool_id {
        return Err(RegistryError::invalid(
            key,
            format!("descriptor declares tool {}", descriptor.tool_id),
        ));
    }
    if descriptor.display_name.trim().is_empty() {
        return Err(RegistryError::invalid(key, "display name must be non-empty"));
    }
    let profile = adapter.webhook_profile();
    if !is_valid_path(profile.tenant_id_path) {
        return Err(RegistryError::invalid(key, "tenant id path must be non-empty"));
    }
    if !is_valid_path(profile.timestamp_path) {
        return Err(RegistryError::invalid(key, "timestamp path must be non-empty"));
    }
    if profile.event_type_path.is_some_and(|path| !is_valid_path(path)) {
        return Err(RegistryError::invalid(key, "event type path must be non-empty"));
    }
    if profile.default_event_type.trim().is_empty() {
        return Err(RegistryError::invalid(key, "default event type must be non-empty"));
    }
    let priorities = adapter.priority_table();
    if priorities.is_empty() {
        return Err(RegistryError::invalid(key, "priority table must be non-empty"));
    }
    if priorities.entries().iter().any(|(native, _)| native.trim().is_empty()) {
        return Err(RegistryError::invalid(key, "priority names must be non-empty"));
    }
    Ok(())
}

/// Returns true when a field path has segments and none are empty.
fn is_valid_path(path: &[&str]) -> bool {
    !path.is_empty() && path.iter().all(|segment| !segment.is_empty())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
