// crates/ticket-bridge-adapters/src/discovery.rs
// ============================================================================
// Module: Adapter Discovery
// Description: Factory-driven bootstrap of the adapter registry.
// Purpose: Build and register every known adapter without aborting on one.
// Dependencies: ticket-bridge-core
// ============================================================================

//! ## Overview
//! Adapters are shipped as [`AdapterFactory`] values. Discovery walks a
//! factory list, builds each adapter against the shared HTTP configuration,
//! and registers it. A candidate that fails to build or register is recorded
//! as an `adapter_skipped` audit event and the walk continues.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;

use ticket_bridge_core::HELPDESK_TOOL_ID;
use ticket_bridge_core::JIRA_TOOL_ID;
use ticket_bridge_core::TicketingAdapter;
use ticket_bridge_core::ToolId;
use ticket_bridge_core::audit::EVENT_ADAPTER_SKIPPED;
use ticket_bridge_core::audit::RegistryAuditEvent;

use crate::helpdesk::HelpdeskAdapter;
use crate::http::AdapterBuildError;
use crate::http::AdapterHttp;
use crate::http::HttpClientConfig;
use crate::jira::JiraAdapter;
use crate::registry::AdapterRegistry;

// ============================================================================
// SECTION: Factories
// ============================================================================

/// Builds one adapter from shared HTTP configuration.
pub trait AdapterFactory: Send + Sync {
    /// Tool identifier the built adapter registers under.
    fn tool_id(&self) -> &'static str;

    /// Builds the adapter.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterBuildError`] when construction fails.
    fn build(&self, http: &HttpClientConfig)
    -> Result<Arc<dyn TicketingAdapter>, AdapterBuildError>;
}

/// Factory for [`HelpdeskAdapter`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HelpdeskFactory;

impl AdapterFactory for HelpdeskFactory {
    fn tool_id(&self) -> &'static str {
        HELPDESK_TOOL_ID
    }

    fn build(
        &self,
        http: &HttpClientConfig,
    ) -> Result<Arc<dyn TicketingAdapter>, AdapterBuildError> {
        Ok(Arc::new(HelpdeskAdapter::new(AdapterHttp::new(http)?)))
    }
}

/// Factory for [`JiraAdapter`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JiraFactory;

impl AdapterFactory for JiraFactory {
    fn tool_id(&self) -> &'static str {
        JIRA_TOOL_ID
    }

    fn build(
        &self,
        http: &HttpClientConfig,
    ) -> Result<Arc<dyn TicketingAdapter>, AdapterBuildError> {
        Ok(Arc::new(JiraAdapter::new(AdapterHttp::new(http)?)))
    }
}

/// Returns factories for every shipped adapter.
#[must_use]
pub fn builtin_factories() -> Vec<Box<dyn AdapterFactory>> {
    vec![Box::new(HelpdeskFactory), Box::new(JiraFactory)]
}

/// Keeps factories named by `enabled`; `None` keeps all of them.
#[must_use]
pub fn enabled_factories(
    factories: Vec<Box<dyn AdapterFactory>>,
    enabled: Option<&BTreeSet<String>>,
) -> Vec<Box<dyn AdapterFactory>> {
    match enabled {
        None => factories,
        Some(enabled) => {
            factories.into_iter().filter(|factory| enabled.contains(factory.tool_id())).collect()
        }
    }
}

// ============================================================================
// SECTION: Discovery
// ============================================================================

/// Adapter candidate that discovery skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedAdapter {
    /// Candidate label (its declared tool identifier).
    pub label: String,
    /// Why the candidate was skipped.
    pub reason: String,
}

/// Outcome of a discovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Tool identifiers registered during the pass.
    pub registered: Vec<ToolId>,
    /// Candidates that failed to build or register.
    pub skipped: Vec<SkippedAdapter>,
}

impl AdapterRegistry {
    /// Builds and registers every factory's adapter.
    ///
    /// Failures are audited and reported; they never stop the pass.
    pub fn discover(
        &self,
        factories: &[Box<dyn AdapterFactory>],
        http: &HttpClientConfig,
    ) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();
        for factory in factories {
            let label = factory.tool_id();
            let outcome = factory
                .build(http)
                .map_err(|err| err.to_string())
                .and_then(|adapter| self.register(label, adapter).map_err(|err| err.to_string()));
            match outcome {
                Ok(()) => report.registered.push(ToolId::from_static(label)),
                Err(reason) => {
                    self.audit().record_registry(&RegistryAuditEvent::new(
                        EVENT_ADAPTER_SKIPPED,
                        label.to_string(),
                        Some(reason.clone()),
                    ));
                    report.skipped.push(SkippedAdapter { label: label.to_string(), reason });
                }
            }
        }
        report
    }
}
