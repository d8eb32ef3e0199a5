// crates/ticket-bridge-runtime/src/service.rs
// ============================================================================
// Module: Ticketing Service
// Description: Facade over authentication, extraction, and resilient calls.
// Purpose: Give webhook handlers and job workers one shared entry point.
// Dependencies: tokio, ticket-bridge-adapters, ticket-bridge-config, ticket-bridge-core
// ============================================================================

//! ## Overview
//! [`TicketingService`] ties the runtime together. Inbound webhooks go through
//! the [`WebhookAuthenticator`] and the tenant's adapter extracts canonical
//! metadata. Outbound fetches and updates decrypt the tenant's credentials
//! into a [`ToolSession`] and run through the [`CallExecutor`]. Fetch failures
//! raise typed errors; update failures degrade to `false` unless the tool
//! rejected the credentials.
//!
//! The service is `Send + Sync` and meant to be shared behind an [`Arc`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::Weak;
use std::time::Duration;

use thiserror::Error;
use ticket_bridge_adapters::AdapterRegistry;
use ticket_bridge_adapters::DiscoveryReport;
use ticket_bridge_adapters::builtin_factories;
use ticket_bridge_adapters::enabled_factories;
use ticket_bridge_config::AuditConfig;
use ticket_bridge_config::AuditSinkKind;
use ticket_bridge_config::BridgeConfig;
use ticket_bridge_core::AuditSink;
use ticket_bridge_core::CanonicalTicketMetadata;
use ticket_bridge_core::Clock;
use ticket_bridge_core::CredentialStore;
use ticket_bridge_core::EnhancementContent;
use ticket_bridge_core::FileAuditSink;
use ticket_bridge_core::NoopAuditSink;
use ticket_bridge_core::StderrAuditSink;
use ticket_bridge_core::SystemClock;
use ticket_bridge_core::TenantConfig;
use ticket_bridge_core::TenantId;
use ticket_bridge_core::Ticket;
use ticket_bridge_core::TicketId;
use ticket_bridge_core::TicketingAdapter;
use ticket_bridge_core::TicketingError;
use ticket_bridge_core::ToolSession;
use ticket_bridge_core::ValidationError;
use ticket_bridge_core::audit::CallAuditEvent;
use ticket_bridge_core::audit::CallAuditEventParams;
use ticket_bridge_core::payload::display_path;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::authenticator::AuditTrail;
use crate::authenticator::AuthenticatorPolicy;
use crate::authenticator::RejectionReason;
use crate::authenticator::WebhookAuthenticator;
use crate::authenticator::WebhookRequest;
use crate::authenticator::audit_rejection;
use crate::circuit::CircuitBreakers;
use crate::circuit::CircuitKey;
use crate::circuit::CircuitPolicy;
use crate::executor::CallExecutor;
use crate::executor::Execution;
use crate::executor::ExecutorError;
use crate::executor::RetryPolicy;
use crate::telemetry::BridgeMetricEvent;
use crate::telemetry::BridgeMetrics;
use crate::telemetry::BridgeOperation;
use crate::telemetry::BridgeOutcome;
use crate::telemetry::LatencyBudgets;
use crate::telemetry::LatencyLabels;
use crate::telemetry::NoopMetrics;
use crate::telemetry::check_budget;

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Runtime settings derived from config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceSettings {
    /// Authenticator policy.
    pub authenticator: AuthenticatorPolicy,
    /// Retry policy.
    pub retry: RetryPolicy,
    /// Circuit breaker policy.
    pub circuit: CircuitPolicy,
    /// Soft latency budgets.
    pub budgets: LatencyBudgets,
    /// Idle period after which transient keys are pruned.
    pub idle_after: Duration,
    /// Period between background sweeps.
    pub sweep_interval: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            authenticator: AuthenticatorPolicy::default(),
            retry: RetryPolicy::default(),
            circuit: CircuitPolicy::default(),
            budgets: LatencyBudgets::default(),
            idle_after: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl ServiceSettings {
    /// Derives settings from validated config.
    #[must_use]
    pub fn from_config(config: &BridgeConfig) -> Self {
        let budgets = LatencyBudgets::from(&config.budgets);
        Self {
            authenticator: AuthenticatorPolicy::from_config(
                &config.authenticator,
                budgets.signature,
            ),
            retry: RetryPolicy::from(&config.executor),
            circuit: CircuitPolicy::from(&config.circuit_breaker),
            budgets,
            idle_after: Duration::from_millis(config.sweep.idle_after_ms),
            sweep_interval: Duration::from_millis(config.sweep.interval_ms),
        }
    }
}

/// Collaborators injected into the service.
pub struct ServiceDependencies {
    /// Adapter registry.
    pub registry: Arc<AdapterRegistry>,
    /// Tenant configuration and secrets.
    pub store: Arc<dyn CredentialStore>,
    /// Wall clock for webhook freshness.
    pub clock: Arc<dyn Clock>,
    /// Audit sink.
    pub audit: Arc<dyn AuditSink>,
    /// Metrics sink.
    pub metrics: Arc<dyn BridgeMetrics>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Service construction failures.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The audit sink could not be opened.
    #[error("audit sink unavailable: {0}")]
    AuditSink(String),
    /// No tokio runtime is available for background work.
    #[error("tokio runtime unavailable: {0}")]
    Runtime(String),
}

/// Service built from config with its sweeper running.
pub struct RunningService {
    /// Shared service.
    pub service: Arc<TicketingService>,
    /// Background sweeper; it exits once every service handle is dropped.
    pub sweeper: JoinHandle<()>,
    /// Adapters registered or skipped during discovery.
    pub report: DiscoveryReport,
}

/// Keys pruned by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Rate-limit keys removed.
    pub rate_limit_keys: usize,
    /// Circuit keys removed.
    pub circuit_keys: usize,
}

// ============================================================================
// SECTION: Service
// ============================================================================

/// Multi-tenant ticketing facade.
///
/// # Invariants
/// - Decrypted credentials live only for the duration of one call.
/// - Every outbound call is audited, including calls that never reached the tool.
pub struct TicketingService {
    /// Adapter registry.
    registry: Arc<AdapterRegistry>,
    /// Tenant configuration and secrets.
    store: Arc<dyn CredentialStore>,
    /// Webhook checks.
    authenticator: WebhookAuthenticator,
    /// Breakers shared with the executor.
    breakers: Arc<CircuitBreakers>,
    /// Retry driver.
    executor: CallExecutor,
    /// Audit sink.
    audit: Arc<dyn AuditSink>,
    /// Metrics sink.
    metrics: Arc<dyn BridgeMetrics>,
    /// Runtime settings.
    settings: ServiceSettings,
}

impl TicketingService {
    /// Creates a service from settings and collaborators.
    #[must_use]
    pub fn new(settings: ServiceSettings, deps: ServiceDependencies) -> Self {
        let authenticator = WebhookAuthenticator::new(
            Arc::clone(&deps.registry),
            Arc::clone(&deps.store),
            deps.clock,
            settings.authenticator,
            Arc::clone(&deps.audit),
        );
        let breakers = Arc::new(CircuitBreakers::new(settings.circuit, Arc::clone(&deps.audit)));
        let executor = CallExecutor::new(settings.retry, Arc::clone(&breakers));
        Self {
            registry: deps.registry,
            store: deps.store,
            authenticator,
            breakers,
            executor,
            audit: deps.audit,
            metrics: deps.metrics,
            settings,
        }
    }

    /// Builds a service from config, discovering the enabled built-in adapters.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the configured audit sink cannot be opened.
    pub fn from_config(
        config: &BridgeConfig,
        store: Arc<dyn CredentialStore>,
    ) -> Result<(Self, DiscoveryReport), ServiceError> {
        let audit = build_audit_sink(&config.audit)?;
        let registry = Arc::new(AdapterRegistry::with_audit(Arc::clone(&audit)));
        let factories = enabled_factories(builtin_factories(), config.adapters.enabled.as_ref());
        let report = registry.discover(&factories, &config.http);
        let deps = ServiceDependencies {
            registry,
            store,
            clock: Arc::new(SystemClock),
            audit,
            metrics: Arc::new(NoopMetrics),
        };
        Ok((Self::new(ServiceSettings::from_config(config), deps), report))
    }

    /// Builds a service from config and starts its sweeper at `sweep.interval_ms`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the audit sink cannot be opened or when
    /// called outside a tokio runtime.
    pub fn start_from_config(
        config: &BridgeConfig,
        store: Arc<dyn CredentialStore>,
    ) -> Result<RunningService, ServiceError> {
        tokio::runtime::Handle::try_current()
            .map_err(|err| ServiceError::Runtime(err.to_string()))?;
        let (service, report) = Self::from_config(config, store)?;
        let service = Arc::new(service);
        let sweeper = service.spawn_configured_sweeper();
        Ok(RunningService { service, sweeper, report })
    }

    /// Returns the runtime settings.
    #[must_use]
    pub const fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Returns the adapter registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    /// Returns the webhook authenticator.
    #[must_use]
    pub const fn authenticator(&self) -> &WebhookAuthenticator {
        &self.authenticator
    }

    /// Returns the circuit breakers.
    #[must_use]
    pub const fn breakers(&self) -> &Arc<CircuitBreakers> {
        &self.breakers
    }

    /// Authenticates a webhook and extracts canonical metadata.
    ///
    /// # Errors
    ///
    /// Returns the [`RejectionReason`] for failed checks or extraction.
    pub async fn authenticate_and_extract(
        &self,
        request: &WebhookRequest,
    ) -> Result<CanonicalTicketMetadata, RejectionReason> {
        let webhook = self.authenticator.authenticate(request).await?;
        let profile = webhook.adapter.webhook_profile();
        let started = std::time::Instant::now();
        let extracted = webhook.adapter.extract_metadata(&webhook.payload);
        let tool_id = webhook.tenant.tool_id();
        check_budget(
            self.audit.as_ref(),
            &LatencyLabels {
                operation: BridgeOperation::Extract,
                tenant_id: Some(webhook.tenant.tenant_id.as_str()),
                tool_id: Some(tool_id.as_str()),
            },
            started.elapsed(),
            self.settings.budgets.extract,
        );

        let checked = extracted.map_err(RejectionReason::from).and_then(|metadata| {
            if metadata.tenant_id == webhook.tenant.tenant_id {
                Ok(metadata)
            } else {
                Err(RejectionReason::InvalidPayload(ValidationError::new(
                    display_path(profile.tenant_id_path),
                    "tenant does not match the authenticated tenant",
                )))
            }
        });
        if let Err(reason) = &checked {
            audit_rejection(self.audit.as_ref(), &AuditTrail::for_webhook(&webhook), reason);
        }
        checked
    }

    /// Reduces webhook authentication to a boolean; never fails.
    pub async fn validate_webhook(&self, request: &WebhookRequest) -> bool {
        self.authenticator.validate(request).await
    }

    /// Fetches a ticket through the tenant's adapter.
    ///
    /// # Errors
    ///
    /// Returns [`TicketingError`] for tenant, routing, credential, circuit,
    /// authentication, and exhausted-retry failures.
    pub async fn fetch_ticket(
        &self,
        tenant_id: &TenantId,
        ticket_id: &TicketId,
    ) -> Result<Option<Ticket>, TicketingError> {
        let started = Instant::now();
        let call = match self.prepare_call(tenant_id).await {
            Ok(call) => call,
            Err(err) => {
                self.record_call(&CallRecord::setup_failure(
                    BridgeOperation::GetTicket,
                    tenant_id,
                    &err,
                ));
                return Err(err);
            }
        };
        let adapter = call.adapter.as_ref();
        let session = &call.session;
        let execution =
            self.executor.execute(&call.key, move || adapter.get_ticket(session, ticket_id)).await;
        drop(call.session);

        let Execution { result, attempts } = execution;
        let outcome = match &result {
            Ok(Some(_)) => BridgeOutcome::Ok,
            Ok(None) => BridgeOutcome::NotFound,
            Err(err) => executor_outcome(err),
        };
        let error = result.as_ref().err().map(ToString::to_string);
        self.record_call(&CallRecord {
            operation: BridgeOperation::GetTicket,
            tenant_id: tenant_id.as_str(),
            tool_id: Some(call.key.tool_id.as_str()),
            outcome,
            attempts,
            elapsed: started.elapsed(),
            budget: Some(self.settings.budgets.fetch),
            error,
        });
        result.map_err(|err| into_ticketing_error(err, &call.key))
    }

    /// Posts an internal note to a ticket.
    ///
    /// Returns `Ok(false)` when the tool refused the note, the retry budget
    /// ran out, or the circuit was open. Empty content is never sent.
    ///
    /// # Errors
    ///
    /// Returns [`TicketingError::AuthenticationFailure`] when the tool rejects
    /// the credentials, and tenant, routing, or credential errors raised
    /// before any request is made.
    pub async fn post_update(
        &self,
        tenant_id: &TenantId,
        ticket_id: &TicketId,
        content: &EnhancementContent,
    ) -> Result<bool, TicketingError> {
        if content.is_empty() {
            self.record_call(&CallRecord {
                operation: BridgeOperation::UpdateTicket,
                tenant_id: tenant_id.as_str(),
                tool_id: None,
                outcome: BridgeOutcome::Rejected,
                attempts: 0,
                elapsed: Duration::ZERO,
                budget: None,
                error: Some("enhancement content is empty".to_string()),
            });
            return Ok(false);
        }
        let started = Instant::now();
        let call = match self.prepare_call(tenant_id).await {
            Ok(call) => call,
            Err(err) => {
                self.record_call(&CallRecord::setup_failure(
                    BridgeOperation::UpdateTicket,
                    tenant_id,
                    &err,
                ));
                return Err(err);
            }
        };
        let adapter = call.adapter.as_ref();
        let session = &call.session;
        let execution = self
            .executor
            .execute(&call.key, move || adapter.update_ticket(session, ticket_id, content))
            .await;
        drop(call.session);

        let Execution { result, attempts } = execution;
        let outcome = match &result {
            Ok(true) => BridgeOutcome::Ok,
            Ok(false) => BridgeOutcome::Refused,
            Err(err) => executor_outcome(err),
        };
        let error = result.as_ref().err().map(ToString::to_string);
        self.record_call(&CallRecord {
            operation: BridgeOperation::UpdateTicket,
            tenant_id: tenant_id.as_str(),
            tool_id: Some(call.key.tool_id.as_str()),
            outcome,
            attempts,
            elapsed: started.elapsed(),
            budget: Some(self.settings.budgets.update),
            error,
        });
        match result {
            Ok(updated) => Ok(updated),
            Err(err @ ExecutorError::Authentication { .. }) => {
                Err(into_ticketing_error(err, &call.key))
            }
            Err(_) => Ok(false),
        }
    }

    /// Prunes idle rate-limit and circuit keys.
    pub fn sweep(&self) -> SweepReport {
        let now = Instant::now();
        SweepReport {
            rate_limit_keys: self
                .authenticator
                .limiter()
                .prune_idle(self.settings.idle_after, now),
            circuit_keys: self.breakers.prune_idle(self.settings.idle_after, now),
        }
    }

    /// Runs [`TicketingService::sweep`] every `interval` until the service is dropped.
    #[must_use]
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let service: Weak<Self> = Arc::downgrade(self);
        let period = interval.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(service) = service.upgrade() else {
                    break;
                };
                service.sweep();
            }
        })
    }

    /// Runs [`TicketingService::spawn_sweeper`] at the configured interval.
    #[must_use]
    pub fn spawn_configured_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        self.spawn_sweeper(self.settings.sweep_interval)
    }

    /// Loads the tenant, resolves its adapter, and decrypts its credentials.
    async fn prepare_call(&self, tenant_id: &TenantId) -> Result<PreparedCall, TicketingError> {
        let tenant = self
            .store
            .lookup(tenant_id)
            .await?
            .ok_or_else(|| TicketingError::TenantNotFound { tenant_id: tenant_id.clone() })?;
        if !tenant.active {
            return Err(TicketingError::TenantInactive { tenant_id: tenant_id.clone() });
        }
        let tool_id = tenant.tool_id();
        let adapter = self.registry.resolve(tool_id.as_str())?;
        let session = self.open_session(&tenant).await?;
        Ok(PreparedCall { key: CircuitKey::new(tenant_id.clone(), tool_id), adapter, session })
    }

    /// Decrypts the tenant's tool credentials into a session.
    async fn open_session(&self, tenant: &TenantConfig) -> Result<ToolSession, TicketingError> {
        let mut credentials = BTreeMap::new();
        for (name, ciphertext) in tenant.settings.encrypted_credentials() {
            let secret = self.store.decrypt(ciphertext).await?;
            credentials.insert(name.to_string(), secret);
        }
        Ok(ToolSession::new(tenant, credentials))
    }

    /// Emits the audit event, metrics, and budget check for a call.
    fn record_call(&self, record: &CallRecord<'_>) {
        let elapsed_ms = record.elapsed.as_millis();
        self.audit.record_call(&CallAuditEvent::new(CallAuditEventParams {
            tenant_id: record.tenant_id.to_string(),
            tool_id: record.tool_id.unwrap_or_default().to_string(),
            operation: record.operation.as_str(),
            outcome: record.outcome.as_str(),
            attempts: record.attempts,
            elapsed_ms,
            error: record.error.clone(),
        }));
        let event = BridgeMetricEvent {
            operation: record.operation,
            tenant_id: Some(record.tenant_id.to_string()),
            tool_id: record.tool_id.map(str::to_string),
            outcome: record.outcome,
            attempts: record.attempts,
        };
        self.metrics.record_call(event.clone());
        self.metrics.record_latency(event, record.elapsed);
        if let Some(budget) = record.budget {
            check_budget(
                self.audit.as_ref(),
                &LatencyLabels {
                    operation: record.operation,
                    tenant_id: Some(record.tenant_id),
                    tool_id: record.tool_id,
                },
                record.elapsed,
                budget,
            );
        }
    }
}

// ============================================================================
// SECTION: Call Plumbing
// ============================================================================

/// Everything an outbound call needs.
struct PreparedCall {
    /// Breaker key.
    key: CircuitKey,
    /// Adapter serving the tenant's tool.
    adapter: Arc<dyn TicketingAdapter>,
    /// Decrypted per-call session.
    session: ToolSession,
}

/// Facts recorded about one outbound call.
struct CallRecord<'a> {
    /// Operation label.
    operation: BridgeOperation,
    /// Tenant identifier.
    tenant_id: &'a str,
    /// Tool identifier when resolved.
    tool_id: Option<&'a str>,
    /// Outcome label.
    outcome: BridgeOutcome,
    /// Network attempts made.
    attempts: u32,
    /// Total elapsed time.
    elapsed: Duration,
    /// Soft budget to check, if any.
    budget: Option<Duration>,
    /// Error message when the call failed.
    error: Option<String>,
}

impl<'a> CallRecord<'a> {
    /// Describes a call that failed before any request.
    fn setup_failure(
        operation: BridgeOperation,
        tenant_id: &'a TenantId,
        err: &TicketingError,
    ) -> Self {
        Self {
            operation,
            tenant_id: tenant_id.as_str(),
            tool_id: None,
            outcome: BridgeOutcome::ConfigError,
            attempts: 0,
            elapsed: Duration::ZERO,
            budget: None,
            error: Some(err.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Opens the audit sink named by config.
fn build_audit_sink(config: &AuditConfig) -> Result<Arc<dyn AuditSink>, ServiceError> {
    match config.sink {
        AuditSinkKind::Stderr => Ok(Arc::new(StderrAuditSink)),
        AuditSinkKind::None => Ok(Arc::new(NoopAuditSink)),
        AuditSinkKind::File => {
            let path = config
                .path
                .as_deref()
                .ok_or_else(|| ServiceError::AuditSink("audit.path is required".to_string()))?;
            let sink = FileAuditSink::new(Path::new(path))
                .map_err(|err| ServiceError::AuditSink(err.to_string()))?;
            Ok(Arc::new(sink))
        }
    }
}

/// Maps an executor failure to its outcome label.
const fn executor_outcome(err: &ExecutorError) -> BridgeOutcome {
    match err {
        ExecutorError::Authentication { .. } => BridgeOutcome::AuthenticationFailed,
        ExecutorError::CircuitOpen { .. } => BridgeOutcome::CircuitOpen,
        ExecutorError::Exhausted { .. } => BridgeOutcome::Exhausted,
        ExecutorError::Rejected { .. } => BridgeOutcome::Rejected,
    }
}

/// Maps an executor failure into the ticketing taxonomy.
fn into_ticketing_error(err: ExecutorError, key: &CircuitKey) -> TicketingError {
    match err {
        ExecutorError::Authentication { status } => TicketingError::AuthenticationFailure {
            tenant_id: key.tenant_id.clone(),
            tool_id: key.tool_id.clone(),
            status,
        },
        ExecutorError::CircuitOpen { retry_in } => TicketingError::CircuitOpen {
            tenant_id: key.tenant_id.clone(),
            tool_id: key.tool_id.clone(),
            retry_in,
        },
        ExecutorError::Exhausted { attempts, last } => {
            TicketingError::ApiError { attempts, cause: last }
        }
        ExecutorError::Rejected { attempts, error } => {
            TicketingError::ApiError { attempts, cause: error }
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
