// crates/ticket-bridge-runtime/src/authenticator.rs
// ============================================================================
// Module: Webhook Authenticator
// Description: Tenant, freshness, signature, and rate-limit checks for webhooks.
// Purpose: Admit only fresh, signed, in-budget webhooks from known tenants.
// Dependencies: ticket-bridge-adapters, ticket-bridge-config, ticket-bridge-core
// ============================================================================

//! ## Overview
//! Every inbound webhook passes through one fixed sequence of checks:
//!
//! 1. the body parses as a JSON object,
//! 2. a tenant identifier is located and its configuration loaded,
//! 3. the delivery timestamp is inside the freshness window,
//! 4. the signature matches the tenant's webhook secret,
//! 5. the tenant's per-event rate limit has room.
//!
//! Cheap rejects run first and the rate limit is only charged for signed
//! requests. Each outcome is audited with whatever tenant and tool
//! identifiers were known when the check ended.
//!
//! Security posture: bodies and signature headers are untrusted; secrets are
//! decrypted per request and dropped when the check completes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use ticket_bridge_adapters::AdapterRegistry;
use ticket_bridge_adapters::payload::parse_tenant_id;
use ticket_bridge_config::AuthenticatorConfig;
use ticket_bridge_core::AuditSink;
use ticket_bridge_core::Clock;
use ticket_bridge_core::CredentialStore;
use ticket_bridge_core::TenantConfig;
use ticket_bridge_core::TenantId;
use ticket_bridge_core::TicketingAdapter;
use ticket_bridge_core::ToolId;
use ticket_bridge_core::ValidationError;
use ticket_bridge_core::audit::WebhookAuditEvent;
use ticket_bridge_core::audit::WebhookAuditEventParams;
use ticket_bridge_core::payload::lookup;
use ticket_bridge_core::payload::parse_json_object;
use ticket_bridge_core::timestamp::parse_timestamp_value;
use tokio::time::Instant;

use crate::rate_limit::RateLimitKey;
use crate::rate_limit::SlidingWindowLimiter;
use crate::telemetry::BridgeOperation;
use crate::telemetry::LatencyLabels;
use crate::telemetry::check_budget;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Top-level field checked first for the tenant identifier.
pub const TENANT_ID_FIELD: &str = "tenant_id";

/// Maximum event type length used as a rate-limit key.
pub const MAX_EVENT_TYPE_LENGTH: usize = 128;

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Freshness and rate-limit settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatorPolicy {
    /// Tolerated clock skew for future timestamps.
    pub clock_skew: Duration,
    /// Maximum webhook age.
    pub max_age: Duration,
    /// Ceiling used when the tenant sets none.
    pub default_max_requests: u32,
    /// Window used when the tenant's window is zero.
    pub default_window: Duration,
    /// Maximum tracked rate-limit keys.
    pub max_tracked_keys: usize,
    /// Maximum tracked rate-limit keys for one tenant.
    pub max_keys_per_tenant: usize,
    /// Soft budget for signature validation.
    pub signature_budget: Duration,
}

impl Default for AuthenticatorPolicy {
    fn default() -> Self {
        Self {
            clock_skew: Duration::from_secs(30),
            max_age: Duration::from_secs(300),
            default_max_requests: 100,
            default_window: Duration::from_secs(60),
            max_tracked_keys: 10_000,
            max_keys_per_tenant: 64,
            signature_budget: Duration::from_millis(100),
        }
    }
}

impl AuthenticatorPolicy {
    /// Builds a policy from validated config.
    #[must_use]
    pub const fn from_config(config: &AuthenticatorConfig, signature_budget: Duration) -> Self {
        Self {
            clock_skew: Duration::from_millis(config.clock_skew_ms),
            max_age: Duration::from_millis(config.max_age_ms),
            default_max_requests: config.default_max_requests,
            default_window: Duration::from_millis(config.default_window_ms),
            max_tracked_keys: config.max_tracked_keys,
            max_keys_per_tenant: config.max_keys_per_tenant,
            signature_budget,
        }
    }
}

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Inbound webhook as received.
#[derive(Debug, Clone, Default)]
pub struct WebhookRequest {
    /// Raw body bytes.
    pub body: Vec<u8>,
    /// Signature header value, when sent.
    pub signature: Option<String>,
    /// Tool identifier implied by the receiving endpoint, when known.
    pub tool_hint: Option<String>,
}

impl WebhookRequest {
    /// Builds a request from a body and signature header.
    #[must_use]
    pub fn new(body: impl Into<Vec<u8>>, signature: Option<String>) -> Self {
        Self { body: body.into(), signature, tool_hint: None }
    }

    /// Sets the tool hint.
    #[must_use]
    pub fn with_tool_hint(mut self, tool_id: impl Into<String>) -> Self {
        self.tool_hint = Some(tool_id.into());
        self
    }
}

/// Webhook that passed every check.
pub struct AuthenticatedWebhook {
    /// Tenant configuration.
    pub tenant: TenantConfig,
    /// Adapter serving the tenant's tool.
    pub adapter: Arc<dyn TicketingAdapter>,
    /// Parsed payload.
    pub payload: Value,
    /// Event type the rate limit was charged to.
    pub event_type: String,
}

impl fmt::Debug for AuthenticatedWebhook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedWebhook")
            .field("tenant_id", &self.tenant.tenant_id)
            .field("tool_id", &self.adapter.descriptor().tool_id)
            .field("event_type", &self.event_type)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Rejections
// ============================================================================

/// Why a webhook was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectionReason {
    /// Body is not a usable JSON object.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    /// No valid tenant identifier was found.
    #[error("tenant identifier missing or invalid")]
    MissingTenant,
    /// The tenant is unknown.
    #[error("tenant not found")]
    TenantNotFound,
    /// The tenant is soft-deleted.
    #[error("tenant inactive")]
    TenantInactive,
    /// Tenant config or secrets could not be read.
    #[error("credentials unavailable")]
    CredentialUnavailable,
    /// No adapter serves the tool.
    #[error("no adapter registered for {tool_id}")]
    AdapterNotFound {
        /// Requested tool identifier.
        tool_id: String,
    },
    /// The receiving endpoint's tool differs from the tenant's tool.
    #[error("tool hint {hinted} does not match tenant tool {expected}")]
    ToolMismatch {
        /// Tenant's configured tool.
        expected: String,
        /// Tool implied by the request.
        hinted: String,
    },
    /// Timestamp missing, unparsable, or too far in the future.
    #[error("invalid timestamp: {0}")]
    TimestampInvalid(String),
    /// Timestamp older than the freshness window.
    #[error("timestamp expired ({age_ms}ms old)")]
    TimestampExpired {
        /// Observed age in milliseconds.
        age_ms: u64,
    },
    /// Signature header missing or mismatched.
    #[error("invalid signature")]
    InvalidSignature,
    /// The tenant's per-event ceiling was reached.
    #[error("rate limit exceeded; retry after {}ms", .retry_after.as_millis())]
    RateLimitExceeded {
        /// Time until capacity frees up.
        retry_after: Duration,
    },
    /// Authenticated payload failed metadata extraction.
    #[error(transparent)]
    InvalidPayload(#[from] ValidationError),
}

impl RejectionReason {
    /// Returns a stable code for audit output.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MalformedPayload(_) => "malformed_payload",
            Self::MissingTenant => "missing_tenant",
            Self::TenantNotFound => "tenant_not_found",
            Self::TenantInactive => "tenant_inactive",
            Self::CredentialUnavailable => "credential_unavailable",
            Self::AdapterNotFound { .. } => "adapter_not_found",
            Self::ToolMismatch { .. } => "tool_mismatch",
            Self::TimestampInvalid(_) => "timestamp_invalid",
            Self::TimestampExpired { .. } => "timestamp_expired",
            Self::InvalidSignature => "invalid_signature",
            Self::RateLimitExceeded { .. } => "rate_limit_exceeded",
            Self::InvalidPayload(_) => "invalid_payload",
        }
    }
}

/// Identifiers learned while a request is checked.
#[derive(Debug, Default)]
pub(crate) struct AuditTrail {
    /// Tenant identifier once located.
    pub(crate) tenant_id: Option<String>,
    /// Tool identifier once known.
    pub(crate) tool_id: Option<String>,
    /// Event type once derived.
    pub(crate) event_type: Option<String>,
}

impl AuditTrail {
    /// Builds the trail for an authenticated webhook.
    pub(crate) fn for_webhook(webhook: &AuthenticatedWebhook) -> Self {
        Self {
            tenant_id: Some(webhook.tenant.tenant_id.to_string()),
            tool_id: Some(webhook.tenant.tool_id().to_string()),
            event_type: Some(webhook.event_type.clone()),
        }
    }

    /// Builds audit parameters for an outcome.
    fn params(&self, code: &'static str, detail: Option<String>) -> WebhookAuditEventParams {
        WebhookAuditEventParams {
            tenant_id: self.tenant_id.clone(),
            tool_id: self.tool_id.clone(),
            event_type: self.event_type.clone(),
            code,
            detail,
        }
    }
}

/// Audits a rejection with the identifiers known so far.
pub(crate) fn audit_rejection(
    audit: &dyn AuditSink,
    trail: &AuditTrail,
    reason: &RejectionReason,
) {
    audit.record_webhook(&WebhookAuditEvent::rejected(
        trail.params(reason.code(), Some(reason.to_string())),
    ));
}

// ============================================================================
// SECTION: Authenticator
// ============================================================================

/// Webhook authenticator shared across requests.
///
/// # Invariants
/// - Checks run in a fixed order and nothing is retried.
/// - The rate limit is charged only after the signature verifies.
pub struct WebhookAuthenticator {
    /// Adapters by tool identifier.
    registry: Arc<AdapterRegistry>,
    /// Tenant configuration and secrets.
    store: Arc<dyn CredentialStore>,
    /// Wall clock for freshness checks.
    clock: Arc<dyn Clock>,
    /// Per-tenant, per-event limiter.
    limiter: SlidingWindowLimiter,
    /// Freshness and limit settings.
    policy: AuthenticatorPolicy,
    /// Audit sink for outcomes.
    audit: Arc<dyn AuditSink>,
}

impl WebhookAuthenticator {
    /// Creates an authenticator.
    #[must_use]
    pub fn new(
        registry: Arc<AdapterRegistry>,
        store: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
        policy: AuthenticatorPolicy,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let limiter = SlidingWindowLimiter::new(policy.max_tracked_keys)
            .with_tenant_cap(policy.max_keys_per_tenant);
        Self { registry, store, clock, limiter, policy, audit }
    }

    /// Returns the rate limiter.
    #[must_use]
    pub const fn limiter(&self) -> &SlidingWindowLimiter {
        &self.limiter
    }

    /// Returns the policy.
    #[must_use]
    pub const fn policy(&self) -> &AuthenticatorPolicy {
        &self.policy
    }

    /// Runs every check and audits the outcome.
    ///
    /// # Errors
    ///
    /// Returns the [`RejectionReason`] of the first failing check.
    pub async fn authenticate(
        &self,
        request: &WebhookRequest,
    ) -> Result<AuthenticatedWebhook, RejectionReason> {
        let mut trail = AuditTrail::default();
        let result = self.run_checks(request, &mut trail).await;
        match &result {
            Ok(_) => {
                let event = WebhookAuditEvent::accepted(trail.params("accepted", None));
                self.audit.record_webhook(&event);
            }
            Err(reason) => audit_rejection(self.audit.as_ref(), &trail, reason),
        }
        result
    }

    /// Reduces authentication to a boolean.
    pub async fn validate(&self, request: &WebhookRequest) -> bool {
        self.authenticate(request).await.is_ok()
    }

    /// Runs the checks in order.
    async fn run_checks(
        &self,
        request: &WebhookRequest,
        trail: &mut AuditTrail,
    ) -> Result<AuthenticatedWebhook, RejectionReason> {
        let payload = parse_json_object(&request.body)
            .map_err(|err| RejectionReason::MalformedPayload(err.reason))?;
        trail.tool_id.clone_from(&request.tool_hint);

        let hinted = match request.tool_hint.as_deref() {
            Some(hint) => Some(self.registry.resolve(hint).map_err(|_| {
                RejectionReason::AdapterNotFound { tool_id: hint.to_string() }
            })?),
            None => None,
        };
        let (tenant_id, located_by) = self.locate_tenant(&payload, hinted.as_ref())?;
        trail.tenant_id = Some(tenant_id.to_string());

        let tenant = self.load_tenant(&tenant_id).await?;
        let tool_id = tenant.tool_id();
        trail.tool_id = Some(tool_id.to_string());
        if let Some(hint) = request.tool_hint.as_deref()
            && hint != tool_id.as_str()
        {
            return Err(RejectionReason::ToolMismatch {
                expected: tool_id.to_string(),
                hinted: hint.to_string(),
            });
        }
        let adapter = self
            .registry
            .resolve(tool_id.as_str())
            .map_err(|_| RejectionReason::AdapterNotFound { tool_id: tool_id.to_string() })?;
        if let Some(source) = located_by
            && source != tool_id
        {
            let own = parse_tenant_id(&payload, adapter.webhook_profile().tenant_id_path).ok();
            if own.as_ref() != Some(&tenant_id) {
                return Err(RejectionReason::MissingTenant);
            }
        }

        self.check_timestamp(&payload, adapter.as_ref())?;
        self.check_signature(request, &tenant, adapter.as_ref()).await?;

        let event_type = event_type(&payload, adapter.as_ref())?;
        trail.event_type = Some(event_type.clone());
        self.check_rate_limit(&tenant, &event_type)?;

        Ok(AuthenticatedWebhook { tenant, adapter, payload, event_type })
    }

    /// Finds the tenant identifier and the tool whose path carried it.
    fn locate_tenant(
        &self,
        payload: &Value,
        hinted: Option<&Arc<dyn TicketingAdapter>>,
    ) -> Result<(TenantId, Option<ToolId>), RejectionReason> {
        if lookup(payload, &[TENANT_ID_FIELD]).is_some() {
            return parse_tenant_id(payload, &[TENANT_ID_FIELD])
                .map(|tenant_id| (tenant_id, None))
                .map_err(|_| RejectionReason::MissingTenant);
        }
        let candidates = match hinted {
            Some(adapter) => vec![(adapter.descriptor().tool_id, Arc::clone(adapter))],
            None => self.registry.adapters(),
        };
        candidates
            .into_iter()
            .find_map(|(tool_id, adapter)| {
                parse_tenant_id(payload, adapter.webhook_profile().tenant_id_path)
                    .ok()
                    .map(|tenant_id| (tenant_id, Some(tool_id)))
            })
            .ok_or(RejectionReason::MissingTenant)
    }

    /// Loads an active tenant configuration.
    async fn load_tenant(&self, tenant_id: &TenantId) -> Result<TenantConfig, RejectionReason> {
        let tenant = self
            .store
            .lookup(tenant_id)
            .await
            .map_err(|_| RejectionReason::CredentialUnavailable)?
            .ok_or(RejectionReason::TenantNotFound)?;
        if !tenant.active {
            return Err(RejectionReason::TenantInactive);
        }
        Ok(tenant)
    }

    /// Checks the delivery timestamp against the freshness window.
    fn check_timestamp(
        &self,
        payload: &Value,
        adapter: &dyn TicketingAdapter,
    ) -> Result<(), RejectionReason> {
        let profile = adapter.webhook_profile();
        let raw = lookup(payload, profile.timestamp_path).ok_or_else(|| {
            RejectionReason::TimestampInvalid("timestamp is required".to_string())
        })?;
        let sent_at = parse_timestamp_value(raw, profile.timestamp_format)
            .map_err(|err| RejectionReason::TimestampInvalid(err.to_string()))?;
        let now = self.clock.now_utc();
        if sent_at - now > self.policy.clock_skew {
            return Err(RejectionReason::TimestampInvalid("timestamp is in the future".to_string()));
        }
        let age = now - sent_at;
        if age > self.policy.max_age {
            let age_ms = u64::try_from(age.whole_milliseconds()).unwrap_or(u64::MAX);
            return Err(RejectionReason::TimestampExpired { age_ms });
        }
        Ok(())
    }

    /// Verifies the signature with a just-in-time decrypted secret.
    async fn check_signature(
        &self,
        request: &WebhookRequest,
        tenant: &TenantConfig,
        adapter: &dyn TicketingAdapter,
    ) -> Result<(), RejectionReason> {
        let signature = request
            .signature
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .ok_or(RejectionReason::InvalidSignature)?;
        let secret = self
            .store
            .decrypt(&tenant.webhook_secret)
            .await
            .map_err(|_| RejectionReason::CredentialUnavailable)?;
        let started = std::time::Instant::now();
        let valid = adapter.validate_webhook(&request.body, signature, &secret);
        let tool_id = tenant.tool_id();
        check_budget(
            self.audit.as_ref(),
            &LatencyLabels {
                operation: BridgeOperation::ValidateSignature,
                tenant_id: Some(tenant.tenant_id.as_str()),
                tool_id: Some(tool_id.as_str()),
            },
            started.elapsed(),
            self.policy.signature_budget,
        );
        if valid { Ok(()) } else { Err(RejectionReason::InvalidSignature) }
    }

    /// Charges the tenant's per-event sliding window.
    fn check_rate_limit(
        &self,
        tenant: &TenantConfig,
        event_type: &str,
    ) -> Result<(), RejectionReason> {
        let policy = &tenant.rate_limits;
        let ceiling = policy.ceiling_for(event_type).unwrap_or(self.policy.default_max_requests);
        let window =
            if policy.window_ms == 0 { self.policy.default_window } else { policy.window() };
        let key = RateLimitKey::new(tenant.tenant_id.clone(), event_type);
        self.limiter
            .check(&key, ceiling, window, Instant::now())
            .map_err(|retry_after| RejectionReason::RateLimitExceeded { retry_after })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Derives the event type from the adapter's profile.
fn event_type(payload: &Value, adapter: &dyn TicketingAdapter) -> Result<String, RejectionReason> {
    let profile = adapter.webhook_profile();
    let declared = profile
        .event_type_path
        .and_then(|path| lookup(payload, path))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty());
    let event_type = declared.unwrap_or(profile.default_event_type);
    if event_type.chars().count() > MAX_EVENT_TYPE_LENGTH {
        return Err(RejectionReason::MalformedPayload(format!(
            "event type exceeds {MAX_EVENT_TYPE_LENGTH} characters"
        )));
    }
    Ok(event_type.to_string())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
