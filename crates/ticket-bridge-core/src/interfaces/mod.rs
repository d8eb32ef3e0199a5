// crates/ticket-bridge-core/src/interfaces/mod.rs
// ============================================================================
// Module: Ticket Bridge Interfaces
// Description: Contracts for credential storage, ticketing adapters, and time.
// Purpose: Define the seams the runtime uses to reach external systems.
// Dependencies: async-trait, serde, time, url
// ============================================================================

//! ## Overview
//! Interfaces define how Ticket Bridge integrates with tenant storage,
//! ticketing tools, and wall-clock time without embedding backend details.
//! Implementations must fail closed on missing or invalid data.
//!
//! Security posture: adapters receive decrypted credentials only through a
//! per-call [`ToolSession`]; nothing here caches plaintext secrets.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;
use url::Url;

use crate::core::errors::ValidationError;
use crate::core::identifiers::TenantId;
use crate::core::identifiers::TicketId;
use crate::core::identifiers::ToolId;
use crate::core::metadata::CanonicalTicketMetadata;
use crate::core::metadata::EnhancementContent;
use crate::core::metadata::PriorityTable;
use crate::core::metadata::Ticket;
use crate::core::payload::FieldPath;
use crate::core::tenant::EncryptedSecret;
use crate::core::tenant::Secret;
use crate::core::tenant::TenantConfig;
use crate::core::tenant::ToolSettings;
use crate::core::timestamp::TimestampFormat;

// ============================================================================
// SECTION: Credential Store
// ============================================================================

/// Credential store failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// Ciphertext could not be decrypted.
    #[error("secret decryption failed: {0}")]
    Decryption(String),
    /// The backing store could not be reached.
    #[error("credential store unavailable: {0}")]
    Unavailable(String),
}

/// Tenant configuration and secret storage.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Loads the configuration for a tenant.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] when the store cannot be queried.
    async fn lookup(&self, tenant_id: &TenantId) -> Result<Option<TenantConfig>, CredentialError>;

    /// Decrypts secret ciphertext.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Decryption`] when the ciphertext is invalid.
    async fn decrypt(&self, ciphertext: &EncryptedSecret) -> Result<Secret, CredentialError>;
}

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Wall-clock source used for webhook freshness checks.
pub trait Clock: Send + Sync {
    /// Returns the current UTC instant.
    fn now_utc(&self) -> OffsetDateTime;
}

// ============================================================================
// SECTION: Adapter Self-Description
// ============================================================================

/// Native note format used by a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentFormat {
    /// HTML markup.
    Html,
    /// Atlassian Document Format JSON.
    AtlassianDocument,
}

/// Adapter identity and rendering metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterDescriptor {
    /// Tool identifier the adapter serves.
    pub tool_id: ToolId,
    /// Human-readable tool name.
    pub display_name: String,
    /// Native note format.
    pub content_format: ContentFormat,
}

/// Where an adapter's webhooks carry routing fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookProfile {
    /// Path to the tenant identifier.
    pub tenant_id_path: FieldPath,
    /// Path to the delivery timestamp.
    pub timestamp_path: FieldPath,
    /// Encoding of the delivery timestamp.
    pub timestamp_format: TimestampFormat,
    /// Path to the event type, when the tool sends one.
    pub event_type_path: Option<FieldPath>,
    /// Event type used when the payload carries none.
    pub default_event_type: &'static str,
}

// ============================================================================
// SECTION: Tool Sessions
// ============================================================================

/// Per-call context handed to adapters for outbound requests.
///
/// # Invariants
/// - Holds decrypted credentials for the duration of one call and its retries.
#[derive(Debug, Clone)]
pub struct ToolSession {
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Tool REST API base URL.
    pub base_url: Url,
    /// Tool settings, including non-secret fields.
    pub settings: ToolSettings,
    /// Decrypted credentials keyed by credential name.
    credentials: BTreeMap<String, Secret>,
}

impl ToolSession {
    /// Builds a session from tenant config and decrypted credentials.
    #[must_use]
    pub fn new(config: &TenantConfig, credentials: BTreeMap<String, Secret>) -> Self {
        Self {
            tenant_id: config.tenant_id.clone(),
            base_url: config.base_url.clone(),
            settings: config.settings.clone(),
            credentials,
        }
    }

    /// Returns a decrypted credential by name.
    #[must_use]
    pub fn credential(&self, name: &str) -> Option<&Secret> {
        self.credentials.get(name)
    }
}

// ============================================================================
// SECTION: Adapter Call Errors
// ============================================================================

/// How the executor should treat an adapter failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallDisposition {
    /// Credentials were rejected; never retried.
    Authentication,
    /// Tool asked the caller to slow down.
    RateLimited(Option<Duration>),
    /// Transient failure worth retrying.
    Retryable,
    /// Definitive failure; retrying cannot help.
    Fatal,
}

/// Outbound adapter call failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterCallError {
    /// Tool returned 401 or 403.
    #[error("authentication rejected (status {status})")]
    Authentication {
        /// HTTP status.
        status: u16,
    },
    /// Tool returned 429.
    #[error("rate limited by tool")]
    RateLimited {
        /// Server-provided wait, when present.
        retry_after: Option<Duration>,
    },
    /// Tool returned another unsuccessful status.
    #[error("unexpected status {status}")]
    Status {
        /// HTTP status.
        status: u16,
    },
    /// The request timed out.
    #[error("request timed out")]
    Timeout,
    /// The request failed before a response arrived.
    #[error("transport error: {0}")]
    Transport(String),
    /// The response could not be interpreted.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    /// The request could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl AdapterCallError {
    /// Classifies the failure for retry decisions.
    #[must_use]
    pub const fn disposition(&self) -> CallDisposition {
        match self {
            Self::Authentication { .. } => CallDisposition::Authentication,
            Self::RateLimited { retry_after } => CallDisposition::RateLimited(*retry_after),
            Self::Status { status } if *status >= 500 || *status == 408 => {
                CallDisposition::Retryable
            }
            Self::Timeout | Self::Transport(_) => CallDisposition::Retryable,
            Self::Status { .. } | Self::InvalidResponse(_) | Self::InvalidRequest(_) => {
                CallDisposition::Fatal
            }
        }
    }
}

// ============================================================================
// SECTION: Ticketing Adapter
// ============================================================================

/// Tool-specific ticketing integration.
///
/// # Invariants
/// - Outbound operations make exactly one network attempt per invocation.
/// - [`TicketingAdapter::validate_webhook`] and
///   [`TicketingAdapter::extract_metadata`] perform no I/O.
#[async_trait]
pub trait TicketingAdapter: Send + Sync {
    /// Returns the adapter's identity.
    fn descriptor(&self) -> AdapterDescriptor;

    /// Returns where webhook routing fields live.
    fn webhook_profile(&self) -> &WebhookProfile;

    /// Returns the native priority vocabulary.
    fn priority_table(&self) -> &PriorityTable;

    /// Verifies a webhook signature header against the raw body.
    fn validate_webhook(&self, payload: &[u8], signature: &str, secret: &Secret) -> bool;

    /// Fetches a ticket; `Ok(None)` when the tool reports it missing.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterCallError`] when the call fails.
    async fn get_ticket(
        &self,
        session: &ToolSession,
        ticket_id: &TicketId,
    ) -> Result<Option<Ticket>, AdapterCallError>;

    /// Posts an internal note; `Ok(false)` when the tool definitively refuses.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterCallError`] for authentication and retryable failures.
    async fn update_ticket(
        &self,
        session: &ToolSession,
        ticket_id: &TicketId,
        content: &EnhancementContent,
    ) -> Result<bool, AdapterCallError>;

    /// Normalizes a webhook payload into canonical metadata.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] naming the first invalid field.
    fn extract_metadata(&self, payload: &Value) -> Result<CanonicalTicketMetadata, ValidationError>;
}
