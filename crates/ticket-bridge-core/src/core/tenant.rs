// crates/ticket-bridge-core/src/core/tenant.rs
// ============================================================================
// Module: Tenant Configuration Model
// Description: Per-tenant tool settings, secrets, and rate-limit policy.
// Purpose: Model tenant configuration as consumed from the credential store.
// Dependencies: serde, url
// ============================================================================

//! ## Overview
//! A [`TenantConfig`] describes how one tenant's ticketing tool is reached and
//! authenticated. Tool-specific fields live in [`ToolSettings`], a
//! discriminated union keyed by tool type, so the tool identifier is derived
//! from the settings and can never disagree with them.
//! Invariants:
//! - Secrets are stored as opaque [`EncryptedSecret`] ciphertext.
//! - Plaintext [`Secret`] values never appear in `Debug` output.
//!
//! Security posture: tenant configuration is trusted, secrets are not logged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use url::Url;

use crate::core::identifiers::TenantId;
use crate::core::identifiers::ToolId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Tool identifier of the built-in helpdesk adapter.
pub const HELPDESK_TOOL_ID: &str = "helpdesk";
/// Tool identifier of the built-in Jira adapter.
pub const JIRA_TOOL_ID: &str = "jira";
/// Default sliding window applied to tenant rate limits.
pub const DEFAULT_RATE_LIMIT_WINDOW_MS: u64 = 60_000;

// ============================================================================
// SECTION: Secrets
// ============================================================================

/// Opaque ciphertext for a credential at rest.
///
/// # Invariants
/// - Contents are never interpreted by this crate; decryption is delegated.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedSecret(String);

impl EncryptedSecret {
    /// Wraps a ciphertext value.
    #[must_use]
    pub fn new(ciphertext: impl Into<String>) -> Self {
        Self(ciphertext.into())
    }

    /// Returns the ciphertext.
    #[must_use]
    pub fn ciphertext(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EncryptedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptedSecret(<redacted>)")
    }
}

/// Decrypted secret material scoped to a single operation.
///
/// # Invariants
/// - `Debug` output is redacted.
/// - Not serializable, so it cannot leak through audit events.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wraps plaintext secret material.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Exposes the plaintext secret.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

// ============================================================================
// SECTION: Tool Settings
// ============================================================================

/// Tool-specific connection settings, keyed by tool type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ToolSettings {
    /// Helpdesk REST API credentials.
    Helpdesk {
        /// Agent email used for API token authentication.
        agent_email: String,
        /// Encrypted API token.
        api_token: EncryptedSecret,
    },
    /// Jira Cloud REST API credentials.
    Jira {
        /// Atlassian account email.
        account_email: String,
        /// Encrypted Atlassian API token.
        api_token: EncryptedSecret,
    },
    /// Settings for an externally registered adapter.
    Custom {
        /// Tool identifier the adapter is registered under.
        tool_id: ToolId,
        /// Non-secret settings.
        #[serde(default)]
        fields: BTreeMap<String, String>,
        /// Encrypted secret settings.
        #[serde(default)]
        secrets: BTreeMap<String, EncryptedSecret>,
    },
}

impl ToolSettings {
    /// Returns the tool identifier implied by the settings variant.
    #[must_use]
    pub fn tool_id(&self) -> ToolId {
        match self {
            Self::Helpdesk { .. } => ToolId::from_static(HELPDESK_TOOL_ID),
            Self::Jira { .. } => ToolId::from_static(JIRA_TOOL_ID),
            Self::Custom { tool_id, .. } => tool_id.clone(),
        }
    }

    /// Returns every encrypted credential keyed by its credential name.
    #[must_use]
    pub fn encrypted_credentials(&self) -> Vec<(&str, &EncryptedSecret)> {
        match self {
            Self::Helpdesk { api_token, .. } | Self::Jira { api_token, .. } => {
                vec![("api_token", api_token)]
            }
            Self::Custom { secrets, .. } => {
                secrets.iter().map(|(name, secret)| (name.as_str(), secret)).collect()
            }
        }
    }
}

// ============================================================================
// SECTION: Rate Limit Policy
// ============================================================================

/// Per-tenant webhook rate-limit policy.
///
/// # Invariants
/// - `per_event` ceilings override `default_max_requests`.
/// - A `None` result from [`RateLimitPolicy::ceiling_for`] defers to the host default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    /// Sliding window length in milliseconds.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    /// Maximum requests per window keyed by event type.
    #[serde(default)]
    pub per_event: BTreeMap<String, u32>,
    /// Ceiling for event types without an explicit entry.
    #[serde(default)]
    pub default_max_requests: Option<u32>,
}

impl RateLimitPolicy {
    /// Returns the configured ceiling for an event type.
    #[must_use]
    pub fn ceiling_for(&self, event_type: &str) -> Option<u32> {
        self.per_event.get(event_type).copied().or(self.default_max_requests)
    }

    /// Returns the window as a duration.
    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            window_ms: DEFAULT_RATE_LIMIT_WINDOW_MS,
            per_event: BTreeMap::new(),
            default_max_requests: None,
        }
    }
}

/// Serde default for [`RateLimitPolicy::window_ms`].
const fn default_window_ms() -> u64 {
    DEFAULT_RATE_LIMIT_WINDOW_MS
}

// ============================================================================
// SECTION: Tenant Configuration
// ============================================================================

/// Tenant configuration as returned by the credential store.
///
/// # Invariants
/// - `tenant_id` is immutable once created.
/// - The tool type is derived from `settings`.
/// - Inactive tenants are soft-deleted and must be rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantConfig {
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Base URL of the tool's REST API.
    pub base_url: Url,
    /// Tool-specific settings and encrypted credentials.
    pub settings: ToolSettings,
    /// Encrypted webhook signing secret.
    pub webhook_secret: EncryptedSecret,
    /// Webhook rate-limit policy.
    #[serde(default)]
    pub rate_limits: RateLimitPolicy,
    /// Soft-delete flag.
    #[serde(default = "default_active")]
    pub active: bool,
}

impl TenantConfig {
    /// Returns the tool identifier this tenant is routed to.
    #[must_use]
    pub fn tool_id(&self) -> ToolId {
        self.settings.tool_id()
    }
}

/// Serde default for [`TenantConfig::active`].
const fn default_active() -> bool {
    true
}
