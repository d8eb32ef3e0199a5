// crates/ticket-bridge-config/src/config.rs
// ============================================================================
// Module: Ticket Bridge Configuration
// Description: Configuration loading and validation for Ticket Bridge.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: serde, toml, ticket-bridge-adapters, ticket-bridge-core
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section has serde defaults, so an empty file yields the documented
//! defaults. Out-of-range values fail closed with [`ConfigError::Invalid`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;
use ticket_bridge_adapters::HttpClientConfig;
use ticket_bridge_core::ToolId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "ticket-bridge.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "TICKET_BRIDGE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;

/// Upper bound for any configured duration, in milliseconds (one day).
const MAX_DURATION_MS: u64 = 86_400_000;
/// Upper bound for the tolerated future clock skew, in milliseconds.
const MAX_CLOCK_SKEW_MS: u64 = 300_000;
/// Upper bound for per-window request ceilings.
const MAX_REQUESTS_CEILING: u32 = 1_000_000;
/// Upper bound for tracked rate-limit keys.
const MAX_TRACKED_KEYS: usize = 1_000_000;
/// Upper bound for executor attempts.
const MAX_ATTEMPTS: u32 = 10;
/// Upper bound for rate-limit waits per call.
const MAX_RATE_LIMIT_WAITS: u32 = 10;
/// Upper bound for the circuit failure threshold.
const MAX_FAILURE_THRESHOLD: u32 = 1_000;
/// Upper bound for outbound response bodies.
const MAX_HTTP_RESPONSE_BYTES: usize = 16 * 1024 * 1024;
/// Maximum length of the outbound user agent.
const MAX_USER_AGENT_LENGTH: usize = 256;

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// Ticket Bridge configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BridgeConfig {
    /// Webhook authenticator settings.
    #[serde(default)]
    pub authenticator: AuthenticatorConfig,
    /// Outbound call retry settings.
    #[serde(default)]
    pub executor: ExecutorConfig,
    /// Circuit breaker settings.
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
    /// Outbound HTTP client settings.
    #[serde(default)]
    pub http: HttpClientConfig,
    /// Soft latency budgets.
    #[serde(default)]
    pub budgets: BudgetsConfig,
    /// Idle-state sweeping.
    #[serde(default)]
    pub sweep: SweepConfig,
    /// Audit sink selection.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Adapter discovery filter.
    #[serde(default)]
    pub adapters: AdaptersConfig,
}

impl BridgeConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// Resolution order: explicit path, then [`CONFIG_ENV_VAR`], then
    /// `ticket-bridge.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.authenticator.validate()?;
        self.executor.validate()?;
        self.circuit_breaker.validate()?;
        validate_http(&self.http)?;
        self.budgets.validate()?;
        self.sweep.validate()?;
        if self.sweep.idle_after_ms < self.circuit_breaker.cooldown_ms {
            return Err(ConfigError::Invalid(
                "sweep.idle_after_ms must be at least circuit_breaker.cooldown_ms".to_string(),
            ));
        }
        self.audit.validate()?;
        self.adapters.validate()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Authenticator
// ============================================================================

/// Webhook authenticator configuration.
///
/// # Invariants
/// - `default_max_requests` applies only when a tenant sets no ceiling.
/// - `default_window_ms` applies only when a tenant's window is zero.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthenticatorConfig {
    /// Tolerated future skew for webhook timestamps.
    #[serde(default = "default_clock_skew_ms")]
    pub clock_skew_ms: u64,
    /// Maximum accepted webhook age.
    #[serde(default = "default_max_age_ms")]
    pub max_age_ms: u64,
    /// Host-wide request ceiling per window.
    #[serde(default = "default_max_requests")]
    pub default_max_requests: u32,
    /// Host-wide window length.
    #[serde(default = "default_window_ms")]
    pub default_window_ms: u64,
    /// Maximum tracked `(tenant, event type)` rate-limit keys.
    #[serde(default = "default_max_tracked_keys")]
    pub max_tracked_keys: usize,
    /// Maximum tracked rate-limit keys for one tenant.
    #[serde(default = "default_max_keys_per_tenant")]
    pub max_keys_per_tenant: usize,
}

impl Default for AuthenticatorConfig {
    fn default() -> Self {
        Self {
            clock_skew_ms: default_clock_skew_ms(),
            max_age_ms: default_max_age_ms(),
            default_max_requests: default_max_requests(),
            default_window_ms: default_window_ms(),
            max_tracked_keys: default_max_tracked_keys(),
            max_keys_per_tenant: default_max_keys_per_tenant(),
        }
    }
}

impl AuthenticatorConfig {
    /// Validates authenticator configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.clock_skew_ms > MAX_CLOCK_SKEW_MS {
            return Err(ConfigError::Invalid(
                "authenticator.clock_skew_ms out of range".to_string(),
            ));
        }
        if self.max_age_ms == 0 || self.max_age_ms > MAX_DURATION_MS {
            return Err(ConfigError::Invalid("authenticator.max_age_ms out of range".to_string()));
        }
        if self.default_max_requests == 0 || self.default_max_requests > MAX_REQUESTS_CEILING {
            return Err(ConfigError::Invalid(
                "authenticator.default_max_requests out of range".to_string(),
            ));
        }
        if self.default_window_ms == 0 || self.default_window_ms > MAX_DURATION_MS {
            return Err(ConfigError::Invalid(
                "authenticator.default_window_ms out of range".to_string(),
            ));
        }
        if self.max_tracked_keys == 0 || self.max_tracked_keys > MAX_TRACKED_KEYS {
            return Err(ConfigError::Invalid(
                "authenticator.max_tracked_keys out of range".to_string(),
            ));
        }
        if self.max_keys_per_tenant == 0 || self.max_keys_per_tenant > self.max_tracked_keys {
            return Err(ConfigError::Invalid(
                "authenticator.max_keys_per_tenant must be within max_tracked_keys".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Executor
// ============================================================================

/// Resilient call executor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExecutorConfig {
    /// Maximum network attempts per call, rate-limit waits excluded.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles per attempt.
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    /// Maximum 429 waits per call.
    #[serde(default = "default_max_rate_limit_waits")]
    pub max_rate_limit_waits: u32,
    /// Wait used when a 429 carries no `Retry-After`.
    #[serde(default = "default_retry_after_ms")]
    pub default_retry_after_ms: u64,
    /// Cap on any `Retry-After` wait.
    #[serde(default = "default_max_retry_after_ms")]
    pub max_retry_after_ms: u64,
    /// Deadline for a single attempt.
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_rate_limit_waits: default_max_rate_limit_waits(),
            default_retry_after_ms: default_retry_after_ms(),
            max_retry_after_ms: default_max_retry_after_ms(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
        }
    }
}

impl ExecutorConfig {
    /// Validates executor configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 || self.max_attempts > MAX_ATTEMPTS {
            return Err(ConfigError::Invalid("executor.max_attempts out of range".to_string()));
        }
        if self.base_backoff_ms > MAX_DURATION_MS {
            return Err(ConfigError::Invalid("executor.base_backoff_ms out of range".to_string()));
        }
        if self.max_rate_limit_waits > MAX_RATE_LIMIT_WAITS {
            return Err(ConfigError::Invalid(
                "executor.max_rate_limit_waits out of range".to_string(),
            ));
        }
        if self.max_retry_after_ms > MAX_DURATION_MS {
            return Err(ConfigError::Invalid(
                "executor.max_retry_after_ms out of range".to_string(),
            ));
        }
        if self.default_retry_after_ms > self.max_retry_after_ms {
            return Err(ConfigError::Invalid(
                "executor.default_retry_after_ms must not exceed max_retry_after_ms".to_string(),
            ));
        }
        if self.attempt_timeout_ms == 0 || self.attempt_timeout_ms > MAX_DURATION_MS {
            return Err(ConfigError::Invalid(
                "executor.attempt_timeout_ms out of range".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Circuit Breaker
// ============================================================================

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Time an open circuit waits before allowing a probe.
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: default_failure_threshold(), cooldown_ms: default_cooldown_ms() }
    }
}

impl CircuitBreakerConfig {
    /// Validates circuit breaker configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 || self.failure_threshold > MAX_FAILURE_THRESHOLD {
            return Err(ConfigError::Invalid(
                "circuit_breaker.failure_threshold out of range".to_string(),
            ));
        }
        if self.cooldown_ms == 0 || self.cooldown_ms > MAX_DURATION_MS {
            return Err(ConfigError::Invalid(
                "circuit_breaker.cooldown_ms out of range".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: HTTP
// ============================================================================

/// Validates outbound HTTP client configuration.
fn validate_http(http: &HttpClientConfig) -> Result<(), ConfigError> {
    for (field, value) in [
        ("http.connect_timeout_ms", http.connect_timeout_ms),
        ("http.read_timeout_ms", http.read_timeout_ms),
        ("http.request_timeout_ms", http.request_timeout_ms),
    ] {
        if value == 0 || value > MAX_DURATION_MS {
            return Err(ConfigError::Invalid(format!("{field} out of range")));
        }
    }
    if http.max_response_bytes == 0 || http.max_response_bytes > MAX_HTTP_RESPONSE_BYTES {
        return Err(ConfigError::Invalid("http.max_response_bytes out of range".to_string()));
    }
    let agent = http.user_agent.trim();
    if agent.is_empty() || agent.len() > MAX_USER_AGENT_LENGTH {
        return Err(ConfigError::Invalid("http.user_agent out of range".to_string()));
    }
    Ok(())
}

// ============================================================================
// SECTION: Budgets
// ============================================================================

/// Soft latency budgets; exceeding one is audited, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BudgetsConfig {
    /// Signature validation budget.
    #[serde(default = "default_signature_budget_ms")]
    pub signature_ms: u64,
    /// Metadata extraction budget.
    #[serde(default = "default_extract_budget_ms")]
    pub extract_ms: u64,
    /// Ticket fetch budget.
    #[serde(default = "default_fetch_budget_ms")]
    pub fetch_ms: u64,
    /// Ticket update budget, retries included.
    #[serde(default = "default_update_budget_ms")]
    pub update_ms: u64,
}

impl Default for BudgetsConfig {
    fn default() -> Self {
        Self {
            signature_ms: default_signature_budget_ms(),
            extract_ms: default_extract_budget_ms(),
            fetch_ms: default_fetch_budget_ms(),
            update_ms: default_update_budget_ms(),
        }
    }
}

impl BudgetsConfig {
    /// Validates latency budgets.
    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("budgets.signature_ms", self.signature_ms),
            ("budgets.extract_ms", self.extract_ms),
            ("budgets.fetch_ms", self.fetch_ms),
            ("budgets.update_ms", self.update_ms),
        ] {
            if value == 0 || value > MAX_DURATION_MS {
                return Err(ConfigError::Invalid(format!("{field} out of range")));
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Sweep
// ============================================================================

/// Idle-state sweep configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SweepConfig {
    /// Interval between background sweeps.
    #[serde(default = "default_sweep_interval_ms")]
    pub interval_ms: u64,
    /// Idle time after which rate-limit and circuit keys are pruned.
    #[serde(default = "default_idle_after_ms")]
    pub idle_after_ms: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self { interval_ms: default_sweep_interval_ms(), idle_after_ms: default_idle_after_ms() }
    }
}

impl SweepConfig {
    /// Validates sweep configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_ms == 0 || self.interval_ms > MAX_DURATION_MS {
            return Err(ConfigError::Invalid("sweep.interval_ms out of range".to_string()));
        }
        if self.idle_after_ms == 0 || self.idle_after_ms > MAX_DURATION_MS {
            return Err(ConfigError::Invalid("sweep.idle_after_ms out of range".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// Discard audit events.
    None,
}

/// Audit configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AuditConfig {
    /// Sink receiving audit events.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Log file path for the file sink.
    #[serde(default)]
    pub path: Option<String>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit.path is required for the file sink".to_string()))
            }
            (AuditSinkKind::File, Some(path)) => validate_path_string("audit.path", path),
            (_, Some(_)) => {
                Err(ConfigError::Invalid("audit.path is only valid for the file sink".to_string()))
            }
            (_, None) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Adapters
// ============================================================================

/// Adapter discovery configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AdaptersConfig {
    /// Optional allowlist of tool identifiers; `None` enables every adapter.
    #[serde(default)]
    pub enabled: Option<BTreeSet<String>>,
}

impl AdaptersConfig {
    /// Validates the allowlist entries.
    fn validate(&self) -> Result<(), ConfigError> {
        let Some(enabled) = &self.enabled else {
            return Ok(());
        };
        if enabled.is_empty() {
            return Err(ConfigError::Invalid("adapters.enabled must be non-empty".to_string()));
        }
        for tool_id in enabled {
            ToolId::parse(tool_id.as_str())
                .map_err(|err| ConfigError::Invalid(format!("adapters.enabled: {err}")))?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default tolerated future skew.
const fn default_clock_skew_ms() -> u64 {
    30_000
}

/// Default maximum webhook age.
const fn default_max_age_ms() -> u64 {
    300_000
}

/// Default host-wide request ceiling.
const fn default_max_requests() -> u32 {
    100
}

/// Default host-wide window.
const fn default_window_ms() -> u64 {
    60_000
}

/// Default tracked rate-limit keys.
const fn default_max_tracked_keys() -> usize {
    10_000
}

/// Default tracked rate-limit keys per tenant.
const fn default_max_keys_per_tenant() -> usize {
    64
}

/// Default attempt budget.
const fn default_max_attempts() -> u32 {
    3
}

/// Default base backoff.
const fn default_base_backoff_ms() -> u64 {
    1_000
}

/// Default 429 wait budget.
const fn default_max_rate_limit_waits() -> u32 {
    2
}

/// Default wait when `Retry-After` is absent.
const fn default_retry_after_ms() -> u64 {
    5_000
}

/// Default cap on `Retry-After`.
const fn default_max_retry_after_ms() -> u64 {
    60_000
}

/// Default per-attempt deadline.
const fn default_attempt_timeout_ms() -> u64 {
    10_000
}

/// Default failure threshold.
const fn default_failure_threshold() -> u32 {
    5
}

/// Default open-circuit cooldown.
const fn default_cooldown_ms() -> u64 {
    60_000
}

/// Default signature validation budget.
const fn default_signature_budget_ms() -> u64 {
    100
}

/// Default extraction budget.
const fn default_extract_budget_ms() -> u64 {
    10
}

/// Default fetch budget.
const fn default_fetch_budget_ms() -> u64 {
    2_000
}

/// Default update budget.
const fn default_update_budget_ms() -> u64 {
    5_000
}

/// Default sweep interval.
const fn default_sweep_interval_ms() -> u64 {
    60_000
}

/// Default idle period before pruning.
const fn default_idle_after_ms() -> u64 {
    600_000
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from the caller or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}
