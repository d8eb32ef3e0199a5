// crates/ticket-bridge-adapters/src/http.rs
// ============================================================================
// Module: Adapter HTTP Plumbing
// Description: Shared reqwest client, URL policy, and response handling.
// Purpose: Give every adapter the same timeouts, limits, and status mapping.
// Dependencies: reqwest, serde, serde_json, ticket-bridge-core
// ============================================================================

//! ## Overview
//! Adapters share one [`AdapterHttp`] built from [`HttpClientConfig`]. It owns
//! the `reqwest` client with connect, read, and overall request deadlines,
//! validates tenant base URLs, and maps HTTP outcomes into
//! [`AdapterCallError`] so retry decisions are uniform across tools.
//! Invariants:
//! - Redirects are never followed.
//! - Response bodies larger than `max_response_bytes` fail closed.
//! - Base URLs must be `https` unless `allow_http` is set, and must not carry
//!   embedded credentials.
//! - Unless `allow_private_networks` is set, loopback, private, and link-local
//!   targets are refused: IP-literal and `localhost` hosts before sending, and
//!   the connected peer address once the response arrives.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::IpAddr;
use std::time::Duration;

use reqwest::Client;
use reqwest::RequestBuilder;
use reqwest::Response;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use reqwest::header::RETRY_AFTER;
use reqwest::redirect::Policy;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use ticket_bridge_core::AdapterCallError;
use url::Host;
use url::Url;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Default TCP connect timeout in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2_000;
/// Default per-read timeout in milliseconds.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 5_000;
/// Default overall request timeout in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
/// Default response body limit in bytes.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 1024 * 1024;
/// Default user agent for outbound requests.
pub const DEFAULT_USER_AGENT: &str = "ticket-bridge/0.1";

/// Outbound HTTP client configuration.
///
/// # Invariants
/// - `allow_http = false` blocks cleartext `http://` base URLs.
/// - `max_response_bytes` is a hard upper bound on response bodies.
/// - `request_timeout_ms` bounds the whole request, body included.
/// - `allow_private_networks = false` blocks private, loopback, and link-local targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpClientConfig {
    /// TCP connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Per-read timeout in milliseconds.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Overall request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Maximum response size allowed, in bytes.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
    /// User agent string for outbound requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Allow cleartext HTTP base URLs (disabled by default).
    #[serde(default)]
    pub allow_http: bool,
    /// Allow private, loopback, and link-local targets (disabled by default).
    #[serde(default)]
    pub allow_private_networks: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            allow_http: false,
            allow_private_networks: false,
        }
    }
}

/// Serde default for [`HttpClientConfig::connect_timeout_ms`].
const fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

/// Serde default for [`HttpClientConfig::read_timeout_ms`].
const fn default_read_timeout_ms() -> u64 {
    DEFAULT_READ_TIMEOUT_MS
}

/// Serde default for [`HttpClientConfig::request_timeout_ms`].
const fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

/// Serde default for [`HttpClientConfig::max_response_bytes`].
const fn default_max_response_bytes() -> usize {
    DEFAULT_MAX_RESPONSE_BYTES
}

/// Serde default for [`HttpClientConfig::user_agent`].
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Adapter construction failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("adapter build failed: {0}")]
pub struct AdapterBuildError(pub String);

// ============================================================================
// SECTION: Shared Client
// ============================================================================

/// HTTP client and policy shared by adapters.
#[derive(Debug, Clone)]
pub struct AdapterHttp {
    /// Client configured with deadlines and redirect policy.
    client: Client,
    /// Maximum response size allowed, in bytes.
    max_response_bytes: usize,
    /// Allow cleartext HTTP base URLs.
    allow_http: bool,
    /// Allow private, loopback, and link-local targets.
    allow_private_networks: bool,
}

impl AdapterHttp {
    /// Builds the shared client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterBuildError`] when the HTTP client cannot be created.
    pub fn new(config: &HttpClientConfig) -> Result<Self, AdapterBuildError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .read_timeout(Duration::from_millis(config.read_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(config.user_agent.clone())
            .redirect(Policy::none())
            .build()
            .map_err(|_| AdapterBuildError("http client build failed".to_string()))?;
        Ok(Self {
            client,
            max_response_bytes: config.max_response_bytes,
            allow_http: config.allow_http,
            allow_private_networks: config.allow_private_networks,
        })
    }

    /// Returns the underlying client.
    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }

    /// Joins path segments onto a validated base URL.
    ///
    /// Segments are percent-encoded, so identifiers cannot alter the path.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterCallError::InvalidRequest`] when the base URL violates policy.
    pub fn endpoint(&self, base: &Url, segments: &[&str]) -> Result<Url, AdapterCallError> {
        validate_base_url(base, self.allow_http)?;
        enforce_host_policy(base, self.allow_private_networks)?;
        let mut url = base.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|()| {
                AdapterCallError::InvalidRequest("base url cannot be a base".to_string())
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Sends a request and checks the connected peer against the address policy.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterCallError`] when the request fails or the peer is a
    /// refused address.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, AdapterCallError> {
        let response = request.send().await.map_err(|err| map_send_error(&err))?;
        if let Some(peer) = response.remote_addr() {
            enforce_ip_policy(peer.ip(), self.allow_private_networks)?;
        }
        Ok(response)
    }

    /// Reads a JSON response body while enforcing the size limit.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterCallError`] when the body is too large or not JSON.
    pub async fn read_json(&self, response: Response) -> Result<Value, AdapterCallError> {
        let body = read_response_limited(response, self.max_response_bytes).await?;
        serde_json::from_slice(&body)
            .map_err(|_| {
                AdapterCallError::InvalidResponse("response is not valid json".to_string())
            })
    }
}

// ============================================================================
// SECTION: URL Policy
// ============================================================================

/// Validates base URL scheme and credential policy.
///
/// # Errors
///
/// Returns [`AdapterCallError::InvalidRequest`] when the URL violates policy.
pub fn validate_base_url(url: &Url, allow_http: bool) -> Result<(), AdapterCallError> {
    match url.scheme() {
        "https" => {}
        "http" if allow_http => {}
        _ => return Err(AdapterCallError::InvalidRequest("unsupported url scheme".to_string())),
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(AdapterCallError::InvalidRequest("url credentials are not allowed".to_string()));
    }
    if url.host_str().is_none() {
        return Err(AdapterCallError::InvalidRequest("url host required".to_string()));
    }
    Ok(())
}

/// Refuses IP-literal and `localhost` hosts in private address space.
///
/// # Errors
///
/// Returns [`AdapterCallError::InvalidRequest`] when the host is refused.
pub fn enforce_host_policy(
    url: &Url,
    allow_private_networks: bool,
) -> Result<(), AdapterCallError> {
    if allow_private_networks {
        return Ok(());
    }
    match url.host() {
        Some(Host::Ipv4(addr)) => enforce_ip_policy(IpAddr::V4(addr), false),
        Some(Host::Ipv6(addr)) => enforce_ip_policy(IpAddr::V6(addr), false),
        Some(Host::Domain(domain)) => {
            let label = domain.trim_end_matches('.').to_ascii_lowercase();
            if label == "localhost" || label.ends_with(".localhost") {
                return Err(AdapterCallError::InvalidRequest(
                    "url host resolves to private or link-local address".to_string(),
                ));
            }
            Ok(())
        }
        None => Err(AdapterCallError::InvalidRequest("url host required".to_string())),
    }
}

/// Enforces private and link-local restrictions for a peer address.
///
/// # Errors
///
/// Returns [`AdapterCallError::InvalidRequest`] when the address is refused.
pub fn enforce_ip_policy(
    ip: IpAddr,
    allow_private_networks: bool,
) -> Result<(), AdapterCallError> {
    if allow_private_networks || !is_private_or_link_local(&ip) {
        return Ok(());
    }
    Err(AdapterCallError::InvalidRequest(
        "url host resolves to private or link-local address".to_string(),
    ))
}

/// Returns true when an IP is private, loopback, link-local, or otherwise local.
#[allow(
    clippy::option_if_let_else,
    reason = "Option::map_or is not const-callable on current toolchain."
)]
const fn is_private_or_link_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => {
            addr.is_private()
                || addr.is_loopback()
                || addr.is_link_local()
                || addr.is_unspecified()
                || addr.is_multicast()
                || addr.is_broadcast()
        }
        IpAddr::V6(addr) => {
            let mapped_private = if let Some(mapped) = addr.to_ipv4_mapped() {
                mapped.is_private()
                    || mapped.is_loopback()
                    || mapped.is_link_local()
                    || mapped.is_unspecified()
            } else {
                false
            };
            mapped_private
                || addr.is_loopback()
                || addr.is_unique_local()
                || addr.is_unicast_link_local()
                || addr.is_unspecified()
                || addr.is_multicast()
        }
    }
}

// ============================================================================
// SECTION: Status Mapping
// ============================================================================

/// Maps a response status into success or an adapter error.
///
/// # Errors
///
/// Returns [`AdapterCallError`] for every non-2xx status.
pub fn classify_status(status: StatusCode, headers: &HeaderMap) -> Result<(), AdapterCallError> {
    if status.is_success() {
        return Ok(());
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(AdapterCallError::Authentication { status: status.as_u16() })
        }
        StatusCode::TOO_MANY_REQUESTS => {
            Err(AdapterCallError::RateLimited { retry_after: parse_retry_after(headers) })
        }
        _ => Err(AdapterCallError::Status { status: status.as_u16() }),
    }
}

/// Returns true for client errors that retrying cannot fix.
///
/// 401, 403, 408, and 429 are excluded; they are handled separately.
#[must_use]
pub const fn is_definitive_rejection(status: u16) -> bool {
    matches!(status, 400..=499) && !matches!(status, 401 | 403 | 408 | 429)
}

/// Maps an update response into the tri-state update outcome.
///
/// # Errors
///
/// Returns [`AdapterCallError`] for authentication and retryable failures.
pub fn update_outcome(status: StatusCode, headers: &HeaderMap) -> Result<bool, AdapterCallError> {
    match classify_status(status, headers) {
        Ok(()) => Ok(true),
        Err(AdapterCallError::Status { status }) if is_definitive_rejection(status) => Ok(false),
        Err(err) => Err(err),
    }
}

/// Parses a delta-seconds `Retry-After` header.
#[must_use]
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?;
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Maps a reqwest send failure into an adapter error.
#[must_use]
pub fn map_send_error(err: &reqwest::Error) -> AdapterCallError {
    if err.is_timeout() {
        AdapterCallError::Timeout
    } else if err.is_builder() {
        AdapterCallError::InvalidRequest("request build failed".to_string())
    } else {
        AdapterCallError::Transport(describe_transport(err))
    }
}

/// Describes a transport failure without echoing the request URL.
fn describe_transport(err: &reqwest::Error) -> String {
    let label = if err.is_connect() {
        "connection failed"
    } else if err.is_body() || err.is_decode() {
        "response body failed"
    } else {
        "request failed"
    };
    label.to_string()
}

// ============================================================================
// SECTION: Body Limits
// ============================================================================

/// Reads the response body while enforcing a byte limit.
async fn read_response_limited(
    mut response: Response,
    max_bytes: usize,
) -> Result<Vec<u8>, AdapterCallError> {
    let max_bytes_u64 = u64::try_from(max_bytes).map_err(|_| {
        AdapterCallError::InvalidResponse("response size limit exceeds u64".to_string())
    })?;
    if let Some(expected) = response.content_length()
        && expected > max_bytes_u64
    {
        return Err(AdapterCallError::InvalidResponse("response exceeds size limit".to_string()));
    }
    let mut buf = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(|err| map_send_error(&err))? {
        if buf.len().saturating_add(chunk.len()) > max_bytes {
            return Err(AdapterCallError::InvalidResponse(
                "response exceeds size limit".to_string(),
            ));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
