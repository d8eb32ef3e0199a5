// crates/ticket-bridge-adapters/tests/common/mod.rs
// ============================================================================
// Module: Common Adapter Test Fixtures
// Description: Scripted HTTP servers and tool sessions for adapter tests.
// Purpose: Drive adapters against deterministic local tool APIs.
// Dependencies: ticket-bridge-adapters, ticket-bridge-core, tiny_http, url
// ============================================================================

//! ## Overview
//! [`spawn_server`] starts a `tiny_http` server that answers with a fixed
//! script of responses and reports every request it saw. Session helpers
//! build helpdesk and Jira sessions pointed at that server.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::mpsc;
use std::sync::mpsc::Receiver;
use std::thread;
use std::time::Duration;

use ticket_bridge_adapters::AdapterHttp;
use ticket_bridge_adapters::HttpClientConfig;
use ticket_bridge_core::PlaintextDecryptor;
use ticket_bridge_core::RateLimitPolicy;
use ticket_bridge_core::Secret;
use ticket_bridge_core::TenantConfig;
use ticket_bridge_core::TenantId;
use ticket_bridge_core::ToolSession;
use ticket_bridge_core::ToolSettings;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Webhook secret used by fixtures.
pub const WEBHOOK_SECRET: &str = "whsec-test-0001";
/// API token used by fixtures.
pub const API_TOKEN: &str = "token-test-0001";
/// How long a scripted server waits for each request.
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// SECTION: Scripted Server
// ============================================================================

/// One response the scripted server will send.
#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: String,
    /// Extra response headers.
    pub headers: Vec<(&'static str, String)>,
}

impl ScriptedResponse {
    /// Builds a JSON response.
    #[must_use]
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self { status, body: body.to_string(), headers: Vec::new() }
    }

    /// Builds an empty-bodied response.
    #[must_use]
    pub fn status(status: u16) -> Self {
        Self { status, body: String::new(), headers: Vec::new() }
    }

    /// Adds a response header.
    #[must_use]
    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.push((name, value.to_string()));
        self
    }
}

/// Request observed by the scripted server.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    /// HTTP method.
    pub method: String,
    /// Request path and query.
    pub url: String,
    /// Authorization header, when sent.
    pub authorization: Option<String>,
    /// Request body.
    pub body: String,
}

impl CapturedRequest {
    /// Parses the body as JSON.
    #[must_use]
    pub fn json_body(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// Running scripted server.
pub struct ScriptedServer {
    /// Base URL of the server.
    pub base_url: Url,
    /// Requests in arrival order.
    pub requests: Receiver<CapturedRequest>,
}

impl ScriptedServer {
    /// Drains every request received so far.
    #[must_use]
    pub fn captured(&self) -> Vec<CapturedRequest> {
        self.requests.try_iter().collect()
    }
}

/// Starts a server that answers requests with `script` in order.
#[must_use]
pub fn spawn_server(script: Vec<ScriptedResponse>) -> ScriptedServer {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let (sender, requests) = mpsc::channel();
    thread::spawn(move || {
        for scripted in script {
            let Ok(Some(mut request)) = server.recv_timeout(RECV_TIMEOUT) else {
                return;
            };
            let mut body = String::new();
            let _ = request.as_reader().read_to_string(&mut body);
            let authorization = request
                .headers()
                .iter()
                .find(|header| header.field.equiv("Authorization"))
                .map(|header| header.value.as_str().to_string());
            let _ = sender.send(CapturedRequest {
                method: request.method().to_string(),
                url: request.url().to_string(),
                authorization,
                body,
            });
            let mut response =
                Response::from_string(scripted.body).with_status_code(scripted.status);
            response.add_header(
                Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap(),
            );
            for (name, value) in scripted.headers {
                response.add_header(Header::from_bytes(name.as_bytes(), value.as_bytes()).unwrap());
            }
            let _ = request.respond(response);
        }
    });
    ScriptedServer { base_url: Url::parse(&format!("http://{addr}")).unwrap(), requests }
}

// ============================================================================
// SECTION: Sessions
// ============================================================================

/// Builds HTTP plumbing that permits the local cleartext server.
#[must_use]
pub fn local_http() -> AdapterHttp {
    AdapterHttp::new(&HttpClientConfig {
        allow_http: true,
        allow_private_networks: true,
        ..HttpClientConfig::default()
    })
    .unwrap()
}

/// Builds a tenant config for the given settings.
#[must_use]
pub fn tenant(tenant_id: &str, base_url: &Url, settings: ToolSettings) -> TenantConfig {
    TenantConfig {
        tenant_id: TenantId::parse(tenant_id).unwrap(),
        base_url: base_url.clone(),
        settings,
        webhook_secret: PlaintextDecryptor::seal(WEBHOOK_SECRET),
        rate_limits: RateLimitPolicy::default(),
        active: true,
    }
}

/// Builds a session carrying the fixture API token.
#[must_use]
pub fn session_for(config: &TenantConfig) -> ToolSession {
    let mut credentials = BTreeMap::new();
    credentials.insert("api_token".to_string(), Secret::new(API_TOKEN));
    ToolSession::new(config, credentials)
}

/// Builds a helpdesk session against `base_url`.
#[must_use]
pub fn helpdesk_session(base_url: &Url) -> ToolSession {
    let settings = ToolSettings::Helpdesk {
        agent_email: "agent@acme.example".to_string(),
        api_token: PlaintextDecryptor::seal(API_TOKEN),
    };
    session_for(&tenant("acme-corp", base_url, settings))
}

/// Builds a Jira session against `base_url`.
#[must_use]
pub fn jira_session(base_url: &Url) -> ToolSession {
    let settings = ToolSettings::Jira {
        account_email: "bot@globex.example".to_string(),
        api_token: PlaintextDecryptor::seal(API_TOKEN),
    };
    session_for(&tenant("globex", base_url, settings))
}
