// crates/ticket-bridge-runtime/tests/common/mod.rs
// ============================================================================
// Module: Common Runtime Test Fixtures
// Description: Scripted tool servers, tenants, and recording sinks.
// Purpose: Build a ticketing service wired to deterministic collaborators.
// Dependencies: ticket-bridge-adapters, ticket-bridge-core, ticket-bridge-runtime, tiny_http
// ============================================================================

//! ## Overview
//! [`spawn_server`] answers requests from a fixed script so tests can count
//! exactly how many calls reached the tool. [`build_service`] wires a
//! [`TicketingService`] to that server through the built-in adapters, a
//! fixed clock, and a [`RecordingSink`].

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use serde_json::Value;
use serde_json::json;
use ticket_bridge_adapters::AdapterHttp;
use ticket_bridge_adapters::AdapterRegistry;
use ticket_bridge_adapters::HelpdeskAdapter;
use ticket_bridge_adapters::HttpClientConfig;
use ticket_bridge_adapters::JiraAdapter;
use ticket_bridge_core::AuditSink;
use ticket_bridge_core::FixedClock;
use ticket_bridge_core::InMemoryCredentialStore;
use ticket_bridge_core::PlaintextDecryptor;
use ticket_bridge_core::RateLimitPolicy;
use ticket_bridge_core::SignatureScheme;
use ticket_bridge_core::TenantConfig;
use ticket_bridge_core::TenantId;
use ticket_bridge_core::ToolSettings;
use ticket_bridge_core::audit::CallAuditEvent;
use ticket_bridge_core::audit::CircuitAuditEvent;
use ticket_bridge_core::audit::WebhookAuditEvent;
use ticket_bridge_core::signature::sign_header;
use ticket_bridge_runtime::NoopMetrics;
use ticket_bridge_runtime::ServiceDependencies;
use ticket_bridge_runtime::ServiceSettings;
use ticket_bridge_runtime::TicketingService;
use ticket_bridge_runtime::WebhookRequest;
use time::OffsetDateTime;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Webhook secret used by fixtures.
pub const WEBHOOK_SECRET: &str = "whsec-runtime-0001";
/// API token used by fixtures.
pub const API_TOKEN: &str = "token-runtime-0001";
/// Delivery timestamp carried by fixture payloads (2024-01-15T10:30:05Z).
pub const SENT_AT: i64 = 1_705_314_605;
/// How long a scripted server waits for each request.
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// SECTION: Scripted Server
// ============================================================================

/// One scripted tool response.
#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: String,
}

impl ScriptedResponse {
    /// Builds a JSON response.
    #[must_use]
    pub fn json(status: u16, body: &Value) -> Self {
        Self { status, body: body.to_string() }
    }

    /// Builds an empty-bodied response.
    #[must_use]
    pub fn status(status: u16) -> Self {
        Self { status, body: String::new() }
    }
}

/// Running scripted server.
pub struct ScriptedServer {
    /// Base URL of the server.
    pub base_url: Url,
    /// Requests answered so far.
    hits: Arc<AtomicUsize>,
}

impl ScriptedServer {
    /// Returns how many requests the server answered.
    #[must_use]
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Starts a server that answers requests with `script` in order.
#[must_use]
pub fn spawn_server(script: Vec<ScriptedResponse>) -> ScriptedServer {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    thread::spawn(move || {
        for scripted in script {
            let Ok(Some(request)) = server.recv_timeout(RECV_TIMEOUT) else {
                return;
            };
            let mut response =
                Response::from_string(scripted.body).with_status_code(scripted.status);
            response.add_header(
                Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap(),
            );
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = request.respond(response);
        }
    });
    ScriptedServer { base_url: Url::parse(&format!("http://{addr}")).unwrap(), hits }
}

// ============================================================================
// SECTION: Recording Sink
// ============================================================================

/// Audit sink that keeps every event in memory.
#[derive(Default)]
pub struct RecordingSink {
    /// Webhook events.
    pub webhooks: Mutex<Vec<WebhookAuditEvent>>,
    /// Outbound call events.
    pub calls: Mutex<Vec<CallAuditEvent>>,
    /// Circuit transitions.
    pub circuits: Mutex<Vec<CircuitAuditEvent>>,
}

impl RecordingSink {
    /// Returns the webhook outcome codes in order.
    #[must_use]
    pub fn webhook_codes(&self) -> Vec<&'static str> {
        self.webhooks.lock().unwrap().iter().map(|event| event.code).collect()
    }

    /// Returns the call outcome labels in order.
    #[must_use]
    pub fn call_outcomes(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().iter().map(|event| event.outcome).collect()
    }

    /// Returns circuit transitions as `(from, to)` pairs.
    #[must_use]
    pub fn transitions(&self) -> Vec<(&'static str, &'static str)> {
        self.circuits.lock().unwrap().iter().map(|event| (event.from, event.to)).collect()
    }
}

impl AuditSink for RecordingSink {
    fn record_webhook(&self, event: &WebhookAuditEvent) {
        self.webhooks.lock().unwrap().push(event.clone());
    }

    fn record_call(&self, event: &CallAuditEvent) {
        self.calls.lock().unwrap().push(event.clone());
    }

    fn record_circuit(&self, event: &CircuitAuditEvent) {
        self.circuits.lock().unwrap().push(event.clone());
    }
}

// ============================================================================
// SECTION: Service
// ============================================================================

/// Service wired to fixture collaborators.
pub struct Fixture {
    /// Service under test.
    pub service: TicketingService,
    /// Tenant store.
    pub store: Arc<InMemoryCredentialStore>,
    /// Wall clock pinned near [`SENT_AT`].
    pub clock: Arc<FixedClock>,
    /// Audit events.
    pub audit: Arc<RecordingSink>,
}

/// Builds a helpdesk tenant pointed at `base_url`.
#[must_use]
pub fn helpdesk_tenant(tenant_id: &str, base_url: &Url) -> TenantConfig {
    tenant(
        tenant_id,
        base_url,
        ToolSettings::Helpdesk {
            agent_email: "agent@acme.example".to_string(),
            api_token: PlaintextDecryptor::seal(API_TOKEN),
        },
    )
}

/// Builds a Jira tenant pointed at `base_url`.
#[must_use]
pub fn jira_tenant(tenant_id: &str, base_url: &Url) -> TenantConfig {
    tenant(
        tenant_id,
        base_url,
        ToolSettings::Jira {
            account_email: "bot@globex.example".to_string(),
            api_token: PlaintextDecryptor::seal(API_TOKEN),
        },
    )
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

/// Builds a service with the given settings and tenants.
#[must_use]
pub fn build_service(settings: ServiceSettings, tenants: Vec<TenantConfig>) -> Fixture {
    let http = AdapterHttp::new(&HttpClientConfig {
        allow_http: true,
        allow_private_networks: true,
        ..HttpClientConfig::default()
    })
    .unwrap();
    let registry = Arc::new(AdapterRegistry::new());
    registry.register("helpdesk", Arc::new(HelpdeskAdapter::new(http.clone()))).unwrap();
    registry.register("jira", Arc::new(JiraAdapter::new(http))).unwrap();
    let store = Arc::new(InMemoryCredentialStore::default());
    for tenant in tenants {
        store.upsert(tenant).unwrap();
    }
    let clock = Arc::new(FixedClock::new(
        OffsetDateTime::from_unix_timestamp(SENT_AT + 10).unwrap(),
    ));
    let audit = Arc::new(RecordingSink::default());
    let service = TicketingService::new(
        settings,
        ServiceDependencies {
            registry,
            store: store.clone(),
            clock: clock.clone(),
            audit: audit.clone(),
            metrics: Arc::new(NoopMetrics),
        },
    );
    Fixture { service, store, clock, audit }
}

/// Returns the tenant identifier parsed from `value`.
#[must_use]
pub fn tenant_id(value: &str) -> TenantId {
    TenantId::parse(value).unwrap()
}

// ============================================================================
// SECTION: Webhooks
// ============================================================================

/// Builds the canonical acme-corp helpdesk webhook.
#[must_use]
pub fn helpdesk_payload() -> Value {
    json!({
        "tenant_id": "acme-corp",
        "ticket_id": 42,
        "description": "Printer on floor 3 is jammed",
        "priority": "Urgent",
        "created_at": "2024-01-15T12:30:00+02:00",
        "timestamp": "2024-01-15T12:30:05+02:00",
        "event_type": "ticket.created"
    })
}

/// Signs `payload` with the fixture secret under `scheme`.
#[must_use]
pub fn signed_request(payload: &Value, scheme: SignatureScheme) -> WebhookRequest {
    let body = payload.to_string();
    let signature = sign_header(scheme, WEBHOOK_SECRET.as_bytes(), body.as_bytes()).unwrap();
    WebhookRequest::new(body, Some(signature))
}
