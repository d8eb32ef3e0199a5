// crates/ticket-bridge-runtime/tests/service.rs
// ============================================================================
// Module: Ticketing Service Tests
// Description: End-to-end behavior of the ticketing service facade.
// Purpose: Validate webhook intake, retries, breakers, and sweeping.
// Dependencies: ticket-bridge-runtime, ticket-bridge-config, tiny_http, tokio
// ============================================================================

//! ## Overview
//! Runs the service against scripted local tool servers. Retry backoff is
//! shortened so failure paths stay fast while still crossing real HTTP.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use ticket_bridge_config::BridgeConfig;
use ticket_bridge_core::AdapterCallError;
use ticket_bridge_core::EnhancementContent;
use ticket_bridge_core::InMemoryCredentialStore;
use ticket_bridge_core::Priority;
use ticket_bridge_core::SignatureScheme;
use ticket_bridge_core::TicketId;
use ticket_bridge_core::TicketingError;
use ticket_bridge_core::ToolId;
use ticket_bridge_runtime::CallOutcome;
use ticket_bridge_runtime::CircuitKey;
use ticket_bridge_runtime::CircuitPolicy;
use ticket_bridge_runtime::RejectionReason;
use ticket_bridge_runtime::RetryPolicy;
use ticket_bridge_runtime::ServiceSettings;
use ticket_bridge_runtime::TicketingService;
use ticket_bridge_runtime::WebhookRequest;
use time::OffsetDateTime;
use url::Url;

use crate::common::SENT_AT;
use crate::common::ScriptedResponse;
use crate::common::build_service;
use crate::common::helpdesk_payload;
use crate::common::helpdesk_tenant;
use crate::common::jira_tenant;
use crate::common::signed_request;
use crate::common::spawn_server;
use crate::common::tenant_id;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn fast_settings() -> ServiceSettings {
    ServiceSettings {
        retry: RetryPolicy { base_backoff: Duration::from_millis(10), ..RetryPolicy::default() },
        ..ServiceSettings::default()
    }
}

fn unused_url() -> Url {
    Url::parse("http://127.0.0.1:9").unwrap()
}

fn ticket_no(value: &str) -> TicketId {
    TicketId::parse(value).unwrap()
}

// ============================================================================
// SECTION: Webhooks
// ============================================================================

/// Tests a fresh signed helpdesk webhook yields canonical metadata.
#[tokio::test]
async fn authenticate_and_extract_normalizes_helpdesk_webhook() {
    let fixture =
        build_service(fast_settings(), vec![helpdesk_tenant("acme-corp", &unused_url())]);
    let request = signed_request(&helpdesk_payload(), SignatureScheme::BareHex);

    let metadata = fixture.service.authenticate_and_extract(&request).await.unwrap();

    assert_eq!(metadata.tenant_id.as_str(), "acme-corp");
    assert_eq!(metadata.ticket_id.as_str(), "42");
    assert_eq!(metadata.priority, Priority::High);
    assert_eq!(metadata.description, "Printer on floor 3 is jammed");
    assert_eq!(fixture.audit.webhook_codes(), vec!["accepted"]);
}

/// Tests stale webhooks are rejected before extraction.
#[tokio::test]
async fn stale_webhook_is_rejected() {
    let fixture =
        build_service(fast_settings(), vec![helpdesk_tenant("acme-corp", &unused_url())]);
    fixture.clock.set(OffsetDateTime::from_unix_timestamp(SENT_AT + 400).unwrap());
    let request = signed_request(&helpdesk_payload(), SignatureScheme::BareHex);

    let err = fixture.service.authenticate_and_extract(&request).await.unwrap_err();

    assert_eq!(err, RejectionReason::TimestampExpired { age_ms: 400_000 });
    assert!(!fixture.service.validate_webhook(&request).await);
}

/// Tests metadata naming another tenant is refused after authentication.
#[tokio::test]
async fn extracted_tenant_must_match_authenticated_tenant() {
    let fixture = build_service(fast_settings(), vec![jira_tenant("globex", &unused_url())]);
    let payload = json!({
        "tenant_id": "globex",
        "timestamp": 1_705_314_605_000_i64,
        "webhookEvent": "jira:issue_created",
        "tenant": { "id": "initech" },
        "issue": {
            "key": "OPS-7",
            "fields": {
                "description": "VPN drops",
                "priority": { "name": "High" },
                "created": "2024-01-15T10:30:00.000+0000"
            }
        }
    });
    let request = signed_request(&payload, SignatureScheme::TaggedSha256);

    let err = fixture.service.authenticate_and_extract(&request).await.unwrap_err();

    assert_eq!(err.code(), "invalid_payload");
    assert_eq!(fixture.audit.webhook_codes(), vec!["accepted", "invalid_payload"]);
}

/// Tests a webhook sent to the wrong tool endpoint is refused.
#[tokio::test]
async fn tool_hint_mismatch_is_rejected() {
    let fixture =
        build_service(fast_settings(), vec![helpdesk_tenant("acme-corp", &unused_url())]);
    let request =
        signed_request(&helpdesk_payload(), SignatureScheme::BareHex).with_tool_hint("jira");

    assert!(!fixture.service.validate_webhook(&request).await);
    assert_eq!(fixture.audit.webhook_codes(), vec!["tool_mismatch"]);
}

// ============================================================================
// SECTION: Fetch
// ============================================================================

/// Tests a successful fetch returns the tool's ticket.
#[tokio::test]
async fn fetch_ticket_returns_ticket() {
    let server = spawn_server(vec![ScriptedResponse::json(
        200,
        &json!({"ticket": {"id": 42, "subject": "Printer jam"}}),
    )]);
    let fixture =
        build_service(fast_settings(), vec![helpdesk_tenant("acme-corp", &server.base_url)]);

    let ticket = fixture
        .service
        .fetch_ticket(&tenant_id("acme-corp"), &ticket_no("42"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(ticket.raw["subject"], "Printer jam");
    assert_eq!(fixture.audit.call_outcomes(), vec!["ok"]);
}

/// Tests a missing ticket is `None`, not an error.
#[tokio::test]
async fn fetch_ticket_not_found_is_none() {
    let server = spawn_server(vec![ScriptedResponse::status(404)]);
    let fixture =
        build_service(fast_settings(), vec![helpdesk_tenant("acme-corp", &server.base_url)]);

    let ticket =
        fixture.service.fetch_ticket(&tenant_id("acme-corp"), &ticket_no("404")).await.unwrap();

    assert!(ticket.is_none());
    assert_eq!(fixture.audit.call_outcomes(), vec!["not_found"]);
}

/// Tests persistent server errors exhaust the retry budget.
#[tokio::test]
async fn fetch_ticket_exhausts_retries_on_server_errors() {
    let server = spawn_server(vec![ScriptedResponse::status(500); 3]);
    let fixture =
        build_service(fast_settings(), vec![helpdesk_tenant("acme-corp", &server.base_url)]);

    let acme = tenant_id("acme-corp");
    let err = fixture.service.fetch_ticket(&acme, &ticket_no("42")).await.unwrap_err();

    assert!(matches!(
        err,
        TicketingError::ApiError { attempts: 3, cause: AdapterCallError::Status { status: 500 } }
    ));
    assert_eq!(server.hits(), 3);
    let calls = fixture.audit.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].attempts, 3);
    assert_eq!(calls[0].outcome, "exhausted");
}

/// Tests unknown and inactive tenants fail before any request.
#[tokio::test]
async fn fetch_ticket_requires_active_tenant() {
    let fixture =
        build_service(fast_settings(), vec![helpdesk_tenant("acme-corp", &unused_url())]);

    let initech = tenant_id("initech");
    let err = fixture.service.fetch_ticket(&initech, &ticket_no("1")).await.unwrap_err();
    assert!(matches!(err, TicketingError::TenantNotFound { .. }));

    let acme = tenant_id("acme-corp");
    fixture.store.deactivate(&acme).unwrap();
    let err = fixture.service.fetch_ticket(&acme, &ticket_no("1")).await.unwrap_err();
    assert!(matches!(err, TicketingError::TenantInactive { .. }));
    assert_eq!(fixture.audit.call_outcomes(), vec!["config_error", "config_error"]);
}

// ============================================================================
// SECTION: Update
// ============================================================================

/// Tests rejected credentials raise after a single request.
#[tokio::test]
async fn post_update_unauthorized_raises_without_retry() {
    let server = spawn_server(vec![ScriptedResponse::status(401); 3]);
    let fixture =
        build_service(fast_settings(), vec![helpdesk_tenant("acme-corp", &server.base_url)]);
    let content = EnhancementContent::from_text(Some("Triage"), "Restart the spooler.");

    let err = fixture
        .service
        .post_update(&tenant_id("acme-corp"), &ticket_no("42"), &content)
        .await
        .unwrap_err();

    assert!(matches!(err, TicketingError::AuthenticationFailure { status: 401, .. }));
    assert_eq!(server.hits(), 1);
}

/// Tests a definitive refusal degrades to `false`.
#[tokio::test]
async fn post_update_refusal_is_false() {
    let server = spawn_server(vec![ScriptedResponse::status(422)]);
    let fixture =
        build_service(fast_settings(), vec![helpdesk_tenant("acme-corp", &server.base_url)]);
    let content = EnhancementContent::from_text(None, "note");

    let updated =
        fixture.service.post_update(&tenant_id("acme-corp"), &ticket_no("42"), &content).await;

    assert!(!updated.unwrap());
    assert_eq!(server.hits(), 1);
    assert_eq!(fixture.audit.call_outcomes(), vec!["refused"]);
}

/// Tests persistent server errors on update degrade to `false` after the budget.
#[tokio::test]
async fn post_update_exhausted_retries_is_false() {
    let server = spawn_server(vec![ScriptedResponse::status(500); 3]);
    let fixture =
        build_service(fast_settings(), vec![helpdesk_tenant("acme-corp", &server.base_url)]);
    let content = EnhancementContent::from_text(Some("Triage"), "Restart the spooler.");

    let updated =
        fixture.service.post_update(&tenant_id("acme-corp"), &ticket_no("42"), &content).await;

    assert!(!updated.unwrap());
    assert_eq!(server.hits(), 3);
    let calls = fixture.audit.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].attempts, 3);
    assert_eq!(calls[0].outcome, "exhausted");
}

/// Tests empty content is refused without contacting the tool.
#[tokio::test]
async fn post_update_empty_content_is_false_without_request() {
    let server = spawn_server(vec![ScriptedResponse::status(200)]);
    let fixture =
        build_service(fast_settings(), vec![helpdesk_tenant("acme-corp", &server.base_url)]);
    let content = EnhancementContent::from_text(Some("  "), "\n\n");

    let updated =
        fixture.service.post_update(&tenant_id("acme-corp"), &ticket_no("42"), &content).await;

    assert!(!updated.unwrap());
    assert_eq!(server.hits(), 0);
    assert_eq!(fixture.audit.call_outcomes(), vec!["rejected"]);
}

/// Tests a successful update is `true`.
#[tokio::test]
async fn post_update_success_is_true() {
    let server = spawn_server(vec![ScriptedResponse::json(200, &json!({"ticket": {"id": 42}}))]);
    let fixture =
        build_service(fast_settings(), vec![helpdesk_tenant("acme-corp", &server.base_url)]);
    let content = EnhancementContent::from_text(None, "note");

    let updated =
        fixture.service.post_update(&tenant_id("acme-corp"), &ticket_no("42"), &content).await;

    assert!(updated.unwrap());
}

// ============================================================================
// SECTION: Circuit Breaking
// ============================================================================

/// Tests an open breaker short-circuits calls without I/O.
#[tokio::test]
async fn open_circuit_short_circuits_calls() {
    let server = spawn_server(vec![ScriptedResponse::status(503); 2]);
    let settings = ServiceSettings {
        retry: RetryPolicy { max_attempts: 1, ..RetryPolicy::default() },
        circuit: CircuitPolicy { failure_threshold: 2, cooldown: Duration::from_secs(60) },
        ..ServiceSettings::default()
    };
    let fixture = build_service(settings, vec![helpdesk_tenant("acme-corp", &server.base_url)]);
    let acme = tenant_id("acme-corp");

    for _ in 0..2 {
        let err = fixture.service.fetch_ticket(&acme, &ticket_no("42")).await.unwrap_err();
        assert!(matches!(err, TicketingError::ApiError { attempts: 1, .. }));
    }
    let err = fixture.service.fetch_ticket(&acme, &ticket_no("42")).await.unwrap_err();
    assert!(matches!(err, TicketingError::CircuitOpen { .. }));

    let content = EnhancementContent::from_text(None, "note");
    assert!(!fixture.service.post_update(&acme, &ticket_no("42"), &content).await.unwrap());
    assert_eq!(server.hits(), 2);
    assert_eq!(fixture.audit.transitions(), vec![("closed", "open")]);
}

/// Tests breakers are isolated per tenant.
#[tokio::test]
async fn circuit_is_scoped_to_tenant() {
    let failing = spawn_server(vec![ScriptedResponse::status(503)]);
    let healthy = spawn_server(vec![ScriptedResponse::json(200, &json!({"ticket": {"id": 1}}))]);
    let settings = ServiceSettings {
        retry: RetryPolicy { max_attempts: 1, ..RetryPolicy::default() },
        circuit: CircuitPolicy { failure_threshold: 1, cooldown: Duration::from_secs(60) },
        ..ServiceSettings::default()
    };
    let fixture = build_service(
        settings,
        vec![
            helpdesk_tenant("acme-corp", &failing.base_url),
            helpdesk_tenant("globex", &healthy.base_url),
        ],
    );

    let _ = fixture.service.fetch_ticket(&tenant_id("acme-corp"), &ticket_no("1")).await;

    let globex = tenant_id("globex");
    let fetched = fixture.service.fetch_ticket(&globex, &ticket_no("1")).await.unwrap();
    assert!(fetched.is_some());
}

// ============================================================================
// SECTION: Sweeping
// ============================================================================

/// Tests idle limiter and breaker keys are pruned.
#[tokio::test(start_paused = true)]
async fn sweep_prunes_idle_keys() {
    let fixture = build_service(
        ServiceSettings { idle_after: Duration::from_secs(600), ..ServiceSettings::default() },
        vec![helpdesk_tenant("acme-corp", &unused_url())],
    );
    let request = signed_request(&helpdesk_payload(), SignatureScheme::BareHex);
    assert!(fixture.service.validate_webhook(&request).await);
    let key = CircuitKey::new(tenant_id("acme-corp"), ToolId::from_static("helpdesk"));
    let breakers = fixture.service.breakers();
    let permit = breakers.try_acquire(&key, tokio::time::Instant::now()).unwrap();
    breakers.record(&key, permit, CallOutcome::Success, tokio::time::Instant::now());

    assert_eq!(fixture.service.sweep().rate_limit_keys, 0);

    tokio::time::advance(Duration::from_secs(601)).await;
    let report = fixture.service.sweep();

    assert_eq!(report.rate_limit_keys, 1);
    assert_eq!(report.circuit_keys, 1);
    assert!(fixture.service.authenticator().limiter().is_empty());
    assert!(breakers.is_empty());
}

/// Tests the background sweeper stops once the service is dropped.
#[tokio::test(start_paused = true)]
async fn sweeper_exits_when_service_dropped() {
    let fixture = build_service(ServiceSettings::default(), Vec::new());
    let service = Arc::new(fixture.service);
    let handle = service.spawn_sweeper(Duration::from_secs(60));

    tokio::time::advance(Duration::from_secs(120)).await;
    assert!(!handle.is_finished());
    drop(service);

    tokio::time::timeout(Duration::from_secs(300), handle).await.unwrap().unwrap();
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Tests a service started from config sweeps at the configured interval.
#[tokio::test(start_paused = true)]
async fn start_from_config_sweeps_at_configured_interval() {
    let config = BridgeConfig::from_toml_str(
        "[audit]\nsink = \"none\"\n\n[sweep]\ninterval_ms = 1000\nidle_after_ms = 60000\n",
    )
    .unwrap();
    let store = Arc::new(InMemoryCredentialStore::default());

    let running = TicketingService::start_from_config(&config, store).unwrap();
    let service = running.service;
    assert_eq!(service.settings().sweep_interval, Duration::from_secs(1));
    let breakers = Arc::clone(service.breakers());
    let key = CircuitKey::new(tenant_id("acme-corp"), ToolId::from_static("helpdesk"));
    let permit = breakers.try_acquire(&key, tokio::time::Instant::now()).unwrap();
    breakers.record(&key, permit, CallOutcome::Success, tokio::time::Instant::now());
    assert_eq!(breakers.len(), 1);

    tokio::time::sleep(Duration::from_secs(62)).await;

    assert!(breakers.is_empty());
    drop(service);
    tokio::time::timeout(Duration::from_secs(5), running.sweeper).await.unwrap().unwrap();
}

/// Tests starting from config outside a runtime is an error, not a panic.
#[test]
fn start_from_config_requires_runtime() {
    let store = Arc::new(InMemoryCredentialStore::default());

    let result = TicketingService::start_from_config(&BridgeConfig::default(), store);

    assert!(matches!(result, Err(ticket_bridge_runtime::ServiceError::Runtime(_))));
}

/// Tests a service built from config discovers adapters and writes audit lines.
#[tokio::test]
async fn from_config_discovers_adapters_and_audits_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");
    let config = BridgeConfig::from_toml_str(&format!(
        "[audit]\nsink = \"file\"\npath = {:?}\n\n[adapters]\nenabled = [\"helpdesk\"]\n",
        path.display().to_string()
    ))
    .unwrap();
    let store = Arc::new(InMemoryCredentialStore::default());

    let (service, report) = TicketingService::from_config(&config, store).unwrap();

    let registered: Vec<String> = report.registered.iter().map(ToString::to_string).collect();
    assert_eq!(registered, vec!["helpdesk"]);
    assert!(service.registry().resolve("jira").is_err());

    assert!(!service.validate_webhook(&WebhookRequest::new("not json", None)).await);
    let log = std::fs::read_to_string(&path).unwrap();
    let rejected = log
        .lines()
        .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap())
        .find(|event| event["event"] == "webhook_rejected")
        .unwrap();
    assert_eq!(rejected["code"], "malformed_payload");
}
