// crates/ticket-bridge-adapters/tests/jira_adapter.rs
// ============================================================================
// Module: Jira Adapter Tests
// Description: Wire-level and normalization behavior of the Jira adapter.
// Purpose: Validate issue requests, ADF handling, and metadata extraction.
// Dependencies: ticket-bridge-adapters, ticket-bridge-core, tiny_http, tokio
// ============================================================================

//! ## Overview
//! Drives the Jira adapter against a scripted local server and checks tagged
//! signatures, ADF flattening, and Jira timestamp formats.

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

use serde_json::Value;
use serde_json::json;
use ticket_bridge_adapters::JiraAdapter;
use ticket_bridge_adapters::jira::MAX_ADF_DEPTH;
use ticket_bridge_adapters::jira::flatten_adf;
use ticket_bridge_core::AdapterCallError;
use ticket_bridge_core::EnhancementContent;
use ticket_bridge_core::Priority;
use ticket_bridge_core::Secret;
use ticket_bridge_core::SignatureScheme;
use ticket_bridge_core::TicketId;
use ticket_bridge_core::TicketingAdapter;
use ticket_bridge_core::signature::sign_header;
use ticket_bridge_core::timestamp::unix_millis;

use crate::common::ScriptedResponse;
use crate::common::WEBHOOK_SECRET;
use crate::common::jira_session;
use crate::common::local_http;
use crate::common::spawn_server;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds the adapter over local HTTP plumbing.
fn adapter() -> JiraAdapter {
    JiraAdapter::new(local_http())
}

/// Builds a representative Jira webhook payload.
fn webhook_payload() -> Value {
    json!({
        "timestamp": 1_705_314_605_000_i64,
        "webhookEvent": "jira:issue_created",
        "tenant": { "id": "globex" },
        "issue": {
            "key": "OPS-7",
            "fields": {
                "description": {
                    "type": "doc",
                    "version": 1,
                    "content": [
                        {
                            "type": "paragraph",
                            "content": [
                                { "type": "text", "text": "VPN drops" },
                                { "type": "hardBreak" },
                                { "type": "text", "text": "every hour" }
                            ]
                        },
                        {
                            "type": "paragraph",
                            "content": [{ "type": "text", "text": "Started Monday." }]
                        }
                    ]
                },
                "priority": { "name": "Highest" },
                "created": "2024-01-15T10:30:00.000+0000"
            }
        }
    })
}

/// Builds a document nested `depth` levels deep.
fn nested_document(depth: usize) -> Value {
    let mut node = json!({ "type": "text", "text": "deep" });
    for _ in 0..depth {
        node = json!({ "type": "blockquote", "content": [node] });
    }
    json!({ "type": "doc", "content": [node] })
}

// ============================================================================
// SECTION: Fetch
// ============================================================================

/// Tests a fetch returns the issue body from the v3 path.
#[tokio::test]
async fn get_ticket_returns_issue() {
    let server =
        spawn_server(vec![ScriptedResponse::json(200, &json!({"key": "OPS-7", "fields": {}}))]);
    let session = jira_session(&server.base_url);

    let ticket = adapter()
        .get_ticket(&session, &TicketId::parse("OPS-7").unwrap())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(ticket.tool_id.as_str(), "jira");
    assert_eq!(ticket.raw["key"], "OPS-7");
    let requests = server.captured();
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].url, "/rest/api/3/issue/OPS-7");
    assert!(requests[0].authorization.as_deref().unwrap().starts_with("Basic "));
}

/// Tests a 404 is reported as a missing issue.
#[tokio::test]
async fn get_ticket_missing_returns_none() {
    let server = spawn_server(vec![ScriptedResponse::status(404)]);
    let session = jira_session(&server.base_url);

    let ticket = adapter().get_ticket(&session, &TicketId::parse("OPS-9").unwrap()).await.unwrap();
    assert!(ticket.is_none());
}

/// Tests 403 maps to an authentication error.
#[tokio::test]
async fn get_ticket_maps_forbidden() {
    let server = spawn_server(vec![ScriptedResponse::status(403)]);
    let session = jira_session(&server.base_url);

    let err = adapter().get_ticket(&session, &TicketId::parse("OPS-9").unwrap()).await.unwrap_err();
    assert_eq!(err, AdapterCallError::Authentication { status: 403 });
}

/// Tests a helpdesk session cannot drive the Jira adapter.
#[tokio::test]
async fn get_ticket_rejects_foreign_settings() {
    let server = spawn_server(Vec::new());
    let session = crate::common::helpdesk_session(&server.base_url);

    let err = adapter().get_ticket(&session, &TicketId::parse("OPS-9").unwrap()).await.unwrap_err();
    assert!(matches!(err, AdapterCallError::InvalidRequest(_)));
    assert!(server.captured().is_empty());
}

// ============================================================================
// SECTION: Update
// ============================================================================

/// Tests comments are POSTed as internal ADF documents.
#[tokio::test]
async fn update_ticket_posts_internal_adf_comment() {
    let server = spawn_server(vec![ScriptedResponse::json(201, &json!({"id": "10001"}))]);
    let session = jira_session(&server.base_url);
    let content = EnhancementContent::from_text(Some("Triage"), "Check the tunnel.\n\nRotate keys.");

    let updated = adapter()
        .update_ticket(&session, &TicketId::parse("OPS-7").unwrap(), &content)
        .await
        .unwrap();

    assert!(updated);
    let requests = server.captured();
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].url, "/rest/api/3/issue/OPS-7/comment");
    let body = requests[0].json_body();
    assert_eq!(body["properties"][0]["key"], "sd.public.comment");
    assert_eq!(body["properties"][0]["value"]["internal"], true);
    assert_eq!(body["body"]["type"], "doc");
    let nodes = body["body"]["content"].as_array().unwrap();
    assert_eq!(nodes.len(), 3);
    assert_eq!(nodes[0]["type"], "heading");
    assert_eq!(nodes[0]["content"][0]["text"], "Triage");
    assert_eq!(nodes[2]["content"][0]["text"], "Rotate keys.");
}

/// Tests a missing issue degrades to `false`.
#[tokio::test]
async fn update_ticket_missing_issue_returns_false() {
    let server = spawn_server(vec![ScriptedResponse::status(404)]);
    let session = jira_session(&server.base_url);
    let content = EnhancementContent::from_text(None, "note");

    let updated = adapter()
        .update_ticket(&session, &TicketId::parse("OPS-404").unwrap(), &content)
        .await
        .unwrap();
    assert!(!updated);
}

/// Tests 401 on update is an authentication error, not `false`.
#[tokio::test]
async fn update_ticket_unauthorized_is_error() {
    let server = spawn_server(vec![ScriptedResponse::status(401)]);
    let session = jira_session(&server.base_url);
    let content = EnhancementContent::from_text(None, "note");

    let err = adapter()
        .update_ticket(&session, &TicketId::parse("OPS-7").unwrap(), &content)
        .await
        .unwrap_err();
    assert_eq!(err, AdapterCallError::Authentication { status: 401 });
}

// ============================================================================
// SECTION: Webhooks
// ============================================================================

/// Tests the `sha256=` tag is required.
#[test]
fn validate_webhook_requires_algorithm_tag() {
    let body = webhook_payload().to_string();
    let secret = Secret::new(WEBHOOK_SECRET);
    let tagged =
        sign_header(SignatureScheme::TaggedSha256, WEBHOOK_SECRET.as_bytes(), body.as_bytes())
            .unwrap();
    let bare = tagged.trim_start_matches("sha256=").to_string();

    assert!(adapter().validate_webhook(body.as_bytes(), &tagged, &secret));
    assert!(!adapter().validate_webhook(body.as_bytes(), &bare, &secret));
    assert!(!adapter().validate_webhook(body.as_bytes(), &format!("sha1={bare}"), &secret));
    assert!(!adapter().validate_webhook(body.as_bytes(), &tagged.to_uppercase(), &secret));
}

/// Tests extraction flattens ADF and parses the Jira timestamp format.
#[test]
fn extract_metadata_normalizes_issue() {
    let metadata = adapter().extract_metadata(&webhook_payload()).unwrap();

    assert_eq!(metadata.tenant_id.as_str(), "globex");
    assert_eq!(metadata.ticket_id.as_str(), "OPS-7");
    assert_eq!(metadata.priority, Priority::High);
    assert_eq!(metadata.description, "VPN drops\nevery hour\nStarted Monday.");
    assert_eq!(unix_millis(metadata.created_at), 1_705_314_600_000);
}

/// Tests plain-string descriptions and RFC 3339 creation times are accepted.
#[test]
fn extract_metadata_accepts_plain_description() {
    let mut payload = webhook_payload();
    payload["issue"]["fields"]["description"] = json!("Plain text body");
    payload["issue"]["fields"]["created"] = json!("2024-01-15T10:30:00Z");
    payload["issue"]["fields"]["priority"]["name"] = json!("Trivial");

    let metadata = adapter().extract_metadata(&payload).unwrap();
    assert_eq!(metadata.description, "Plain text body");
    assert_eq!(metadata.priority, Priority::Low);
    assert_eq!(unix_millis(metadata.created_at), 1_705_314_600_000);
}

/// Tests a null description and missing priority fall back to defaults.
#[test]
fn extract_metadata_defaults_optional_fields() {
    let mut payload = webhook_payload();
    payload["issue"]["fields"]["description"] = Value::Null;
    payload["issue"]["fields"].as_object_mut().unwrap().remove("priority");

    let metadata = adapter().extract_metadata(&payload).unwrap();
    assert_eq!(metadata.description, "");
    assert_eq!(metadata.priority, Priority::Medium);
}

/// Tests validation errors carry dotted field paths.
#[test]
fn extract_metadata_names_nested_fields() {
    let mut payload = webhook_payload();
    payload["issue"].as_object_mut().unwrap().remove("key");
    assert_eq!(adapter().extract_metadata(&payload).unwrap_err().field, "issue.key");

    let mut payload = webhook_payload();
    payload["issue"]["fields"]["description"] = json!(17);
    assert_eq!(
        adapter().extract_metadata(&payload).unwrap_err().field,
        "issue.fields.description"
    );
}

// ============================================================================
// SECTION: ADF
// ============================================================================

/// Tests flattening stops at the depth limit.
#[test]
fn flatten_adf_is_depth_bounded() {
    assert_eq!(flatten_adf(&nested_document(8)).unwrap(), "deep");
    assert!(flatten_adf(&nested_document(MAX_ADF_DEPTH + 1)).is_none());
}
