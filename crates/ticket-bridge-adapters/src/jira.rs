// crates/ticket-bridge-adapters/src/jira.rs
// ============================================================================
// Module: Jira Adapter
// Description: Ticketing adapter for the Jira Cloud REST API (v3).
// Purpose: Verify, normalize, fetch, and annotate Jira issues.
// Dependencies: reqwest, serde_json, ticket-bridge-core
// ============================================================================

//! ## Overview
//! Jira webhooks nest issue fields under `issue.fields` and sign the body with
//! an `sha256=<hex>` header. Descriptions arrive either as plain strings or as
//! Atlassian Document Format (ADF) trees, which are flattened to text here.
//! Notes are posted as internal service-desk comments rendered as ADF.
//! Invariants:
//! - The signature header must carry the `sha256` algorithm tag.
//! - ADF flattening is depth-bounded and never recurses past
//!   [`MAX_ADF_DEPTH`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use serde_json::Value;
use serde_json::json;
use ticket_bridge_core::AdapterCallError;
use ticket_bridge_core::AdapterDescriptor;
use ticket_bridge_core::CanonicalTicketMetadata;
use ticket_bridge_core::ContentFormat;
use ticket_bridge_core::EnhancementContent;
use ticket_bridge_core::JIRA_TOOL_ID;
use ticket_bridge_core::Priority;
use ticket_bridge_core::PriorityTable;
use ticket_bridge_core::Secret;
use ticket_bridge_core::SignatureScheme;
use ticket_bridge_core::Ticket;
use ticket_bridge_core::TicketId;
use ticket_bridge_core::TicketingAdapter;
use ticket_bridge_core::TimestampFormat;
use ticket_bridge_core::ToolId;
use ticket_bridge_core::ToolSession;
use ticket_bridge_core::ToolSettings;
use ticket_bridge_core::ValidationError;
use ticket_bridge_core::WebhookProfile;
use ticket_bridge_core::payload::display_path;
use ticket_bridge_core::payload::lookup;
use ticket_bridge_core::payload::optional_str;
use ticket_bridge_core::signature::verify_signature;

use crate::http::AdapterHttp;
use crate::http::classify_status;
use crate::http::update_outcome;
use crate::payload::parse_created_at;
use crate::payload::parse_tenant_id;
use crate::payload::parse_ticket_id;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum ADF nesting depth flattened into descriptions.
pub const MAX_ADF_DEPTH: usize = 64;

/// Where Jira webhooks carry routing fields.
const JIRA_PROFILE: WebhookProfile = WebhookProfile {
    tenant_id_path: &["tenant", "id"],
    timestamp_path: &["timestamp"],
    timestamp_format: TimestampFormat::UnixMillis,
    event_type_path: Some(&["webhookEvent"]),
    default_event_type: "jira:issue_created",
};

/// Jira priority vocabulary, including common custom schemes.
const JIRA_PRIORITIES: PriorityTable = PriorityTable::new(&[
    ("highest", Priority::High),
    ("high", Priority::High),
    ("blocker", Priority::High),
    ("critical", Priority::High),
    ("medium", Priority::Medium),
    ("low", Priority::Low),
    ("lowest", Priority::Low),
    ("trivial", Priority::Low),
    ("minor", Priority::Low),
]);

/// Path to the issue key.
const ISSUE_KEY_PATH: &[&str] = &["issue", "key"];
/// Path to the issue description.
const DESCRIPTION_PATH: &[&str] = &["issue", "fields", "description"];
/// Path to the native priority name.
const PRIORITY_PATH: &[&str] = &["issue", "fields", "priority", "name"];
/// Path to the issue creation time.
const CREATED_PATH: &[&str] = &["issue", "fields", "created"];

/// ADF block nodes that end with a line break when flattened.
const ADF_BLOCK_NODES: &[&str] = &[
    "paragraph",
    "heading",
    "blockquote",
    "codeBlock",
    "listItem",
    "panel",
    "rule",
    "tableRow",
];

// ============================================================================
// SECTION: Adapter
// ============================================================================

/// Jira Cloud ticketing adapter.
///
/// # Invariants
/// - Comments always carry the internal service-desk property.
/// - Each outbound method issues exactly one request.
#[derive(Debug, Clone)]
pub struct JiraAdapter {
    /// Shared HTTP client and policy.
    http: AdapterHttp,
}

impl JiraAdapter {
    /// Creates the adapter over a shared HTTP client.
    #[must_use]
    pub const fn new(http: AdapterHttp) -> Self {
        Self { http }
    }

    /// Resolves basic-auth credentials from the session.
    fn credentials(session: &ToolSession) -> Result<(&str, &Secret), AdapterCallError> {
        let ToolSettings::Jira { account_email, .. } = &session.settings else {
            return Err(AdapterCallError::InvalidRequest(
                "tenant settings are not jira settings".to_string(),
            ));
        };
        let token = session.credential("api_token").ok_or_else(|| {
            AdapterCallError::InvalidRequest("missing api_token credential".to_string())
        })?;
        Ok((account_email.as_str(), token))
    }
}

#[async_trait]
impl TicketingAdapter for JiraAdapter {
    fn descriptor(&self) -> AdapterDescriptor {
        AdapterDescriptor {
            tool_id: ToolId::from_static(JIRA_TOOL_ID),
            display_name: "Jira".to_string(),
            content_format: ContentFormat::AtlassianDocument,
        }
    }

    fn webhook_profile(&self) -> &WebhookProfile {
        &JIRA_PROFILE
    }

    fn priority_table(&self) -> &PriorityTable {
        &JIRA_PRIORITIES
    }

    fn validate_webhook(&self, payload: &[u8], signature: &str, secret: &Secret) -> bool {
        let secret = secret.expose().as_bytes();
        verify_signature(SignatureScheme::TaggedSha256, secret, payload, signature)
    }

    async fn get_ticket(
        &self,
        session: &ToolSession,
        ticket_id: &TicketId,
    ) -> Result<Option<Ticket>, AdapterCallError> {
        let url = self
            .http
            .endpoint(&session.base_url, &["rest", "api", "3", "issue", ticket_id.as_str()])?;
        let (user, token) = Self::credentials(session)?;
        let request = self
            .http
            .client()
            .get(url)
            .basic_auth(user, Some(token.expose()))
            .header(ACCEPT, "application/json");
        let response = self.http.send(request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        classify_status(response.status(), response.headers())?;
        let raw = self.http.read_json(response).await?;
        if !raw.is_object() {
            return Err(AdapterCallError::InvalidResponse("issue is not an object".to_string()));
        }
        Ok(Some(Ticket {
            tool_id: ToolId::from_static(JIRA_TOOL_ID),
            ticket_id: ticket_id.clone(),
            raw,
        }))
    }

    async fn update_ticket(
        &self,
        session: &ToolSession,
        ticket_id: &TicketId,
        content: &EnhancementContent,
    ) -> Result<bool, AdapterCallError> {
        let url = self.http.endpoint(
            &session.base_url,
            &["rest", "api", "3", "issue", ticket_id.as_str(), "comment"],
        )?;
        let (user, token) = Self::credentials(session)?;
        let body = json!({
            "body": render_adf(content),
            "properties": [
                { "key": "sd.public.comment", "value": { "internal": true } }
            ],
        });
        let request = self
            .http
            .client()
            .post(url)
            .basic_auth(user, Some(token.expose()))
            .json(&body);
        let response = self.http.send(request).await?;
        update_outcome(response.status(), response.headers())
    }

    fn extract_metadata(
        &self,
        payload: &Value,
    ) -> Result<CanonicalTicketMetadata, ValidationError> {
        let tenant_id = parse_tenant_id(payload, JIRA_PROFILE.tenant_id_path)?;
        let ticket_id = parse_ticket_id(payload, ISSUE_KEY_PATH)?;
        let description = extract_description(payload)?;
        let priority = JIRA_PRIORITIES.normalize(optional_str(payload, PRIORITY_PATH)?);
        let created_at = parse_created_at(payload, CREATED_PATH)?;
        Ok(CanonicalTicketMetadata { tenant_id, ticket_id, description, priority, created_at })
    }
}

// ============================================================================
// SECTION: Descriptions
// ============================================================================

/// Reads the issue description as plain text.
fn extract_description(payload: &Value) -> Result<String, ValidationError> {
    match lookup(payload, DESCRIPTION_PATH) {
        None => Ok(String::new()),
        Some(Value::String(text)) => Ok(text.clone()),
        Some(document @ Value::Object(_)) => flatten_adf(document).ok_or_else(|| {
            ValidationError::new(display_path(DESCRIPTION_PATH), "document nesting too deep")
        }),
        Some(_) => Err(ValidationError::new(
            display_path(DESCRIPTION_PATH),
            "field must be a string or document",
        )),
    }
}

/// Flattens an ADF document to plain text.
///
/// Returns `None` when the document exceeds [`MAX_ADF_DEPTH`].
#[must_use]
pub fn flatten_adf(document: &Value) -> Option<String> {
    let mut text = String::new();
    flatten_node(document, 0, &mut text)?;
    Some(text.trim_end().to_string())
}

/// Appends the text of one ADF node and its children.
fn flatten_node(node: &Value, depth: usize, out: &mut String) -> Option<()> {
    if depth > MAX_ADF_DEPTH {
        return None;
    }
    let node_type = node.get("type").and_then(Value::as_str).unwrap_or_default();
    match node_type {
        "text" => {
            if let Some(text) = node.get("text").and_then(Value::as_str) {
                out.push_str(text);
            }
        }
        "hardBreak" => out.push('\n'),
        _ => {}
    }
    if let Some(children) = node.get("content").and_then(Value::as_array) {
        for child in children {
            flatten_node(child, depth + 1, out)?;
        }
    }
    if ADF_BLOCK_NODES.contains(&node_type) && !out.ends_with('\n') {
        out.push('\n');
    }
    Some(())
}

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// Renders enhancement content as an ADF document.
#[must_use]
pub fn render_adf(content: &EnhancementContent) -> Value {
    let mut nodes = Vec::with_capacity(content.paragraphs.len() + 1);
    if let Some(heading) = &content.heading {
        nodes.push(json!({
            "type": "heading",
            "attrs": { "level": 3 },
            "content": [{ "type": "text", "text": heading }],
        }));
    }
    for paragraph in &content.paragraphs {
        nodes.push(json!({
            "type": "paragraph",
            "content": [{ "type": "text", "text": paragraph }],
        }));
    }
    json!({ "type": "doc", "version": 1, "content": nodes })
}
