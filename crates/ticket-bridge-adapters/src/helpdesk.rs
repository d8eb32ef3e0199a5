// crates/ticket-bridge-adapters/src/helpdesk.rs
// ============================================================================
// Module: Helpdesk Adapter
// Description: Ticketing adapter for the helpdesk REST API (v2).
// Purpose: Verify, normalize, fetch, and annotate helpdesk tickets.
// Dependencies: reqwest, serde_json, ticket-bridge-core
// ============================================================================

//! ## Overview
//! Helpdesk webhooks carry a flat JSON body and a bare lowercase hex
//! HMAC-SHA256 signature. Tickets are read and annotated through
//! `/api/v2/tickets/{id}.json`, and notes are posted as private HTML comments.
//! Authentication uses HTTP basic auth with `{agent_email}/token` and the
//! tenant's API token.

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
use ticket_bridge_core::HELPDESK_TOOL_ID;
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
use ticket_bridge_core::payload::optional_str;
use ticket_bridge_core::signature::verify_signature;
use url::Url;

use crate::http::AdapterHttp;
use crate::http::classify_status;
use crate::http::update_outcome;
use crate::payload::parse_created_at;
use crate::payload::parse_tenant_id;
use crate::payload::parse_ticket_id;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Where helpdesk webhooks carry routing fields.
const HELPDESK_PROFILE: WebhookProfile = WebhookProfile {
    tenant_id_path: &["tenant_id"],
    timestamp_path: &["timestamp"],
    timestamp_format: TimestampFormat::Iso8601,
    event_type_path: Some(&["event_type"]),
    default_event_type: "ticket.created",
};

/// Helpdesk priority vocabulary.
const HELPDESK_PRIORITIES: PriorityTable = PriorityTable::new(&[
    ("urgent", Priority::High),
    ("high", Priority::High),
    ("normal", Priority::Medium),
    ("low", Priority::Low),
]);

/// Path to the ticket identifier.
const TICKET_ID_PATH: &[&str] = &["ticket_id"];
/// Path to the ticket description.
const DESCRIPTION_PATH: &[&str] = &["description"];
/// Path to the native priority.
const PRIORITY_PATH: &[&str] = &["priority"];
/// Path to the ticket creation time.
const CREATED_AT_PATH: &[&str] = &["created_at"];

// ============================================================================
// SECTION: Adapter
// ============================================================================

/// Helpdesk ticketing adapter.
///
/// # Invariants
/// - Notes are always posted with `public: false`.
/// - Each outbound method issues exactly one request.
#[derive(Debug, Clone)]
pub struct HelpdeskAdapter {
    /// Shared HTTP client and policy.
    http: AdapterHttp,
}

impl HelpdeskAdapter {
    /// Creates the adapter over a shared HTTP client.
    #[must_use]
    pub const fn new(http: AdapterHttp) -> Self {
        Self { http }
    }

    /// Resolves basic-auth credentials from the session.
    fn credentials(session: &ToolSession) -> Result<(String, &Secret), AdapterCallError> {
        let ToolSettings::Helpdesk { agent_email, .. } = &session.settings else {
            return Err(AdapterCallError::InvalidRequest(
                "tenant settings are not helpdesk settings".to_string(),
            ));
        };
        let token = session.credential("api_token").ok_or_else(|| {
            AdapterCallError::InvalidRequest("missing api_token credential".to_string())
        })?;
        Ok((format!("{agent_email}/token"), token))
    }

    /// Builds the ticket resource URL.
    fn ticket_url(
        &self,
        session: &ToolSession,
        ticket_id: &TicketId,
    ) -> Result<Url, AdapterCallError> {
        let resource = format!("{ticket_id}.json");
        self.http.endpoint(&session.base_url, &["api", "v2", "tickets", &resource])
    }
}

#[async_trait]
impl TicketingAdapter for HelpdeskAdapter {
    fn descriptor(&self) -> AdapterDescriptor {
        AdapterDescriptor {
            tool_id: ToolId::from_static(HELPDESK_TOOL_ID),
            display_name: "Helpdesk".to_string(),
            content_format: ContentFormat::Html,
        }
    }

    fn webhook_profile(&self) -> &WebhookProfile {
        &HELPDESK_PROFILE
    }

    fn priority_table(&self) -> &PriorityTable {
        &HELPDESK_PRIORITIES
    }

    fn validate_webhook(&self, payload: &[u8], signature: &str, secret: &Secret) -> bool {
        verify_signature(SignatureScheme::BareHex, secret.expose().as_bytes(), payload, signature)
    }

    async fn get_ticket(
        &self,
        session: &ToolSession,
        ticket_id: &TicketId,
    ) -> Result<Option<Ticket>, AdapterCallError> {
        let url = self.ticket_url(session, ticket_id)?;
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
        let mut body = self.http.read_json(response).await?;
        let raw = body
            .get_mut("ticket")
            .filter(|ticket| ticket.is_object())
            .map(Value::take)
            .ok_or_else(|| AdapterCallError::InvalidResponse("missing ticket object".to_string()))?;
        Ok(Some(Ticket {
            tool_id: ToolId::from_static(HELPDESK_TOOL_ID),
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
        let url = self.ticket_url(session, ticket_id)?;
        let (user, token) = Self::credentials(session)?;
        let body = json!({
            "ticket": {
                "comment": {
                    "html_body": render_html(content),
                    "public": false,
                }
            }
        });
        let request = self
            .http
            .client()
            .put(url)
            .basic_auth(user, Some(token.expose()))
            .json(&body);
        let response = self.http.send(request).await?;
        update_outcome(response.status(), response.headers())
    }

    fn extract_metadata(
        &self,
        payload: &Value,
    ) -> Result<CanonicalTicketMetadata, ValidationError> {
        let tenant_id = parse_tenant_id(payload, HELPDESK_PROFILE.tenant_id_path)?;
        let ticket_id = parse_ticket_id(payload, TICKET_ID_PATH)?;
        let description = optional_str(payload, DESCRIPTION_PATH)?.unwrap_or_default().to_string();
        let priority = HELPDESK_PRIORITIES.normalize(optional_str(payload, PRIORITY_PATH)?);
        let created_at = parse_created_at(payload, CREATED_AT_PATH)?;
        Ok(CanonicalTicketMetadata { tenant_id, ticket_id, description, priority, created_at })
    }
}

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// Renders enhancement content as escaped HTML.
#[must_use]
pub fn render_html(content: &EnhancementContent) -> String {
    let mut html = String::new();
    if let Some(heading) = &content.heading {
        html.push_str("<h3>");
        html.push_str(&escape_html(heading));
        html.push_str("</h3>");
    }
    for paragraph in &content.paragraphs {
        html.push_str("<p>");
        html.push_str(&escape_html(paragraph));
        html.push_str("</p>");
    }
    html
}

/// Escapes HTML metacharacters.
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
