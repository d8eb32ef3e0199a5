// crates/ticket-bridge-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Shared tenant fixtures for core tests.
// Purpose: Provide reusable, deterministic tenant configurations.
// Dependencies: ticket-bridge-core, url
// ============================================================================

//! ## Overview
//! Builds tenant configurations whose secrets are sealed with the plaintext
//! decryptor so tests can round-trip them through the in-memory store.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]

// ============================================================================
// SECTION: Imports
// ============================================================================

use ticket_bridge_core::PlaintextDecryptor;
use ticket_bridge_core::RateLimitPolicy;
use ticket_bridge_core::TenantConfig;
use ticket_bridge_core::TenantId;
use ticket_bridge_core::ToolSettings;
use url::Url;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Webhook secret used by fixtures.
pub const WEBHOOK_SECRET: &str = "whsec-test-0001";
/// API token used by fixtures.
pub const API_TOKEN: &str = "token-test-0001";

/// Builds an active helpdesk tenant.
#[must_use]
pub fn helpdesk_tenant(tenant_id: &str) -> TenantConfig {
    TenantConfig {
        tenant_id: TenantId::parse(tenant_id).unwrap(),
        base_url: Url::parse("https://acme.helpdesk.example").unwrap(),
        settings: ToolSettings::Helpdesk {
            agent_email: "agent@acme.example".to_string(),
            api_token: PlaintextDecryptor::seal(API_TOKEN),
        },
        webhook_secret: PlaintextDecryptor::seal(WEBHOOK_SECRET),
        rate_limits: RateLimitPolicy::default(),
        active: true,
    }
}
