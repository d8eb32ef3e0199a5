//! Section validation tests for ticket-bridge-config.
// crates/ticket-bridge-config/tests/section_validation.rs
// =============================================================================
// Module: Config Section Validation Tests
// Description: Validate range checks and cross-section constraints.
// Purpose: Ensure out-of-range settings fail closed with a named field.
// =============================================================================

use ticket_bridge_config::BridgeConfig;
use ticket_bridge_config::ConfigError;

type TestResult = Result<(), String>;

fn assert_invalid(toml: &str, needle: &str) -> TestResult {
    match BridgeConfig::from_toml_str(toml) {
        Err(ConfigError::Invalid(message)) if message.contains(needle) => Ok(()),
        Err(error) => Err(format!("error {error} did not contain {needle}")),
        Ok(_) => Err(format!("expected {needle} to be rejected")),
    }
}

#[test]
fn executor_rejects_zero_attempts() -> TestResult {
    assert_invalid("[executor]\nmax_attempts = 0", "executor.max_attempts")
}

#[test]
fn executor_rejects_default_retry_after_above_cap() -> TestResult {
    assert_invalid(
        "[executor]\ndefault_retry_after_ms = 90000\nmax_retry_after_ms = 60000",
        "executor.default_retry_after_ms",
    )
}

#[test]
fn authenticator_rejects_excessive_skew() -> TestResult {
    assert_invalid("[authenticator]\nclock_skew_ms = 900000", "authenticator.clock_skew_ms")
}

#[test]
fn authenticator_rejects_zero_ceiling() -> TestResult {
    assert_invalid("[authenticator]\ndefault_max_requests = 0", "authenticator.default_max_requests")
}

#[test]
fn authenticator_tenant_cap_must_fit_tracked_keys() -> TestResult {
    assert_invalid(
        "[authenticator]\nmax_tracked_keys = 10\nmax_keys_per_tenant = 11",
        "authenticator.max_keys_per_tenant",
    )?;
    assert_invalid("[authenticator]\nmax_keys_per_tenant = 0", "authenticator.max_keys_per_tenant")
}

#[test]
fn http_accepts_private_network_opt_in() -> TestResult {
    let config = BridgeConfig::from_toml_str("[http]\nallow_private_networks = true")
        .map_err(|error| error.to_string())?;
    if config.http.allow_private_networks {
        Ok(())
    } else {
        Err("allow_private_networks was not applied".to_string())
    }
}

#[test]
fn circuit_rejects_zero_threshold() -> TestResult {
    assert_invalid("[circuit_breaker]\nfailure_threshold = 0", "circuit_breaker.failure_threshold")
}

#[test]
fn http_rejects_zero_timeouts() -> TestResult {
    assert_invalid("[http]\nconnect_timeout_ms = 0", "http.connect_timeout_ms")
}

#[test]
fn http_rejects_unknown_fields() -> TestResult {
    match BridgeConfig::from_toml_str("[http]\nproxy = \"http://proxy\"") {
        Err(ConfigError::Parse(_)) => Ok(()),
        Err(error) => Err(format!("expected parse error, got {error}")),
        Ok(_) => Err("expected unknown field to be rejected".to_string()),
    }
}

#[test]
fn budgets_reject_zero() -> TestResult {
    assert_invalid("[budgets]\nextract_ms = 0", "budgets.extract_ms")
}

#[test]
fn sweep_idle_must_cover_cooldown() -> TestResult {
    assert_invalid(
        "[circuit_breaker]\ncooldown_ms = 120000\n[sweep]\nidle_after_ms = 60000",
        "sweep.idle_after_ms must be at least",
    )
}

#[test]
fn audit_file_sink_requires_path() -> TestResult {
    assert_invalid("[audit]\nsink = \"file\"", "audit.path is required")
}

#[test]
fn audit_path_rejected_for_other_sinks() -> TestResult {
    assert_invalid("[audit]\nsink = \"stderr\"\npath = \"/tmp/audit.log\"", "audit.path is only valid")
}

#[test]
fn audit_file_sink_accepts_path() -> TestResult {
    BridgeConfig::from_toml_str("[audit]\nsink = \"file\"\npath = \"/var/log/bridge.jsonl\"")
        .map(|_| ())
        .map_err(|err| err.to_string())
}

#[test]
fn adapters_reject_empty_allowlist() -> TestResult {
    assert_invalid("[adapters]\nenabled = []", "adapters.enabled must be non-empty")
}

#[test]
fn adapters_reject_malformed_tool_id() -> TestResult {
    assert_invalid("[adapters]\nenabled = [\"Service Now\"]", "adapters.enabled")
}
