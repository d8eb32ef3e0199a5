//! Config load validation tests for ticket-bridge-config.
// crates/ticket-bridge-config/tests/load_validation.rs
// =============================================================================
// Module: Config Load Validation Tests
// Description: Validate config loading guards (path, size, encoding).
// Purpose: Ensure config input handling is strict and fail-closed.
// =============================================================================

use std::io::Write;
use std::path::Path;

use ticket_bridge_config::AuditSinkKind;
use ticket_bridge_config::BridgeConfig;
use ticket_bridge_config::ConfigError;
use tempfile::NamedTempFile;

type TestResult = Result<(), String>;

fn assert_invalid(result: Result<BridgeConfig, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config load".to_string()),
    }
}

fn write_config(contents: &[u8]) -> Result<NamedTempFile, String> {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(contents).map_err(|err| err.to_string())?;
    Ok(file)
}

#[test]
fn load_rejects_path_too_long() -> TestResult {
    let long_path = "a".repeat(5_000);
    let path = Path::new(&long_path);
    assert_invalid(BridgeConfig::load(Some(path)), "config path exceeds max length")?;
    Ok(())
}

#[test]
fn load_rejects_path_component_too_long() -> TestResult {
    let long_component = "a".repeat(300);
    let path = Path::new(&long_component);
    assert_invalid(BridgeConfig::load(Some(path)), "config path component too long")?;
    Ok(())
}

#[test]
fn load_reports_missing_file_as_io() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("absent.toml");
    match BridgeConfig::load(Some(&path)) {
        Err(ConfigError::Io(_)) => Ok(()),
        Err(error) => Err(format!("expected io error, got {error}")),
        Ok(_) => Err("expected missing file to fail".to_string()),
    }
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let file = write_config(&vec![b'#'; 1_048_577])?;
    assert_invalid(BridgeConfig::load(Some(file.path())), "config file exceeds size limit")?;
    Ok(())
}

#[test]
fn load_rejects_non_utf8_file() -> TestResult {
    let file = write_config(&[0xFF, 0xFE, 0xFF])?;
    assert_invalid(BridgeConfig::load(Some(file.path())), "config file must be utf-8")?;
    Ok(())
}

#[test]
fn load_rejects_malformed_toml() -> TestResult {
    let file = write_config(b"[executor\nmax_attempts = 3")?;
    assert_invalid(BridgeConfig::load(Some(file.path())), "config parse error")?;
    Ok(())
}

#[test]
fn load_empty_file_yields_defaults() -> TestResult {
    let file = write_config(b"")?;
    let config = BridgeConfig::load(Some(file.path())).map_err(|err| err.to_string())?;
    if config.executor.max_attempts != 3
        || config.executor.base_backoff_ms != 1_000
        || config.circuit_breaker.failure_threshold != 5
        || config.circuit_breaker.cooldown_ms != 60_000
        || config.authenticator.clock_skew_ms != 30_000
        || config.authenticator.max_age_ms != 300_000
        || config.budgets.signature_ms != 100
        || config.audit.sink != AuditSinkKind::Stderr
        || config.adapters.enabled.is_some()
        || config.http.allow_http
    {
        return Err("defaults did not match documented values".to_string());
    }
    Ok(())
}

#[test]
fn load_reads_every_section() -> TestResult {
    let file = write_config(
        br#"
[authenticator]
clock_skew_ms = 10000
max_age_ms = 120000
default_max_requests = 20

[executor]
max_attempts = 4
base_backoff_ms = 250

[circuit_breaker]
failure_threshold = 3
cooldown_ms = 30000

[http]
request_timeout_ms = 8000
allow_http = true

[budgets]
fetch_ms = 1500

[sweep]
interval_ms = 5000
idle_after_ms = 30000

[audit]
sink = "none"

[adapters]
enabled = ["jira"]
"#,
    )?;
    let config = BridgeConfig::load(Some(file.path())).map_err(|err| err.to_string())?;
    let enabled = config.adapters.enabled.clone().unwrap_or_default();
    if config.authenticator.max_age_ms != 120_000
        || config.executor.max_attempts != 4
        || config.circuit_breaker.cooldown_ms != 30_000
        || config.http.request_timeout_ms != 8_000
        || !config.http.allow_http
        || config.budgets.fetch_ms != 1_500
        || config.sweep.idle_after_ms != 30_000
        || config.audit.sink != AuditSinkKind::None
        || !enabled.contains("jira")
    {
        return Err("loaded values did not match file".to_string());
    }
    Ok(())
}
