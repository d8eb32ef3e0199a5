// crates/ticket-bridge-core/src/core/signature.rs
// ============================================================================
// Module: Webhook Signature Primitives
// Description: HMAC-SHA256 signing and constant-time verification.
// Purpose: Provide the single comparison path used by every adapter.
// Dependencies: hex, hmac, sha2, subtle
// ============================================================================

//! ## Overview
//! Webhook signatures are `hex(HMAC-SHA256(secret, raw_body))` in lowercase,
//! sent either bare or tagged as `sha256=<hex>`. Adapters choose a
//! [`SignatureScheme`] and delegate all hashing and comparison here so that
//! every comparison goes through [`constant_time_eq`].
//!
//! Security posture: the signature header and body are untrusted. Verification
//! never panics and reduces every failure to `false`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use hmac::Hmac;
use hmac::Mac;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Algorithm tag used in tagged signature headers.
pub const SHA256_ALGORITHM_TAG: &str = "sha256";

/// HMAC-SHA256 instance.
type HmacSha256 = Hmac<Sha256>;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Signature header encoding accepted by an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureScheme {
    /// Bare lowercase hex digest.
    BareHex,
    /// `sha256=<hex>` with the algorithm tag required.
    TaggedSha256,
}

/// Parsed signature header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureHeader<'a> {
    /// Algorithm tag when present.
    pub algorithm: Option<&'a str>,
    /// Hex digest.
    pub digest: &'a str,
}

/// Signature computation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// The signing secret was empty.
    #[error("signing secret must be non-empty")]
    EmptySecret,
    /// The HMAC key was rejected.
    #[error("invalid signing key")]
    InvalidKey,
}

// ============================================================================
// SECTION: Constant-Time Comparisons
// ============================================================================

/// Compares two byte slices in constant time.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Compares two strings in constant time.
#[must_use]
pub fn constant_time_eq_str(a: &str, b: &str) -> bool {
    constant_time_eq(a.as_bytes(), b.as_bytes())
}

// ============================================================================
// SECTION: Signing
// ============================================================================

/// Computes the lowercase hex HMAC-SHA256 signature of a payload.
///
/// # Errors
///
/// Returns [`SignatureError`] when the secret is empty or rejected.
pub fn compute_signature(secret: &[u8], payload: &[u8]) -> Result<String, SignatureError> {
    if secret.is_empty() {
        return Err(SignatureError::EmptySecret);
    }
    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(secret).map_err(|_| SignatureError::InvalidKey)?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Renders a signature header value for a payload under a scheme.
///
/// # Errors
///
/// Returns [`SignatureError`] when the signature cannot be computed.
pub fn sign_header(
    scheme: SignatureScheme,
    secret: &[u8],
    payload: &[u8],
) -> Result<String, SignatureError> {
    let digest = compute_signature(secret, payload)?;
    Ok(match scheme {
        SignatureScheme::BareHex => digest,
        SignatureScheme::TaggedSha256 => format!("{SHA256_ALGORITHM_TAG}={digest}"),
    })
}

// ============================================================================
// SECTION: Verification
// ============================================================================

/// Splits a header into an optional algorithm tag and digest.
#[must_use]
pub fn parse_signature_header(header: &str) -> SignatureHeader<'_> {
    let header = header.trim();
    match header.split_once('=') {
        Some((algorithm, digest)) => SignatureHeader { algorithm: Some(algorithm), digest },
        None => SignatureHeader { algorithm: None, digest: header },
    }
}

/// Verifies a signature header against a payload and secret.
///
/// Tags are matched exactly and digests must be lowercase hex.
#[must_use]
pub fn verify_signature(
    scheme: SignatureScheme,
    secret: &[u8],
    payload: &[u8],
    header: &str,
) -> bool {
    let parsed = parse_signature_header(header);
    let tag_ok = match scheme {
        SignatureScheme::BareHex => parsed.algorithm.is_none(),
        SignatureScheme::TaggedSha256 => parsed.algorithm == Some(SHA256_ALGORITHM_TAG),
    };
    if !tag_ok || parsed.digest.is_empty() {
        return false;
    }
    let Ok(expected) = compute_signature(secret, payload) else {
        return false;
    };
    constant_time_eq_str(&expected, parsed.digest)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
