//! Signature verification for incoming Meta webhook requests
//!
//! Meta signs every webhook payload with HMAC-SHA256 keyed by the app secret and
//! sends the result in the `X-Hub-Signature-256` header as `sha256=<hex_signature>`.
//!
//! To verify authenticity:
//! 1. Extract the signature from the X-Hub-Signature-256 header
//! 2. Compute HMAC-SHA256 of the raw request body using the app secret
//! 3. Compare the computed signature with the received one in constant time
//!
//! # Important Notes
//!
//! - The signature MUST be computed on the raw request body bytes, not parsed JSON
//! - Neither the secret nor any digest is ever logged

use super::errors::WebhookError;
use crate::consts;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Outcome of checking a request signature.
///
/// Kept as three states so "no header" and "wrong header" stay distinguishable
/// in logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationResult {
    Valid,
    Invalid,
    Missing,
}

impl VerificationResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationResult::Valid => "valid",
            VerificationResult::Invalid => "invalid",
            VerificationResult::Missing => "missing",
        }
    }
}

/// What to do with a request whose signature is not [`VerificationResult::Valid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignaturePolicy {
    /// Reject with 403 before the body reaches the router.
    Require,
    /// Log the outcome and keep processing. Local development only.
    Optional,
}

impl SignaturePolicy {
    pub fn from_flag(require: bool) -> Self {
        if require {
            SignaturePolicy::Require
        } else {
            SignaturePolicy::Optional
        }
    }

    /// Gate a verification result according to the policy.
    pub fn enforce(self, result: VerificationResult) -> Result<(), WebhookError> {
        match (self, result) {
            (_, VerificationResult::Valid) => Ok(()),
            (SignaturePolicy::Require, VerificationResult::Missing) => {
                Err(WebhookError::MissingSignature)
            }
            (SignaturePolicy::Require, VerificationResult::Invalid) => {
                Err(WebhookError::InvalidSignature)
            }
            (SignaturePolicy::Optional, outcome) => {
                logfire::warn!(
                    "signature {outcome} accepted because verification is optional",
                    outcome = outcome.as_str()
                );
                Ok(())
            }
        }
    }
}

fn compute_hex_digest(payload: &[u8], app_secret: &str) -> Option<String> {
    // HMAC accepts keys of any length, this only fails on a broken hmac impl
    let mut mac = match HmacSha256::new_from_slice(app_secret.as_bytes()) {
        Ok(m) => m,
        Err(e) => {
            logfire::error!(
                "Failed to create HMAC instance: {error}",
                error = e.to_string()
            );
            return None;
        }
    };

    mac.update(payload);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Builds the `X-Hub-Signature-256` header value Meta would send for `payload`.
pub fn sign(payload: &[u8], app_secret: &str) -> Option<String> {
    compute_hex_digest(payload, app_secret)
        .map(|digest| format!("{}={digest}", consts::SIGNATURE_ALGORITHM))
}

/// Verifies the X-Hub-Signature-256 header against the raw request payload
///
/// # Arguments
///
/// * `signature_header` - The header value if present (e.g. "sha256=abc123...")
/// * `payload` - The raw request body bytes, exactly as received
/// * `app_secret` - The Meta app secret
///
/// # Returns
///
/// * `Missing` if the header is absent
/// * `Valid` only if the algorithm is `sha256` and the digest matches exactly
/// * `Invalid` otherwise
pub fn verify_signature(
    signature_header: Option<&str>,
    payload: &[u8],
    app_secret: &str,
) -> VerificationResult {
    let Some(signature_header) = signature_header else {
        logfire::warn!("Missing X-Hub-Signature-256 header");
        return VerificationResult::Missing;
    };

    let Some((algorithm, signature_hex)) = signature_header.split_once('=') else {
        logfire::warn!("Invalid signature header format: expected '<algorithm>=<digest>'");
        return VerificationResult::Invalid;
    };

    if algorithm != consts::SIGNATURE_ALGORITHM {
        logfire::warn!(
            "Unsupported signature algorithm: {algorithm}",
            algorithm = algorithm.to_string()
        );
        return VerificationResult::Invalid;
    }

    let Some(computed_hex) = compute_hex_digest(payload, app_secret) else {
        return VerificationResult::Invalid;
    };

    let is_valid: bool = computed_hex.as_bytes().ct_eq(signature_hex.as_bytes()).into();

    if !is_valid {
        logfire::warn!("Webhook signature verification failed: signatures do not match");
        return VerificationResult::Invalid;
    }

    VerificationResult::Valid
}
