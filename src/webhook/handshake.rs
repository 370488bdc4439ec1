//! Subscription handshake
//!
//! When a callback URL is registered, Meta sends
//! `GET /webhook?hub.mode=subscribe&hub.verify_token=<token>&hub.challenge=<challenge>`
//! and expects the challenge echoed back verbatim.

use crate::consts;
use serde::Deserialize;
use subtle::ConstantTimeEq;

/// Query parameters for webhook verification
///
/// Every field is optional at extraction time so a missing parameter maps to
/// 400 instead of an extractor error.
#[derive(Debug, Default, Deserialize)]
pub struct HandshakeQuery {
    /// The mode parameter, should be "subscribe"
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    /// The verification token configured in the Meta dashboard
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    /// The challenge string to echo back
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum HandshakeOutcome {
    /// Respond 200 with exactly this body.
    Verified(String),
    /// Mode or token did not match, respond 403.
    Rejected,
    /// Mode or token absent, respond 400.
    MissingParams,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

pub fn answer_handshake(query: &HandshakeQuery, expected_token: &str) -> HandshakeOutcome {
    let (Some(mode), Some(token)) = (non_empty(&query.mode), non_empty(&query.verify_token))
    else {
        logfire::warn!("Missing mode or token in handshake request");
        return HandshakeOutcome::MissingParams;
    };

    let token_matches: bool = token.as_bytes().ct_eq(expected_token.as_bytes()).into();

    if mode != consts::HANDSHAKE_SUBSCRIBE_MODE || !token_matches {
        logfire::warn!(
            "Failed handshake validation: mode={mode}, token_matches={token_matches}",
            mode = mode.to_string(),
            token_matches = token_matches.to_string()
        );
        return HandshakeOutcome::Rejected;
    }

    logfire::info!("WEBHOOK_VERIFIED");
    HandshakeOutcome::Verified(query.challenge.clone().unwrap_or_default())
}
