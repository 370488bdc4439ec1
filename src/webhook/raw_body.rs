//! Raw body capture
//!
//! Signature verification needs the body exactly as transmitted, so the JSON
//! view is always parsed from the captured bytes and the bytes are kept next to it.

use super::errors::WebhookError;
use crate::consts;
use ntex::{http::HeaderMap, util::Bytes, web};
use serde_json::Value;

/// An inbound POST, owned by the request scope.
#[derive(Debug)]
pub struct RawRequest {
    raw: Bytes,
    json: Value,
    headers: HeaderMap,
}

impl RawRequest {
    /// Captures `body` and decodes it as JSON.
    ///
    /// # Errors
    ///
    /// [`WebhookError::MalformedBody`] when the bytes are not valid JSON.
    pub fn capture(req: &web::HttpRequest, body: Bytes) -> Result<Self, WebhookError> {
        Self::from_parts(req.headers().clone(), body)
    }

    pub fn from_parts(headers: HeaderMap, raw: Bytes) -> Result<Self, WebhookError> {
        let json = serde_json::from_slice(&raw).map_err(|e| {
            WebhookError::MalformedBody(format!("body is not valid JSON: {e}"))
        })?;

        Ok(Self { raw, json, headers })
    }

    /// The body bytes exactly as received.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn json(&self) -> &Value {
        &self.json
    }

    /// `X-Hub-Signature-256` value. A header that is not valid UTF-8 is
    /// reported as present but empty so it verifies as invalid, not missing.
    pub fn signature_header(&self) -> Option<&str> {
        self.headers
            .get(consts::SIGNATURE_HEADER)
            .map(|value| value.to_str().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ntex::http::header::{HeaderName, HeaderValue};

    fn headers(signature: Option<&'static str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(signature) = signature {
            headers.insert(
                HeaderName::from_static("x-hub-signature-256"),
                HeaderValue::from_static(signature),
            );
        }
        headers
    }

    #[test]
    fn test_capture_keeps_exact_bytes() {
        // whitespace, key order and number formatting must survive untouched
        let body = Bytes::from_static(b"{ \"object\" : \"page\",\n  \"entry\": [ ], \"n\": 1.50 }");
        let request = RawRequest::from_parts(headers(Some("sha256=abc")), body.clone()).unwrap();

        assert_eq!(request.raw(), &body[..]);
        assert_eq!(request.json()["object"], "page");
        assert_eq!(request.signature_header(), Some("sha256=abc"));
    }

    #[test]
    fn test_capture_rejects_invalid_json() {
        let result = RawRequest::from_parts(headers(None), Bytes::from_static(b"{\"object\":"));
        assert!(matches!(result, Err(WebhookError::MalformedBody(_))));

        let result = RawRequest::from_parts(headers(None), Bytes::new());
        assert!(matches!(result, Err(WebhookError::MalformedBody(_))));
    }

    #[test]
    fn test_missing_signature_header() {
        let request = RawRequest::from_parts(headers(None), Bytes::from_static(b"{}")).unwrap();
        assert_eq!(request.signature_header(), None);
    }
}
