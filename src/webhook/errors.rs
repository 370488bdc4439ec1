use derive_more::{Display, Error};
use ntex::{http, web};

/// Failures of the webhook surface.
///
/// Only the variants with a 4xx status ever reach the provider, and always with
/// an empty body. [`WebhookError::UnknownEventShape`] and
/// [`WebhookError::HandlerFailure`] are recovered where they happen and only
/// show up in logs.
#[derive(Debug, Display, Error)]
pub enum WebhookError {
    MalformedBody(#[error(not(source))] String),
    MissingSignature,
    InvalidSignature,
    UnknownEventShape(#[error(not(source))] String),
    HandlerFailure(#[error(not(source))] String),
    MissingHandshakeParams,
    HandshakeRejected,
}

impl WebhookError {
    fn get_error_message(&self) -> String {
        match self {
            WebhookError::MalformedBody(msg) => format!("[MalformedBody] {msg}"),
            WebhookError::MissingSignature => "[MissingSignature]".to_string(),
            WebhookError::InvalidSignature => "[InvalidSignature]".to_string(),
            WebhookError::UnknownEventShape(msg) => format!("[UnknownEventShape] {msg}"),
            WebhookError::HandlerFailure(msg) => format!("[HandlerFailure] {msg}"),
            WebhookError::MissingHandshakeParams => "[MissingHandshakeParams]".to_string(),
            WebhookError::HandshakeRejected => "[HandshakeRejected]".to_string(),
        }
    }
}

impl web::error::WebResponseError for WebhookError {
    fn error_response(&self, _: &web::HttpRequest) -> web::HttpResponse {
        logfire::warn!(
            "webhook request rejected: {error}",
            error = self.get_error_message()
        );

        web::HttpResponse::build(self.status_code()).finish()
    }

    fn status_code(&self) -> http::StatusCode {
        match *self {
            WebhookError::MalformedBody(_) | WebhookError::MissingHandshakeParams => {
                http::StatusCode::BAD_REQUEST
            }
            WebhookError::MissingSignature
            | WebhookError::InvalidSignature
            | WebhookError::HandshakeRejected => http::StatusCode::FORBIDDEN,
            // never returned from an endpoint, recovered before the response
            WebhookError::UnknownEventShape(_) | WebhookError::HandlerFailure(_) => {
                http::StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ntex::web::error::WebResponseError;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            WebhookError::MalformedBody("eof".into()).status_code(),
            http::StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WebhookError::MissingHandshakeParams.status_code(),
            http::StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WebhookError::MissingSignature.status_code(),
            http::StatusCode::FORBIDDEN
        );
        assert_eq!(
            WebhookError::InvalidSignature.status_code(),
            http::StatusCode::FORBIDDEN
        );
        assert_eq!(
            WebhookError::HandshakeRejected.status_code(),
            http::StatusCode::FORBIDDEN
        );
    }
}
