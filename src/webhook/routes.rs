use super::endpoints;
use crate::consts;
use ntex::web;

/// Configures the Meta webhook routes.
///
/// These routes are public endpoints: the handshake is protected by the verify
/// token and deliveries by their HMAC signature.
///
/// # Routes
/// - `GET /webhook` - subscription handshake
/// - `POST /webhook` - event receiver
pub fn webhook(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope(consts::WEBHOOK_PATH).service((endpoints::verify, endpoints::receive)),
    );
}
