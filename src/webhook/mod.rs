//! Meta webhook integration
//!
//! Receives callbacks for Instagram, Facebook Pages and WhatsApp Business,
//! proves their authenticity and routes each event to its handler.
//!
//! ## Modules
//!
//! - [`raw_body`] - keeps the exact request bytes next to their JSON decode
//! - [`security`] - `X-Hub-Signature-256` verification
//! - [`handshake`] - subscription verification (GET)
//! - [`schemas`] / [`events`] - envelope structures and typed event payloads
//! - [`registry`] - `(object, field)` to handler mapping
//! - [`router`] - walks a delivery and dispatches its leaves
//! - [`dispatcher`] - background queue executing handlers after the ack
//! - [`handlers`] - built-in logging handlers
//! - [`endpoints`] / [`routes`] - HTTP surface

pub mod dispatcher;
pub mod endpoints;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod handshake;
pub mod raw_body;
pub mod registry;
pub mod router;
pub mod routes;
pub mod schemas;
pub mod security;
