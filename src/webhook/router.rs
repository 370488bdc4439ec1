//! Event router
//!
//! Walks a verified delivery (object → entry → change / messaging event) and
//! hands every leaf to the [`Dispatcher`]. Routing never fails: unknown
//! objects, unregistered fields and malformed leaves are logged and skipped,
//! and siblings keep being processed.

use super::{
    dispatcher::Dispatcher,
    errors::WebhookError,
    events::{EventPayload, WebhookEvent},
    registry::{Dispatch, HandlerRegistry},
    schemas::{Change, Entry, MessagingEvent, WebhookEnvelope},
};
use crate::metric;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Counters describing what happened to one delivery.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RouteReport {
    pub object: String,
    pub entries: usize,
    /// Leaves handed to the dispatch queue
    pub dispatched: usize,
    /// Leaves without a registered handler
    pub unhandled: usize,
    /// Entries or leaves that could not be decoded at all
    pub malformed: usize,
    /// Leaves with a handler that the queue refused
    pub dropped: usize,
}

#[derive(Clone)]
pub struct EventRouter {
    registry: Arc<HandlerRegistry>,
    dispatcher: Dispatcher,
}

fn log_unknown_shape(delivery_id: Uuid, what: &str, raw: &Value) {
    let error = WebhookError::UnknownEventShape(what.to_string());
    logfire::info!(
        "skipping leaf of delivery {delivery_id}: {error}: {raw}",
        delivery_id = delivery_id.to_string(),
        error = error.to_string(),
        raw = raw.to_string()
    );
}

impl EventRouter {
    pub fn new(registry: Arc<HandlerRegistry>, dispatcher: Dispatcher) -> Self {
        Self {
            registry,
            dispatcher,
        }
    }

    /// Dispatches every leaf of `body` and returns what was done with them.
    pub fn route(&self, delivery_id: Uuid, body: &Value) -> RouteReport {
        let envelope = WebhookEnvelope::from_json(body);
        let mut report = RouteReport {
            object: envelope.object.to_string(),
            entries: envelope.entry.len(),
            ..Default::default()
        };

        if !self.registry.handles_object(&envelope.object) {
            logfire::info!(
                "Unhandled webhook object: {object}",
                object = report.object.clone()
            );
            metric::incr_unhandled_object_statds(&report.object);
            return report;
        }

        for (raw_entry, entry) in envelope.entries() {
            match entry {
                Ok(entry) => self.route_entry(delivery_id, &envelope, raw_entry, entry, &mut report),
                Err(e) => {
                    report.malformed += 1;
                    log_unknown_shape(delivery_id, &format!("entry: {e}"), raw_entry);
                }
            }
        }

        report
    }

    fn route_entry(
        &self,
        delivery_id: Uuid,
        envelope: &WebhookEnvelope,
        raw_entry: &Value,
        entry: Entry,
        report: &mut RouteReport,
    ) {
        if !entry.has_leaves() {
            logfire::info!(
                "Received {object} entry without changes or messaging: {entry}",
                object = report.object.clone(),
                entry = raw_entry.to_string()
            );
            return;
        }

        let changes = entry.changes().unwrap_or_else(|raw| {
            report.malformed += 1;
            log_unknown_shape(delivery_id, "changes is not an array", raw);
            Default::default()
        });
        let messaging = entry.messaging().unwrap_or_else(|raw| {
            report.malformed += 1;
            log_unknown_shape(delivery_id, "messaging is not an array", raw);
            Default::default()
        });

        for raw_change in changes {
            let change = match Change::deserialize(raw_change) {
                Ok(change) => change,
                Err(e) => {
                    report.malformed += 1;
                    log_unknown_shape(delivery_id, &format!("change: {e}"), raw_change);
                    continue;
                }
            };

            let key = self.registry.resolve(&envelope.object, &change.field);
            let payload = EventPayload::from_change(&key, change.value);
            self.dispatch(
                WebhookEvent {
                    key,
                    delivery_id,
                    entry_id: entry.id.clone(),
                    payload,
                },
                report,
            );
        }

        for raw_event in messaging {
            let event = match MessagingEvent::deserialize(raw_event) {
                Ok(event) => event,
                Err(e) => {
                    report.malformed += 1;
                    log_unknown_shape(delivery_id, &format!("messaging event: {e}"), raw_event);
                    continue;
                }
            };

            let Some(kind) = event.kind() else {
                report.malformed += 1;
                log_unknown_shape(
                    delivery_id,
                    "messaging event without a single message/postback/reaction/read key",
                    raw_event,
                );
                continue;
            };

            let key = self.registry.resolve(&envelope.object, kind.field());
            self.dispatch(
                WebhookEvent {
                    key,
                    delivery_id,
                    entry_id: entry.id.clone(),
                    payload: EventPayload::from_messaging(kind, event),
                },
                report,
            );
        }
    }

    fn dispatch(&self, event: WebhookEvent, report: &mut RouteReport) {
        match self.registry.dispatch(event) {
            Dispatch::Job(job) => {
                let key = job.key().to_string();
                match self.dispatcher.enqueue(job) {
                    Ok(()) => {
                        report.dispatched += 1;
                        metric::incr_routed_event_statds(&key);
                    }
                    Err(e) => {
                        report.dropped += 1;
                        logfire::error!("{error}", error = e.to_string());
                    }
                }
            }
            Dispatch::NoHandler(key) => {
                report.unhandled += 1;
                metric::incr_unhandled_event_statds(&key.to_string());
                logfire::debug!("Unhandled field: {key}", key = key.to_string());
            }
        }
    }
}
