use opentelemetry::{KeyValue, metrics::UpDownCounter};
use std::sync::LazyLock;

static STATDS: LazyLock<UpDownCounter<i64>> = LazyLock::new(|| {
    logfire::i64_up_down_counter("meta_webhook_statds")
        .with_description("Meta webhook gateway statistics")
        .with_unit("event")
        .build()
});

fn incr_statds(metric: String, value: String) {
    STATDS.add(1, &[KeyValue::new(metric, value)]);
}

/// `valid`, `invalid` or `missing`
pub fn incr_signature_statds(result: &str) {
    incr_statds("signature".to_string(), result.into())
}

pub fn incr_routed_event_statds(key: &str) {
    incr_statds("routed_event".to_string(), key.into())
}

pub fn incr_unhandled_event_statds(key: &str) {
    incr_statds("unhandled_event".to_string(), key.into())
}

pub fn incr_unhandled_object_statds(object: &str) {
    incr_statds("unhandled_object".to_string(), object.into())
}

pub fn incr_handler_outcome_statds(outcome: &str) {
    incr_statds("handler_outcome".to_string(), outcome.into())
}
