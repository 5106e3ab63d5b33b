use rulecheck::prelude::*;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing_subscriber::layer::SubscriberExt;

/// Captures event fields for verification
#[derive(Clone, Default)]
struct EventCapture {
    events: Arc<Mutex<Vec<HashMap<String, String>>>>,
}

impl EventCapture {
    fn events(&self) -> Vec<HashMap<String, String>> {
        self.events.lock().unwrap().clone()
    }

    fn with_message(&self, message: &str) -> Vec<HashMap<String, String>> {
        self.events()
            .into_iter()
            .filter(|e| e.get("message").map(String::as_str) == Some(message))
            .collect()
    }
}

impl<S> tracing_subscriber::Layer<S> for EventCapture
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut fields = HashMap::new();
        event.record(&mut FieldVisitor { fields: &mut fields });
        self.events.lock().unwrap().push(fields);
    }
}

struct FieldVisitor<'a> {
    fields: &'a mut HashMap<String, String>,
}

impl tracing::field::Visit for FieldVisitor<'_> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.fields.insert(field.name().to_string(), format!("{:?}", value));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.fields.insert(field.name().to_string(), value.to_string());
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.fields.insert(field.name().to_string(), value.to_string());
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.fields.insert(field.name().to_string(), value.to_string());
    }
}

#[test]
fn test_element_failures_are_logged_with_index() {
    let capture = EventCapture::default();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let mut model = DynamicModel::with_attributes("m", json!({"items": [1, "x", 2, "y"]}));
    EachRule::new(IntegerRule::new())
        .stop_on_first_error(false)
        .validate_attribute(&mut model, "items")
        .unwrap();

    let failures = capture.with_message("collection element failed");
    let indexes: Vec<&str> = failures.iter().map(|e| e["index"].as_str()).collect();
    assert_eq!(indexes, vec!["1", "3"]);
    assert!(failures.iter().all(|e| e["rule"] == "integer"));
}

#[test]
fn test_existence_checks_are_logged() {
    let capture = EventCapture::default();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let store = MemoryStore::new().table("types", vec![json!({"id": 1})]);
    let rule = ExistRule::builder(Arc::new(store))
        .target_resource("types")
        .target_attribute(TargetAttribute::field("id"))
        .build()
        .unwrap();
    assert!(rule.validate(&json!(2)).unwrap().is_fail());

    let checked = capture.with_message("existence checked");
    assert_eq!(checked.len(), 1);
    assert_eq!(checked[0]["resource"], "types");
    assert_eq!(checked[0]["exists"], "false");
}
