//! Domain Tag Routing
//!
//! Decides which domain slots an inbound payload targets. Two shapes are
//! recognized:
//!
//! - `{"mutation": "stats", ...}` - the whole payload goes to the slot the
//!   mutation field names (this is what the balancer's stats push looks like)
//! - `{"hostList": {...}}` - each top-level key naming a slot carries that
//!   slot's new value
//!
//! The first shape wins when both could apply.

use serde_json::Value;
use std::collections::BTreeSet;

/// Default name of the field that names the target slot
pub const DEFAULT_MUTATION_FIELD: &str = "mutation";

/// Maps payloads to slot writes
#[derive(Debug, Clone)]
pub struct TagRouter {
    slots: BTreeSet<String>,
    mutation_field: Option<String>,
}

impl TagRouter {
    /// Create a router for the given slot names
    pub fn new<I, S>(slots: I, mutation_field: Option<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            slots: slots.into_iter().map(Into::into).collect(),
            mutation_field,
        }
    }

    /// Whether a slot name is recognized
    pub fn is_slot(&self, name: &str) -> bool {
        self.slots.contains(name)
    }

    /// Slot writes carried by a payload, in key order
    pub fn route(&self, payload: &Value) -> Vec<(String, Value)> {
        let Some(object) = payload.as_object() else {
            return Vec::new();
        };

        if let Some(field) = &self.mutation_field {
            if let Some(target) = object.get(field).and_then(Value::as_str) {
                if self.is_slot(target) {
                    return vec![(target.to_string(), payload.clone())];
                }
                tracing::debug!(mutation = %target, "Payload names an unknown slot");
            }
        }

        object
            .iter()
            .filter(|(key, _)| self.is_slot(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}
