//! Host List View
//!
//! Table of router hosts behind the balancer. The slot is decoded leniently:
//! an array of hosts, a map of hosts keyed by id, or a single host object.
//! A host's `stats` may be a single snapshot or a history, in which case the
//! newest entry is shown.

use serde_json::{Map, Value};

use super::View;
use crate::store::{StateChange, StateKey};

/// One rendered host
#[derive(Debug, Clone, PartialEq)]
pub struct HostRow {
    pub label: String,
    pub healthy: Option<bool>,
    pub active_connections: Option<u64>,
    pub total_connections: Option<i64>,
    pub refused_connections: Option<u64>,
}

impl HostRow {
    fn from_object(key: Option<&str>, host: &Map<String, Value>) -> Self {
        let label = ["hostIP", "name", "clusterKey"]
            .iter()
            .find_map(|field| host.get(*field).and_then(Value::as_str))
            .or(key)
            .unwrap_or("?")
            .to_string();

        let stats = match host.get("stats") {
            Some(Value::Object(stats)) => Some(stats),
            Some(Value::Array(history)) => history.last().and_then(Value::as_object),
            _ => None,
        };
        let field = |name: &str| stats.and_then(|s| s.get(name)).or_else(|| host.get(name));

        Self {
            label,
            healthy: field("healthy").and_then(Value::as_bool),
            active_connections: field("activeConnections").and_then(Value::as_u64),
            total_connections: field("totalConnections").and_then(Value::as_i64),
            refused_connections: field("refusedConnections").and_then(Value::as_u64),
        }
    }

    fn render(&self) -> String {
        let health = match self.healthy {
            Some(true) => "healthy",
            Some(false) => "unhealthy",
            None => "unknown",
        };
        format!(
            "  {:<20} {:<9} active={} total={} refused={}",
            self.label,
            health,
            show(self.active_connections),
            show(self.total_connections),
            show(self.refused_connections),
        )
    }
}

fn show<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Decode a host list slot into rows
pub fn decode_hosts(value: &Value) -> Vec<HostRow> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_object)
            .map(|host| HostRow::from_object(None, host))
            .collect(),
        Value::Object(object) if looks_like_host(object) => {
            vec![HostRow::from_object(None, object)]
        }
        Value::Object(object) => object
            .iter()
            .filter_map(|(key, host)| host.as_object().map(|h| HostRow::from_object(Some(key), h)))
            .collect(),
        _ => Vec::new(),
    }
}

fn looks_like_host(object: &Map<String, Value>) -> bool {
    ["hostIP", "name", "stats"].iter().any(|field| object.contains_key(*field))
}

/// Host table bound to one slot
#[derive(Debug)]
pub struct HostList {
    slot: String,
    rows: Vec<HostRow>,
}

impl HostList {
    pub fn new(slot: impl Into<String>) -> Self {
        Self {
            slot: slot.into(),
            rows: Vec::new(),
        }
    }

    pub fn rows(&self) -> &[HostRow] {
        &self.rows
    }
}

impl View for HostList {
    fn interests(&self) -> Vec<StateKey> {
        vec![StateKey::slot(self.slot.clone())]
    }

    fn update(&mut self, change: &StateChange) {
        if let StateChange::Slot { name, value } = change {
            if *name == self.slot {
                self.rows = decode_hosts(value);
            }
        }
    }

    fn render(&self) -> Vec<String> {
        let mut lines = vec![format!("Hosts ({})", self.rows.len())];
        if self.rows.is_empty() {
            lines.push("  no hosts reported".to_string());
        }
        lines.extend(self.rows.iter().map(HostRow::render));
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_router_host_array() {
        let rows = decode_hosts(&json!([
            {"hostIP": "10.0.1.10", "stats": {"healthy": true, "activeConnections": 4, "totalConnections": 120, "refusedConnections": 0}},
            {"hostIP": "10.0.1.11", "stats": {"healthy": false}}
        ]));

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].label, "10.0.1.10");
        assert_eq!(rows[0].active_connections, Some(4));
        assert_eq!(rows[1].healthy, Some(false));
        assert_eq!(rows[1].total_connections, None);
    }

    #[test]
    fn test_decode_single_placeholder_host() {
        let rows = decode_hosts(&json!({"name": "lb1"}));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].label, "lb1");
        assert_eq!(rows[0].healthy, None);
    }

    #[test]
    fn test_decode_keyed_hosts_with_history() {
        let rows = decode_hosts(&json!({
            "cluster-a/10.0.1.10": {"clusterKey": "cluster-a", "stats": [{"healthy": false}, {"healthy": true}]}
        }));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].label, "cluster-a");
        assert_eq!(rows[0].healthy, Some(true));
    }

    #[test]
    fn test_decode_unusable_values() {
        assert!(decode_hosts(&json!(null)).is_empty());
        assert!(decode_hosts(&json!([1, "two"])).is_empty());
    }

    #[test]
    fn test_ignores_other_slots() {
        let mut view = HostList::new("hostList");
        view.update(&StateChange::Slot {
            name: "stats".to_string(),
            value: json!([{"hostIP": "x"}]),
        });
        assert!(view.rows().is_empty());
        assert!(view.render().iter().any(|l| l.contains("no hosts reported")));
    }
}
