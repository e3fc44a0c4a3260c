//! Overall Stats View
//!
//! Summary of the balancer's global stats push. The balancer sends rolling
//! series (`healthyHosts`, `unhealthyHosts`, `overallConnections`, `ticks`)
//! and this view shows the newest point of each, plus the connection peak
//! over the window. Payloads without those series fall back to listing
//! their scalar fields.

use serde_json::Value;

use super::View;
use crate::store::{StateChange, StateKey};

/// Latest values extracted from a stats payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSummary {
    pub healthy_hosts: Option<u64>,
    pub unhealthy_hosts: Option<u64>,
    pub connections: Option<u64>,
    pub peak_connections: Option<u64>,
    pub window: usize,
    pub last_tick: Option<String>,
    pub extra: Vec<(String, String)>,
}

impl StatsSummary {
    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };

        let series = |name: &str| -> Vec<u64> {
            object
                .get(name)
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(Value::as_u64).collect())
                .unwrap_or_default()
        };

        let healthy = series("healthyHosts");
        let unhealthy = series("unhealthyHosts");
        let connections = series("overallConnections");

        let last_tick = object
            .get("ticks")
            .and_then(Value::as_array)
            .and_then(|ticks| ticks.last())
            .and_then(Value::as_str)
            .filter(|tick| !tick.is_empty())
            .map(str::to_string);

        const KNOWN: [&str; 6] = [
            "mutation",
            "healthyHosts",
            "unhealthyHosts",
            "overallConnections",
            "ticks",
            "hosts",
        ];
        let extra = object
            .iter()
            .filter(|(key, _)| !KNOWN.contains(&key.as_str()))
            .filter_map(|(key, value)| match value {
                Value::Number(n) => Some((key.clone(), n.to_string())),
                Value::Bool(b) => Some((key.clone(), b.to_string())),
                Value::String(s) => Some((key.clone(), s.clone())),
                _ => None,
            })
            .collect();

        Self {
            healthy_hosts: healthy.last().copied(),
            unhealthy_hosts: unhealthy.last().copied(),
            connections: connections.last().copied(),
            peak_connections: connections.iter().max().copied(),
            window: connections.len(),
            last_tick,
            extra,
        }
    }

    fn has_series(&self) -> bool {
        self.healthy_hosts.is_some() || self.unhealthy_hosts.is_some() || self.connections.is_some()
    }
}

/// Stats panel bound to one slot
#[derive(Debug)]
pub struct OverallStats {
    slot: String,
    summary: StatsSummary,
}

impl OverallStats {
    pub fn new(slot: impl Into<String>) -> Self {
        Self {
            slot: slot.into(),
            summary: StatsSummary::default(),
        }
    }

    pub fn summary(&self) -> &StatsSummary {
        &self.summary
    }
}

impl View for OverallStats {
    fn interests(&self) -> Vec<StateKey> {
        vec![StateKey::slot(self.slot.clone())]
    }

    fn update(&mut self, change: &StateChange) {
        if let StateChange::Slot { name, value } = change {
            if *name == self.slot {
                self.summary = StatsSummary::from_value(value);
            }
        }
    }

    fn render(&self) -> Vec<String> {
        let s = &self.summary;
        let mut lines = vec!["Overall Stats".to_string()];

        if s.has_series() {
            let show = |v: Option<u64>| v.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string());
            lines.push(format!("  healthy hosts     {}", show(s.healthy_hosts)));
            lines.push(format!("  unhealthy hosts   {}", show(s.unhealthy_hosts)));
            lines.push(format!(
                "  connections       {} (peak {} over {} ticks)",
                show(s.connections),
                show(s.peak_connections),
                s.window
            ));
            if let Some(tick) = &s.last_tick {
                lines.push(format!("  last tick         {}", tick));
            }
        }

        for (key, value) in &s.extra {
            lines.push(format!("  {:<17} {}", key, value));
        }

        if lines.len() == 1 {
            lines.push("  waiting for stats".to_string());
        }
        lines
    }
}
