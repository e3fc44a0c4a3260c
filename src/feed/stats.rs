//! Simulated balancer stats
//!
//! Produces the same frames the balancer pushes to its UI: a global stats
//! message tagged `"mutation": "stats"` carrying rolling series, and a
//! `hostList` message with the latest state of every router host.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use super::FeedError;

/// Latest counters of one router host
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostStats {
    pub healthy: bool,
    pub active_connections: u64,
    pub total_connections: u64,
    pub refused_connections: u64,
}

/// Host entry of the `hostList` message
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostEntry {
    pub cluster_key: String,
    #[serde(rename = "hostIP")]
    pub host_ip: String,
    pub stats: HostStats,
}

/// Host entry inside the global stats, with its history
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostHistory {
    pub cluster_key: String,
    #[serde(rename = "hostIP")]
    pub host_ip: String,
    pub stats: Vec<HostStats>,
}

/// Global stats message
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalStats {
    pub mutation: &'static str,
    pub healthy_hosts: Vec<u64>,
    pub unhealthy_hosts: Vec<u64>,
    pub overall_connections: Vec<u64>,
    pub ticks: Vec<String>,
    pub hosts: BTreeMap<String, HostHistory>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HostListMessage<'a> {
    host_list: &'a [HostEntry],
}

#[derive(Debug)]
struct SimHost {
    cluster_key: String,
    host_ip: String,
    current: HostStats,
    history: VecDeque<HostStats>,
}

impl SimHost {
    fn new(host_ip: &str) -> Self {
        // third octet picks the cluster: 10.0.<cluster>.x
        let cluster = host_ip.split('.').nth(2).unwrap_or("0");
        Self {
            cluster_key: format!("cluster-{}", cluster),
            host_ip: host_ip.to_string(),
            current: HostStats::default(),
            history: VecDeque::new(),
        }
    }

    fn key(&self) -> String {
        format!("{}/{}", self.cluster_key, self.host_ip)
    }

    fn step(&mut self, tick: u64, index: usize, max_ticks: usize) {
        let seed = tick + index as u64 * 5;
        let healthy = seed % 11 != 10;
        let active = if healthy { (seed * 7) % 13 } else { 0 };

        self.current = HostStats {
            healthy,
            active_connections: active,
            total_connections: self.current.total_connections + active,
            refused_connections: self.current.refused_connections + u64::from(!healthy),
        };

        push_capped(&mut self.history, self.current.clone(), max_ticks);
    }
}

fn push_capped<T>(window: &mut VecDeque<T>, value: T, cap: usize) {
    if window.len() >= cap {
        window.pop_front();
    }
    window.push_back(value);
}

/// Deterministic stats simulation over a fixed host list
#[derive(Debug)]
pub struct StatsFeed {
    hosts: Vec<SimHost>,
    max_ticks: usize,
    healthy: VecDeque<u64>,
    unhealthy: VecDeque<u64>,
    connections: VecDeque<u64>,
    ticks: VecDeque<String>,
    tick_count: u64,
}

impl StatsFeed {
    pub fn new(hosts: &[String], max_ticks: usize) -> Self {
        Self {
            hosts: hosts.iter().map(|ip| SimHost::new(ip)).collect(),
            max_ticks: max_ticks.max(1),
            healthy: VecDeque::new(),
            unhealthy: VecDeque::new(),
            connections: VecDeque::new(),
            ticks: VecDeque::new(),
            tick_count: 0,
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Number of points currently held in the rolling window
    pub fn window_len(&self) -> usize {
        self.ticks.len()
    }

    /// Advance one tick and return the frames to push
    pub fn tick(&mut self) -> Result<Vec<String>, FeedError> {
        self.tick_at(Utc::now())
    }

    /// Advance one tick stamped with `now`
    pub fn tick_at(&mut self, now: DateTime<Utc>) -> Result<Vec<String>, FeedError> {
        self.tick_count += 1;

        let max_ticks = self.max_ticks;
        for (i, host) in self.hosts.iter_mut().enumerate() {
            host.step(self.tick_count, i, max_ticks);
        }

        let healthy = self.hosts.iter().filter(|h| h.current.healthy).count() as u64;
        let unhealthy = self.hosts.len() as u64 - healthy;
        let connections: u64 = self.hosts.iter().map(|h| h.current.active_connections).sum();
        let label = now.with_timezone(&Local).format("%H:%M:%S").to_string();

        push_capped(&mut self.healthy, healthy, max_ticks);
        push_capped(&mut self.unhealthy, unhealthy, max_ticks);
        push_capped(&mut self.connections, connections, max_ticks);
        push_capped(&mut self.ticks, label, max_ticks);

        tracing::debug!(
            tick = self.tick_count,
            healthy,
            unhealthy,
            connections,
            "Feed tick"
        );

        let stats = serde_json::to_string(&self.global_stats())?;
        let entries = self.host_entries();
        let host_list = serde_json::to_string(&HostListMessage { host_list: &entries })?;
        Ok(vec![stats, host_list])
    }

    /// Global stats for the current window
    pub fn global_stats(&self) -> GlobalStats {
        GlobalStats {
            mutation: "stats",
            healthy_hosts: self.healthy.iter().copied().collect(),
            unhealthy_hosts: self.unhealthy.iter().copied().collect(),
            overall_connections: self.connections.iter().copied().collect(),
            ticks: self.ticks.iter().cloned().collect(),
            hosts: self
                .hosts
                .iter()
                .map(|h| {
                    let history = HostHistory {
                        cluster_key: h.cluster_key.clone(),
                        host_ip: h.host_ip.clone(),
                        stats: h.history.iter().cloned().collect(),
                    };
                    (h.key(), history)
                })
                .collect(),
        }
    }

    /// Latest state of every host
    pub fn host_entries(&self) -> Vec<HostEntry> {
        self.hosts
            .iter()
            .map(|h| HostEntry {
                cluster_key: h.cluster_key.clone(),
                host_ip: h.host_ip.clone(),
                stats: h.current.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{TagRouter, DEFAULT_MUTATION_FIELD};
    use chrono::TimeZone;
    use serde_json::Value;

    fn hosts() -> Vec<String> {
        vec!["10.0.1.10".to_string(), "10.0.2.10".to_string()]
    }

    #[test]
    fn test_window_is_capped() {
        let mut feed = StatsFeed::new(&hosts(), 3);
        for _ in 0..10 {
            feed.tick().unwrap();
        }

        let stats = feed.global_stats();
        assert_eq!(feed.tick_count(), 10);
        assert_eq!(feed.window_len(), 3);
        assert_eq!(stats.healthy_hosts.len(), 3);
        assert_eq!(stats.overall_connections.len(), 3);
        assert!(stats.hosts.values().all(|h| h.stats.len() == 3));
    }

    #[test]
    fn test_simulation_is_deterministic() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let mut a = StatsFeed::new(&hosts(), 5);
        let mut b = StatsFeed::new(&hosts(), 5);

        for _ in 0..4 {
            assert_eq!(a.tick_at(now).unwrap(), b.tick_at(now).unwrap());
        }
    }

    #[test]
    fn test_counts_add_up() {
        let mut feed = StatsFeed::new(&hosts(), 30);
        for _ in 0..20 {
            feed.tick().unwrap();
            let stats = feed.global_stats();
            let last = stats.healthy_hosts.len() - 1;
            assert_eq!(stats.healthy_hosts[last] + stats.unhealthy_hosts[last], 2);
        }
    }

    #[test]
    fn test_frames_route_to_slots() {
        let router = TagRouter::new(
            ["hostList".to_string(), "stats".to_string()],
            Some(DEFAULT_MUTATION_FIELD.to_string()),
        );
        let mut feed = StatsFeed::new(&hosts(), 30);
        let frames = feed.tick().unwrap();
        assert_eq!(frames.len(), 2);

        let stats: Value = serde_json::from_str(&frames[0]).unwrap();
        let writes = router.route(&stats);
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, "stats");
        assert_eq!(writes[0].1["mutation"], "stats");
        assert!(writes[0].1["hosts"]["cluster-1/10.0.1.10"].is_object());

        let host_list: Value = serde_json::from_str(&frames[1]).unwrap();
        let writes = router.route(&host_list);
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, "hostList");
        assert_eq!(writes[0].1[0]["hostIP"], "10.0.1.10");
        assert_eq!(writes[0].1[1]["clusterKey"], "cluster-2");
    }
}
