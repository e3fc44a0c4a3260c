//! Dashboard Views
//!
//! Headless counterparts of the dashboard components. A view declares the
//! state keys it depends on, folds each [`StateChange`] it receives into
//! its own copy of that state, and renders itself as lines of text.
//!
//! Views never touch the store. They are driven by a [`Subscription`]
//! through [`run_view`].

mod host_list;
mod navbar;
mod overall_stats;

pub use host_list::{HostList, HostRow};
pub use navbar::Navbar;
pub use overall_stats::OverallStats;

use crate::store::{StateChange, StateKey, Subscription};

/// A component that renders from store state
pub trait View {
    /// State keys this view depends on
    fn interests(&self) -> Vec<StateKey>;

    /// Fold a change into the view's copy of the state
    fn update(&mut self, change: &StateChange);

    /// Current rendering
    fn render(&self) -> Vec<String>;
}

/// Navbar, stats and host list stacked together
pub struct Dashboard {
    navbar: Navbar,
    stats: OverallStats,
    hosts: HostList,
}

impl Dashboard {
    /// Dashboard reading the given host list and stats slots
    pub fn new(host_slot: &str, stats_slot: &str) -> Self {
        Self {
            navbar: Navbar::new(),
            stats: OverallStats::new(stats_slot),
            hosts: HostList::new(host_slot),
        }
    }

    fn parts_mut(&mut self) -> [&mut dyn View; 3] {
        [&mut self.navbar, &mut self.stats, &mut self.hosts]
    }

    fn parts(&self) -> [&dyn View; 3] {
        [&self.navbar, &self.stats, &self.hosts]
    }
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new("hostList", "stats")
    }
}

impl View for Dashboard {
    fn interests(&self) -> Vec<StateKey> {
        let mut keys: Vec<StateKey> = self.parts().iter().flat_map(|v| v.interests()).collect();
        keys.sort();
        keys.dedup();
        keys
    }

    fn update(&mut self, change: &StateChange) {
        let key = change.key();
        for view in self.parts_mut() {
            if view.interests().contains(&key) {
                view.update(change);
            }
        }
    }

    fn render(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for (i, view) in self.parts().iter().enumerate() {
            if i > 0 {
                lines.push(String::new());
            }
            lines.extend(view.render());
        }
        lines
    }
}

/// Drive a view from a subscription
///
/// `on_change` runs after every change the view receives. Returns the view
/// once the store goes away.
pub async fn run_view<V, F>(mut view: V, mut subscription: Subscription, mut on_change: F) -> V
where
    V: View,
    F: FnMut(&V),
{
    while let Some(change) = subscription.next().await {
        view.update(&change);
        on_change(&view);
    }
    view
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::connection::{ConnectionEvent, Payload, PayloadFormat};
    use crate::store::StateStore;

    #[test]
    fn test_dashboard_interests() {
        let dashboard = Dashboard::default();
        assert_eq!(
            dashboard.interests(),
            vec![
                StateKey::Connection,
                StateKey::slot("hostList"),
                StateKey::slot("stats"),
            ]
        );
    }

    #[tokio::test]
    async fn test_run_view_renders_each_change() {
        let mut store = StateStore::new(&StoreConfig::default());
        let dashboard = Dashboard::default();
        let sub = store.subscribe(dashboard.interests());

        store.apply(ConnectionEvent::Opened);
        store.apply(ConnectionEvent::Message(Payload::from_text(
            r#"{"hostList": [{"hostIP": "10.0.0.1", "stats": {"healthy": true}}]}"#,
            PayloadFormat::Json,
        )));
        drop(store);

        let mut renders = Vec::new();
        let dashboard = run_view(dashboard, sub, |view| renders.push(view.render())).await;

        let last = renders.last().unwrap().join("\n");
        assert!(last.contains("● Connected"));
        assert!(last.contains("10.0.0.1"));
        assert!(dashboard.render().join("\n").contains("10.0.0.1"));
    }
}
