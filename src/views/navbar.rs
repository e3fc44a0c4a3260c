//! Navbar View
//!
//! Header line with the connection indicator. The indicator reflects only
//! `is_connected`; socket errors have no visual state of their own.

use super::View;
use crate::store::{ConnectionState, StateChange, StateKey};

/// Connection indicator
#[derive(Debug, Default)]
pub struct Navbar {
    connection: ConnectionState,
}

impl Navbar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected
    }
}

impl View for Navbar {
    fn interests(&self) -> Vec<StateKey> {
        vec![StateKey::Connection]
    }

    fn update(&mut self, change: &StateChange) {
        if let StateChange::Connection(state) = change {
            self.connection = state.clone();
        }
    }

    fn render(&self) -> Vec<String> {
        let (dot, label) = if self.connection.is_connected {
            ("●", "Connected")
        } else {
            ("○", "Disconnected")
        };
        vec![format!("lbdash | Load Balancer Dashboard | {} {}", dot, label)]
    }
}
