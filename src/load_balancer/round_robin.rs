//! Round-robin host selection.

use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;

use crate::load_balancer::Balancer;

/// Round-robin selector.
/// Stores an internal counter to rotate through hosts.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Balancer for RoundRobin {
    fn next_host<'a>(&self, hosts: &'a [Url]) -> Option<&'a Url> {
        if hosts.is_empty() {
            return None;
        }
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % hosts.len();
        hosts.get(index)
    }
}
