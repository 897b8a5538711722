//! Host selection for backends declared with several base URLs.
//!
//! # Design Decisions
//! - Stateless except for an atomic counter (no locks on the hot path)
//! - All hosts are treated as equal; health tracking belongs to the transport

pub mod round_robin;

use url::Url;

pub use round_robin::RoundRobin;

/// Picks the host for the next backend call.
pub trait Balancer: Send + Sync + std::fmt::Debug {
    fn next_host<'a>(&self, hosts: &'a [Url]) -> Option<&'a Url>;
}
