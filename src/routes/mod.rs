// Routes module - reading and reconciling the host route for the pod network

pub mod lookup;
pub mod manager;
pub mod parser;

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

pub use manager::RouteManager;

/// A single entry as reported by `route -n get`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// `default`, or the destination network address
    pub destination: Option<String>,
    pub mask: Option<Ipv4Addr>,
    pub gateway: Option<IpAddr>,
    pub interface: Option<String>,
    pub flags: Vec<String>,
}

/// How the live routing table relates to the route we want
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteState {
    /// No entry for the pod CIDR
    Absent,
    /// An entry for the pod CIDR pointing where we want it
    Matching,
    /// An entry for the pod CIDR pointing somewhere else
    Stale { gateway: Option<IpAddr> },
}
