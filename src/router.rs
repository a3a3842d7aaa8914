//! Router / tunnel table: resolves a virtual transaction address to a
//! concrete next-hop peer, and records the `(prev, next)` pair a hop needs
//! to forward traffic bidirectionally for the life of one transaction.
//!
//! A single writer creates a tunnel entry at `QUERY` time; readers consult
//! it on every subsequent forward. No entry is ever deleted within a
//! transaction's lifetime (see the open issue on tunnel expiry carried
//! over from the original design).

use std::collections::HashMap;
use std::sync::Mutex;

use crate::wire::{PeerId, VirtualAddress};

/// The `(prevHop, nextHop)` pair recorded for one virtual address.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Tunnel {
    pub prev: PeerId,
    pub next: PeerId,
}

/// The friend-to-friend routing collaborator.
pub trait Router: Send + Sync {
    /// Resolves the next hop toward `addr`, or `None` if no route exists.
    fn next_hop(&self, addr: &VirtualAddress) -> Option<PeerId>;

    /// Records the tunnel for `addr`. Entries are unique per address.
    fn add_tunnel(&self, addr: VirtualAddress, route: Tunnel);

    /// Looks up a previously recorded tunnel.
    fn get_tunnel(&self, addr: &VirtualAddress) -> Option<Tunnel>;
}

/// An in-memory router backed by a static next-hop table plus the tunnels
/// created as transactions pass through. Suitable for tests and for a
/// single-process overlay node; a production router would consult the
/// live friend-to-friend topology instead of a fixed table.
pub struct InMemoryRouter {
    next_hops: Mutex<HashMap<String, PeerId>>,
    tunnels: Mutex<HashMap<String, Tunnel>>,
}

impl InMemoryRouter {
    /// Builds a router with an empty tunnel table and the given static
    /// next-hop assignments.
    pub fn new(next_hops: impl IntoIterator<Item = (VirtualAddress, PeerId)>) -> Self {
        let mut table = HashMap::new();
        for (addr, peer) in next_hops {
            table.insert(addr.as_str().to_string(), peer);
        }
        InMemoryRouter {
            next_hops: Mutex::new(table),
            tunnels: Mutex::new(HashMap::new()),
        }
    }

    /// Adds (or overwrites) a static next-hop assignment after construction.
    pub fn set_next_hop(&self, addr: &VirtualAddress, peer: PeerId) {
        self.next_hops
            .lock()
            .expect("lock poisoned")
            .insert(addr.as_str().to_string(), peer);
    }
}

impl Router for InMemoryRouter {
    fn next_hop(&self, addr: &VirtualAddress) -> Option<PeerId> {
        self.next_hops
            .lock()
            .expect("lock poisoned")
            .get(addr.as_str())
            .cloned()
    }

    fn add_tunnel(&self, addr: VirtualAddress, route: Tunnel) {
        self.tunnels
            .lock()
            .expect("lock poisoned")
            .insert(addr.as_str().to_string(), route);
    }

    fn get_tunnel(&self, addr: &VirtualAddress) -> Option<Tunnel> {
        self.tunnels
            .lock()
            .expect("lock poisoned")
            .get(addr.as_str())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_hop_missing_returns_none() {
        let router = InMemoryRouter::new(Vec::new());
        assert!(router.next_hop(&VirtualAddress::new("ask-1")).is_none());
    }

    #[test]
    fn tunnel_round_trips() {
        let router = InMemoryRouter::new(Vec::new());
        let addr = VirtualAddress::new("ask-1");
        let route = Tunnel {
            prev: PeerId::new("alice"),
            next: PeerId::new("carol"),
        };
        router.add_tunnel(addr.clone(), route.clone());
        assert_eq!(router.get_tunnel(&addr), Some(route));
    }
}
