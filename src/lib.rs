//! Transaction core for a friend-to-friend credit-relay overlay that
//! settles fiat credit against Bitcoin across multi-hop trusted paths.
//!
//! A coordinator pays fiat credit hop by hop toward a matched ask; only the
//! final payee ever broadcasts a Bitcoin transaction, addressed all the way
//! back to the coordinator's own wallet. Everything in between is bilateral
//! credit bookkeeping, driven by the three-role two-phase-commit state
//! machine in [`manager`] and dispatched by the [`registry`].
//!
//! Orders, credit lines, wallets, routing and peer transport are all named
//! as collaborator traits (`order::OrderBook`, `ledger::Ledger`,
//! `wallet::Wallet`, `router::Router`, `peer::PeerService`) rather than
//! owned by this crate; see each module's doc comment for what it expects
//! from its caller.

pub mod amount;
pub mod consensus;
pub mod contract;
pub mod error;
pub mod ledger;
pub mod manager;
pub mod order;
pub mod peer;
pub mod registry;
pub mod router;
pub mod wallet;
pub mod wire;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[cfg(test)]
mod scenario_tests;
