//! The transaction-manager state machine: the three 2PC roles, the
//! shared disposition type, and the collaborator bundle every role
//! consumes.
//!
//! Role polymorphism is a tagged enum, matched at dispatch, rather than a
//! class hierarchy with downcasts. Each role owns its own struct and
//! `process_item` method, and [`TransactionManager`] just routes to it.

mod coordinator;
mod hop;
mod payee;

pub use coordinator::CoordinatorManager;
pub use hop::HopManager;
pub use payee::PayeeManager;

use crate::contract::ContractRegistry;
use crate::error::CoreError;
use crate::ledger::Ledger;
use crate::order::OrderBook;
use crate::peer::PeerService;
use crate::router::Router;
use crate::wallet::Wallet;
use crate::wire::{PeerId, TransactionId, WireItem};

/// The three 2PC roles a manager can play.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    Coordinator,
    Hop,
    Payee,
}

/// Terminal or continuing outcome of handling one wire item.
///
/// `Failure` is the expected outcome of a vote-no, an abort, or any
/// recoverable protocol/economic/routing/wallet error: the manager is done
/// and should be unregistered, but nothing panicked. [`CoreError::Fatal`]
/// is reserved for genuine programming errors (unknown phase for a role)
/// and is returned as an `Err`, never folded into `Disposition`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Disposition {
    /// The manager is still mid-protocol; keep it registered.
    Continue,
    /// The manager reached a successful terminal state; unregister it.
    Finish,
    /// The manager reached a terminal abort/rollback; unregister it.
    Failure,
}

/// The injected collaborators every manager needs to do its work. Bundled
/// so `process_item` signatures stay short; none of these are owned by
/// the manager itself.
pub struct Collaborators<'a> {
    pub router: &'a dyn Router,
    pub wallet: &'a dyn Wallet,
    pub peers: &'a dyn PeerService,
    pub order_book: &'a dyn OrderBook,
    pub ledger: &'a dyn Ledger,
    pub contracts: &'a ContractRegistry,
}

/// A live transaction manager, in exactly one of the three roles.
pub enum TransactionManager {
    Coordinator(CoordinatorManager),
    Hop(HopManager),
    Payee(PayeeManager),
}

impl TransactionManager {
    /// The registry key this manager is stored under.
    pub fn tx_id(&self) -> &TransactionId {
        match self {
            TransactionManager::Coordinator(m) => m.tx_id(),
            TransactionManager::Hop(m) => m.tx_id(),
            TransactionManager::Payee(m) => m.tx_id(),
        }
    }

    /// Which role this manager plays.
    pub fn role(&self) -> Role {
        match self {
            TransactionManager::Coordinator(_) => Role::Coordinator,
            TransactionManager::Hop(_) => Role::Hop,
            TransactionManager::Payee(_) => Role::Payee,
        }
    }

    /// Dispatches one inbound item to the role-specific handler. `from` is
    /// the peer that physically delivered `item` (the transport layer's
    /// concern, never encoded in the item itself), and is how a hop learns
    /// which neighbour to remember as the "prev" side of its tunnel.
    pub fn process_item(
        &mut self,
        from: &PeerId,
        item: WireItem,
        collab: &Collaborators,
    ) -> Result<Disposition, CoreError> {
        match self {
            TransactionManager::Coordinator(m) => m.process_item(item, collab),
            TransactionManager::Hop(m) => m.process_item(from, item, collab),
            TransactionManager::Payee(m) => m.process_item(from, item, collab),
        }
    }
}
