//! The live manager registry: the one process-wide table this crate owns
//! outright. Holds every in-flight [`TransactionManager`], keyed by
//! [`TransactionId`], and is the single entry point peers and the local
//! order-matcher use to drive the protocol forward.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::amount::Fraction;
use crate::error::CoreError;
use crate::manager::{Collaborators, CoordinatorManager, Disposition, HopManager, PayeeManager, TransactionManager};
use crate::order::Order;
use crate::wire::{PeerId, TransactionId, TxPhase, WireItem};

/// Registry of every transaction manager currently mid-protocol.
#[derive(Default)]
pub struct ManagerRegistry {
    managers: Mutex<HashMap<TransactionId, TransactionManager>>,
}

impl ManagerRegistry {
    pub fn new() -> Self {
        ManagerRegistry {
            managers: Mutex::new(HashMap::new()),
        }
    }

    /// Number of transactions currently in flight, for diagnostics.
    pub fn len(&self) -> usize {
        self.managers.lock().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Starts a new coordinator-side transaction against a local bid
    /// matched to `remote_ask`, for `amount`. The coordinator role is never
    /// inferred from an inbound item; only the local matcher starts one.
    pub fn start_coordinator(
        &self,
        remote_ask: Order,
        my_bid: Order,
        amount: Fraction,
        collab: &Collaborators,
    ) -> Result<Disposition, CoreError> {
        let mut mgr = CoordinatorManager::new(remote_ask, my_bid, amount);
        let disposition = mgr.init(collab)?;
        let tx_id = mgr.tx_id().clone();
        tracing::info!(tx_id = %tx_id, ?disposition, "registry: started coordinator");
        if disposition == Disposition::Continue {
            self.managers
                .lock()
                .expect("lock poisoned")
                .insert(tx_id, TransactionManager::Coordinator(mgr));
        }
        Ok(disposition)
    }

    /// Routes one inbound item to its manager, constructing a cohort
    /// manager lazily on an unrecognized `QUERY`. `from` is the peer that
    /// physically delivered `item`.
    pub fn dispatch(
        &self,
        from: PeerId,
        item: WireItem,
        collab: &Collaborators,
    ) -> Result<Disposition, CoreError> {
        let tx_id = TransactionId::new(&item.virtual_address, &item.payer_id);

        let existing = self
            .managers
            .lock()
            .expect("lock poisoned")
            .remove(&tx_id);

        let (manager, disposition) = match existing {
            Some(mut mgr) => {
                let disposition = mgr.process_item(&from, item, collab)?;
                (mgr, disposition)
            }
            None => {
                if item.phase != TxPhase::Query {
                    tracing::warn!(tx_id = %tx_id, phase = %item.phase, "registry: item for unknown transaction");
                    return Ok(Disposition::Failure);
                }
                self.construct_cohort(&from, item, collab)?
            }
        };

        tracing::info!(tx_id = %tx_id, ?disposition, "registry: processed item");
        if disposition == Disposition::Continue {
            self.managers
                .lock()
                .expect("lock poisoned")
                .insert(tx_id, manager);
        }
        Ok(disposition)
    }

    /// Decides whether this node is the final payee or an intermediate hop
    /// for a fresh `QUERY`, by probing the order book before the router: a
    /// local ask for this virtual address means this is the last leg.
    fn construct_cohort(
        &self,
        from: &PeerId,
        item: WireItem,
        collab: &Collaborators,
    ) -> Result<(TransactionManager, Disposition), CoreError> {
        if let Some(order) = collab.order_book.find(&item.virtual_address) {
            let (mgr, disposition) = PayeeManager::on_query(from, &item, order, collab)?;
            return Ok((TransactionManager::Payee(mgr), disposition));
        }
        if collab.router.next_hop(&item.virtual_address).is_some() {
            let (mgr, disposition) = HopManager::on_query(from, &item, collab)?;
            return Ok((TransactionManager::Hop(mgr), disposition));
        }
        tracing::warn!(
            addr = %item.virtual_address,
            "registry: no local order and no route for QUERY"
        );
        Err(CoreError::Routing(format!(
            "no local order and no route for {}",
            item.virtual_address
        )))
    }
}
