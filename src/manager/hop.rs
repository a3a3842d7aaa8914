use crate::contract::{BtcContract, ContractRole};
use crate::error::CoreError;
use crate::manager::{Collaborators, Disposition};
use crate::router::Tunnel;
use crate::wire::{Direction, PeerId, TransactionId, TxPhase, VirtualAddress, WireItem};

use std::sync::{Arc, Mutex};

/// An intermediate link on the swap path: neither the buyer nor the final
/// seller, just a trusted-credit relay. Tracks one bookkeeping contract per
/// adjoining edge (`payee` toward the previous hop, `payer` toward the
/// next), but never itself moves Bitcoin; only the final payee broadcasts a
/// transaction, addressed all the way back to the original coordinator.
pub struct HopManager {
    tx_id: TransactionId,
    phase: TxPhase,
    addr: VirtualAddress,
    payee: Option<Arc<Mutex<BtcContract>>>,
    payer: Option<Arc<Mutex<BtcContract>>>,
}

impl HopManager {
    pub fn tx_id(&self) -> &TransactionId {
        &self.tx_id
    }

    /// Builds the hop's half of a tunnel and relays the first `QUERY`,
    /// constructing the bookkeeping contracts for both adjoining edges.
    /// Called by the registry once it has confirmed there is no local
    /// order for this virtual address but a next hop exists.
    pub fn on_query(
        from: &PeerId,
        item: &WireItem,
        collab: &Collaborators,
    ) -> Result<(HopManager, Disposition), CoreError> {
        let addr = item.virtual_address.clone();
        let tx_id = TransactionId::new(&addr, &item.payer_id);
        let mut hop = HopManager {
            tx_id,
            phase: TxPhase::Query,
            addr: addr.clone(),
            payee: None,
            payer: None,
        };

        let next_hop = match collab.router.next_hop(&addr) {
            Some(peer) => peer,
            None => {
                tracing::warn!(tx_id = %hop.tx_id, "hop: no route past this node");
                let disp = hop.abort_tx(from, item, collab)?;
                return Ok((hop, disp));
            }
        };
        collab.router.add_tunnel(
            addr.clone(),
            Tunnel {
                prev: from.clone(),
                next: next_hop,
            },
        );

        let query = crate::wire::parse_query_payload(&item.payload)?;
        let route = collab
            .router
            .get_tunnel(&addr)
            .ok_or_else(|| CoreError::Routing(format!("no tunnel recorded for {}", addr)))?;
        let price = (query.fiat_amount / query.btc_amount)?;

        match BtcContract::new(
            query.btc_amount,
            query.fee,
            price,
            query.currency.clone(),
            ContractRole::Receiver,
            route.prev.clone(),
            query.dest_btc_address.clone(),
        ) {
            Ok(contract) => {
                hop.payee = Some(collab.contracts.insert(contract));
            }
            Err(e) => {
                // Advisory-aborts upstream but still falls through to build
                // the sender leg and forward QUERY downstream, matching the
                // original cohort's behavior on this path exactly.
                // TODO: if the abort request is honored upstream, the sender
                // leg built below is never committed and leaks.
                tracing::warn!(tx_id = %hop.tx_id, error = %e, "hop: could not book receiver leg, continuing anyway");
                let _ = hop.abort_tx(from, item, collab);
            }
        }

        let payer_contract = BtcContract::new(
            query.btc_amount,
            query.fee,
            price,
            query.currency,
            ContractRole::Sender,
            route.next,
            query.dest_btc_address,
        )?;
        hop.payer = Some(collab.contracts.insert(payer_contract));

        hop.forward_item(item, collab)?;
        Ok((hop, Disposition::Continue))
    }

    pub(super) fn process_item(
        &mut self,
        from: &PeerId,
        item: WireItem,
        collab: &Collaborators,
    ) -> Result<Disposition, CoreError> {
        match item.phase {
            TxPhase::Query => self.abort_tx(from, &item, collab),
            TxPhase::VoteYes | TxPhase::VoteNo => self.do_vote(from, &item, collab),
            TxPhase::Commit => self.do_commit(from, &item, collab),
            TxPhase::Abort => {
                let _ = self.forward_item(&item, collab);
                self.rollback(collab);
                Ok(Disposition::Failure)
            }
            TxPhase::AbortRequest => self.forward_item(&item, collab),
            other => Err(CoreError::Fatal(format!(
                "hop: unexpected phase {} for tx {}",
                other, self.tx_id
            ))),
        }
    }

    fn do_vote(
        &mut self,
        from: &PeerId,
        item: &WireItem,
        collab: &Collaborators,
    ) -> Result<Disposition, CoreError> {
        if self.phase != TxPhase::Query {
            return self.abort_tx(from, item, collab);
        }
        self.phase = item.phase;

        let vote = crate::wire::parse_vote_payload(&item.payload)?;
        let payer = self
            .payer
            .clone()
            .ok_or_else(|| CoreError::Fatal("hop: VOTE before QUERY".into()))?;

        payer
            .lock()
            .expect("lock poisoned")
            .set_btc_tx_id(vote.btc_tx_id.clone())?;
        if let Some(payee) = &self.payee {
            payee
                .lock()
                .expect("lock poisoned")
                .set_btc_tx_id(vote.btc_tx_id)?;
        }

        let current_amount = payer.lock().expect("lock poisoned").btc_amount();
        if vote.btc_amount > current_amount {
            return self.abort_tx(from, item, collab);
        }

        payer
            .lock()
            .expect("lock poisoned")
            .set_btc_amount(vote.btc_amount)?;
        if let Some(payee) = &self.payee {
            payee
                .lock()
                .expect("lock poisoned")
                .set_btc_amount(vote.btc_amount)?;
        }

        self.forward_item(item, collab)?;
        Ok(Disposition::Continue)
    }

    fn do_commit(
        &mut self,
        from: &PeerId,
        item: &WireItem,
        collab: &Collaborators,
    ) -> Result<Disposition, CoreError> {
        if self.phase != TxPhase::VoteYes {
            return self.abort_tx(from, item, collab);
        }
        self.phase = TxPhase::Commit;

        // Tunnel loss must leave both contracts unpersisted: check the
        // tunnel before touching contract state, not after.
        if collab.router.get_tunnel(&self.addr).is_none() {
            tracing::warn!(tx_id = %self.tx_id, "hop: no tunnel recorded, cannot forward COMMIT");
            return Ok(Disposition::Failure);
        }

        if let Some(payer) = &self.payer {
            let mut p = payer.lock().expect("lock poisoned");
            p.activate()?;
            p.persist()?;
        }
        if let Some(payee) = &self.payee {
            let mut p = payee.lock().expect("lock poisoned");
            p.activate()?;
            p.persist()?;
        }

        self.forward_item(item, collab)?;
        tracing::info!(tx_id = %self.tx_id, "hop: transaction finished");
        Ok(Disposition::Finish)
    }

    fn forward_item(
        &self,
        item: &WireItem,
        collab: &Collaborators,
    ) -> Result<Disposition, CoreError> {
        let tunnel = match collab.router.get_tunnel(&item.virtual_address) {
            Some(t) => t,
            None => {
                tracing::warn!(tx_id = %self.tx_id, "hop: no tunnel recorded, cannot forward");
                return Ok(Disposition::Failure);
            }
        };
        let target = match item.direction {
            Direction::Server => tunnel.next,
            Direction::Client => tunnel.prev,
        };
        let forwarded = WireItem::new(
            item.virtual_address.clone(),
            item.phase,
            item.direction,
            item.payer_id.clone(),
            item.payload.clone(),
        );
        if let Err(e) = collab.peers.send_item(&target, forwarded) {
            tracing::warn!(tx_id = %self.tx_id, error = %e, "hop: failed to forward item");
        }
        Ok(Disposition::Continue)
    }

    fn rollback(&self, collab: &Collaborators) {
        tracing::info!(tx_id = %self.tx_id, "hop: rolling back");
        if let Some(payer) = &self.payer {
            collab.contracts.rm_contract(payer);
        }
        if let Some(payee) = &self.payee {
            collab.contracts.rm_contract(payee);
        }
    }

    fn abort_tx(
        &mut self,
        from: &PeerId,
        item: &WireItem,
        collab: &Collaborators,
    ) -> Result<Disposition, CoreError> {
        tracing::warn!(tx_id = %self.tx_id, "hop: requesting ABORT");
        self.phase = TxPhase::AbortRequest;
        let request = WireItem::new(
            self.addr.clone(),
            TxPhase::AbortRequest,
            Direction::Client,
            item.payer_id.clone(),
            "",
        );
        if let Err(e) = collab.peers.send_item(from, request) {
            tracing::warn!(tx_id = %self.tx_id, error = %e, "hop: failed to send ABORT_REQUEST");
        }
        Ok(Disposition::Continue)
    }
}
