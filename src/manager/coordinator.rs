use crate::amount::Fraction;
use crate::contract::{BtcContract, ContractRole};
use crate::error::CoreError;
use crate::manager::{Collaborators, Disposition};
use crate::order::{begin_reset, Order, OrderPurpose};
use crate::wire::{Direction, PeerId, TransactionId, TxPhase, VirtualAddress, WireItem};

use std::sync::{Arc, Mutex};

/// The buyer side of a swap: pays fiat credit hop-by-hop, receives Bitcoin
/// at a wallet-allocated address. Created at match time from a local bid
/// and the remote ask it was matched against.
pub struct CoordinatorManager {
    tx_id: TransactionId,
    phase: TxPhase,
    remote_ask: Order,
    my_bid: Order,
    requested_amount: Fraction,
    payer: Option<Arc<Mutex<BtcContract>>>,
    next_hop: Option<PeerId>,
}

impl CoordinatorManager {
    /// Builds a manager for the given match, not yet driving the protocol.
    /// Call [`init`](Self::init) to resolve the route, allocate a receive
    /// address, and emit the initial `QUERY`.
    pub fn new(remote_ask: Order, my_bid: Order, amount: Fraction) -> Self {
        let addr = VirtualAddress::new(remote_ask.order_id.as_str());
        let tx_id = TransactionId::new(&addr, my_bid.order_id.as_str());
        CoordinatorManager {
            tx_id,
            phase: TxPhase::Init,
            remote_ask,
            my_bid,
            requested_amount: amount,
            payer: None,
            next_hop: None,
        }
    }

    pub fn tx_id(&self) -> &TransactionId {
        &self.tx_id
    }

    fn virtual_address(&self) -> VirtualAddress {
        VirtualAddress::new(self.remote_ask.order_id.as_str())
    }

    /// Resolves the route, allocates a receive address, books the `SENDER`
    /// contract, locks the bid, and emits `QUERY` to the first hop.
    pub fn init(&mut self, collab: &Collaborators) -> Result<Disposition, CoreError> {
        let addr = self.virtual_address();

        let next_hop = match collab.router.next_hop(&addr) {
            Some(peer) => peer,
            None => {
                tracing::warn!(tx_id = %self.tx_id, "coordinator: no route to matched ask");
                return Ok(Disposition::Failure);
            }
        };

        let btc_address = match collab.wallet.new_address() {
            Ok(addr) => addr,
            Err(e) => {
                tracing::warn!(tx_id = %self.tx_id, error = %e, "coordinator: could not allocate receive address");
                return Ok(Disposition::Failure);
            }
        };

        let contract = BtcContract::new(
            self.requested_amount,
            Fraction::ZERO,
            self.remote_ask.price,
            self.remote_ask.currency.clone(),
            ContractRole::Sender,
            next_hop.clone(),
            btc_address.clone(),
        )?;
        let payer = collab.contracts.insert(contract);

        self.my_bid.locked = true;
        {
            let _guard = begin_reset(collab.order_book);
            collab.order_book.update_order(&self.my_bid);
        }

        let fiat_amount = (self.requested_amount * self.remote_ask.price)?;
        let payload = crate::wire::build_query_payload(
            fiat_amount,
            &self.remote_ask.currency,
            &btc_address,
            self.requested_amount,
            Fraction::ZERO,
        );
        let item = WireItem::new(
            addr,
            TxPhase::Query,
            Direction::Server,
            self.my_bid.order_id.as_str(),
            payload,
        );
        if let Err(e) = collab.peers.send_item(&next_hop, item) {
            tracing::warn!(tx_id = %self.tx_id, error = %e, "coordinator: failed to send QUERY");
        }

        self.payer = Some(payer);
        self.next_hop = Some(next_hop);
        self.phase = TxPhase::Query;
        Ok(Disposition::Continue)
    }

    pub(super) fn process_item(
        &mut self,
        item: WireItem,
        collab: &Collaborators,
    ) -> Result<Disposition, CoreError> {
        match item.phase {
            TxPhase::VoteYes => self.do_tx(&item, collab),
            TxPhase::VoteNo => {
                self.rollback(collab);
                self.abort_tx(collab)
            }
            TxPhase::AbortRequest => {
                self.rollback(collab);
                self.abort_tx(collab)
            }
            other => Err(CoreError::Fatal(format!(
                "coordinator: unexpected phase {} for tx {}",
                other, self.tx_id
            ))),
        }
    }

    fn do_tx(&mut self, item: &WireItem, collab: &Collaborators) -> Result<Disposition, CoreError> {
        let vote = crate::wire::parse_vote_payload(&item.payload)?;
        let payer = self
            .payer
            .clone()
            .ok_or_else(|| CoreError::Fatal("coordinator: VOTE_YES before init".into()))?;

        let current_amount = payer.lock().expect("lock poisoned").btc_amount();
        if vote.btc_amount > current_amount {
            tracing::warn!(tx_id = %self.tx_id, "coordinator: seller tried to increase settled amount");
            self.rollback(collab);
            return self.abort_tx(collab);
        }

        let settled = vote.btc_amount;
        {
            let mut c = payer.lock().expect("lock poisoned");
            c.set_btc_tx_id(vote.btc_tx_id)?;
            c.set_btc_amount(settled)?;
            c.activate()?;
            c.persist()?;
        }

        let next_hop = self
            .next_hop
            .clone()
            .ok_or_else(|| CoreError::Fatal("coordinator: missing next hop".into()))?;
        let commit_item = WireItem::new(
            self.virtual_address(),
            TxPhase::Commit,
            Direction::Server,
            self.my_bid.order_id.as_str(),
            "",
        );
        if let Err(e) = collab.peers.send_item(&next_hop, commit_item) {
            tracing::warn!(tx_id = %self.tx_id, error = %e, "coordinator: failed to send COMMIT");
        }

        {
            let _guard = begin_reset(collab.order_book);
            if (self.my_bid.amount - settled)?.is_positive() {
                self.my_bid.amount = (self.my_bid.amount - settled)?;
                self.my_bid.purpose = OrderPurpose::PartlyFilled;
                self.my_bid.locked = false;
                collab.order_book.update_order(&self.my_bid);
                collab.order_book.publish_order(&self.my_bid);
            } else {
                self.my_bid.purpose = OrderPurpose::Filled;
                collab.order_book.remove(&self.my_bid.order_id);
                collab.order_book.publish_order(&self.my_bid);
            }
        }

        tracing::info!(tx_id = %self.tx_id, "coordinator: transaction finished");
        Ok(Disposition::Finish)
    }

    fn rollback(&mut self, collab: &Collaborators) {
        tracing::info!(tx_id = %self.tx_id, "coordinator: rolling back");
        if let Some(payer) = &self.payer {
            collab.contracts.rm_contract(payer);
        }
        self.my_bid.ignored = true;
        let _guard = begin_reset(collab.order_book);
        collab.order_book.update_order(&self.my_bid);
        collab.order_book.remove(&self.remote_ask.order_id);
    }

    fn abort_tx(&self, collab: &Collaborators) -> Result<Disposition, CoreError> {
        tracing::warn!(tx_id = %self.tx_id, "coordinator: commanding ABORT");
        let addr = self.virtual_address();
        let next_hop = match collab.router.next_hop(&addr) {
            Some(peer) => peer,
            None => return Ok(Disposition::Failure),
        };
        let item = WireItem::new(
            addr,
            TxPhase::Abort,
            Direction::Server,
            self.my_bid.order_id.as_str(),
            "",
        );
        if let Err(e) = collab.peers.send_item(&next_hop, item) {
            tracing::warn!(tx_id = %self.tx_id, error = %e, "coordinator: failed to send ABORT");
        }
        Ok(Disposition::Failure)
    }
}
