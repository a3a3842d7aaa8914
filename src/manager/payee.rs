use crate::amount::Fraction;
use crate::contract::{BtcContract, ContractRole};
use crate::error::CoreError;
use crate::manager::{Collaborators, Disposition};
use crate::order::{begin_reset, Order, OrderPurpose};
use crate::wire::{
    build_vote_yes_payload, parse_query_payload, Direction, PeerId, RawTxHex, TransactionId,
    TxPhase, WireItem, VOTE_NO_PAYLOAD,
};

use std::sync::{Arc, Mutex};

/// The final seller on a swap path: holds the matched ask, builds and
/// broadcasts the one on-chain Bitcoin transaction that actually settles
/// the whole path, addressed all the way back to the original coordinator.
pub struct PayeeManager {
    tx_id: TransactionId,
    phase: TxPhase,
    my_order: Order,
    payee: Option<Arc<Mutex<BtcContract>>>,
    tx_hex: Option<RawTxHex>,
}

impl PayeeManager {
    pub fn tx_id(&self) -> &TransactionId {
        &self.tx_id
    }

    /// Evaluates an inbound `QUERY` against the matched ask: clamps to
    /// available credit and to the order's own leftover, votes no on any
    /// economic mismatch, or books the receiver contract and the signed
    /// settlement transaction and votes yes. Called by the registry once
    /// it has found a local ask for this virtual address.
    pub fn on_query(
        from: &PeerId,
        item: &WireItem,
        my_order: Order,
        collab: &Collaborators,
    ) -> Result<(PayeeManager, Disposition), CoreError> {
        let addr = item.virtual_address.clone();
        let tx_id = TransactionId::new(&addr, &item.payer_id);
        let mut mgr = PayeeManager {
            tx_id,
            phase: TxPhase::Query,
            my_order,
            payee: None,
            tx_hex: None,
        };

        let query = parse_query_payload(&item.payload)?;
        let mut fiat_amount = query.fiat_amount;
        let mut btc_amount = query.btc_amount;
        let price = (fiat_amount / btc_amount)?;

        let credit = collab.ledger.load_peer(from, &query.currency);
        if credit.peer_available() < (fiat_amount + query.fee)? {
            fiat_amount = (credit.peer_available() - query.fee)?;
            btc_amount = (fiat_amount / price)?;
            if !fiat_amount.is_positive() {
                let disp = mgr.vote_no(from, item, collab)?;
                return Ok((mgr, disp));
            }
        }

        if mgr.my_order.currency != query.currency {
            let disp = mgr.abort_tx(from, item, collab)?;
            return Ok((mgr, disp));
        }
        // Do they want to cheat us?
        if price < mgr.my_order.price {
            let disp = mgr.vote_no(from, item, collab)?;
            return Ok((mgr, disp));
        }

        let leftover = mgr.my_order.leftover()?;
        if leftover.is_zero() {
            let disp = mgr.vote_no(from, item, collab)?;
            return Ok((mgr, disp));
        }
        if btc_amount > leftover {
            mgr.my_order.commitment = mgr.my_order.amount;
            btc_amount = leftover;
        } else {
            mgr.my_order.commitment = (mgr.my_order.commitment + btc_amount)?;
        }

        let (raw_tx, out_tx_id) = match collab.wallet.mk_raw_tx(
            btc_amount,
            &mgr.my_order.btc_address,
            &query.dest_btc_address,
        ) {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(tx_id = %mgr.tx_id, error = %e, "payee: could not build settlement transaction");
                return Ok((mgr, Disposition::Failure));
            }
        };

        let mut contract = BtcContract::new(
            btc_amount,
            Fraction::ZERO,
            price,
            query.currency,
            ContractRole::Receiver,
            from.clone(),
            query.dest_btc_address,
        )?;
        contract.set_btc_tx_id(out_tx_id.clone())?;
        mgr.tx_hex = Some(raw_tx);
        mgr.payee = Some(collab.contracts.insert(contract));

        {
            let _guard = begin_reset(collab.order_book);
            collab.order_book.update_order(&mgr.my_order);
        }

        let payload = build_vote_yes_payload(btc_amount, &out_tx_id);
        let reply = WireItem::new(
            addr,
            TxPhase::VoteYes,
            Direction::Client,
            item.payer_id.clone(),
            payload,
        );
        if let Err(e) = collab.peers.send_item(from, reply) {
            tracing::warn!(tx_id = %mgr.tx_id, error = %e, "payee: failed to send VOTE_YES");
        }

        Ok((mgr, Disposition::Continue))
    }

    pub(super) fn process_item(
        &mut self,
        from: &PeerId,
        item: WireItem,
        collab: &Collaborators,
    ) -> Result<Disposition, CoreError> {
        match item.phase {
            TxPhase::Query => self.abort_tx(from, &item, collab),
            TxPhase::Commit => self.do_commit(from, &item, collab),
            TxPhase::Abort => {
                self.rollback(collab);
                Ok(Disposition::Failure)
            }
            other => Err(CoreError::Fatal(format!(
                "payee: unexpected phase {} for tx {}",
                other, self.tx_id
            ))),
        }
    }

    fn do_commit(
        &mut self,
        from: &PeerId,
        item: &WireItem,
        collab: &Collaborators,
    ) -> Result<Disposition, CoreError> {
        if self.phase != TxPhase::Query {
            return self.abort_tx(from, item, collab);
        }
        let payee = match self.payee.clone() {
            Some(p) => p,
            None => return self.abort_tx(from, item, collab),
        };
        self.phase = TxPhase::Commit;

        {
            let mut p = payee.lock().expect("lock poisoned");
            p.activate()?;
            p.persist()?;
        }
        let settled = payee.lock().expect("lock poisoned").btc_amount();

        {
            let _guard = begin_reset(collab.order_book);
            if self.my_order.amount > settled {
                self.my_order.purpose = OrderPurpose::PartlyFilled;
                self.my_order.amount = (self.my_order.amount - settled)?;
                self.my_order.commitment = (self.my_order.commitment - settled)?;
                collab.order_book.update_order(&self.my_order);
                collab.order_book.publish_order(&self.my_order);
            } else {
                self.my_order.purpose = OrderPurpose::Filled;
                collab.order_book.remove(&self.my_order.order_id);
                collab.order_book.publish_order(&self.my_order);
            }
        }

        if let Some(raw) = &self.tx_hex {
            if let Err(e) = collab.wallet.send_raw(raw) {
                tracing::warn!(tx_id = %self.tx_id, error = %e, "payee: failed to broadcast settlement transaction");
            }
        }

        tracing::info!(tx_id = %self.tx_id, "payee: transaction finished");
        Ok(Disposition::Finish)
    }

    /// Declines the query: `amount <= 0` after a credit clamp, a currency
    /// that undercuts the resting ask's price, or nothing left to fill.
    fn vote_no(
        &self,
        from: &PeerId,
        item: &WireItem,
        collab: &Collaborators,
    ) -> Result<Disposition, CoreError> {
        let reply = WireItem::new(
            item.virtual_address.clone(),
            TxPhase::VoteNo,
            Direction::Client,
            item.payer_id.clone(),
            VOTE_NO_PAYLOAD,
        );
        if let Err(e) = collab.peers.send_item(from, reply) {
            tracing::warn!(tx_id = %self.tx_id, error = %e, "payee: failed to send VOTE_NO");
        }
        Ok(Disposition::Finish)
    }

    fn rollback(&mut self, collab: &Collaborators) {
        let payee = match &self.payee {
            Some(p) => p.clone(),
            None => return,
        };
        tracing::info!(tx_id = %self.tx_id, "payee: rolling back");
        let settled = payee.lock().expect("lock poisoned").btc_amount();
        self.my_order.commitment = (self.my_order.commitment - settled).unwrap_or(self.my_order.commitment);
        collab.contracts.rm_contract(&payee);
        let _guard = begin_reset(collab.order_book);
        collab.order_book.update_order(&self.my_order);
    }

    fn abort_tx(
        &mut self,
        from: &PeerId,
        item: &WireItem,
        collab: &Collaborators,
    ) -> Result<Disposition, CoreError> {
        tracing::warn!(tx_id = %self.tx_id, "payee: requesting ABORT");
        self.phase = TxPhase::AbortRequest;
        let request = WireItem::new(
            item.virtual_address.clone(),
            TxPhase::AbortRequest,
            Direction::Client,
            item.payer_id.clone(),
            "",
        );
        if let Err(e) = collab.peers.send_item(from, request) {
            tracing::warn!(tx_id = %self.tx_id, error = %e, "payee: failed to send ABORT_REQUEST");
        }
        Ok(Disposition::Continue)
    }
}
