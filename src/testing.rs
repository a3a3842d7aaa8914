//! In-memory stand-ins for every collaborator trait, for use by this
//! crate's own tests. Not part of the public API.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::amount::{CurrencyCode, Fraction};
use crate::error::CoreError;
use crate::ledger::{Credit, Ledger};
use crate::order::{Order, OrderBook};
use crate::peer::PeerService;
use crate::wallet::Wallet;
use crate::wire::{BtcAddress, BtcTxId, OrderId, PeerId, RawTxHex, VirtualAddress, WireItem};

/// An order book backed by a plain in-memory table, keyed by order id.
#[derive(Default)]
pub struct InMemoryOrderBook {
    orders: Mutex<HashMap<String, Order>>,
    published: Mutex<Vec<Order>>,
}

impl InMemoryOrderBook {
    pub fn new(orders: impl IntoIterator<Item = Order>) -> Self {
        let mut map = HashMap::new();
        for order in orders {
            map.insert(order.order_id.as_str().to_string(), order);
        }
        InMemoryOrderBook {
            orders: Mutex::new(map),
            published: Mutex::new(Vec::new()),
        }
    }

    pub fn get(&self, id: &OrderId) -> Option<Order> {
        self.orders.lock().expect("lock poisoned").get(id.as_str()).cloned()
    }

    pub fn published(&self) -> Vec<Order> {
        self.published.lock().expect("lock poisoned").clone()
    }
}

impl OrderBook for InMemoryOrderBook {
    fn find(&self, addr: &VirtualAddress) -> Option<Order> {
        self.orders.lock().expect("lock poisoned").get(addr.as_str()).cloned()
    }

    fn remove(&self, id: &OrderId) {
        self.orders.lock().expect("lock poisoned").remove(id.as_str());
    }

    fn update_order(&self, order: &Order) {
        self.orders
            .lock()
            .expect("lock poisoned")
            .insert(order.order_id.as_str().to_string(), order.clone());
    }

    fn publish_order(&self, order: &Order) {
        self.published.lock().expect("lock poisoned").push(order.clone());
    }

    fn on_begin_reset(&self) {}

    fn on_end_reset(&self) {}
}

/// A credit ledger backed by a fixed per-(peer, currency) table.
#[derive(Default)]
pub struct InMemoryLedger {
    available: Mutex<HashMap<(String, String), Fraction>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        InMemoryLedger {
            available: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_available(&self, peer: &PeerId, currency: &CurrencyCode, available: Fraction) {
        self.available
            .lock()
            .expect("lock poisoned")
            .insert((peer.as_str().to_string(), currency.symbol().to_string()), available);
    }
}

impl Ledger for InMemoryLedger {
    fn load_peer(&self, peer: &PeerId, currency: &CurrencyCode) -> Credit {
        let amount = self
            .available
            .lock()
            .expect("lock poisoned")
            .get(&(peer.as_str().to_string(), currency.symbol().to_string()))
            .copied()
            .unwrap_or(Fraction::ZERO);
        Credit::new(amount)
    }
}

/// A wallet that allocates sequential fake addresses and never fails.
#[derive(Default)]
pub struct InMemoryWallet {
    next: Mutex<u64>,
    broadcast: Mutex<Vec<RawTxHex>>,
}

impl InMemoryWallet {
    pub fn new() -> Self {
        InMemoryWallet {
            next: Mutex::new(0),
            broadcast: Mutex::new(Vec::new()),
        }
    }

    pub fn broadcast(&self) -> Vec<RawTxHex> {
        self.broadcast
            .lock()
            .expect("lock poisoned")
            .iter()
            .map(|r| RawTxHex::new(r.as_str()))
            .collect()
    }
}

impl Wallet for InMemoryWallet {
    fn new_address(&self) -> Result<BtcAddress, CoreError> {
        let mut n = self.next.lock().expect("lock poisoned");
        *n += 1;
        Ok(BtcAddress::new(format!("addr{}", n)))
    }

    fn mk_raw_tx(
        &self,
        amount: Fraction,
        from: &BtcAddress,
        to: &BtcAddress,
    ) -> Result<(RawTxHex, BtcTxId), CoreError> {
        let hex = RawTxHex::new(format!("raw:{}:{}:{}", from, to, amount));
        let txid = BtcTxId::new(format!("tx:{}:{}", from, to));
        Ok((hex, txid))
    }

    fn send_raw(&self, raw: &RawTxHex) -> Result<(), CoreError> {
        self.broadcast
            .lock()
            .expect("lock poisoned")
            .push(RawTxHex::new(raw.as_str()));
        Ok(())
    }
}

/// A peer service that records every outbound item instead of sending it
/// anywhere, for assertion in tests.
#[derive(Default)]
pub struct RecordingPeerService {
    sent: Mutex<Vec<(PeerId, WireItem)>>,
}

impl RecordingPeerService {
    pub fn new() -> Self {
        RecordingPeerService {
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Returns and clears everything sent so far, in send order.
    pub fn drain(&self) -> Vec<(PeerId, WireItem)> {
        std::mem::take(&mut *self.sent.lock().expect("lock poisoned"))
    }
}

impl PeerService for RecordingPeerService {
    fn send_item(&self, to: &PeerId, item: WireItem) -> Result<(), CoreError> {
        self.sent.lock().expect("lock poisoned").push((to.clone(), item));
        Ok(())
    }
}
