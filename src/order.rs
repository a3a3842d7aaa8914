//! Orders, as referenced (not owned) by the transaction core.
//!
//! Orders belong to the order-book subsystem named as an external
//! collaborator in the Out-of-scope list; the core only ever touches them
//! through the [`OrderBook`] trait and the stable [`OrderId`]/
//! [`VirtualAddress`] keys it hands back.

use crate::amount::{CurrencyCode, Fraction};
use crate::wire::{BtcAddress, OrderId, VirtualAddress};

/// Which side of the book an order rests on.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OrderKind {
    Bid,
    Ask,
}

/// Lifecycle state of an order as seen by the matcher/republisher.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OrderPurpose {
    New,
    PartlyFilled,
    Filled,
    Ignored,
}

/// An order resting on the book. Owned by the order-book subsystem; the
/// transaction core mutates it only through [`OrderBook::update_order`]
/// inside a [`ResetGuard`] bracket.
#[derive(Clone, Debug)]
pub struct Order {
    pub order_id: OrderId,
    pub kind: OrderKind,
    pub currency: CurrencyCode,
    pub price: Fraction,
    pub amount: Fraction,
    pub btc_address: BtcAddress,
    /// Portion of `amount` reserved by in-flight transactions (ask side).
    pub commitment: Fraction,
    /// `true` while a coordinator has an outstanding swap against this
    /// order (bid side).
    pub locked: bool,
    /// `true` once a coordinator-side failure has made this order
    /// unfillable and the matcher should skip it.
    pub ignored: bool,
    pub purpose: OrderPurpose,
}

impl Order {
    /// The portion of `amount` not yet reserved by an in-flight swap.
    pub fn leftover(&self) -> Result<Fraction, crate::error::CoreError> {
        self.amount - self.commitment
    }
}

/// RAII bracket for the order-book's `beginReset`/`endReset` protocol: view
/// mutations happen while this guard is alive, and observers are notified
/// of the end of the reset when it drops, on every exit path (including
/// early return or unwind).
pub struct ResetGuard<'a> {
    book: &'a dyn OrderBook,
}

impl<'a> ResetGuard<'a> {
    /// Only [`OrderBook::begin_reset`] implementations should construct
    /// this guard.
    pub fn new(book: &'a dyn OrderBook) -> Self {
        book.on_begin_reset();
        ResetGuard { book }
    }
}

impl<'a> Drop for ResetGuard<'a> {
    fn drop(&mut self) {
        self.book.on_end_reset();
    }
}

/// The order-book collaborator: matching, persistence and gossip all live
/// outside this crate. The transaction core only finds, updates, removes
/// and republishes orders by id.
pub trait OrderBook: Send + Sync {
    /// Finds the local order matching a virtual address (the remote order
    /// id), if any.
    fn find(&self, addr: &VirtualAddress) -> Option<Order>;

    /// Removes an order from the book entirely.
    fn remove(&self, id: &OrderId);

    /// Writes back a mutated order (partial fill, lock, commitment change).
    fn update_order(&self, order: &Order);

    /// Announces an order's new state to peers.
    fn publish_order(&self, order: &Order);

    /// Called by [`ResetGuard::new`]; not meant to be called directly.
    fn on_begin_reset(&self);

    /// Called when a [`ResetGuard`] drops; not meant to be called directly.
    fn on_end_reset(&self);
}

/// Opens a scoped view-mutation bracket over `book`. Implementations
/// notify observers via `on_begin_reset`/`on_end_reset`.
pub fn begin_reset(book: &dyn OrderBook) -> ResetGuard<'_> {
    ResetGuard::new(book)
}
