//! Bitcoin wallet collaborator: address allocation, raw-transaction
//! construction and broadcast. The actual wallet/raw-transaction builder
//! lives outside this crate, per the Out-of-scope list.

use crate::amount::Fraction;
use crate::error::CoreError;
use crate::wire::{BtcAddress, BtcTxId, RawTxHex};

/// The Bitcoin wallet collaborator.
pub trait Wallet: Send + Sync {
    /// Allocates a fresh receive address for the coordinator's incoming
    /// funds. Returns [`CoreError::Wallet`] if none could be allocated.
    fn new_address(&self) -> Result<BtcAddress, CoreError>;

    /// Builds and signs a raw transaction moving `amount` from `from` to
    /// `to`, returning its hex encoding and the resulting transaction id.
    fn mk_raw_tx(
        &self,
        amount: Fraction,
        from: &BtcAddress,
        to: &BtcAddress,
    ) -> Result<(RawTxHex, BtcTxId), CoreError>;

    /// Broadcasts a previously built raw transaction.
    fn send_raw(&self, raw: &RawTxHex) -> Result<(), CoreError>;
}
