//! Per-leg Bitcoin obligations and their registry.
//!
//! A [`BtcContract`] is owned exclusively by the manager that created it;
//! the [`ContractRegistry`] holds `Arc` handles alongside it purely for
//! reconciliation (observing state changes from outside the owning
//! manager), never for taking ownership away from it.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::amount::{CurrencyCode, Fraction};
use crate::error::CoreError;
use crate::wire::{BtcAddress, BtcTxId, PeerId};

/// Which side of one leg this contract represents.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContractRole {
    Sender,
    Receiver,
}

/// Lifecycle state of a [`BtcContract`]. Advances monotonically
/// (`Pending -> Active -> Persisted`) except via explicit removal, which
/// can happen from any state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContractState {
    Pending,
    Active,
    Persisted,
    Removed,
}

/// A pending, active or persisted obligation between two neighbouring
/// peers, covering one leg of a swap.
#[derive(Clone, Debug)]
pub struct BtcContract {
    id: u64,
    btc_amount: Fraction,
    fiat_amount: Fraction,
    fee: Fraction,
    price: Fraction,
    currency: CurrencyCode,
    counterparty: PeerId,
    role: ContractRole,
    btc_address: BtcAddress,
    btc_tx_id: Option<BtcTxId>,
    state: ContractState,
}

static NEXT_CONTRACT_ID: AtomicU64 = AtomicU64::new(1);

impl BtcContract {
    /// Creates a new `Pending` contract. `fiat_amount` is derived from
    /// `btc_amount * price` to the precision `Fraction` carries exactly,
    /// per the `fiatAmount == btcAmount * price` invariant.
    pub fn new(
        btc_amount: Fraction,
        fee: Fraction,
        price: Fraction,
        currency: CurrencyCode,
        role: ContractRole,
        counterparty: PeerId,
        btc_address: BtcAddress,
    ) -> Result<Self, CoreError> {
        if !btc_amount.is_positive() {
            return Err(CoreError::Protocol(
                "BtcContract requires a strictly positive btc_amount".into(),
            ));
        }
        let fiat_amount = (btc_amount * price)?;
        Ok(BtcContract {
            id: NEXT_CONTRACT_ID.fetch_add(1, Ordering::Relaxed),
            btc_amount,
            fiat_amount,
            fee,
            price,
            currency,
            counterparty,
            role,
            btc_address,
            btc_tx_id: None,
            state: ContractState::Pending,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn btc_amount(&self) -> Fraction {
        self.btc_amount
    }

    pub fn fiat_amount(&self) -> Fraction {
        self.fiat_amount
    }

    pub fn price(&self) -> Fraction {
        self.price
    }

    pub fn currency(&self) -> &CurrencyCode {
        &self.currency
    }

    pub fn role(&self) -> ContractRole {
        self.role
    }

    pub fn counterparty(&self) -> &PeerId {
        &self.counterparty
    }

    pub fn btc_tx_id(&self) -> Option<&BtcTxId> {
        self.btc_tx_id.as_ref()
    }

    pub fn state(&self) -> ContractState {
        self.state
    }

    /// Updates the settled amount and recomputes `fiat_amount` from
    /// `price`. Legal only before `persist()`.
    pub fn set_btc_amount(&mut self, btc_amount: Fraction) -> Result<(), CoreError> {
        if self.state == ContractState::Persisted || self.state == ContractState::Removed {
            return Err(CoreError::Protocol(
                "cannot change btc_amount on a persisted or removed contract".into(),
            ));
        }
        self.fiat_amount = (btc_amount * self.price)?;
        self.btc_amount = btc_amount;
        Ok(())
    }

    /// Records the Bitcoin transaction id this leg settles on. Legal only
    /// before `persist()`.
    pub fn set_btc_tx_id(&mut self, tx_id: BtcTxId) -> Result<(), CoreError> {
        if self.state == ContractState::Persisted || self.state == ContractState::Removed {
            return Err(CoreError::Protocol(
                "cannot change btc_tx_id on a persisted or removed contract".into(),
            ));
        }
        self.btc_tx_id = Some(tx_id);
        Ok(())
    }

    /// Advances `Pending -> Active`. Idempotent when already `Active`.
    pub fn activate(&mut self) -> Result<(), CoreError> {
        match self.state {
            ContractState::Pending | ContractState::Active => {
                self.state = ContractState::Active;
                Ok(())
            }
            ContractState::Persisted => Ok(()),
            ContractState::Removed => Err(CoreError::Protocol(
                "cannot activate a removed contract".into(),
            )),
        }
    }

    /// Advances `Active -> Persisted`. Requires the contract to already be
    /// `Active`.
    pub fn persist(&mut self) -> Result<(), CoreError> {
        match self.state {
            ContractState::Active => {
                self.state = ContractState::Persisted;
                Ok(())
            }
            ContractState::Persisted => Ok(()),
            _ => Err(CoreError::Protocol(
                "persist() requires an active contract".into(),
            )),
        }
    }

    fn mark_removed(&mut self) {
        self.state = ContractState::Removed;
    }
}

impl fmt::Display for BtcContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BtcContract#{} {:?} {} {} ({:?})",
            self.id, self.role, self.btc_amount, self.currency, self.state
        )
    }
}

/// Global registry of live contracts, holding `Arc` handles alongside the
/// owning manager's copy for reconciliation. Removal marks the contract
/// `Removed` and drops the registry's own reference; it is always safe to
/// call on an id that is no longer present.
#[derive(Default)]
pub struct ContractRegistry {
    contracts: Mutex<HashMap<u64, Arc<Mutex<BtcContract>>>>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        ContractRegistry {
            contracts: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a contract and returns a shared handle to it.
    pub fn insert(&self, contract: BtcContract) -> Arc<Mutex<BtcContract>> {
        let handle = Arc::new(Mutex::new(contract));
        let id = handle.lock().expect("lock poisoned").id();
        self.contracts
            .lock()
            .expect("lock poisoned")
            .insert(id, handle.clone());
        handle
    }

    /// Removes a contract from the registry and marks it `Removed`. Safe
    /// to call on an already-removed or already-absent handle.
    pub fn rm_contract(&self, handle: &Arc<Mutex<BtcContract>>) {
        let id = handle.lock().expect("lock poisoned").id();
        self.contracts.lock().expect("lock poisoned").remove(&id);
        handle.lock().expect("lock poisoned").mark_removed();
    }

    /// Number of contracts currently tracked, for diagnostics.
    pub fn len(&self) -> usize {
        self.contracts.lock().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BtcContract {
        BtcContract::new(
            Fraction::new(1, 1).unwrap(),
            Fraction::ZERO,
            Fraction::new(100, 1).unwrap(),
            CurrencyCode::new("USD"),
            ContractRole::Sender,
            PeerId::new("carol"),
            BtcAddress::new("addrD"),
        )
        .unwrap()
    }

    #[test]
    fn fiat_amount_derived_from_price() {
        let c = sample();
        assert_eq!(c.fiat_amount(), Fraction::new(100, 1).unwrap());
    }

    #[test]
    fn zero_amount_rejected() {
        let err = BtcContract::new(
            Fraction::ZERO,
            Fraction::ZERO,
            Fraction::new(100, 1).unwrap(),
            CurrencyCode::new("USD"),
            ContractRole::Sender,
            PeerId::new("carol"),
            BtcAddress::new("addrD"),
        );
        assert!(err.is_err());
    }

    #[test]
    fn persist_requires_active() {
        let mut c = sample();
        assert!(c.persist().is_err());
        c.activate().unwrap();
        assert!(c.persist().is_ok());
    }

    #[test]
    fn activate_is_idempotent() {
        let mut c = sample();
        c.activate().unwrap();
        c.activate().unwrap();
        assert_eq!(c.state(), ContractState::Active);
    }

    #[test]
    fn registry_remove_marks_removed() {
        let registry = ContractRegistry::new();
        let handle = registry.insert(sample());
        assert_eq!(registry.len(), 1);
        registry.rm_contract(&handle);
        assert_eq!(registry.len(), 0);
        assert_eq!(handle.lock().unwrap().state(), ContractState::Removed);
        // safe to call again
        registry.rm_contract(&handle);
    }
}
