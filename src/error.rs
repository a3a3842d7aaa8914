//! Crate-wide error taxonomy for the transaction core.
//!
//! Errors are grouped by the five kinds named in the transaction-manager
//! design: protocol violations, economic rejections, routing failures,
//! wallet failures, and fatal dispatch errors. Protocol and Economic kinds
//! never escape a manager as a bare `Err` during normal operation (they
//! drive a `VoteNo` or `abort` instead, see `manager::Disposition`), but
//! they are still represented here because the collaborator traits and the
//! codec can fail for the same underlying reasons during setup.

use std::error;

/// Errors produced anywhere in the transaction core.
#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    /// Inbound item violated the phase-transition legality matrix, carried
    /// an unparseable payload, or reported a currency mismatch.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Inbound request failed on economic grounds: insufficient peer
    /// credit, or a price that undercuts the resting order.
    #[error("economic rejection: {0}")]
    Economic(String),

    /// No next hop, or no tunnel entry, for a virtual address.
    #[error("routing failure: {0}")]
    Routing(String),

    /// Wallet collaborator failed to allocate an address, build a raw
    /// transaction, or broadcast one.
    #[error("wallet failure: {0}")]
    Wallet(String),

    /// An item arrived bearing an unknown phase, or a phase the receiving
    /// role can never legally see. This is a programming error in a peer
    /// or in the dispatch wiring, not a recoverable protocol condition.
    #[error("fatal protocol error: {0}")]
    Fatal(String),

    /// Escape hatch for errors raised by collaborator implementations that
    /// don't fit the taxonomy above.
    #[error("core error: {0}")]
    Other(Box<dyn error::Error + Send + Sync>),
}

impl CoreError {
    /// Wraps an arbitrary error as [`CoreError::Other`].
    pub fn other<E>(error: E) -> Self
    where
        E: Into<Box<dyn error::Error + Send + Sync>>,
    {
        Self::Other(error.into())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CoreError>;
