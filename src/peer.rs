//! Peer-to-peer unicast collaborator. Serialization framing and transport
//! live outside this crate; the core only ever asks for a best-effort,
//! per-destination-ordered send.

use crate::error::CoreError;
use crate::wire::WireItem;

/// The peer-to-peer service collaborator.
pub trait PeerService: Send + Sync {
    /// Sends `item` to the peer named in `item.payer_id`'s counterpart.
    /// Callers resolve the destination peer before calling this (the
    /// [`WireItem`] header does not itself carry a transport address).
    fn send_item(&self, to: &crate::wire::PeerId, item: WireItem) -> Result<(), CoreError>;
}
