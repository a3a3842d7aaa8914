//! Wire items exchanged between transaction managers, and their
//! colon-delimited payload schemas.
//!
//! Every item carries `(virtual_address, phase, direction, payer_id,
//! payload)`. The header fields are structured; the payload is the
//! protocol's native colon-delimited ASCII, whose schema depends on
//! `phase` (see the `parse_*`/`build_*` helpers below).

use std::fmt;
use std::io;

use crate::amount::{CurrencyCode, Fraction};
use crate::consensus::{self, Decodable, Encodable};
use crate::error::CoreError;

/// Opaque identifier naming a transaction's logical path; equal to the
/// remote (matched) order id.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct VirtualAddress(String);

impl VirtualAddress {
    pub fn new(s: impl Into<String>) -> Self {
        VirtualAddress(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque peer identifier on the overlay.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(s: impl Into<String>) -> Self {
        PeerId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque order identifier, assigned by the order-book subsystem.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(s: impl Into<String>) -> Self {
        OrderId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Process-unique key for the manager registry: `"<virtual_address>:<local_id>"`.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(virtual_address: &VirtualAddress, local_id: &str) -> Self {
        TransactionId(format!("{}:{}", virtual_address.as_str(), local_id))
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque Bitcoin address string, as exchanged on the wire. The core never
/// validates script pubkeys; that belongs to the external wallet
/// collaborator.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct BtcAddress(String);

impl BtcAddress {
    pub fn new(s: impl Into<String>) -> Self {
        BtcAddress(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BtcAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque raw Bitcoin transaction id string, as exchanged on the wire.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct BtcTxId(String);

impl BtcTxId {
    pub fn new(s: impl Into<String>) -> Self {
        BtcTxId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BtcTxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Signed raw transaction hex, held by the payee/hop until broadcast.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RawTxHex(String);

impl RawTxHex {
    pub fn new(s: impl Into<String>) -> Self {
        RawTxHex(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Phase of a two-phase-commit transaction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TxPhase {
    Init,
    Query,
    VoteYes,
    VoteNo,
    Commit,
    AbortRequest,
    Abort,
}

impl fmt::Display for TxPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxPhase::Init => "INIT",
            TxPhase::Query => "QUERY",
            TxPhase::VoteYes => "VOTE_YES",
            TxPhase::VoteNo => "VOTE_NO",
            TxPhase::Commit => "COMMIT",
            TxPhase::AbortRequest => "ABORT_REQUEST",
            TxPhase::Abort => "ABORT",
        };
        write!(f, "{}", s)
    }
}

impl Encodable for TxPhase {
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> io::Result<usize> {
        let tag: u8 = match self {
            TxPhase::Init => 0x00,
            TxPhase::Query => 0x01,
            TxPhase::VoteYes => 0x02,
            TxPhase::VoteNo => 0x03,
            TxPhase::Commit => 0x04,
            TxPhase::AbortRequest => 0x05,
            TxPhase::Abort => 0x06,
        };
        tag.consensus_encode(writer)
    }
}

impl Decodable for TxPhase {
    fn consensus_decode<R: io::Read>(reader: &mut R) -> Result<Self, consensus::Error> {
        Ok(match u8::consensus_decode(reader)? {
            0x00 => TxPhase::Init,
            0x01 => TxPhase::Query,
            0x02 => TxPhase::VoteYes,
            0x03 => TxPhase::VoteNo,
            0x04 => TxPhase::Commit,
            0x05 => TxPhase::AbortRequest,
            0x06 => TxPhase::Abort,
            _ => return Err(consensus::Error::UnknownType),
        })
    }
}

/// Direction a wire item travels: from the payee toward the coordinator
/// (`Client`) or from the coordinator toward the payee (`Server`).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    Client,
    Server,
}

impl Encodable for Direction {
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> io::Result<usize> {
        let tag: u8 = match self {
            Direction::Client => 0x00,
            Direction::Server => 0x01,
        };
        tag.consensus_encode(writer)
    }
}

impl Decodable for Direction {
    fn consensus_decode<R: io::Read>(reader: &mut R) -> Result<Self, consensus::Error> {
        Ok(match u8::consensus_decode(reader)? {
            0x00 => Direction::Client,
            0x01 => Direction::Server,
            _ => return Err(consensus::Error::UnknownType),
        })
    }
}

/// A transaction-protocol wire item.
#[derive(Clone, Debug)]
pub struct WireItem {
    pub virtual_address: VirtualAddress,
    pub phase: TxPhase,
    pub direction: Direction,
    pub payer_id: String,
    pub payload: String,
}

impl WireItem {
    /// Builds an item with the given header and payload, routed to `peer`.
    pub fn new(
        virtual_address: VirtualAddress,
        phase: TxPhase,
        direction: Direction,
        payer_id: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        WireItem {
            virtual_address,
            phase,
            direction,
            payer_id: payer_id.into(),
            payload: payload.into(),
        }
    }
}

impl Encodable for WireItem {
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> io::Result<usize> {
        let mut len = self.virtual_address.0.clone().consensus_encode(writer)?;
        len += self.phase.consensus_encode(writer)?;
        len += self.direction.consensus_encode(writer)?;
        len += self.payer_id.clone().consensus_encode(writer)?;
        len += self.payload.clone().consensus_encode(writer)?;
        Ok(len)
    }
}

impl Decodable for WireItem {
    fn consensus_decode<R: io::Read>(reader: &mut R) -> Result<Self, consensus::Error> {
        Ok(WireItem {
            virtual_address: VirtualAddress(String::consensus_decode(reader)?),
            phase: TxPhase::consensus_decode(reader)?,
            direction: Direction::consensus_decode(reader)?,
            payer_id: String::consensus_decode(reader)?,
            payload: String::consensus_decode(reader)?,
        })
    }
}

/// Parsed `QUERY` payload: `fiatAmount:currency:destBtcAddress:btcAmount:fee`.
pub struct QueryPayload {
    pub fiat_amount: Fraction,
    pub currency: CurrencyCode,
    pub dest_btc_address: BtcAddress,
    pub btc_amount: Fraction,
    pub fee: Fraction,
}

/// Parses a `QUERY` payload: `fiatAmount:currency:destBtcAddress:btcAmount:fee`.
pub fn parse_query_payload(payload: &str) -> Result<QueryPayload, CoreError> {
    let fields: Vec<&str> = payload.split(':').collect();
    if fields.len() < 5 {
        return Err(CoreError::Protocol(format!(
            "malformed QUERY payload: {}",
            payload
        )));
    }
    let fiat_amount = fields[0]
        .parse()
        .map_err(|_| CoreError::Protocol(format!("bad fiatAmount in QUERY: {}", payload)))?;
    let currency = CurrencyCode::new(fields[1]);
    let dest_btc_address = BtcAddress::new(fields[2]);
    let btc_amount = fields[3]
        .parse()
        .map_err(|_| CoreError::Protocol(format!("bad btcAmount in QUERY: {}", payload)))?;
    let fee = fields[4]
        .parse()
        .map_err(|_| CoreError::Protocol(format!("bad fee in QUERY: {}", payload)))?;
    Ok(QueryPayload {
        fiat_amount,
        currency,
        dest_btc_address,
        btc_amount,
        fee,
    })
}

/// Builds the `QUERY` payload: `fiatAmount:currency:destBtcAddress:btcAmount:fee`.
pub fn build_query_payload(
    fiat_amount: Fraction,
    currency: &CurrencyCode,
    dest_btc_address: &BtcAddress,
    btc_amount: Fraction,
    fee: Fraction,
) -> String {
    format!(
        "{}:{}:{}:{}:{}",
        fiat_amount, currency, dest_btc_address, btc_amount, fee
    )
}

/// Parsed `VOTE_YES`/`VOTE_NO` payload: `btcAmount:btcTxId`.
pub struct VotePayload {
    pub btc_amount: Fraction,
    pub btc_tx_id: BtcTxId,
}

/// Parses a `VOTE_YES`/`VOTE_NO` payload: `btcAmount:btcTxId`.
pub fn parse_vote_payload(payload: &str) -> Result<VotePayload, CoreError> {
    let fields: Vec<&str> = payload.split(':').collect();
    if fields.len() != 2 {
        return Err(CoreError::Protocol(format!(
            "malformed VOTE payload: {}",
            payload
        )));
    }
    let btc_amount = fields[0]
        .parse()
        .map_err(|_| CoreError::Protocol(format!("bad btcAmount in VOTE: {}", payload)))?;
    Ok(VotePayload {
        btc_amount,
        btc_tx_id: BtcTxId::new(fields[1]),
    })
}

/// Builds a `VOTE_YES` payload: `btcAmount:btcTxId`.
pub fn build_vote_yes_payload(btc_amount: Fraction, btc_tx_id: &BtcTxId) -> String {
    format!("{}:{}", btc_amount, btc_tx_id)
}

/// The fixed `VOTE_NO` payload.
pub const VOTE_NO_PAYLOAD: &str = "0/1:VOTE_NO";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_payload_round_trips() {
        let payload = "100/1:USD:addrD:1/1:0/1";
        let parsed = parse_query_payload(payload).unwrap();
        assert_eq!(parsed.fiat_amount, Fraction::new(100, 1).unwrap());
        assert_eq!(parsed.currency.symbol(), "USD");
        assert_eq!(parsed.dest_btc_address.as_str(), "addrD");
        assert_eq!(parsed.btc_amount, Fraction::new(1, 1).unwrap());
        let rebuilt = build_query_payload(
            parsed.fiat_amount,
            &parsed.currency,
            &parsed.dest_btc_address,
            parsed.btc_amount,
            parsed.fee,
        );
        assert_eq!(rebuilt, payload);
    }

    #[test]
    fn vote_payload_round_trips() {
        let payload = "1/1:txABCD";
        let parsed = parse_vote_payload(payload).unwrap();
        assert_eq!(parsed.btc_amount, Fraction::new(1, 1).unwrap());
        assert_eq!(parsed.btc_tx_id.as_str(), "txABCD");
        assert_eq!(
            build_vote_yes_payload(parsed.btc_amount, &parsed.btc_tx_id),
            payload
        );
    }

    #[test]
    fn wire_item_header_round_trips() {
        let item = WireItem::new(
            VirtualAddress::new("ask-1"),
            TxPhase::Query,
            Direction::Server,
            "bid-1",
            "100/1:USD:addrD:1/1:0/1",
        );
        let encoded = consensus::serialize(&item);
        let decoded: WireItem = consensus::deserialize(&encoded).unwrap();
        assert_eq!(decoded.virtual_address, item.virtual_address);
        assert_eq!(decoded.phase, item.phase);
        assert_eq!(decoded.direction, item.direction);
        assert_eq!(decoded.payer_id, item.payer_id);
        assert_eq!(decoded.payload, item.payload);
    }
}
