//! Minimal consensus-style encoding for wire items.
//!
//! The wire payload itself stays the colon-delimited ASCII the protocol
//! specifies (see [`crate::wire`]); this module only encodes the item
//! *header* (`virtual_address`, `phase`, `direction`, `payer_id`) the way
//! the rest of this family of crates encodes its own tagged types: a
//! hand-rolled `Encodable`/`Decodable` pair per type instead of a derive
//! macro, so the wire format is exactly what's written here.

use std::io;

/// Errors produced while encoding or decoding a wire item header.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Underlying I/O error while reading or writing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// A tag byte didn't match any known variant.
    #[error("unknown type tag")]
    UnknownType,
    /// A length-prefixed string was not valid UTF-8.
    #[error("invalid UTF-8 in encoded string")]
    InvalidUtf8,
    /// A length prefix exceeded the sanity cap for this field.
    #[error("encoded length too large")]
    LengthTooLarge,
}

/// Types that can be written in the crate's wire header format.
pub trait Encodable {
    /// Writes `self` to `writer`, returning the number of bytes written.
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> io::Result<usize>;
}

/// Types that can be read back from the crate's wire header format.
pub trait Decodable: Sized {
    /// Reads a value of `Self` from `reader`.
    fn consensus_decode<R: io::Read>(reader: &mut R) -> Result<Self, Error>;
}

/// Cap on any individually length-prefixed string, to reject corrupt or
/// hostile length prefixes before allocating.
const MAX_STRING_LEN: u32 = 1 << 20;

impl Encodable for u8 {
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> io::Result<usize> {
        writer.write_all(&[*self])?;
        Ok(1)
    }
}

impl Decodable for u8 {
    fn consensus_decode<R: io::Read>(reader: &mut R) -> Result<Self, Error> {
        let mut buf = [0u8; 1];
        reader.read_exact(&mut buf)?;
        Ok(buf[0])
    }
}

impl Encodable for u32 {
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> io::Result<usize> {
        writer.write_all(&self.to_le_bytes())?;
        Ok(4)
    }
}

impl Decodable for u32 {
    fn consensus_decode<R: io::Read>(reader: &mut R) -> Result<Self, Error> {
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }
}

impl Encodable for String {
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> io::Result<usize> {
        let bytes = self.as_bytes();
        let len = bytes.len() as u32;
        let mut written = len.consensus_encode(writer)?;
        writer.write_all(bytes)?;
        written += bytes.len();
        Ok(written)
    }
}

impl Decodable for String {
    fn consensus_decode<R: io::Read>(reader: &mut R) -> Result<Self, Error> {
        let len = u32::consensus_decode(reader)?;
        if len > MAX_STRING_LEN {
            return Err(Error::LengthTooLarge);
        }
        let mut buf = vec![0u8; len as usize];
        reader.read_exact(&mut buf)?;
        String::from_utf8(buf).map_err(|_| Error::InvalidUtf8)
    }
}

/// Serializes an [`Encodable`] value into a fresh byte vector.
pub fn serialize<T: Encodable>(value: &T) -> Vec<u8> {
    let mut buf = Vec::new();
    value
        .consensus_encode(&mut buf)
        .expect("in-memory Vec<u8> writes are infallible");
    buf
}

/// Deserializes a [`Decodable`] value from a byte slice, requiring every
/// byte to be consumed.
pub fn deserialize<T: Decodable>(data: &[u8]) -> Result<T, Error> {
    let mut cursor = io::Cursor::new(data);
    let value = T::consensus_decode(&mut cursor)?;
    if (cursor.position() as usize) != data.len() {
        return Err(Error::UnknownType);
    }
    Ok(value)
}
