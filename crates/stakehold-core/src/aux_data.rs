//! Auxiliary payload routing.
//!
//! A single opaque byte blob travels through every claim and claimable call.
//! Its header maps plugin addresses to sub-ranges of a shared payload so each
//! plugin can pick out its own slice without the ledger understanding it.
//!
//! Wire layout (integers little-endian):
//!
//! ```text
//! u32           entry count N
//! N x 28 bytes  { address: [u8; 20], start: u32, length: u32 }
//! u32           payload length L
//! L bytes       payload
//! ```

use stakehold_types::address::ADDRESS_LEN;
use stakehold_types::Address;
use thiserror::Error;

/// Size of one encoded header entry: 28 bytes.
pub const HEADER_ENTRY_SIZE: usize = ADDRESS_LEN + 4 + 4;

/// Size of a length prefix: 4 bytes.
const LEN_PREFIX_SIZE: usize = 4;

/// Errors raised while decoding or slicing auxiliary data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuxDataError {
    /// The blob is not a valid header + payload encoding.
    #[error("malformed auxiliary data: {0}")]
    MalformedData(String),
    /// A header entry points past the end of the payload.
    #[error("slice [{start}, {start}+{length}) exceeds payload of {payload_len} bytes")]
    SliceOutOfBounds {
        /// Start offset of the entry.
        start: u32,
        /// Length of the entry.
        length: u32,
        /// Actual payload length.
        payload_len: usize,
    },
}

/// One header entry: which recipient owns which payload range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuxHeader {
    /// Recipient (plugin) address.
    pub address: Address,
    /// Offset into the payload.
    pub start: u32,
    /// Number of bytes.
    pub length: u32,
}

impl AuxHeader {
    fn to_bytes(self) -> [u8; HEADER_ENTRY_SIZE] {
        let mut bytes = [0u8; HEADER_ENTRY_SIZE];
        bytes[0..ADDRESS_LEN].copy_from_slice(self.address.as_bytes());
        bytes[ADDRESS_LEN..ADDRESS_LEN + 4].copy_from_slice(&self.start.to_le_bytes());
        bytes[ADDRESS_LEN + 4..].copy_from_slice(&self.length.to_le_bytes());
        bytes
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, AuxDataError> {
        if bytes.len() < HEADER_ENTRY_SIZE {
            return Err(AuxDataError::MalformedData(format!(
                "header entry too short: {} bytes",
                bytes.len()
            )));
        }
        let address = Address::from_slice(&bytes[0..ADDRESS_LEN])
            .map_err(|e| AuxDataError::MalformedData(e.to_string()))?;
        let start = read_u32(&bytes[ADDRESS_LEN..ADDRESS_LEN + 4]);
        let length = read_u32(&bytes[ADDRESS_LEN + 4..HEADER_ENTRY_SIZE]);
        Ok(Self {
            address,
            start,
            length,
        })
    }

    fn end(&self) -> u64 {
        self.start as u64 + self.length as u64
    }
}

/// Decoded auxiliary data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuxData {
    /// Header entries in encoded order.
    pub header: Vec<AuxHeader>,
    /// Shared payload buffer.
    pub payload: Vec<u8>,
}

impl AuxData {
    /// Serializes to the wire layout.
    ///
    /// Fails if the entry count or payload length does not fit in a `u32`.
    pub fn to_bytes(&self) -> Result<Vec<u8>, AuxDataError> {
        let count = wire_len(self.header.len(), "entry count")?;
        let payload_len = wire_len(self.payload.len(), "payload length")?;
        let mut out = Vec::with_capacity(
            2 * LEN_PREFIX_SIZE + self.header.len() * HEADER_ENTRY_SIZE + self.payload.len(),
        );
        out.extend_from_slice(&count.to_le_bytes());
        for entry in &self.header {
            out.extend_from_slice(&entry.to_bytes());
        }
        out.extend_from_slice(&payload_len.to_le_bytes());
        out.extend_from_slice(&self.payload);
        Ok(out)
    }

    /// Returns the designated slice for `address`, if a header entry names it.
    pub fn slice_for(&self, address: &Address) -> Result<Option<&[u8]>, AuxDataError> {
        match self.header.iter().find(|h| h.address == *address) {
            None => Ok(None),
            Some(entry) => slice(&self.payload, entry).map(Some),
        }
    }
}

/// Builds auxiliary data by appending one contiguous part per recipient.
#[derive(Debug, Clone, Default)]
pub struct AuxDataBuilder {
    data: AuxData,
}

impl AuxDataBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `bytes` to the payload and a header entry naming `address`.
    ///
    /// Fails once the payload would no longer be addressable with `u32`
    /// offsets.
    pub fn part(mut self, address: Address, bytes: &[u8]) -> Result<Self, AuxDataError> {
        let start = wire_len(self.data.payload.len(), "part start")?;
        let length = wire_len(bytes.len(), "part length")?;
        start.checked_add(length).ok_or_else(|| {
            AuxDataError::MalformedData(format!(
                "part of {} bytes at offset {} overflows u32",
                length, start
            ))
        })?;
        self.data.header.push(AuxHeader {
            address,
            start,
            length,
        });
        self.data.payload.extend_from_slice(bytes);
        Ok(self)
    }

    /// Returns the decoded form.
    pub fn build(self) -> AuxData {
        self.data
    }

    /// Returns the encoded form.
    pub fn encode(self) -> Result<Vec<u8>, AuxDataError> {
        self.data.to_bytes()
    }
}

/// Decodes `data` into header and payload.
pub fn parse(data: &[u8]) -> Result<AuxData, AuxDataError> {
    let count = read_prefix(data, 0, "entry count")? as usize;
    let header_end = count
        .checked_mul(HEADER_ENTRY_SIZE)
        .and_then(|n| n.checked_add(LEN_PREFIX_SIZE))
        .filter(|end| *end <= data.len())
        .ok_or_else(|| {
            AuxDataError::MalformedData(format!(
                "{} header entries do not fit in {} bytes",
                count,
                data.len()
            ))
        })?;

    let header = data[LEN_PREFIX_SIZE..header_end]
        .chunks_exact(HEADER_ENTRY_SIZE)
        .map(AuxHeader::from_bytes)
        .collect::<Result<Vec<_>, _>>()?;

    let payload_len = read_prefix(data, header_end, "payload length")? as usize;
    let payload_start = header_end + LEN_PREFIX_SIZE;
    let remaining = data.len() - payload_start;
    if payload_len != remaining {
        return Err(AuxDataError::MalformedData(format!(
            "payload length {} does not match {} remaining bytes",
            payload_len, remaining
        )));
    }

    Ok(AuxData {
        header,
        payload: data[payload_start..].to_vec(),
    })
}

/// Returns the bytes `data` designates for `address`.
///
/// Empty `data` and an address with no header entry both yield an empty
/// slice. The first matching entry wins.
pub fn select_relevant_bytes(data: &[u8], address: &Address) -> Result<Vec<u8>, AuxDataError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let decoded = parse(data)?;
    Ok(decoded
        .slice_for(address)?
        .map(<[u8]>::to_vec)
        .unwrap_or_default())
}

fn slice<'a>(payload: &'a [u8], entry: &AuxHeader) -> Result<&'a [u8], AuxDataError> {
    if entry.end() > payload.len() as u64 {
        return Err(AuxDataError::SliceOutOfBounds {
            start: entry.start,
            length: entry.length,
            payload_len: payload.len(),
        });
    }
    Ok(&payload[entry.start as usize..entry.end() as usize])
}

fn wire_len(len: usize, what: &str) -> Result<u32, AuxDataError> {
    u32::try_from(len)
        .map_err(|_| AuxDataError::MalformedData(format!("{} {} exceeds u32::MAX", what, len)))
}

fn read_prefix(data: &[u8], offset: usize, what: &str) -> Result<u32, AuxDataError> {
    data.get(offset..offset + LEN_PREFIX_SIZE)
        .map(read_u32)
        .ok_or_else(|| AuxDataError::MalformedData(format!("truncated {} at offset {}", what, offset)))
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::new([byte; 20])
    }

    fn encode_one(address: Address, bytes: &[u8]) -> Vec<u8> {
        AuxDataBuilder::new()
            .part(address, bytes)
            .and_then(AuxDataBuilder::encode)
            .unwrap()
    }

    #[test]
    fn empty_data_selects_nothing() {
        assert!(select_relevant_bytes(&[], &addr(1)).unwrap().is_empty());
    }

    #[test]
    fn selects_designated_slice() {
        let data = AuxDataBuilder::new()
            .part(addr(1), b"first")
            .and_then(|b| b.part(addr(2), b"second"))
            .and_then(AuxDataBuilder::encode)
            .unwrap();
        assert_eq!(select_relevant_bytes(&data, &addr(1)).unwrap(), b"first");
        assert_eq!(select_relevant_bytes(&data, &addr(2)).unwrap(), b"second");
    }

    #[test]
    fn absent_address_selects_nothing() {
        let data = encode_one(addr(1), b"x");
        assert!(select_relevant_bytes(&data, &addr(9)).unwrap().is_empty());
    }

    #[test]
    fn first_matching_entry_wins() {
        let data = AuxDataBuilder::new()
            .part(addr(1), b"one")
            .and_then(|b| b.part(addr(1), b"two"))
            .and_then(AuxDataBuilder::encode)
            .unwrap();
        assert_eq!(select_relevant_bytes(&data, &addr(1)).unwrap(), b"one");
    }

    #[test]
    fn out_of_bounds_entry_is_rejected() {
        let data = AuxData {
            header: vec![AuxHeader {
                address: addr(1),
                start: 2,
                length: 4,
            }],
            payload: b"abcd".to_vec(),
        }
        .to_bytes()
        .unwrap();
        assert_eq!(
            select_relevant_bytes(&data, &addr(1)),
            Err(AuxDataError::SliceOutOfBounds {
                start: 2,
                length: 4,
                payload_len: 4
            })
        );
        // entries for other recipients are not validated
        assert!(select_relevant_bytes(&data, &addr(2)).unwrap().is_empty());
    }

    #[test]
    fn parse_rejects_truncated_header() {
        let mut data = encode_one(addr(1), b"abc");
        data.truncate(10);
        assert!(matches!(parse(&data), Err(AuxDataError::MalformedData(_))));
    }

    #[test]
    fn parse_rejects_trailing_bytes() {
        let mut data = encode_one(addr(1), b"abc");
        data.push(0);
        assert!(matches!(parse(&data), Err(AuxDataError::MalformedData(_))));
    }

    #[test]
    fn parse_rejects_huge_entry_count() {
        let data = u32::MAX.to_le_bytes();
        assert!(matches!(parse(&data), Err(AuxDataError::MalformedData(_))));
    }

    #[test]
    fn empty_header_and_payload_decode() {
        let data = AuxData::default().to_bytes().unwrap();
        assert_eq!(data.len(), 8);
        assert_eq!(parse(&data).unwrap(), AuxData::default());
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn lengths_beyond_u32_are_rejected() {
        assert_eq!(wire_len(u32::MAX as usize, "payload length").unwrap(), u32::MAX);
        let too_long = (u32::MAX as u64 + 1) as usize;
        assert!(matches!(
            wire_len(too_long, "payload length"),
            Err(AuxDataError::MalformedData(_))
        ));
    }
}
