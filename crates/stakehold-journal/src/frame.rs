//! On-disk layout.
//!
//! ```text
//! file   := header frame*
//! header := "SHJ1" version:u16 flags:u16 reserved:[u8; 8]     (16 bytes)
//! frame  := kind:u8 reserved:[u8; 3] len:u32 payload:[u8; len] (8 + len bytes)
//! ```
//!
//! Integers are little-endian. Event frames carry one `EventRecord` as JSON.

use crate::errors::JournalError;

/// File magic.
pub const MAGIC: [u8; 4] = *b"SHJ1";

/// Format version written and accepted.
pub const VERSION: u16 = 1;

/// Size of the file header.
pub const FILE_HEADER_LEN: usize = 16;

/// Size of a frame header.
pub const FRAME_HEADER_LEN: usize = 8;

/// Largest payload a frame may carry (1 MiB).
pub const MAX_FRAME_LEN: u32 = 1 << 20;

/// Encodes the file header.
pub fn encode_file_header() -> [u8; FILE_HEADER_LEN] {
    let mut out = [0u8; FILE_HEADER_LEN];
    out[..4].copy_from_slice(&MAGIC);
    out[4..6].copy_from_slice(&VERSION.to_le_bytes());
    out
}

/// Validates a file header.
pub fn check_file_header(bytes: &[u8; FILE_HEADER_LEN]) -> Result<(), JournalError> {
    if bytes[..4] != MAGIC {
        return Err(JournalError::BadHeader(format!(
            "magic {:02x?}",
            &bytes[..4]
        )));
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != VERSION {
        return Err(JournalError::BadHeader(format!(
            "unsupported version {version}"
        )));
    }
    if bytes[6..].iter().any(|b| *b != 0) {
        return Err(JournalError::BadHeader(
            "flags and reserved bytes must be zero".to_string(),
        ));
    }
    Ok(())
}

/// What a frame carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// One JSON-encoded `EventRecord`.
    Event,
    /// A kind this version does not know; readers skip it.
    Other(u8),
}

impl From<u8> for FrameKind {
    fn from(byte: u8) -> Self {
        match byte {
            0x01 => FrameKind::Event,
            other => FrameKind::Other(other),
        }
    }
}

impl From<FrameKind> for u8 {
    fn from(kind: FrameKind) -> Self {
        match kind {
            FrameKind::Event => 0x01,
            FrameKind::Other(byte) => byte,
        }
    }
}

/// Header preceding every frame payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Payload kind.
    pub kind: FrameKind,
    /// Payload length.
    pub len: u32,
}

impl FrameHeader {
    /// Builds a header for a payload of `len` bytes.
    pub fn for_payload(kind: FrameKind, len: usize) -> Result<Self, JournalError> {
        match u32::try_from(len) {
            Ok(len) if len <= MAX_FRAME_LEN => Ok(Self { kind, len }),
            _ => Err(JournalError::Oversized {
                len,
                max: MAX_FRAME_LEN,
            }),
        }
    }

    /// Encodes the header.
    pub fn encode(&self) -> [u8; FRAME_HEADER_LEN] {
        let mut out = [0u8; FRAME_HEADER_LEN];
        out[0] = self.kind.into();
        out[4..].copy_from_slice(&self.len.to_le_bytes());
        out
    }

    /// Decodes the header of the frame starting at `offset`.
    pub fn decode(bytes: &[u8; FRAME_HEADER_LEN], offset: u64) -> Result<Self, JournalError> {
        let bad = |reason: String| JournalError::BadFrame { offset, reason };
        if bytes[1..4].iter().any(|b| *b != 0) {
            return Err(bad("reserved bytes must be zero".to_string()));
        }
        let len = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if len > MAX_FRAME_LEN {
            return Err(bad(format!("length {len} exceeds {MAX_FRAME_LEN}")));
        }
        Ok(Self {
            kind: FrameKind::from(bytes[0]),
            len,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_header_is_accepted() {
        let header = encode_file_header();
        assert_eq!(&header[..4], b"SHJ1");
        check_file_header(&header).unwrap();
    }

    #[test]
    fn foreign_magic_is_rejected() {
        let mut header = encode_file_header();
        header[..4].copy_from_slice(b"NRJ1");
        assert!(matches!(
            check_file_header(&header),
            Err(JournalError::BadHeader(_))
        ));
    }

    #[test]
    fn future_version_is_rejected() {
        let mut header = encode_file_header();
        header[4] = 2;
        let err = check_file_header(&header).unwrap_err();
        assert!(err.to_string().contains("version 2"));
    }

    #[test]
    fn non_zero_flags_are_rejected() {
        let mut header = encode_file_header();
        header[6] = 1;
        assert!(check_file_header(&header).is_err());
    }

    #[test]
    fn frame_header_encodes_kind_and_length() {
        let header = FrameHeader::for_payload(FrameKind::Event, 300).unwrap();
        let bytes = header.encode();
        assert_eq!(bytes[0], 0x01);
        assert_eq!(FrameHeader::decode(&bytes, 16).unwrap(), header);
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let err = FrameHeader::for_payload(FrameKind::Event, MAX_FRAME_LEN as usize + 1);
        assert!(matches!(err, Err(JournalError::Oversized { .. })));
    }

    #[test]
    fn decode_reports_offset() {
        let mut bytes = FrameHeader::for_payload(FrameKind::Event, 4).unwrap().encode();
        bytes[2] = 9;
        match FrameHeader::decode(&bytes, 40) {
            Err(JournalError::BadFrame { offset, .. }) => assert_eq!(offset, 40),
            other => panic!("expected BadFrame, got {other:?}"),
        }
    }

    #[test]
    fn unknown_kind_survives() {
        assert_eq!(u8::from(FrameKind::from(0x7f)), 0x7f);
    }
}
