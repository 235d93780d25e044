use thiserror::Error;

/// Errors raised while writing or reading a journal.
#[derive(Error, Debug)]
pub enum JournalError {
    /// Underlying file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The 16-byte file header is missing or not a stakehold journal.
    #[error("not a stakehold journal: {0}")]
    BadHeader(String),
    /// A frame header is malformed.
    #[error("bad frame at offset {offset}: {reason}")]
    BadFrame {
        /// Offset of the frame header.
        offset: u64,
        /// What is wrong with it.
        reason: String,
    },
    /// A record exceeds the frame size limit.
    #[error("record of {len} bytes exceeds the {max} byte frame limit")]
    Oversized {
        /// Encoded record length.
        len: usize,
        /// Frame size limit.
        max: u32,
    },
    /// An event frame did not hold a valid event record.
    #[error("undecodable event record: {0}")]
    Decode(#[from] serde_json::Error),
    /// The file ends in the middle of a frame (strict mode only).
    #[error("journal truncated inside the frame at offset {offset}")]
    Truncated {
        /// Offset of the incomplete frame.
        offset: u64,
    },
}
