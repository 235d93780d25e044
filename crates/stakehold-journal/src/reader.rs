use crate::errors::JournalError;
use crate::filter::EventFilter;
use crate::frame::{self, FrameHeader, FrameKind, FILE_HEADER_LEN, FRAME_HEADER_LEN};
use stakehold_core::EventRecord;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use tracing::warn;

/// How the reader treats a file that ends inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// A partial trailing frame is an error.
    Strict,
    /// A partial trailing frame is treated as the end of the journal.
    Permissive,
}

/// Sequential reader over a journal file.
pub struct JournalReader {
    input: BufReader<File>,
    mode: ReadMode,
    offset: u64,
}

impl JournalReader {
    /// Opens `path` and validates its header.
    pub fn open<P: AsRef<Path>>(path: P, mode: ReadMode) -> Result<Self, JournalError> {
        let mut input = BufReader::new(File::open(path)?);
        let mut header = [0u8; FILE_HEADER_LEN];
        if read_up_to(&mut input, &mut header)? < FILE_HEADER_LEN {
            return Err(JournalError::BadHeader("file shorter than header".to_string()));
        }
        frame::check_file_header(&header)?;
        Ok(Self {
            input,
            mode,
            offset: FILE_HEADER_LEN as u64,
        })
    }

    /// Byte offset of the next frame.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Reads the next frame of any kind; `None` at the end of the journal.
    pub fn next_frame(&mut self) -> Result<Option<(FrameKind, Vec<u8>)>, JournalError> {
        let start = self.offset;
        let mut raw = [0u8; FRAME_HEADER_LEN];
        match read_up_to(&mut self.input, &mut raw)? {
            0 => return Ok(None),
            n if n < FRAME_HEADER_LEN => return self.truncated(start),
            _ => {}
        }
        let header = FrameHeader::decode(&raw, start)?;
        let mut payload = vec![0u8; header.len as usize];
        if read_up_to(&mut self.input, &mut payload)? < payload.len() {
            return self.truncated(start);
        }
        self.offset = start + FRAME_HEADER_LEN as u64 + u64::from(header.len);
        Ok(Some((header.kind, payload)))
    }

    /// Reads the next event record, skipping frames of unknown kind.
    pub fn next_event(&mut self) -> Result<Option<EventRecord>, JournalError> {
        while let Some((kind, payload)) = self.next_frame()? {
            match kind {
                FrameKind::Event => return Ok(Some(serde_json::from_slice(&payload)?)),
                FrameKind::Other(tag) => {
                    warn!(tag, offset = self.offset, "skipping unknown frame kind");
                }
            }
        }
        Ok(None)
    }

    /// Reads the remaining events that pass `filter`, stopping after `limit`
    /// matches when given.
    pub fn collect_matching(
        &mut self,
        filter: &dyn EventFilter,
        limit: Option<usize>,
    ) -> Result<Vec<EventRecord>, JournalError> {
        let mut out = Vec::new();
        while limit.map_or(true, |max| out.len() < max) {
            match self.next_event()? {
                Some(record) if filter.matches(&record) => out.push(record),
                Some(_) => {}
                None => break,
            }
        }
        Ok(out)
    }

    fn truncated<T>(&self, offset: u64) -> Result<Option<T>, JournalError> {
        match self.mode {
            ReadMode::Permissive => {
                warn!(offset, "journal ends inside a frame; stopping");
                Ok(None)
            }
            ReadMode::Strict => Err(JournalError::Truncated { offset }),
        }
    }
}

impl Iterator for JournalReader {
    type Item = Result<EventRecord, JournalError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event().transpose()
    }
}

/// Fills `buf` as far as the input allows; returns the number of bytes read.
fn read_up_to(input: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
