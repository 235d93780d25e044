use crate::errors::JournalError;
use crate::frame::{self, FrameHeader, FrameKind, FILE_HEADER_LEN};
use stakehold_core::EventRecord;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::debug;

/// How [`JournalWriter::open`] treats the file.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// `fsync` after every appended frame.
    pub sync: bool,
    /// Discard existing records instead of appending after them.
    pub truncate: bool,
}

/// Appends event records to a journal file.
///
/// A missing or empty file is initialised with a header. An existing file
/// must start with a valid header; new frames go after the last byte.
pub struct JournalWriter {
    file: File,
    sync: bool,
    appended: usize,
}

impl JournalWriter {
    /// Opens or creates the journal at `path`.
    pub fn open<P: AsRef<Path>>(path: P, options: WriteOptions) -> Result<Self, JournalError> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path.as_ref())?;

        match file.metadata()?.len() {
            0 => {
                file.write_all(&frame::encode_file_header())?;
            }
            len if len < FILE_HEADER_LEN as u64 => {
                return Err(JournalError::BadHeader(format!("file is only {len} bytes")));
            }
            _ => {
                let mut header = [0u8; FILE_HEADER_LEN];
                file.seek(SeekFrom::Start(0))?;
                file.read_exact(&mut header)?;
                frame::check_file_header(&header)?;
                if options.truncate {
                    file.set_len(FILE_HEADER_LEN as u64)?;
                }
            }
        }
        file.seek(SeekFrom::End(0))?;
        debug!(path = %path.as_ref().display(), "journal opened for append");

        Ok(Self {
            file,
            sync: options.sync,
            appended: 0,
        })
    }

    /// Appends one event record.
    pub fn append(&mut self, record: &EventRecord) -> Result<(), JournalError> {
        let payload = serde_json::to_vec(record)?;
        self.append_raw(FrameKind::Event, &payload)
    }

    /// Appends every record in order.
    pub fn append_all<'a, I>(&mut self, records: I) -> Result<usize, JournalError>
    where
        I: IntoIterator<Item = &'a EventRecord>,
    {
        let mut count = 0;
        for record in records {
            self.append(record)?;
            count += 1;
        }
        Ok(count)
    }

    /// Appends a frame with an arbitrary kind and payload.
    pub fn append_raw(&mut self, kind: FrameKind, payload: &[u8]) -> Result<(), JournalError> {
        let header = FrameHeader::for_payload(kind, payload.len())?;
        self.file.write_all(&header.encode())?;
        self.file.write_all(payload)?;
        if self.sync {
            self.file.sync_data()?;
        }
        self.appended += 1;
        Ok(())
    }

    /// Frames appended through this writer.
    pub fn appended(&self) -> usize {
        self.appended
    }

    /// Flushes and closes the journal.
    pub fn finish(mut self) -> Result<(), JournalError> {
        self.file.flush()?;
        if self.sync {
            self.file.sync_all()?;
        }
        Ok(())
    }
}
