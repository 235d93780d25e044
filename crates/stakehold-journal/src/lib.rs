//! Append-only journal of staking ledger events.
//!
//! Each [`EventRecord`](stakehold_core::EventRecord) emitted by a ledger
//! component is stored as JSON inside a length-prefixed frame (`.shj`
//! files). See [`frame`] for the byte layout.
//!
//! ```no_run
//! use stakehold_journal::{AccountFilter, JournalReader, ReadMode};
//! use stakehold_types::Address;
//!
//! let alice = Address::from_label("alice");
//! let mut reader = JournalReader::open("run.shj", ReadMode::Permissive)?;
//! for record in reader.collect_matching(&AccountFilter(alice), None)? {
//!     println!("{} {}", record.time_index, record.event.name());
//! }
//! # Ok::<(), stakehold_journal::JournalError>(())
//! ```

#![deny(missing_docs)]

/// Journal error type.
pub mod errors;
/// Record predicates.
pub mod filter;
pub mod frame;
/// Sequential reader.
pub mod reader;
/// Append-only writer.
pub mod writer;

pub use errors::JournalError;
pub use filter::{AccountFilter, AllEvents, AllOf, AnyOf, EmitterFilter, EventFilter, KindFilter};
pub use frame::FrameKind;
pub use reader::{JournalReader, ReadMode};
pub use writer::{JournalWriter, WriteOptions};
