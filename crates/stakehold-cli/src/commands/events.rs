//! `stakehold events`: list journaled events.

use crate::error::CliError;
use crate::output;
use stakehold_journal::{
    AccountFilter, AllOf, EmitterFilter, JournalReader, KindFilter, ReadMode,
};
use stakehold_types::Address;
use std::path::PathBuf;

/// Selection and formatting options.
pub struct EventsArgs {
    pub journal: PathBuf,
    pub kinds: Vec<String>,
    pub account: Option<String>,
    pub emitter: Option<String>,
    pub json: bool,
    pub max_events: Option<usize>,
    pub strict: bool,
}

fn address_arg(value: &str) -> Result<Address, CliError> {
    if value.starts_with("0x") {
        Ok(Address::parse(value)?)
    } else {
        Ok(Address::from_label(value))
    }
}

pub fn run(args: EventsArgs) -> Result<(), CliError> {
    let mode = if args.strict {
        ReadMode::Strict
    } else {
        ReadMode::Permissive
    };
    let mut reader = JournalReader::open(&args.journal, mode)?;

    let mut filter = AllOf::new();
    if !args.kinds.is_empty() {
        filter = filter.and(KindFilter::new(args.kinds));
    }
    if let Some(account) = &args.account {
        filter = filter.and(AccountFilter(address_arg(account)?));
    }
    if let Some(emitter) = &args.emitter {
        filter = filter.and(EmitterFilter(address_arg(emitter)?));
    }

    let records = reader.collect_matching(&filter, args.max_events)?;
    if args.json {
        for record in &records {
            println!("{}", serde_json::to_string(record)?);
        }
    } else {
        output::print_event_header();
        for record in &records {
            println!("{}", output::format_event_row(record));
        }
    }
    Ok(())
}
