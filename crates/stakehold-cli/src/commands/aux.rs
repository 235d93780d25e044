//! `stakehold aux`: build and inspect auxiliary payloads.

use crate::error::CliError;
use stakehold_core::aux_data::{self, AuxDataBuilder};
use stakehold_types::Address;

/// Encodes `ADDRESS=HEX` parts into one payload and prints it as hex.
pub fn encode(parts: Vec<String>) -> Result<(), CliError> {
    let mut builder = AuxDataBuilder::new();
    for part in &parts {
        let (address, bytes) = part
            .split_once('=')
            .ok_or_else(|| CliError::Usage(format!("expected ADDRESS=HEX, got '{part}'")))?;
        builder = builder.part(Address::parse(address)?, &hex::decode(bytes)?)?;
    }
    println!("{}", hex::encode(builder.encode()?));
    Ok(())
}

/// Prints the slice of `data` addressed to `address`.
pub fn select(data: String, address: String) -> Result<(), CliError> {
    let data = hex::decode(data.trim_start_matches("0x"))?;
    let address = Address::parse(&address)?;
    let selected = aux_data::select_relevant_bytes(&data, &address)?;
    println!("{}", hex::encode(selected));
    Ok(())
}

/// Prints the header entries of `data`.
pub fn inspect(data: String, json: bool) -> Result<(), CliError> {
    let data = hex::decode(data.trim_start_matches("0x"))?;
    let decoded = aux_data::parse(&data)?;
    if json {
        let entries: Vec<serde_json::Value> = decoded
            .header
            .iter()
            .map(|entry| {
                serde_json::json!({
                    "address": entry.address,
                    "start": entry.start,
                    "length": entry.length,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "entries": entries,
                "payload_len": decoded.payload.len(),
            }))?
        );
    } else {
        println!("{:<44} {:>8} {:>8}", "ADDRESS", "START", "LENGTH");
        for entry in &decoded.header {
            println!(
                "{:<44} {:>8} {:>8}",
                entry.address.to_string(),
                entry.start,
                entry.length
            );
        }
        println!("payload: {} bytes", decoded.payload.len());
    }
    Ok(())
}
