//! Output formatting utilities.

use crate::commands::run::RunReport;
use stakehold_core::{EventRecord, LedgerEvent};

/// Prints the header line for [`format_event_row`].
#[allow(clippy::print_literal)]
pub fn print_event_header() {
    println!(
        "{:>6} {:<22} {:<14} {}",
        "INDEX", "EVENT", "EMITTER", "DETAIL"
    );
    println!("{}", "-".repeat(90));
}

/// Formats one journaled event as a table row.
pub fn format_event_row(record: &EventRecord) -> String {
    format!(
        "{:>6} {:<22} {:<14} {}",
        record.time_index,
        record.event.name(),
        short(&record.emitter.to_string()),
        detail(&record.event)
    )
}

fn detail(event: &LedgerEvent) -> String {
    match event {
        LedgerEvent::StakeChanged {
            account,
            amount_before,
            amount_after,
        } => format!("{} {amount_before} -> {amount_after}", short(&account.to_string())),
        LedgerEvent::Claimed { account, to, amount }
        | LedgerEvent::Slashed { account, to, amount } => format!(
            "{} -> {} {amount}",
            short(&account.to_string()),
            short(&to.to_string())
        ),
        LedgerEvent::ClaimableIncreased { account, amount } => {
            format!("{} +{amount}", short(&account.to_string()))
        }
        LedgerEvent::ReferralCredited {
            referral,
            fee_amount,
            credited,
            ..
        } => format!(
            "{} fee {fee_amount} credited {credited}",
            short(&referral.to_string())
        ),
        other => other
            .accounts()
            .iter()
            .map(|a| short(&a.to_string()))
            .collect::<Vec<_>>()
            .join(" "),
    }
}

/// Prints a scenario run as text.
pub fn print_run_report(report: &RunReport) {
    println!("{:>4} {:>6} {:<20} {:<4} {}", "STEP", "INDEX", "OP", "OK", "DETAIL");
    println!("{}", "-".repeat(90));
    for step in &report.steps {
        println!(
            "{:>4} {:>6} {:<20} {:<4} {}",
            step.index,
            step.time_index,
            step.step,
            if step.ok { "yes" } else { "NO" },
            step.detail
        );
    }
    println!();
    println!("time index     {}", report.time_index);
    println!("total staked   {}", report.total_staked);
    println!("total supply   {}", report.total_supply);
    println!("paused         {}", report.paused);
    println!("events         {}", report.events);

    if !report.plugins.is_empty() {
        println!();
        println!("{:<20} {:<10} {:>16} {:>16}", "PLUGIN", "REGISTERED", "OWED", "HELD");
        for plugin in &report.plugins {
            println!(
                "{:<20} {:<10} {:>16} {:>16}",
                truncate(&plugin.name, 20),
                plugin.registered,
                plugin.total_claimable,
                plugin.held
            );
        }
    }

    if !report.accounts.is_empty() {
        println!();
        println!("{:<20} {:>16} {:>16} {:>16}", "ACCOUNT", "STAKED", "CLAIMABLE", "WALLET");
        for account in &report.accounts {
            println!(
                "{:<20} {:>16} {:>16} {:>16}",
                truncate(&account.name, 20),
                account.staked,
                account.claimable,
                account.wallet
            );
        }
    }
}

fn short(address: &str) -> String {
    if address.len() <= 14 {
        address.to_string()
    } else {
        format!("{}..{}", &address[..8], &address[address.len() - 4..])
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
