//! `tldw-agent tools`: List the tool catalog.

use tldw_agent_core::session::ApprovalTier;
use tldw_agent_tools::{catalog_names, tier_for};

fn rows() -> Vec<(&'static str, &'static str, ApprovalTier)> {
    catalog_names()
        .map(|(name, capability)| (name, capability, tier_for(capability)))
        .collect()
}

pub fn run() {
    println!();
    println!("  {:<16} {:<16} {}", "TOOL", "CAPABILITY", "APPROVAL");
    for (name, capability, tier) in rows() {
        println!("  {name:<16} {capability:<16} {tier}");
    }
    println!();
    println!("  auto: runs immediately");
    println!("  batch: needs approval unless auto_approve_writes = true");
    println!("  individual: needs approval unless auto_approve_exec = true");
    println!();
}
