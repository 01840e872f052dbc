//! Report printing for the `check`, `subnets`, `stats` and `captures` commands.
//!
//! Rows are built as strings first so they can be tested without capturing stdout.

use super::terminal::{format_field, verdict};
use crate::models::{Classification, Subnet, TargetSubnets};
use crate::storage::Capture;
use itertools::Itertools;

pub fn capture_header() -> String {
    [
        format_field("ts", 21),
        format_field("ip", 17),
        format_field("subnet", 20),
        format_field("account", 12),
        format_field("server", 16),
    ]
    .join(",")
}

/// One capture as a CSV row.
pub fn capture_row(c: &Capture) -> String {
    [
        format_field(&c.ts, 21),
        format_field(&c.ip, 17),
        format_field(&c.subnet, 20),
        format_field(&c.account, 12),
        format_field(&c.server, 16),
    ]
    .join(",")
}

pub fn print_captures(captures: &[Capture]) {
    if captures.is_empty() {
        println!("No captures yet");
        return;
    }
    println!("{}", capture_header());
    for c in captures {
        println!("{}", capture_row(c));
    }
}

/// Lines for the per-subnet allocation histogram, with share of all hits.
pub fn subnet_hit_lines(hits: &[(String, u64)]) -> Vec<String> {
    let total: u64 = hits.iter().map(|(_, n)| n).sum();
    hits.iter()
        .map(|(subnet, n)| {
            let pct = if total == 0 { 0.0 } else { *n as f64 * 100.0 / total as f64 };
            format!("{subnet:>20} {n:>6} {pct:>5.1}%")
        })
        .collect()
}

pub fn print_stats(hits: &[(String, u64)], allocated: u64, released: u64, captured: u64) {
    println!("allocated={allocated} released={released} captured={captured}");
    for line in subnet_hit_lines(hits) {
        println!("{line}");
    }
}

/// Result of checking one address given on the command line.
pub fn check_line(targets: &TargetSubnets, ip: &str) -> String {
    match targets.classify_str(ip) {
        Some(Classification::Target(net)) => format!("{ip:>16} {} {net}", verdict(true)),
        Some(Classification::NotTarget) => format!("{ip:>16} {}", verdict(false)),
        None => format!("{ip:>16} invalid IPv4 address"),
    }
}

/// External subnets of one account, marking the ones that are targets.
pub fn subnet_lines(account: &str, subnets: &[Subnet], targets: &TargetSubnets) -> Vec<String> {
    subnets
        .iter()
        .sorted_by(|a, b| a.cidr.cmp(&b.cidr))
        .map(|s| {
            let wanted = targets.iter().any(|t| s.matches_cidr(&t.network().to_string()));
            format!(
                "[{account}] {cidr:>20} {id} {name}{mark}",
                cidr = s.cidr,
                id = s.id,
                name = s.name,
                mark = if wanted { "  <- target" } else { "" }
            )
        })
        .collect()
}
