//! Per-interface summary report

use blf_codec::{BusRecord, InterfaceRegistry};
use std::collections::HashMap;

#[derive(Debug, Default, Clone, Copy)]
struct IfaceStats {
    records: u64,
    bytes: u64,
    first_ts: u64,
    last_ts: u64,
}

/// Aggregated per-interface counters collected during a read pass
#[derive(Debug, Default)]
pub struct SummaryStats {
    per_iface: HashMap<u32, IfaceStats>,
}

impl SummaryStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, record: &BusRecord) {
        let entry = self.per_iface.entry(record.iface_id).or_default();
        if entry.records == 0 {
            entry.first_ts = record.timestamp_ns;
        }
        entry.records += 1;
        entry.bytes += record.cap_len as u64;
        entry.last_ts = entry.last_ts.max(record.timestamp_ns);
    }
}

/// Print the summary table to stdout
pub fn print_summary(stats: &SummaryStats, interfaces: &InterfaceRegistry) {
    println!("\n📊 Interface Summary:");
    println!(
        "  {:<4} {:<24} {:>10} {:>12} {:>12}",
        "id", "interface", "records", "bytes", "span (s)"
    );
    println!("  {}", "─".repeat(66));
    for (id, info) in interfaces.iter() {
        let s = stats.per_iface.get(&id).copied().unwrap_or_default();
        let span_secs = s.last_ts.saturating_sub(s.first_ts) as f64 / 1e9;
        println!(
            "  {:<4} {:<24} {:>10} {:>12} {:>12.3}",
            id, info.name, s.records, s.bytes, span_secs
        );
    }
}
