use std::collections::HashMap;

use colored::Colorize;
use ophooks_metrics::FlushReport;
use tabled::builder::Builder;
use tabled::settings::Style;

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_warning(msg: &str) {
    println!("{} {}", "!".yellow(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print pending counters as a table, one row per key, sorted.
pub fn print_counters(counters: &HashMap<String, u64>) {
    if counters.is_empty() {
        println!("No pending counters.");
        return;
    }

    let mut entries: Vec<_> = counters.iter().collect();
    entries.sort();

    let mut builder = Builder::default();
    builder.push_record(["Key", "Count"]);
    for (key, count) in entries {
        builder.push_record([key.clone(), count.to_string()]);
    }
    let table = builder.build().with(Style::rounded()).to_string();
    println!("{table}");
}

pub fn print_flush(report: &FlushReport) {
    match report {
        FlushReport::Skipped { reason, discarded } => {
            print_warning(&format!(
                "Flush skipped ({reason:?}), {discarded} key(s) discarded"
            ));
        }
        FlushReport::Sent {
            data_points,
            requests,
            failed: 0,
        } => {
            print_success(&format!(
                "Flushed {data_points} data point(s) in {requests} request(s)"
            ));
        }
        FlushReport::Sent {
            data_points,
            requests,
            failed,
        } => {
            print_error(&format!(
                "Flushed {data_points} data point(s): {failed} of {requests} request(s) failed"
            ));
        }
    }
}
