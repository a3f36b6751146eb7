use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;

/// Quotes a single CSV field when it contains a delimiter, quote, or line
/// break. Embedded quotes are doubled per RFC 4180.
pub fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub fn csv_line(cells: &[String]) -> String {
    cells
        .iter()
        .map(|c| csv_escape(c))
        .collect::<Vec<String>>()
        .join(",")
}

/// Converts a 0-based column index into its A1-notation column letter
/// (0 -> "A", 25 -> "Z", 26 -> "AA").
pub fn column_letter(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index;
    loop {
        letters.push((b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    letters.iter().rev().collect()
}

/// Builds the output file name for a CSV run. The date makes runs easy to
/// find, the epoch suffix keeps repeated or concurrent runs from colliding.
pub fn csv_filename(now: DateTime<Utc>) -> String {
    format!(
        "tagsync-{date}-{epoch}.csv",
        date = now.format("%Y-%m-%d"),
        epoch = now.timestamp()
    )
}

/// Left-justifies a value into a fixed-width column for progress output.
pub fn pad(value: &str, width: usize) -> String {
    format!("{:<width$}", value, width = width)
}

/// Exponential backoff delay with a little random jitter so retries from
/// parallel runs don't line up.
pub fn backoff_with_jitter(attempt: u32) -> Duration {
    let base_ms = 1000u64 * 2u64.pow(attempt.min(6));
    let jitter_ms = rand::rng().random_range(0..500);
    Duration::from_millis(base_ms + jitter_ms)
}
