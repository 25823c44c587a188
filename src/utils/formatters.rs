//! Text helpers for progress output on stderr.

use std::time::Duration;

/// Human-readable byte count, binary units with two decimals.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];

    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

/// Formats an assembly duration as `1.25s` or `2m 03s`
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{:.2}s", d.as_secs_f64())
    }
}

/// Shortens a stream id to its first 8 characters
pub fn short_stream_id(id: &str) -> String {
    id.chars().take(8).collect()
}

/// Renders a fixed-width text progress bar, e.g. `[#####-----]`
pub fn progress_bar(percentage: u8, width: usize) -> String {
    let filled = usize::from(percentage.min(100)) * width / 100;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

/// Lists at most `limit` indices, e.g. `[1, 2, 3, ... +97 more]`.
pub fn format_missing(missing: &[u32], limit: usize) -> String {
    let shown: Vec<String> = missing.iter().take(limit).map(u32::to_string).collect();
    let rest = missing.len().saturating_sub(limit);
    if rest == 0 {
        format!("[{}]", shown.join(", "))
    } else {
        format!("[{}, ... +{rest} more]", shown.join(", "))
    }
}
