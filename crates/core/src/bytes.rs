//! Human readable byte counts

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;
const TB: u64 = GB * 1024;

/// Format a byte count with a 1024 base and two decimals
///
/// Counts below one kilobyte are printed exactly: `"512 B"`.
pub fn pretty_bytes(bytes: u64) -> String {
    let (unit, divisor) = match bytes {
        b if b >= TB => ("TB", TB),
        b if b >= GB => ("GB", GB),
        b if b >= MB => ("MB", MB),
        b if b >= KB => ("KB", KB),
        b => return format!("{} B", b),
    };
    format!("{:.2} {}", bytes as f64 / divisor as f64, unit)
}
