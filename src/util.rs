/// `part / whole * 100`, or 0 when `whole` is zero
pub fn percentage(part: usize, whole: usize) -> f64 {
    match whole {
        positive if positive > 0 => (part as f64 / whole as f64) * 100.0,
        _ => 0.0,
    }
}

/// Elapsed seconds as `m:ss`
pub fn format_elapsed(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Option label for display, `A` for the first option
pub fn option_letter(idx: usize) -> char {
    (b'A' + (idx % 26) as u8) as char
}
