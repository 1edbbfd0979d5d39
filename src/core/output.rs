//! Table cells for the CLI listings.

/// One-line preview of a run output: its first non-blank line, cut to
/// `width`, followed by how many lines were left out.
pub fn output_preview(output: &str, width: usize) -> String {
    let mut lines = output.lines().map(str::trim).filter(|l| !l.is_empty());
    let Some(first) = lines.next() else {
        return String::new();
    };
    let head = truncate(first, width);
    match lines.count() {
        0 => head,
        rest => format!("{head} (+{rest} lines)"),
    }
}

/// Left-align `value` in a column of `width` characters.
pub fn column(value: &str, width: usize) -> String {
    let flat = value.split_whitespace().collect::<Vec<_>>().join(" ");
    format!("{:<width$}", truncate(&flat, width.saturating_sub(1)), width = width)
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let kept: String = value.chars().take(width.saturating_sub(3)).collect();
    format!("{kept}...")
}
