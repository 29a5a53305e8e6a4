//! Position list loading.

use std::path::Path;

use anyhow::Context;

/// Read one position string per line, trimmed, skipping blank lines.
///
/// Nothing else is checked here; validity is decided per position when it
/// is scored.
pub fn load_positions(path: impl AsRef<Path>) -> anyhow::Result<Vec<String>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read positions from {}", path.display()))?;
    Ok(parse_position_list(&text))
}

pub fn parse_position_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
