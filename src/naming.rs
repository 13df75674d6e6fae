//! File-name conventions for staged images.
//!
//! Operators often export a shoot as `001-first-look.jpg`, `002-vows.jpg`, ...
//! A numeric prefix (`NNN-`) gives the initial staging order when a whole
//! directory is staged, and the rest of the stem becomes the image title with
//! dashes and underscores read as spaces:
//!
//! - `020-First-Dance.jpg` → order 20, title "First Dance"
//! - `bride_portrait.png` → no order, title "bride portrait"
//! - `007.jpg` → order 7, no title
//!
//! Unnumbered files sort after numbered ones, by name.

use std::cmp::Ordering;
use std::path::Path;

/// Result of parsing a file stem like `020-First-Dance`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedName {
    /// Number prefix if present (`20` from `020-First-Dance`).
    pub number: Option<u32>,
    /// Raw name after the prefix, separators preserved. Empty if number-only.
    pub name: String,
    /// Name with `-` and `_` read as spaces, trimmed.
    pub display_title: String,
}

/// Parse a file stem following the `NNN-name` convention.
///
/// - `"020-First-Dance"` → number=Some(20), name="First-Dance", display_title="First Dance"
/// - `"007"` / `"007-"` → number=Some(7), name="", display_title=""
/// - `"bride_portrait"` → number=None, display_title="bride portrait"
/// - `"2024-05-01-ceremony"` → number=Some(2024), name="05-01-ceremony"
pub fn parse_stem(stem: &str) -> ParsedName {
    if let Some((prefix, rest)) = stem.split_once('-')
        && let Ok(num) = prefix.parse::<u32>()
    {
        return ParsedName {
            number: Some(num),
            name: rest.to_string(),
            display_title: display(rest),
        };
    }
    if let Ok(num) = stem.parse::<u32>() {
        return ParsedName {
            number: Some(num),
            name: String::new(),
            display_title: String::new(),
        };
    }
    ParsedName {
        number: None,
        name: stem.to_string(),
        display_title: display(stem),
    }
}

fn display(raw: &str) -> String {
    raw.replace(['-', '_'], " ").trim().to_string()
}

/// Parse the stem of a file name (extension dropped).
pub fn parse_file_name(file_name: &str) -> ParsedName {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    parse_stem(&stem)
}

/// Title for a staged file, or `None` when the stem carries no words.
pub fn title_from_file_name(file_name: &str) -> Option<String> {
    let parsed = parse_file_name(file_name);
    (!parsed.display_title.is_empty()).then_some(parsed.display_title)
}

/// Staging order for two file names: numbered first (ascending), then by name.
pub fn compare_file_names(a: &str, b: &str) -> Ordering {
    let pa = parse_file_name(a);
    let pb = parse_file_name(b);
    match (pa.number, pb.number) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}
