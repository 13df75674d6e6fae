//! CLI output formatting for every command.
//!
//! # Information-First Display
//!
//! Every entity (staged image, gallery item) leads with its positional index
//! and title; where it came from, its category and layout follow as indented
//! context lines. Long URLs (data URLs in particular) are shortened.
//!
//! # Output Format
//!
//! ## Staging
//!
//! ```text
//! Staged (2 images)
//! 001 bride portrait
//!     Source: 001-bride_portrait.jpg
//!     Category: portrait
//!     Layout: tall (800x1200)
//! 002 (007.png)
//!     Category: uncategorized
//!     Layout: normal
//! ```
//!
//! ## Publish
//!
//! ```text
//! Cleared 12 records (12 delete calls, 1 failed)
//! 001/002 uploading 001-bride_portrait.jpg
//!     https://i.ibb.co/abc/bride.jpg
//! 002/002 uploading 007.png
//!     https://i.ibb.co/def/007.png
//! Committed 2 records
//! ```
//!
//! ## Gallery
//!
//! ```text
//! Gallery from store (2 items)
//! Filters: All, Portrait
//! 001 Bride portrait
//!     Category: portrait
//!     Layout: tall, rotated 90deg
//!     URL: https://i.ibb.co/abc/bride.jpg
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::loader::GallerySource;
use crate::publish::{PublishEvent, PublishOutcome};
use crate::render::{GalleryView, filter_label};
use crate::staging::StagedImage;
use crate::types::Layout;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

const MAX_URL_DISPLAY: usize = 72;

/// Shorten `text` to `max` characters, appending `...` if truncated.
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max).collect();
        format!("{head}...")
    }
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

// ============================================================================
// Staging
// ============================================================================

/// Format a staged set: header plus one entry per image.
pub fn format_staging(items: &[StagedImage]) -> Vec<String> {
    let mut lines = vec![format!("Staged ({})", plural(items.len(), "image", "images"))];
    for (i, item) in items.iter().enumerate() {
        match item.title.as_deref() {
            Some(title) if !title.is_empty() => {
                lines.push(format!("{} {}", format_index(i + 1), title));
                lines.push(format!("{}Source: {}", indent(1), item.file_name));
            }
            _ => lines.push(format!("{} ({})", format_index(i + 1), item.file_name)),
        }
        lines.push(format!("{}Category: {}", indent(1), item.category));
        let layout = match item.dimensions {
            Some((w, h)) => format!("{} ({w}x{h})", item.layout.as_str()),
            None => item.layout.as_str().to_string(),
        };
        lines.push(format!("{}Layout: {}", indent(1), layout));
    }
    lines
}

pub fn print_staging(items: &[StagedImage]) {
    for line in format_staging(items) {
        println!("{}", line);
    }
}

// ============================================================================
// Publish
// ============================================================================

/// Format one publish progress event.
pub fn format_publish_event(event: &PublishEvent) -> Vec<String> {
    match event {
        PublishEvent::Cleared(report) if report.removed == 0 => {
            vec!["Store was empty, nothing to clear".to_string()]
        }
        PublishEvent::Cleared(report) => {
            let mut line = format!("Cleared {}", plural(report.removed, "record", "records"));
            if report.deletions_attempted > 0 {
                line.push_str(&format!(
                    " ({} delete calls, {} failed)",
                    report.deletions_attempted, report.deletions_failed
                ));
            }
            vec![line]
        }
        PublishEvent::ClearFailed(reason) => {
            vec![format!("Warning: could not clear previous gallery: {reason}")]
        }
        PublishEvent::Uploading {
            index,
            total,
            file_name,
        } => vec![format!(
            "{}/{} uploading {}",
            format_index(index + 1),
            format_index(*total),
            file_name
        )],
        PublishEvent::Uploaded { url, .. } => {
            vec![format!("{}{}", indent(1), truncate(url, MAX_URL_DISPLAY))]
        }
        PublishEvent::Committed { records } => {
            vec![format!("Committed {}", plural(*records, "record", "records"))]
        }
    }
}

/// Format the final result of a publish.
pub fn format_publish_outcome(outcome: &PublishOutcome) -> Vec<String> {
    match outcome {
        PublishOutcome::Published { records } => {
            vec![format!("Published {}", plural(records.len(), "image", "images"))]
        }
        PublishOutcome::Exported(entries) => vec![
            "No image host configured: staged set exported instead of published".to_string(),
            format!("{}{}", indent(1), plural(entries.len(), "entry", "entries")),
        ],
    }
}

pub fn print_publish_outcome(outcome: &PublishOutcome) {
    for line in format_publish_outcome(outcome) {
        println!("{}", line);
    }
}

// ============================================================================
// Gallery
// ============================================================================

fn source_label(source: GallerySource) -> &'static str {
    match source {
        GallerySource::ForcedLocal => "local snapshot",
        GallerySource::Store => "store",
        GallerySource::Fallback => "fallback snapshot",
    }
}

/// Format a rendered gallery: source, filter buttons, then every item.
pub fn format_gallery(source: GallerySource, view: &GalleryView) -> Vec<String> {
    let mut lines = vec![format!(
        "Gallery from {} ({})",
        source_label(source),
        plural(view.items.len(), "item", "items")
    )];
    let labels: Vec<String> = view.filters.iter().map(|f| filter_label(f)).collect();
    lines.push(format!("Filters: {}", labels.join(", ")));
    for item in &view.items {
        lines.push(format!("{} {}", format_index(item.position), item.title));
        lines.push(format!("{}Category: {}", indent(1), item.category));
        if item.layout != Layout::Normal || item.rotation != 0 {
            let mut layout = item.layout.as_str().to_string();
            if item.rotation != 0 {
                layout.push_str(&format!(", rotated {}deg", item.rotation));
            }
            lines.push(format!("{}Layout: {}", indent(1), layout));
        }
        lines.push(format!(
            "{}URL: {}",
            indent(1),
            truncate(&item.url, MAX_URL_DISPLAY)
        ));
    }
    lines
}

pub fn print_gallery(source: GallerySource, view: &GalleryView) {
    for line in format_gallery(source, view) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

/// Format `check` results: one line per probed service.
pub fn format_check(results: &[(String, Result<String, String>)]) -> Vec<String> {
    results
        .iter()
        .map(|(name, result)| match result {
            Ok(detail) => format!("ok    {name}: {detail}"),
            Err(error) => format!("FAIL  {name}: {error}"),
        })
        .collect()
}

pub fn print_check(results: &[(String, Result<String, String>)]) {
    for line in format_check(results) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
