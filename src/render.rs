//! Turn normalized records into the displayed gallery.
//!
//! [`render`] is a pure function of its input: the same records always give
//! the same items in the same order and the same filter set. Live updates
//! simply call it again with the new snapshot and replace the whole view.
//!
//! ## Ordering
//!
//! Items are sorted by their explicit `order` (missing counts as 0). The
//! sort is stable, so ties keep arrival order, and a snapshot with no orders
//! at all is shown exactly as it arrived.
//!
//! Untitled items get the configured placeholder title; entries that were
//! bare URL strings get it numbered by display position.
//!
//! ## Filters
//!
//! `all` first, then every distinct category sorted, except `all` itself
//! and the default category (uncategorized items are only reachable through
//! `all`).
//!
//! ## Markup
//!
//! ```text
//! div.portfolio-filter
//!   button.filter-btn.active[data-filter=all]  "All"
//!   button.filter-btn[data-filter=portrait]    "Portrait"
//! div.portfolio-grid
//!   div.portfolio-item.wide[data-category=portrait][data-order=0]
//!     img[src][alt][style=--rot: 90deg]
//!     div.overlay-info  h4 title, p category
//! ```

use crate::types::{ALL_FILTER, DEFAULT_CATEGORY, GalleryRecord, Layout};
use maud::{Markup, html};
use std::collections::BTreeSet;

/// Rendering knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Title prefix for records without a title.
    pub placeholder_title: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            placeholder_title: "Gallery".to_string(),
        }
    }
}

/// One displayed grid cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryItem {
    /// 1-based display position.
    pub position: usize,
    pub url: String,
    pub title: String,
    pub category: String,
    pub layout: Layout,
    pub rotation: i32,
    pub order: Option<i64>,
}

/// The rendered gallery: ordered items plus the filter buttons.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GalleryView {
    pub items: Vec<GalleryItem>,
    pub filters: Vec<String>,
}

impl GalleryView {
    /// Items shown when the `category` filter button is active.
    pub fn filtered<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a GalleryItem> + 'a {
        self.items
            .iter()
            .filter(move |item| category == ALL_FILTER || item.category == category)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Render records into a view.
pub fn render(records: &[GalleryRecord], options: &RenderOptions) -> GalleryView {
    let mut sorted: Vec<&GalleryRecord> = records.iter().collect();
    sorted.sort_by_key(|record| record.order.unwrap_or(0));

    let items = sorted
        .into_iter()
        .enumerate()
        .map(|(display, record)| GalleryItem {
            position: display + 1,
            url: record.url.clone(),
            title: record.title.clone().unwrap_or_else(|| placeholder(record, display, options)),
            category: record.category.clone(),
            layout: record.layout,
            rotation: record.rotation,
            order: record.order,
        })
        .collect();

    GalleryView {
        items,
        filters: filters_for(records),
    }
}

/// Bare URL entries are numbered by display position; untitled objects get
/// the plain placeholder.
fn placeholder(record: &GalleryRecord, display: usize, options: &RenderOptions) -> String {
    if record.bare {
        format!("{} {}", options.placeholder_title, display + 1)
    } else {
        options.placeholder_title.clone()
    }
}

fn filters_for(records: &[GalleryRecord]) -> Vec<String> {
    let categories: BTreeSet<&str> = records
        .iter()
        .map(|r| r.category.as_str())
        .filter(|c| *c != ALL_FILTER && *c != DEFAULT_CATEGORY)
        .collect();
    std::iter::once(ALL_FILTER)
        .chain(categories)
        .map(String::from)
        .collect()
}

/// Button label for a filter value: first letter uppercased.
pub fn filter_label(filter: &str) -> String {
    let mut chars = filter.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Filter bar and grid markup for a view.
pub fn render_html(view: &GalleryView) -> Markup {
    html! {
        div.portfolio-filter {
            @for filter in &view.filters {
                @let active = filter == ALL_FILTER;
                button.filter-btn.active[active] data-filter=(filter) { (filter_label(filter)) }
            }
        }
        div.portfolio-grid {
            @for item in &view.items {
                div.portfolio-item.wide[item.layout == Layout::Wide].tall[item.layout == Layout::Tall]
                    data-category=(item.category)
                    data-order=[item.order] {
                    img src=(item.url) alt=(item.title) loading="lazy"
                        style={ "--rot: " (item.rotation) "deg" };
                    div.overlay-info {
                        h4 { (item.title) }
                        p { (item.category) }
                    }
                }
            }
        }
    }
}
