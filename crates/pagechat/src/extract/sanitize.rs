//! Boilerplate removal
//!
//! Elements are detached from the parsed tree: first by tag, then by
//! ad/navigation class names. Only descendants of the selected region are
//! touched.

use super::select::{visible_text, Region};
use scraper::{Html, Selector};
use std::sync::LazyLock;

/// Tags whose elements never carry readable content
pub const REMOVED_TAGS: &[&str] = &[
    "script", "style", "nav", "header", "footer", "aside", "iframe", "noscript", "meta", "button",
    "svg", "form", "input", "textarea",
];

/// Class selectors for ads, sidebars, menus and comment threads
pub const REMOVED_CLASSES: &str =
    ".ad, .ads, .advertisement, .sidebar, .nav, .menu, .comment, .footer, .header";

#[allow(clippy::expect_used)]
static TAG_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(&REMOVED_TAGS.join(", ")).expect("valid tag selector")
});

#[allow(clippy::expect_used)]
static CLASS_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(REMOVED_CLASSES).expect("valid class selector"));

/// Detach non-content elements inside `region`
///
/// Returns the number of elements detached. Running it again on the same
/// tree detaches nothing.
pub fn sanitize(doc: &mut Html, region: Region) -> usize {
    let mut removed = 0;

    for selector in [&*TAG_SELECTOR, &*CLASS_SELECTOR] {
        let doomed: Vec<_> = match region.element(doc) {
            Some(root) => root.select(selector).map(|el| el.id()).collect(),
            None => doc
                .root_element()
                .select(selector)
                .map(|el| el.id())
                .collect(),
        };

        for id in doomed {
            if let Some(mut node) = doc.tree.get_mut(id) {
                node.detach();
                removed += 1;
            }
        }
    }

    tracing::debug!(removed, region = ?region.selector(), "Pruned non-content elements");
    removed
}

/// Concatenated visible text of the region, in document order
pub fn region_text(doc: &Html, region: Region) -> String {
    let root = region.element(doc).unwrap_or_else(|| doc.root_element());
    visible_text(root).collect()
}
