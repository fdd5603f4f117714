//! Main content selection
//!
//! Candidates are tried in a fixed order and the first one carrying more
//! than [`MIN_CONTENT_CHARS`] characters of stripped text wins. When none
//! qualifies the whole document is used.

use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

/// A candidate must carry strictly more stripped text than this
pub const MIN_CONTENT_CHARS: usize = 200;

/// Candidate selectors, in priority order
pub const CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    "div.content",
    "div.main-content",
    "#content",
    "#main",
];

struct ContentCandidate {
    name: &'static str,
    selector: Selector,
}

#[allow(clippy::expect_used)]
static CONTENT_CANDIDATES: LazyLock<Vec<ContentCandidate>> = LazyLock::new(|| {
    CONTENT_SELECTORS
        .iter()
        .map(|&name| ContentCandidate {
            name,
            selector: Selector::parse(name).expect("valid content selector"),
        })
        .collect()
});

/// The part of a document treated as main content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// No candidate qualified
    Document,
    /// First element matching `CONTENT_SELECTORS[index]`
    Candidate(usize),
}

impl Region {
    /// Selector text for this region, `None` for the whole document
    pub fn selector(&self) -> Option<&'static str> {
        match self {
            Region::Document => None,
            Region::Candidate(index) => CONTENT_SELECTORS.get(*index).copied(),
        }
    }

    /// Root element of the region, `None` for the whole document
    ///
    /// Pruning only ever removes descendants of the region, so the first
    /// match of the candidate selector stays the same element.
    pub fn element<'a>(&self, doc: &'a Html) -> Option<ElementRef<'a>> {
        match self {
            Region::Document => None,
            Region::Candidate(index) => CONTENT_CANDIDATES
                .get(*index)
                .and_then(|candidate| first_match(doc, &candidate.selector)),
        }
    }
}

/// First element in document order matching `selector`
///
/// Walks the live tree from the root element, so elements detached by
/// pruning are never returned.
pub fn first_match<'a>(doc: &'a Html, selector: &Selector) -> Option<ElementRef<'a>> {
    let root = doc.root_element();
    if selector.matches(&root) {
        return Some(root);
    }
    root.select(selector).next()
}

/// Elements whose text is never rendered
pub const HIDDEN_TEXT_TAGS: &[&str] = &["script", "style", "template"];

/// Text nodes under `element` that a browser would render, in document order
///
/// Nodes with a `script`, `style` or `template` ancestor are skipped.
pub fn visible_text<'a>(element: ElementRef<'a>) -> impl Iterator<Item = &'a str> + 'a {
    element.descendants().filter_map(|node| {
        let text = node.value().as_text()?;
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| HIDDEN_TEXT_TAGS.contains(&el.name()))
        });
        (!hidden).then_some(&**text)
    })
}

/// Count of characters in the element's whitespace-stripped visible text
pub fn stripped_text_len(element: ElementRef<'_>) -> usize {
    visible_text(element)
        .map(|chunk| chunk.trim().chars().count())
        .sum()
}

/// Pick the main content region of a document
pub fn select_main_content(doc: &Html) -> Region {
    for (index, candidate) in CONTENT_CANDIDATES.iter().enumerate() {
        if let Some(element) = first_match(doc, &candidate.selector) {
            let len = stripped_text_len(element);
            if len > MIN_CONTENT_CHARS {
                tracing::debug!(selector = candidate.name, chars = len, "Selected content region");
                return Region::Candidate(index);
            }
        }
    }
    tracing::debug!("No content region qualified, using whole document");
    Region::Document
}
