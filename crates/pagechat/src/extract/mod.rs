//! Webpage text extraction
//!
//! Decoded HTML goes through content selection, pruning and whitespace
//! normalization; the result is an [`ExtractedPage`] whose artifact is
//! capped by [`truncate::truncate_artifact`].

pub mod encoding;
pub mod normalize;
pub mod sanitize;
pub mod select;
pub mod truncate;

use crate::types::{ExtractedPage, FetchResult};
use crate::NO_TITLE;
use scraper::{Html, Selector};
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid title selector"));

/// Extract the main text of an HTML document
///
/// `url` is carried into the result untouched.
pub fn extract_page(html: &str, url: &str) -> ExtractedPage {
    let mut doc = Html::parse_document(html);

    let region = select::select_main_content(&doc);
    sanitize::sanitize(&mut doc, region);
    let body = normalize::normalize_text(&sanitize::region_text(&doc, region));
    let title = page_title(&doc);

    ExtractedPage {
        title,
        url: url.to_string(),
        body,
    }
}

/// Decode a fetched body and extract it
pub fn extract_fetched(result: &FetchResult) -> ExtractedPage {
    let html = encoding::decode_body(result);
    extract_page(&html, &result.url)
}

/// Trimmed text of the first `<title>`, or [`NO_TITLE`]
pub fn page_title(doc: &Html) -> String {
    select::first_match(doc, &TITLE_SELECTOR)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| NO_TITLE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_article_page() {
        let html = format!(
            r#"<!DOCTYPE html>
<html>
<head><title>  Rust Release Notes </title><script>track()</script></head>
<body>
  <header><h1>Site</h1></header>
  <article>
    <h2>What's new</h2>
    <p>{}</p>
    <div class="comment">First!</div>
    <p>Closing  thoughts</p>
  </article>
  <footer>Legal</footer>
</body>
</html>"#,
            "The compiler got faster. ".repeat(12)
        );

        let page = extract_page(&html, "https://blog.example/rust");

        assert_eq!(page.title, "Rust Release Notes");
        assert_eq!(page.url, "https://blog.example/rust");
        assert!(page.body.starts_with("What's new\n"));
        assert!(page.body.contains("The compiler got faster."));
        assert!(page.body.ends_with("Closing\nthoughts"));
        assert!(!page.body.contains("First!"));
        assert!(!page.body.contains("Site"));
        assert!(!page.body.contains("Legal"));
        assert!(!page.body.contains("track()"));
    }

    #[test]
    fn test_missing_title_uses_placeholder() {
        let page = extract_page("<html><body><p>hi</p></body></html>", "https://e.com");
        assert_eq!(page.title, NO_TITLE);

        let page = extract_page(
            "<html><head><title>   </title></head><body>hi</body></html>",
            "https://e.com",
        );
        assert_eq!(page.title, "No title");
    }

    #[test]
    fn test_whole_document_fallback_keeps_body_text() {
        let html = "<html><head><title>Tiny</title></head>\n<body>\n<p>Just a line.</p>\n<nav>Menu</nav>\n</body></html>";
        let page = extract_page(html, "https://e.com");
        assert_eq!(page.body, "Tiny\nJust a line.");
    }

    #[test]
    fn test_artifact_from_extracted_page() {
        let html = "<html><head><title>T</title></head>\n<body><main>x</main></body></html>";
        let page = extract_page(html, "https://e.com");
        assert_eq!(page.to_string(), "Title: T\nURL: https://e.com\n\nT\nx");
    }
}
