//! Character encoding resolution
//!
//! Servers that send `text/html` without a charset are reported as
//! ISO-8859-1 by the HTTP/1.1 default, which is usually wrong. When that
//! default is in play and the body bytes suggest something else, the sniffed
//! encoding wins.

use crate::types::FetchResult;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use regex::Regex;
use std::sync::LazyLock;

/// Encoding HTTP/1.1 assumes for `text/*` bodies without a charset
pub const UNRELIABLE_DEFAULT: &str = "ISO-8859-1";

/// Number of leading bytes scanned for a `<meta>` charset declaration
const META_SCAN_BYTES: usize = 1024;

#[allow(clippy::expect_used)]
static META_CHARSET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?([A-Za-z0-9_\-:.]+)"#).expect("valid regex")
});

/// Encoding announced by a `Content-Type` header value
///
/// Returns the `charset` parameter when present. Without one, `text/*`
/// media types get [`UNRELIABLE_DEFAULT`] and JSON gets UTF-8; anything
/// else has no declared encoding.
pub fn declared_encoding(content_type: Option<&str>) -> Option<String> {
    let content_type = content_type?;
    let mut parts = content_type.split(';');
    let media_type = parts.next().unwrap_or("").trim().to_ascii_lowercase();

    for param in parts {
        if let Some((key, value)) = param.split_once('=') {
            if key.trim().eq_ignore_ascii_case("charset") {
                let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }

    if media_type.starts_with("text/") {
        Some(UNRELIABLE_DEFAULT.to_string())
    } else if media_type == "application/json" {
        Some("utf-8".to_string())
    } else {
        None
    }
}

/// Guess the encoding from the body bytes
///
/// Checks, in order: byte-order mark, strict UTF-8 validity, a `<meta>`
/// charset declaration near the top of the document. Falls back to
/// windows-1252, which decodes any byte sequence.
pub fn sniff_encoding(bytes: &[u8]) -> &'static Encoding {
    if let Some((encoding, _bom_len)) = Encoding::for_bom(bytes) {
        return encoding;
    }

    if std::str::from_utf8(bytes).is_ok() {
        return UTF_8;
    }

    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(META_SCAN_BYTES)]);
    if let Some(encoding) = META_CHARSET_RE
        .captures(&head)
        .and_then(|c| c.get(1))
        .and_then(|m| Encoding::for_label(m.as_str().as_bytes()))
    {
        return encoding;
    }

    WINDOWS_1252
}

/// Pick the encoding label to decode with
pub fn resolve_encoding(declared: Option<&str>, apparent: Option<&str>) -> String {
    match (declared, apparent) {
        (Some(declared), Some(apparent))
            if declared.eq_ignore_ascii_case(UNRELIABLE_DEFAULT)
                && !apparent.eq_ignore_ascii_case(UNRELIABLE_DEFAULT) =>
        {
            apparent.to_string()
        }
        (Some(declared), _) => declared.to_string(),
        (None, Some(apparent)) => apparent.to_string(),
        (None, None) => UTF_8.name().to_string(),
    }
}

/// Decode bytes with the given encoding label
///
/// Unknown labels fall back to lossy UTF-8.
pub fn decode(bytes: &[u8], label: &str) -> String {
    match Encoding::for_label(label.trim().as_bytes()) {
        Some(encoding) => {
            let (text, _used, _had_errors) = encoding.decode(bytes);
            text.into_owned()
        }
        None => {
            tracing::debug!(label, "Unknown encoding label, decoding as UTF-8");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Decode a fetch result's body using the resolved encoding
pub fn decode_body(result: &FetchResult) -> String {
    let label = resolve_encoding(
        result.declared_encoding.as_deref(),
        result.apparent_encoding.as_deref(),
    );
    tracing::debug!(
        declared = ?result.declared_encoding,
        apparent = ?result.apparent_encoding,
        resolved = %label,
        "Resolved page encoding"
    );
    decode(&result.raw_bytes, &label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_declared_encoding_from_charset() {
        assert_eq!(
            declared_encoding(Some("text/html; charset=utf-8")),
            Some("utf-8".to_string())
        );
        assert_eq!(
            declared_encoding(Some("text/html; Charset=\"Shift_JIS\"")),
            Some("Shift_JIS".to_string())
        );
    }

    #[test]
    fn test_declared_encoding_defaults() {
        assert_eq!(
            declared_encoding(Some("text/html")),
            Some(UNRELIABLE_DEFAULT.to_string())
        );
        assert_eq!(
            declared_encoding(Some("application/json")),
            Some("utf-8".to_string())
        );
        assert_eq!(declared_encoding(Some("application/xhtml+xml")), None);
        assert_eq!(declared_encoding(None), None);
    }

    #[test]
    fn test_sniff_encoding() {
        assert_eq!(sniff_encoding("héllo".as_bytes()), UTF_8);
        assert_eq!(sniff_encoding(b"\xEF\xBB\xBFhello"), UTF_8);
        assert_eq!(sniff_encoding(b"\xFF\xFEh\x00i\x00"), encoding_rs::UTF_16LE);
        assert_eq!(
            sniff_encoding(b"<html><head><meta charset=\"shift_jis\"></head>\x82\xa0</html>"),
            encoding_rs::SHIFT_JIS
        );
        assert_eq!(sniff_encoding(b"caf\xe9"), WINDOWS_1252);
    }

    #[test]
    fn test_resolve_overrides_unreliable_default() {
        assert_eq!(resolve_encoding(Some("ISO-8859-1"), Some("UTF-8")), "UTF-8");
        assert_eq!(resolve_encoding(Some("iso-8859-1"), Some("UTF-8")), "UTF-8");
    }

    #[test]
    fn test_resolve_keeps_declared() {
        assert_eq!(resolve_encoding(Some("ISO-8859-1"), Some("iso-8859-1")), "ISO-8859-1");
        assert_eq!(resolve_encoding(Some("ISO-8859-1"), None), "ISO-8859-1");
        assert_eq!(resolve_encoding(Some("Shift_JIS"), Some("UTF-8")), "Shift_JIS");
        assert_eq!(resolve_encoding(None, Some("UTF-8")), "UTF-8");
        assert_eq!(resolve_encoding(None, None), "UTF-8");
    }

    #[test]
    fn test_decode_body_uses_sniffed_encoding() {
        let text = "<p>naïve café – “quoted”</p>";
        let raw = Bytes::from(text.as_bytes().to_vec());
        let result = FetchResult {
            url: "https://example.com".to_string(),
            status_code: 200,
            content_type: Some("text/html".to_string()),
            apparent_encoding: Some(sniff_encoding(&raw).name().to_string()),
            declared_encoding: declared_encoding(Some("text/html")),
            raw_bytes: raw,
        };
        assert_eq!(decode_body(&result), text);
    }

    #[test]
    fn test_decode_unknown_label_is_lossy_utf8() {
        assert_eq!(decode(b"abc\xff", "no-such-charset"), "abc\u{FFFD}");
    }
}
