//! Length cap for the final artifact

use crate::TRUNCATION_MARKER;

/// Cut `text` to `max_chars` characters, appending [`TRUNCATION_MARKER`]
///
/// Text at or under the cap is returned unchanged. Lengths are counted in
/// Unicode scalar values, so multi-byte text is never split mid-character.
pub fn truncate_artifact(mut text: String, max_chars: usize) -> String {
    if let Some((byte_idx, _)) = text.char_indices().nth(max_chars) {
        text.truncate(byte_idx);
        text.push_str(TRUNCATION_MARKER);
    }
    text
}
