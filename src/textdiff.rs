//! Unified line diffs between two cycles of endpoint content.

use similar::TextDiff;

/// Lines of unchanged context around each hunk.
const CONTEXT_LINES: usize = 3;

/// Unified diff from `old` to `new`, both sides labelled `label`.
///
/// Returns an empty string when the contents are identical.
pub fn unified_diff(label: &str, old: &[u8], new: &[u8]) -> String {
    if old == new {
        return String::new();
    }
    let old = terminated(old);
    let new = terminated(new);

    // Compared as bytes; only the rendering is lossy.
    TextDiff::from_lines(old.as_slice(), new.as_slice())
        .unified_diff()
        .context_radius(CONTEXT_LINES)
        .header(label, label)
        .to_string()
}

/// Stored bodies carry no trailing newline; give every line one so the
/// last line compares equal to the same line followed by more.
fn terminated(content: &[u8]) -> Vec<u8> {
    let mut text = content.to_vec();
    if !text.is_empty() && !text.ends_with(b"\n") {
        text.push(b'\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_is_empty() {
        assert!(unified_diff("https://x", b"a\nb", b"a\nb").is_empty());
        assert!(unified_diff("https://x", b"", b"").is_empty());
    }

    #[test]
    fn test_labels_both_sides() {
        let d = unified_diff("https://example.com/", b"/a.js", b"/a.js\n/b.js");
        assert!(d.starts_with("--- https://example.com/\n+++ https://example.com/\n"));
        assert!(d.contains("+/b.js"));
        assert!(!d.contains("-/a.js"));
    }

    #[test]
    fn test_removal_shows_minus() {
        let d = unified_diff("u", b"/a.js\n/b.js", b"/b.js");
        assert!(d.contains("-/a.js"));
        assert!(!d.contains("+/a.js"));
    }

    #[test]
    fn test_first_observation_is_all_additions() {
        let d = unified_diff("u", b"", b"/a.js\n/b.js");
        assert!(d.contains("+/a.js"));
        assert!(d.contains("+/b.js"));
    }

    #[test]
    fn test_invalid_utf8_difference_is_reported() {
        let d = unified_diff("u", b"/a.js\n/\xff.js", b"/a.js\n/\xfe.js");
        assert!(!d.is_empty());
        assert!(d.contains("-/\u{FFFD}.js"));
        assert!(d.contains("+/\u{FFFD}.js"));
    }
}
