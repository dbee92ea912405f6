//! Line normalization for extractor output.
//!
//! Extractors emit one record per line. Before comparing against the
//! previous cycle the records are split, stripped of static asset
//! references, sorted by byte value, and deduplicated, so that the stored
//! content is stable across reorderings on the page.

/// Suffixes of static assets that never count as content changes.
/// Matching is case-sensitive.
pub const ASSET_BLOCKLIST: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".css", ".svg", ".ico", ".gif", ".webp", ".ttf", ".otf",
];

/// Record separator used by extractors and for stored bodies.
pub const RECORD_TERMINATOR: u8 = b'\n';

/// Strip one trailing run of `terminator` and split on it.
///
/// Empty or all-terminator input yields no records rather than a single
/// empty one. Interior empty records are kept.
pub fn split_records(raw: &[u8], terminator: u8) -> Vec<&[u8]> {
    let end = raw
        .iter()
        .rposition(|b| *b != terminator)
        .map(|pos| pos + 1)
        .unwrap_or(0);
    let trimmed = &raw[..end];
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed.split(|b| *b == terminator).collect()
}

/// True when the record ends with a blocklisted asset suffix.
pub fn is_blocklisted(record: &[u8]) -> bool {
    ASSET_BLOCKLIST
        .iter()
        .any(|suffix| record.ends_with(suffix.as_bytes()))
}

/// Split, filter, sort and deduplicate raw extractor output.
pub fn normalize_records(raw: &[u8]) -> Vec<Vec<u8>> {
    let mut records: Vec<Vec<u8>> = split_records(raw, RECORD_TERMINATOR)
        .into_iter()
        .filter(|r| !is_blocklisted(r))
        .map(<[u8]>::to_vec)
        .collect();
    records.sort();
    // Sorted, so adjacent dedup removes every repeat.
    records.dedup();
    records
}

/// Join records with the record terminator.
pub fn join_records(records: &[Vec<u8>]) -> Vec<u8> {
    records.join(&RECORD_TERMINATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(records: &[Vec<u8>]) -> Vec<String> {
        records
            .iter()
            .map(|r| String::from_utf8_lossy(r).into_owned())
            .collect()
    }

    #[test]
    fn test_filters_sorts_and_dedups() {
        let raw = b"b.png\na.js\na.js\nc.css\nb.js\n";
        assert_eq!(lines(&normalize_records(raw)), vec!["a.js", "b.js"]);
    }

    #[test]
    fn test_empty_and_terminator_only_input() {
        assert!(split_records(b"", b'\n').is_empty());
        assert!(split_records(b"\n\n\n", b'\n').is_empty());
        assert!(normalize_records(b"\n").is_empty());
    }

    #[test]
    fn test_strips_only_trailing_terminators() {
        let records = split_records(b"a\n\nb\n\n", b'\n');
        assert_eq!(records, vec![&b"a"[..], &b""[..], &b"b"[..]]);
    }

    #[test]
    fn test_blocklist_is_case_sensitive_suffix() {
        assert!(is_blocklisted(b"/static/logo.png"));
        assert!(!is_blocklisted(b"/static/logo.PNG"));
        assert!(!is_blocklisted(b"/static/logo.png?v=2"));
        assert!(!is_blocklisted(b"style.css.map"));
    }

    #[test]
    fn test_byte_order_not_locale_order() {
        let raw = b"b\nB\na\nA\n";
        assert_eq!(lines(&normalize_records(raw)), vec!["A", "B", "a", "b"]);
    }

    #[test]
    fn test_idempotent() {
        let raw = b"/z.js\n/a.js\nfont.ttf\n/a.js\nhttps://x/y\n";
        let once = normalize_records(raw);
        let twice = normalize_records(&join_records(&once));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_output_sorted_without_adjacent_duplicates() {
        let raw = b"c\na\nb\na\nc\nicon.ico\nb\n";
        let out = normalize_records(raw);
        for pair in out.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert!(out.iter().all(|r| !is_blocklisted(r)));
    }

    #[test]
    fn test_join_records() {
        let records = vec![b"a".to_vec(), b"b".to_vec()];
        assert_eq!(join_records(&records), b"a\nb".to_vec());
        assert!(join_records(&[]).is_empty());
    }
}
