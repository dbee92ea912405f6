//! Watched-path filtering of multi-file git patches.
//!
//! A patch produced by `git diff` is a sequence of per-file sections, each
//! introduced by a `diff --git ` line. This module slices the patch into
//! those sections (chunks), keeps only chunks whose header line mentions a
//! watched path substring, and drops exact duplicate chunks.
//!
//! Retained chunks are emitted verbatim, in input order, without the
//! boundary marker itself; each output chunk therefore starts with its
//! `a/<path> b/<path>` header.

use std::collections::HashSet;

use sha2::{Digest, Sha256};

/// Marker that opens a new file section. Only recognised at a line start.
pub const FILE_BOUNDARY: &str = "diff --git ";

/// Split a patch into per-file chunks.
///
/// Empty segments (for instance the nothing before the first marker) are
/// skipped. Text preceding the first marker, if any, forms its own chunk.
pub fn split_file_chunks(patch: &str) -> Vec<&str> {
    let mut starts = Vec::new();
    let mut line_start = 0;
    for line in patch.split_inclusive('\n') {
        if line.starts_with(FILE_BOUNDARY) {
            starts.push(line_start);
        }
        line_start += line.len();
    }

    let mut chunks = Vec::with_capacity(starts.len() + 1);
    let mut cursor = 0;
    for start in starts {
        let segment = &patch[cursor..start];
        if !segment.is_empty() {
            chunks.push(segment);
        }
        cursor = start + FILE_BOUNDARY.len();
    }
    let tail = &patch[cursor..];
    if !tail.is_empty() {
        chunks.push(tail);
    }
    chunks
}

/// First line of a chunk, without its newline.
fn header_line(chunk: &str) -> &str {
    chunk.split('\n').next().unwrap_or("")
}

fn chunk_hash(chunk: &str) -> String {
    hex::encode(Sha256::digest(chunk.as_bytes()))
}

/// Keep the chunks of `patch` whose header contains any of `watched`.
///
/// Each distinct chunk text is emitted at most once per call, however many
/// watched substrings match it or however often it repeats in the patch.
pub fn extract_watched_chunks(patch: &str, watched: &[String]) -> String {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = String::new();

    for chunk in split_file_chunks(patch) {
        let header = header_line(chunk);
        if !watched.iter().any(|w| header.contains(w.as_str())) {
            continue;
        }
        if seen.insert(chunk_hash(chunk)) {
            out.push_str(chunk);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|s| s.to_string()).collect()
    }

    const TWO_FILES: &str = "diff --git a/test/README.md b/test/README.md
index 5239431..ccb9dcb 100644
--- a/test/README.md
+++ b/test/README.md
@@ -1,3 +1,6 @@
 Hello, world!
+321
diff --git a/test/other.txt b/test/other.txt
index 858c753..e563f08 100644
--- a/test/other.txt
+++ b/test/other.txt
@@ -1 +1,2 @@
 README 2 @
+README 2 @ NEW STRING 123
";

    #[test]
    fn test_keeps_only_watched_chunk() {
        let out = extract_watched_chunks(TWO_FILES, &w(&["README.md"]));
        assert_eq!(
            out,
            "a/test/README.md b/test/README.md
index 5239431..ccb9dcb 100644
--- a/test/README.md
+++ b/test/README.md
@@ -1,3 +1,6 @@
 Hello, world!
+321
"
        );
    }

    #[test]
    fn test_body_mention_does_not_match() {
        // other.txt's body mentions "README" but its header does not.
        let out = extract_watched_chunks(TWO_FILES, &w(&["README 2"]));
        assert!(out.is_empty());
    }

    #[test]
    fn test_duplicate_watch_entries_emit_once() {
        let out = extract_watched_chunks(TWO_FILES, &w(&["README.md", "README.md", "test/"]));
        assert_eq!(out.matches("a/test/README.md b/test/README.md").count(), 1);
        assert!(out.contains("a/test/other.txt"));
    }

    #[test]
    fn test_identical_chunks_emit_once() {
        let chunk = "diff --git a/x.md b/x.md\n--- a/x.md\n+++ b/x.md\n@@ -1 +1 @@\n-a\n+b\n";
        let patch = format!("{chunk}{chunk}");
        let out = extract_watched_chunks(&patch, &w(&["x.md"]));
        assert_eq!(out, &chunk[FILE_BOUNDARY.len()..]);
    }

    #[test]
    fn test_preserves_input_order() {
        let patch = "diff --git a/z.md b/z.md\n+z\ndiff --git a/a.md b/a.md\n+a\n";
        let out = extract_watched_chunks(patch, &w(&["a.md", "z.md"]));
        assert_eq!(out, "a/z.md b/z.md\n+z\na/a.md b/a.md\n+a\n");
    }

    #[test]
    fn test_marker_inside_line_is_not_a_boundary() {
        let patch = "diff --git a/n.md b/n.md\n+see diff --git a/x b/x here\n+more\n";
        let chunks = split_file_chunks(patch);
        assert_eq!(chunks.len(), 1);
        let out = extract_watched_chunks(patch, &w(&["a/x"]));
        assert!(out.is_empty());
    }

    #[test]
    fn test_empty_inputs() {
        assert!(extract_watched_chunks("", &w(&["README.md"])).is_empty());
        assert!(extract_watched_chunks(TWO_FILES, &[]).is_empty());
        assert!(split_file_chunks("").is_empty());
    }
}
