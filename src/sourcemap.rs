//! The path-indexed byte-range index produced as a side effect of decode
//! (spec.md §4.5).
//!
//! Grounded in the position-tracking pattern the teacher already uses for
//! one-off raw-CBOR capture. `pallas_codec::cborheap::KeepCbor` records a
//! `start..end` range around a single decoded field via
//! `Decoder::position()` before and after; `pallas_codec::utils::KeepRaw`
//! does the same thing with `Decoder::input()`/`position()`. This module
//! generalizes that single-field capture into a full parent/child linked
//! table built during one decode pass, rather than requiring the caller to
//! sprinkle `KeepRaw`/`KeepCbor` wrappers through a hand-written schema.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One entry in a [`SourceMap`]: the byte range that produced a single
/// decoded value, its place in the tree, and (for sized types) the
/// header/content split.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SourceMapEntry {
    pub path: String,
    pub start: u32,
    pub end: u32,
    pub major_type: u8,
    pub type_tag: String,
    pub parent: Option<String>,
    pub children: Vec<String>,
    pub is_header: bool,
    pub is_content: bool,
    pub header_end: Option<u32>,
    pub content_path: Option<String>,
}

/// The flat, append-only table returned alongside a decoded value by
/// [`crate::decoder::Decoder::parse_with_source_map`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SourceMap {
    pub entries: Vec<SourceMapEntry>,
}

impl SourceMap {
    /// Checks the two blanket invariants from spec.md §4.5: entries cover
    /// `[0, bytes_consumed)` with no partial overlap, and `start` is
    /// non-decreasing across the entry list. Exposed for tests and for
    /// callers who want to assert the invariant themselves.
    pub fn check_coverage(&self, bytes_consumed: u32) -> bool {
        if self.entries.is_empty() {
            return bytes_consumed == 0;
        }
        let mut ranges: Vec<(u32, u32)> = self.entries.iter().map(|e| (e.start, e.end)).collect();
        ranges.sort();
        let mut last_start = 0u32;
        for (s, _) in &ranges {
            if *s < last_start {
                return false;
            }
            last_start = *s;
        }
        // Union check over the *leaf* (non-overlapping) ranges only: a
        // container's own range wholly contains its children's ranges by
        // construction, so naive interval-union over every entry would
        // double count. We instead check that no two entries partially
        // (as opposed to fully nested) overlap, and that the maximal
        // top-level ranges already span [0, bytes_consumed).
        for i in 0..ranges.len() {
            for j in (i + 1)..ranges.len() {
                let (a0, a1) = ranges[i];
                let (b0, b1) = ranges[j];
                let nested = (a0 <= b0 && b1 <= a1) || (b0 <= a0 && a1 <= b1);
                let disjoint = a1 <= b0 || b1 <= a0;
                if !nested && !disjoint {
                    return false;
                }
            }
        }
        let root_end = self
            .entries
            .iter()
            .filter(|e| e.parent.is_none())
            .map(|e| e.end)
            .max()
            .unwrap_or(0);
        root_end == bytes_consumed
    }
}

/// Escapes `.`, `[`, `]`, `\` inside a path key literal (spec.md §4.5 path
/// grammar).
pub fn escape_key_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '.' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Renders the path segment for array element `i` of `parent`.
pub fn array_element_path(parent: &str, i: usize) -> String {
    format!("{parent}[{i}]")
}

/// Renders the path segment for tag content of `parent`.
pub fn tag_content_path(parent: &str) -> String {
    format!("{parent}.value")
}

/// Renders the path segment for a map value under `parent`, keyed by
/// `key`, at decode-order index `index` within the map.
///
/// Text keys render as `parent.key` (escaped). All other key shapes use
/// the `parent[#key:i]` fallback named in spec.md §4.5; for byte-string
/// keys specifically, `i` is the hex encoding of the key bytes rather
/// than a bare occurrence index (this crate's resolution of spec.md §9
/// Open Question 3), reusing the hex convention `pallas_codec::utils::
/// Bytes` already applies to byte-string round-tripping elsewhere in the
/// corpus instead of inventing a new rendering.
pub fn map_value_path(parent: &str, key: &crate::value::Value, index: usize) -> String {
    match key {
        crate::value::Value::Text(t) => {
            format!("{parent}.{}", escape_key_literal(&t.value))
        }
        crate::value::Value::Bytes(b) => {
            format!("{parent}[#key:{}]", hex::encode(&b.value))
        }
        _ => format!("{parent}[#key:{index}]"),
    }
}

pub(crate) struct SourceMapBuilder {
    entries: Vec<SourceMapEntry>,
}

impl SourceMapBuilder {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Reserves a slot for a container (array/map/tag) before its
    /// children are decoded, so the parent's `start` precedes every
    /// child's `start` in the append order (keeps the "non-decreasing
    /// start" invariant trivially true). Returns the index to pass to
    /// [`Self::finish`].
    pub fn reserve(
        &mut self,
        path: String,
        parent: Option<String>,
        major_type: u8,
        type_tag: String,
        start: u32,
    ) -> usize {
        let idx = self.entries.len();
        self.entries.push(SourceMapEntry {
            path,
            start,
            end: start,
            major_type,
            type_tag,
            parent,
            children: Vec::new(),
            is_header: false,
            is_content: false,
            header_end: None,
            content_path: None,
        });
        idx
    }

    pub fn finish(&mut self, idx: usize, end: u32, children: Vec<String>) {
        self.entries[idx].end = end;
        self.entries[idx].children = children;
    }

    /// Adds a complete leaf entry (scalar: uint/nint/float/simple, or an
    /// indefinite byte/text string left unsplit).
    pub fn add_leaf(
        &mut self,
        path: String,
        parent: Option<String>,
        major_type: u8,
        type_tag: String,
        start: u32,
        end: u32,
    ) {
        self.entries.push(SourceMapEntry {
            path,
            start,
            end,
            major_type,
            type_tag,
            parent,
            children: Vec::new(),
            is_header: false,
            is_content: false,
            header_end: None,
            content_path: None,
        });
    }

    /// Adds the header/content pair for a definite-length byte or text
    /// string (spec.md §4.5: "split into two entries sharing the same
    /// outer path").
    pub fn add_header_content(
        &mut self,
        path: String,
        parent: Option<String>,
        major_type: u8,
        type_tag: String,
        start: u32,
        header_end: u32,
        end: u32,
    ) {
        let content_path = format!("{path}#content");
        self.entries.push(SourceMapEntry {
            path,
            start,
            end: header_end,
            major_type,
            type_tag: type_tag.clone(),
            parent: parent.clone(),
            children: Vec::new(),
            is_header: true,
            is_content: false,
            header_end: Some(header_end),
            content_path: Some(content_path.clone()),
        });
        self.entries.push(SourceMapEntry {
            path: content_path,
            start: header_end,
            end,
            major_type,
            type_tag,
            parent,
            children: Vec::new(),
            is_header: false,
            is_content: true,
            header_end: None,
            content_path: None,
        });
    }

    pub fn build(self) -> SourceMap {
        SourceMap {
            entries: self.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_special_characters() {
        assert_eq!(escape_key_literal("a.b[c]\\d"), "a\\.b\\[c\\]\\\\d");
    }

    #[test]
    fn coverage_accepts_nested_non_overlapping_ranges() {
        let map = SourceMap {
            entries: vec![
                SourceMapEntry {
                    path: "".into(),
                    start: 0,
                    end: 4,
                    major_type: 4,
                    type_tag: "Array".into(),
                    parent: None,
                    children: vec!["[0]".into()],
                    is_header: false,
                    is_content: false,
                    header_end: None,
                    content_path: None,
                },
                SourceMapEntry {
                    path: "[0]".into(),
                    start: 1,
                    end: 4,
                    major_type: 0,
                    type_tag: "uint".into(),
                    parent: Some("".into()),
                    children: vec![],
                    is_header: false,
                    is_content: false,
                    header_end: None,
                    content_path: None,
                },
            ],
        };
        assert!(map.check_coverage(4));
    }
}
