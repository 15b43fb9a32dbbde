//! Archive entry names.
//!
//! * PDF pages: `{page}_{stem}.{ext}` with `page` 1-indexed.
//! * Images:    `{stem}.{ext}`, deduplicated within one batch.
//!
//! The stem is derived from the client-supplied filename with any directory
//! part removed, so an entry can never climb out of the archive root.

use crate::config::OutputFormat;
use std::collections::HashSet;

/// Longest stem kept, in bytes. Leaves room for the page prefix, a
/// de-duplication suffix and the extension within a 255-byte file name.
pub const MAX_STEM_BYTES: usize = 200;

/// Client filename reduced to a safe stem (no directories, no extension).
pub fn file_stem(file_name: &str, fallback: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let base: String = base.chars().filter(|c| !c.is_control()).collect();
    let stem = match base.rfind('.') {
        Some(0) | None => base.as_str(),
        Some(dot) => &base[..dot],
    };
    let stem = truncate_to_boundary(stem, MAX_STEM_BYTES).trim();
    if stem.is_empty() || stem == "." || stem == ".." {
        fallback.to_string()
    } else {
        stem.to_string()
    }
}

fn truncate_to_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Entry name for 0-based page `index` of the PDF `stem`.
pub fn page_entry_name(index: usize, stem: &str, format: OutputFormat) -> String {
    format!("{}_{}.{}", index + 1, stem, format.extension())
}

/// Hands out image entry names, suffixing repeats with `-2`, `-3`, …
#[derive(Debug, Default)]
pub struct EntryNames {
    taken: HashSet<String>,
}

impl EntryNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, stem: &str, format: OutputFormat) -> String {
        let ext = format.extension();
        let mut name = format!("{stem}.{ext}");
        let mut n = 2;
        while !self.taken.insert(name.clone()) {
            name = format!("{stem}-{n}.{ext}");
            n += 1;
        }
        name
    }
}
