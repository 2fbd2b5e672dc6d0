//! Keyword page selection.
//!
//! Only pages that mention an abstract/overview keyword are forwarded to the
//! oracle. When nothing matches (scanned covers, unusual layouts, OCR too
//! garbled) every extracted page is forwarded instead.

use crate::keywords::KeywordSet;
use crate::output::{KeywordHits, KeywordSelection};

/// Pick the pages to forward. `pages` are in document order; page numbers
/// in the result are 1-indexed.
pub fn select_pages(pages: &[String], keywords: &KeywordSet) -> KeywordSelection {
    let lowered: Vec<String> = pages.iter().map(|p| p.to_lowercase()).collect();

    let mut hits = KeywordHits::new();
    for term in keywords.terms() {
        let needle = term.to_lowercase();
        let found: Vec<usize> = lowered
            .iter()
            .enumerate()
            .filter(|(_, text)| text.contains(&needle))
            .map(|(i, _)| i + 1)
            .collect();
        if !found.is_empty() {
            hits.insert(term.clone(), found);
        }
    }

    let mut selected: Vec<usize> = hits.values().flatten().copied().collect();
    selected.sort_unstable();
    selected.dedup();

    let fell_back = selected.is_empty();
    if fell_back {
        selected = (1..=pages.len()).collect();
    }

    let text = selected
        .iter()
        .map(|&n| pages[n - 1].as_str())
        .collect::<Vec<_>>()
        .join("\n");

    KeywordSelection {
        hits,
        selected,
        fell_back,
        text,
    }
}
