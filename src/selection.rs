//! Chapter numbering and range selection.
//!
//! Chapters are addressed by the number embedded in their locator
//! (`.../chapter-205/`), and the user picks them with one of three
//! expressions: `34`, `34:60` or `34::`.

use crate::error::SelectionError;
use crate::scrapers::ChapterRef;
use std::fmt;

/// Token preceding the chapter number in a locator.
const CHAPTER_MARKER: &str = "chapter-";

/// Marker for an open-ended range (`N::`).
const OPEN_ENDED_MARKER: &str = "::";

/// Marker for a bounded range (`N:M`).
const RANGE_MARKER: char = ':';

/// Extracts the chapter number embedded in a locator.
///
/// Takes the text after the last `chapter-` up to the next `/`, keeps only
/// digits and `.`, and parses it. Returns `None` when the marker is missing,
/// nothing numeric remains, or the remainder is not a valid number.
pub fn chapter_number(locator: &str) -> Option<f64> {
    let (_, rest) = locator.rsplit_once(CHAPTER_MARKER)?;
    let segment = rest.split('/').next().unwrap_or_default();
    let digits: String = segment
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    if digits.is_empty() {
        return None;
    }

    digits.parse::<f64>().ok()
}

/// Sort key for a locator.
///
/// Locators without a usable number get `0.0` and therefore sort to the
/// front of the sequence, ahead of every real chapter.
pub fn sort_key(locator: &str) -> f64 {
    chapter_number(locator).unwrap_or(0.0)
}

/// A chapter paired with its numeric sort key.
#[derive(Debug, Clone)]
pub struct ChapterKey {
    pub chapter: ChapterRef,
    pub number: f64,
}

impl ChapterKey {
    pub fn new(chapter: ChapterRef) -> Self {
        let number = sort_key(&chapter.locator);
        Self { chapter, number }
    }
}

/// A parsed selection expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionRange {
    /// `N`: chapters numbered exactly `N`.
    Exact(f64),
    /// `N:M`: chapters in `[N, M]`. An inverted range selects nothing.
    Bounded(f64, f64),
    /// `N::`: chapters numbered `N` or above.
    OpenEnded(f64),
}

impl SelectionRange {
    /// Parses a selection expression.
    pub fn parse(expr: &str) -> Result<Self, SelectionError> {
        let expr = expr.trim();

        if expr.contains(OPEN_ENDED_MARKER) {
            let lo = expr.replace(OPEN_ENDED_MARKER, "");
            return Ok(SelectionRange::OpenEnded(parse_number(&lo)?));
        }

        if expr.contains(RANGE_MARKER) {
            let parts: Vec<&str> = expr.split(RANGE_MARKER).collect();
            let [lo, hi] = parts.as_slice() else {
                return Err(SelectionError::InvalidFormat(expr.to_string()));
            };
            return Ok(SelectionRange::Bounded(parse_number(lo)?, parse_number(hi)?));
        }

        Ok(SelectionRange::Exact(parse_number(expr)?))
    }

    /// Returns true if a chapter with this key is selected.
    ///
    /// `Exact` compares with plain floating-point equality, no tolerance.
    pub fn contains(&self, key: f64) -> bool {
        match *self {
            SelectionRange::Exact(n) => key == n,
            SelectionRange::Bounded(lo, hi) => lo <= key && key <= hi,
            SelectionRange::OpenEnded(lo) => key >= lo,
        }
    }
}

impl fmt::Display for SelectionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionRange::Exact(n) => write!(f, "chapter {}", n),
            SelectionRange::Bounded(lo, hi) => write!(f, "chapters {} to {}", lo, hi),
            SelectionRange::OpenEnded(lo) => write!(f, "chapters {} onwards", lo),
        }
    }
}

fn parse_number(token: &str) -> Result<f64, SelectionError> {
    let token = token.trim();
    match token.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(n),
        _ => Err(SelectionError::InvalidNumber(token.to_string())),
    }
}

/// Sorts chapters by number and keeps those matching `expr`.
///
/// The sort is stable, so chapters sharing a number keep their index order.
/// An empty result is not an error.
pub fn select(chapters: &[ChapterRef], expr: &str) -> Result<Vec<ChapterRef>, SelectionError> {
    let range = SelectionRange::parse(expr)?;
    Ok(select_range(chapters, range))
}

/// Like [`select`], with an already parsed range.
pub fn select_range(chapters: &[ChapterRef], range: SelectionRange) -> Vec<ChapterRef> {
    let mut keyed: Vec<ChapterKey> = chapters.iter().cloned().map(ChapterKey::new).collect();
    keyed.sort_by(|a, b| a.number.total_cmp(&b.number));

    keyed
        .into_iter()
        .filter(|k| range.contains(k.number))
        .map(|k| k.chapter)
        .collect()
}
