//! Change snapshots — decides whether the document moved enough to analyze.
//!
//! DESIGN
//! ======
//! Markup and style are normalized so whitespace, formatting, and case churn
//! compare equal. A 32-bit rolling hash is a cheap pre-filter; when it
//! differs, a positional character diff decides. Any change in element count
//! is always significant.
//!
//! TRADE-OFFS
//! ==========
//! Hash collisions only hide a re-analysis until the next edit; the diff is
//! positional, so an insertion near the start of a long document reads as a
//! large change.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::config::DEFAULT_SIGNIFICANT_CHANGE_RATIO;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static BETWEEN_TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r">\s+<").expect("valid regex"));
static TRAILING_SEMICOLON: LazyLock<Regex> = LazyLock::new(|| Regex::new(r";\s*\}").expect("valid regex"));
static AFTER_OPEN_BRACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\s*").expect("valid regex"));
static AFTER_COLON: LazyLock<Regex> = LazyLock::new(|| Regex::new(r":\s*").expect("valid regex"));

/// Normalized view of the document used for change comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub normalized_markup: String,
    pub normalized_style: String,
    pub element_count: usize,
    pub structural_hash: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct ChangeSnapshotTracker {
    threshold: f64,
}

impl Default for ChangeSnapshotTracker {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNIFICANT_CHANGE_RATIO)
    }
}

impl ChangeSnapshotTracker {
    #[must_use]
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    #[must_use]
    pub fn snapshot(&self, raw_markup: &str, raw_style: &str, element_count: usize) -> Snapshot {
        let normalized_markup = normalize_markup(raw_markup);
        let normalized_style = normalize_style(raw_style);
        let structural_hash = rolling_hash(normalized_markup.chars().chain(normalized_style.chars()));
        Snapshot { normalized_markup, normalized_style, element_count, structural_hash }
    }

    #[must_use]
    pub fn is_significant(&self, old: Option<&Snapshot>, new: &Snapshot) -> bool {
        let Some(old) = old else {
            debug!("snapshot: first analysis");
            return true;
        };

        if old.element_count != new.element_count {
            debug!(from = old.element_count, to = new.element_count, "snapshot: element count changed");
            return true;
        }

        if old.structural_hash == new.structural_hash {
            debug!("snapshot: no structural change");
            return false;
        }

        let markup_diff = diff_ratio(&old.normalized_markup, &new.normalized_markup);
        let style_diff = diff_ratio(&old.normalized_style, &new.normalized_style);
        let significant = markup_diff > self.threshold || style_diff > self.threshold;
        debug!(markup_diff, style_diff, threshold = self.threshold, significant, "snapshot: content changed");
        significant
    }
}

// =============================================================================
// NORMALIZATION
// =============================================================================

#[must_use]
pub fn normalize_markup(markup: &str) -> String {
    let collapsed = WHITESPACE.replace_all(markup, " ");
    BETWEEN_TAGS
        .replace_all(&collapsed, "><")
        .trim()
        .to_lowercase()
}

#[must_use]
pub fn normalize_style(style: &str) -> String {
    let collapsed = WHITESPACE.replace_all(style, " ");
    let closed = TRAILING_SEMICOLON.replace_all(&collapsed, "}");
    let opened = AFTER_OPEN_BRACE.replace_all(&closed, "{");
    AFTER_COLON
        .replace_all(&opened, ":")
        .trim()
        .to_lowercase()
}

/// `h = h * 31 + c` over the characters, wrapping at 32 bits.
fn rolling_hash(chars: impl Iterator<Item = char>) -> u32 {
    chars.fold(0u32, |hash, c| hash.wrapping_mul(31).wrapping_add(u32::from(c)))
}

// =============================================================================
// DIFF
// =============================================================================

/// Fraction of differing characters between `a` and `b`, in `[0, 1]`.
///
/// Counts the length difference plus index-wise mismatches over the shorter
/// string, divided by the longer length.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn diff_ratio(a: &str, b: &str) -> f64 {
    if a == b {
        return 0.0;
    }
    if a.is_empty() || b.is_empty() {
        return 1.0;
    }

    let len_a = a.chars().count();
    let len_b = b.chars().count();
    let mismatches = a.chars().zip(b.chars()).filter(|(x, y)| x != y).count();
    let differences = len_a.abs_diff(len_b) + mismatches;
    differences as f64 / len_a.max(len_b) as f64
}

#[cfg(test)]
#[path = "snapshot_test.rs"]
mod tests;
