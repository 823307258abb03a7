// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Watchlist classification - which detections count as integrity violations

use serde::{Deserialize, Serialize};

use super::Detection;

/// Label predicate. Comparison ignores ASCII case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelMatcher {
    Exact(String),
    Contains(String),
}

impl LabelMatcher {
    pub fn matches(&self, label: &str) -> bool {
        match self {
            LabelMatcher::Exact(expected) => label.eq_ignore_ascii_case(expected),
            LabelMatcher::Contains(needle) => label
                .to_ascii_lowercase()
                .contains(&needle.to_ascii_lowercase()),
        }
    }
}

/// One watched object class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub matcher: LabelMatcher,
    pub min_confidence: f32,
}

impl WatchlistEntry {
    pub fn contains(needle: &str, min_confidence: f32) -> Self {
        Self {
            matcher: LabelMatcher::Contains(needle.to_string()),
            min_confidence,
        }
    }

    pub fn exact(label: &str, min_confidence: f32) -> Self {
        Self {
            matcher: LabelMatcher::Exact(label.to_string()),
            min_confidence,
        }
    }

    pub fn accepts(&self, detection: &Detection) -> bool {
        self.matcher.matches(&detection.label) && detection.confidence >= self.min_confidence
    }
}

/// Winning (entry, detection) pair of a classification pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchlistMatch<'a> {
    pub entry_index: usize,
    pub detection: &'a Detection,
}

/// Ordered watchlist
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Watchlist {
    entries: Vec<WatchlistEntry>,
}

impl Watchlist {
    pub fn new(entries: Vec<WatchlistEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[WatchlistEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First match in entry order; within an entry, detections keep input order.
    /// Confidence never reorders the scan.
    pub fn first_match<'a>(&self, detections: &'a [Detection]) -> Option<WatchlistMatch<'a>> {
        self.entries.iter().enumerate().find_map(|(entry_index, entry)| {
            detections
                .iter()
                .find(|detection| entry.accepts(detection))
                .map(|detection| WatchlistMatch { entry_index, detection })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matchers_ignore_case() {
        assert!(LabelMatcher::Exact("Cell Phone".into()).matches("cell phone"));
        assert!(!LabelMatcher::Exact("phone".into()).matches("cell phone"));
        assert!(LabelMatcher::Contains("PHONE".into()).matches("cell phone"));
        assert!(!LabelMatcher::Contains("laptop".into()).matches("cell phone"));
    }

    #[test]
    fn test_entry_order_wins_over_score() {
        let watchlist = Watchlist::new(vec![
            WatchlistEntry::contains("phone", 0.5),
            WatchlistEntry::contains("cat", 0.5),
        ]);
        let detections = vec![Detection::new("cat", 0.9), Detection::new("phone", 0.95)];

        let hit = watchlist.first_match(&detections).unwrap();
        assert_eq!(hit.entry_index, 0);
        assert_eq!(hit.detection.label, "phone");
    }

    #[test]
    fn test_input_order_breaks_ties_within_entry() {
        let watchlist = Watchlist::new(vec![WatchlistEntry::contains("phone", 0.5)]);
        let detections = vec![
            Detection::new("cell phone", 0.6),
            Detection::new("phone", 0.99),
        ];

        let hit = watchlist.first_match(&detections).unwrap();
        assert_eq!(hit.detection.label, "cell phone");
    }

    #[test]
    fn test_below_threshold_is_suppressed() {
        let watchlist = Watchlist::new(vec![WatchlistEntry::contains("phone", 0.3)]);

        assert!(watchlist.first_match(&[Detection::new("phone", 0.2)]).is_none());
        assert!(watchlist.first_match(&[Detection::new("phone", 0.3)]).is_some());
    }

    #[test]
    fn test_empty_watchlist_never_matches() {
        let watchlist = Watchlist::default();
        assert!(watchlist.is_empty());
        assert!(watchlist.first_match(&[Detection::new("phone", 1.0)]).is_none());
    }

    #[test]
    fn test_entry_deserializes_from_toml() {
        let entry: WatchlistEntry = toml::from_str(
            r#"
            min_confidence = 0.6
            matcher = { contains = "book" }
            "#,
        )
        .unwrap();

        assert_eq!(entry, WatchlistEntry::contains("book", 0.6));
    }
}
