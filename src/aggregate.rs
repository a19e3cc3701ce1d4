// 📊 College Statistics Accumulator
// Per-institution category counts, keyed by canonical name

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Admission-tier category attached to a score record.
///
/// The domain is fixed at five values. Anything outside it is treated as
/// "no category" and never counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    C1,
    C2,
    C3,
    C4,
    C5,
}

impl Category {
    /// All categories, in report column order.
    pub const ALL: [Category; 5] = [
        Category::C1,
        Category::C2,
        Category::C3,
        Category::C4,
        Category::C5,
    ];

    /// Parse a raw category value. Unknown values yield `None`.
    pub fn parse(raw: &str) -> Option<Category> {
        match raw {
            "C1" => Some(Category::C1),
            "C2" => Some(Category::C2),
            "C3" => Some(Category::C3),
            "C4" => Some(Category::C4),
            "C5" => Some(Category::C5),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::C1 => "C1",
            Category::C2 => "C2",
            Category::C3 => "C3",
            Category::C4 => "C4",
            Category::C5 => "C5",
        }
    }

    fn index(self) -> usize {
        match self {
            Category::C1 => 0,
            Category::C2 => 1,
            Category::C3 => 2,
            Category::C4 => 3,
            Category::C5 => 4,
        }
    }
}

/// Per-institution tally under one canonical key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollegeAggregate {
    /// First original spelling observed for this key. Immutable once set.
    original_name: String,
    counts: [u64; 5],
}

impl CollegeAggregate {
    fn new(original_name: &str) -> Self {
        CollegeAggregate {
            original_name: original_name.to_string(),
            counts: [0; 5],
        }
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn count(&self, category: Category) -> u64 {
        self.counts[category.index()]
    }

    /// Sum of the five category counters.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// One row of [`CollegeStats::snapshot`]. No enforced order; sorting is a
/// report concern.
#[derive(Debug, Clone)]
pub struct CollegeSnapshot {
    pub canonical_name: String,
    pub original_name: String,
    pub counts: [u64; 5],
    pub total: u64,
}

/// Accumulator for college-wise category counts.
///
/// Constructed empty by the driver at the start of a run, mutated
/// monotonically across every window, and read once at the end. A restarted
/// run must start from a fresh accumulator or counts will double.
#[derive(Debug, Default)]
pub struct CollegeStats {
    colleges: HashMap<String, CollegeAggregate>,
}

impl CollegeStats {
    pub fn new() -> Self {
        CollegeStats::default()
    }

    /// Record one score under a canonical institution key.
    ///
    /// A missing canonical key is a no-op (unresolvable institutions are not
    /// aggregated). A missing category is a no-op as well; the record stays
    /// eligible for persistence, only counting is skipped. The first
    /// original spelling seen for a key becomes its permanent display name.
    pub fn record(
        &mut self,
        canonical_name: Option<&str>,
        original_name: &str,
        category: Option<Category>,
    ) {
        let Some(canonical_name) = canonical_name else {
            return;
        };
        let Some(category) = category else {
            return;
        };

        let aggregate = self
            .colleges
            .entry(canonical_name.to_string())
            .or_insert_with(|| CollegeAggregate::new(original_name));
        aggregate.counts[category.index()] += 1;
    }

    /// Number of unique institutions seen so far.
    pub fn len(&self) -> usize {
        self.colleges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colleges.is_empty()
    }

    pub fn get(&self, canonical_name: &str) -> Option<&CollegeAggregate> {
        self.colleges.get(canonical_name)
    }

    /// Unordered projection of the accumulator.
    pub fn snapshot(&self) -> Vec<CollegeSnapshot> {
        self.colleges
            .iter()
            .map(|(canonical, aggregate)| CollegeSnapshot {
                canonical_name: canonical.clone(),
                original_name: aggregate.original_name.clone(),
                counts: aggregate.counts,
                total: aggregate.total(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_by_category() {
        let mut stats = CollegeStats::new();

        stats.record(Some("INDIAN INST OF TECH"), "Indian Institute of Technology", Some(Category::C1));
        stats.record(Some("INDIAN INST OF TECH"), "Indian Institute of Technology", Some(Category::C1));
        stats.record(Some("INDIAN INST OF TECH"), "Indian Institute of Technology", Some(Category::C3));

        let aggregate = stats.get("INDIAN INST OF TECH").unwrap();
        assert_eq!(aggregate.count(Category::C1), 2);
        assert_eq!(aggregate.count(Category::C3), 1);
        assert_eq!(aggregate.count(Category::C2), 0);
        assert_eq!(aggregate.total(), 3, "total must equal the sum of the five counters");
    }

    #[test]
    fn test_missing_canonical_key_is_a_noop() {
        let mut stats = CollegeStats::new();
        stats.record(None, "Somewhere", Some(Category::C1));
        assert!(stats.is_empty());
    }

    #[test]
    fn test_unknown_category_is_never_counted() {
        let mut stats = CollegeStats::new();

        // Missing category creates no entry at all
        stats.record(Some("KEY"), "Key College", None);
        assert!(stats.is_empty());

        // And leaves existing counters untouched
        stats.record(Some("KEY"), "Key College", Some(Category::C2));
        stats.record(Some("KEY"), "Key College", None);
        assert_eq!(stats.get("KEY").unwrap().total(), 1);
    }

    #[test]
    fn test_first_spelling_becomes_permanent_display_name() {
        let mut stats = CollegeStats::new();

        stats.record(Some("ST XAVIERS COLL"), "St. Xavier's College", Some(Category::C2));
        stats.record(Some("ST XAVIERS COLL"), "ST XAVIERS COLLEGE", Some(Category::C4));

        let aggregate = stats.get("ST XAVIERS COLL").unwrap();
        assert_eq!(aggregate.original_name(), "St. Xavier's College");
        assert_eq!(aggregate.total(), 2);
    }

    #[test]
    fn test_snapshot_carries_totals() {
        let mut stats = CollegeStats::new();
        stats.record(Some("A"), "A College", Some(Category::C1));
        stats.record(Some("B"), "B College", Some(Category::C5));
        stats.record(Some("B"), "B College", Some(Category::C5));

        let mut snapshot = stats.snapshot();
        snapshot.sort_by(|a, b| a.canonical_name.cmp(&b.canonical_name));

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].canonical_name, "A");
        assert_eq!(snapshot[0].total, 1);
        assert_eq!(snapshot[1].counts[4], 2);
        assert_eq!(snapshot[1].total, 2);
    }

    #[test]
    fn test_category_parse_rejects_unknown_values() {
        assert_eq!(Category::parse("C1"), Some(Category::C1));
        assert_eq!(Category::parse("C5"), Some(Category::C5));
        assert_eq!(Category::parse("C6"), None);
        assert_eq!(Category::parse("c1"), None);
        assert_eq!(Category::parse(""), None);
    }
}
