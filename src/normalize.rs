// 🎓 College Name Normalizer
// Collapses free-text institution names into a canonical comparison key

/// Ordered substring substitutions for common institutional-name
/// abbreviations. Applied after cleanup, in this exact order.
///
/// The list must stay duplicate-free: every pattern appears once, and no
/// replacement reintroduces a pattern earlier or later in the list, which is
/// what keeps `normalize_college_name` idempotent.
pub const REPLACEMENTS: &[(&str, &str)] = &[
    ("UNIVERSITY", "UNIV"),
    ("COLLEGE", "COLL"),
    ("INSTITUTE", "INST"),
    ("TECHNOLOGY", "TECH"),
    ("ENGINEERING", "ENGG"),
];

/// Normalize a college name for consistent comparison.
///
/// Cleanup steps: uppercase, drop every character that is neither
/// alphanumeric nor whitespace, collapse whitespace runs to single spaces
/// and trim, then apply [`REPLACEMENTS`] in order. Whitespace is collapsed
/// after the character strip so that removed punctuation cannot leave double
/// spaces behind (stable output on re-normalization).
///
/// Returns `None` for a missing name, and for any name that reduces to the
/// empty string after cleanup. A name with no canonical key is never
/// aggregated.
pub fn normalize_college_name(raw: Option<&str>) -> Option<String> {
    let raw = raw?;

    let upper = raw.to_uppercase();

    // Keep letters, digits and whitespace only
    let stripped: String = upper
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    // Collapse runs of whitespace to a single space and trim
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }

    let mut canonical = collapsed;
    for (pattern, replacement) in REPLACEMENTS {
        // Substitute to a fixpoint: a single pass can splice a fresh
        // occurrence together out of the text around a replacement. Every
        // replacement is shorter than its pattern, so this terminates.
        while canonical.contains(pattern) {
            canonical = canonical.replace(pattern, replacement);
        }
    }

    Some(canonical)
}
