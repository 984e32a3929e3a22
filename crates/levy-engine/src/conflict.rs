//! # Conflict Detection
//!
//! Flags rules that cannot coexist in one registry.
//!
//! ## What Counts as a Conflict
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  (a) DUPLICATE ID      candidate.id == existing.id                      │
//! │                                                                         │
//! │  (b) AMBIGUOUS OVERLAP all of:                                          │
//! │      • same jurisdiction                                                │
//! │      • same tax type                                                    │
//! │      • windows intersect:  a.from < b.until  ∧  b.from < a.until        │
//! │      • geography intersects:                                            │
//! │          either country list empty (global) → overlap                   │
//! │          otherwise the two country lists share a country                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Geography here is country-level only. The applicability matcher also
//! looks at states, so two US rules for NY and CA are reported as
//! conflicting even though they never apply to the same address. Callers
//! that need both should give them different jurisdictions or types.

use levy_core::TaxRule;
use serde::{Deserialize, Serialize};

/// Why two rules conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    DuplicateId,
    Overlap,
}

/// A conflict between a candidate rule and one existing rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConflict {
    pub existing_rule_id: String,
    pub kind: ConflictKind,
    pub description: String,
}

/// Checks `candidate` against each rule in `existing`.
///
/// At most one conflict is reported per existing rule; a duplicate id
/// takes precedence over an overlap.
pub fn find_rule_conflicts<'a, I>(candidate: &TaxRule, existing: I) -> Vec<RuleConflict>
where
    I: IntoIterator<Item = &'a TaxRule>,
{
    existing
        .into_iter()
        .filter_map(|other| {
            if other.id == candidate.id {
                Some(RuleConflict {
                    existing_rule_id: other.id.clone(),
                    kind: ConflictKind::DuplicateId,
                    description: format!("rule id '{}' already exists", other.id),
                })
            } else if rules_overlap(candidate, other) {
                Some(RuleConflict {
                    existing_rule_id: other.id.clone(),
                    kind: ConflictKind::Overlap,
                    description: format!(
                        "overlaps '{}' ({} {} tax, same period and countries)",
                        other.id, other.jurisdiction, other.tax_type
                    ),
                })
            } else {
                None
            }
        })
        .collect()
}

/// Same jurisdiction, same type, intersecting windows and geography.
pub fn rules_overlap(a: &TaxRule, b: &TaxRule) -> bool {
    a.jurisdiction == b.jurisdiction
        && a.tax_type == b.tax_type
        && time_overlaps(a, b)
        && geography_overlaps(a, b)
}

/// Half-open interval intersection of the validity windows.
pub fn time_overlaps(a: &TaxRule, b: &TaxRule) -> bool {
    a.valid_from < b.valid_until && b.valid_from < a.valid_until
}

/// Country-level geography intersection; an empty list is global.
pub fn geography_overlaps(a: &TaxRule, b: &TaxRule) -> bool {
    if a.applicable_countries.is_empty() || b.applicable_countries.is_empty() {
        return true;
    }

    a.applicable_countries.iter().any(|country| {
        b.applicable_countries
            .iter()
            .any(|other| other.eq_ignore_ascii_case(country))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use levy_core::{CalculationMethod, Jurisdiction, TaxType};
    use rust_decimal_macros::dec;

    fn ts(y: i32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, 1, 0, 0, 0).unwrap()
    }

    fn sales(id: &str, countries: &[&str]) -> TaxRule {
        TaxRule::new(
            id,
            id,
            TaxType::Sales,
            Jurisdiction::State,
            CalculationMethod::Percentage,
            dec!(5),
        )
        .with_countries(countries)
    }

    #[test]
    fn test_duplicate_id() {
        let existing = vec![sales("a", &["US"])];
        let conflicts = find_rule_conflicts(&sales("a", &["CA"]), &existing);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::DuplicateId);
    }

    #[test]
    fn test_overlapping_countries_conflict() {
        let existing = vec![sales("a", &["US", "CA"])];
        let conflicts = find_rule_conflicts(&sales("b", &["us"]), &existing);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::Overlap);
        assert_eq!(conflicts[0].existing_rule_id, "a");
    }

    #[test]
    fn test_global_rule_overlaps_everything() {
        let existing = vec![sales("a", &["DE"])];
        assert_eq!(find_rule_conflicts(&sales("b", &[]), &existing).len(), 1);
    }

    #[test]
    fn test_disjoint_countries_do_not_conflict() {
        let existing = vec![sales("a", &["US"])];
        assert!(find_rule_conflicts(&sales("b", &["CA"]), &existing).is_empty());
    }

    #[test]
    fn test_states_are_ignored() {
        let existing = vec![sales("ny", &["US"]).with_states(&["NY"])];
        let candidate = sales("ca", &["US"]).with_states(&["CA"]);
        assert_eq!(find_rule_conflicts(&candidate, &existing).len(), 1);
    }

    #[test]
    fn test_adjacent_windows_do_not_overlap() {
        let h1 = sales("h1", &["US"]).with_window(ts(2024, 1), ts(2024, 7));
        let h2 = sales("h2", &["US"]).with_window(ts(2024, 7), ts(2025, 1));
        assert!(!time_overlaps(&h1, &h2));
        assert!(find_rule_conflicts(&h2, [&h1]).is_empty());

        let mid = sales("mid", &["US"]).with_window(ts(2024, 6), ts(2024, 8));
        assert!(time_overlaps(&h1, &mid));
        assert!(time_overlaps(&mid, &h2));
    }

    #[test]
    fn test_different_type_or_jurisdiction() {
        let existing = vec![sales("a", &["US"])];

        let mut excise = sales("b", &["US"]);
        excise.tax_type = TaxType::Excise;
        assert!(find_rule_conflicts(&excise, &existing).is_empty());

        let mut city = sales("c", &["US"]);
        city.jurisdiction = Jurisdiction::City;
        assert!(find_rule_conflicts(&city, &existing).is_empty());
    }
}
