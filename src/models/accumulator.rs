//! Deduplicated storage of health checks.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::models::health::{HealthSnapshot, Severity};

/// The deduplicated summary and detail strings observed for one
/// (check name, severity) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckEntry {
    /// Deduplicated summary lines. Serialized as an array; order carries no
    /// meaning.
    #[serde(default)]
    pub summary: BTreeSet<String>,
    /// Deduplicated detail lines.
    #[serde(default)]
    pub detail: BTreeSet<String>,
}

/// Deduplicated storage for a set of health checks.
///
/// Maps check name to severity to the strings observed at that severity.
/// Sets only grow: neither [`add`](Self::add) nor [`merge`](Self::merge) ever
/// removes an element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckAccumulator {
    checks: BTreeMap<String, BTreeMap<Severity, CheckEntry>>,
}

impl CheckAccumulator {
    /// Folds a raw health snapshot into the accumulator.
    ///
    /// Checks at [`Severity::Ok`] are dropped. Returns true iff at least one
    /// new summary or detail string was inserted across the whole batch.
    pub fn add(&mut self, snapshot: &HealthSnapshot) -> bool {
        let mut changed = false;

        for (name, check) in &snapshot.checks {
            if check.severity.is_ok() {
                continue;
            }

            if self.add_check(
                name,
                check.severity,
                std::iter::once(check.summary.as_str()),
                check.detail.iter().map(String::as_str),
            ) {
                changed = true;
            }
        }

        changed
    }

    /// Unions another accumulator's full check map into this one.
    ///
    /// Returns true iff at least one new string was inserted. Merging is
    /// a reporting concern only and never participates in flush-dirty
    /// tracking.
    pub fn merge(&mut self, other: &CheckAccumulator) -> bool {
        let mut changed = false;

        for (name, severities) in &other.checks {
            for (severity, entry) in severities {
                if self.add_check(
                    name,
                    *severity,
                    entry.summary.iter().map(String::as_str),
                    entry.detail.iter().map(String::as_str),
                ) {
                    changed = true;
                }
            }
        }

        changed
    }

    /// Returns the accumulated check map.
    pub fn checks(&self) -> &BTreeMap<String, BTreeMap<Severity, CheckEntry>> {
        &self.checks
    }

    /// True if no check has been accumulated.
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// The number of distinct check names accumulated.
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    fn add_check<'a>(
        &mut self,
        name: &str,
        severity: Severity,
        summaries: impl Iterator<Item = &'a str>,
        details: impl Iterator<Item = &'a str>,
    ) -> bool {
        let entry = self
            .checks
            .entry(name.to_string())
            .or_default()
            .entry(severity)
            .or_default();

        let mut changed = false;
        for summary in summaries {
            if entry.summary.insert(summary.to_string()) {
                changed = true;
            }
        }
        for detail in details {
            if entry.detail.insert(detail.to_string()) {
                changed = true;
            }
        }

        changed
    }
}

impl std::fmt::Display for CheckAccumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "check count {}", self.checks.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::health::HealthCheck;

    fn snapshot(name: &str, severity: Severity, summary: &str, detail: &[&str]) -> HealthSnapshot {
        HealthSnapshot::single(
            name,
            HealthCheck {
                severity,
                summary: summary.to_string(),
                detail: detail.iter().map(|d| d.to_string()).collect(),
            },
        )
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut acc = CheckAccumulator::default();
        let snap = snapshot("OSD_DOWN", Severity::Warning, "osd.1 down", &["osd.1 on host-a"]);

        assert!(acc.add(&snap));
        assert!(!acc.add(&snap));

        let entry = &acc.checks()["OSD_DOWN"][&Severity::Warning];
        assert_eq!(entry.summary.len(), 1);
        assert_eq!(entry.detail.len(), 1);
    }

    #[test]
    fn test_add_drops_ok_checks() {
        let mut acc = CheckAccumulator::default();
        let snap = snapshot("POOL_FULL", Severity::Ok, "all good", &[]);

        assert!(!acc.add(&snap));
        assert!(acc.is_empty());
    }

    #[test]
    fn test_add_tracks_severities_independently() {
        let mut acc = CheckAccumulator::default();
        assert!(acc.add(&snapshot("OSD_DOWN", Severity::Warning, "1 osd down", &[])));
        assert!(acc.add(&snapshot("OSD_DOWN", Severity::Error, "5 osds down", &[])));

        let severities = &acc.checks()["OSD_DOWN"];
        assert_eq!(severities.len(), 2);
        assert!(severities[&Severity::Warning].summary.contains("1 osd down"));
        assert!(severities[&Severity::Error].summary.contains("5 osds down"));
    }

    #[test]
    fn test_add_reports_change_for_new_detail_only() {
        let mut acc = CheckAccumulator::default();
        assert!(acc.add(&snapshot("OSD_DOWN", Severity::Warning, "osd down", &["osd.1"])));
        // Same summary, one new detail line.
        assert!(acc.add(&snapshot("OSD_DOWN", Severity::Warning, "osd down", &["osd.1", "osd.2"])));

        let entry = &acc.checks()["OSD_DOWN"][&Severity::Warning];
        assert_eq!(entry.detail.len(), 2);
    }

    #[test]
    fn test_merge_is_commutative_and_associative() {
        let mut a = CheckAccumulator::default();
        a.add(&snapshot("OSD_DOWN", Severity::Warning, "osd.1 down", &["osd.1"]));
        let mut b = CheckAccumulator::default();
        b.add(&snapshot("OSD_DOWN", Severity::Warning, "osd.2 down", &["osd.2"]));
        let mut c = CheckAccumulator::default();
        c.add(&snapshot("PG_DEGRADED", Severity::Error, "pgs degraded", &[]));

        // (a ∪ b) ∪ c
        let mut left = a.clone();
        left.merge(&b);
        left.merge(&c);

        // a ∪ (b ∪ c), folded in the other order
        let mut right = c.clone();
        right.merge(&b);
        right.merge(&a);

        assert_eq!(left, right);
        assert_eq!(left.checks()["OSD_DOWN"][&Severity::Warning].summary.len(), 2);
    }

    #[test]
    fn test_merge_reports_change() {
        let mut a = CheckAccumulator::default();
        a.add(&snapshot("OSD_DOWN", Severity::Warning, "osd.1 down", &[]));
        let b = a.clone();

        let mut target = CheckAccumulator::default();
        assert!(target.merge(&a));
        assert!(!target.merge(&b));
    }

    #[test]
    fn test_sets_serialize_as_arrays() {
        let mut acc = CheckAccumulator::default();
        acc.add(&snapshot("OSD_DOWN", Severity::Warning, "osd.1 down", &["osd.1 on host-a"]));

        let value = serde_json::to_value(&acc).unwrap();
        assert_eq!(
            value["OSD_DOWN"]["warning"]["summary"],
            serde_json::json!(["osd.1 down"])
        );
        assert_eq!(
            value["OSD_DOWN"]["warning"]["detail"],
            serde_json::json!(["osd.1 on host-a"])
        );

        let back: CheckAccumulator = serde_json::from_value(value).unwrap();
        assert_eq!(back, acc);
    }
}
