use crate::catalog::TenseCatalog;
use crate::model::progress::{Percent, TenseProgress};
use crate::model::tense::{TenseCategory, TenseStatus};

/// Aggregate view of a snapshot, as shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSummary {
    pub mastery_rate: Percent,
    pub mastered: usize,
    pub in_progress: usize,
    pub locked: usize,
    pub categories: Vec<CategorySummary>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySummary {
    pub category: TenseCategory,
    pub records: Vec<TenseProgress>,
}

impl ProgressSummary {
    /// Summarize `records`, grouping them by the catalog's categories.
    ///
    /// The mastery rate is the mean progress over all records, rounded down.
    #[must_use]
    pub fn from_snapshot(catalog: &TenseCatalog, records: &[TenseProgress]) -> Self {
        let count = |status: TenseStatus| records.iter().filter(|r| r.status == status).count();

        let total: i64 = records.iter().map(|r| i64::from(r.progress.value())).sum();
        let len = i64::try_from(records.len()).unwrap_or(i64::MAX);
        let mastery_rate = if len == 0 {
            Percent::ZERO
        } else {
            Percent::saturating(total / len)
        };

        let categories = TenseCategory::ALL
            .into_iter()
            .map(|category| CategorySummary {
                category,
                records: records
                    .iter()
                    .filter(|r| catalog.get(&r.id).is_some_and(|d| d.category == category))
                    .cloned()
                    .collect(),
            })
            .collect();

        Self {
            mastery_rate,
            mastered: count(TenseStatus::Mastered),
            in_progress: count(TenseStatus::InProgress),
            locked: count(TenseStatus::Locked),
            categories,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarizes_seed_snapshot() {
        let catalog = TenseCatalog::builtin();
        let summary = ProgressSummary::from_snapshot(catalog, &catalog.default_snapshot());

        // (45 + 100) / 12
        assert_eq!(summary.mastery_rate.value(), 12);
        assert_eq!(summary.mastered, 1);
        assert_eq!(summary.in_progress, 1);
        assert_eq!(summary.locked, 6);
        assert_eq!(summary.categories.len(), 3);
        assert!(summary.categories.iter().all(|c| c.records.len() == 4));
    }

    #[test]
    fn empty_snapshot_has_zero_mastery() {
        let summary = ProgressSummary::from_snapshot(TenseCatalog::builtin(), &[]);
        assert_eq!(summary.mastery_rate, Percent::ZERO);
    }
}
