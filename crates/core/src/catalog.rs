//! Static catalog of the tenses tracked by the app.
//!
//! The catalog defines the full key set of the local progress snapshot and
//! the seed values a fresh snapshot starts from.

use std::sync::OnceLock;

use crate::model::{Percent, TenseCategory, TenseDefinition, TenseId, TenseProgress, TenseStatus};

struct Seed {
    id: &'static str,
    name: &'static str,
    english_name: &'static str,
    category: TenseCategory,
    example: &'static str,
    status: TenseStatus,
    progress: u8,
    formula: &'static str,
    definition: &'static str,
}

const SEEDS: [Seed; 12] = [
    Seed {
        id: "pres_simple",
        name: "現在簡單式",
        english_name: "Simple Present",
        category: TenseCategory::Present,
        example: "I eat apple every day.",
        status: TenseStatus::Unlocked,
        progress: 0,
        formula: "S + V(s/es)",
        definition: "表達一般性的事實、反覆發生的習慣或永恆的真理。",
    },
    Seed {
        id: "pres_cont",
        name: "現在進行式",
        english_name: "Present Continuous",
        category: TenseCategory::Present,
        example: "I am eating now.",
        status: TenseStatus::InProgress,
        progress: 45,
        formula: "be (am/is/are) + V-ing",
        definition: "表達說話當下正在進行的動作，或現階段暫時的情況。",
    },
    Seed {
        id: "pres_perf",
        name: "現在完成式",
        english_name: "Present Perfect",
        category: TenseCategory::Present,
        example: "I have eaten.",
        status: TenseStatus::Unlocked,
        progress: 0,
        formula: "have/has + p.p.",
        definition: "過去發生但對現在造成影響的動作，或動作從過去持續到現在。",
    },
    Seed {
        id: "pres_perf_cont",
        name: "現在完成進行式",
        english_name: "Present Perfect Continuous",
        category: TenseCategory::Present,
        example: "I have been eating for an hour.",
        status: TenseStatus::Locked,
        progress: 0,
        formula: "have/has + been + V-ing",
        definition: "強調動作從過去某個時間點開始，一直持續到現在，且可能還在繼續。",
    },
    Seed {
        id: "past_simple",
        name: "過去簡單式",
        english_name: "Simple Past",
        category: TenseCategory::Past,
        example: "I ate an apple yesterday.",
        status: TenseStatus::Mastered,
        progress: 100,
        formula: "S + V-ed",
        definition: "表達過去某個特定時間點發生並已結束的動作。",
    },
    Seed {
        id: "past_cont",
        name: "過去進行式",
        english_name: "Past Continuous",
        category: TenseCategory::Past,
        example: "I was eating when you called.",
        status: TenseStatus::Unlocked,
        progress: 0,
        formula: "was/were + V-ing",
        definition: "描述過去某個特定時刻正在進行的動作。",
    },
    Seed {
        id: "past_perf",
        name: "過去完成式",
        english_name: "Past Perfect",
        category: TenseCategory::Past,
        example: "I had eaten before he arrived.",
        status: TenseStatus::Locked,
        progress: 0,
        formula: "had + p.p.",
        definition: "表示在過去某個動作或時間點之前已經完成的動作（過去的過去）。",
    },
    Seed {
        id: "past_perf_cont",
        name: "過去完成進行式",
        english_name: "Past Perfect Continuous",
        category: TenseCategory::Past,
        example: "I had been eating for hours.",
        status: TenseStatus::Locked,
        progress: 0,
        formula: "had + been + V-ing",
        definition: "表示在過去某個時間點之前，一直在持續進行的動作。",
    },
    Seed {
        id: "fut_simple",
        name: "未來簡單式",
        english_name: "Simple Future",
        category: TenseCategory::Future,
        example: "I will eat later.",
        status: TenseStatus::Unlocked,
        progress: 0,
        formula: "will + V / be going to + V",
        definition: "預測未來、表達未來的意圖或計畫。",
    },
    Seed {
        id: "fut_cont",
        name: "未來進行式",
        english_name: "Future Continuous",
        category: TenseCategory::Future,
        example: "I will be eating at 8 PM.",
        status: TenseStatus::Locked,
        progress: 0,
        formula: "will + be + V-ing",
        definition: "表示未來某個特定時間點正在進行的動作。",
    },
    Seed {
        id: "fut_perf",
        name: "未來完成式",
        english_name: "Future Perfect",
        category: TenseCategory::Future,
        example: "I will have eaten by then.",
        status: TenseStatus::Locked,
        progress: 0,
        formula: "will + have + p.p.",
        definition: "表示在未來某個時間點之前將會完成的動作。",
    },
    Seed {
        id: "fut_perf_cont",
        name: "未來完成進行式",
        english_name: "Future Perfect Continuous",
        category: TenseCategory::Future,
        example: "I will have been eating for 2 hours.",
        status: TenseStatus::Locked,
        progress: 0,
        formula: "will + have + been + V-ing",
        definition: "表示在未來某個時間點時，某個動作已經持續進行了多久。",
    },
];

/// Ordered, immutable set of tense definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenseCatalog {
    tenses: Vec<TenseDefinition>,
}

impl TenseCatalog {
    /// Builds a catalog from explicit definitions, keeping the first entry for
    /// duplicate ids.
    #[must_use]
    pub fn new(definitions: Vec<TenseDefinition>) -> Self {
        let mut tenses: Vec<TenseDefinition> = Vec::with_capacity(definitions.len());
        for def in definitions {
            if !tenses.iter().any(|t| t.id == def.id) {
                tenses.push(def);
            }
        }
        Self { tenses }
    }

    /// The twelve English tenses shipped with the app.
    #[must_use]
    pub fn builtin() -> &'static TenseCatalog {
        static CATALOG: OnceLock<TenseCatalog> = OnceLock::new();
        CATALOG.get_or_init(|| {
            TenseCatalog::new(
                SEEDS
                    .iter()
                    .map(|seed| TenseDefinition {
                        id: TenseId::new(seed.id),
                        name: seed.name,
                        english_name: seed.english_name,
                        category: seed.category,
                        example: seed.example,
                        seed_status: seed.status,
                        seed_progress: Percent::saturating(i64::from(seed.progress)),
                        formula: seed.formula,
                        definition: seed.definition,
                    })
                    .collect(),
            )
        })
    }

    #[must_use]
    pub fn get(&self, id: &TenseId) -> Option<&TenseDefinition> {
        self.tenses.iter().find(|t| &t.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &TenseId) -> bool {
        self.get(id).is_some()
    }

    #[must_use]
    pub fn seed_status(&self, id: &TenseId) -> Option<TenseStatus> {
        self.get(id).map(|t| t.seed_status)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TenseDefinition> {
        self.tenses.iter()
    }

    pub fn by_category(&self, category: TenseCategory) -> impl Iterator<Item = &TenseDefinition> {
        self.tenses.iter().filter(move |t| t.category == category)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tenses.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tenses.is_empty()
    }

    /// Seed snapshot used when no local snapshot exists yet.
    #[must_use]
    pub fn default_snapshot(&self) -> Vec<TenseProgress> {
        self.tenses.iter().map(TenseProgress::seeded).collect()
    }

    /// Coerces an arbitrary record list into a full snapshot in catalog order.
    ///
    /// Unknown ids are dropped, missing ids get their seed record, and the
    /// first record wins when an id appears more than once.
    #[must_use]
    pub fn normalize(&self, records: Vec<TenseProgress>) -> Vec<TenseProgress> {
        self.tenses
            .iter()
            .map(|def| {
                records
                    .iter()
                    .find(|r| r.id == def.id)
                    .cloned()
                    .unwrap_or_else(|| TenseProgress::seeded(def))
            })
            .collect()
    }
}
