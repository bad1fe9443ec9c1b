//! Offline genealogy tools: integrity checks, statistics, the pk-keyed
//! export and sync, and the family report. The family tree served over HTTP
//! lives in `catalog_store::family`.

pub mod integrity;
pub mod report;
pub mod sync;

use crate::catalog_store::Person;
use serde::Serialize;

pub use integrity::{check_integrity, IntegrityIssue, PersonIssues};
pub use report::{build_report, write_report, GenealogyReport};
pub use sync::{export_records, export_to_file, sync_from_file, sync_records, GenealogyRecord, SyncStats};

/// Share of people with each genealogy field filled in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct GenealogyStats {
    pub total: usize,
    pub with_father: usize,
    pub with_mother: usize,
    pub with_both_parents: usize,
    pub with_spouse: usize,
    pub with_notes: usize,
    pub with_birth_date: usize,
    pub with_death_date: usize,
    pub with_hayward_index: usize,
}

fn filled(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

impl GenealogyStats {
    pub fn of(people: &[Person]) -> Self {
        let count = |pred: &dyn Fn(&Person) -> bool| people.iter().filter(|p| pred(p)).count();
        GenealogyStats {
            total: people.len(),
            with_father: count(&|p| p.father_id.is_some()),
            with_mother: count(&|p| p.mother_id.is_some()),
            with_both_parents: count(&|p| p.father_id.is_some() && p.mother_id.is_some()),
            with_spouse: count(&|p| p.spouse_id.is_some()),
            with_notes: count(&|p| !p.notes.trim().is_empty()),
            with_birth_date: count(&|p| filled(&p.birth_date)),
            with_death_date: count(&|p| filled(&p.death_date)),
            with_hayward_index: count(&|p| p.hayward_index.is_some()),
        }
    }

    /// `count (pct%)` with one decimal; an empty catalog shows 0.0%.
    pub fn share(&self, count: usize) -> String {
        let pct = if self.total == 0 {
            0.0
        } else {
            count as f64 / self.total as f64 * 100.0
        };
        format!("{} ({:.1}%)", count, pct)
    }

    /// Labelled lines, in display order.
    pub fn lines(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Total people", self.total.to_string()),
            ("People with father", self.share(self.with_father)),
            ("People with mother", self.share(self.with_mother)),
            ("People with both parents", self.share(self.with_both_parents)),
            ("People with spouse", self.share(self.with_spouse)),
            ("People with biography notes", self.share(self.with_notes)),
            ("People with birth date", self.share(self.with_birth_date)),
            ("People with death date", self.share(self.with_death_date)),
            ("People with Hayward index", self.share(self.with_hayward_index)),
        ]
    }
}
