//! Whole-catalog family report written as JSON by the admin CLI.

use crate::catalog_store::queries::{count_target_rows, list_people, CHAPTER_PEOPLE, FILM_PEOPLE};
use crate::catalog_store::{Person, PersonRef, SqliteCatalogStore};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Clone, Debug, Serialize)]
pub struct ReportPerson {
    pub pk: i64,
    pub name: String,
    pub first_name: String,
    pub last_name: String,
    pub father: Option<PersonRef>,
    pub mother: Option<PersonRef>,
    pub spouse: Option<PersonRef>,
    pub children: Vec<PersonRef>,
    pub has_biography: bool,
    pub film_associations: i64,
    pub chapter_associations: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReportStatistics {
    pub people_with_father: usize,
    pub people_with_mother: usize,
    pub people_with_spouse: usize,
    pub people_with_both_parents: usize,
    pub people_with_biography: usize,
    pub people_with_children: usize,
    pub largest_family_size: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct GenealogyReport {
    pub generation_date: DateTime<Utc>,
    pub total_people: usize,
    pub people: Vec<ReportPerson>,
    pub statistics: ReportStatistics,
}

pub fn build_report(conn: &Connection) -> Result<GenealogyReport> {
    let people = list_people(conn)?;
    let by_id: HashMap<i64, &Person> = people.iter().map(|p| (p.id, p)).collect();
    let reference = |id: Option<i64>| id.and_then(|id| by_id.get(&id)).map(|p| PersonRef::from(*p));

    let mut children: HashMap<i64, Vec<PersonRef>> = HashMap::new();
    for person in &people {
        for parent in [person.father_id, person.mother_id].into_iter().flatten() {
            children.entry(parent).or_default().push(PersonRef::from(person));
        }
    }

    let mut entries = Vec::with_capacity(people.len());
    for person in &people {
        entries.push(ReportPerson {
            pk: person.id,
            name: person.full_name(),
            first_name: person.first_name.clone(),
            last_name: person.last_name.clone(),
            father: reference(person.father_id),
            mother: reference(person.mother_id),
            spouse: reference(person.spouse_id),
            children: children.get(&person.id).cloned().unwrap_or_default(),
            has_biography: !person.notes.trim().is_empty(),
            film_associations: count_target_rows(conn, FILM_PEOPLE, &person.id)?,
            chapter_associations: count_target_rows(conn, CHAPTER_PEOPLE, &person.id)?,
        });
    }

    let count = |pred: &dyn Fn(&ReportPerson) -> bool| entries.iter().filter(|p| pred(p)).count();
    let statistics = ReportStatistics {
        people_with_father: count(&|p| p.father.is_some()),
        people_with_mother: count(&|p| p.mother.is_some()),
        people_with_spouse: count(&|p| p.spouse.is_some()),
        people_with_both_parents: count(&|p| p.father.is_some() && p.mother.is_some()),
        people_with_biography: count(&|p| p.has_biography),
        people_with_children: count(&|p| !p.children.is_empty()),
        largest_family_size: entries.iter().map(|p| p.children.len()).max().unwrap_or(0),
    };

    Ok(GenealogyReport {
        generation_date: Utc::now(),
        total_people: entries.len(),
        people: entries,
        statistics,
    })
}

pub fn write_report(store: &SqliteCatalogStore, path: &Path) -> Result<GenealogyReport> {
    let report = store.read(build_report)?;
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(report)
}
