//! Pk-keyed genealogy export and the fill-only sync that reads it back.

use crate::catalog_store::queries::{get_person, list_people, person_exists, set_spouse};
use crate::catalog_store::{Person, SqliteCatalogStore};
use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GenealogyRecord {
    pub pk: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub father_pk: Option<i64>,
    #[serde(default)]
    pub mother_pk: Option<i64>,
    #[serde(default)]
    pub spouse_pk: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub birth_date: Option<String>,
    #[serde(default)]
    pub death_date: Option<String>,
    #[serde(default)]
    pub hayward_index: Option<i64>,
}

impl From<&Person> for GenealogyRecord {
    fn from(p: &Person) -> Self {
        GenealogyRecord {
            pk: p.id,
            first_name: p.first_name.clone(),
            last_name: p.last_name.clone(),
            father_pk: p.father_id,
            mother_pk: p.mother_id,
            spouse_pk: p.spouse_id,
            notes: Some(p.notes.clone()).filter(|n| !n.is_empty()),
            birth_date: p.birth_date.clone(),
            death_date: p.death_date.clone(),
            hayward_index: p.hayward_index,
        }
    }
}

/// All people as records, ordered by pk.
pub fn export_records(conn: &Connection) -> Result<Vec<GenealogyRecord>> {
    let mut people = list_people(conn)?;
    people.sort_by_key(|p| p.id);
    Ok(people.iter().map(GenealogyRecord::from).collect())
}

pub fn export_to_file(store: &SqliteCatalogStore, path: &Path) -> Result<usize> {
    let records = store.read(export_records)?;
    let json = serde_json::to_string_pretty(&records)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Exported {} people to {}", records.len(), path.display());
    Ok(records.len())
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub found: usize,
    pub updated: usize,
    pub relationships_added: usize,
    pub notes_added: usize,
    pub dates_added: usize,
    pub not_found: usize,
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// A missing reference is only filled when the referenced pk exists and is
/// not the person itself.
fn fillable(conn: &Connection, current: Option<i64>, person_id: i64, wanted: Option<i64>) -> Result<Option<i64>> {
    match (current, wanted) {
        (None, Some(id)) if id != person_id && person_exists(conn, id)? => Ok(Some(id)),
        _ => Ok(None),
    }
}

fn sync_one(conn: &Connection, person: &Person, record: &GenealogyRecord, stats: &mut SyncStats) -> Result<bool> {
    let mut changed = false;

    if let Some(father) = fillable(conn, person.father_id, person.id, record.father_pk)? {
        conn.execute("UPDATE people SET father_id = ?2 WHERE id = ?1", params![person.id, father])?;
        stats.relationships_added += 1;
        changed = true;
    }
    if let Some(mother) = fillable(conn, person.mother_id, person.id, record.mother_pk)? {
        conn.execute("UPDATE people SET mother_id = ?2 WHERE id = ?1", params![person.id, mother])?;
        stats.relationships_added += 1;
        changed = true;
    }
    // An earlier record in the same batch may already have paired this person.
    let spouse_now = get_person(conn, person.id)?.and_then(|p| p.spouse_id);
    if let Some(spouse) = fillable(conn, spouse_now, person.id, record.spouse_pk)? {
        set_spouse(conn, person.id, Some(spouse))?;
        stats.relationships_added += 1;
        changed = true;
    }
    if person.notes.trim().is_empty() {
        if let Some(notes) = present(&record.notes) {
            conn.execute("UPDATE people SET notes = ?2 WHERE id = ?1", params![person.id, notes])?;
            stats.notes_added += 1;
            changed = true;
        }
    }
    if blank(&person.birth_date) {
        if let Some(date) = present(&record.birth_date) {
            conn.execute("UPDATE people SET birth_date = ?2 WHERE id = ?1", params![person.id, date])?;
            stats.dates_added += 1;
            changed = true;
        }
    }
    if blank(&person.death_date) {
        if let Some(date) = present(&record.death_date) {
            conn.execute("UPDATE people SET death_date = ?2 WHERE id = ?1", params![person.id, date])?;
            stats.dates_added += 1;
            changed = true;
        }
    }
    Ok(changed)
}

/// Fills empty genealogy fields from `records`. Values already present in the
/// catalog are never overwritten.
pub fn sync_records(conn: &Connection, records: &[GenealogyRecord]) -> Result<SyncStats> {
    let mut stats = SyncStats::default();
    for record in records {
        let Some(person) = get_person(conn, record.pk)? else {
            stats.not_found += 1;
            continue;
        };
        stats.found += 1;
        if sync_one(conn, &person, record, &mut stats)? {
            stats.updated += 1;
        }
    }
    Ok(stats)
}

/// Reads an export file and syncs it in one transaction.
pub fn sync_from_file(store: &SqliteCatalogStore, path: &Path, dry_run: bool) -> Result<SyncStats> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let records: Vec<GenealogyRecord> =
        serde_json::from_str(&text).with_context(|| format!("Invalid genealogy file {}", path.display()))?;
    let stats = store.write_or_rollback(dry_run, |conn| sync_records(conn, &records))?;
    info!(
        "Genealogy sync{}: {} found, {} updated, {} not found",
        if dry_run { " (dry run)" } else { "" },
        stats.found,
        stats.updated,
        stats.not_found
    );
    Ok(stats)
}
