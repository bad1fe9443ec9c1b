//! Merging duplicate person and location records.
//!
//! A merge repoints every association row of the duplicate to the keeper,
//! dropping rows the keeper already has, then deletes the duplicate. The
//! connection-level functions never open a transaction; [`merge_persons`] and
//! [`merge_locations`] wrap them in one `BEGIN IMMEDIATE` block that only
//! commits a complete, non dry-run merge.

use crate::catalog_store::queries::*;
use crate::catalog_store::SqliteCatalogStore;
use anyhow::{bail, Result};
use rusqlite::{params, Connection};
use serde::Serialize;
use tracing::{info, warn};

/// Outcome of reassigning one join table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MoveCounts {
    pub moved: usize,
    pub skipped: usize,
}

impl MoveCounts {
    fn add(&mut self, other: MoveCounts) {
        self.moved += other.moved;
        self.skipped += other.skipped;
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub keep_id: i64,
    pub remove_id: i64,
    pub keep_name: String,
    pub remove_name: String,
    pub film_rows: MoveCounts,
    pub chapter_rows: MoveCounts,
    /// Genealogy fields copied from the duplicate onto the keeper.
    pub carried_fields: Vec<&'static str>,
    pub children_repointed: usize,
    /// Association rows still referencing the duplicate after reassignment.
    pub remaining_rows: i64,
    pub complete: bool,
    pub dry_run: bool,
}

impl MergeReport {
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "'{}' ({}) -> '{}' ({}): films moved {}, skipped {}; chapters moved {}, skipped {}",
            self.remove_name,
            self.remove_id,
            self.keep_name,
            self.keep_id,
            self.film_rows.moved,
            self.film_rows.skipped,
            self.chapter_rows.moved,
            self.chapter_rows.skipped
        );
        if !self.carried_fields.is_empty() {
            summary.push_str(&format!("; copied {}", self.carried_fields.join(", ")));
        }
        if self.children_repointed > 0 {
            summary.push_str(&format!("; {} children repointed", self.children_repointed));
        }
        if !self.complete {
            summary.push_str(&format!(
                "; INCOMPLETE, {} rows still reference the duplicate",
                self.remaining_rows
            ));
        }
        summary
    }
}

/// Moves the `remove` target rows of `table` onto `keep`. A row whose owner is
/// already linked to `keep` is deleted instead.
pub fn reassign_links(conn: &Connection, table: LinkTable, keep: i64, remove: i64) -> Result<MoveCounts> {
    let mut counts = MoveCounts::default();
    for owner in owners_of(conn, table, &remove)? {
        if is_linked(conn, table, owner, &keep)? {
            unlink(conn, table, owner, &remove)?;
            counts.skipped += 1;
        } else {
            conn.execute(
                &format!(
                    "UPDATE {} SET {} = ?1 WHERE {} = ?2 AND {} = ?3",
                    table.table, table.target_column, table.owner_column, table.target_column
                ),
                params![keep, owner, remove],
            )?;
            counts.moved += 1;
        }
    }
    Ok(counts)
}

fn remaining_rows(conn: &Connection, tables: &[LinkTable], remove: i64) -> Result<i64> {
    let mut total = 0;
    for table in tables {
        total += count_target_rows(conn, *table, &remove)?;
    }
    Ok(total)
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Copies genealogy the keeper lacks and repoints the duplicate's children.
fn carry_genealogy(conn: &Connection, keep: i64, remove: i64, report: &mut MergeReport) -> Result<()> {
    let (Some(keeper), Some(duplicate)) = (get_person(conn, keep)?, get_person(conn, remove)?) else {
        return Ok(());
    };
    let usable = |id: Option<i64>| id.filter(|id| *id != keep && *id != remove);

    let father = keeper.father_id.or_else(|| usable(duplicate.father_id));
    let mother = keeper.mother_id.or_else(|| usable(duplicate.mother_id));
    if father != keeper.father_id {
        report.carried_fields.push("father");
    }
    if mother != keeper.mother_id {
        report.carried_fields.push("mother");
    }
    if father != keeper.father_id || mother != keeper.mother_id {
        set_parents(conn, keep, father, mother)?;
    }

    if keeper.spouse_id.is_none() {
        if let Some(spouse) = usable(duplicate.spouse_id) {
            set_spouse(conn, keep, Some(spouse))?;
            report.carried_fields.push("spouse");
        }
    }

    if keeper.notes.trim().is_empty() && !duplicate.notes.trim().is_empty() {
        set_person_notes(conn, keep, &duplicate.notes)?;
        report.carried_fields.push("notes");
    }

    let birth = if is_blank(&keeper.birth_date) && !is_blank(&duplicate.birth_date) {
        report.carried_fields.push("birth_date");
        duplicate.birth_date.clone()
    } else {
        keeper.birth_date.clone()
    };
    let death = if is_blank(&keeper.death_date) && !is_blank(&duplicate.death_date) {
        report.carried_fields.push("death_date");
        duplicate.death_date.clone()
    } else {
        keeper.death_date.clone()
    };
    if birth != keeper.birth_date || death != keeper.death_date {
        set_life_dates(conn, keep, birth.as_deref(), death.as_deref())?;
    }

    if keeper.hayward_index.is_none() {
        if let Some(index) = duplicate.hayward_index {
            set_hayward_index(conn, keep, index)?;
            report.carried_fields.push("hayward_index");
        }
    }

    // The keeper itself is never made its own child.
    report.children_repointed = conn.execute(
        "UPDATE people SET father_id = ?1 WHERE father_id = ?2 AND id != ?1",
        params![keep, remove],
    )?;
    report.children_repointed += conn.execute(
        "UPDATE people SET mother_id = ?1 WHERE mother_id = ?2 AND id != ?1",
        params![keep, remove],
    )?;
    Ok(())
}

/// Merges person `remove` into `keep` on `conn`. When rows still reference
/// the duplicate afterwards it is kept and the report is incomplete.
pub fn merge_person_rows(conn: &Connection, keep: i64, remove: i64) -> Result<MergeReport> {
    if keep == remove {
        bail!("Cannot merge person {} into itself", keep);
    }
    let Some(keeper) = get_person(conn, keep)? else {
        bail!("Person {} not found", keep);
    };
    let Some(duplicate) = get_person(conn, remove)? else {
        bail!("Person {} not found", remove);
    };

    let mut report = MergeReport {
        keep_id: keep,
        remove_id: remove,
        keep_name: keeper.full_name().trim().to_string(),
        remove_name: duplicate.full_name().trim().to_string(),
        film_rows: reassign_links(conn, FILM_PEOPLE, keep, remove)?,
        chapter_rows: reassign_links(conn, CHAPTER_PEOPLE, keep, remove)?,
        ..Default::default()
    };
    carry_genealogy(conn, keep, remove, &mut report)?;

    report.remaining_rows = remaining_rows(conn, &[FILM_PEOPLE, CHAPTER_PEOPLE], remove)?;
    report.complete = report.remaining_rows == 0;
    if report.complete {
        delete_person(conn, remove)?;
    }
    Ok(report)
}

/// Merges location `remove` into `keep` on `conn`.
pub fn merge_location_rows(conn: &Connection, keep: i64, remove: i64) -> Result<MergeReport> {
    if keep == remove {
        bail!("Cannot merge location {} into itself", keep);
    }
    let Some(keeper) = get_location(conn, keep)? else {
        bail!("Location {} not found", keep);
    };
    let Some(duplicate) = get_location(conn, remove)? else {
        bail!("Location {} not found", remove);
    };

    let mut report = MergeReport {
        keep_id: keep,
        remove_id: remove,
        keep_name: keeper.name,
        remove_name: duplicate.name,
        film_rows: reassign_links(conn, FILM_LOCATIONS, keep, remove)?,
        chapter_rows: reassign_links(conn, CHAPTER_LOCATIONS, keep, remove)?,
        ..Default::default()
    };
    report.remaining_rows = remaining_rows(conn, &[FILM_LOCATIONS, CHAPTER_LOCATIONS], remove)?;
    report.complete = report.remaining_rows == 0;
    if report.complete {
        delete_location(conn, remove)?;
    }
    Ok(report)
}

fn finish(mut report: MergeReport, dry_run: bool) -> MergeReport {
    report.dry_run = dry_run;
    if !report.complete {
        warn!("Merge incomplete, rolled back: {}", report.summary());
    } else if dry_run {
        info!("[dry run] {}", report.summary());
    } else {
        info!("Merged {}", report.summary());
    }
    report
}

/// One transaction per merge. Incomplete merges and dry runs roll back.
pub fn merge_persons(store: &SqliteCatalogStore, keep: i64, remove: i64, dry_run: bool) -> Result<MergeReport> {
    let report = store.write_if(
        |conn| merge_person_rows(conn, keep, remove),
        |report| report.complete && !dry_run,
    )?;
    Ok(finish(report, dry_run))
}

pub fn merge_locations(store: &SqliteCatalogStore, keep: i64, remove: i64, dry_run: bool) -> Result<MergeReport> {
    let report = store.write_if(
        |conn| merge_location_rows(conn, keep, remove),
        |report| report.complete && !dry_run,
    )?;
    Ok(finish(report, dry_run))
}

/// Totals of a batch of merges. Per-pair failures are recorded, never fatal.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub merged: Vec<MergeReport>,
    pub incomplete: Vec<MergeReport>,
    pub failed: Vec<(i64, i64, String)>,
}

impl BatchOutcome {
    pub fn record(&mut self, keep: i64, remove: i64, result: Result<MergeReport>) {
        match result {
            Ok(report) if report.complete => self.merged.push(report),
            Ok(report) => self.incomplete.push(report),
            Err(e) => {
                warn!("Failed to merge {} into {}: {:#}", remove, keep, e);
                self.failed.push((keep, remove, format!("{:#}", e)));
            }
        }
    }
}

pub fn merge_person_pairs(store: &SqliteCatalogStore, pairs: &[(i64, i64)], dry_run: bool) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();
    for (keep, remove) in pairs {
        outcome.record(*keep, *remove, merge_persons(store, *keep, *remove, dry_run));
    }
    outcome
}
