//! Location cleanup rules, orphan removal and usage statistics.

use super::duplicates::{find_compound_locations, find_similar_locations};
use crate::catalog_store::aggregation::{locations_with_film_counts, top_by_film_count};
use crate::catalog_store::queries::*;
use crate::catalog_store::{Location, Person, SqliteCatalogStore, WithFilmCount};
use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

pub const TOP_LOCATIONS_LIMIT: usize = 15;

/// One row of a cleanup CSV: every film and chapter linked to `current` gets
/// the `new` locations, and loses `current` when `replace` is set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CleanupRule {
    pub row: usize,
    pub current: String,
    pub new: Vec<String>,
    pub replace: bool,
}

/// Parses `current,new,replace` rows after a header row. `new` holds names
/// separated by `|`; `replace` is `1` to drop the current location.
pub fn parse_cleanup_rules<R: Read>(reader: R) -> Result<Vec<CleanupRule>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut rules = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        let record = record.context("Failed to read cleanup CSV row")?;
        // Row numbers count the header as row 1.
        let row = index + 2;
        if record.len() < 3 || record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let current = record[0].trim();
        let new = record[1].trim();
        if current.is_empty() || new.is_empty() {
            continue;
        }
        let replace = match record[2].trim().parse::<i64>() {
            Ok(value) => value == 1,
            Err(_) => {
                warn!(
                    "Invalid replace value '{}' in row {}, treating as 0",
                    record[2].trim(),
                    row
                );
                false
            }
        };
        rules.push(CleanupRule {
            row,
            current: current.to_string(),
            new: new
                .split('|')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect(),
            replace,
        });
    }
    Ok(rules)
}

pub fn load_cleanup_rules(path: &Path) -> Result<Vec<CleanupRule>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open cleanup CSV {:?}", path))?;
    parse_cleanup_rules(file)
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RuleOutcome {
    pub row: usize,
    pub current: String,
    /// False when no location named `current` exists.
    pub found: bool,
    pub films: usize,
    pub chapters: usize,
    pub links_added: usize,
    pub links_removed: usize,
    /// Set when the rule's transaction failed and was rolled back.
    pub error: Option<String>,
}

/// Applies one rule on `conn`.
pub fn apply_cleanup_rule(conn: &Connection, rule: &CleanupRule) -> Result<RuleOutcome> {
    let mut outcome = RuleOutcome {
        row: rule.row,
        current: rule.current.clone(),
        ..Default::default()
    };
    let Some(current) = find_location_by_name(conn, &rule.current)? else {
        return Ok(outcome);
    };
    outcome.found = true;

    let mut new_ids = Vec::new();
    for name in &rule.new {
        if let Some((id, created)) = get_or_create_location(conn, name, "")? {
            if created {
                info!("Created location '{}'", name.trim());
            }
            new_ids.push(id);
        }
    }

    for (table, counter) in [
        (FILM_LOCATIONS, &mut outcome.films),
        (CHAPTER_LOCATIONS, &mut outcome.chapters),
    ] {
        let owners = owners_of(conn, table, &current.id)?;
        *counter = owners.len();
        for owner in owners {
            for new_id in &new_ids {
                if link(conn, table, owner, new_id)? {
                    outcome.links_added += 1;
                }
            }
            // A rule mapping a location onto itself must not drop it.
            if rule.replace && !new_ids.contains(&current.id) && unlink(conn, table, owner, &current.id)? {
                outcome.links_removed += 1;
            }
        }
    }
    Ok(outcome)
}

/// One transaction per rule; a failing rule is logged and the rest continue.
/// On dry run every rule is applied and rolled back.
pub fn apply_cleanup_rules(store: &SqliteCatalogStore, rules: &[CleanupRule], dry_run: bool) -> Vec<RuleOutcome> {
    let mut outcomes = Vec::new();
    for rule in rules {
        match store.write_or_rollback(dry_run, |conn| apply_cleanup_rule(conn, rule)) {
            Ok(outcome) => {
                if !outcome.found {
                    warn!("Row {}: location '{}' not found", rule.row, rule.current);
                } else {
                    info!(
                        "Row {}: '{}' -> {:?} (replace={}): {} films, {} chapters{}",
                        rule.row,
                        rule.current,
                        rule.new,
                        rule.replace,
                        outcome.films,
                        outcome.chapters,
                        if dry_run { " [dry run]" } else { "" }
                    );
                }
                outcomes.push(outcome);
            }
            Err(e) => {
                warn!("Row {}: failed to apply rule for '{}': {:#}", rule.row, rule.current, e);
                outcomes.push(RuleOutcome {
                    row: rule.row,
                    current: rule.current.clone(),
                    error: Some(format!("{:#}", e)),
                    ..Default::default()
                });
            }
        }
    }
    outcomes
}

// =============================================================================
// Orphans
// =============================================================================

pub fn orphan_locations(conn: &Connection) -> Result<Vec<Location>> {
    query_list(
        conn,
        &format!(
            "SELECT {} FROM locations l
             WHERE NOT EXISTS (SELECT 1 FROM film_locations fl WHERE fl.location_id = l.id)
               AND NOT EXISTS (SELECT 1 FROM chapter_locations cl WHERE cl.location_id = l.id)
             ORDER BY l.name",
            LOCATION_COLUMNS
        ),
        [],
        location_from_row,
    )
}

pub fn orphan_people(conn: &Connection) -> Result<Vec<Person>> {
    query_list(
        conn,
        &format!(
            "SELECT {} FROM people p
             WHERE NOT EXISTS (SELECT 1 FROM film_people fp WHERE fp.person_id = p.id)
               AND NOT EXISTS (SELECT 1 FROM chapter_people cp WHERE cp.person_id = p.id)
             ORDER BY {}",
            PERSON_COLUMNS, PERSON_ORDER
        ),
        [],
        person_from_row,
    )
}

/// Deletes every orphan location in one transaction and returns them.
pub fn remove_orphan_locations(store: &SqliteCatalogStore, dry_run: bool) -> Result<Vec<Location>> {
    store.write_or_rollback(dry_run, |conn| {
        let orphans = orphan_locations(conn)?;
        for location in &orphans {
            delete_location(conn, location.id)?;
        }
        Ok(orphans)
    })
}

/// Deletes every orphan person in one transaction. Genealogy links pointing
/// at a deleted person are cleared by the schema.
pub fn remove_orphan_people(store: &SqliteCatalogStore, dry_run: bool) -> Result<Vec<Person>> {
    store.write_or_rollback(dry_run, |conn| {
        let orphans = orphan_people(conn)?;
        for person in &orphans {
            delete_person(conn, person.id)?;
        }
        Ok(orphans)
    })
}

// =============================================================================
// Statistics
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LocationStats {
    pub total: i64,
    pub with_film_rows: i64,
    pub with_chapter_rows: i64,
    pub with_any_rows: i64,
    pub orphaned: i64,
    pub top: Vec<WithFilmCount<Location>>,
    pub compound: Vec<Location>,
    pub similar: Vec<(Location, Location)>,
}

pub fn location_stats(conn: &Connection) -> Result<LocationStats> {
    let total = count(conn, "SELECT COUNT(*) FROM locations", [])?;
    let with_any_rows = count(
        conn,
        "SELECT COUNT(*) FROM (
            SELECT location_id FROM film_locations
            UNION
            SELECT location_id FROM chapter_locations
         )",
        [],
    )?;
    Ok(LocationStats {
        total,
        with_film_rows: count(conn, "SELECT COUNT(DISTINCT location_id) FROM film_locations", [])?,
        with_chapter_rows: count(conn, "SELECT COUNT(DISTINCT location_id) FROM chapter_locations", [])?,
        with_any_rows,
        orphaned: total - with_any_rows,
        top: top_by_film_count(locations_with_film_counts(conn, true)?, TOP_LOCATIONS_LIMIT),
        compound: find_compound_locations(conn)?,
        similar: find_similar_locations(conn)?,
    })
}
