//! In-place update of existing chapters from a per-film chapter worksheet.
//!
//! Layout of a sheet: the film id prefix sits in A3, row 8 holds the
//! `Bitfield: Name, Name, ...` key for the `Haywards Present` column, and a
//! header row somewhere in rows 6 to 15 names the chapter columns. Rows below
//! the header update the chapter they match; unmatched rows are skipped.

use super::text::{parse_bitfield_key, set_bits, split_sheet_list, title_words};
use super::SheetGrid;
use crate::catalog_store::queries::*;
use crate::catalog_store::{parse_time_to_seconds, Chapter, Film, SqliteCatalogStore, TagCategory};
use anyhow::{bail, Result};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

const FILM_ID_CELL: (usize, usize) = (2, 0);
const BITFIELD_KEY_ROW: usize = 7;
const HEADER_SCAN_START: usize = 5;
const HEADER_SCAN_END: usize = 15;
const TIMECODE_TOLERANCE_SECS: u64 = 2;

pub const COL_TITLE: &str = "title";
pub const COL_TIMECODE: &str = "16fps start timecode";
pub const COL_DESCRIPTION: &str = "description";
pub const COL_TECHNICAL_NOTES: &str = "technical notes";
pub const COL_YEAR: &str = "year";
pub const COL_HAYWARDS_PRESENT: &str = "haywards present";
pub const COL_LOCATIONS: &str = "locations";
pub const COL_TAGS: &str = "tags";
pub const COL_OTHER_PEOPLE: &str = "other people";

/// Where things are on one sheet.
#[derive(Clone, Debug, PartialEq)]
pub struct SheetLayout {
    pub film_id_prefix: String,
    pub bitfield_key: Vec<String>,
    pub header_row: usize,
    /// Lowercased, trimmed header to its first column index.
    pub columns: HashMap<String, usize>,
}

impl SheetLayout {
    pub fn parse(grid: &SheetGrid) -> Result<Self> {
        let film_id_prefix = grid.cell(FILM_ID_CELL.0, FILM_ID_CELL.1).trim().to_string();
        if film_id_prefix.is_empty() {
            bail!("No film ID found in cell A3");
        }

        let bitfield_key = grid
            .row(BITFIELD_KEY_ROW)
            .iter()
            .find(|cell| cell.to_lowercase().contains("bitfield:"))
            .map(|cell| parse_bitfield_key(cell))
            .unwrap_or_default();

        let Some(header_row) = (HEADER_SCAN_START..HEADER_SCAN_END.min(grid.num_rows())).find(|row| {
            let joined = grid
                .row(*row)
                .iter()
                .filter(|c| !c.trim().is_empty())
                .map(|c| c.to_lowercase())
                .collect::<Vec<_>>()
                .join(" ");
            joined.contains("start") && joined.contains("title")
        }) else {
            bail!("Header row not found");
        };

        let mut columns = HashMap::new();
        for (index, header) in grid.row(header_row).iter().enumerate() {
            let header = header.trim().to_lowercase();
            if !header.is_empty() {
                columns.entry(header).or_insert(index);
            }
        }

        Ok(SheetLayout {
            film_id_prefix,
            bitfield_key,
            header_row,
            columns,
        })
    }

    fn value<'a>(&self, grid: &'a SheetGrid, row: usize, column: &str) -> &'a str {
        match self.columns.get(column) {
            Some(index) => grid.cell(row, *index).trim(),
            None => "",
        }
    }

    /// The title cell falls back to the first column when no header names it.
    pub fn chapter_row(&self, grid: &SheetGrid, row: usize) -> ChapterRow {
        let title_column = self.columns.get(COL_TITLE).copied().unwrap_or(0);
        ChapterRow {
            sheet_row: row + 1,
            title: grid.cell(row, title_column).trim().to_string(),
            timecode: self.value(grid, row, COL_TIMECODE).to_string(),
            description: self.value(grid, row, COL_DESCRIPTION).to_string(),
            technical_notes: self.value(grid, row, COL_TECHNICAL_NOTES).to_string(),
            year: self.value(grid, row, COL_YEAR).to_string(),
            haywards_present: self.value(grid, row, COL_HAYWARDS_PRESENT).to_string(),
            locations: split_sheet_list(self.value(grid, row, COL_LOCATIONS)),
            tags: split_sheet_list(self.value(grid, row, COL_TAGS))
                .into_iter()
                .map(|t| t.to_lowercase())
                .collect(),
            other_people: split_sheet_list(self.value(grid, row, COL_OTHER_PEOPLE)),
        }
    }
}

/// One chapter row, already split into its parts.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChapterRow {
    /// One-based, as shown by spreadsheet software.
    pub sheet_row: usize,
    pub title: String,
    pub timecode: String,
    pub description: String,
    pub technical_notes: String,
    pub year: String,
    pub haywards_present: String,
    pub locations: Vec<String>,
    pub tags: Vec<String>,
    pub other_people: Vec<String>,
}

/// Picks the chapter a row describes. The first rule that yields a chapter
/// wins: exact title ignoring case, then start timecode within two seconds,
/// then shared title words. A one-word title has a zero word threshold and
/// so matches the first chapter.
pub fn match_chapter<'a>(chapters: &'a [Chapter], title: &str, timecode: &str) -> Option<&'a Chapter> {
    let lowered = title.to_lowercase();
    if let Some(chapter) = chapters.iter().find(|c| c.title.to_lowercase() == lowered) {
        return Some(chapter);
    }

    if !timecode.trim().is_empty() {
        let seconds = parse_time_to_seconds(timecode);
        if let Some(chapter) = chapters
            .iter()
            .find(|c| c.start_time_seconds.abs_diff(seconds) <= TIMECODE_TOLERANCE_SECS)
        {
            return Some(chapter);
        }
    }

    let words: HashSet<String> = title_words(title).into_iter().collect();
    let threshold = 3.min(title_words(title).len() / 2);
    chapters.iter().find(|c| {
        let chapter_words: HashSet<String> = title_words(&c.title).into_iter().collect();
        words.intersection(&chapter_words).count() >= threshold
    })
}

/// Looks a person up by `hayward_index`, then by name ignoring case, and
/// creates it otherwise. A single-word name gets the last name "Hayward"
/// when it comes from the bitfield key.
pub fn find_or_create_person(conn: &Connection, name: &str, hayward_index: Option<i64>) -> Result<i64> {
    let parts: Vec<&str> = name.split_whitespace().collect();
    let (first, last) = match parts.split_first() {
        Some((first, rest)) if !rest.is_empty() => (first.to_string(), rest.join(" ")),
        _ => (
            name.trim().to_string(),
            if hayward_index.is_some() { "Hayward".to_string() } else { String::new() },
        ),
    };

    if let Some(index) = hayward_index {
        if let Some(person) = find_person_by_hayward_index(conn, index)? {
            return Ok(person.id);
        }
    }
    if let Some(person) = find_person_by_name(conn, &first, &last)? {
        if let (Some(index), None) = (hayward_index, person.hayward_index) {
            set_hayward_index(conn, person.id, index)?;
        }
        return Ok(person.id);
    }
    let id = insert_person(conn, &first, &last, "", hayward_index)?;
    debug!("Created person {} {} ({})", first, last, id);
    Ok(id)
}

/// Writes one matched row onto `chapter_id` and recomputes its flags.
pub fn apply_chapter_row(conn: &Connection, chapter_id: i64, row: &ChapterRow, bitfield_key: &[String]) -> Result<()> {
    let description: Vec<&str> = [row.description.as_str(), row.technical_notes.as_str()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect();
    if !description.is_empty() {
        set_chapter_description(conn, chapter_id, &description.join("\n"))?;
    }
    if !row.year.is_empty() {
        set_chapter_years(conn, chapter_id, &row.year)?;
    }

    for index in set_bits(&row.haywards_present, bitfield_key.len()) {
        let person = find_or_create_person(conn, &bitfield_key[index], Some(index as i64))?;
        link(conn, CHAPTER_PEOPLE, chapter_id, &person)?;
    }
    for name in &row.locations {
        if let Some((location, _)) = get_or_create_location(conn, name, "")? {
            link(conn, CHAPTER_LOCATIONS, chapter_id, &location)?;
        }
    }
    for tag in &row.tags {
        get_or_create_tag(conn, tag, TagCategory::Other)?;
        link(conn, CHAPTER_TAGS, chapter_id, tag)?;
    }
    for name in &row.other_people {
        let person = find_or_create_person(conn, name, None)?;
        link(conn, CHAPTER_PEOPLE, chapter_id, &person)?;
    }

    update_chapter_metadata_flags(conn, chapter_id)
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SheetSummary {
    pub sheet: String,
    pub film_file_id: String,
    pub processed: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub failed: usize,
}

fn resolve_film(store: &SqliteCatalogStore, prefix: &str) -> Result<Film> {
    let mut films = store.read(|conn| find_films_by_file_id_prefix(conn, prefix))?;
    match films.len() {
        0 => bail!("No film found with ID starting with '{}'", prefix),
        1 => Ok(films.remove(0)),
        _ => bail!(
            "Multiple films found with ID starting with '{}': {}",
            prefix,
            films.iter().map(|f| f.file_id.as_str()).collect::<Vec<_>>().join(", ")
        ),
    }
}

/// Imports one sheet. Layout problems and an ambiguous film fail the whole
/// sheet; each row then runs in its own transaction and a failing row is
/// counted and logged. On dry run rows are matched and counted only.
pub fn import_chapter_sheet(
    store: &SqliteCatalogStore,
    sheet_name: &str,
    grid: &SheetGrid,
    dry_run: bool,
) -> Result<SheetSummary> {
    let layout = SheetLayout::parse(grid)?;
    let film = resolve_film(store, &layout.film_id_prefix)?;
    info!("Sheet {}: film {} - {}", sheet_name, film.file_id, film.title);
    if layout.bitfield_key.is_empty() {
        debug!("Sheet {}: no bitfield key", sheet_name);
    }

    let chapters = store.read(|conn| chapters_of_film(conn, film.id))?;
    let mut summary = SheetSummary {
        sheet: sheet_name.to_string(),
        film_file_id: film.file_id.clone(),
        ..Default::default()
    };

    for row_index in layout.header_row + 1..grid.num_rows() {
        let row = layout.chapter_row(grid, row_index);
        if row.title.is_empty() {
            continue;
        }
        summary.processed += 1;

        let Some(chapter) = match_chapter(&chapters, &row.title, &row.timecode) else {
            warn!(
                "Sheet {} row {}: no matching chapter for '{}' at '{}'",
                sheet_name, row.sheet_row, row.title, row.timecode
            );
            summary.unmatched += 1;
            continue;
        };

        if dry_run {
            info!("[dry run] Would update chapter '{}' from row {}", chapter.title, row.sheet_row);
            summary.matched += 1;
            continue;
        }

        match store.write(|conn| apply_chapter_row(conn, chapter.id, &row, &layout.bitfield_key)) {
            Ok(()) => {
                debug!("Updated chapter '{}' from row {}", chapter.title, row.sheet_row);
                summary.matched += 1;
            }
            Err(e) => {
                warn!("Sheet {} row {}: {:#}", sheet_name, row.sheet_row, e);
                summary.failed += 1;
            }
        }
    }

    info!(
        "Sheet {}: {} rows, {} matched, {} unmatched, {} failed",
        sheet_name, summary.processed, summary.matched, summary.unmatched, summary.failed
    );
    Ok(summary)
}
