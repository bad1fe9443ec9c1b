//! Film master CSV import.
//!
//! Every valid row upserts one film, links its people, locations and tags
//! and then recreates the film's chapters from the `Chapters` cell. The
//! recreation is destructive: existing chapters, with their chapter-level
//! people, locations, tags and notes, are deleted first.

use super::text::*;
use crate::catalog_store::queries::*;
use crate::catalog_store::{FilmUpsert, NewChapter, SqliteCatalogStore, TagCategory, PLACEHOLDER_YOUTUBE_PREFIX};
use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{error, info};

pub const ERRORS_SHOWN: usize = 10;

const HEADER_MARKERS: [&str; 3] = ["Filenames", "Years", "People"];
const DEFAULT_HEADER_LINE: usize = 1;

/// Flag columns that become tags when non-empty, with their category.
const FLAG_TAG_COLUMNS: [(&str, TagCategory); 5] = [
    ("Tag: Ruth", TagCategory::People),
    ("Tag: Disney", TagCategory::Themes),
    ("Tag: SF", TagCategory::Places),
    ("Tag: Needs Edit", TagCategory::Other),
    ("Tag: Theme Park", TagCategory::Activities),
];

/// One data row keyed by header, with its line number in the file.
#[derive(Clone, Debug, Default)]
pub struct CsvRow {
    pub line: usize,
    cells: HashMap<String, String>,
}

impl CsvRow {
    /// Missing columns read as empty; values are trimmed.
    pub fn get(&self, column: &str) -> &str {
        self.cells.get(column).map(|v| v.trim()).unwrap_or("")
    }

    fn raw(&self, column: &str) -> &str {
        self.cells.get(column).map(String::as_str).unwrap_or("")
    }

    pub fn is_valid_film(&self) -> bool {
        !self.get("Filenames").is_empty() && !self.get("Title").is_empty()
    }
}

/// Index of the first line naming every header marker.
fn header_line(text: &str) -> usize {
    text.lines()
        .position(|line| HEADER_MARKERS.iter().all(|m| line.contains(m)))
        .unwrap_or(DEFAULT_HEADER_LINE)
}

/// Skips any front matter above the header line and reads the remaining
/// records keyed by header.
pub fn parse_film_csv(text: &str) -> Result<Vec<CsvRow>> {
    let skip = header_line(text);
    let body = text.splitn(skip + 1, '\n').nth(skip).unwrap_or("");

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(body.as_bytes());
    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read CSV header")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.context("Failed to read CSV record")?;
        let line = skip + record.position().map_or(0, |p| p.line() as usize);
        let cells = headers
            .iter()
            .cloned()
            .zip(record.iter().map(str::to_string))
            .collect();
        rows.push(CsvRow { line, cells });
    }
    Ok(rows)
}

/// Tags a row carries: the flag columns plus its `Format`, lowercased.
pub fn row_tags(row: &CsvRow) -> Vec<(String, TagCategory)> {
    let mut tags: Vec<(String, TagCategory)> = FLAG_TAG_COLUMNS
        .iter()
        .filter(|(column, _)| !row.get(column).is_empty())
        .map(|(column, category)| (column.trim_start_matches("Tag: ").to_lowercase(), *category))
        .collect();
    let format = row.get("Format");
    if !format.is_empty() {
        tags.push((format.to_lowercase(), TagCategory::Other));
    }
    tags
}

pub fn film_upsert(row: &CsvRow, playlist_id: &str) -> FilmUpsert {
    let file_id = row.get("Filenames").to_string();
    let youtube_id = format!("{}{}", PLACEHOLDER_YOUTUBE_PREFIX, file_id);
    FilmUpsert {
        title: row.get("Title").to_string(),
        description: row.get("Description").to_string(),
        summary: row.get("Summary").to_string(),
        years: row.get("Years").to_string(),
        technical_notes: row.get("Tech Notes").to_string(),
        workflow_state: row.get("Workflow State").to_string(),
        duration: parse_duration(row.get("Duration at 23.97 fps")),
        youtube_url: format!("https://www.youtube.com/watch?v={}&list={}", youtube_id, playlist_id),
        thumbnail_url: format!("https://img.youtube.com/vi/{}/maxresdefault.jpg", youtube_id),
        youtube_id,
        file_id,
    }
}

/// Per-row counts of processed entities.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RowCounts {
    pub chapters: usize,
    pub people: usize,
    pub locations: usize,
    pub tags: usize,
}

/// Imports one film row on `conn`.
pub fn import_film_row(conn: &Connection, row: &CsvRow, playlist_id: &str) -> Result<RowCounts> {
    let upsert = film_upsert(row, playlist_id);
    let (film_id, created) = upsert_film(conn, &upsert)?;
    info!(
        "{} film {} - {}",
        if created { "Created" } else { "Updated" },
        upsert.file_id,
        upsert.title
    );
    let mut counts = RowCounts::default();

    for full_name in split_people_list(row.raw("People")) {
        let (first, last) = parse_person_name(&full_name);
        if first.is_empty() {
            continue;
        }
        let (person, _) = get_or_create_person(conn, &first, &last, &format!("Imported from CSV: {}", full_name))?;
        link(conn, FILM_PEOPLE, film_id, &person)?;
        counts.people += 1;
    }

    for name in split_location_list(row.raw("Location")) {
        if let Some((location, _)) = get_or_create_location(conn, &name, "Imported from CSV")? {
            link(conn, FILM_LOCATIONS, film_id, &location)?;
            counts.locations += 1;
        }
    }

    for (tag, category) in row_tags(row) {
        get_or_create_tag(conn, &tag, category)?;
        link(conn, FILM_TAGS, film_id, &tag)?;
        counts.tags += 1;
    }

    delete_chapters_of_film(conn, film_id)?;
    for (position, (start_time, title)) in parse_chapter_lines(row.raw("Chapters")).into_iter().enumerate() {
        insert_chapter(
            conn,
            &NewChapter {
                film_id,
                start_time,
                title,
                order: position as i64 + 1,
                ..Default::default()
            },
        )?;
        counts.chapters += 1;
    }
    Ok(counts)
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FilmImportStats {
    pub films: usize,
    pub chapters: usize,
    pub people: usize,
    pub locations: usize,
    pub tags: usize,
    pub errors: Vec<String>,
}

impl FilmImportStats {
    fn add(&mut self, counts: &RowCounts) {
        self.films += 1;
        self.chapters += counts.chapters;
        self.people += counts.people;
        self.locations += counts.locations;
        self.tags += counts.tags;
    }
}

/// One transaction per film row. A failing row is recorded and the import
/// continues; on dry run every row is rolled back.
pub fn import_films_csv(store: &SqliteCatalogStore, text: &str, playlist_id: &str, dry_run: bool) -> Result<FilmImportStats> {
    let mut stats = FilmImportStats::default();
    for row in parse_film_csv(text)?.iter().filter(|r| r.is_valid_film()) {
        match store.write_or_rollback(dry_run, |conn| import_film_row(conn, row, playlist_id)) {
            Ok(counts) => {
                stats.add(&counts);
                if stats.films % 10 == 0 {
                    info!("Processed {} films...", stats.films);
                }
            }
            Err(e) => {
                let message = format!("Error processing row {}: {:#}", row.line, e);
                error!("{}", message);
                stats.errors.push(message);
            }
        }
    }
    Ok(stats)
}
