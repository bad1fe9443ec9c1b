//! Connection-level catalog reads and writes.
//!
//! Everything here takes a plain `&Connection` and never opens a
//! transaction, so importers, merges and the store can compose several calls
//! inside one `BEGIN IMMEDIATE` block.

use super::models::*;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use std::collections::HashSet;

// =============================================================================
// Row parsing
// =============================================================================

pub const PERSON_COLUMNS: &str = "p.id, p.first_name, p.last_name, p.birth_date, p.death_date, \
     p.father_id, p.mother_id, p.spouse_id, p.notes, p.hayward_index";

pub const LOCATION_COLUMNS: &str =
    "l.id, l.name, l.description, l.city, l.state, l.country, l.latitude, l.longitude";

pub const TAG_COLUMNS: &str = "t.tag, t.category, t.description";

pub const FILM_COLUMNS: &str = "f.id, f.file_id, f.youtube_url, f.youtube_id, f.title, \
     f.description, f.summary, f.duration, f.upload_date, f.thumbnail_url, f.thumbnail_high_url, \
     f.thumbnail_medium_url, f.preview_sprite_url, f.preview_frame_count, \
     f.preview_frame_interval, f.preview_sprite_width, f.preview_sprite_height, f.years, \
     f.technical_notes, f.workflow_state, f.playlist_order";

pub const CHAPTER_COLUMNS: &str = "c.id, c.film_id, c.start_time, c.start_time_seconds, c.title, \
     c.description, c.years, c.chapter_order, c.thumbnail_url, c.has_people_metadata, \
     c.has_location_metadata, c.has_tags_metadata, c.has_years_metadata";

pub const PERSON_ORDER: &str = "p.last_name, p.first_name";

pub fn person_from_row(row: &Row) -> rusqlite::Result<Person> {
    Ok(Person {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        birth_date: row.get(3)?,
        death_date: row.get(4)?,
        father_id: row.get(5)?,
        mother_id: row.get(6)?,
        spouse_id: row.get(7)?,
        notes: row.get(8)?,
        hayward_index: row.get(9)?,
    })
}

pub fn location_from_row(row: &Row) -> rusqlite::Result<Location> {
    Ok(Location {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        city: row.get(3)?,
        state: row.get(4)?,
        country: row.get(5)?,
        latitude: row.get(6)?,
        longitude: row.get(7)?,
    })
}

pub fn tag_from_row(row: &Row) -> rusqlite::Result<Tag> {
    Ok(Tag {
        tag: row.get(0)?,
        category: TagCategory::from_db_str(&row.get::<_, String>(1)?),
        description: row.get(2)?,
    })
}

pub fn film_from_row(row: &Row) -> rusqlite::Result<Film> {
    Ok(Film {
        id: row.get(0)?,
        file_id: row.get(1)?,
        youtube_url: row.get(2)?,
        youtube_id: row.get(3)?,
        title: row.get(4)?,
        description: row.get(5)?,
        summary: row.get(6)?,
        duration: row.get(7)?,
        upload_date: row.get(8)?,
        thumbnail_url: row.get(9)?,
        thumbnail_high_url: row.get(10)?,
        thumbnail_medium_url: row.get(11)?,
        preview_sprite_url: row.get(12)?,
        preview_frame_count: row.get(13)?,
        preview_frame_interval: row.get(14)?,
        preview_sprite_width: row.get(15)?,
        preview_sprite_height: row.get(16)?,
        years: row.get(17)?,
        technical_notes: row.get(18)?,
        workflow_state: row.get(19)?,
        playlist_order: row.get(20)?,
    })
}

pub fn chapter_from_row(row: &Row) -> rusqlite::Result<Chapter> {
    Ok(Chapter {
        id: row.get(0)?,
        film_id: row.get(1)?,
        start_time: row.get(2)?,
        start_time_seconds: row.get(3)?,
        title: row.get(4)?,
        description: row.get(5)?,
        years: row.get(6)?,
        order: row.get(7)?,
        thumbnail_url: row.get(8)?,
        has_people_metadata: row.get::<_, i64>(9)? != 0,
        has_location_metadata: row.get::<_, i64>(10)? != 0,
        has_tags_metadata: row.get::<_, i64>(11)? != 0,
        has_years_metadata: row.get::<_, i64>(12)? != 0,
    })
}

pub(crate) fn query_list<T, P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    f: fn(&Row) -> rusqlite::Result<T>,
) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, f)?.collect::<Result<Vec<T>, _>>()?;
    Ok(rows)
}

pub fn count(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<i64> {
    Ok(conn.query_row(sql, params, |r| r.get(0))?)
}

// =============================================================================
// Join tables
// =============================================================================

/// A join table between an owner (film or chapter) and a target entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTable {
    pub table: &'static str,
    pub owner_column: &'static str,
    pub target_column: &'static str,
}

pub const FILM_PEOPLE: LinkTable = LinkTable {
    table: "film_people",
    owner_column: "film_id",
    target_column: "person_id",
};
pub const FILM_LOCATIONS: LinkTable = LinkTable {
    table: "film_locations",
    owner_column: "film_id",
    target_column: "location_id",
};
pub const FILM_TAGS: LinkTable = LinkTable {
    table: "film_tags",
    owner_column: "film_id",
    target_column: "tag",
};
pub const CHAPTER_PEOPLE: LinkTable = LinkTable {
    table: "chapter_people",
    owner_column: "chapter_id",
    target_column: "person_id",
};
pub const CHAPTER_LOCATIONS: LinkTable = LinkTable {
    table: "chapter_locations",
    owner_column: "chapter_id",
    target_column: "location_id",
};
pub const CHAPTER_TAGS: LinkTable = LinkTable {
    table: "chapter_tags",
    owner_column: "chapter_id",
    target_column: "tag",
};

pub const ALL_LINK_TABLES: [LinkTable; 6] = [
    FILM_PEOPLE,
    FILM_LOCATIONS,
    FILM_TAGS,
    CHAPTER_PEOPLE,
    CHAPTER_LOCATIONS,
    CHAPTER_TAGS,
];

/// Get-or-create of one join row. Returns true when a row was inserted.
pub fn link(conn: &Connection, table: LinkTable, owner_id: i64, target: &dyn ToSql) -> Result<bool> {
    let inserted = conn.execute(
        &format!(
            "INSERT OR IGNORE INTO {} ({}, {}) VALUES (?1, ?2)",
            table.table, table.owner_column, table.target_column
        ),
        params![owner_id, target],
    )?;
    Ok(inserted > 0)
}

pub fn unlink(
    conn: &Connection,
    table: LinkTable,
    owner_id: i64,
    target: &dyn ToSql,
) -> Result<bool> {
    let deleted = conn.execute(
        &format!(
            "DELETE FROM {} WHERE {} = ?1 AND {} = ?2",
            table.table, table.owner_column, table.target_column
        ),
        params![owner_id, target],
    )?;
    Ok(deleted > 0)
}

pub fn clear_links(conn: &Connection, table: LinkTable, owner_id: i64) -> Result<usize> {
    Ok(conn.execute(
        &format!("DELETE FROM {} WHERE {} = ?1", table.table, table.owner_column),
        params![owner_id],
    )?)
}

pub fn is_linked(conn: &Connection, table: LinkTable, owner_id: i64, target: &dyn ToSql) -> Result<bool> {
    let found = conn
        .query_row(
            &format!(
                "SELECT 1 FROM {} WHERE {} = ?1 AND {} = ?2",
                table.table, table.owner_column, table.target_column
            ),
            params![owner_id, target],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Number of join rows referencing `target` in `table`.
pub fn count_target_rows(conn: &Connection, table: LinkTable, target: &dyn ToSql) -> Result<i64> {
    count(
        conn,
        &format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ?1",
            table.table, table.target_column
        ),
        params![target],
    )
}

/// Owners (film or chapter ids) linked to `target`.
pub fn owners_of(conn: &Connection, table: LinkTable, target: &dyn ToSql) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM {} WHERE {} = ?1 ORDER BY {}",
        table.owner_column, table.table, table.target_column, table.owner_column
    ))?;
    let ids = stmt
        .query_map(params![target], |r| r.get(0))?
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(ids)
}

// =============================================================================
// People
// =============================================================================

pub fn get_person(conn: &Connection, id: i64) -> Result<Option<Person>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM people p WHERE p.id = ?1", PERSON_COLUMNS),
            params![id],
            person_from_row,
        )
        .optional()?)
}

pub fn person_exists(conn: &Connection, id: i64) -> Result<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM people WHERE id = ?1", params![id], |_| Ok(()))
        .optional()?
        .is_some())
}

pub fn list_people(conn: &Connection) -> Result<Vec<Person>> {
    query_list(
        conn,
        &format!(
            "SELECT {} FROM people p ORDER BY {}",
            PERSON_COLUMNS, PERSON_ORDER
        ),
        [],
        person_from_row,
    )
}

pub fn find_person_by_hayward_index(conn: &Connection, index: i64) -> Result<Option<Person>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {} FROM people p WHERE p.hayward_index = ?1 ORDER BY p.id LIMIT 1",
                PERSON_COLUMNS
            ),
            params![index],
            person_from_row,
        )
        .optional()?)
}

/// Case-insensitive match on both name parts.
pub fn find_person_by_name(conn: &Connection, first: &str, last: &str) -> Result<Option<Person>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {} FROM people p
                 WHERE lower(p.first_name) = lower(?1) AND lower(p.last_name) = lower(?2)
                 ORDER BY p.id LIMIT 1",
                PERSON_COLUMNS
            ),
            params![first, last],
            person_from_row,
        )
        .optional()?)
}

pub fn insert_person(
    conn: &Connection,
    first: &str,
    last: &str,
    notes: &str,
    hayward_index: Option<i64>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO people (first_name, last_name, notes, hayward_index) VALUES (?1, ?2, ?3, ?4)",
        params![first, last, notes, hayward_index],
    )
    .with_context(|| format!("Failed to create person {} {}", first, last))?;
    Ok(conn.last_insert_rowid())
}

/// Exact (first, last) get-or-create. `notes` is only written on create.
pub fn get_or_create_person(
    conn: &Connection,
    first: &str,
    last: &str,
    notes: &str,
) -> Result<(i64, bool)> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM people WHERE first_name = ?1 AND last_name = ?2",
            params![first, last],
            |r| r.get(0),
        )
        .optional()?;
    match existing {
        Some(id) => Ok((id, false)),
        None => Ok((insert_person(conn, first, last, notes, None)?, true)),
    }
}

pub fn set_hayward_index(conn: &Connection, person_id: i64, index: i64) -> Result<()> {
    conn.execute(
        "UPDATE people SET hayward_index = ?2 WHERE id = ?1",
        params![person_id, index],
    )?;
    Ok(())
}

pub fn update_person_details(
    conn: &Connection,
    person_id: i64,
    first: &str,
    last: &str,
    birth_date: Option<&str>,
    death_date: Option<&str>,
) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE people SET first_name = ?2, last_name = ?3, birth_date = ?4, death_date = ?5
         WHERE id = ?1",
        params![person_id, first, last, birth_date, death_date],
    )?;
    Ok(updated > 0)
}

pub fn set_person_notes(conn: &Connection, person_id: i64, notes: &str) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE people SET notes = ?2 WHERE id = ?1",
        params![person_id, notes],
    )?;
    Ok(updated > 0)
}

pub fn set_parents(
    conn: &Connection,
    person_id: i64,
    father_id: Option<i64>,
    mother_id: Option<i64>,
) -> Result<()> {
    conn.execute(
        "UPDATE people SET father_id = ?2, mother_id = ?3 WHERE id = ?1",
        params![person_id, father_id, mother_id],
    )?;
    Ok(())
}

pub fn set_life_dates(
    conn: &Connection,
    person_id: i64,
    birth_date: Option<&str>,
    death_date: Option<&str>,
) -> Result<()> {
    conn.execute(
        "UPDATE people SET birth_date = ?2, death_date = ?3 WHERE id = ?1",
        params![person_id, birth_date, death_date],
    )?;
    Ok(())
}

/// Symmetric spouse update. Any current partner of `person_id` or of the new
/// spouse loses its link first; then both sides point at each other.
/// `None` clears the person and its former partner.
pub fn set_spouse(conn: &Connection, person_id: i64, spouse_id: Option<i64>) -> Result<()> {
    conn.execute(
        "UPDATE people SET spouse_id = NULL WHERE spouse_id = ?1 OR id = ?1",
        params![person_id],
    )?;
    if let Some(spouse_id) = spouse_id {
        conn.execute(
            "UPDATE people SET spouse_id = NULL WHERE spouse_id = ?1 OR id = ?1",
            params![spouse_id],
        )?;
        conn.execute(
            "UPDATE people SET spouse_id = ?2 WHERE id = ?1",
            params![person_id, spouse_id],
        )?;
        conn.execute(
            "UPDATE people SET spouse_id = ?2 WHERE id = ?1",
            params![spouse_id, person_id],
        )?;
    }
    Ok(())
}

/// All persons descending from `person_id` via father/mother links.
pub fn descendants(conn: &Connection, person_id: i64) -> Result<HashSet<i64>> {
    let mut stmt = conn.prepare(
        "WITH RECURSIVE descendants(id) AS (
            SELECT id FROM people WHERE father_id = ?1 OR mother_id = ?1
            UNION
            SELECT p.id FROM people p JOIN descendants d ON p.father_id = d.id OR p.mother_id = d.id
         )
         SELECT id FROM descendants",
    )?;
    let ids = stmt
        .query_map(params![person_id], |r| r.get(0))?
        .collect::<Result<HashSet<i64>, _>>()?;
    Ok(ids)
}

pub fn children_of(conn: &Connection, person_id: i64) -> Result<Vec<Person>> {
    query_list(
        conn,
        &format!(
            "SELECT {} FROM people p WHERE p.father_id = ?1 OR p.mother_id = ?1
             ORDER BY p.birth_date, {}",
            PERSON_COLUMNS, PERSON_ORDER
        ),
        params![person_id],
        person_from_row,
    )
}

/// Persons sharing at least one parent with `person`, excluding itself.
pub fn siblings_of(conn: &Connection, person: &Person) -> Result<Vec<Person>> {
    if person.father_id.is_none() && person.mother_id.is_none() {
        return Ok(vec![]);
    }
    query_list(
        conn,
        &format!(
            "SELECT {} FROM people p
             WHERE p.id != ?1
               AND ((?2 IS NOT NULL AND p.father_id = ?2) OR (?3 IS NOT NULL AND p.mother_id = ?3))
             ORDER BY p.birth_date, {}",
            PERSON_COLUMNS, PERSON_ORDER
        ),
        params![person.id, person.father_id, person.mother_id],
        person_from_row,
    )
}

pub fn delete_person(conn: &Connection, person_id: i64) -> Result<bool> {
    Ok(conn.execute("DELETE FROM people WHERE id = ?1", params![person_id])? > 0)
}

// =============================================================================
// Locations
// =============================================================================

pub fn get_location(conn: &Connection, id: i64) -> Result<Option<Location>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM locations l WHERE l.id = ?1", LOCATION_COLUMNS),
            params![id],
            location_from_row,
        )
        .optional()?)
}

pub fn location_exists(conn: &Connection, id: i64) -> Result<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM locations WHERE id = ?1", params![id], |_| Ok(()))
        .optional()?
        .is_some())
}

pub fn list_locations(conn: &Connection) -> Result<Vec<Location>> {
    query_list(
        conn,
        &format!("SELECT {} FROM locations l ORDER BY l.name", LOCATION_COLUMNS),
        [],
        location_from_row,
    )
}

/// Case-insensitive lookup of a trimmed name; lowest id wins on ties.
pub fn find_location_by_name(conn: &Connection, name: &str) -> Result<Option<Location>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {} FROM locations l WHERE lower(l.name) = lower(?1) ORDER BY l.id LIMIT 1",
                LOCATION_COLUMNS
            ),
            params![name.trim()],
            location_from_row,
        )
        .optional()?)
}

pub fn insert_location(conn: &Connection, name: &str, description: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO locations (name, description) VALUES (?1, ?2)",
        params![name, description],
    )
    .with_context(|| format!("Failed to create location {}", name))?;
    Ok(conn.last_insert_rowid())
}

/// Trimmed, case-insensitive get-or-create; an empty name yields `None`.
/// `description` is only written on create.
pub fn get_or_create_location(
    conn: &Connection,
    name: &str,
    description: &str,
) -> Result<Option<(i64, bool)>> {
    let name = name.trim();
    if name.is_empty() {
        return Ok(None);
    }
    if let Some(existing) = find_location_by_name(conn, name)? {
        return Ok(Some((existing.id, false)));
    }
    Ok(Some((insert_location(conn, name, description)?, true)))
}

pub fn delete_location(conn: &Connection, location_id: i64) -> Result<bool> {
    Ok(conn.execute("DELETE FROM locations WHERE id = ?1", params![location_id])? > 0)
}

// =============================================================================
// Tags
// =============================================================================

pub fn get_tag(conn: &Connection, tag: &str) -> Result<Option<Tag>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM tags t WHERE t.tag = ?1", TAG_COLUMNS),
            params![tag],
            tag_from_row,
        )
        .optional()?)
}

pub fn list_tags(conn: &Connection) -> Result<Vec<Tag>> {
    query_list(
        conn,
        &format!("SELECT {} FROM tags t ORDER BY t.tag", TAG_COLUMNS),
        [],
        tag_from_row,
    )
}

/// `category` is only applied on create.
pub fn get_or_create_tag(conn: &Connection, tag: &str, category: TagCategory) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO tags (tag, category) VALUES (?1, ?2)",
        params![tag, category.to_db_str()],
    )?;
    Ok(inserted > 0)
}

// =============================================================================
// Films
// =============================================================================

pub fn get_film(conn: &Connection, id: i64) -> Result<Option<Film>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM films f WHERE f.id = ?1", FILM_COLUMNS),
            params![id],
            film_from_row,
        )
        .optional()?)
}

pub fn get_film_by_file_id(conn: &Connection, file_id: &str) -> Result<Option<Film>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM films f WHERE f.file_id = ?1", FILM_COLUMNS),
            params![file_id],
            film_from_row,
        )
        .optional()?)
}

pub fn find_films_by_file_id_prefix(conn: &Connection, prefix: &str) -> Result<Vec<Film>> {
    query_list(
        conn,
        &format!(
            "SELECT {} FROM films f WHERE substr(f.file_id, 1, length(?1)) = ?1 ORDER BY f.file_id",
            FILM_COLUMNS
        ),
        params![prefix],
        film_from_row,
    )
}

pub fn list_films(conn: &Connection) -> Result<Vec<Film>> {
    query_list(
        conn,
        &format!(
            "SELECT {} FROM films f ORDER BY f.playlist_order IS NULL, f.playlist_order, f.title",
            FILM_COLUMNS
        ),
        [],
        film_from_row,
    )
}

/// Creates or updates the film with `upsert.file_id`. An existing film
/// already mapped to a real video keeps its youtube id, url and thumbnail.
pub fn upsert_film(conn: &Connection, upsert: &FilmUpsert) -> Result<(i64, bool)> {
    match get_film_by_file_id(conn, &upsert.file_id)? {
        Some(existing) => {
            let keep_video = !existing.is_placeholder();
            let (youtube_id, youtube_url, thumbnail_url) = if keep_video {
                (
                    existing.youtube_id.as_str(),
                    existing.youtube_url.as_str(),
                    existing.thumbnail_url.as_str(),
                )
            } else {
                (
                    upsert.youtube_id.as_str(),
                    upsert.youtube_url.as_str(),
                    upsert.thumbnail_url.as_str(),
                )
            };
            conn.execute(
                "UPDATE films SET title = ?2, description = ?3, summary = ?4, years = ?5,
                    technical_notes = ?6, workflow_state = ?7, duration = ?8, youtube_id = ?9,
                    youtube_url = ?10, thumbnail_url = ?11
                 WHERE id = ?1",
                params![
                    existing.id,
                    upsert.title,
                    upsert.description,
                    upsert.summary,
                    upsert.years,
                    upsert.technical_notes,
                    upsert.workflow_state,
                    upsert.duration,
                    youtube_id,
                    youtube_url,
                    thumbnail_url
                ],
            )?;
            Ok((existing.id, false))
        }
        None => {
            conn.execute(
                "INSERT INTO films (file_id, title, description, summary, years, technical_notes,
                    workflow_state, duration, youtube_id, youtube_url, thumbnail_url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    upsert.file_id,
                    upsert.title,
                    upsert.description,
                    upsert.summary,
                    upsert.years,
                    upsert.technical_notes,
                    upsert.workflow_state,
                    upsert.duration,
                    upsert.youtube_id,
                    upsert.youtube_url,
                    upsert.thumbnail_url
                ],
            )
            .with_context(|| format!("Failed to create film {}", upsert.file_id))?;
            Ok((conn.last_insert_rowid(), true))
        }
    }
}

pub fn set_film_years(conn: &Connection, film_id: i64, years: &str) -> Result<()> {
    conn.execute(
        "UPDATE films SET years = ?2 WHERE id = ?1",
        params![film_id, years],
    )?;
    Ok(())
}

// =============================================================================
// Chapters
// =============================================================================

pub fn get_chapter(conn: &Connection, id: i64) -> Result<Option<Chapter>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM chapters c WHERE c.id = ?1", CHAPTER_COLUMNS),
            params![id],
            chapter_from_row,
        )
        .optional()?)
}

pub fn chapters_of_film(conn: &Connection, film_id: i64) -> Result<Vec<Chapter>> {
    query_list(
        conn,
        &format!(
            "SELECT {} FROM chapters c WHERE c.film_id = ?1 ORDER BY c.chapter_order, c.id",
            CHAPTER_COLUMNS
        ),
        params![film_id],
        chapter_from_row,
    )
}

/// `start_time_seconds` is derived from `start_time`.
pub fn insert_chapter(conn: &Connection, chapter: &NewChapter) -> Result<i64> {
    conn.execute(
        "INSERT INTO chapters (film_id, start_time, start_time_seconds, title, description, years,
            chapter_order, has_years_metadata)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            chapter.film_id,
            chapter.start_time,
            parse_time_to_seconds(&chapter.start_time),
            chapter.title,
            chapter.description,
            chapter.years,
            chapter.order,
            !chapter.years.trim().is_empty()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn delete_chapters_of_film(conn: &Connection, film_id: i64) -> Result<usize> {
    Ok(conn.execute("DELETE FROM chapters WHERE film_id = ?1", params![film_id])?)
}

pub fn set_chapter_description(conn: &Connection, chapter_id: i64, description: &str) -> Result<()> {
    conn.execute(
        "UPDATE chapters SET description = ?2 WHERE id = ?1",
        params![chapter_id, description],
    )?;
    Ok(())
}

pub fn set_chapter_years(conn: &Connection, chapter_id: i64, years: &str) -> Result<()> {
    conn.execute(
        "UPDATE chapters SET years = ?2 WHERE id = ?1",
        params![chapter_id, years],
    )?;
    Ok(())
}

/// Recomputes the cached `has_*_metadata` flags from the join tables and
/// the `years` column. Must follow every change to a chapter's associations.
pub fn update_chapter_metadata_flags(conn: &Connection, chapter_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE chapters SET
            has_people_metadata = EXISTS (SELECT 1 FROM chapter_people WHERE chapter_id = ?1),
            has_location_metadata = EXISTS (SELECT 1 FROM chapter_locations WHERE chapter_id = ?1),
            has_tags_metadata = EXISTS (SELECT 1 FROM chapter_tags WHERE chapter_id = ?1),
            has_years_metadata = (trim(years) != '')
         WHERE id = ?1",
        params![chapter_id],
    )?;
    Ok(())
}

pub fn chapter_people(conn: &Connection, chapter_id: i64) -> Result<Vec<Person>> {
    query_list(
        conn,
        &format!(
            "SELECT {} FROM people p JOIN chapter_people cp ON cp.person_id = p.id
             WHERE cp.chapter_id = ?1 ORDER BY {}",
            PERSON_COLUMNS, PERSON_ORDER
        ),
        params![chapter_id],
        person_from_row,
    )
}

pub fn chapter_locations(conn: &Connection, chapter_id: i64) -> Result<Vec<Location>> {
    query_list(
        conn,
        &format!(
            "SELECT {} FROM locations l JOIN chapter_locations cl ON cl.location_id = l.id
             WHERE cl.chapter_id = ?1 ORDER BY l.name",
            LOCATION_COLUMNS
        ),
        params![chapter_id],
        location_from_row,
    )
}

pub fn chapter_tags(conn: &Connection, chapter_id: i64) -> Result<Vec<Tag>> {
    query_list(
        conn,
        &format!(
            "SELECT {} FROM tags t JOIN chapter_tags ct ON ct.tag = t.tag
             WHERE ct.chapter_id = ?1 ORDER BY t.tag",
            TAG_COLUMNS
        ),
        params![chapter_id],
        tag_from_row,
    )
}

pub fn film_people(conn: &Connection, film_id: i64) -> Result<Vec<Person>> {
    query_list(
        conn,
        &format!(
            "SELECT {} FROM people p JOIN film_people fp ON fp.person_id = p.id
             WHERE fp.film_id = ?1 ORDER BY {}",
            PERSON_COLUMNS, PERSON_ORDER
        ),
        params![film_id],
        person_from_row,
    )
}

pub fn film_locations(conn: &Connection, film_id: i64) -> Result<Vec<Location>> {
    query_list(
        conn,
        &format!(
            "SELECT {} FROM locations l JOIN film_locations fl ON fl.location_id = l.id
             WHERE fl.film_id = ?1 ORDER BY l.name",
            LOCATION_COLUMNS
        ),
        params![film_id],
        location_from_row,
    )
}

pub fn film_tags(conn: &Connection, film_id: i64) -> Result<Vec<Tag>> {
    query_list(
        conn,
        &format!(
            "SELECT {} FROM tags t JOIN film_tags ft ON ft.tag = t.tag
             WHERE ft.film_id = ?1 ORDER BY t.tag",
            TAG_COLUMNS
        ),
        params![film_id],
        tag_from_row,
    )
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::catalog_store::CATALOG_VERSIONED_SCHEMAS;

    pub fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();
        CATALOG_VERSIONED_SCHEMAS[0].create(&conn).unwrap();
        conn
    }

    pub fn add_film(conn: &Connection, file_id: &str, title: &str) -> i64 {
        upsert_film(
            conn,
            &FilmUpsert {
                file_id: file_id.to_string(),
                title: title.to_string(),
                youtube_id: format!("yt_{}", file_id),
                ..Default::default()
            },
        )
        .unwrap()
        .0
    }

    pub fn add_chapter(conn: &Connection, film_id: i64, start: &str, title: &str, order: i64) -> i64 {
        insert_chapter(
            conn,
            &NewChapter {
                film_id,
                start_time: start.to_string(),
                title: title.to_string(),
                order,
                ..Default::default()
            },
        )
        .unwrap()
    }

    pub fn add_person(conn: &Connection, first: &str, last: &str) -> i64 {
        insert_person(conn, first, last, "", None).unwrap()
    }
}
