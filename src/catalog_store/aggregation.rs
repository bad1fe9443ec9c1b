//! Union views over direct (film-level) and chapter-level associations.
//!
//! Every function here treats "linked to film F" as "linked to F directly or
//! to any chapter of F". Film counts are sizes of that union, never the sum
//! of both paths.

use super::models::*;
use super::queries::*;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;

/// Sub-select of person ids linked to film `?1` by either path.
const UNION_PEOPLE_OF_FILM: &str = "SELECT person_id FROM film_people WHERE film_id = ?1
     UNION SELECT cp.person_id FROM chapter_people cp
           JOIN chapters c ON c.id = cp.chapter_id WHERE c.film_id = ?1";

const UNION_LOCATIONS_OF_FILM: &str = "SELECT location_id FROM film_locations WHERE film_id = ?1
     UNION SELECT cl.location_id FROM chapter_locations cl
           JOIN chapters c ON c.id = cl.chapter_id WHERE c.film_id = ?1";

const UNION_TAGS_OF_FILM: &str = "SELECT tag FROM film_tags WHERE film_id = ?1
     UNION SELECT ct.tag FROM chapter_tags ct
           JOIN chapters c ON c.id = ct.chapter_id WHERE c.film_id = ?1";

/// Entity kinds that can be attached to films and chapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkedEntity {
    Person,
    Location,
    Tag,
}

impl LinkedEntity {
    pub fn film_table(&self) -> LinkTable {
        match self {
            LinkedEntity::Person => FILM_PEOPLE,
            LinkedEntity::Location => FILM_LOCATIONS,
            LinkedEntity::Tag => FILM_TAGS,
        }
    }

    pub fn chapter_table(&self) -> LinkTable {
        match self {
            LinkedEntity::Person => CHAPTER_PEOPLE,
            LinkedEntity::Location => CHAPTER_LOCATIONS,
            LinkedEntity::Tag => CHAPTER_TAGS,
        }
    }

    /// Sub-select of film ids linked to the entity `?N` by either path.
    pub fn union_films_sql(&self, placeholder: &str) -> String {
        let film = self.film_table();
        let chapter = self.chapter_table();
        format!(
            "SELECT film_id FROM {ft} WHERE {col} = {ph}
             UNION SELECT c.film_id FROM {ct} x JOIN chapters c ON c.id = x.chapter_id
                   WHERE x.{col} = {ph}",
            ft = film.table,
            ct = chapter.table,
            col = film.target_column,
            ph = placeholder
        )
    }

    /// Correlated count of distinct films for the entity key expression
    /// `key` (e.g. `p.id`), usable in a select list or `WHERE ... > 0`.
    pub fn film_count_sql(&self, key: &str) -> String {
        let film = self.film_table();
        let chapter = self.chapter_table();
        format!(
            "(SELECT COUNT(*) FROM films fc
              WHERE fc.id IN (SELECT film_id FROM {ft} WHERE {col} = {key})
                 OR fc.id IN (SELECT c.film_id FROM {ct} x JOIN chapters c ON c.id = x.chapter_id
                              WHERE x.{col} = {key}))",
            ft = film.table,
            ct = chapter.table,
            col = film.target_column,
            key = key
        )
    }
}

pub fn aggregate_people(conn: &Connection, film_id: i64) -> Result<Vec<Person>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM people p WHERE p.id IN ({}) ORDER BY {}",
        PERSON_COLUMNS, UNION_PEOPLE_OF_FILM, PERSON_ORDER
    ))?;
    let rows = stmt
        .query_map(params![film_id], person_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn aggregate_locations(conn: &Connection, film_id: i64) -> Result<Vec<Location>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM locations l WHERE l.id IN ({}) ORDER BY l.name",
        LOCATION_COLUMNS, UNION_LOCATIONS_OF_FILM
    ))?;
    let rows = stmt
        .query_map(params![film_id], location_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn aggregate_tags(conn: &Connection, film_id: i64) -> Result<Vec<Tag>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM tags t WHERE t.tag IN ({}) ORDER BY t.tag",
        TAG_COLUMNS, UNION_TAGS_OF_FILM
    ))?;
    let rows = stmt
        .query_map(params![film_id], tag_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Distinct years parsed from the film's `years` text and from every
/// chapter's, ascending.
pub fn aggregate_years(conn: &Connection, film_id: i64) -> Result<Vec<i32>> {
    let film_years: Option<String> = conn
        .query_row(
            "SELECT years FROM films WHERE id = ?1",
            params![film_id],
            |r| r.get(0),
        )
        .optional()?;

    let mut years: BTreeSet<i32> = BTreeSet::new();
    if let Some(text) = film_years {
        years.extend(parse_years(&text));
    }

    let mut stmt = conn.prepare("SELECT years FROM chapters WHERE film_id = ?1")?;
    let chapter_years = stmt
        .query_map(params![film_id], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    for text in chapter_years {
        years.extend(parse_years(&text));
    }
    Ok(years.into_iter().collect())
}

pub fn aggregate_metadata(conn: &Connection, film_id: i64) -> Result<AggregatedMetadata> {
    Ok(AggregatedMetadata {
        people: aggregate_people(conn, film_id)?,
        locations: aggregate_locations(conn, film_id)?,
        tags: aggregate_tags(conn, film_id)?,
        years: aggregate_years(conn, film_id)?,
    })
}

pub fn film_count(conn: &Connection, entity: LinkedEntity, key: &dyn rusqlite::ToSql) -> Result<i64> {
    count(
        conn,
        &format!("SELECT {}", entity.film_count_sql("?1")),
        params![key],
    )
}

/// Films linked to the entity by either path, without duplicates.
pub fn films_of(conn: &Connection, entity: LinkedEntity, key: &dyn rusqlite::ToSql) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT f.id FROM films f WHERE f.id IN ({})
         ORDER BY f.playlist_order IS NULL, f.playlist_order, f.title",
        entity.union_films_sql("?1")
    ))?;
    let ids = stmt
        .query_map(params![key], |r| r.get(0))?
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(ids)
}

pub fn people_with_film_counts(conn: &Connection, only_with_films: bool) -> Result<Vec<WithFilmCount<Person>>> {
    let count_sql = LinkedEntity::Person.film_count_sql("p.id");
    let mut stmt = conn.prepare(&format!(
        "SELECT {}, {} AS film_count FROM people p {} ORDER BY {}",
        PERSON_COLUMNS,
        count_sql,
        if only_with_films { format!("WHERE {} > 0", count_sql) } else { String::new() },
        PERSON_ORDER
    ))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(WithFilmCount {
                item: person_from_row(row)?,
                film_count: row.get(10)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn locations_with_film_counts(conn: &Connection, only_with_films: bool) -> Result<Vec<WithFilmCount<Location>>> {
    let count_sql = LinkedEntity::Location.film_count_sql("l.id");
    let mut stmt = conn.prepare(&format!(
        "SELECT {}, {} AS film_count FROM locations l {} ORDER BY l.name",
        LOCATION_COLUMNS,
        count_sql,
        if only_with_films { format!("WHERE {} > 0", count_sql) } else { String::new() },
    ))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(WithFilmCount {
                item: location_from_row(row)?,
                film_count: row.get(8)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn tags_with_film_counts(conn: &Connection, only_with_films: bool) -> Result<Vec<WithFilmCount<Tag>>> {
    let count_sql = LinkedEntity::Tag.film_count_sql("t.tag");
    let mut stmt = conn.prepare(&format!(
        "SELECT {}, {} AS film_count FROM tags t {} ORDER BY t.tag",
        TAG_COLUMNS,
        count_sql,
        if only_with_films { format!("WHERE {} > 0", count_sql) } else { String::new() },
    ))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(WithFilmCount {
                item: tag_from_row(row)?,
                film_count: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Sorts by descending film count, keeping the incoming order for ties, and
/// keeps the first `limit`.
pub fn top_by_film_count<T>(mut items: Vec<WithFilmCount<T>>, limit: usize) -> Vec<WithFilmCount<T>> {
    items.sort_by(|a, b| b.film_count.cmp(&a.film_count));
    items.truncate(limit);
    items
}

/// Other films directly linked to any aggregated person, location or tag of
/// the film, distinct, at most `limit`.
pub fn related_films(conn: &Connection, film_id: i64, limit: usize) -> Result<Vec<Film>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT DISTINCT {} FROM films f
         WHERE f.id != ?1 AND (
            f.id IN (SELECT film_id FROM film_people WHERE person_id IN ({}))
            OR f.id IN (SELECT film_id FROM film_locations WHERE location_id IN ({}))
            OR f.id IN (SELECT film_id FROM film_tags WHERE tag IN ({}))
         )
         ORDER BY f.playlist_order IS NULL, f.playlist_order, f.title
         LIMIT ?2",
        FILM_COLUMNS, UNION_PEOPLE_OF_FILM, UNION_LOCATIONS_OF_FILM, UNION_TAGS_OF_FILM
    ))?;
    let rows = stmt
        .query_map(params![film_id, limit as i64], film_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
