//! Metadata edits on films and chapters.
//!
//! None of these open a transaction; the store wraps each call in one.
//! Chapter edits always finish by recomputing the chapter's cached flags.

use super::browse::ChapterMetadataView;
use super::error::{CatalogError, CatalogResult};
use super::models::*;
use super::queries::*;
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::Value;

/// Body of the add/remove edit endpoints: `{type, action, value | id}`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MetadataEditRequest {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub action: Option<String>,
    pub value: Option<Value>,
    pub id: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MetadataEdit {
    AddPerson(String),
    RemovePerson(i64),
    AddLocation(String),
    RemoveLocation(i64),
    AddTag(String),
    RemoveTag(String),
    SetYears(String),
}

fn text_of(value: &Option<Value>, field: &str) -> CatalogResult<String> {
    match value {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(CatalogError::InvalidInput(format!("Missing '{}'", field))),
    }
}

fn id_of(value: &Option<Value>) -> CatalogResult<i64> {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| CatalogError::InvalidInput(format!("Invalid id {}", n))),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| CatalogError::InvalidInput(format!("Invalid id '{}'", s))),
        _ => Err(CatalogError::InvalidInput("Missing 'id'".to_string())),
    }
}

impl MetadataEditRequest {
    /// `years/set` is only accepted when `allow_years` is set (chapters).
    pub fn parse(&self, allow_years: bool) -> CatalogResult<MetadataEdit> {
        let kind = self.kind.as_deref().unwrap_or("");
        let action = self.action.as_deref().unwrap_or("");
        match (kind, action) {
            ("people", "add") => Ok(MetadataEdit::AddPerson(text_of(&self.value, "value")?)),
            ("people", "remove") => Ok(MetadataEdit::RemovePerson(id_of(&self.id)?)),
            ("locations", "add") => Ok(MetadataEdit::AddLocation(text_of(&self.value, "value")?)),
            ("locations", "remove") => Ok(MetadataEdit::RemoveLocation(id_of(&self.id)?)),
            ("tags", "add") => Ok(MetadataEdit::AddTag(text_of(&self.value, "value")?)),
            ("tags", "remove") => Ok(MetadataEdit::RemoveTag(text_of(&self.id, "id")?)),
            ("years", "set") if allow_years => Ok(MetadataEdit::SetYears(
                text_of(&self.value, "value").unwrap_or_default(),
            )),
            ("years", _) if allow_years => Err(CatalogError::InvalidInput(format!(
                "Unknown action '{}' for type 'years'",
                action
            ))),
            ("people" | "locations" | "tags", _) => Err(CatalogError::InvalidInput(format!(
                "Unknown action '{}' for type '{}'",
                action, kind
            ))),
            _ => Err(CatalogError::InvalidInput(format!(
                "Unknown metadata type '{}'",
                kind
            ))),
        }
    }
}

fn person_for_name(conn: &Connection, value: &str) -> CatalogResult<i64> {
    let (first, last) = split_first_space(value);
    if first.is_empty() {
        return Err(CatalogError::InvalidInput("Person name is required".to_string()));
    }
    Ok(get_or_create_person(conn, &first, &last, "")?.0)
}

fn location_for_name(conn: &Connection, value: &str) -> CatalogResult<i64> {
    match get_or_create_location(conn, value, "")? {
        Some((id, _)) => Ok(id),
        None => Err(CatalogError::InvalidInput(
            "Location name is required".to_string(),
        )),
    }
}

fn tag_for_name(conn: &Connection, value: &str) -> CatalogResult<String> {
    let tag = value.trim();
    if tag.is_empty() {
        return Err(CatalogError::InvalidInput("Tag name is required".to_string()));
    }
    get_or_create_tag(conn, tag, TagCategory::Other)?;
    Ok(tag.to_string())
}

fn apply_link_edit(
    conn: &Connection,
    owner_id: i64,
    tables: (LinkTable, LinkTable, LinkTable),
    edit: &MetadataEdit,
) -> CatalogResult<()> {
    let (people, locations, tags) = tables;
    match edit {
        MetadataEdit::AddPerson(name) => {
            let person_id = person_for_name(conn, name)?;
            link(conn, people, owner_id, &person_id)?;
        }
        MetadataEdit::RemovePerson(person_id) => {
            unlink(conn, people, owner_id, person_id)?;
        }
        MetadataEdit::AddLocation(name) => {
            let location_id = location_for_name(conn, name)?;
            link(conn, locations, owner_id, &location_id)?;
        }
        MetadataEdit::RemoveLocation(location_id) => {
            unlink(conn, locations, owner_id, location_id)?;
        }
        MetadataEdit::AddTag(name) => {
            let tag = tag_for_name(conn, name)?;
            link(conn, tags, owner_id, &tag)?;
        }
        MetadataEdit::RemoveTag(tag) => {
            unlink(conn, tags, owner_id, tag)?;
        }
        MetadataEdit::SetYears(_) => {
            return Err(CatalogError::InvalidInput(
                "Years are set through the years endpoint".to_string(),
            ))
        }
    }
    Ok(())
}

fn require_film(conn: &Connection, file_id: &str) -> CatalogResult<Film> {
    get_film_by_file_id(conn, file_id)?
        .ok_or_else(|| CatalogError::NotFound(format!("Film {}", file_id)))
}

fn require_chapter(conn: &Connection, chapter_id: i64) -> CatalogResult<Chapter> {
    get_chapter(conn, chapter_id)?
        .ok_or_else(|| CatalogError::NotFound(format!("Chapter {}", chapter_id)))
}

pub fn edit_film_metadata(conn: &Connection, file_id: &str, edit: &MetadataEdit) -> CatalogResult<()> {
    let film = require_film(conn, file_id)?;
    apply_link_edit(conn, film.id, (FILM_PEOPLE, FILM_LOCATIONS, FILM_TAGS), edit)
}

pub fn edit_chapter_metadata(conn: &Connection, chapter_id: i64, edit: &MetadataEdit) -> CatalogResult<()> {
    let chapter = require_chapter(conn, chapter_id)?;
    match edit {
        MetadataEdit::SetYears(years) => set_chapter_years(conn, chapter.id, years)?,
        _ => apply_link_edit(
            conn,
            chapter.id,
            (CHAPTER_PEOPLE, CHAPTER_LOCATIONS, CHAPTER_TAGS),
            edit,
        )?,
    }
    update_chapter_metadata_flags(conn, chapter.id)?;
    Ok(())
}

pub fn update_film_years(conn: &Connection, file_id: &str, years: &str) -> CatalogResult<()> {
    let film = require_film(conn, file_id)?;
    set_film_years(conn, film.id, years)?;
    Ok(())
}

pub fn update_chapter_notes(conn: &Connection, chapter_id: i64, notes: &str) -> CatalogResult<()> {
    let chapter = require_chapter(conn, chapter_id)?;
    set_chapter_description(conn, chapter.id, notes)?;
    Ok(())
}

/// Full replacement of a chapter's association sets. Each present key is
/// cleared and set again; absent keys are left alone.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChapterMetadataReplace {
    pub people: Option<Vec<i64>>,
    pub locations: Option<Vec<i64>>,
    pub tags: Option<Vec<String>>,
    pub years: Option<String>,
}

pub fn replace_chapter_metadata(
    conn: &Connection,
    chapter_id: i64,
    replace: &ChapterMetadataReplace,
) -> CatalogResult<ChapterMetadataView> {
    let chapter = require_chapter(conn, chapter_id)?;

    if let Some(people) = &replace.people {
        clear_links(conn, CHAPTER_PEOPLE, chapter.id)?;
        for person_id in people {
            if !person_exists(conn, *person_id)? {
                return Err(CatalogError::InvalidInput(format!(
                    "Person {} does not exist",
                    person_id
                )));
            }
            link(conn, CHAPTER_PEOPLE, chapter.id, person_id)?;
        }
    }
    if let Some(locations) = &replace.locations {
        clear_links(conn, CHAPTER_LOCATIONS, chapter.id)?;
        for location_id in locations {
            if !location_exists(conn, *location_id)? {
                return Err(CatalogError::InvalidInput(format!(
                    "Location {} does not exist",
                    location_id
                )));
            }
            link(conn, CHAPTER_LOCATIONS, chapter.id, location_id)?;
        }
    }
    if let Some(tags) = &replace.tags {
        clear_links(conn, CHAPTER_TAGS, chapter.id)?;
        for name in tags {
            let tag = tag_for_name(conn, name)?;
            link(conn, CHAPTER_TAGS, chapter.id, &tag)?;
        }
    }
    if let Some(years) = &replace.years {
        set_chapter_years(conn, chapter.id, years)?;
    }
    update_chapter_metadata_flags(conn, chapter.id)?;

    Ok(ChapterMetadataView {
        people: chapter_people(conn, chapter.id)?.iter().map(PersonRef::from).collect(),
        locations: chapter_locations(conn, chapter.id)?
            .iter()
            .map(LocationRef::from)
            .collect(),
        tags: chapter_tags(conn, chapter.id)?.iter().map(TagRef::from).collect(),
        years: get_chapter(conn, chapter.id)?
            .map(|c| c.years)
            .unwrap_or_default(),
        notes: None,
    })
}
