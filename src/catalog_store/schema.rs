//! SQLite schema for the home-movie catalog.
//!
//! Entities (people, locations, tags, films, chapters) plus the six join
//! tables linking films and chapters to people, locations and tags. Every
//! join row cascades away with either side; genealogy self-references on
//! `people` are nulled when the referenced person is deleted.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema,
};

const PERSON_SELF_FK: ForeignKey = ForeignKey {
    foreign_table: "people",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::SetNull,
};

const PERSON_FK: ForeignKey = ForeignKey {
    foreign_table: "people",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const LOCATION_FK: ForeignKey = ForeignKey {
    foreign_table: "locations",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const TAG_FK: ForeignKey = ForeignKey {
    foreign_table: "tags",
    foreign_column: "tag",
    on_delete: ForeignKeyOnChange::Cascade,
};

const FILM_FK: ForeignKey = ForeignKey {
    foreign_table: "films",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const CHAPTER_FK: ForeignKey = ForeignKey {
    foreign_table: "chapters",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

// =============================================================================
// Entity tables
// =============================================================================

const PEOPLE_TABLE: Table = Table {
    name: "people",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("first_name", &SqlType::Text, non_null = true),
        sqlite_column!(
            "last_name",
            &SqlType::Text,
            non_null = true,
            default_value = Some("''")
        ),
        sqlite_column!("birth_date", &SqlType::Text), // ISO 'YYYY-MM-DD'
        sqlite_column!("death_date", &SqlType::Text),
        sqlite_column!(
            "father_id",
            &SqlType::Integer,
            foreign_key = Some(&PERSON_SELF_FK)
        ),
        sqlite_column!(
            "mother_id",
            &SqlType::Integer,
            foreign_key = Some(&PERSON_SELF_FK)
        ),
        sqlite_column!(
            "spouse_id",
            &SqlType::Integer,
            foreign_key = Some(&PERSON_SELF_FK)
        ),
        sqlite_column!(
            "notes",
            &SqlType::Text,
            non_null = true,
            default_value = Some("''")
        ),
        sqlite_column!("hayward_index", &SqlType::Integer), // position in the sheet bitfield
    ],
    indices: &[
        ("idx_people_last_name", "last_name"),
        ("idx_people_hayward_index", "hayward_index"),
        ("idx_people_father", "father_id"),
        ("idx_people_mother", "mother_id"),
    ],
    unique_constraints: &[&["first_name", "last_name"]],
};

const LOCATIONS_TABLE: Table = Table {
    name: "locations",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!(
            "description",
            &SqlType::Text,
            non_null = true,
            default_value = Some("''")
        ),
        sqlite_column!(
            "city",
            &SqlType::Text,
            non_null = true,
            default_value = Some("''")
        ),
        sqlite_column!(
            "state",
            &SqlType::Text,
            non_null = true,
            default_value = Some("''")
        ),
        sqlite_column!(
            "country",
            &SqlType::Text,
            non_null = true,
            default_value = Some("'USA'")
        ),
        sqlite_column!("latitude", &SqlType::Real),
        sqlite_column!("longitude", &SqlType::Real),
    ],
    indices: &[
        ("idx_locations_name", "name"),
        ("idx_locations_city_state", "city, state"),
    ],
    unique_constraints: &[],
};

const TAGS_TABLE: Table = Table {
    name: "tags",
    columns: &[
        sqlite_column!("tag", &SqlType::Text, is_primary_key = true),
        sqlite_column!(
            "category",
            &SqlType::Text,
            non_null = true,
            default_value = Some("'other'")
        ), // holidays|events|activities|people|places|themes|other
        sqlite_column!(
            "description",
            &SqlType::Text,
            non_null = true,
            default_value = Some("''")
        ),
    ],
    indices: &[],
    unique_constraints: &[],
};

const FILMS_TABLE: Table = Table {
    name: "films",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("file_id", &SqlType::Text, non_null = true),
        sqlite_column!(
            "youtube_url",
            &SqlType::Text,
            non_null = true,
            default_value = Some("''")
        ),
        sqlite_column!("youtube_id", &SqlType::Text, non_null = true), // 'placeholder_<file_id>' until mapped
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!(
            "description",
            &SqlType::Text,
            non_null = true,
            default_value = Some("''")
        ),
        sqlite_column!(
            "summary",
            &SqlType::Text,
            non_null = true,
            default_value = Some("''")
        ),
        sqlite_column!("duration", &SqlType::Integer), // seconds
        sqlite_column!("upload_date", &SqlType::Text),
        sqlite_column!(
            "thumbnail_url",
            &SqlType::Text,
            non_null = true,
            default_value = Some("''")
        ),
        sqlite_column!(
            "thumbnail_high_url",
            &SqlType::Text,
            non_null = true,
            default_value = Some("''")
        ),
        sqlite_column!(
            "thumbnail_medium_url",
            &SqlType::Text,
            non_null = true,
            default_value = Some("''")
        ),
        sqlite_column!(
            "preview_sprite_url",
            &SqlType::Text,
            non_null = true,
            default_value = Some("''")
        ),
        sqlite_column!(
            "preview_frame_count",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "preview_frame_interval",
            &SqlType::Real,
            non_null = true,
            default_value = Some("0.0")
        ),
        sqlite_column!(
            "preview_sprite_width",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "preview_sprite_height",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "years",
            &SqlType::Text,
            non_null = true,
            default_value = Some("''")
        ),
        sqlite_column!(
            "technical_notes",
            &SqlType::Text,
            non_null = true,
            default_value = Some("''")
        ),
        sqlite_column!(
            "workflow_state",
            &SqlType::Text,
            non_null = true,
            default_value = Some("''")
        ),
        sqlite_column!("playlist_order", &SqlType::Integer),
    ],
    indices: &[
        ("idx_films_file_id", "file_id"),
        ("idx_films_youtube_id", "youtube_id"),
        ("idx_films_upload_date", "upload_date"),
        ("idx_films_years", "years"),
    ],
    unique_constraints: &[&["file_id"], &["youtube_id"]],
};

const CHAPTERS_TABLE: Table = Table {
    name: "chapters",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "film_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&FILM_FK)
        ),
        sqlite_column!("start_time", &SqlType::Text, non_null = true), // MM:SS or HH:MM:SS
        sqlite_column!("start_time_seconds", &SqlType::Integer, non_null = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!(
            "description",
            &SqlType::Text,
            non_null = true,
            default_value = Some("''")
        ),
        sqlite_column!(
            "years",
            &SqlType::Text,
            non_null = true,
            default_value = Some("''")
        ),
        sqlite_column!("chapter_order", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "thumbnail_url",
            &SqlType::Text,
            non_null = true,
            default_value = Some("''")
        ),
        sqlite_column!(
            "has_people_metadata",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "has_location_metadata",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "has_tags_metadata",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "has_years_metadata",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
    ],
    indices: &[
        ("idx_chapters_film_order", "film_id, chapter_order"),
        ("idx_chapters_start_seconds", "start_time_seconds"),
        ("idx_chapters_years", "years"),
    ],
    unique_constraints: &[],
};

// =============================================================================
// Join tables
// =============================================================================

const FILM_PEOPLE_TABLE: Table = Table {
    name: "film_people",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "film_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&FILM_FK)
        ),
        sqlite_column!(
            "person_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&PERSON_FK)
        ),
        sqlite_column!(
            "is_primary",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
    ],
    indices: &[("idx_film_people_person", "person_id")],
    unique_constraints: &[&["film_id", "person_id"]],
};

const FILM_LOCATIONS_TABLE: Table = Table {
    name: "film_locations",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "film_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&FILM_FK)
        ),
        sqlite_column!(
            "location_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&LOCATION_FK)
        ),
        sqlite_column!(
            "is_primary",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
    ],
    indices: &[("idx_film_locations_location", "location_id")],
    unique_constraints: &[&["film_id", "location_id"]],
};

const FILM_TAGS_TABLE: Table = Table {
    name: "film_tags",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "film_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&FILM_FK)
        ),
        sqlite_column!(
            "tag",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&TAG_FK)
        ),
        sqlite_column!(
            "is_auto",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
    ],
    indices: &[("idx_film_tags_tag", "tag")],
    unique_constraints: &[&["film_id", "tag"]],
};

const CHAPTER_PEOPLE_TABLE: Table = Table {
    name: "chapter_people",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "chapter_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&CHAPTER_FK)
        ),
        sqlite_column!(
            "person_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&PERSON_FK)
        ),
        sqlite_column!(
            "is_primary",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!("confidence", &SqlType::Real),
    ],
    indices: &[("idx_chapter_people_person", "person_id")],
    unique_constraints: &[&["chapter_id", "person_id"]],
};

const CHAPTER_LOCATIONS_TABLE: Table = Table {
    name: "chapter_locations",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "chapter_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&CHAPTER_FK)
        ),
        sqlite_column!(
            "location_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&LOCATION_FK)
        ),
        sqlite_column!(
            "is_primary",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
    ],
    indices: &[("idx_chapter_locations_location", "location_id")],
    unique_constraints: &[&["chapter_id", "location_id"]],
};

const CHAPTER_TAGS_TABLE: Table = Table {
    name: "chapter_tags",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "chapter_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&CHAPTER_FK)
        ),
        sqlite_column!(
            "tag",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&TAG_FK)
        ),
        sqlite_column!(
            "is_auto",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!("confidence", &SqlType::Real),
    ],
    indices: &[("idx_chapter_tags_tag", "tag")],
    unique_constraints: &[&["chapter_id", "tag"]],
};

// =============================================================================
// Versioned Schema Definition
// =============================================================================

pub const CATALOG_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[
        PEOPLE_TABLE,
        LOCATIONS_TABLE,
        TAGS_TABLE,
        FILMS_TABLE,
        CHAPTERS_TABLE,
        FILM_PEOPLE_TABLE,
        FILM_LOCATIONS_TABLE,
        FILM_TAGS_TABLE,
        CHAPTER_PEOPLE_TABLE,
        CHAPTER_LOCATIONS_TABLE,
        CHAPTER_TAGS_TABLE,
    ],
    migration: None,
}];
