//! Catalog models for the SQLite-backed home-movie store.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Prefix of the `youtube_id` given to imported films not yet mapped to a video.
pub const PLACEHOLDER_YOUTUBE_PREFIX: &str = "placeholder_";

lazy_static! {
    static ref YEAR_REGEX: Regex = Regex::new(r"\d{4}").unwrap();
}

// =============================================================================
// Enumerations
// =============================================================================

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TagCategory {
    Holidays,
    Events,
    Activities,
    People,
    Places,
    Themes,
    #[default]
    Other,
}

impl TagCategory {
    pub const ALL: [TagCategory; 7] = [
        TagCategory::Holidays,
        TagCategory::Events,
        TagCategory::Activities,
        TagCategory::People,
        TagCategory::Places,
        TagCategory::Themes,
        TagCategory::Other,
    ];

    /// Unknown values fall back to `Other`.
    pub fn from_db_str(s: &str) -> Self {
        match s {
            "holidays" => TagCategory::Holidays,
            "events" => TagCategory::Events,
            "activities" => TagCategory::Activities,
            "people" => TagCategory::People,
            "places" => TagCategory::Places,
            "themes" => TagCategory::Themes,
            _ => TagCategory::Other,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            TagCategory::Holidays => "holidays",
            TagCategory::Events => "events",
            TagCategory::Activities => "activities",
            TagCategory::People => "people",
            TagCategory::Places => "places",
            TagCategory::Themes => "themes",
            TagCategory::Other => "other",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TagCategory::Holidays => "Holidays",
            TagCategory::Events => "Events",
            TagCategory::Activities => "Activities",
            TagCategory::People => "People",
            TagCategory::Places => "Places",
            TagCategory::Themes => "Themes",
            TagCategory::Other => "Other",
        }
    }
}

// =============================================================================
// Core Entities
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<String>,
    pub death_date: Option<String>,
    pub father_id: Option<i64>,
    pub mother_id: Option<i64>,
    pub spouse_id: Option<i64>,
    pub notes: String,
    pub hayward_index: Option<i64>,
}

impl Person {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// "last, first", or just the first name when the last name is blank.
    pub fn full_name_reversed(&self) -> String {
        if self.last_name.trim().is_empty() {
            self.first_name.clone()
        } else {
            format!("{}, {}", self.last_name, self.first_name)
        }
    }

    pub fn has_relationships(&self) -> bool {
        self.father_id.is_some() || self.mother_id.is_some() || self.spouse_id.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub tag: String,
    pub category: TagCategory,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Film {
    pub id: i64,
    pub file_id: String,
    pub youtube_url: String,
    pub youtube_id: String,
    pub title: String,
    pub description: String,
    pub summary: String,
    /// Seconds.
    pub duration: Option<i64>,
    pub upload_date: Option<String>,
    pub thumbnail_url: String,
    pub thumbnail_high_url: String,
    pub thumbnail_medium_url: String,
    pub preview_sprite_url: String,
    pub preview_frame_count: i64,
    pub preview_frame_interval: f64,
    pub preview_sprite_width: i64,
    pub preview_sprite_height: i64,
    pub years: String,
    pub technical_notes: String,
    pub workflow_state: String,
    pub playlist_order: Option<i64>,
}

impl Film {
    pub fn is_placeholder(&self) -> bool {
        self.youtube_id.starts_with(PLACEHOLDER_YOUTUBE_PREFIX)
    }

    pub fn year_list(&self) -> Vec<i32> {
        parse_years(&self.years)
    }

    pub fn has_sprite_preview(&self) -> bool {
        !self.preview_sprite_url.is_empty() && self.preview_frame_count > 0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: i64,
    pub film_id: i64,
    pub start_time: String,
    pub start_time_seconds: i64,
    pub title: String,
    pub description: String,
    pub years: String,
    pub order: i64,
    pub thumbnail_url: String,
    pub has_people_metadata: bool,
    pub has_location_metadata: bool,
    pub has_tags_metadata: bool,
    pub has_years_metadata: bool,
}

/// Fields a caller supplies when creating a chapter; derived columns are
/// computed by the store.
#[derive(Clone, Debug, Default)]
pub struct NewChapter {
    pub film_id: i64,
    pub start_time: String,
    pub title: String,
    pub description: String,
    pub years: String,
    pub order: i64,
}

/// Film columns written by the CSV importer on create or update.
#[derive(Clone, Debug, Default)]
pub struct FilmUpsert {
    pub file_id: String,
    pub title: String,
    pub description: String,
    pub summary: String,
    pub years: String,
    pub technical_notes: String,
    pub workflow_state: String,
    pub duration: Option<i64>,
    pub youtube_id: String,
    pub youtube_url: String,
    pub thumbnail_url: String,
}

// =============================================================================
// Wire shapes
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersonRef {
    pub id: i64,
    pub full_name: String,
}

impl From<&Person> for PersonRef {
    fn from(p: &Person) -> Self {
        PersonRef {
            id: p.id,
            full_name: p.full_name(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocationRef {
    pub id: i64,
    pub name: String,
}

impl From<&Location> for LocationRef {
    fn from(l: &Location) -> Self {
        LocationRef {
            id: l.id,
            name: l.name.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TagRef {
    pub id: String,
    pub tag: String,
}

impl From<&Tag> for TagRef {
    fn from(t: &Tag) -> Self {
        TagRef {
            id: t.tag.clone(),
            tag: t.tag.clone(),
        }
    }
}

/// Union of a film's direct and chapter-level metadata.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AggregatedMetadata {
    pub people: Vec<Person>,
    pub locations: Vec<Location>,
    pub tags: Vec<Tag>,
    pub years: Vec<i32>,
}

/// An entity together with the number of distinct films it touches.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WithFilmCount<T> {
    #[serde(flatten)]
    pub item: T,
    pub film_count: i64,
}

// =============================================================================
// Parsing helpers
// =============================================================================

/// `MM:SS` or `HH:MM:SS` to seconds; any other shape or a non-numeric part
/// yields 0.
pub fn parse_time_to_seconds(time_str: &str) -> i64 {
    let parts: Option<Vec<i64>> = time_str
        .trim()
        .split(':')
        .map(|p| p.trim().parse::<i64>().ok())
        .collect();
    let (hours, minutes, seconds) = match parts.as_deref() {
        Some(&[minutes, seconds]) => (0, minutes, seconds),
        Some(&[hours, minutes, seconds]) => (hours, minutes, seconds),
        _ => return 0,
    };
    hours
        .checked_mul(3600)
        .and_then(|h| minutes.checked_mul(60).and_then(|m| h.checked_add(m)))
        .and_then(|hm| hm.checked_add(seconds))
        .unwrap_or(0)
}

/// Every 4-digit run in `years`, sorted ascending. No range check.
pub fn parse_years(years: &str) -> Vec<i32> {
    let mut parsed: Vec<i32> = YEAR_REGEX
        .find_iter(years)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();
    parsed.sort_unstable();
    parsed
}

/// Splits "First Rest Of Name" at the first space; no space means an empty
/// last name.
pub fn split_first_space(value: &str) -> (String, String) {
    let value = value.trim();
    match value.split_once(' ') {
        Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
        None => (value.to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minutes_and_hours() {
        assert_eq!(parse_time_to_seconds("1:30"), 90);
        assert_eq!(parse_time_to_seconds("01:02:03"), 3723);
        assert_eq!(parse_time_to_seconds("0:00"), 0);
    }

    #[test]
    fn malformed_time_is_zero() {
        assert_eq!(parse_time_to_seconds(""), 0);
        assert_eq!(parse_time_to_seconds("42"), 0);
        assert_eq!(parse_time_to_seconds("1:2:3:4"), 0);
        assert_eq!(parse_time_to_seconds("ab:cd"), 0);
    }

    #[test]
    fn oversized_time_is_zero() {
        assert_eq!(parse_time_to_seconds("9999999999999999:00:00"), 0);
        assert_eq!(parse_time_to_seconds("999999999999999999:00"), 0);
        assert_eq!(parse_time_to_seconds("0:9223372036854775807"), 9223372036854775807);
    }

    #[test]
    fn parses_years_from_free_text() {
        assert_eq!(parse_years("Summer 1962, maybe 1963"), vec![1962, 1963]);
        assert_eq!(parse_years(""), Vec::<i32>::new());
        assert_eq!(parse_years("1965-1961"), vec![1961, 1965]);
        // no range validation
        assert_eq!(parse_years("reel 0042"), vec![42]);
    }

    #[test]
    fn reversed_name_handles_blank_last_name() {
        let mut p = Person {
            id: 1,
            first_name: "Doug".into(),
            last_name: "".into(),
            birth_date: None,
            death_date: None,
            father_id: None,
            mother_id: None,
            spouse_id: None,
            notes: String::new(),
            hayward_index: None,
        };
        assert_eq!(p.full_name_reversed(), "Doug");
        p.last_name = "Thompson".into();
        assert_eq!(p.full_name_reversed(), "Thompson, Doug");
        assert_eq!(p.full_name(), "Doug Thompson");
    }

    #[test]
    fn splits_name_on_first_space() {
        assert_eq!(
            split_first_space("Mary Ann Smith"),
            ("Mary".to_string(), "Ann Smith".to_string())
        );
        assert_eq!(split_first_space("Cher"), ("Cher".to_string(), String::new()));
    }

    #[test]
    fn unknown_tag_category_is_other() {
        assert_eq!(TagCategory::from_db_str("holidays"), TagCategory::Holidays);
        assert_eq!(TagCategory::from_db_str("weird"), TagCategory::Other);
        assert_eq!(TagCategory::Themes.to_db_str(), "themes");
    }
}
