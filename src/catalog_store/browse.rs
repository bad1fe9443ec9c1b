//! Read-side views: the film catalog, directories, search pages and
//! autocompletes.
//!
//! Everything here is built from union aggregates, so a film shows up under
//! a person, location or tag whether the link is on the film itself or on
//! one of its chapters.

use super::aggregation::*;
use super::models::*;
use super::queries::*;
use anyhow::Result;
use rusqlite::types::ToSql;
use rusqlite::{params, params_from_iter, Connection};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

pub const CATALOG_PAGE_SIZE: usize = 50;
pub const DIRECTORY_PAGE_SIZE: usize = 100;
pub const DETAIL_PAGE_SIZE: usize = 12;
pub const AUTOCOMPLETE_LIMIT: usize = 10;
pub const SEARCH_PREVIEW_LIMIT: usize = 10;
pub const FILTER_OPTION_LIMIT: usize = 20;
pub const RELATED_FILMS_LIMIT: usize = 6;

// =============================================================================
// Pagination
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: usize,
    pub num_pages: usize,
    pub total: i64,
    pub page_size: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            total: self.total,
            page_size: self.page_size,
            has_next: self.has_next,
            has_previous: self.has_previous,
        }
    }
}

/// Resolves the requested page number against `total` rows.
///
/// Returns `(number, num_pages)`. There is always at least one page. A value
/// that is not a number selects page 1; a number outside `1..=num_pages`
/// selects the last page.
pub fn resolve_page(raw: Option<&str>, total: i64, page_size: usize) -> (usize, usize) {
    let size = page_size.max(1) as i64;
    let num_pages = ((total.max(0) + size - 1) / size).max(1) as usize;
    let number = match raw.map(|r| r.trim().parse::<i64>()) {
        None | Some(Err(_)) => 1,
        Some(Ok(n)) if n < 1 || n as usize > num_pages => num_pages,
        Some(Ok(n)) => n as usize,
    };
    (number, num_pages)
}

fn page_of<T>(items: Vec<T>, number: usize, num_pages: usize, total: i64, page_size: usize) -> Page<T> {
    Page {
        items,
        number,
        num_pages,
        total,
        page_size,
        has_next: number < num_pages,
        has_previous: number > 1,
    }
}

/// Runs a `SELECT COUNT(*)` over `from_where` and then the page query with
/// `LIMIT`/`OFFSET` appended to `select`.
fn paged_query<T>(
    conn: &Connection,
    select: &str,
    from_where: &str,
    order_by: &str,
    bound: &[Box<dyn ToSql>],
    raw_page: Option<&str>,
    page_size: usize,
    parse: fn(&rusqlite::Row) -> rusqlite::Result<T>,
) -> Result<Page<T>> {
    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) {}", from_where),
        params_from_iter(bound.iter()),
        |r| r.get(0),
    )?;
    let (number, num_pages) = resolve_page(raw_page, total, page_size);
    let offset = (number - 1) * page_size;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} {} ORDER BY {} LIMIT {} OFFSET {}",
        select, from_where, order_by, page_size, offset
    ))?;
    let items = stmt
        .query_map(params_from_iter(bound.iter()), parse)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(page_of(items, number, num_pages, total, page_size))
}

// =============================================================================
// SQL filter building
// =============================================================================

/// Accumulates `AND`-joined clauses and their numbered parameters.
#[derive(Default)]
struct SqlFilter {
    clauses: Vec<String>,
    params: Vec<Box<dyn ToSql>>,
}

impl SqlFilter {
    fn bind<P: ToSql + 'static>(&mut self, value: P) -> String {
        self.params.push(Box::new(value));
        format!("?{}", self.params.len())
    }

    fn push(&mut self, clause: String) {
        self.clauses.push(clause);
    }

    fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.clauses.join(" AND "))
        }
    }
}

/// `%value%` with LIKE wildcards escaped; use with `ESCAPE '\'`.
fn contains_pattern(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn like(column: &str, placeholder: &str) -> String {
    format!("{} LIKE {} ESCAPE '\\'", column, placeholder)
}

const NOT_PLACEHOLDER: &str = "substr(f.youtube_id, 1, 12) != 'placeholder_'";

/// `f.id IN (...)` for films linked to any of `keys`, by either path.
fn linked_to_any<K: ToSql + Clone + 'static>(
    filter: &mut SqlFilter,
    entity: LinkedEntity,
    keys: &[K],
) -> String {
    let parts: Vec<String> = keys
        .iter()
        .map(|k| {
            let ph = filter.bind(k.clone());
            format!("f.id IN ({})", entity.union_films_sql(&ph))
        })
        .collect();
    format!("({})", parts.join(" OR "))
}

// =============================================================================
// Film cards
// =============================================================================

/// Union aggregates in wire form.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AggregateRefs {
    pub all_people: Vec<PersonRef>,
    pub all_locations: Vec<LocationRef>,
    pub all_tags: Vec<TagRef>,
    pub all_years: Vec<i32>,
}

impl From<&AggregatedMetadata> for AggregateRefs {
    fn from(meta: &AggregatedMetadata) -> Self {
        AggregateRefs {
            all_people: meta.people.iter().map(PersonRef::from).collect(),
            all_locations: meta.locations.iter().map(LocationRef::from).collect(),
            all_tags: meta.tags.iter().map(TagRef::from).collect(),
            all_years: meta.years.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FilmCard {
    #[serde(flatten)]
    pub film: Film,
    pub is_placeholder: bool,
    #[serde(flatten)]
    pub aggregates: AggregateRefs,
}

pub fn film_card(conn: &Connection, film: Film) -> Result<FilmCard> {
    let meta = aggregate_metadata(conn, film.id)?;
    Ok(FilmCard {
        is_placeholder: film.is_placeholder(),
        aggregates: AggregateRefs::from(&meta),
        film,
    })
}

fn film_cards(conn: &Connection, page: Page<Film>) -> Result<Page<FilmCard>> {
    let mut cards = Vec::with_capacity(page.items.len());
    let Page {
        items,
        number,
        num_pages,
        total,
        page_size,
        ..
    } = page;
    for film in items {
        cards.push(film_card(conn, film)?);
    }
    Ok(page_of(cards, number, num_pages, total, page_size))
}

const FILM_ORDER: &str = "f.playlist_order IS NULL, f.playlist_order, f.title";

fn paged_films(
    conn: &Connection,
    filter: &SqlFilter,
    order_by: &str,
    raw_page: Option<&str>,
    page_size: usize,
) -> Result<Page<FilmCard>> {
    let page = paged_query(
        conn,
        FILM_COLUMNS,
        &format!("FROM films f {}", filter.where_sql()),
        order_by,
        &filter.params,
        raw_page,
        page_size,
        film_from_row,
    )?;
    film_cards(conn, page)
}

// =============================================================================
// Catalog listing
// =============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilmSort {
    #[default]
    Playlist,
    Title,
    Year,
    Duration,
    Date,
}

impl FilmSort {
    /// Unknown values fall back to playlist order.
    pub fn from_param(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("title") => FilmSort::Title,
            Some("year") => FilmSort::Year,
            Some("duration") => FilmSort::Duration,
            Some("date") => FilmSort::Date,
            _ => FilmSort::Playlist,
        }
    }

    fn order_by(&self, descending: bool) -> String {
        let dir = if descending { "DESC" } else { "ASC" };
        match self {
            FilmSort::Playlist => format!("f.playlist_order IS NULL, f.playlist_order {}, f.title", dir),
            FilmSort::Title => format!("f.title {}", dir),
            FilmSort::Year => format!("f.years {}, f.title", dir),
            FilmSort::Duration => format!("f.duration {}, f.title", dir),
            FilmSort::Date => format!("f.upload_date {}, f.title", dir),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CatalogFilter {
    pub q: Option<String>,
    pub year: Option<String>,
    pub person_id: Option<i64>,
    pub location_id: Option<i64>,
    pub tag: Option<String>,
    pub sort: FilmSort,
    pub descending: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FilterOptions {
    pub years: Vec<i32>,
    pub people: Vec<WithFilmCount<Person>>,
    pub locations: Vec<WithFilmCount<Location>>,
    pub tags: Vec<WithFilmCount<Tag>>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CatalogPage {
    pub films: Page<FilmCard>,
    pub current_filters: CatalogFilter,
    pub filter_options: FilterOptions,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub fn catalog(conn: &Connection, filter: &CatalogFilter, raw_page: Option<&str>) -> Result<CatalogPage> {
    let mut sql = SqlFilter::default();

    if let Some(q) = non_blank(&filter.q) {
        let ph = sql.bind(contains_pattern(q));
        sql.push(format!(
            "({} OR {} OR {} OR f.id IN (SELECT film_id FROM chapters WHERE {} OR {}))",
            like("f.title", &ph),
            like("f.description", &ph),
            like("f.summary", &ph),
            like("title", &ph),
            like("description", &ph),
        ));
    }
    if let Some(year) = non_blank(&filter.year) {
        let ph = sql.bind(contains_pattern(year));
        sql.push(like("f.years", &ph));
    }
    if let Some(person_id) = filter.person_id {
        let clause = linked_to_any(&mut sql, LinkedEntity::Person, &[person_id]);
        sql.push(clause);
    }
    if let Some(location_id) = filter.location_id {
        let clause = linked_to_any(&mut sql, LinkedEntity::Location, &[location_id]);
        sql.push(clause);
    }
    if let Some(tag) = non_blank(&filter.tag) {
        let clause = linked_to_any(&mut sql, LinkedEntity::Tag, &[tag.to_string()]);
        sql.push(clause);
    }

    let films = paged_films(
        conn,
        &sql,
        &filter.sort.order_by(filter.descending),
        raw_page,
        CATALOG_PAGE_SIZE,
    )?;

    Ok(CatalogPage {
        films,
        current_filters: filter.clone(),
        filter_options: filter_options(conn)?,
    })
}

pub fn filter_options(conn: &Connection) -> Result<FilterOptions> {
    let mut years = BTreeSet::new();
    let mut stmt = conn.prepare("SELECT years FROM films")?;
    let texts = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    for text in texts {
        years.extend(parse_years(&text));
    }

    Ok(FilterOptions {
        years: years.into_iter().rev().collect(),
        people: top_by_film_count(people_with_film_counts(conn, true)?, FILTER_OPTION_LIMIT),
        locations: top_by_film_count(locations_with_film_counts(conn, true)?, FILTER_OPTION_LIMIT),
        tags: tags_with_film_counts(conn, true)?,
    })
}

// =============================================================================
// Film detail
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChapterView {
    #[serde(flatten)]
    pub chapter: Chapter,
    pub people: Vec<PersonRef>,
    pub locations: Vec<LocationRef>,
    pub tags: Vec<TagRef>,
}

pub fn chapter_view(conn: &Connection, chapter: Chapter) -> Result<ChapterView> {
    Ok(ChapterView {
        people: chapter_people(conn, chapter.id)?.iter().map(PersonRef::from).collect(),
        locations: chapter_locations(conn, chapter.id)?
            .iter()
            .map(LocationRef::from)
            .collect(),
        tags: chapter_tags(conn, chapter.id)?.iter().map(TagRef::from).collect(),
        chapter,
    })
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FilmDetail {
    pub film: Film,
    pub chapters: Vec<ChapterView>,
    #[serde(flatten)]
    pub aggregates: AggregateRefs,
    pub related_films: Vec<Film>,
    pub is_admin: bool,
}

pub fn film_detail(conn: &Connection, file_id: &str, is_admin: bool) -> Result<Option<FilmDetail>> {
    let film = match get_film_by_file_id(conn, file_id)? {
        Some(film) => film,
        None => return Ok(None),
    };
    let mut chapters = vec![];
    for chapter in chapters_of_film(conn, film.id)? {
        chapters.push(chapter_view(conn, chapter)?);
    }
    let meta = aggregate_metadata(conn, film.id)?;
    Ok(Some(FilmDetail {
        chapters,
        aggregates: AggregateRefs::from(&meta),
        related_films: related_films(conn, film.id, RELATED_FILMS_LIMIT)?,
        is_admin,
        film,
    }))
}

/// Aggregates as answered by the aggregated-metadata endpoint.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AggregatedMetadataView {
    pub people: Vec<PersonRef>,
    pub locations: Vec<LocationRef>,
    pub tags: Vec<TagRef>,
    pub years: Vec<i32>,
}

impl From<&AggregatedMetadata> for AggregatedMetadataView {
    fn from(meta: &AggregatedMetadata) -> Self {
        AggregatedMetadataView {
            people: meta.people.iter().map(PersonRef::from).collect(),
            locations: meta.locations.iter().map(LocationRef::from).collect(),
            tags: meta.tags.iter().map(TagRef::from).collect(),
            years: meta.years.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChapterThumbnail {
    pub start_time_seconds: i64,
    pub title: String,
    pub thumbnail_url: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnimatedThumbnail {
    pub sprite_url: String,
    pub frame_count: i64,
    pub frame_interval: f64,
    pub sprite_width: i64,
    pub sprite_height: i64,
    pub chapter_thumbnails: Vec<ChapterThumbnail>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ThumbnailData {
    pub animated: bool,
    #[serde(flatten)]
    pub animation: Option<AnimatedThumbnail>,
}

pub fn thumbnail_data(conn: &Connection, file_id: &str) -> Result<Option<ThumbnailData>> {
    let film = match get_film_by_file_id(conn, file_id)? {
        Some(film) => film,
        None => return Ok(None),
    };
    let chapter_thumbnails: Vec<ChapterThumbnail> = chapters_of_film(conn, film.id)?
        .into_iter()
        .filter(|c| !c.thumbnail_url.is_empty())
        .map(|c| ChapterThumbnail {
            start_time_seconds: c.start_time_seconds,
            title: c.title,
            thumbnail_url: c.thumbnail_url,
        })
        .collect();

    if !film.has_sprite_preview() && chapter_thumbnails.len() < 2 {
        return Ok(Some(ThumbnailData {
            animated: false,
            animation: None,
        }));
    }
    Ok(Some(ThumbnailData {
        animated: true,
        animation: Some(AnimatedThumbnail {
            sprite_url: film.preview_sprite_url,
            frame_count: film.preview_frame_count,
            frame_interval: film.preview_frame_interval,
            sprite_width: film.preview_sprite_width,
            sprite_height: film.preview_sprite_height,
            chapter_thumbnails,
        }),
    }))
}

/// Current associations of a chapter, as shown in the chapter editor.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChapterMetadataView {
    pub people: Vec<PersonRef>,
    pub locations: Vec<LocationRef>,
    pub tags: Vec<TagRef>,
    pub years: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

pub fn chapter_metadata(conn: &Connection, chapter_id: i64) -> Result<Option<ChapterMetadataView>> {
    let chapter = match get_chapter(conn, chapter_id)? {
        Some(chapter) => chapter,
        None => return Ok(None),
    };
    let view = chapter_view(conn, chapter)?;
    Ok(Some(ChapterMetadataView {
        people: view.people,
        locations: view.locations,
        tags: view.tags,
        years: view.chapter.years,
        notes: Some(view.chapter.description),
    }))
}

// =============================================================================
// Directories
// =============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeopleSort {
    #[default]
    LastName,
    FirstName,
}

impl PeopleSort {
    pub fn from_param(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("first_name") => PeopleSort::FirstName,
            _ => PeopleSort::LastName,
        }
    }

    fn order_by(&self) -> &'static str {
        match self {
            PeopleSort::FirstName => "p.first_name, p.last_name",
            // blank last names first
            PeopleSort::LastName => {
                "CASE WHEN trim(p.last_name) = '' THEN 0 ELSE 1 END, p.last_name, p.first_name"
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PeopleDirectory {
    pub people: Page<WithFilmCount<Person>>,
    pub current_sort: PeopleSort,
}

fn person_with_count(row: &rusqlite::Row) -> rusqlite::Result<WithFilmCount<Person>> {
    Ok(WithFilmCount {
        item: person_from_row(row)?,
        film_count: row.get(10)?,
    })
}

fn location_with_count(row: &rusqlite::Row) -> rusqlite::Result<WithFilmCount<Location>> {
    Ok(WithFilmCount {
        item: location_from_row(row)?,
        film_count: row.get(8)?,
    })
}

pub fn people_directory(conn: &Connection, sort: PeopleSort, raw_page: Option<&str>) -> Result<PeopleDirectory> {
    let count_sql = LinkedEntity::Person.film_count_sql("p.id");
    let people = paged_query(
        conn,
        &format!("{}, {}", PERSON_COLUMNS, count_sql),
        &format!("FROM people p WHERE {} > 0", count_sql),
        sort.order_by(),
        &[],
        raw_page,
        DIRECTORY_PAGE_SIZE,
        person_with_count,
    )?;
    Ok(PeopleDirectory {
        people,
        current_sort: sort,
    })
}

pub fn locations_directory(conn: &Connection, raw_page: Option<&str>) -> Result<Page<WithFilmCount<Location>>> {
    let count_sql = LinkedEntity::Location.film_count_sql("l.id");
    paged_query(
        conn,
        &format!("{}, {}", LOCATION_COLUMNS, count_sql),
        &format!("FROM locations l WHERE {} > 0", count_sql),
        "l.name",
        &[],
        raw_page,
        DIRECTORY_PAGE_SIZE,
        location_with_count,
    )
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PersonDetail {
    pub person: Person,
    pub films: Page<FilmCard>,
    pub total_films: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LocationDetail {
    pub location: Location,
    pub films: Page<FilmCard>,
    pub total_films: i64,
}

fn entity_films(
    conn: &Connection,
    entity: LinkedEntity,
    key: i64,
    raw_page: Option<&str>,
) -> Result<Page<FilmCard>> {
    let mut sql = SqlFilter::default();
    let clause = linked_to_any(&mut sql, entity, &[key]);
    sql.push(clause);
    sql.push(NOT_PLACEHOLDER.to_string());
    paged_films(conn, &sql, FILM_ORDER, raw_page, DETAIL_PAGE_SIZE)
}

pub fn person_detail(conn: &Connection, person_id: i64, raw_page: Option<&str>) -> Result<Option<PersonDetail>> {
    let person = match get_person(conn, person_id)? {
        Some(person) => person,
        None => return Ok(None),
    };
    let films = entity_films(conn, LinkedEntity::Person, person.id, raw_page)?;
    Ok(Some(PersonDetail {
        total_films: films.total,
        person,
        films,
    }))
}

pub fn location_detail(
    conn: &Connection,
    location_id: i64,
    raw_page: Option<&str>,
) -> Result<Option<LocationDetail>> {
    let location = match get_location(conn, location_id)? {
        Some(location) => location,
        None => return Ok(None),
    };
    let films = entity_films(conn, LinkedEntity::Location, location.id, raw_page)?;
    Ok(Some(LocationDetail {
        total_films: films.total,
        location,
        films,
    }))
}

// =============================================================================
// Search
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChapterHit {
    #[serde(flatten)]
    pub chapter: Chapter,
    pub film_file_id: String,
    pub film_title: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SearchTotals {
    pub films: i64,
    pub chapters: i64,
    pub people: i64,
    pub locations: i64,
    pub tags: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct OverallSearch {
    pub query: String,
    pub films: Vec<FilmCard>,
    pub chapters: Vec<ChapterHit>,
    pub people: Vec<WithFilmCount<Person>>,
    pub locations: Vec<WithFilmCount<Location>>,
    pub tags: Vec<WithFilmCount<Tag>>,
    pub total_results: SearchTotals,
}

/// First page of `SEARCH_PREVIEW_LIMIT` rows plus the total, with `?1`
/// bound to `pattern`.
fn limited<T>(
    conn: &Connection,
    select: &str,
    from_where: &str,
    order_by: &str,
    pattern: &str,
    parse: fn(&rusqlite::Row) -> rusqlite::Result<T>,
) -> Result<(Vec<T>, i64)> {
    let bound: Vec<Box<dyn ToSql>> = vec![Box::new(pattern.to_string())];
    let page = paged_query(
        conn,
        select,
        from_where,
        order_by,
        &bound,
        None,
        SEARCH_PREVIEW_LIMIT,
        parse,
    )?;
    Ok((page.items, page.total))
}

pub fn overall_search(conn: &Connection, query: &str) -> Result<OverallSearch> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(OverallSearch::default());
    }
    let pattern = contains_pattern(query);

    let (films, total_films) = limited(
        conn,
        FILM_COLUMNS,
        &format!(
            "FROM films f WHERE {} AND ({} OR {} OR {})",
            NOT_PLACEHOLDER,
            like("f.title", "?1"),
            like("f.description", "?1"),
            like("f.summary", "?1")
        ),
        FILM_ORDER,
        &pattern,
        film_from_row,
    )?;
    let mut film_cards_found = Vec::with_capacity(films.len());
    for film in films {
        film_cards_found.push(film_card(conn, film)?);
    }

    let (chapters, total_chapters) = limited(
        conn,
        &format!("{}, f.file_id, f.title", CHAPTER_COLUMNS),
        &format!(
            "FROM chapters c JOIN films f ON f.id = c.film_id WHERE {} AND ({} OR {})",
            NOT_PLACEHOLDER,
            like("c.title", "?1"),
            like("c.description", "?1")
        ),
        "f.title, c.chapter_order",
        &pattern,
        |row| {
            Ok(ChapterHit {
                chapter: chapter_from_row(row)?,
                film_file_id: row.get(13)?,
                film_title: row.get(14)?,
            })
        },
    )?;

    let (people, total_people) = limited(
        conn,
        &format!(
            "{}, {}",
            PERSON_COLUMNS,
            LinkedEntity::Person.film_count_sql("p.id")
        ),
        &format!(
            "FROM people p WHERE {} OR {}",
            like("p.first_name", "?1"),
            like("p.last_name", "?1")
        ),
        PERSON_ORDER,
        &pattern,
        person_with_count,
    )?;

    let (locations, total_locations) = limited(
        conn,
        &format!(
            "{}, {}",
            LOCATION_COLUMNS,
            LinkedEntity::Location.film_count_sql("l.id")
        ),
        &format!(
            "FROM locations l WHERE {} OR {}",
            like("l.name", "?1"),
            like("l.description", "?1")
        ),
        "l.name",
        &pattern,
        location_with_count,
    )?;

    let (tags, total_tags) = limited(
        conn,
        &format!("{}, {}", TAG_COLUMNS, LinkedEntity::Tag.film_count_sql("t.tag")),
        &format!("FROM tags t WHERE {}", like("t.tag", "?1")),
        "t.tag",
        &pattern,
        |row| {
            Ok(WithFilmCount {
                item: tag_from_row(row)?,
                film_count: row.get(3)?,
            })
        },
    )?;

    Ok(OverallSearch {
        query: query.to_string(),
        films: film_cards_found,
        chapters,
        people,
        locations,
        tags,
        total_results: SearchTotals {
            films: total_films,
            chapters: total_chapters,
            people: total_people,
            locations: total_locations,
            tags: total_tags,
        },
    })
}

/// A faceted search page: the selectable options, what is selected, and the
/// matching films once anything is selected.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FacetSearch<O, S> {
    pub options: Vec<O>,
    pub selected: Vec<S>,
    pub search_query: String,
    pub films: Option<Page<FilmCard>>,
}

fn selected_films<K: ToSql + Clone + 'static>(
    conn: &Connection,
    entity: LinkedEntity,
    selected: &[K],
    raw_page: Option<&str>,
) -> Result<Option<Page<FilmCard>>> {
    if selected.is_empty() {
        return Ok(None);
    }
    let mut sql = SqlFilter::default();
    let clause = linked_to_any(&mut sql, entity, selected);
    sql.push(clause);
    sql.push(NOT_PLACEHOLDER.to_string());
    Ok(Some(paged_films(conn, &sql, FILM_ORDER, raw_page, DETAIL_PAGE_SIZE)?))
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

pub fn search_people(
    conn: &Connection,
    selected: &[i64],
    query: &str,
    raw_page: Option<&str>,
) -> Result<FacetSearch<WithFilmCount<Person>, i64>> {
    let query = query.trim();
    let needle = query.to_lowercase();
    let options = people_with_film_counts(conn, true)?
        .into_iter()
        .filter(|p| {
            needle.is_empty()
                || contains_ci(&p.item.first_name, &needle)
                || contains_ci(&p.item.last_name, &needle)
        })
        .collect();
    Ok(FacetSearch {
        options,
        selected: selected.to_vec(),
        search_query: query.to_string(),
        films: selected_films(conn, LinkedEntity::Person, selected, raw_page)?,
    })
}

pub fn search_locations(
    conn: &Connection,
    selected: &[i64],
    query: &str,
    raw_page: Option<&str>,
) -> Result<FacetSearch<WithFilmCount<Location>, i64>> {
    let query = query.trim();
    let needle = query.to_lowercase();
    let options = locations_with_film_counts(conn, true)?
        .into_iter()
        .filter(|l| {
            needle.is_empty()
                || contains_ci(&l.item.name, &needle)
                || contains_ci(&l.item.city, &needle)
                || contains_ci(&l.item.state, &needle)
        })
        .collect();
    Ok(FacetSearch {
        options,
        selected: selected.to_vec(),
        search_query: query.to_string(),
        films: selected_films(conn, LinkedEntity::Location, selected, raw_page)?,
    })
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct YearCount {
    pub year: i32,
    pub count: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Decade {
    pub decade: i32,
    pub years: Vec<YearCount>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct YearSearch {
    pub decades: Vec<Decade>,
    pub selected_years: Vec<String>,
    pub films: Option<Page<FilmCard>>,
}

pub fn search_years(conn: &Connection, selected: &[String], raw_page: Option<&str>) -> Result<YearSearch> {
    let mut year_counts: BTreeMap<i32, i64> = BTreeMap::new();
    let mut stmt = conn.prepare(&format!("SELECT f.years FROM films f WHERE {}", NOT_PLACEHOLDER))?;
    let texts = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    for text in texts {
        let distinct: BTreeSet<i32> = parse_years(&text).into_iter().collect();
        for year in distinct {
            *year_counts.entry(year).or_insert(0) += 1;
        }
    }

    let mut decades: Vec<Decade> = vec![];
    for (year, count) in year_counts {
        let decade = year.div_euclid(10) * 10;
        match decades.last_mut() {
            Some(last) if last.decade == decade => last.years.push(YearCount { year, count }),
            _ => decades.push(Decade {
                decade,
                years: vec![YearCount { year, count }],
            }),
        }
    }

    let selected: Vec<String> = selected
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    let films = if selected.is_empty() {
        None
    } else {
        let mut sql = SqlFilter::default();
        let parts: Vec<String> = selected
            .iter()
            .map(|year| {
                let ph = sql.bind(contains_pattern(year));
                format!(
                    "({} OR f.id IN (SELECT film_id FROM chapters WHERE {}))",
                    like("f.years", &ph),
                    like("years", &ph)
                )
            })
            .collect();
        sql.push(format!("({})", parts.join(" OR ")));
        sql.push(NOT_PLACEHOLDER.to_string());
        Some(paged_films(conn, &sql, FILM_ORDER, raw_page, DETAIL_PAGE_SIZE)?)
    };

    Ok(YearSearch {
        decades,
        selected_years: selected,
        films,
    })
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TagGroup {
    pub category: TagCategory,
    pub display_name: &'static str,
    pub tags: Vec<WithFilmCount<Tag>>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CategoryChoice {
    pub value: TagCategory,
    pub label: &'static str,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TagSearch {
    pub tags_by_category: Vec<TagGroup>,
    pub selected_tags: Vec<String>,
    pub category_filter: Option<TagCategory>,
    pub films: Option<Page<FilmCard>>,
    pub tag_categories: Vec<CategoryChoice>,
}

pub fn search_tags(
    conn: &Connection,
    selected: &[String],
    category: Option<TagCategory>,
    raw_page: Option<&str>,
) -> Result<TagSearch> {
    let mut tags: Vec<WithFilmCount<Tag>> = tags_with_film_counts(conn, true)?
        .into_iter()
        .filter(|t| category.map_or(true, |c| t.item.category == c))
        .collect();
    tags.sort_by(|a, b| {
        (a.item.category.to_db_str(), &a.item.tag).cmp(&(b.item.category.to_db_str(), &b.item.tag))
    });

    let mut groups: Vec<TagGroup> = vec![];
    for tag in tags {
        match groups.last_mut() {
            Some(group) if group.category == tag.item.category => group.tags.push(tag),
            _ => groups.push(TagGroup {
                category: tag.item.category,
                display_name: tag.item.category.display_name(),
                tags: vec![tag],
            }),
        }
    }

    Ok(TagSearch {
        tags_by_category: groups,
        selected_tags: selected.to_vec(),
        category_filter: category,
        films: selected_films(conn, LinkedEntity::Tag, selected, raw_page)?,
        tag_categories: TagCategory::ALL
            .iter()
            .map(|c| CategoryChoice {
                value: *c,
                label: c.display_name(),
            })
            .collect(),
    })
}

// =============================================================================
// Autocomplete
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AutocompleteItem<I> {
    pub id: I,
    pub text: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FilmCountHit {
    pub id: i64,
    pub name: String,
    pub film_count: i64,
}

pub fn autocomplete_people(conn: &Connection, query: &str) -> Result<Vec<AutocompleteItem<i64>>> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(vec![]);
    }
    let people = query_list(
        conn,
        &format!(
            "SELECT {} FROM people p WHERE {} OR {} ORDER BY {} LIMIT {}",
            PERSON_COLUMNS,
            like("p.first_name", "?1"),
            like("p.last_name", "?1"),
            PERSON_ORDER,
            AUTOCOMPLETE_LIMIT
        ),
        params![contains_pattern(query)],
        person_from_row,
    )?;
    Ok(people
        .into_iter()
        .map(|p| AutocompleteItem {
            id: p.id,
            text: p.full_name(),
            name: p.full_name(),
        })
        .collect())
}

pub fn autocomplete_locations(conn: &Connection, query: &str) -> Result<Vec<AutocompleteItem<i64>>> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(vec![]);
    }
    let locations = query_list(
        conn,
        &format!(
            "SELECT {} FROM locations l WHERE {} OR {} ORDER BY l.name LIMIT {}",
            LOCATION_COLUMNS,
            like("l.name", "?1"),
            like("l.city", "?1"),
            AUTOCOMPLETE_LIMIT
        ),
        params![contains_pattern(query)],
        location_from_row,
    )?;
    Ok(locations
        .into_iter()
        .map(|l| AutocompleteItem {
            id: l.id,
            text: l.name.clone(),
            name: l.name,
        })
        .collect())
}

pub fn autocomplete_tags(conn: &Connection, query: &str) -> Result<Vec<AutocompleteItem<String>>> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(vec![]);
    }
    let tags = query_list(
        conn,
        &format!(
            "SELECT {} FROM tags t WHERE {} ORDER BY t.tag LIMIT {}",
            TAG_COLUMNS,
            like("t.tag", "?1"),
            AUTOCOMPLETE_LIMIT
        ),
        params![contains_pattern(query)],
        tag_from_row,
    )?;
    Ok(tags
        .into_iter()
        .map(|t| AutocompleteItem {
            id: t.tag.clone(),
            text: t.tag.clone(),
            name: t.tag,
        })
        .collect())
}

/// People with at least one film whose first or last name contains `query`.
pub fn search_api_people(conn: &Connection, query: &str) -> Result<Vec<FilmCountHit>> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(vec![]);
    }
    let count_sql = LinkedEntity::Person.film_count_sql("p.id");
    let rows = query_list(
        conn,
        &format!(
            "SELECT {}, {} FROM people p WHERE ({} OR {}) AND {} > 0 ORDER BY {} LIMIT {}",
            PERSON_COLUMNS,
            count_sql,
            like("p.first_name", "?1"),
            like("p.last_name", "?1"),
            count_sql,
            PERSON_ORDER,
            AUTOCOMPLETE_LIMIT
        ),
        params![contains_pattern(query)],
        person_with_count,
    )?;
    Ok(rows
        .into_iter()
        .map(|p| FilmCountHit {
            id: p.item.id,
            name: p.item.full_name(),
            film_count: p.film_count,
        })
        .collect())
}

pub fn search_api_locations(conn: &Connection, query: &str) -> Result<Vec<FilmCountHit>> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(vec![]);
    }
    let count_sql = LinkedEntity::Location.film_count_sql("l.id");
    let rows = query_list(
        conn,
        &format!(
            "SELECT {}, {} FROM locations l WHERE ({} OR {}) AND {} > 0 ORDER BY l.name LIMIT {}",
            LOCATION_COLUMNS,
            count_sql,
            like("l.name", "?1"),
            like("l.city", "?1"),
            count_sql,
            AUTOCOMPLETE_LIMIT
        ),
        params![contains_pattern(query)],
        location_with_count,
    )?;
    Ok(rows
        .into_iter()
        .map(|l| FilmCountHit {
            id: l.item.id,
            name: l.item.name,
            film_count: l.film_count,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::super::queries::test_support::*;
    use super::*;

    fn link_person(conn: &Connection, table: LinkTable, owner: i64, person: i64) {
        link(conn, table, owner, &person).unwrap();
    }

    #[test]
    fn resolves_page_numbers() {
        assert_eq!(resolve_page(None, 120, 50), (1, 3));
        assert_eq!(resolve_page(Some("2"), 120, 50), (2, 3));
        assert_eq!(resolve_page(Some("abc"), 120, 50), (1, 3));
        assert_eq!(resolve_page(Some("99"), 120, 50), (3, 3));
        assert_eq!(resolve_page(Some("0"), 120, 50), (3, 3));
        assert_eq!(resolve_page(Some("1"), 0, 50), (1, 1));
    }

    #[test]
    fn catalog_filters_person_through_chapters() {
        let conn = memory_db();
        let f1 = add_film(&conn, "F1", "Beach");
        let f2 = add_film(&conn, "F2", "Snow");
        add_film(&conn, "F3", "Park");
        let c2 = add_chapter(&conn, f2, "0:10", "Sledding", 1);
        let doug = add_person(&conn, "Doug", "Thompson");
        link_person(&conn, FILM_PEOPLE, f1, doug);
        link_person(&conn, CHAPTER_PEOPLE, c2, doug);

        let filter = CatalogFilter {
            person_id: Some(doug),
            sort: FilmSort::Title,
            ..Default::default()
        };
        let page = catalog(&conn, &filter, None).unwrap();
        let titles: Vec<&str> = page.films.items.iter().map(|c| c.film.title.as_str()).collect();
        assert_eq!(titles, vec!["Beach", "Snow"]);
        assert_eq!(page.films.total, 2);
        assert_eq!(page.filter_options.people.len(), 1);
        assert_eq!(page.filter_options.people[0].film_count, 2);
    }

    #[test]
    fn catalog_query_matches_chapter_titles() {
        let conn = memory_db();
        let f1 = add_film(&conn, "F1", "Reel one");
        add_film(&conn, "F2", "Reel two");
        add_chapter(&conn, f1, "0:00", "Disneyland trip", 1);

        let filter = CatalogFilter {
            q: Some("disney".into()),
            ..Default::default()
        };
        let page = catalog(&conn, &filter, None).unwrap();
        assert_eq!(page.films.items.len(), 1);
        assert_eq!(page.films.items[0].film.file_id, "F1");
    }

    #[test]
    fn unknown_sort_is_playlist() {
        assert_eq!(FilmSort::from_param(Some("bogus")), FilmSort::Playlist);
        assert_eq!(FilmSort::from_param(Some("date")), FilmSort::Date);
        assert_eq!(FilmSort::from_param(None), FilmSort::Playlist);
    }

    #[test]
    fn people_directory_puts_blank_last_names_first() {
        let conn = memory_db();
        let film = add_film(&conn, "F1", "Film");
        for (first, last) in [("Zed", "Adams"), ("Doug", ""), ("Amy", "Baker")] {
            let id = add_person(&conn, first, last);
            link_person(&conn, FILM_PEOPLE, film, id);
        }
        add_person(&conn, "Nobody", "Unlinked");

        let dir = people_directory(&conn, PeopleSort::LastName, None).unwrap();
        let names: Vec<String> = dir.people.items.iter().map(|p| p.item.full_name()).collect();
        assert_eq!(names, vec!["Doug ", "Zed Adams", "Amy Baker"]);

        let dir = people_directory(&conn, PeopleSort::FirstName, None).unwrap();
        assert_eq!(dir.people.items[0].item.first_name, "Amy");
    }

    #[test]
    fn person_detail_excludes_placeholders() {
        let conn = memory_db();
        let real = add_film(&conn, "F1", "Real");
        let placeholder = add_film(&conn, "F2", "Pending");
        conn.execute(
            "UPDATE films SET youtube_id = 'placeholder_F2' WHERE id = ?1",
            params![placeholder],
        )
        .unwrap();
        let p = add_person(&conn, "Ruth", "Hayward");
        link_person(&conn, FILM_PEOPLE, real, p);
        link_person(&conn, FILM_PEOPLE, placeholder, p);

        let detail = person_detail(&conn, p, None).unwrap().unwrap();
        assert_eq!(detail.total_films, 1);
        assert_eq!(detail.films.items[0].film.file_id, "F1");
        assert!(person_detail(&conn, 9999, None).unwrap().is_none());
    }

    #[test]
    fn overall_search_counts_and_caps() {
        let conn = memory_db();
        for i in 0..12 {
            add_film(&conn, &format!("F{:02}", i), &format!("Christmas {}", i));
        }
        add_person(&conn, "Christine", "Hayward");

        let result = overall_search(&conn, "christ").unwrap();
        assert_eq!(result.films.len(), SEARCH_PREVIEW_LIMIT);
        assert_eq!(result.total_results.films, 12);
        assert_eq!(result.total_results.people, 1);
        assert_eq!(result.people[0].film_count, 0);

        assert_eq!(overall_search(&conn, "  ").unwrap(), OverallSearch::default());
    }

    #[test]
    fn year_search_groups_decades_and_matches_chapters() {
        let conn = memory_db();
        let f1 = add_film(&conn, "F1", "One");
        let f2 = add_film(&conn, "F2", "Two");
        set_film_years(&conn, f1, "1962, 1968").unwrap();
        set_film_years(&conn, f2, "1971").unwrap();
        let c = add_chapter(&conn, f2, "0:00", "Chapter", 1);
        set_chapter_years(&conn, c, "1962").unwrap();

        let result = search_years(&conn, &["1962".to_string()], None).unwrap();
        assert_eq!(result.decades.len(), 2);
        assert_eq!(result.decades[0].decade, 1960);
        assert_eq!(result.decades[0].years.len(), 2);
        let films = result.films.unwrap();
        assert_eq!(films.total, 2);
    }

    #[test]
    fn autocompletes_respect_limit_and_empty_query() {
        let conn = memory_db();
        for i in 0..15 {
            add_person(&conn, &format!("Pat{}", i), "Smith");
        }
        assert_eq!(autocomplete_people(&conn, "smi").unwrap().len(), AUTOCOMPLETE_LIMIT);
        assert!(autocomplete_people(&conn, "").unwrap().is_empty());
        // no films linked
        assert!(search_api_people(&conn, "smi").unwrap().is_empty());
    }

    #[test]
    fn thumbnail_needs_sprite_or_two_chapter_thumbnails() {
        let conn = memory_db();
        let film = add_film(&conn, "F1", "Film");
        let data = thumbnail_data(&conn, "F1").unwrap().unwrap();
        assert!(!data.animated);

        for (i, start) in ["0:00", "1:00"].iter().enumerate() {
            let c = add_chapter(&conn, film, start, "Ch", i as i64 + 1);
            conn.execute(
                "UPDATE chapters SET thumbnail_url = 'http://thumb' WHERE id = ?1",
                params![c],
            )
            .unwrap();
        }
        let data = thumbnail_data(&conn, "F1").unwrap().unwrap();
        assert!(data.animated);
        assert_eq!(data.animation.unwrap().chapter_thumbnails.len(), 2);
        assert!(thumbnail_data(&conn, "nope").unwrap().is_none());
    }

    #[test]
    fn tag_search_groups_by_category() {
        let conn = memory_db();
        let film = add_film(&conn, "F1", "Film");
        get_or_create_tag(&conn, "christmas", TagCategory::Holidays).unwrap();
        get_or_create_tag(&conn, "beach", TagCategory::Places).unwrap();
        get_or_create_tag(&conn, "unused", TagCategory::Other).unwrap();
        link(&conn, FILM_TAGS, film, &"christmas").unwrap();
        link(&conn, FILM_TAGS, film, &"beach").unwrap();

        let result = search_tags(&conn, &["beach".to_string()], None, None).unwrap();
        let categories: Vec<TagCategory> = result.tags_by_category.iter().map(|g| g.category).collect();
        assert_eq!(categories, vec![TagCategory::Holidays, TagCategory::Places]);
        assert_eq!(result.films.unwrap().total, 1);

        let only_places = search_tags(&conn, &[], Some(TagCategory::Places), None).unwrap();
        assert_eq!(only_places.tags_by_category.len(), 1);
        assert!(only_places.films.is_none());
    }
}
