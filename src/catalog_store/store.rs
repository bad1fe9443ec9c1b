//! SQLite-backed catalog store.
//!
//! Writes go through a single connection behind a mutex and always run in a
//! `BEGIN IMMEDIATE` transaction. Reads round-robin over a small pool of
//! read-only WAL connections so that browsing never waits on an import.

use super::browse::{self, *};
use super::edits::{self, ChapterMetadataReplace, MetadataEdit};
use super::error::CatalogResult;
use super::family::{self, FamilyTree, PersonDetails, RelationshipCandidate};
use super::models::*;
use super::queries;
use super::schema::CATALOG_VERSIONED_SCHEMAS;
use super::trait_def::{CatalogCounts, CatalogStore};
use super::validation::RelationshipUpdate;
use crate::sqlite_persistence::migrate_if_needed;
use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub struct SqliteCatalogStore {
    read_pool: Vec<Arc<Mutex<Connection>>>,
    write_conn: Arc<Mutex<Connection>>,
    read_index: Arc<AtomicUsize>,
}

fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
        .unwrap_or(0)
}

fn counts_of(conn: &Connection) -> CatalogCounts {
    CatalogCounts {
        films: count_rows(conn, "films"),
        chapters: count_rows(conn, "chapters"),
        people: count_rows(conn, "people"),
        locations: count_rows(conn, "locations"),
        tags: count_rows(conn, "tags"),
    }
}

impl SqliteCatalogStore {
    /// Opens (creating and migrating if needed) the catalog database.
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite database file
    /// * `read_pool_size` - Number of read-only connections (at least one is opened)
    pub fn new<P: AsRef<Path>>(db_path: P, read_pool_size: usize) -> Result<Self> {
        let db_path_ref = db_path.as_ref();

        let mut write_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open catalog database {:?}", db_path_ref))?;

        migrate_if_needed(&mut write_conn, CATALOG_VERSIONED_SCHEMAS, "catalog")?;

        write_conn.pragma_update(None, "journal_mode", "WAL")?;
        write_conn.pragma_update(None, "foreign_keys", "ON")?;

        let counts = counts_of(&write_conn);
        info!(
            "Opened catalog: {} films, {} chapters, {} people, {} locations, {} tags",
            counts.films, counts.chapters, counts.people, counts.locations, counts.tags
        );

        let read_pool_size = read_pool_size.max(1);
        let mut read_pool = Vec::with_capacity(read_pool_size);
        for _ in 0..read_pool_size {
            let read_conn = Connection::open_with_flags(
                db_path_ref,
                rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                    | rusqlite::OpenFlags::SQLITE_OPEN_URI
                    | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            read_conn.pragma_update(None, "journal_mode", "WAL")?;
            read_pool.push(Arc::new(Mutex::new(read_conn)));
        }

        Ok(SqliteCatalogStore {
            write_conn: Arc::new(Mutex::new(write_conn)),
            read_pool,
            read_index: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn get_read_conn(&self) -> Arc<Mutex<Connection>> {
        let index = self.read_index.fetch_add(1, Ordering::SeqCst) % self.read_pool.len();
        self.read_pool[index].clone()
    }

    /// Runs `f` on a pooled read-only connection.
    pub fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.get_read_conn();
        let conn = conn.lock().unwrap();
        f(&conn)
    }

    /// Runs `f` in a write transaction that commits when `f` succeeds.
    pub fn write<T, E>(&self, f: impl FnOnce(&Connection) -> Result<T, E>) -> Result<T, E>
    where
        E: From<rusqlite::Error>,
    {
        self.write_if(f, |_| true)
    }

    /// Runs `f` in a write transaction and always rolls it back.
    pub fn dry_run<T, E>(&self, f: impl FnOnce(&Connection) -> Result<T, E>) -> Result<T, E>
    where
        E: From<rusqlite::Error>,
    {
        self.write_if(f, |_| false)
    }

    /// `write` or `dry_run` depending on `dry_run`.
    pub fn write_or_rollback<T, E>(
        &self,
        dry_run: bool,
        f: impl FnOnce(&Connection) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<rusqlite::Error>,
    {
        self.write_if(f, |_| !dry_run)
    }

    /// Runs `f` inside `BEGIN IMMEDIATE`. The transaction commits only when
    /// `f` succeeds and `commit` accepts its value; otherwise it is rolled
    /// back and the value (or error) is still returned.
    pub fn write_if<T, E>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, E>,
        commit: impl FnOnce(&T) -> bool,
    ) -> Result<T, E>
    where
        E: From<rusqlite::Error>,
    {
        let conn = self.write_conn.lock().unwrap();
        conn.execute("BEGIN IMMEDIATE", [])?;

        match f(&conn) {
            Ok(value) => {
                if commit(&value) {
                    conn.execute("COMMIT", [])?;
                } else {
                    conn.execute("ROLLBACK", [])?;
                }
                Ok(value)
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK", []);
                Err(e)
            }
        }
    }
}

impl CatalogStore for SqliteCatalogStore {
    fn counts(&self) -> Result<CatalogCounts> {
        self.read(|conn| Ok(counts_of(conn)))
    }

    fn catalog(&self, filter: &CatalogFilter, page: Option<&str>) -> Result<CatalogPage> {
        self.read(|conn| browse::catalog(conn, filter, page))
    }

    fn film_detail(&self, file_id: &str, is_admin: bool) -> Result<Option<FilmDetail>> {
        self.read(|conn| browse::film_detail(conn, file_id, is_admin))
    }

    fn thumbnail_data(&self, file_id: &str) -> Result<Option<ThumbnailData>> {
        self.read(|conn| browse::thumbnail_data(conn, file_id))
    }

    fn film_aggregates(&self, file_id: &str) -> Result<Option<AggregatedMetadata>> {
        self.read(|conn| match queries::get_film_by_file_id(conn, file_id)? {
            Some(film) => Ok(Some(super::aggregation::aggregate_metadata(conn, film.id)?)),
            None => Ok(None),
        })
    }

    fn film_chapter(&self, file_id: &str, chapter_id: i64) -> Result<Option<Chapter>> {
        self.read(|conn| {
            let film = match queries::get_film_by_file_id(conn, file_id)? {
                Some(film) => film,
                None => return Ok(None),
            };
            Ok(queries::get_chapter(conn, chapter_id)?.filter(|c| c.film_id == film.id))
        })
    }

    fn chapter_metadata(&self, chapter_id: i64) -> Result<Option<ChapterMetadataView>> {
        self.read(|conn| browse::chapter_metadata(conn, chapter_id))
    }

    fn edit_film_metadata(&self, file_id: &str, edit: &MetadataEdit) -> CatalogResult<()> {
        self.write(|conn| edits::edit_film_metadata(conn, file_id, edit))
    }

    fn edit_chapter_metadata(&self, chapter_id: i64, edit: &MetadataEdit) -> CatalogResult<()> {
        self.write(|conn| edits::edit_chapter_metadata(conn, chapter_id, edit))
    }

    fn update_film_years(&self, file_id: &str, years: &str) -> CatalogResult<()> {
        self.write(|conn| edits::update_film_years(conn, file_id, years))
    }

    fn update_chapter_notes(&self, chapter_id: i64, notes: &str) -> CatalogResult<()> {
        self.write(|conn| edits::update_chapter_notes(conn, chapter_id, notes))
    }

    fn replace_chapter_metadata(
        &self,
        chapter_id: i64,
        replace: &ChapterMetadataReplace,
    ) -> CatalogResult<ChapterMetadataView> {
        self.write(|conn| edits::replace_chapter_metadata(conn, chapter_id, replace))
    }

    fn people_directory(&self, sort: PeopleSort, page: Option<&str>) -> Result<PeopleDirectory> {
        self.read(|conn| browse::people_directory(conn, sort, page))
    }

    fn person_detail(&self, person_id: i64, page: Option<&str>) -> Result<Option<PersonDetail>> {
        self.read(|conn| browse::person_detail(conn, person_id, page))
    }

    fn locations_directory(&self, page: Option<&str>) -> Result<Page<WithFilmCount<Location>>> {
        self.read(|conn| browse::locations_directory(conn, page))
    }

    fn location_detail(&self, location_id: i64, page: Option<&str>) -> Result<Option<LocationDetail>> {
        self.read(|conn| browse::location_detail(conn, location_id, page))
    }

    fn overall_search(&self, query: &str) -> Result<OverallSearch> {
        self.read(|conn| browse::overall_search(conn, query))
    }

    fn search_people(
        &self,
        selected: &[i64],
        query: &str,
        page: Option<&str>,
    ) -> Result<FacetSearch<WithFilmCount<Person>, i64>> {
        self.read(|conn| browse::search_people(conn, selected, query, page))
    }

    fn search_locations(
        &self,
        selected: &[i64],
        query: &str,
        page: Option<&str>,
    ) -> Result<FacetSearch<WithFilmCount<Location>, i64>> {
        self.read(|conn| browse::search_locations(conn, selected, query, page))
    }

    fn search_years(&self, selected: &[String], page: Option<&str>) -> Result<YearSearch> {
        self.read(|conn| browse::search_years(conn, selected, page))
    }

    fn search_tags(
        &self,
        selected: &[String],
        category: Option<TagCategory>,
        page: Option<&str>,
    ) -> Result<TagSearch> {
        self.read(|conn| browse::search_tags(conn, selected, category, page))
    }

    fn autocomplete_people(&self, query: &str) -> Result<Vec<AutocompleteItem<i64>>> {
        self.read(|conn| browse::autocomplete_people(conn, query))
    }

    fn autocomplete_locations(&self, query: &str) -> Result<Vec<AutocompleteItem<i64>>> {
        self.read(|conn| browse::autocomplete_locations(conn, query))
    }

    fn autocomplete_tags(&self, query: &str) -> Result<Vec<AutocompleteItem<String>>> {
        self.read(|conn| browse::autocomplete_tags(conn, query))
    }

    fn search_api_people(&self, query: &str) -> Result<Vec<FilmCountHit>> {
        self.read(|conn| browse::search_api_people(conn, query))
    }

    fn search_api_locations(&self, query: &str) -> Result<Vec<FilmCountHit>> {
        self.read(|conn| browse::search_api_locations(conn, query))
    }

    fn get_person(&self, person_id: i64) -> Result<Option<Person>> {
        self.read(|conn| queries::get_person(conn, person_id))
    }

    fn featured_people(&self) -> Result<Vec<Person>> {
        self.read(family::featured_people)
    }

    fn family_tree(&self, person_id: i64) -> Result<Option<FamilyTree>> {
        self.read(|conn| family::family_tree(conn, person_id))
    }

    fn search_relationship_candidates(&self, query: &str) -> Result<Vec<RelationshipCandidate>> {
        self.read(|conn| family::search_relationship_candidates(conn, query))
    }

    fn edit_person(
        &self,
        person_id: i64,
        update: &RelationshipUpdate,
        details: Option<&PersonDetails>,
    ) -> CatalogResult<()> {
        self.write(|conn| family::edit_person(conn, person_id, update, details))
    }

    fn update_biography(&self, person_id: i64, notes: &str) -> CatalogResult<Person> {
        self.write(|conn| family::update_biography(conn, person_id, notes))
    }
}

#[cfg(test)]
mod tests {
    use super::super::error::CatalogError;
    use super::super::queries::CHAPTER_PEOPLE;
    use super::*;
    use tempfile::TempDir;

    fn create_store() -> (SqliteCatalogStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteCatalogStore::new(temp_dir.path().join("catalog.db"), 2).unwrap();
        (store, temp_dir)
    }

    fn seed(store: &SqliteCatalogStore) -> (i64, i64) {
        store
            .write(|conn| -> Result<(i64, i64)> {
                let (film, _) = queries::upsert_film(
                    conn,
                    &FilmUpsert {
                        file_id: "F1".into(),
                        title: "Beach day".into(),
                        youtube_id: "yt_F1".into(),
                        ..Default::default()
                    },
                )?;
                let chapter = queries::insert_chapter(
                    conn,
                    &NewChapter {
                        film_id: film,
                        start_time: "0:30".into(),
                        title: "Sandcastles".into(),
                        order: 1,
                        ..Default::default()
                    },
                )?;
                Ok((film, chapter))
            })
            .unwrap()
    }

    #[test]
    fn reopening_keeps_data() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("catalog.db");
        {
            let store = SqliteCatalogStore::new(&path, 1).unwrap();
            seed(&store);
        }
        let store = SqliteCatalogStore::new(&path, 1).unwrap();
        assert_eq!(store.counts().unwrap().films, 1);
        assert_eq!(store.counts().unwrap().chapters, 1);
    }

    #[test]
    fn failed_write_rolls_back() {
        let (store, _tmp) = create_store();
        let (_, chapter) = seed(&store);
        store
            .edit_chapter_metadata(chapter, &MetadataEdit::AddPerson("Ruth Hayward".into()))
            .unwrap();

        let replace = ChapterMetadataReplace {
            people: Some(vec![4242]),
            ..Default::default()
        };
        let err = store.replace_chapter_metadata(chapter, &replace).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidInput(_)));

        let meta = store.chapter_metadata(chapter).unwrap().unwrap();
        assert_eq!(meta.people.len(), 1);
        assert_eq!(meta.people[0].full_name, "Ruth Hayward");
    }

    #[test]
    fn dry_run_leaves_database_untouched() {
        let (store, _tmp) = create_store();
        let (_, chapter) = seed(&store);
        let linked = store
            .dry_run(|conn| -> Result<bool> {
                let person = queries::insert_person(conn, "Ruth", "Hayward", "", None)?;
                queries::link(conn, CHAPTER_PEOPLE, chapter, &person)
            })
            .unwrap();
        assert!(linked);
        assert_eq!(store.counts().unwrap().people, 0);
    }

    #[test]
    fn film_chapter_checks_ownership() {
        let (store, _tmp) = create_store();
        let (_, chapter) = seed(&store);
        assert!(store.film_chapter("F1", chapter).unwrap().is_some());
        assert!(store.film_chapter("F2", chapter).unwrap().is_none());
    }

    #[test]
    fn edits_are_visible_to_readers() {
        let (store, _tmp) = create_store();
        seed(&store);
        store
            .edit_film_metadata("F1", &MetadataEdit::AddLocation("Anaheim".into()))
            .unwrap();
        let meta = store.film_aggregates("F1").unwrap().unwrap();
        assert_eq!(meta.locations.len(), 1);
        assert_eq!(meta.locations[0].name, "Anaheim");
    }

    #[test]
    fn person_edit_is_all_or_nothing() {
        let (store, _tmp) = create_store();
        let (ruth, george) = store
            .write(|conn| -> Result<(i64, i64)> {
                let ruth = queries::insert_person(conn, "Ruth", "Hayward", "", None)?;
                queries::set_life_dates(conn, ruth, Some("1930-05-01"), None)?;
                Ok((ruth, queries::insert_person(conn, "George", "Hayward", "", None)?))
            })
            .unwrap();

        let update = RelationshipUpdate {
            spouse_id: Some(george),
            ..Default::default()
        };
        let bad_dates = PersonDetails {
            first_name: "Ruth".into(),
            last_name: "Hayward".into(),
            birth_date: Some("1930-05-01".into()),
            death_date: Some("1920-01-01".into()),
        };
        let err = store.edit_person(ruth, &update, Some(&bad_dates)).unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
        assert_eq!(store.get_person(ruth).unwrap().unwrap().spouse_id, None);

        store.edit_person(ruth, &update, None).unwrap();
        assert_eq!(store.get_person(george).unwrap().unwrap().spouse_id, Some(ruth));
    }

    #[tokio::test]
    async fn test_concurrent_reads_no_blocking() {
        let (store, _tmp) = create_store();
        seed(&store);

        let handles: Vec<_> = (0..10)
            .map(|_| {
                tokio::spawn({
                    let store = store.clone();
                    async move {
                        for _ in 0..100 {
                            let _ = store.counts();
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }
    }
}
