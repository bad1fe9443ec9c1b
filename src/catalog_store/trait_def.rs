//! CatalogStore trait definition.
//!
//! The HTTP layer talks to the catalog only through this trait, held as
//! `Arc<dyn CatalogStore>`. Reads return `anyhow::Result`; edits return
//! `CatalogResult` so handlers can tell missing entities and bad input apart
//! from store failures.

use super::browse::*;
use super::edits::{ChapterMetadataReplace, MetadataEdit};
use super::error::CatalogResult;
use super::family::{FamilyTree, PersonDetails, RelationshipCandidate};
use super::models::*;
use super::validation::RelationshipUpdate;
use anyhow::Result;
use serde::Serialize;

/// Row counts shown on the server home page.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CatalogCounts {
    pub films: i64,
    pub chapters: i64,
    pub people: i64,
    pub locations: i64,
    pub tags: i64,
}

pub trait CatalogStore: Send + Sync {
    fn counts(&self) -> Result<CatalogCounts>;

    // =========================================================================
    // Films and chapters
    // =========================================================================

    fn catalog(&self, filter: &CatalogFilter, page: Option<&str>) -> Result<CatalogPage>;

    fn film_detail(&self, file_id: &str, is_admin: bool) -> Result<Option<FilmDetail>>;

    fn thumbnail_data(&self, file_id: &str) -> Result<Option<ThumbnailData>>;

    /// Union of direct and chapter-level metadata of the film.
    fn film_aggregates(&self, file_id: &str) -> Result<Option<AggregatedMetadata>>;

    /// The chapter, only if it belongs to the film with `file_id`.
    fn film_chapter(&self, file_id: &str, chapter_id: i64) -> Result<Option<Chapter>>;

    fn chapter_metadata(&self, chapter_id: i64) -> Result<Option<ChapterMetadataView>>;

    // =========================================================================
    // Edits
    // =========================================================================

    fn edit_film_metadata(&self, file_id: &str, edit: &MetadataEdit) -> CatalogResult<()>;

    fn edit_chapter_metadata(&self, chapter_id: i64, edit: &MetadataEdit) -> CatalogResult<()>;

    fn update_film_years(&self, file_id: &str, years: &str) -> CatalogResult<()>;

    fn update_chapter_notes(&self, chapter_id: i64, notes: &str) -> CatalogResult<()>;

    /// Clear-then-set of every key present in `replace`, in one transaction.
    fn replace_chapter_metadata(
        &self,
        chapter_id: i64,
        replace: &ChapterMetadataReplace,
    ) -> CatalogResult<ChapterMetadataView>;

    // =========================================================================
    // Directories, search and autocomplete
    // =========================================================================

    fn people_directory(&self, sort: PeopleSort, page: Option<&str>) -> Result<PeopleDirectory>;

    fn person_detail(&self, person_id: i64, page: Option<&str>) -> Result<Option<PersonDetail>>;

    fn locations_directory(&self, page: Option<&str>) -> Result<Page<WithFilmCount<Location>>>;

    fn location_detail(&self, location_id: i64, page: Option<&str>) -> Result<Option<LocationDetail>>;

    fn overall_search(&self, query: &str) -> Result<OverallSearch>;

    fn search_people(
        &self,
        selected: &[i64],
        query: &str,
        page: Option<&str>,
    ) -> Result<FacetSearch<WithFilmCount<Person>, i64>>;

    fn search_locations(
        &self,
        selected: &[i64],
        query: &str,
        page: Option<&str>,
    ) -> Result<FacetSearch<WithFilmCount<Location>, i64>>;

    fn search_years(&self, selected: &[String], page: Option<&str>) -> Result<YearSearch>;

    fn search_tags(
        &self,
        selected: &[String],
        category: Option<TagCategory>,
        page: Option<&str>,
    ) -> Result<TagSearch>;

    fn autocomplete_people(&self, query: &str) -> Result<Vec<AutocompleteItem<i64>>>;

    fn autocomplete_locations(&self, query: &str) -> Result<Vec<AutocompleteItem<i64>>>;

    fn autocomplete_tags(&self, query: &str) -> Result<Vec<AutocompleteItem<String>>>;

    fn search_api_people(&self, query: &str) -> Result<Vec<FilmCountHit>>;

    fn search_api_locations(&self, query: &str) -> Result<Vec<FilmCountHit>>;

    // =========================================================================
    // Genealogy
    // =========================================================================

    fn get_person(&self, person_id: i64) -> Result<Option<Person>>;

    fn featured_people(&self) -> Result<Vec<Person>>;

    fn family_tree(&self, person_id: i64) -> Result<Option<FamilyTree>>;

    fn search_relationship_candidates(&self, query: &str) -> Result<Vec<RelationshipCandidate>>;

    fn edit_person(
        &self,
        person_id: i64,
        update: &RelationshipUpdate,
        details: Option<&PersonDetails>,
    ) -> CatalogResult<()>;

    fn update_biography(&self, person_id: i64, notes: &str) -> CatalogResult<Person>;
}
