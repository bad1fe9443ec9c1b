//! People and location directories, search pages and autocomplete.

use super::api_error::{found, ApiResult};
use super::state::{GuardedCatalogStore, ServerState};
use crate::catalog_store::browse::PeopleSort;
use crate::catalog_store::TagCategory;
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

fn to_json<T: Serialize>(value: T) -> ApiResult<Json<Value>> {
    Ok(Json(serde_json::to_value(value).map_err(anyhow::Error::from)?))
}

#[derive(Deserialize, Debug, Default)]
struct DirectoryQuery {
    sort: Option<String>,
    page: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct TextQuery {
    #[serde(default)]
    q: String,
}

/// Repeated `people=1&people=2` style selections. Values that do not parse
/// are dropped.
#[derive(Deserialize, Debug, Default)]
struct FacetQuery {
    #[serde(default)]
    people: Vec<String>,
    #[serde(default)]
    locations: Vec<String>,
    #[serde(default)]
    years: Vec<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    q: String,
    category: Option<String>,
    page: Option<String>,
}

fn selected_ids(values: &[String]) -> Vec<i64> {
    values.iter().filter_map(|v| v.trim().parse().ok()).collect()
}

fn selected_values(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

impl FacetQuery {
    fn category(&self) -> Option<TagCategory> {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(TagCategory::from_db_str)
    }
}

async fn people_directory(
    State(store): State<GuardedCatalogStore>,
    Query(query): Query<DirectoryQuery>,
) -> ApiResult<Json<Value>> {
    to_json(store.people_directory(PeopleSort::from_param(query.sort.as_deref()), query.page.as_deref())?)
}

async fn person_detail(
    State(store): State<GuardedCatalogStore>,
    Path(person_id): Path<i64>,
    Query(query): Query<DirectoryQuery>,
) -> ApiResult<Json<Value>> {
    let detail = found(
        store.person_detail(person_id, query.page.as_deref())?,
        format!("Person {}", person_id),
    )?;
    to_json(detail)
}

async fn locations_directory(
    State(store): State<GuardedCatalogStore>,
    Query(query): Query<DirectoryQuery>,
) -> ApiResult<Json<Value>> {
    to_json(store.locations_directory(query.page.as_deref())?)
}

async fn location_detail(
    State(store): State<GuardedCatalogStore>,
    Path(location_id): Path<i64>,
    Query(query): Query<DirectoryQuery>,
) -> ApiResult<Json<Value>> {
    let detail = found(
        store.location_detail(location_id, query.page.as_deref())?,
        format!("Location {}", location_id),
    )?;
    to_json(detail)
}

async fn overall_search(
    State(store): State<GuardedCatalogStore>,
    Query(query): Query<TextQuery>,
) -> ApiResult<Json<Value>> {
    to_json(store.overall_search(&query.q)?)
}

async fn search_people(
    State(store): State<GuardedCatalogStore>,
    axum_extra::extract::Query(query): axum_extra::extract::Query<FacetQuery>,
) -> ApiResult<Json<Value>> {
    to_json(store.search_people(&selected_ids(&query.people), &query.q, query.page.as_deref())?)
}

async fn search_locations(
    State(store): State<GuardedCatalogStore>,
    axum_extra::extract::Query(query): axum_extra::extract::Query<FacetQuery>,
) -> ApiResult<Json<Value>> {
    to_json(store.search_locations(
        &selected_ids(&query.locations),
        &query.q,
        query.page.as_deref(),
    )?)
}

async fn search_years(
    State(store): State<GuardedCatalogStore>,
    axum_extra::extract::Query(query): axum_extra::extract::Query<FacetQuery>,
) -> ApiResult<Json<Value>> {
    to_json(store.search_years(&selected_values(&query.years), query.page.as_deref())?)
}

async fn search_tags(
    State(store): State<GuardedCatalogStore>,
    axum_extra::extract::Query(query): axum_extra::extract::Query<FacetQuery>,
) -> ApiResult<Json<Value>> {
    to_json(store.search_tags(
        &selected_values(&query.tags),
        query.category(),
        query.page.as_deref(),
    )?)
}

async fn people_autocomplete(
    State(store): State<GuardedCatalogStore>,
    Query(query): Query<TextQuery>,
) -> ApiResult<Json<Value>> {
    Ok(Json(json!({ "results": store.autocomplete_people(&query.q)? })))
}

async fn locations_autocomplete(
    State(store): State<GuardedCatalogStore>,
    Query(query): Query<TextQuery>,
) -> ApiResult<Json<Value>> {
    Ok(Json(json!({ "results": store.autocomplete_locations(&query.q)? })))
}

async fn tags_autocomplete(
    State(store): State<GuardedCatalogStore>,
    Query(query): Query<TextQuery>,
) -> ApiResult<Json<Value>> {
    Ok(Json(json!({ "results": store.autocomplete_tags(&query.q)? })))
}

async fn search_api_people(
    State(store): State<GuardedCatalogStore>,
    Query(query): Query<TextQuery>,
) -> ApiResult<Json<Value>> {
    Ok(Json(json!({ "results": store.search_api_people(&query.q)? })))
}

async fn search_api_locations(
    State(store): State<GuardedCatalogStore>,
    Query(query): Query<TextQuery>,
) -> ApiResult<Json<Value>> {
    Ok(Json(json!({ "results": store.search_api_locations(&query.q)? })))
}

pub fn make_directory_routes() -> Router<ServerState> {
    Router::new()
        .route("/people/", get(people_directory))
        .route("/people/{person_id}/", get(person_detail))
        .route("/locations/", get(locations_directory))
        .route("/locations/{location_id}/", get(location_detail))
        .route("/search/", get(overall_search))
        .route("/search/people/", get(search_people))
        .route("/search/locations/", get(search_locations))
        .route("/search/years/", get(search_years))
        .route("/search/tags/", get(search_tags))
        .route("/search/api/people/", get(search_api_people))
        .route("/search/api/locations/", get(search_api_locations))
        .route("/api/people-autocomplete/", get(people_autocomplete))
        .route("/api/locations-autocomplete/", get(locations_autocomplete))
        .route("/api/tags-autocomplete/", get(tags_autocomplete))
}
