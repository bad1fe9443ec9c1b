//! Film catalog, film detail, and the film/chapter metadata editors.

use super::api_error::{found, success, success_with, ApiError, ApiResult, JsonBody};
use super::session::{LoginRequired, Session, StaffSession};
use super::state::{GuardedCatalogStore, ServerState};
use crate::catalog_store::browse::{AggregatedMetadataView, CatalogFilter, FilmSort};
use crate::catalog_store::edits::{ChapterMetadataReplace, MetadataEditRequest};
use axum::{
    extract::{Path, Query, State},
    routing::get,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
pub struct CatalogQuery {
    pub q: Option<String>,
    pub year: Option<String>,
    pub person: Option<String>,
    pub location: Option<String>,
    pub tag: Option<String>,
    pub sort: Option<String>,
    pub sort_dir: Option<String>,
    pub page: Option<String>,
}

fn optional_id(raw: &Option<String>) -> Option<i64> {
    raw.as_deref().and_then(|v| v.trim().parse().ok())
}

fn optional_text(raw: &Option<String>) -> Option<String> {
    raw.as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl CatalogQuery {
    fn filter(&self) -> CatalogFilter {
        CatalogFilter {
            q: optional_text(&self.q),
            year: optional_text(&self.year),
            person_id: optional_id(&self.person),
            location_id: optional_id(&self.location),
            tag: optional_text(&self.tag),
            sort: FilmSort::from_param(self.sort.as_deref()),
            descending: self.sort_dir.as_deref() == Some("desc"),
        }
    }
}

async fn list_films(
    State(store): State<GuardedCatalogStore>,
    Query(query): Query<CatalogQuery>,
) -> ApiResult<Json<Value>> {
    let page = store.catalog(&query.filter(), query.page.as_deref())?;
    Ok(Json(serde_json::to_value(page).map_err(anyhow::Error::from)?))
}

async fn film_detail(
    session: Option<Session>,
    State(store): State<GuardedCatalogStore>,
    Path(file_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let is_admin = session.is_some_and(|s| s.is_staff);
    let detail = found(store.film_detail(&file_id, is_admin)?, format!("Film {}", file_id))?;
    Ok(Json(serde_json::to_value(detail).map_err(anyhow::Error::from)?))
}

async fn film_thumbnail(
    State(store): State<GuardedCatalogStore>,
    Path(file_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let data = found(store.thumbnail_data(&file_id)?, format!("Film {}", file_id))?;
    Ok(Json(serde_json::to_value(data).map_err(anyhow::Error::from)?))
}

async fn film_aggregated_metadata(
    State(store): State<GuardedCatalogStore>,
    Path(file_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let aggregates = found(store.film_aggregates(&file_id)?, format!("Film {}", file_id))?;
    success_with(&AggregatedMetadataView::from(&aggregates))
}

async fn edit_film_metadata(
    LoginRequired(session): LoginRequired,
    State(store): State<GuardedCatalogStore>,
    Path(file_id): Path<String>,
    JsonBody(request): JsonBody<MetadataEditRequest>,
) -> ApiResult<Json<Value>> {
    let edit = request.parse(false)?;
    debug!("User {} edits film {}: {:?}", session.user_id, file_id, edit);
    store.edit_film_metadata(&file_id, &edit)?;
    Ok(success())
}

#[derive(Deserialize, Debug)]
struct YearsBody {
    years: Option<String>,
}

async fn update_film_years(
    LoginRequired(_session): LoginRequired,
    State(store): State<GuardedCatalogStore>,
    Path(file_id): Path<String>,
    JsonBody(body): JsonBody<YearsBody>,
) -> ApiResult<Json<Value>> {
    let years = body
        .years
        .ok_or_else(|| ApiError::BadRequest("Missing 'years'".to_string()))?;
    store.update_film_years(&file_id, &years)?;
    Ok(success())
}

async fn get_chapter_metadata(
    State(store): State<GuardedCatalogStore>,
    Path(chapter_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let view = found(store.chapter_metadata(chapter_id)?, format!("Chapter {}", chapter_id))?;
    Ok(Json(serde_json::to_value(view).map_err(anyhow::Error::from)?))
}

#[derive(Serialize)]
struct ReplaceResponse<T: Serialize> {
    updated_metadata: T,
}

async fn replace_chapter_metadata(
    StaffSession(session): StaffSession,
    State(store): State<GuardedCatalogStore>,
    Path(chapter_id): Path<i64>,
    JsonBody(replace): JsonBody<ChapterMetadataReplace>,
) -> ApiResult<Json<Value>> {
    debug!("Staff {} replaces metadata of chapter {}", session.user_id, chapter_id);
    let updated = store.replace_chapter_metadata(chapter_id, &replace)?;
    success_with(&ReplaceResponse {
        updated_metadata: updated,
    })
}

async fn get_film_chapter_metadata(
    StaffSession(_session): StaffSession,
    State(store): State<GuardedCatalogStore>,
    Path((file_id, chapter_id)): Path<(String, i64)>,
) -> ApiResult<Json<Value>> {
    found(store.film_chapter(&file_id, chapter_id)?, format!("Chapter {}", chapter_id))?;
    let view = found(store.chapter_metadata(chapter_id)?, format!("Chapter {}", chapter_id))?;
    Ok(Json(serde_json::to_value(view).map_err(anyhow::Error::from)?))
}

async fn replace_film_chapter_metadata(
    StaffSession(session): StaffSession,
    State(store): State<GuardedCatalogStore>,
    Path((file_id, chapter_id)): Path<(String, i64)>,
    JsonBody(replace): JsonBody<ChapterMetadataReplace>,
) -> ApiResult<Json<Value>> {
    found(store.film_chapter(&file_id, chapter_id)?, format!("Chapter {}", chapter_id))?;
    debug!("Staff {} replaces metadata of chapter {}", session.user_id, chapter_id);
    let updated = store.replace_chapter_metadata(chapter_id, &replace)?;
    success_with(&ReplaceResponse {
        updated_metadata: updated,
    })
}

async fn update_chapter(
    LoginRequired(session): LoginRequired,
    State(store): State<GuardedCatalogStore>,
    Path(chapter_id): Path<i64>,
    JsonBody(request): JsonBody<MetadataEditRequest>,
) -> ApiResult<Json<Value>> {
    let edit = request.parse(true)?;
    debug!("User {} edits chapter {}: {:?}", session.user_id, chapter_id, edit);
    store.edit_chapter_metadata(chapter_id, &edit)?;
    Ok(success())
}

#[derive(Deserialize, Debug)]
struct NotesBody {
    notes: Option<String>,
}

async fn update_chapter_notes(
    LoginRequired(_session): LoginRequired,
    State(store): State<GuardedCatalogStore>,
    Path(chapter_id): Path<i64>,
    JsonBody(body): JsonBody<NotesBody>,
) -> ApiResult<Json<Value>> {
    let notes = body
        .notes
        .ok_or_else(|| ApiError::BadRequest("Missing 'notes'".to_string()))?;
    store.update_chapter_notes(chapter_id, &notes)?;
    Ok(success())
}

pub fn make_catalog_routes() -> Router<ServerState> {
    Router::new()
        .route("/films/", get(list_films))
        .route("/films/{file_id}/", get(film_detail))
        .route("/films/{file_id}/thumbnail/", get(film_thumbnail))
        .route(
            "/films/{file_id}/chapters/{chapter_id}/metadata/",
            get(get_film_chapter_metadata).post(replace_film_chapter_metadata),
        )
        .route("/api/film/{file_id}/metadata/", post(edit_film_metadata))
        .route("/api/film/{file_id}/years/", post(update_film_years))
        .route(
            "/api/film/{file_id}/aggregated-metadata/",
            get(film_aggregated_metadata),
        )
        .route(
            "/api/chapter/{chapter_id}/metadata/",
            get(get_chapter_metadata).post(replace_chapter_metadata),
        )
        .route("/api/chapter/{chapter_id}/update/", post(update_chapter))
        .route("/api/chapter/{chapter_id}/notes/", post(update_chapter_notes))
}
