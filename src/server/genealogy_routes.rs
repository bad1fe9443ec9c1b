//! Family tree pages and genealogy edits.

use super::api_error::{found, success, ApiError, ApiResult, JsonBody};
use super::session::LoginRequired;
use super::state::{GuardedCatalogStore, ServerState};
use crate::catalog_store::family::PersonDetails;
use crate::catalog_store::validation::RelationshipUpdate;
use crate::catalog_store::Person;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

async fn genealogy_home(State(store): State<GuardedCatalogStore>) -> ApiResult<Json<Value>> {
    Ok(Json(json!({ "featured_people": store.featured_people()? })))
}

async fn family_tree(
    State(store): State<GuardedCatalogStore>,
    Path(person_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let tree = found(store.family_tree(person_id)?, format!("Person {}", person_id))?;
    Ok(Json(serde_json::to_value(tree).map_err(anyhow::Error::from)?))
}

async fn person_biography(
    State(store): State<GuardedCatalogStore>,
    Path(person_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let person = found(store.get_person(person_id)?, format!("Person {}", person_id))?;
    Ok(Json(json!({
        "person": person,
        "full_name": person.full_name(),
    })))
}

/// A relationship field: a number, a numeric string, or null/"" to clear.
fn relationship_id(field: &str, value: &Option<Value>) -> ApiResult<Option<i64>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid {} id", field))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ApiError::BadRequest(format!("Invalid {} id: {}", field, s))),
        Some(_) => Err(ApiError::BadRequest(format!("Invalid {} id", field))),
    }
}

fn optional_date(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Deserialize, Debug, Default)]
struct PersonEditBody {
    father: Option<Value>,
    mother: Option<Value>,
    spouse: Option<Value>,
    first_name: Option<String>,
    last_name: Option<String>,
    birth_date: Option<String>,
    death_date: Option<String>,
}

impl PersonEditBody {
    fn relationships(&self) -> ApiResult<RelationshipUpdate> {
        Ok(RelationshipUpdate {
            father_id: relationship_id("father", &self.father)?,
            mother_id: relationship_id("mother", &self.mother)?,
            spouse_id: relationship_id("spouse", &self.spouse)?,
        })
    }

    /// Submitted name and date fields over the stored ones, or None when
    /// the body carries none of them.
    fn details(&self, person: &Person) -> Option<PersonDetails> {
        if self.first_name.is_none()
            && self.last_name.is_none()
            && self.birth_date.is_none()
            && self.death_date.is_none()
        {
            return None;
        }
        let date = |submitted: &Option<String>, stored: &Option<String>| match submitted {
            Some(_) => optional_date(submitted).map(str::to_string),
            None => stored.clone(),
        };
        Some(PersonDetails {
            first_name: self
                .first_name
                .clone()
                .unwrap_or_else(|| person.first_name.clone()),
            last_name: self
                .last_name
                .clone()
                .unwrap_or_else(|| person.last_name.clone()),
            birth_date: date(&self.birth_date, &person.birth_date),
            death_date: date(&self.death_date, &person.death_date),
        })
    }
}

async fn edit_person(
    LoginRequired(session): LoginRequired,
    State(store): State<GuardedCatalogStore>,
    Path(person_id): Path<i64>,
    JsonBody(body): JsonBody<PersonEditBody>,
) -> ApiResult<Json<Value>> {
    let person = found(store.get_person(person_id)?, format!("Person {}", person_id))?;
    let update = body.relationships()?;
    let details = body.details(&person);
    store.edit_person(person_id, &update, details.as_ref())?;

    info!("User {} edited person {}", session.user_id, person_id);
    Ok(success())
}

#[derive(Deserialize, Debug)]
struct BiographyBody {
    notes: Option<String>,
}

async fn edit_biography(
    LoginRequired(_session): LoginRequired,
    State(store): State<GuardedCatalogStore>,
    Path(person_id): Path<i64>,
    JsonBody(body): JsonBody<BiographyBody>,
) -> ApiResult<Json<Value>> {
    let notes = body.notes.unwrap_or_default();
    let person = store.update_biography(person_id, &notes)?;
    Ok(Json(json!({ "success": true, "person": person })))
}

#[derive(Deserialize, Debug, Default)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

async fn search_people(
    State(store): State<GuardedCatalogStore>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Value>> {
    Ok(Json(json!({
        "results": store.search_relationship_candidates(&query.q)?
    })))
}

pub fn make_genealogy_routes() -> Router<ServerState> {
    Router::new()
        .route("/genealogy/", get(genealogy_home))
        .route("/genealogy/tree/{person_id}/", get(family_tree))
        .route("/genealogy/api/tree/{person_id}/", get(family_tree))
        .route("/genealogy/person/{person_id}/biography/", get(person_biography))
        .route("/genealogy/person/{person_id}/edit/", post(edit_person))
        .route(
            "/genealogy/person/{person_id}/biography/edit/",
            post(edit_biography),
        )
        .route("/genealogy/api/search-people/", get(search_people))
}
