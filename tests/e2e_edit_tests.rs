//! End-to-end tests for the film and chapter metadata editors.

mod common;

use common::*;
use reqwest::StatusCode;
use serde_json::{json, Value};

fn names(items: &Value, field: &str) -> Vec<String> {
    items
        .as_array()
        .expect("array")
        .iter()
        .map(|i| i[field].as_str().unwrap().to_string())
        .collect()
}

async fn film(client: &TestClient, file_id: &str) -> Value {
    let response = client.film_detail(file_id).await;
    assert_eq!(response.status(), StatusCode::OK);
    response.json().await.unwrap()
}

async fn assert_bad_request(response: reqwest::Response, expected_error: &str) {
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], expected_error);
}

// ============================================================================
// Film edits
// ============================================================================

#[tokio::test]
async fn test_add_existing_person_reuses_the_row() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let response = client
        .edit_film_metadata(
            FILM_XMAS,
            &json!({ "type": "people", "action": "add", "value": "Sandy Thompson" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "success": true }));

    let detail = film(&client, FILM_XMAS).await;
    let ids: Vec<i64> = detail["all_people"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_i64().unwrap())
        .collect();
    assert!(ids.contains(&SANDY_ID));

    let home: Value = client.home().await.json().await.unwrap();
    assert_eq!(home["counts"]["people"], 6);
}

#[tokio::test]
async fn test_add_new_person_splits_on_first_space() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let response = client
        .edit_film_metadata(
            FILM_XMAS,
            &json!({ "type": "people", "action": "add", "value": "Mary Ann Jones" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = client.autocomplete("people", "mary").await.json().await.unwrap();
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    let person: Value = client
        .person_detail(results[0]["id"].as_i64().unwrap())
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(person["person"]["first_name"], "Mary");
    assert_eq!(person["person"]["last_name"], "Ann Jones");
}

#[tokio::test]
async fn test_remove_person_and_tag_from_film() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let response = client
        .edit_film_metadata(
            FILM_XMAS,
            &json!({ "type": "people", "action": "remove", "id": GEORGE_ID }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .edit_film_metadata(
            FILM_XMAS,
            &json!({ "type": "tags", "action": "remove", "id": TAG_CHRISTMAS }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let detail = film(&client, FILM_XMAS).await;
    assert!(!names(&detail["all_people"], "full_name").contains(&"George Hayward".to_string()));
    assert_eq!(detail["all_tags"], json!([]));

    // Removing what is not linked is not an error.
    let response = client
        .edit_film_metadata(
            FILM_XMAS,
            &json!({ "type": "people", "action": "remove", "id": GEORGE_ID }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_add_location_and_tag_create_rows() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    for body in [
        json!({ "type": "locations", "action": "add", "value": "Lake Tahoe" }),
        json!({ "type": "tags", "action": "add", "value": "snow" }),
    ] {
        let response = client.edit_film_metadata(FILM_XMAS, &body).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let detail = film(&client, FILM_XMAS).await;
    assert_eq!(names(&detail["all_locations"], "name"), vec!["Lake Tahoe", "Reno"]);
    assert_eq!(names(&detail["all_tags"], "tag"), vec![TAG_CHRISTMAS, "snow"]);
}

#[tokio::test]
async fn test_unknown_edit_type_or_action_is_rejected() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let response = client
        .edit_film_metadata(FILM_XMAS, &json!({ "type": "pets", "action": "add", "value": "Rex" }))
        .await;
    assert_bad_request(response, "Unknown metadata type 'pets'").await;

    let response = client
        .edit_film_metadata(FILM_XMAS, &json!({ "type": "tags", "action": "rename", "value": "x" }))
        .await;
    assert_bad_request(response, "Unknown action 'rename' for type 'tags'").await;

    // Film years are set through their own endpoint.
    let response = client
        .edit_film_metadata(FILM_XMAS, &json!({ "type": "years", "action": "set", "value": "1971" }))
        .await;
    assert_bad_request(response, "Unknown metadata type 'years'").await;
}

#[tokio::test]
async fn test_malformed_json_is_a_bad_request() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let response = client
        .post_raw(&format!("/api/film/{}/metadata/", FILM_XMAS), "{not json")
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON"));
}

#[tokio::test]
async fn test_edit_unknown_film_is_not_found() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let response = client
        .edit_film_metadata("NOPE_reel", &json!({ "type": "tags", "action": "add", "value": "x" }))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_film_years() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let response = client.update_film_years(FILM_DISNEY, "1962-1964").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(film(&client, FILM_DISNEY).await["film"]["years"], "1962-1964");

    let response = client
        .post_raw(&format!("/api/film/{}/years/", FILM_DISNEY), "{}")
        .await;
    assert_bad_request(response, "Missing 'years'").await;
}

// ============================================================================
// Chapter edits
// ============================================================================

#[tokio::test]
async fn test_chapter_update_sets_years_and_people() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let response = client
        .update_chapter(
            CHAPTER_MAIN_STREET_ID,
            &json!({ "type": "years", "action": "set", "value": "1964" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = client
        .update_chapter(
            CHAPTER_MAIN_STREET_ID,
            &json!({ "type": "people", "action": "add", "value": "Sandy Thompson" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = client
        .chapter_metadata(CHAPTER_MAIN_STREET_ID)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["years"], "1964");
    assert_eq!(names(&body["people"], "full_name"), vec!["Sandy Thompson"]);

    // The film page picks the chapter's people up in its union.
    let detail = film(&client, FILM_DISNEY).await;
    assert!(names(&detail["all_people"], "full_name").contains(&"Sandy Thompson".to_string()));
}

#[tokio::test]
async fn test_chapter_notes() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let response = client.chapter_notes(CHAPTER_TREE_ID, "Cal opens presents").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = client.chapter_metadata(CHAPTER_TREE_ID).await.json().await.unwrap();
    assert_eq!(body["notes"], "Cal opens presents");

    let response = client
        .post_raw(&format!("/api/chapter/{}/notes/", CHAPTER_TREE_ID), "{}")
        .await;
    assert_bad_request(response, "Missing 'notes'").await;

    let response = client.chapter_notes(999, "x").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Staff chapter replacement
// ============================================================================

#[tokio::test]
async fn test_replace_chapter_metadata() {
    let server = TestServer::spawn().await;
    let staff = TestClient::authenticated_staff(server.base_url.clone()).await;

    let response = staff
        .replace_chapter_metadata(
            CHAPTER_ARRIVAL_ID,
            &json!({ "people": [RUTH_ID, CAL_ID], "tags": ["picnic"], "years": "1962-1963" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    let updated = &body["updated_metadata"];
    assert_eq!(
        names(&updated["people"], "full_name"),
        vec!["Cal Hayward", "Ruth Hayward"]
    );
    assert_eq!(names(&updated["tags"], "tag"), vec!["picnic"]);
    assert_eq!(updated["years"], "1962-1963");
    // Absent keys keep their links.
    assert_eq!(names(&updated["locations"], "name"), vec!["Disneyland"]);
}

#[tokio::test]
async fn test_replace_with_unknown_person_changes_nothing() {
    let server = TestServer::spawn().await;
    let staff = TestClient::authenticated_staff(server.base_url.clone()).await;

    let response = staff
        .replace_chapter_metadata(CHAPTER_ARRIVAL_ID, &json!({ "people": [SANDY_ID, 999] }))
        .await;
    assert_bad_request(response, "Person 999 does not exist").await;

    let body: Value = staff
        .chapter_metadata(CHAPTER_ARRIVAL_ID)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(names(&body["people"], "full_name"), vec!["Doug Thompson"]);
}

#[tokio::test]
async fn test_film_scoped_replace_checks_the_chapter_belongs_to_the_film() {
    let server = TestServer::spawn().await;
    let staff = TestClient::authenticated_staff(server.base_url.clone()).await;

    let response = staff
        .replace_film_chapter_metadata(FILM_XMAS, CHAPTER_ARRIVAL_ID, &json!({ "people": [] }))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = staff
        .replace_film_chapter_metadata(FILM_DISNEY, CHAPTER_ARRIVAL_ID, &json!({ "people": [] }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["updated_metadata"]["people"], json!([]));
}
