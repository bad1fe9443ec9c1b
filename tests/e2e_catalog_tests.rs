//! End-to-end tests for browsing: the film catalog, film detail pages,
//! directories, search pages and autocomplete.

mod common;

use common::*;
use reqwest::StatusCode;
use serde_json::Value;

fn file_ids(page: &Value) -> Vec<String> {
    page["items"]
        .as_array()
        .expect("items")
        .iter()
        .map(|f| f["file_id"].as_str().unwrap().to_string())
        .collect()
}

fn names(items: &Value, field: &str) -> Vec<String> {
    items
        .as_array()
        .expect("array")
        .iter()
        .map(|i| i[field].as_str().unwrap().to_string())
        .collect()
}

// ============================================================================
// Catalog listing
// ============================================================================

#[tokio::test]
async fn test_catalog_lists_every_film_by_title() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.films(&[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();

    assert_eq!(body["films"]["total"], FILM_COUNT);
    assert_eq!(body["films"]["number"], 1);
    assert_eq!(body["films"]["has_next"], false);
    assert_eq!(
        file_ids(&body["films"]),
        vec![FILM_XMAS, FILM_DISNEY, FILM_PENDING]
    );
    let pending = &body["films"]["items"][2];
    assert_eq!(pending["is_placeholder"], true);
}

#[tokio::test]
async fn test_catalog_sorts_descending_by_title() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let body: Value = client
        .films(&[("sort", "title"), ("sort_dir", "desc")])
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(
        file_ids(&body["films"]),
        vec![FILM_PENDING, FILM_DISNEY, FILM_XMAS]
    );
}

#[tokio::test]
async fn test_catalog_person_filter_includes_chapter_appearances() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let doug = DOUG_ID.to_string();
    let body: Value = client
        .films(&[("person", doug.as_str())])
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(file_ids(&body["films"]), vec![FILM_DISNEY]);
    assert_eq!(body["current_filters"]["person_id"], DOUG_ID);
}

#[tokio::test]
async fn test_catalog_tag_location_and_text_filters() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let body: Value = client.films(&[("tag", TAG_PARADE)]).await.json().await.unwrap();
    assert_eq!(file_ids(&body["films"]), vec![FILM_DISNEY]);

    let reno = RENO_ID.to_string();
    let body: Value = client
        .films(&[("location", reno.as_str())])
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(file_ids(&body["films"]), vec![FILM_XMAS]);

    // Chapter titles are searched too.
    let body: Value = client.films(&[("q", "arrival")]).await.json().await.unwrap();
    assert_eq!(file_ids(&body["films"]), vec![FILM_DISNEY]);

    // Substring match: "Main Street" contains "tree" as well.
    let body: Value = client.films(&[("q", "tree")]).await.json().await.unwrap();
    assert_eq!(file_ids(&body["films"]), vec![FILM_XMAS, FILM_DISNEY]);

    let body: Value = client.films(&[("year", "1970")]).await.json().await.unwrap();
    assert_eq!(file_ids(&body["films"]), vec![FILM_XMAS]);
}

#[tokio::test]
async fn test_catalog_ignores_malformed_filters() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client
        .films(&[("person", "abc"), ("page", "-4"), ("sort", "bogus")])
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["films"]["total"], FILM_COUNT);
    assert_eq!(body["films"]["number"], 1);
    assert!(body["current_filters"]["person_id"].is_null());
}

#[tokio::test]
async fn test_catalog_filter_options() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let body: Value = client.films(&[]).await.json().await.unwrap();
    let options = &body["filter_options"];
    let years: Vec<i64> = options["years"]
        .as_array()
        .unwrap()
        .iter()
        .map(|y| y.as_i64().unwrap())
        .collect();
    assert!(years.contains(&1962));
    assert!(years.contains(&1970));
    assert!(names(&options["tags"], "tag").contains(&TAG_PARADE.to_string()));
}

// ============================================================================
// Film detail
// ============================================================================

#[tokio::test]
async fn test_film_detail_unions_chapter_metadata() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.film_detail(FILM_DISNEY).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();

    assert_eq!(body["film"]["title"], FILM_DISNEY_TITLE);
    assert_eq!(body["is_admin"], false);

    let chapters = body["chapters"].as_array().unwrap();
    assert_eq!(chapters.len(), 2);
    assert_eq!(chapters[0]["title"], "Arrival");
    assert_eq!(names(&chapters[0]["people"], "full_name"), vec!["Doug Thompson"]);
    assert_eq!(chapters[1]["start_time_seconds"], 90);

    assert_eq!(
        names(&body["all_people"], "full_name"),
        vec!["Ruth Hayward", "Doug Thompson"]
    );
    assert_eq!(
        names(&body["all_locations"], "name"),
        vec!["Anaheim", "Disneyland"]
    );
    assert_eq!(names(&body["all_tags"], "tag"), vec![TAG_DISNEY, TAG_PARADE]);
    assert_eq!(body["all_years"], serde_json::json!([1962, 1963]));
}

#[tokio::test]
async fn test_film_detail_unknown_film_is_not_found() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.film_detail("NOPE_reel").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Film NOPE_reel not found");
}

#[tokio::test]
async fn test_aggregated_metadata_endpoint() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let body: Value = client
        .aggregated_metadata(FILM_XMAS)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["success"], true);
    // Blank last names sort first.
    assert_eq!(
        names(&body["people"], "full_name"),
        vec!["Ruth ", "Cal Hayward", "George Hayward"]
    );
    assert_eq!(body["years"], serde_json::json!([1970]));
}

#[tokio::test]
async fn test_thumbnail_without_sprite_is_static() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let body: Value = client.thumbnail(FILM_DISNEY).await.json().await.unwrap();
    assert_eq!(body, serde_json::json!({ "animated": false }));

    let response = client.thumbnail("NOPE_reel").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_chapter_metadata_is_public() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let body: Value = client
        .chapter_metadata(CHAPTER_ARRIVAL_ID)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(names(&body["people"], "full_name"), vec!["Doug Thompson"]);
    assert_eq!(names(&body["locations"], "name"), vec!["Disneyland"]);
    assert_eq!(body["years"], "1962");

    let response = client.chapter_metadata(999).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Directories
// ============================================================================

#[tokio::test]
async fn test_people_directory_lists_only_people_with_films() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let body: Value = client.people(None).await.json().await.unwrap();
    assert_eq!(body["current_sort"], "last_name");
    let people = &body["people"];
    assert_eq!(people["total"], 5);
    let ids: Vec<i64> = people["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![RUTH_BLANK_ID, CAL_ID, GEORGE_ID, RUTH_ID, DOUG_ID]);
    assert!(!ids.contains(&SANDY_ID));
    assert_eq!(people["items"][4]["film_count"], 1);

    let body: Value = client.people(Some("first_name")).await.json().await.unwrap();
    assert_eq!(body["people"]["items"][0]["first_name"], "Cal");
}

#[tokio::test]
async fn test_person_detail_counts_films() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let body: Value = client.person_detail(CAL_ID).await.json().await.unwrap();
    assert_eq!(body["person"]["first_name"], "Cal");
    assert_eq!(body["total_films"], 1);
    assert_eq!(file_ids(&body["films"]), vec![FILM_XMAS]);

    let response = client.person_detail(999).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_locations_directory_and_detail() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let body: Value = client.locations().await.json().await.unwrap();
    assert_eq!(
        names(&body["items"], "name"),
        vec!["Anaheim", "Disneyland", "Reno"]
    );

    let body: Value = client
        .location_detail(DISNEYLAND_ID)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["location"]["name"], "Disneyland");
    assert_eq!(file_ids(&body["films"]), vec![FILM_DISNEY]);
}

// ============================================================================
// Search
// ============================================================================

#[tokio::test]
async fn test_overall_search_skips_placeholder_films() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let body: Value = client.search("pending").await.json().await.unwrap();
    assert_eq!(body["total_results"]["films"], 0);

    let body: Value = client.search("main street").await.json().await.unwrap();
    assert_eq!(body["total_results"]["chapters"], 1);
    assert_eq!(body["chapters"][0]["film_file_id"], FILM_DISNEY);

    let body: Value = client.search("hayward").await.json().await.unwrap();
    assert_eq!(body["total_results"]["people"], 3);
}

#[tokio::test]
async fn test_empty_search_returns_nothing() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let body: Value = client.search("  ").await.json().await.unwrap();
    assert_eq!(body["films"], serde_json::json!([]));
    assert_eq!(body["total_results"]["people"], 0);
}

#[tokio::test]
async fn test_people_facet_matches_any_selected_person() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let body: Value = client.facet_search("people", &[]).await.json().await.unwrap();
    assert!(body["films"].is_null());

    let doug = DOUG_ID.to_string();
    let george = GEORGE_ID.to_string();
    let body: Value = client
        .facet_search("people", &[("people", doug.as_str()), ("people", george.as_str())])
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["selected"], serde_json::json!([DOUG_ID, GEORGE_ID]));
    assert_eq!(file_ids(&body["films"]), vec![FILM_XMAS, FILM_DISNEY]);
}

#[tokio::test]
async fn test_year_facet_groups_decades_and_matches_chapter_years() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let body: Value = client.facet_search("years", &[]).await.json().await.unwrap();
    let decades: Vec<i64> = body["decades"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["decade"].as_i64().unwrap())
        .collect();
    // The placeholder film's 1980 is not offered.
    assert_eq!(decades, vec![1960, 1970]);

    let body: Value = client
        .facet_search("years", &[("years", "1963")])
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(file_ids(&body["films"]), vec![FILM_DISNEY]);
}

#[tokio::test]
async fn test_tag_facet_filters_by_category() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let body: Value = client
        .facet_search("tags", &[("category", "holidays")])
        .await
        .json()
        .await
        .unwrap();
    let groups = body["tags_by_category"].as_array().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["category"], "holidays");
    assert_eq!(names(&groups[0]["tags"], "tag"), vec![TAG_CHRISTMAS]);

    let body: Value = client
        .facet_search("tags", &[("tags", TAG_DISNEY)])
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(file_ids(&body["films"]), vec![FILM_DISNEY]);
}

#[tokio::test]
async fn test_autocomplete() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let body: Value = client.autocomplete("people", "thom").await.json().await.unwrap();
    assert_eq!(
        names(&body["results"], "text"),
        vec!["Doug Thompson", "Sandy Thompson"]
    );

    let body: Value = client.autocomplete("people", "").await.json().await.unwrap();
    assert_eq!(body["results"], serde_json::json!([]));

    let body: Value = client.autocomplete("locations", "dis").await.json().await.unwrap();
    assert_eq!(names(&body["results"], "name"), vec!["Disneyland"]);

    let body: Value = client.autocomplete("tags", "chr").await.json().await.unwrap();
    assert_eq!(body["results"][0]["id"], TAG_CHRISTMAS);
}

#[tokio::test]
async fn test_search_api_only_returns_entities_with_films() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let body: Value = client.search_api("people", "thom").await.json().await.unwrap();
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["id"], DOUG_ID);
    assert_eq!(results[0]["film_count"], 1);

    let body: Value = client.search_api("locations", "re").await.json().await.unwrap();
    assert_eq!(names(&body["results"], "name"), vec!["Reno"]);
}
