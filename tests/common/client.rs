//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per catalog endpoint. Redirects are not
//! followed so that login redirects can be asserted on.
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

/// HTTP test client with cookie-based session management
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    /// Creates a new anonymous client
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    /// Creates a client logged in as the regular test user
    ///
    /// # Panics
    ///
    /// Panics if authentication fails (indicates test infrastructure problem).
    pub async fn authenticated(base_url: String) -> Self {
        let client = Self::new(base_url);
        let response = client.login(TEST_USER, TEST_PASS).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::CREATED,
            "Test user authentication failed: {:?}",
            response.text().await
        );
        client
    }

    /// Creates a client logged in as the staff user
    pub async fn authenticated_staff(base_url: String) -> Self {
        let client = Self::new(base_url);
        let response = client.login(STAFF_USER, STAFF_PASS).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::CREATED,
            "Staff authentication failed: {:?}",
            response.text().await
        );
        client
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .unwrap_or_else(|e| panic!("GET {} failed: {}", path, e))
    }

    async fn get_query(&self, path: &str, query: &[(&str, &str)]) -> Response {
        self.client
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .unwrap_or_else(|e| panic!("GET {} failed: {}", path, e))
    }

    async fn post_json(&self, path: &str, body: &Value) -> Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .unwrap_or_else(|e| panic!("POST {} failed: {}", path, e))
    }

    /// POSTs `body` verbatim as `application/json`, for malformed-body tests.
    pub async fn post_raw(&self, path: &str, body: &str) -> Response {
        self.client
            .post(self.url(path))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await
            .unwrap_or_else(|e| panic!("POST {} failed: {}", path, e))
    }

    // ========================================================================
    // Accounts
    // ========================================================================

    /// POST /accounts/login/
    pub async fn login(&self, username: &str, password: &str) -> Response {
        self.post_json(
            "/accounts/login/",
            &json!({ "username": username, "password": password }),
        )
        .await
    }

    /// GET /accounts/login/?next=
    pub async fn login_page(&self, next: &str) -> Response {
        self.get_query("/accounts/login/", &[("next", next)]).await
    }

    /// POST /accounts/logout/
    pub async fn logout(&self) -> Response {
        self.post_json("/accounts/logout/", &json!({})).await
    }

    /// GET /
    pub async fn home(&self) -> Response {
        self.get("/").await
    }

    // ========================================================================
    // Films and chapters
    // ========================================================================

    /// GET /films/ with filter parameters
    pub async fn films(&self, query: &[(&str, &str)]) -> Response {
        self.get_query("/films/", query).await
    }

    /// GET /films/{file_id}/
    pub async fn film_detail(&self, file_id: &str) -> Response {
        self.get(&format!("/films/{}/", file_id)).await
    }

    /// GET /films/{file_id}/thumbnail/
    pub async fn thumbnail(&self, file_id: &str) -> Response {
        self.get(&format!("/films/{}/thumbnail/", file_id)).await
    }

    /// GET /films/{file_id}/chapters/{chapter_id}/metadata/
    pub async fn film_chapter_metadata(&self, file_id: &str, chapter_id: i64) -> Response {
        self.get(&format!("/films/{}/chapters/{}/metadata/", file_id, chapter_id))
            .await
    }

    /// POST /films/{file_id}/chapters/{chapter_id}/metadata/
    pub async fn replace_film_chapter_metadata(
        &self,
        file_id: &str,
        chapter_id: i64,
        body: &Value,
    ) -> Response {
        self.post_json(
            &format!("/films/{}/chapters/{}/metadata/", file_id, chapter_id),
            body,
        )
        .await
    }

    /// POST /api/film/{file_id}/metadata/
    pub async fn edit_film_metadata(&self, file_id: &str, body: &Value) -> Response {
        self.post_json(&format!("/api/film/{}/metadata/", file_id), body)
            .await
    }

    /// POST /api/film/{file_id}/years/
    pub async fn update_film_years(&self, file_id: &str, years: &str) -> Response {
        self.post_json(
            &format!("/api/film/{}/years/", file_id),
            &json!({ "years": years }),
        )
        .await
    }

    /// GET /api/film/{file_id}/aggregated-metadata/
    pub async fn aggregated_metadata(&self, file_id: &str) -> Response {
        self.get(&format!("/api/film/{}/aggregated-metadata/", file_id))
            .await
    }

    /// GET /api/chapter/{chapter_id}/metadata/
    pub async fn chapter_metadata(&self, chapter_id: i64) -> Response {
        self.get(&format!("/api/chapter/{}/metadata/", chapter_id))
            .await
    }

    /// POST /api/chapter/{chapter_id}/metadata/
    pub async fn replace_chapter_metadata(&self, chapter_id: i64, body: &Value) -> Response {
        self.post_json(&format!("/api/chapter/{}/metadata/", chapter_id), body)
            .await
    }

    /// POST /api/chapter/{chapter_id}/update/
    pub async fn update_chapter(&self, chapter_id: i64, body: &Value) -> Response {
        self.post_json(&format!("/api/chapter/{}/update/", chapter_id), body)
            .await
    }

    /// POST /api/chapter/{chapter_id}/notes/
    pub async fn chapter_notes(&self, chapter_id: i64, notes: &str) -> Response {
        self.post_json(
            &format!("/api/chapter/{}/notes/", chapter_id),
            &json!({ "notes": notes }),
        )
        .await
    }

    // ========================================================================
    // Directories
    // ========================================================================

    /// GET /people/?sort=
    pub async fn people(&self, sort: Option<&str>) -> Response {
        match sort {
            Some(sort) => self.get_query("/people/", &[("sort", sort)]).await,
            None => self.get("/people/").await,
        }
    }

    /// GET /people/{person_id}/
    pub async fn person_detail(&self, person_id: i64) -> Response {
        self.get(&format!("/people/{}/", person_id)).await
    }

    /// GET /locations/
    pub async fn locations(&self) -> Response {
        self.get("/locations/").await
    }

    /// GET /locations/{location_id}/
    pub async fn location_detail(&self, location_id: i64) -> Response {
        self.get(&format!("/locations/{}/", location_id)).await
    }

    // ========================================================================
    // Search
    // ========================================================================

    /// GET /search/?q=
    pub async fn search(&self, q: &str) -> Response {
        self.get_query("/search/", &[("q", q)]).await
    }

    /// GET /search/{people,locations,years,tags}/ with repeated parameters
    pub async fn facet_search(&self, facet: &str, query: &[(&str, &str)]) -> Response {
        self.get_query(&format!("/search/{}/", facet), query).await
    }

    /// GET /api/{people,locations,tags}-autocomplete/?q=
    pub async fn autocomplete(&self, kind: &str, q: &str) -> Response {
        self.get_query(&format!("/api/{}-autocomplete/", kind), &[("q", q)])
            .await
    }

    /// GET /search/api/{people,locations}/?q=
    pub async fn search_api(&self, kind: &str, q: &str) -> Response {
        self.get_query(&format!("/search/api/{}/", kind), &[("q", q)])
            .await
    }

    // ========================================================================
    // Genealogy
    // ========================================================================

    /// GET /genealogy/
    pub async fn genealogy_home(&self) -> Response {
        self.get("/genealogy/").await
    }

    /// GET /genealogy/tree/{person_id}/
    pub async fn family_tree(&self, person_id: i64) -> Response {
        self.get(&format!("/genealogy/tree/{}/", person_id)).await
    }

    /// GET /genealogy/api/tree/{person_id}/
    pub async fn family_tree_api(&self, person_id: i64) -> Response {
        self.get(&format!("/genealogy/api/tree/{}/", person_id))
            .await
    }

    /// GET /genealogy/person/{person_id}/biography/
    pub async fn biography(&self, person_id: i64) -> Response {
        self.get(&format!("/genealogy/person/{}/biography/", person_id))
            .await
    }

    /// POST /genealogy/person/{person_id}/edit/
    pub async fn edit_person(&self, person_id: i64, body: &Value) -> Response {
        self.post_json(&format!("/genealogy/person/{}/edit/", person_id), body)
            .await
    }

    /// POST /genealogy/person/{person_id}/biography/edit/
    pub async fn edit_biography(&self, person_id: i64, notes: &str) -> Response {
        self.post_json(
            &format!("/genealogy/person/{}/biography/edit/", person_id),
            &json!({ "notes": notes }),
        )
        .await
    }

    /// GET /genealogy/api/search-people/?q=
    pub async fn relationship_candidates(&self, q: &str) -> Response {
        self.get_query("/genealogy/api/search-people/", &[("q", q)])
            .await
    }
}
