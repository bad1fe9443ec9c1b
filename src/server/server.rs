use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::catalog_store::{CatalogCounts, CatalogStore};
use crate::user::UserManager;
use tower_http::services::ServeDir;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::api_error::JsonBody;
use super::catalog_routes::make_catalog_routes;
use super::directory_routes::make_directory_routes;
use super::genealogy_routes::make_genealogy_routes;
use super::session::{expired_session_cookie, session_cookie, Session};
use super::{log_requests, state::*, ServerConfig};
use crate::user::auth::AuthTokenValue;

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub counts: CatalogCounts,
    pub session_token: Option<String>,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize)]
struct LoginBody {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for LoginBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginBody")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct LoginSuccessResponse {
    token: String,
}

#[derive(Deserialize, Debug, Default)]
struct LoginPageQuery {
    #[serde(default)]
    next: String,
}

async fn home(session: Option<Session>, State(state): State<ServerState>) -> Response {
    let counts = match state.catalog_store.counts() {
        Ok(counts) => counts,
        Err(err) => {
            error!("Failed to count catalog rows: {}", err);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        counts,
        session_token: session.map(|s| s.token),
    };
    Json(stats).into_response()
}

async fn login_page(Query(query): Query<LoginPageQuery>) -> impl IntoResponse {
    Json(json!({ "login_required": true, "next": query.next }))
}

async fn login(
    State(user_manager): State<GuardedUserManager>,
    JsonBody(body): JsonBody<LoginBody>,
) -> Response {
    debug!("login() called with {:?}", body);
    let mut locked_manager = user_manager.lock().unwrap();
    match locked_manager.login(&body.username, &body.password) {
        Ok(Some(auth_token)) => {
            info!("User {} logged in", body.username);
            let response_body = LoginSuccessResponse {
                token: auth_token.value.0.clone(),
            };
            (
                StatusCode::CREATED,
                [(header::SET_COOKIE, session_cookie(&auth_token.value.0))],
                Json(response_body),
            )
                .into_response()
        }
        Ok(None) => StatusCode::FORBIDDEN.into_response(),
        Err(err) => {
            error!("Error with auth token generation: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn logout(State(user_manager): State<GuardedUserManager>, session: Session) -> Response {
    let mut locked_manager = user_manager.lock().unwrap();
    match locked_manager.delete_auth_token(&session.user_id, &AuthTokenValue(session.token)) {
        Ok(()) => (
            StatusCode::OK,
            [(header::SET_COOKIE, expired_session_cookie())],
        )
            .into_response(),
        Err(err) => {
            debug!("Logout failed: {}", err);
            StatusCode::BAD_REQUEST.into_response()
        }
    }
}

pub fn make_app(
    config: ServerConfig,
    catalog_store: Arc<dyn CatalogStore>,
    user_manager: UserManager,
) -> Router {
    let state = ServerState::new(config.clone(), catalog_store, user_manager);

    let auth_routes: Router<ServerState> = Router::new()
        .route("/accounts/login/", get(login_page).post(login))
        .route("/accounts/logout/", post(logout));

    let api_routes: Router<ServerState> = auth_routes
        .merge(make_catalog_routes())
        .merge(make_directory_routes())
        .merge(make_genealogy_routes());

    let home_router: Router<ServerState> = match config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new().route("/", get(home)),
    };

    home_router
        .merge(api_routes)
        .layer(middleware::from_fn_with_state(state.clone(), log_requests))
        .with_state(state)
}

pub async fn run_server(
    config: ServerConfig,
    catalog_store: Arc<dyn CatalogStore>,
    user_manager: UserManager,
) -> Result<()> {
    let port = config.port;
    let app = make_app(config, catalog_store, user_manager);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    info!("Serving catalog on port {}", port);

    Ok(axum::serve(listener, app).await?)
}
