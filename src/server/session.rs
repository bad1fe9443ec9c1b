use super::state::ServerState;
use crate::user::auth::AuthTokenValue;

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde_json::json;
use std::convert::Infallible;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: usize,
    pub token: String,
    pub is_staff: bool,
}

pub const COOKIE_SESSION_TOKEN_KEY: &str = "session_token";
pub const HEADER_SESSION_TOKEN_KEY: &str = "Authorization";
pub const LOGIN_PATH: &str = "/accounts/login/";

pub enum SessionExtractionError {
    AccessDenied,
    LoginRedirect(String),
    PermissionDenied,
}

impl IntoResponse for SessionExtractionError {
    fn into_response(self) -> Response {
        match self {
            SessionExtractionError::AccessDenied => StatusCode::FORBIDDEN.into_response(),
            SessionExtractionError::LoginRedirect(next) => (
                StatusCode::FOUND,
                [(header::LOCATION, login_redirect_target(&next))],
            )
                .into_response(),
            SessionExtractionError::PermissionDenied => (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "Permission denied" })),
            )
                .into_response(),
        }
    }
}

/// `/accounts/login/?next=<path>`
pub fn login_redirect_target(next: &str) -> String {
    format!("{}?next={}", LOGIN_PATH, urlencoding::encode(next))
}

fn extract_session_token_from_cookies(parts: &Parts) -> Option<String> {
    CookieJar::from_headers(&parts.headers)
        .get(COOKIE_SESSION_TOKEN_KEY)
        .map(Cookie::value)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn extract_session_token_from_headers(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(HEADER_SESSION_TOKEN_KEY)
        .map(|v| v.as_bytes().to_owned())
        .map(|b| String::from_utf8_lossy(&b).into_owned())
        .map(|s| s.trim_start_matches("Bearer ").to_string())
}

fn extract_session_from_request_parts(parts: &Parts, ctx: &ServerState) -> Option<Session> {
    let token = match extract_session_token_from_cookies(parts)
        .or_else(|| extract_session_token_from_headers(parts))
    {
        None => {
            debug!("No token in cookies nor headers.");
            return None;
        }
        Some(x) => x,
    };

    let user_manager = ctx.user_manager.lock().unwrap();
    let auth_token_value = AuthTokenValue(token);
    let auth_token = match user_manager.get_auth_token(&auth_token_value) {
        Ok(Some(token)) => {
            if let Err(e) = user_manager.update_auth_token_last_used(&auth_token_value) {
                debug!("Failed to update auth token last_used timestamp: {}", e);
            }
            token
        }
        Ok(None) => {
            debug!("Auth token not found in database");
            return None;
        }
        Err(e) => {
            debug!("Failed to get auth token from database: {}", e);
            return None;
        }
    };

    let is_staff = match user_manager.is_staff(auth_token.user_id) {
        Ok(is_staff) => is_staff,
        Err(e) => {
            debug!("Failed to resolve user {}: {}", auth_token.user_id, e);
            return None;
        }
    };

    Some(Session {
        user_id: auth_token.user_id,
        token: auth_token.value.0,
        is_staff,
    })
}

impl FromRequestParts<ServerState> for Session {
    type Rejection = SessionExtractionError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        extract_session_from_request_parts(parts, ctx).ok_or(SessionExtractionError::AccessDenied)
    }
}

impl OptionalFromRequestParts<ServerState> for Session {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(extract_session_from_request_parts(parts, ctx))
    }
}

/// Any logged-in user. Anonymous requests are redirected to the login page.
#[derive(Debug)]
pub struct LoginRequired(pub Session);

impl FromRequestParts<ServerState> for LoginRequired {
    type Rejection = SessionExtractionError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        extract_session_from_request_parts(parts, ctx)
            .map(LoginRequired)
            .ok_or_else(|| {
                let next = parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str().to_string())
                    .unwrap_or_else(|| parts.uri.path().to_string());
                SessionExtractionError::LoginRedirect(next)
            })
    }
}

/// Staff users only. Anonymous and non-staff requests get the same 403.
#[derive(Debug)]
pub struct StaffSession(pub Session);

impl FromRequestParts<ServerState> for StaffSession {
    type Rejection = SessionExtractionError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        match extract_session_from_request_parts(parts, ctx) {
            Some(session) if session.is_staff => Ok(StaffSession(session)),
            _ => Err(SessionExtractionError::PermissionDenied),
        }
    }
}

/// `Set-Cookie` value for a fresh session token.
pub fn session_cookie(token: &str) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", COOKIE_SESSION_TOKEN_KEY, token)
}

/// `Set-Cookie` value that removes the session cookie.
pub fn expired_session_cookie() -> String {
    Cookie::build(Cookie::new(COOKIE_SESSION_TOKEN_KEY, ""))
        .path("/")
        .expires(time::OffsetDateTime::now_utc() - time::Duration::days(1))
        .same_site(axum_extra::extract::cookie::SameSite::Lax)
        .build()
        .to_string()
}
