use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::{ACCEPT, AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::response::IntoResponse;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::jwt::{AuthError, JwtService, SessionClaims};
use crate::db::{Crud, DatabasePool, RecordRef};
use crate::handlers::errors::{has_error_page, render_error};
use crate::models::User;

#[derive(Clone)]
pub struct AuthState {
    pub jwt_service: Arc<JwtService>,
    pub pool: DatabasePool,
}

/// The logged-in user. The token from a bearer header or the session
/// cookie names the account; the flags come from its current row.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i32,
    pub username: String,
    pub is_admin: bool,
}

/// A logged-in user with the admin flag set.
#[derive(Debug, Clone)]
pub struct AdminUser(pub CurrentUser);

#[derive(Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

/// Rejection for the auth extractors. Browsers asking for HTML get the
/// rendered error page; API clients get JSON.
#[derive(Debug)]
pub struct AuthRejection {
    pub status: StatusCode,
    pub message: String,
    pub html: bool,
}

impl AuthRejection {
    fn new(parts: &Parts, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            html: wants_html(parts),
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        if self.html && has_error_page(self.status) {
            render_error(self.status)
        } else {
            (
                self.status,
                Json(ErrorResponse {
                    message: self.message,
                }),
            )
                .into_response()
        }
    }
}

fn wants_html(parts: &Parts) -> bool {
    parts
        .headers
        .get(ACCEPT)
        .and_then(|value| value.to_str().ok())
        .map(|accept| accept.contains("text/html"))
        .unwrap_or(false)
}

fn session_token(parts: &Parts) -> Result<&str, &'static str> {
    if let Some(auth_header) = parts.headers.get(AUTHORIZATION) {
        let auth_header = auth_header
            .to_str()
            .map_err(|_| "Invalid authorization header format")?;
        return JwtService::extract_token_from_header(auth_header)
            .map_err(|_| "Invalid authorization header format");
    }

    parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(JwtService::extract_token_from_cookie)
        .ok_or("Missing authorization header or session cookie")
}

fn session_claims(parts: &Parts) -> Result<SessionClaims, AuthRejection> {
    let token = session_token(parts)
        .map_err(|message| AuthRejection::new(parts, StatusCode::UNAUTHORIZED, message))?;

    // Get JWT service from extensions (set by middleware)
    let jwt_service = parts.extensions.get::<Arc<JwtService>>().ok_or_else(|| {
        AuthRejection::new(
            parts,
            StatusCode::INTERNAL_SERVER_ERROR,
            "JWT service not available",
        )
    })?;

    jwt_service.validate_session_token(token).map_err(|e| {
        let message = match e {
            AuthError::TokenExpired => "Session expired, please log in again".to_string(),
            other => format!("Token validation failed: {other}"),
        };
        AuthRejection::new(parts, StatusCode::UNAUTHORIZED, message)
    })
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = session_claims(parts)?;

        let pool = parts
            .extensions
            .get::<DatabasePool>()
            .cloned()
            .ok_or_else(|| {
                AuthRejection::new(
                    parts,
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database pool not available",
                )
            })?;

        let user = User::get_by_id(&pool, RecordRef::from(claims.uid))
            .await
            .map_err(|e| {
                tracing::error!("Failed to load user {}: {}", claims.uid, e);
                AuthRejection::new(
                    parts,
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to load user",
                )
            })?;

        match user {
            Some(user) if user.active => Ok(CurrentUser {
                id: claims.uid,
                username: user.username,
                is_admin: user.is_admin,
            }),
            _ => {
                tracing::warn!("Rejected session for inactive or deleted user {}", claims.uid);
                Err(AuthRejection::new(
                    parts,
                    StatusCode::UNAUTHORIZED,
                    "User account is not active",
                ))
            }
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            tracing::warn!("User {} tried to reach the admin panel", user.username);
            return Err(AuthRejection::new(
                parts,
                StatusCode::FORBIDDEN,
                "Admin privileges required",
            ));
        }
        Ok(AdminUser(user))
    }
}

// Middleware to inject JWT service into request extensions
pub async fn jwt_middleware(
    State(auth_state): State<AuthState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let extensions = request.extensions_mut();
    extensions.insert(auth_state.jwt_service.clone());
    extensions.insert(auth_state.pool.clone());

    next.run(request).await
}
