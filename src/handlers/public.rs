use axum::{
    extract::State,
    http::{header::SET_COOKIE, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use minijinja::context;
use serde::Serialize;
use sqlx::PgPool;

use crate::auth::JwtService;
use crate::handlers::errors::AppError;
use crate::models::{Apartment, LoginRequest, RegisterRequest, UserError};
use crate::routes::AppState;
use crate::services::{AuthServiceError, HOME_PAGE_KEY};
use crate::utils::responses::{helpers, ApiErrorResponse, ErrorCodes, ResponseBuilder};
use crate::utils::templates::render;

/// How many listings the home page shows.
pub const HOME_LISTING_LIMIT: i64 = 50;

/// GET /
pub async fn home(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let page = state
        .cache
        .get_or_render(HOME_PAGE_KEY, render_home(&state.pool))
        .await
        .map_err(|e| AppError::Internal(format!("Home page rendering failed: {e}")))?;

    Ok(Html(page))
}

async fn render_home(pool: &PgPool) -> Result<String, AppError> {
    tracing::debug!("Rendering home page");
    let apartments = Apartment::latest_active(pool, HOME_LISTING_LIMIT).await?;
    let rows: Vec<ApartmentRow> = apartments.iter().map(ApartmentRow::from).collect();

    Ok(render("home.html", context! { apartments => rows })?)
}

/// One home-page table row, formatted for display.
#[derive(Debug, PartialEq, Serialize)]
struct ApartmentRow {
    url: String,
    title: String,
    neighborhood: String,
    cost: String,
    size: String,
    availability: String,
}

impl From<&Apartment> for ApartmentRow {
    fn from(apartment: &Apartment) -> Self {
        let cell = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());

        Self {
            url: apartment.url.clone(),
            title: apartment.title.clone().unwrap_or_else(|| apartment.url.clone()),
            neighborhood: cell(apartment.neighborhood.clone()),
            cost: cell(apartment.monthly_cost().map(|cost| format!("{cost:.0} €"))),
            size: cell(apartment.size.map(|size| format!("{size:.0} m²"))),
            availability: cell(
                apartment
                    .availability
                    .map(|date| date.format("%d/%m/%Y").to_string()),
            ),
        }
    }
}

/// GET /about
pub async fn about(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let page = render(
        "about.html",
        context! { app_name => state.config.app_name.as_str() },
    )?;
    Ok(Html(page))
}

/// Handle user registration
/// POST /register
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Response, (StatusCode, Json<ApiErrorResponse>)> {
    tracing::info!("Registration attempt for username: {}", request.username);

    match state.auth_service.register_user(request).await {
        Ok(response) => {
            tracing::info!("Registration successful for user {}", response.user.id);
            let cookie = JwtService::session_cookie(&response.token);
            Ok(([(SET_COOKIE, cookie)], helpers::created(response)).into_response())
        }
        Err(AuthServiceError::UserError(UserError::Validation(errors))) => {
            tracing::warn!("Registration failed: invalid form");
            Err(ResponseBuilder::validation_error(errors.into_field_errors()))
        }
        Err(AuthServiceError::UserError(
            e @ (UserError::UsernameTaken | UserError::EmailTaken),
        )) => {
            tracing::warn!("Registration failed: {}", e);
            Err(ResponseBuilder::conflict(e.to_string()))
        }
        Err(e) => {
            tracing::error!("Registration failed with error: {}", e);
            Err(ResponseBuilder::internal_server_error(Some(
                "Registration failed".to_string(),
            )))
        }
    }
}

/// Handle user login; the token is returned and also set as the session cookie
/// POST /login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Response, (StatusCode, Json<ApiErrorResponse>)> {
    tracing::info!("Login attempt for username: {}", request.username);

    match state.auth_service.login_user(request).await {
        Ok(response) => {
            tracing::info!("Login successful for user {}", response.user.id);
            let cookie = JwtService::session_cookie(&response.token);
            Ok(([(SET_COOKIE, cookie)], ResponseBuilder::success(response)).into_response())
        }
        Err(AuthServiceError::UserError(
            UserError::UserNotFound | UserError::PasswordVerificationFailed,
        )) => {
            tracing::warn!("Login failed: invalid credentials");
            Err(ResponseBuilder::error(
                StatusCode::UNAUTHORIZED,
                ErrorCodes::AUTHENTICATION_FAILED,
                "Invalid username or password".to_string(),
            ))
        }
        Err(AuthServiceError::UserError(UserError::Inactive)) => {
            tracing::warn!("Login failed: account inactive");
            Err(ResponseBuilder::error(
                StatusCode::FORBIDDEN,
                ErrorCodes::AUTHENTICATION_FAILED,
                "User account is not active".to_string(),
            ))
        }
        Err(e) => {
            tracing::error!("Login failed with error: {}", e);
            Err(ResponseBuilder::internal_server_error(Some(
                "Login failed".to_string(),
            )))
        }
    }
}

/// GET /logout
pub async fn logout() -> impl IntoResponse {
    (
        [(SET_COOKIE, JwtService::clear_session_cookie())],
        Redirect::to("/"),
    )
}
