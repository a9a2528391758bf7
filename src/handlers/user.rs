use axum::{extract::State, http::StatusCode, response::Html, Json};
use minijinja::context;

use crate::auth::CurrentUser;
use crate::db::{Crud, RecordRef};
use crate::handlers::errors::AppError;
use crate::models::{User, UserResponse};
use crate::routes::AppState;
use crate::utils::responses::{ApiErrorResponse, ApiResponse, ResponseBuilder};
use crate::utils::templates::render;

/// Members page
/// GET /users/
pub async fn members(
    current: CurrentUser,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    // The account may have been deleted since the token was issued
    let user = User::get_by_id(&state.pool, RecordRef::from(current.id))
        .await?
        .ok_or(AppError::Unauthorized)?;

    let roles: Vec<String> = user
        .roles(&state.pool)
        .await?
        .into_iter()
        .map(|role| role.name)
        .collect();

    let page = render(
        "members.html",
        context! {
            username => user.full_name(),
            email => user.email,
            roles => roles,
        },
    )?;
    Ok(Html(page))
}

/// Current user as JSON
/// GET /users/me
pub async fn me(
    current: CurrentUser,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), (StatusCode, Json<ApiErrorResponse>)> {
    let user = User::get_by_id(&state.pool, RecordRef::from(current.id))
        .await
        .map_err(|e| {
            tracing::error!("Failed to load user {}: {}", current.id, e);
            ResponseBuilder::internal_server_error(None)
        })?
        .ok_or_else(|| ResponseBuilder::not_found("User"))?;

    let response = user.to_response(&state.pool).await.map_err(|e| {
        tracing::error!("Failed to load roles for user {}: {}", current.id, e);
        ResponseBuilder::internal_server_error(None)
    })?;

    Ok(ResponseBuilder::success(response))
}
