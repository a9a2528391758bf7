use axum::{routing::get, Router};

use crate::handlers::{members, me};
use crate::routes::AppState;

/// Routes for logged-in users, mounted under `/users`.
pub fn user_blueprint() -> Router<AppState> {
    Router::new()
        .route("/users/", get(members))
        .route("/users/me", get(me))
}
