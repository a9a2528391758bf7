use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{about, health_check_handler, home, login, logout, register};
use crate::routes::AppState;

/// Pages and endpoints anyone can reach.
pub fn public_blueprint() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/about", get(about))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/health", get(health_check_handler))
}
