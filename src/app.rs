//! Application factory.
//!
//! `create_app` builds the router at call time: extensions first (pool,
//! migrations, login manager, cache, admin), then the blueprints, then
//! the error handlers.

use axum::{middleware, Router};
use std::path::Path;
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::admin::{Admin, ModelView};
use crate::auth::{jwt_middleware, AuthState, JwtService};
use crate::config::Config;
use crate::db::{create_connection_pool, run_migrations, DatabaseError, DatabasePool};
use crate::handlers::{handler_404, render_error_pages};
use crate::models::{Apartment, Pin};
use crate::routes::{public_blueprint, user_blueprint, AppState};
use crate::services::{AuthService, PageCache};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Builds the whole application from `config`.
pub async fn create_app(config: Config) -> Result<Router, StartupError> {
    let state = register_extensions(config).await?;
    Ok(create_router(state))
}

/// Connects the database, applies migrations when enabled and assembles
/// the shared state.
pub async fn register_extensions(config: Config) -> Result<AppState, StartupError> {
    if !config.static_dir.is_dir() {
        tracing::warn!(
            "Static directory {} does not exist",
            config.static_dir.display()
        );
    }

    let pool = create_connection_pool(&config).await?;

    if config.run_migrations {
        run_migrations(&pool).await?;
    } else {
        tracing::info!("Skipping database migrations");
    }

    Ok(build_state(config, pool))
}

/// Shared state over an existing pool. Tests pass a lazily connected one.
pub fn build_state(config: Config, pool: DatabasePool) -> AppState {
    let cache = PageCache::new(config.cache_ttl);
    let jwt_service = Arc::new(JwtService::new(&config.secret_key));
    let auth_service = Arc::new(AuthService::new(jwt_service.clone(), pool.clone()));
    let auth_state = AuthState {
        jwt_service,
        pool: pool.clone(),
    };

    AppState {
        config: Arc::new(config),
        pool,
        cache,
        auth_service,
        auth_state,
    }
}

/// Admin panel with one view per managed model.
pub fn register_admin(name: &str) -> Admin {
    Admin::new(name)
        .add_view(
            ModelView::<Apartment>::new("Apartment", "apartment")
                .column_list(&[
                    "title",
                    "neighborhood",
                    "warm_rent",
                    "size",
                    "rooms",
                    "availability",
                    "active",
                ])
                .column_searchable_list(&["title", "address", "neighborhood", "description"]),
        )
        .add_view(
            ModelView::<Pin>::new("Pin", "pin")
                .column_list(&["name", "address", "active"])
                .column_searchable_list(&["name", "address"]),
        )
}

pub fn register_blueprints(router: Router<AppState>) -> Router<AppState> {
    router.merge(public_blueprint()).merge(user_blueprint())
}

pub fn register_assets(router: Router<AppState>, static_dir: &Path) -> Router<AppState> {
    router.nest_service("/static", ServeDir::new(static_dir))
}

/// Unmatched routes, panics and bare 401/404/500 responses all end up as
/// rendered error pages.
pub fn register_errorhandlers(router: Router<AppState>) -> Router<AppState> {
    router
        .fallback(handler_404)
        .layer(CatchPanicLayer::new())
        .layer(middleware::map_response(render_error_pages))
}

pub fn create_router(state: AppState) -> Router {
    let admin = register_admin(&state.config.app_name);

    let router = register_blueprints(Router::new()).merge(admin.router());
    let router = register_assets(router, &state.config.static_dir);
    let router = register_errorhandlers(router).layer(middleware::from_fn_with_state(
        state.auth_state.clone(),
        jwt_middleware,
    ));

    // Verbose request tracing stands in for a debug toolbar in development
    let router = if state.config.is_debug() {
        router.layer(
            TraceLayer::new_for_http()
                .make_span_with(
                    DefaultMakeSpan::new()
                        .level(Level::DEBUG)
                        .include_headers(true),
                )
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
    } else {
        router.layer(TraceLayer::new_for_http())
    };

    router
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
