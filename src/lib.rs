pub mod admin;
pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

pub use app::{build_state, create_app, create_router, StartupError};
pub use config::{Config, Environment};
pub use db::{create_connection_pool, run_migrations, DatabasePool};
pub use routes::AppState;
