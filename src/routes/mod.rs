pub mod public;
pub mod user;

use crate::auth::AuthState;
use crate::config::Config;
use crate::db::DatabasePool;
use crate::services::{AuthService, PageCache};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: DatabasePool,
    pub cache: PageCache,
    pub auth_service: Arc<AuthService>,
    pub auth_state: AuthState,
}

pub use public::public_blueprint;
pub use user::user_blueprint;
