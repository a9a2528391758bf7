use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;

use crate::auth::jwt::SESSION_TTL_SECONDS;
use crate::auth::{AuthError, JwtService};
use crate::models::user::{LoginRequest, RegisterRequest, User, UserError, UserResponse};

#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub expires_in: i64,
    pub token_type: String,
    pub user: UserResponse,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthServiceError {
    #[error("User error: {0}")]
    UserError(#[from] UserError),
    #[error("JWT error: {0}")]
    JwtError(#[from] AuthError),
}

pub struct AuthService {
    jwt_service: Arc<JwtService>,
    pool: PgPool,
}

impl AuthService {
    pub fn new(jwt_service: Arc<JwtService>, pool: PgPool) -> Self {
        Self { jwt_service, pool }
    }

    pub async fn register_user(
        &self,
        request: RegisterRequest,
    ) -> Result<AuthResponse, AuthServiceError> {
        let user = User::register(&self.pool, &request).await?;
        self.start_session(&user).await
    }

    pub async fn login_user(&self, request: LoginRequest) -> Result<AuthResponse, AuthServiceError> {
        let user = User::authenticate(&self.pool, &request.username, &request.password).await?;
        self.start_session(&user).await
    }

    async fn start_session(&self, user: &User) -> Result<AuthResponse, AuthServiceError> {
        let response = user.to_response(&self.pool).await?;
        let token =
            self.jwt_service
                .create_session_token(response.id, &user.username, user.is_admin)?;

        Ok(AuthResponse {
            token,
            expires_in: SESSION_TTL_SECONDS,
            token_type: "Bearer".to_string(),
            user: response,
        })
    }
}
