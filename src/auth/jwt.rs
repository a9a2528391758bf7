use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ISSUER: &str = "tegenaria";
pub const SESSION_COOKIE: &str = "session";
pub const SESSION_TTL_SECONDS: i64 = 7200;

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub iss: String,
    pub sub: String, // username
    pub uid: i32,
    pub adm: bool,
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("JWT token creation failed: {0}")]
    TokenCreationFailed(#[from] jsonwebtoken::errors::Error),
    #[error("JWT token validation failed: {0}")]
    TokenValidationFailed(String),
    #[error("Token expired")]
    TokenExpired,
    #[error("Invalid authorization header format")]
    InvalidAuthHeaderFormat,
}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn create_session_token(
        &self,
        user_id: i32,
        username: &str,
        is_admin: bool,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = SessionClaims {
            iss: ISSUER.to_string(),
            sub: username.to_string(),
            uid: user_id,
            adm: is_admin,
            jti: Uuid::new_v4().to_string(),
            exp: (now + Duration::seconds(SESSION_TTL_SECONDS)).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(AuthError::from)
    }

    pub fn validate_session_token(&self, token: &str) -> Result<SessionClaims, AuthError> {
        let validation = Validation::default();

        match decode::<SessionClaims>(token, &self.decoding_key, &validation) {
            Ok(token_data) => {
                let now = Utc::now().timestamp();
                if token_data.claims.exp < now {
                    return Err(AuthError::TokenExpired);
                }

                if token_data.claims.iss != ISSUER {
                    return Err(AuthError::TokenValidationFailed(
                        "Invalid issuer".to_string(),
                    ));
                }

                Ok(token_data.claims)
            }
            Err(e) => match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => Err(AuthError::TokenExpired),
                _ => Err(AuthError::TokenValidationFailed(e.to_string())),
            },
        }
    }

    pub fn extract_token_from_header(auth_header: &str) -> Result<&str, AuthError> {
        if let Some(token) = auth_header.strip_prefix("Bearer ") {
            Ok(token)
        } else {
            Err(AuthError::InvalidAuthHeaderFormat)
        }
    }

    /// Finds the session token in a `Cookie` header.
    pub fn extract_token_from_cookie(cookie_header: &str) -> Option<&str> {
        cookie_header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == SESSION_COOKIE)
            .map(|(_, value)| value)
            .filter(|value| !value.is_empty())
    }

    pub fn session_cookie(token: &str) -> String {
        format!(
            "{SESSION_COOKIE}={token}; HttpOnly; Path=/; SameSite=Lax; Max-Age={SESSION_TTL_SECONDS}"
        )
    }

    pub fn clear_session_cookie() -> String {
        format!("{SESSION_COOKIE}=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0")
    }
}
