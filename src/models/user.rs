use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{FromRow, PgPool};
use std::sync::OnceLock;

use crate::auth::password::{hash_password, verify_password, PasswordError};
use crate::db::{ColumnDef, Crud, FieldValue, Model, ModelError, SqlType, Table};
use crate::models::role::Role;
use crate::utils::validation::{validators, ValidationErrors};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: Option<i32>,
    pub username: String,
    pub email: String,
    pub password: Option<String>, // argon2 PHC string
    pub created_at: Option<DateTime<Utc>>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub active: bool,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub is_admin: bool,
    pub roles: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error("Password verification failed")]
    PasswordVerificationFailed,
    #[error("User not found")]
    UserNotFound,
    #[error("User account is not active")]
    Inactive,
    #[error("Username already registered")]
    UsernameTaken,
    #[error("Email already registered")]
    EmailTaken,
    #[error("Invalid registration data")]
    Validation(ValidationErrors),
}

impl Model for User {
    fn table() -> &'static Table {
        static TABLE: OnceLock<Table> = OnceLock::new();
        TABLE.get_or_init(|| {
            Table::with_surrogate_pk(
                "users",
                vec![
                    ColumnDef::new("username", SqlType::Varchar(80)).unique(),
                    ColumnDef::new("email", SqlType::Varchar(80)).unique(),
                    ColumnDef::new("password", SqlType::Text).nullable(),
                    ColumnDef::new("created_at", SqlType::Timestamp).default_sql("NOW()"),
                    ColumnDef::new("first_name", SqlType::Varchar(30)).nullable(),
                    ColumnDef::new("last_name", SqlType::Varchar(30)).nullable(),
                    ColumnDef::new("active", SqlType::Boolean).default_sql("FALSE"),
                    ColumnDef::new("is_admin", SqlType::Boolean).default_sql("FALSE"),
                ],
            )
        })
    }

    fn id(&self) -> Option<i32> {
        self.id
    }
}

impl Crud for User {}

impl User {
    /// Validates the form, hashes the password and stores an active user.
    pub async fn register(pool: &PgPool, request: &RegisterRequest) -> Result<User, UserError> {
        validators::validate_registration(
            &request.username,
            &request.email,
            &request.password,
            &request.confirm,
        )
        .map_err(UserError::Validation)?;

        if User::find_by(pool, "username", FieldValue::from(request.username.as_str()))
            .await?
            .is_some()
        {
            return Err(UserError::UsernameTaken);
        }

        if User::find_by(pool, "email", FieldValue::from(request.email.as_str()))
            .await?
            .is_some()
        {
            return Err(UserError::EmailTaken);
        }

        let password_hash = hash_password(&request.password)?;

        User::create(
            pool,
            json!({
                "username": request.username,
                "email": request.email,
                "password": password_hash,
                "active": true,
            }),
        )
        .await
        .map_err(|e| {
            // Lost a race with a concurrent registration
            if e.is_unique_violation() {
                taken_error(e.constraint())
            } else {
                UserError::Model(e)
            }
        })
    }

    pub async fn authenticate(
        pool: &PgPool,
        username: &str,
        password: &str,
    ) -> Result<User, UserError> {
        let user = User::find_by(pool, "username", FieldValue::from(username))
            .await?
            .ok_or(UserError::UserNotFound)?;

        if !user.check_password(password)? {
            return Err(UserError::PasswordVerificationFailed);
        }

        if !user.active {
            return Err(UserError::Inactive);
        }

        Ok(user)
    }

    /// Replaces the stored hash; call `save` to persist it.
    pub fn set_password(&mut self, password: &str) -> Result<(), UserError> {
        self.password = Some(hash_password(password)?);
        Ok(())
    }

    pub fn check_password(&self, password: &str) -> Result<bool, UserError> {
        match &self.password {
            Some(hash) => Ok(verify_password(password, hash)?),
            None => Ok(false),
        }
    }

    pub fn full_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(name), None) | (None, Some(name)) => name.clone(),
            (None, None) => self.username.clone(),
        }
    }

    pub async fn roles(&self, pool: &PgPool) -> Result<Vec<Role>, UserError> {
        let id = self.id.ok_or(ModelError::Unsaved)?;
        Ok(Role::filter_by(pool, "user_id", FieldValue::from(id)).await?)
    }

    pub async fn add_role(&self, pool: &PgPool, name: &str) -> Result<Role, UserError> {
        let id = self.id.ok_or(ModelError::Unsaved)?;
        Ok(Role::create(pool, json!({ "name": name, "user_id": id })).await?)
    }

    pub async fn to_response(&self, pool: &PgPool) -> Result<UserResponse, UserError> {
        let id = self.id.ok_or(ModelError::Unsaved)?;
        let roles = self.roles(pool).await?;

        Ok(UserResponse {
            id,
            username: self.username.clone(),
            email: self.email.clone(),
            full_name: self.full_name(),
            is_admin: self.is_admin,
            roles: roles.into_iter().map(|role| role.name).collect(),
            created_at: self.created_at,
        })
    }
}

/// Maps a unique violation on `users` to the field that collided.
fn taken_error(constraint: Option<&str>) -> UserError {
    match constraint {
        Some("users_email_key") => UserError::EmailTaken,
        _ => UserError::UsernameTaken,
    }
}
