use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::auth::AdminUser;
use crate::db::{Crud, ModelError, Page, RecordRef, SqlType};
use crate::routes::AppState;
use crate::utils::responses::{helpers, ErrorCodes, ResponseBuilder};

/// Something the admin panel can mount.
pub trait AdminView: Send + Sync {
    fn name(&self) -> &str;

    fn endpoint(&self) -> &str;

    /// Routes under `/admin/{endpoint}`.
    fn routes(&self) -> Router<AppState>;
}

/// CRUD views over one model.
///
/// `column_list` limits the columns shown in the list view (all columns
/// when empty); `column_searchable_list` picks the columns the `search`
/// parameter looks at (every text column when empty).
pub struct ModelView<M> {
    pub name: String,
    pub endpoint: String,
    pub column_list: Vec<&'static str>,
    pub column_searchable_list: Vec<&'static str>,
    pub page_size: u32,
    model: PhantomData<fn() -> M>,
}

impl<M> Clone for ModelView<M> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            endpoint: self.endpoint.clone(),
            column_list: self.column_list.clone(),
            column_searchable_list: self.column_searchable_list.clone(),
            page_size: self.page_size,
            model: PhantomData,
        }
    }
}

impl<M: Crud> ModelView<M> {
    pub const DEFAULT_PAGE_SIZE: u32 = 20;

    pub fn new(name: &str, endpoint: &str) -> Self {
        Self {
            name: name.to_string(),
            endpoint: endpoint.trim_matches('/').to_string(),
            column_list: Vec::new(),
            column_searchable_list: Vec::new(),
            page_size: Self::DEFAULT_PAGE_SIZE,
            model: PhantomData,
        }
    }

    pub fn column_list(mut self, columns: &[&'static str]) -> Self {
        self.column_list = Self::known_columns(columns);
        self
    }

    pub fn column_searchable_list(mut self, columns: &[&'static str]) -> Self {
        self.column_searchable_list = Self::known_columns(columns);
        self
    }

    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = size.clamp(1, Page::MAX_SIZE);
        self
    }

    fn known_columns(columns: &[&'static str]) -> Vec<&'static str> {
        let table = M::table();
        columns
            .iter()
            .copied()
            .filter(|name| {
                let known = table.column(name).is_some();
                if !known {
                    tracing::warn!("Ignoring unknown column '{}' on table '{}'", name, table.name);
                }
                known
            })
            .collect()
    }

    pub fn searchable_columns(&self) -> Vec<&'static str> {
        if !self.column_searchable_list.is_empty() {
            return self.column_searchable_list.clone();
        }
        M::table()
            .columns
            .iter()
            .filter(|column| matches!(column.sql_type, SqlType::Text | SqlType::Varchar(_)))
            .map(|column| column.name)
            .collect()
    }

    /// The record as the list view shows it. The primary key is always kept.
    pub fn project(&self, record: &M) -> Result<Value, ModelError> {
        let value = serde_json::to_value(record)?;
        if self.column_list.is_empty() {
            return Ok(value);
        }
        let Value::Object(mut all) = value else {
            return Err(ModelError::NotAnObject);
        };

        let pk = M::table().primary_key();
        let mut shown = Map::new();
        for name in std::iter::once(pk).chain(self.column_list.iter().copied()) {
            if let Some(value) = all.remove(name) {
                shown.insert(name.to_string(), value);
            }
        }
        Ok(Value::Object(shown))
    }
}

impl<M: Crud> AdminView for ModelView<M> {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn routes(&self) -> Router<AppState> {
        let base = format!("/admin/{}", self.endpoint);

        Router::new()
            .route(&base, get(list::<M>).post(create::<M>))
            .route(
                &format!("{base}/:id"),
                get(detail::<M>)
                    .put(update::<M>)
                    .patch(update::<M>)
                    .delete(delete::<M>),
            )
            .layer(Extension(Arc::new(self.clone())))
    }
}

#[derive(Debug)]
pub enum AdminError {
    NotFound(String),
    Model(ModelError),
}

impl From<ModelError> for AdminError {
    fn from(error: ModelError) -> Self {
        AdminError::Model(error)
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        match self {
            AdminError::NotFound(resource) => ResponseBuilder::not_found(&resource).into_response(),
            // Deleted between the lookup and the write
            AdminError::Model(ModelError::NotFound { table, .. }) => {
                ResponseBuilder::not_found(&table).into_response()
            }
            AdminError::Model(e) if e.is_validation() => ResponseBuilder::error(
                StatusCode::BAD_REQUEST,
                ErrorCodes::VALIDATION_ERROR,
                e.to_string(),
            )
            .into_response(),
            AdminError::Model(e) if e.is_unique_violation() => {
                ResponseBuilder::conflict("A record with these values already exists".to_string())
                    .into_response()
            }
            AdminError::Model(e) => {
                tracing::error!("Admin operation failed: {}", e);
                ResponseBuilder::internal_server_error(None).into_response()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub search: Option<String>,
    pub page: Option<u32>,
}

async fn find<M: Crud>(
    state: &AppState,
    view: &ModelView<M>,
    id: &str,
) -> Result<M, AdminError> {
    M::get_by_id(&state.pool, RecordRef::from(id))
        .await?
        .ok_or_else(|| AdminError::NotFound(view.name.clone()))
}

/// GET /admin/{endpoint}?search=..&page=..
async fn list<M: Crud>(
    _admin: AdminUser,
    State(state): State<AppState>,
    Extension(view): Extension<Arc<ModelView<M>>>,
    Query(params): Query<ListParams>,
) -> Result<Response, AdminError> {
    let page = Page::new(params.page.unwrap_or(1), view.page_size);
    let (records, total) = M::search(
        &state.pool,
        &view.searchable_columns(),
        params.search.as_deref(),
        page,
    )
    .await?;

    let items = records
        .iter()
        .map(|record| view.project(record))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ResponseBuilder::success(helpers::PaginatedResponse::new(
        items,
        total,
        page.number,
        page.size,
    ))
    .into_response())
}

/// GET /admin/{endpoint}/:id
async fn detail<M: Crud>(
    _admin: AdminUser,
    State(state): State<AppState>,
    Extension(view): Extension<Arc<ModelView<M>>>,
    Path(id): Path<String>,
) -> Result<Response, AdminError> {
    let record = find::<M>(&state, &view, &id).await?;
    Ok(ResponseBuilder::success(record).into_response())
}

/// POST /admin/{endpoint}
async fn create<M: Crud>(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Extension(view): Extension<Arc<ModelView<M>>>,
    Json(fields): Json<Value>,
) -> Result<Response, AdminError> {
    let record = M::create(&state.pool, fields).await?;
    state.cache.invalidate_all();

    tracing::info!(
        admin = %admin.username,
        id = ?record.id(),
        "{} created",
        view.name
    );
    Ok(helpers::created(record).into_response())
}

/// PUT/PATCH /admin/{endpoint}/:id
async fn update<M: Crud>(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Extension(view): Extension<Arc<ModelView<M>>>,
    Path(id): Path<String>,
    Json(changes): Json<Value>,
) -> Result<Response, AdminError> {
    let mut record = find::<M>(&state, &view, &id).await?;
    record.update(&state.pool, changes).await?;
    state.cache.invalidate_all();

    tracing::info!(admin = %admin.username, %id, "{} updated", view.name);
    Ok(helpers::updated(record).into_response())
}

/// DELETE /admin/{endpoint}/:id
async fn delete<M: Crud>(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Extension(view): Extension<Arc<ModelView<M>>>,
    Path(id): Path<String>,
) -> Result<Response, AdminError> {
    let record = find::<M>(&state, &view, &id).await?;
    let deleted_id = record.id();
    record.delete(&state.pool).await?;
    state.cache.invalidate_all();

    tracing::info!(admin = %admin.username, %id, "{} deleted", view.name);
    Ok(ResponseBuilder::success_with_message(
        json!({ "id": deleted_id }),
        format!("{} deleted", view.name),
    )
    .into_response())
}
