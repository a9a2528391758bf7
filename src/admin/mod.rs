//! Admin panel: JSON CRUD endpoints for registered models under `/admin`.

pub mod view;

use axum::{http::StatusCode, routing::get, Extension, Json, Router};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::AdminUser;
use crate::routes::AppState;
use crate::utils::responses::{ApiResponse, ResponseBuilder};

pub use view::{AdminError, AdminView, ListParams, ModelView};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewSummary {
    pub name: String,
    pub endpoint: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminIndex {
    pub name: String,
    pub views: Vec<ViewSummary>,
}

pub struct Admin {
    name: String,
    views: Vec<Box<dyn AdminView>>,
}

impl Admin {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            views: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers a view. A second view on an endpoint that is already
    /// taken is skipped.
    pub fn add_view<V: AdminView + 'static>(mut self, view: V) -> Self {
        if self.views.iter().any(|v| v.endpoint() == view.endpoint()) {
            tracing::warn!(
                "Admin endpoint '{}' is already registered, skipping view '{}'",
                view.endpoint(),
                view.name()
            );
            return self;
        }

        tracing::debug!("Admin view '{}' at /admin/{}", view.name(), view.endpoint());
        self.views.push(Box::new(view));
        self
    }

    pub fn index(&self) -> AdminIndex {
        AdminIndex {
            name: self.name.clone(),
            views: self
                .views
                .iter()
                .map(|view| ViewSummary {
                    name: view.name().to_string(),
                    endpoint: view.endpoint().to_string(),
                    url: format!("/admin/{}", view.endpoint()),
                })
                .collect(),
        }
    }

    pub fn router(&self) -> Router<AppState> {
        let mut router = Router::new()
            .route("/admin", get(admin_index))
            .route("/admin/", get(admin_index))
            .layer(Extension(Arc::new(self.index())));

        for view in &self.views {
            router = router.merge(view.routes());
        }
        router
    }
}

/// GET /admin/
async fn admin_index(
    _admin: AdminUser,
    Extension(index): Extension<Arc<AdminIndex>>,
) -> (StatusCode, Json<ApiResponse<AdminIndex>>) {
    ResponseBuilder::success(index.as_ref().clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Apartment, Pin};

    #[test]
    fn test_index_lists_views_in_order() {
        let admin = Admin::new("Tegenaria")
            .add_view(ModelView::<Apartment>::new("Apartment", "apartment"))
            .add_view(ModelView::<Pin>::new("Pin", "pin"));

        let index = admin.index();
        assert_eq!(index.name, "Tegenaria");
        assert_eq!(
            index.views,
            vec![
                ViewSummary {
                    name: "Apartment".to_string(),
                    endpoint: "apartment".to_string(),
                    url: "/admin/apartment".to_string(),
                },
                ViewSummary {
                    name: "Pin".to_string(),
                    endpoint: "pin".to_string(),
                    url: "/admin/pin".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_duplicate_endpoint_is_skipped() {
        let admin = Admin::new("Tegenaria")
            .add_view(ModelView::<Pin>::new("Pin", "pin"))
            .add_view(ModelView::<Apartment>::new("Other", "pin"));

        assert_eq!(admin.index().views.len(), 1);
        assert_eq!(admin.index().views[0].name, "Pin");
    }
}
