//! End-to-end flows through the router against PostgreSQL. They return
//! early when `DATABASE_URL` is not set.

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::sync::OnceCell;
use tower::ServiceExt;
use uuid::Uuid;

use tegenaria::db::{create_all, Crud, FieldValue};
use tegenaria::models::{all_tables, User};
use tegenaria::{build_state, create_router, Config};

const SECRET: &str = "test-secret-key-that-is-long-enough-32chars";

static SCHEMA: OnceCell<()> = OnceCell::const_new();

async fn setup_test_environment() -> Option<(Router, PgPool)> {
    let database_url = std::env::var("DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to create test database pool");

    SCHEMA
        .get_or_init(|| async {
            create_all(&pool, &all_tables())
                .await
                .expect("Failed to create tables");
        })
        .await;

    let config = Config::for_tests(&database_url, SECRET);
    let app = create_router(build_state(config, pool.clone()));
    Some((app, pool))
}

fn unique_name() -> String {
    format!("u{}", &Uuid::new_v4().simple().to_string()[..12])
}

fn json_request(method: Method, uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn authed_get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn register(app: &Router, username: &str) -> Response {
    let body = json!({
        "username": username,
        "email": format!("{username}@example.com"),
        "password": "secret1",
        "confirm": "secret1"
    });
    app.clone()
        .oneshot(json_request(Method::POST, "/register", body, None))
        .await
        .unwrap()
}

async fn login(app: &Router, username: &str, password: &str) -> Response {
    let body = json!({ "username": username, "password": password });
    app.clone()
        .oneshot(json_request(Method::POST, "/login", body, None))
        .await
        .unwrap()
}

/// Registers a user, flags it as admin and returns a fresh session token
/// with the stored account.
async fn admin_session(app: &Router, pool: &PgPool) -> (String, User) {
    let username = unique_name();
    assert_eq!(register(app, &username).await.status(), StatusCode::CREATED);

    let mut user = User::find_by(pool, "username", FieldValue::from(username.as_str()))
        .await
        .unwrap()
        .unwrap();
    user.update(pool, json!({ "is_admin": true })).await.unwrap();

    let response = login(app, &username, "secret1").await;
    let token = body_json(response).await["data"]["token"]
        .as_str()
        .unwrap()
        .to_string();
    (token, user)
}

async fn admin_token(app: &Router, pool: &PgPool) -> String {
    admin_session(app, pool).await.0
}

#[tokio::test]
async fn test_register_sets_session_cookie() {
    let Some((app, _pool)) = setup_test_environment().await else {
        return;
    };
    let username = unique_name();

    let response = register(&app, &username).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("session="));
    assert!(cookie.contains("HttpOnly"));

    let body = body_json(response).await;
    assert_eq!(body["data"]["user"]["username"], username.as_str());
    assert_eq!(body["data"]["expires_in"], 7200);

    // Same username again
    let response = register(&app, &username).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_register_validation_errors() {
    let Some((app, _pool)) = setup_test_environment().await else {
        return;
    };

    let body = json!({
        "username": "ab",
        "email": "not-an-email",
        "password": "secret1",
        "confirm": "secret2"
    });
    let response = app
        .oneshot(json_request(Method::POST, "/register", body, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    let field_errors = &body["error"]["field_errors"];
    assert!(field_errors.get("username").is_some());
    assert!(field_errors.get("email").is_some());
    assert!(field_errors.get("confirm").is_some());
}

#[tokio::test]
async fn test_login_and_members_pages() {
    let Some((app, _pool)) = setup_test_environment().await else {
        return;
    };
    let username = unique_name();
    register(&app, &username).await;

    let response = login(&app, &username, "wrong-password").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"]["code"], "AUTHENTICATION_FAILED");

    let response = login(&app, &username, "secret1").await;
    assert_eq!(response.status(), StatusCode::OK);
    let token = body_json(response).await["data"]["token"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app.clone().oneshot(authed_get("/users/me", &token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["username"], username.as_str());
    assert_eq!(body["data"]["is_admin"], false);

    // The browser path uses the cookie
    let request = Request::builder()
        .uri("/users/")
        .header(header::COOKIE, format!("session={token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response).await;
    assert!(page.contains(&format!("Welcome {username}")));
    assert!(page.contains("No roles yet"));

    // Regular users stay out of the admin panel
    let response = app.clone().oneshot(authed_get("/admin/pin", &token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["message"], "Admin privileges required");

    // 403 has no error page, even for browsers
    let request = Request::builder()
        .uri("/admin/pin")
        .header(header::ACCEPT, "text/html")
        .header(header::COOKIE, format!("session={token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("application/json"));
}

#[tokio::test]
async fn test_admin_index_and_bad_ids() {
    let Some((app, pool)) = setup_test_environment().await else {
        return;
    };
    let token = admin_token(&app, &pool).await;

    let response = app.clone().oneshot(authed_get("/admin/", &token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["name"], "Tegenaria");
    let endpoints: Vec<&str> = body["data"]["views"]
        .as_array()
        .unwrap()
        .iter()
        .map(|view| view["endpoint"].as_str().unwrap())
        .collect();
    assert_eq!(endpoints, vec!["apartment", "pin"]);

    let response = app
        .oneshot(authed_get("/admin/apartment/abc", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "RESOURCE_NOT_FOUND");
    assert_eq!(body["error"]["message"], "Apartment not found");
}

#[tokio::test]
async fn test_account_changes_apply_to_open_sessions() {
    let Some((app, pool)) = setup_test_environment().await else {
        return;
    };
    let (token, mut user) = admin_session(&app, &pool).await;

    let response = app.clone().oneshot(authed_get("/admin/pin", &token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Admin rights removed: the same token is now a regular user
    user.update(&pool, json!({ "is_admin": false })).await.unwrap();
    let response = app.clone().oneshot(authed_get("/admin/pin", &token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Deactivated: not logged in at all
    user.update(&pool, json!({ "active": false })).await.unwrap();
    let response = app.clone().oneshot(authed_get("/users/me", &token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["message"], "User account is not active");

    // Deleted admin cannot write
    user.update(&pool, json!({ "is_admin": true, "active": true }))
        .await
        .unwrap();
    user.delete(&pool).await.unwrap();
    let response = app
        .oneshot(json_request(
            Method::POST,
            "/admin/pin",
            json!({ "address": format!("Gone {}", Uuid::new_v4()) }),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_crud_for_pins() {
    let Some((app, pool)) = setup_test_environment().await else {
        return;
    };
    let token = admin_token(&app, &pool).await;
    let address = format!("Kastanienallee {}", Uuid::new_v4());

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/admin/pin",
            json!({ "address": address, "name": "Work" }),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = body_json(response).await["data"]["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(authed_get(
            &format!("/admin/pin?search={}", urlencoding::encode(&address)),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["total_count"], 1);
    assert_eq!(body["data"]["items"][0]["name"], "Work");

    let response = app
        .clone()
        .oneshot(json_request(
            Method::PUT,
            &format!("/admin/pin/{id}"),
            json!({ "name": "Office" }),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["name"], "Office");

    // Unknown columns and key changes are rejected
    let response = app
        .clone()
        .oneshot(json_request(
            Method::PATCH,
            &format!("/admin/pin/{id}"),
            json!({ "id": 1 }),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/admin/pin",
            json!({ "address": address }),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let request = Request::builder()
        .method(Method::DELETE)
        .uri(format!("/admin/pin/{id}"))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(authed_get(&format!("/admin/pin/{id}"), &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_writes_refresh_home_page() {
    let Some((app, pool)) = setup_test_environment().await else {
        return;
    };
    let token = admin_token(&app, &pool).await;
    let title = format!("Listing {}", Uuid::new_v4());

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!body_text(response).await.contains(&title));

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/admin/apartment",
            json!({
                "url": format!("https://www.city-wohnen.de/eng/berlin/{}", Uuid::new_v4()),
                "title": title,
                "warm_rent": 990
            }),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains(&title));
}
