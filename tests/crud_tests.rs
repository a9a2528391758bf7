//! Model mixin tests against PostgreSQL. They return early when
//! `DATABASE_URL` is not set.

use serde_json::json;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::sync::OnceCell;
use uuid::Uuid;

use tegenaria::db::{create_all, Crud, FieldValue, ModelError, Page, RecordRef};
use tegenaria::models::{all_tables, Apartment, Pin, RegisterRequest, User, UserError};
use tegenaria::services::crawler::{store_item, ApartmentItem};

static SCHEMA: OnceCell<()> = OnceCell::const_new();

async fn test_pool() -> Option<PgPool> {
    let database_url = std::env::var("DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    SCHEMA
        .get_or_init(|| async {
            create_all(&pool, &all_tables())
                .await
                .expect("Failed to create tables");
        })
        .await;

    Some(pool)
}

fn unique_url() -> String {
    format!("https://www.city-wohnen.de/eng/berlin/{}", Uuid::new_v4())
}

fn unique_name() -> String {
    format!("u{}", &Uuid::new_v4().simple().to_string()[..12])
}

#[tokio::test]
async fn test_create_fills_defaults_and_get_by_id_accepts_numbers() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let url = unique_url();
    let apartment = Apartment::create(&pool, json!({ "url": url, "rent": 750 }))
        .await
        .unwrap();

    let id = apartment.id.expect("id assigned");
    assert!(apartment.active);
    assert!(apartment.created_at.is_some());
    assert_eq!(apartment.rent, Some(750.0));

    let id_text = id.to_string();
    for record_ref in [
        RecordRef::from(id),
        RecordRef::from(id_text.as_str()),
        RecordRef::from(f64::from(id) + 0.7),
    ] {
        let found = Apartment::get_by_id(&pool, record_ref).await.unwrap();
        assert_eq!(found.map(|a| a.url), Some(url.clone()));
    }

    assert!(Apartment::get_by_id(&pool, RecordRef::from("abc"))
        .await
        .unwrap()
        .is_none());
    assert!(Apartment::get_by_id(&pool, RecordRef::from(-1))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_update_commits_and_assign_does_not() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let mut apartment = Apartment::create(&pool, json!({ "url": unique_url() }))
        .await
        .unwrap();
    let id = apartment.id.unwrap();

    apartment
        .update(&pool, json!({ "title": "Altbau", "availability": "2017-05-01" }))
        .await
        .unwrap();
    let stored = Apartment::get_by_id(&pool, RecordRef::from(id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.title.as_deref(), Some("Altbau"));
    assert_eq!(stored.availability, chrono::NaiveDate::from_ymd_opt(2017, 5, 1));

    apartment.assign(json!({ "title": "Not saved" })).unwrap();
    let stored = Apartment::get_by_id(&pool, RecordRef::from(id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.title.as_deref(), Some("Altbau"));
}

#[tokio::test]
async fn test_save_in_leaves_commit_to_the_caller() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let address = format!("Torstraße {}", Uuid::new_v4());
    let mut pin = Pin::new(&address, Some("Gym"));

    let mut tx = pool.begin().await.unwrap();
    pin.save_in(&mut tx).await.unwrap();
    assert!(pin.id.is_some());
    tx.rollback().await.unwrap();

    let found = Pin::find_by(&pool, "address", FieldValue::from(address.as_str()))
        .await
        .unwrap();
    assert!(found.is_none());

    let mut pin = Pin::new(&address, Some("Gym"));
    pin.save(&pool).await.unwrap();
    let found = Pin::find_by(&pool, "address", FieldValue::from(address.as_str()))
        .await
        .unwrap();
    assert_eq!(found.map(|p| p.id), Some(pin.id));
}

#[tokio::test]
async fn test_delete_removes_record() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let pin = Pin::create(&pool, json!({ "address": format!("Oranienstraße {}", Uuid::new_v4()) }))
        .await
        .unwrap();
    let id = pin.id.unwrap();

    pin.delete(&pool).await.unwrap();
    assert!(Pin::get_by_id(&pool, RecordRef::from(id))
        .await
        .unwrap()
        .is_none());

    let unsaved = Pin::new("Nowhere 1", None);
    assert!(matches!(
        unsaved.delete(&pool).await,
        Err(ModelError::Unsaved)
    ));
}

#[tokio::test]
async fn test_update_after_delete_does_not_recreate_row() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let mut apartment = Apartment::create(&pool, json!({ "url": unique_url() }))
        .await
        .unwrap();
    let id = apartment.id.unwrap();
    apartment.clone().delete(&pool).await.unwrap();

    let result = apartment.update(&pool, json!({ "title": "Too late" })).await;
    assert!(matches!(
        result,
        Err(ModelError::NotFound { id: missing, .. }) if missing == id
    ));
    assert!(Apartment::get_by_id(&pool, RecordRef::from(id))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_constraint_errors() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let result = Apartment::create(&pool, json!({ "url": null })).await;
    assert!(matches!(result, Err(ModelError::NullValue(_))));

    let result = Apartment::create(&pool, json!({ "url": unique_url(), "floor": 3 })).await;
    assert!(matches!(result, Err(ModelError::UnknownColumn { .. })));

    let url = unique_url();
    Apartment::create(&pool, json!({ "url": url })).await.unwrap();
    let duplicate = Apartment::create(&pool, json!({ "url": url }))
        .await
        .unwrap_err();
    assert!(duplicate.is_unique_violation());
    assert_eq!(duplicate.constraint(), Some("apartment_url_key"));
}

#[tokio::test]
async fn test_search_pages_through_matches() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let marker = Uuid::new_v4().simple().to_string();
    for i in 0..3 {
        Pin::create(
            &pool,
            json!({ "address": format!("Marker {marker} {i}"), "name": "Friends" }),
        )
        .await
        .unwrap();
    }

    let (first, total) = Pin::search(&pool, &["address", "name"], Some(marker.as_str()), Page::new(1, 2))
        .await
        .unwrap();
    assert_eq!(total, 3);
    assert_eq!(first.len(), 2);

    let (second, _) = Pin::search(&pool, &["address"], Some(marker.as_str()), Page::new(2, 2))
        .await
        .unwrap();
    assert_eq!(second.len(), 1);

    let friends = Pin::filter_by(&pool, "name", FieldValue::from("Friends"))
        .await
        .unwrap();
    assert!(friends.len() >= 3);
}

#[tokio::test]
async fn test_register_and_authenticate_user() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let username = unique_name();
    let request = RegisterRequest {
        username: username.clone(),
        email: format!("{username}@example.com"),
        password: "secret1".to_string(),
        confirm: "secret1".to_string(),
    };

    let user = User::register(&pool, &request).await.unwrap();
    assert!(user.active);
    assert!(!user.is_admin);
    assert_ne!(user.password.as_deref(), Some("secret1"));

    assert!(matches!(
        User::register(&pool, &request).await,
        Err(UserError::UsernameTaken)
    ));

    let authenticated = User::authenticate(&pool, &username, "secret1").await.unwrap();
    assert_eq!(authenticated.id, user.id);
    assert!(matches!(
        User::authenticate(&pool, &username, "wrong!").await,
        Err(UserError::PasswordVerificationFailed)
    ));

    // The constraint name is what a lost registration race reports
    let clash = User::create(
        &pool,
        json!({ "username": unique_name(), "email": request.email }),
    )
    .await
    .unwrap_err();
    assert_eq!(clash.constraint(), Some("users_email_key"));

    user.add_role(&pool, "tenant").await.unwrap();
    let response = user.to_response(&pool).await.unwrap();
    assert_eq!(response.roles, vec!["tenant".to_string()]);
}

#[tokio::test]
async fn test_crawled_items_update_by_url() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let mut item = ApartmentItem {
        url: unique_url(),
        title: Some("First title".to_string()),
        warm_rent: Some(1100.0),
        ..ApartmentItem::default()
    };
    assert!(store_item(&pool, &item).await.unwrap());

    item.title = Some("Second title".to_string());
    assert!(!store_item(&pool, &item).await.unwrap());

    let matches = Apartment::filter_by(&pool, "url", FieldValue::from(item.url.as_str()))
        .await
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].title.as_deref(), Some("Second title"));
}
