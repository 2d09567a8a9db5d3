//! Cache consistency through the HTTP surface.
//!
//! Every test drives the full router over the in-memory repositories, so the
//! only state shared between requests is the repository and the cache store.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use listings::cache::{CACHE_STATUS_HEADER, CacheService, CacheStore, StoreError};
use listings::infra::http::{ApiState, build_api_router};
use listings::infra::memory::MemoryRepositories;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

struct TestApp {
    router: Router,
    repos: Arc<MemoryRepositories>,
    state: ApiState,
    cache: CacheService,
}

impl TestApp {
    fn new(cache: CacheService) -> Self {
        let repos = Arc::new(MemoryRepositories::new());
        let state = ApiState::from_repositories(repos.clone(), cache.clone());
        Self {
            router: build_api_router(state.clone()),
            repos,
            state,
            cache,
        }
    }

    async fn token(&self, email: &str, name: &str) -> String {
        self.state
            .auth
            .issue_token(email, name)
            .await
            .expect("issue token")
            .token
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, HeaderMap, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self.router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, headers, json)
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, HeaderMap, Value) {
        self.send(Method::GET, uri, token, None).await
    }

    fn list_queries(&self) -> usize {
        self.repos.property_queries.load(Ordering::SeqCst)
    }
}

fn listing(code: &str, city: &str, price: u64) -> Value {
    json!({
        "propertyId": code,
        "title": format!("{city} listing {code}"),
        "type": "Apartment",
        "price": price,
        "state": "Maharashtra",
        "city": city,
        "areaSqFt": 950,
        "bedrooms": 2,
        "bathrooms": 2,
        "amenities": ["gym", "lift"],
        "furnished": "Semi",
        "availableFrom": "2025-06-01",
        "listedBy": "Owner",
        "listingType": "sale"
    })
}

fn property_ids(body: &Value) -> Vec<String> {
    body["data"]["properties"]
        .as_array()
        .expect("properties array")
        .iter()
        .map(|property| property["id"].as_str().expect("id").to_string())
        .collect()
}

/// Store that rejects every command, as an unreachable server would.
struct DownStore;

#[async_trait]
impl CacheStore for DownStore {
    fn backend(&self) -> &'static str {
        "down"
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::unavailable("connection refused"))
    }

    async fn set_ex(&self, _key: &str, _value: String, _ttl: u64) -> Result<(), StoreError> {
        Err(StoreError::unavailable("connection refused"))
    }

    async fn del(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::unavailable("connection refused"))
    }

    async fn keys(&self, _pattern: &str) -> Result<Vec<String>, StoreError> {
        Err(StoreError::unavailable("connection refused"))
    }

    async fn del_many(&self, _keys: &[String]) -> Result<u64, StoreError> {
        Err(StoreError::unavailable("connection refused"))
    }

    async fn exists(&self, _key: &str) -> Result<bool, StoreError> {
        Err(StoreError::unavailable("connection refused"))
    }

    async fn expire(&self, _key: &str, _ttl: u64) -> Result<bool, StoreError> {
        Err(StoreError::unavailable("connection refused"))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::unavailable("connection refused"))
    }
}

#[tokio::test]
async fn created_property_is_visible_in_the_next_list() {
    let app = TestApp::new(CacheService::in_memory());
    let token = app.token("owner@example.com", "Owner").await;

    let (status, _, before) = app.get("/api/properties", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(property_ids(&before).is_empty());

    let (status, _, created) = app
        .send(
            Method::POST,
            "/api/properties",
            Some(&token),
            Some(listing("PROP9001", "Pune", 4_500_000)),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["message"], "Property created successfully");
    let id = created["data"]["id"].as_str().expect("id").to_string();

    let (_, _, after) = app.get("/api/properties", None).await;
    assert_eq!(property_ids(&after), vec![id]);
    assert_eq!(after["data"]["pagination"]["total"], 1);
}

#[tokio::test]
async fn pune_listing_scenario_hits_then_invalidates() {
    let app = TestApp::new(CacheService::in_memory());
    let token = app.token("owner@example.com", "Owner").await;
    app.repos.seed_property("PROP1", "Pune", Uuid::new_v4());
    app.repos.seed_property("PROP2", "Mumbai", Uuid::new_v4());

    let uri = "/api/properties?city=Pune&page=1&limit=20";
    let key = r#"properties:{"filter":{"city":"/Pune/i"},"page":1,"limit":20}"#;

    let (status, _, first) = app.get(uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(property_ids(&first).len(), 1);
    assert!(app.cache.exists(key).await);
    assert_eq!(app.list_queries(), 1);

    let (_, _, second) = app.get(uri, None).await;
    assert_eq!(second, first);
    assert_eq!(app.list_queries(), 1, "second read must be served from cache");

    let (status, _, _) = app
        .send(
            Method::POST,
            "/api/properties",
            Some(&token),
            Some(listing("PROP3", "Pune", 3_000_000)),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(!app.cache.exists(key).await);

    let (_, _, third) = app.get(uri, None).await;
    assert_eq!(app.list_queries(), 2);
    assert_eq!(property_ids(&third).len(), 2);
    assert_eq!(third["data"]["pagination"]["total"], 2);
}

#[tokio::test]
async fn reordered_query_parameters_share_one_entry() {
    let app = TestApp::new(CacheService::in_memory());
    app.repos.seed_property("PROP1", "Pune", Uuid::new_v4());

    app.get("/api/properties?city=Pune&minPrice=100", None).await;
    app.get("/api/properties?minPrice=100&city=Pune", None).await;
    assert_eq!(app.list_queries(), 1);
}

#[tokio::test]
async fn update_refreshes_entity_and_collections() {
    let app = TestApp::new(CacheService::in_memory());
    let token = app.token("owner@example.com", "Owner").await;
    let (_, _, created) = app
        .send(
            Method::POST,
            "/api/properties",
            Some(&token),
            Some(listing("PROP7", "Pune", 1_000_000)),
        )
        .await;
    let id = created["data"]["id"].as_str().expect("id").to_string();
    let item_uri = format!("/api/properties/{id}");

    let (_, _, before) = app.get(&item_uri, None).await;
    assert_eq!(before["data"]["price"], 1_000_000.0);
    app.get("/api/properties/search?q=pune&sortBy=price_asc", None)
        .await;

    let (status, _, updated) = app
        .send(
            Method::PUT,
            &item_uri,
            Some(&token),
            Some(json!({ "price": 1_250_000 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["message"], "Property updated successfully");

    let (_, _, after) = app.get(&item_uri, None).await;
    assert_eq!(after["data"]["price"], 1_250_000.0);
    let (_, _, search) = app
        .get("/api/properties/search?q=pune&sortBy=price_asc", None)
        .await;
    assert_eq!(search["data"]["properties"][0]["price"], 1_250_000.0);
}

#[tokio::test]
async fn deleted_property_stops_being_served_from_cache() {
    let app = TestApp::new(CacheService::in_memory());
    let token = app.token("owner@example.com", "Owner").await;
    let (_, _, created) = app
        .send(
            Method::POST,
            "/api/properties",
            Some(&token),
            Some(listing("PROP8", "Pune", 1_000_000)),
        )
        .await;
    let id = created["data"]["id"].as_str().expect("id").to_string();
    let item_uri = format!("/api/properties/{id}");
    assert_eq!(app.get(&item_uri, None).await.0, StatusCode::OK);

    let (status, _, deleted) = app.send(Method::DELETE, &item_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["message"], "Property deleted successfully");

    let (status, _, missing) = app.get(&item_uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(missing["success"], false);
}

#[tokio::test]
async fn favorites_list_reflects_add_and_remove() {
    let app = TestApp::new(CacheService::in_memory());
    let token = app.token("buyer@example.com", "Buyer").await;
    let property = app.repos.seed_property("PROP1", "Pune", Uuid::new_v4());

    let (_, _, empty) = app.get("/api/favorites", Some(&token)).await;
    assert_eq!(empty["data"]["favorites"], json!([]));

    let (status, _, added) = app
        .send(
            Method::POST,
            "/api/favorites",
            Some(&token),
            Some(json!({ "propertyId": property.id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(added["message"], "Property added to favorites");

    let (_, _, listed) = app.get("/api/favorites", Some(&token)).await;
    assert_eq!(
        listed["data"]["favorites"][0]["property"]["id"],
        property.id.to_string()
    );
    assert_eq!(listed["data"]["pagination"]["total"], 1);

    let (status, _, _) = app
        .send(
            Method::DELETE,
            &format!("/api/favorites/{}", property.id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, _, after) = app.get("/api/favorites", Some(&token)).await;
    assert_eq!(after["data"]["favorites"], json!([]));
}

#[tokio::test]
async fn recommendations_are_cached_per_recipient_and_invalidated() {
    let app = TestApp::new(CacheService::in_memory());
    let sender = app.token("sender@example.com", "Sender").await;
    let recipient = app.token("recipient@example.com", "Recipient").await;
    let property = app.repos.seed_property("PROP1", "Pune", Uuid::new_v4());

    let (status, headers, empty) = app.get("/api/recommendations", Some(&recipient)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[CACHE_STATUS_HEADER], "miss");
    assert_eq!(empty["data"]["recommendations"], json!([]));

    let (_, headers, _) = app.get("/api/recommendations", Some(&recipient)).await;
    assert_eq!(headers[CACHE_STATUS_HEADER], "hit");

    let (status, _, created) = app
        .send(
            Method::POST,
            "/api/recommendations",
            Some(&sender),
            Some(json!({
                "propertyId": property.id,
                "recipientEmail": "Recipient@Example.com",
                "message": "Near the office"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        created["message"],
        "Property recommended to Recipient@Example.com successfully"
    );
    let recommendation_id = created["data"]["id"].as_str().expect("id").to_string();

    let (_, headers, listed) = app.get("/api/recommendations", Some(&recipient)).await;
    assert_eq!(headers[CACHE_STATUS_HEADER], "miss");
    assert_eq!(
        listed["data"]["recommendations"][0]["from"]["email"],
        "sender@example.com"
    );

    let (status, _, _) = app
        .send(
            Method::DELETE,
            &format!("/api/recommendations/{recommendation_id}"),
            Some(&recipient),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, _, after) = app.get("/api/recommendations", Some(&recipient)).await;
    assert_eq!(after["data"]["recommendations"], json!([]));
}

#[tokio::test]
async fn unreachable_store_degrades_to_uncached_reads() {
    let app = TestApp::new(CacheService::new(Arc::new(DownStore), 3600));
    let token = app.token("owner@example.com", "Owner").await;

    let (status, _, _) = app.get("/api/properties", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = app
        .send(
            Method::POST,
            "/api/properties",
            Some(&token),
            Some(listing("PROP1", "Pune", 1_000_000)),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _, listed) = app.get("/api/properties", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(property_ids(&listed).len(), 1);
    assert_eq!(app.list_queries(), 2);

    let (status, _, health) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["data"]["status"], "degraded");
    assert_eq!(health["data"]["cacheReachable"], false);
}

#[tokio::test]
async fn disabled_cache_always_reads_through() {
    let app = TestApp::new(CacheService::disabled());
    app.repos.seed_property("PROP1", "Pune", Uuid::new_v4());

    app.get("/api/properties", None).await;
    app.get("/api/properties", None).await;
    assert_eq!(app.list_queries(), 2);
}
