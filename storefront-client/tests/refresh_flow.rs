//! Token attachment and refresh-on-401 behaviour of [`ApiClient`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use storefront_client::{ApiClient, ApiRequest, Storefront};
use storefront_core::credentials::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use storefront_core::token::unsigned_token;
use storefront_core::{
    AuthMode, ClientConfig, CredentialStore, ErrorKind, KeyValueStore, MemoryStore, Secret,
    StoreError, Tier,
};
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Memory tier that counts how often the access token is deleted.
#[derive(Default)]
struct CountingStore {
    inner: MemoryStore,
    access_deletes: AtomicUsize,
}

#[async_trait]
impl KeyValueStore for CountingStore {
    async fn get(&self, key: &str) -> Result<Option<Secret>, StoreError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &Secret) -> Result<(), StoreError> {
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        if key == ACCESS_TOKEN_KEY {
            self.access_deletes.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.delete(key).await
    }
}

fn config(server: &MockServer) -> ClientConfig {
    ClientConfig {
        api_url: format!("{}/api/", server.uri()),
        timeout_ms: 2_000,
        retries: 0,
        backoff_base_ms: 10,
        ..ClientConfig::default()
    }
}

async fn signed_in(server: &MockServer) -> ApiClient {
    let credentials = CredentialStore::in_memory();
    credentials.store_tokens("old", Some("r1"), false).await;
    ApiClient::new(config(server), credentials).expect("client")
}

async fn mount_refresh(server: &MockServer, response: ResponseTemplate, expected: u64) {
    Mock::given(method("POST"))
        .and(path("/api/auth/token/refresh/"))
        .respond_with(response)
        .expect(expected)
        .named("token refresh")
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_refresh_and_replay_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/cart/"))
        .and(header("authorization", "Bearer old"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "detail": "Token expired" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/cart/"))
        .and(header("authorization", "Bearer new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/token/refresh/"))
        .and(body_json(json!({ "refresh": "r1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "new" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = signed_in(&server).await;
    let envelope = client.send::<Value>(ApiRequest::get("cart/")).await;

    assert_eq!(envelope.data(), Some(&json!({ "items": [] })));
    let credentials = client.credentials().credentials().await;
    assert_eq!(credentials.access_token.unwrap().expose(), "new");
    assert_eq!(credentials.refresh_token.unwrap().expose(), "r1");
}

#[tokio::test]
async fn test_failed_refresh_clears_exactly_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/wishlist/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "detail": "Token expired" })))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(
        &server,
        ResponseTemplate::new(401).set_body_json(json!({ "detail": "Token is blacklisted" })),
        1,
    )
    .await;

    let session = Arc::new(CountingStore::default());
    let credentials = CredentialStore::new(session.clone(), Arc::new(MemoryStore::new()));
    credentials.store_tokens("old", Some("r1"), false).await;
    let client = ApiClient::new(config(&server), credentials).unwrap();

    let envelope = client.send::<Value>(ApiRequest::get("wishlist/")).await;

    let error = envelope.error().expect("unauthorized");
    assert_eq!(error.kind, ErrorKind::Unauthorized);
    assert_eq!(error.status, Some(401));
    assert_eq!(error.message, "Token expired");
    assert_eq!(session.access_deletes.load(Ordering::SeqCst), 1);
    assert!(client.credentials().access_token().await.is_none());
    assert!(client.credentials().refresh_token().await.is_none());
}

#[tokio::test]
async fn test_replayed_call_is_not_refreshed_again() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/support/tickets/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    mount_refresh(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({ "access": "new" })),
        1,
    )
    .await;

    let client = signed_in(&server).await;
    let envelope = client.send::<Value>(ApiRequest::get("support/tickets/")).await;

    assert_eq!(envelope.error().unwrap().kind, ErrorKind::Unauthorized);
    // The refresh itself succeeded, so the new credentials are kept.
    assert_eq!(client.credentials().access_token().await.unwrap().expose(), "new");
}

#[tokio::test]
async fn test_concurrent_unauthorized_calls_share_one_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/cart/"))
        .and(header("authorization", "Bearer old"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(50)))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/cart/"))
        .and(header("authorization", "Bearer new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .expect(2)
        .mount(&server)
        .await;
    mount_refresh(
        &server,
        ResponseTemplate::new(200)
            .set_body_json(json!({ "access": "new" }))
            .set_delay(Duration::from_millis(100)),
        1,
    )
    .await;

    let client = signed_in(&server).await;
    let (first, second) = tokio::join!(
        client.send::<Value>(ApiRequest::get("cart/")),
        client.send::<Value>(ApiRequest::get("cart/")),
    );

    assert!(first.is_success());
    assert!(second.is_success());
}

#[tokio::test]
async fn test_concurrent_failed_refresh_does_not_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/cart/"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(50)))
        .expect(2)
        .mount(&server)
        .await;
    mount_refresh(
        &server,
        ResponseTemplate::new(401).set_delay(Duration::from_millis(100)),
        1,
    )
    .await;

    let session = Arc::new(CountingStore::default());
    let credentials = CredentialStore::new(session.clone(), Arc::new(MemoryStore::new()));
    credentials.store_tokens("old", Some("r1"), false).await;
    let client = ApiClient::new(config(&server), credentials).unwrap();

    let (first, second) = tokio::join!(
        client.send::<Value>(ApiRequest::get("cart/")),
        client.send::<Value>(ApiRequest::get("cart/")),
    );

    assert_eq!(first.error().unwrap().kind, ErrorKind::Unauthorized);
    assert_eq!(second.error().unwrap().kind, ErrorKind::Unauthorized);
    assert_eq!(session.access_deletes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_public_endpoint_never_refreshes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/products/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, ResponseTemplate::new(200), 0).await;

    let client = signed_in(&server).await;
    let envelope = client
        .send::<Value>(ApiRequest::get("products/").public())
        .await;

    assert_eq!(envelope.error().unwrap().kind, ErrorKind::Unauthorized);
    assert_eq!(client.credentials().access_token().await.unwrap().expose(), "old");

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_missing_refresh_token_clears_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/profile/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, ResponseTemplate::new(200), 0).await;

    let credentials = CredentialStore::in_memory();
    credentials.set_access_token("old", false).await;
    let client = ApiClient::new(config(&server), credentials).unwrap();

    let envelope = client.send::<Value>(ApiRequest::get("auth/profile/")).await;

    assert_eq!(envelope.error().unwrap().kind, ErrorKind::Unauthorized);
    assert!(client.credentials().access_token().await.is_none());
}

#[tokio::test]
async fn test_csrf_token_from_cookie_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/contact/"))
        .and(header("x-csrftoken", "tok123"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 1 })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(config(&server), CredentialStore::in_memory()).unwrap();
    let origin = Url::parse(&server.uri()).unwrap();
    client
        .cookie_jar()
        .add_cookie_str("csrftoken=tok123; Path=/", &origin);

    let envelope = client
        .send::<Value>(ApiRequest::post("contact/").json(&json!({ "message": "hi" })).public())
        .await;
    assert!(envelope.is_success());
}

#[tokio::test]
async fn test_remembered_login_refresh_and_replay() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login/"))
        .and(body_json(json!({ "email": "shopper@example.com", "password": "hunter22" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": "a1",
            "refresh": "r1",
            "user": { "id": 7, "email": "shopper@example.com", "first_name": "Sam" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/cart/"))
        .and(header("authorization", "Bearer a1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/token/refresh/"))
        .and(body_json(json!({ "refresh": "r1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "a2", "refresh": "r2" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/cart/"))
        .and(header("authorization", "Bearer a2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 3, "items": [], "total_items": 0, "subtotal": "0.00", "total": "0.00"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let shop = Storefront::new(config(&server), CredentialStore::in_memory()).unwrap();

    let login = shop.auth.login("shopper@example.com", "hunter22", true).await;
    assert!(login.is_success());

    let cart = shop.cart.get().await;
    let wire = serde_json::to_value(&cart).unwrap();
    assert_eq!(wire["success"], json!(true));
    assert_eq!(wire["data"]["id"], json!(3));
    assert!(wire.get("error").is_none());

    // The refreshed pair stays remembered.
    let credentials = shop.client().credentials();
    assert_eq!(
        credentials.read_tier(Tier::Persisted, "access_token").await.unwrap().expose(),
        "a2"
    );
    assert_eq!(
        credentials.read_tier(Tier::Persisted, "refresh_token").await.unwrap().expose(),
        "r2"
    );
}

#[tokio::test]
async fn test_expiring_token_refreshed_before_dispatch() {
    let server = MockServer::start().await;
    mount_refresh(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({ "access": "fresh" })),
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/api/payments/transactions/"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [], "count": 0 })))
        .expect(1)
        .mount(&server)
        .await;

    let credentials = CredentialStore::in_memory();
    let expiring = unsigned_token(&json!({ "exp": chrono::Utc::now().timestamp() + 10 }));
    credentials.store_tokens(&expiring, Some("r1"), false).await;

    let config = ClientConfig {
        refresh_leeway_secs: Some(60),
        ..config(&server)
    };
    let client = ApiClient::new(config, credentials).unwrap();

    let envelope = client
        .send::<Value>(ApiRequest::get("payments/transactions/"))
        .await;
    assert!(envelope.is_success());
}

#[tokio::test]
async fn test_cookie_mode_refreshes_with_empty_body() {
    let server = MockServer::start().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();
    Mock::given(method("GET"))
        .and(path("/api/cart/"))
        .respond_with(move |_req: &wiremock::Request| -> ResponseTemplate {
            if calls_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                ResponseTemplate::new(401)
            } else {
                ResponseTemplate::new(200).set_body_json(json!({ "items": [] }))
            }
        })
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/token/refresh/"))
        .and(body_json(json!({})))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "sessionid=s2; Path=/"))
        .expect(1)
        .mount(&server)
        .await;

    let config = ClientConfig {
        auth_mode: AuthMode::Cookie,
        ..config(&server)
    };
    let credentials = CredentialStore::in_memory();
    credentials.set_access_token("ignored", false).await;
    let client = ApiClient::new(config, credentials).unwrap();

    let envelope = client.send::<Value>(ApiRequest::get("cart/")).await;
    assert!(envelope.is_success());

    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.headers.get("authorization").is_none()));
}

#[tokio::test]
async fn test_refresh_rejection_keeps_backend_message() {
    let server = MockServer::start().await;
    mount_refresh(
        &server,
        ResponseTemplate::new(401).set_body_json(json!({
            "detail": "Token is blacklisted",
            "code": "token_not_valid"
        })),
        1,
    )
    .await;

    let shop = Storefront::from_client(signed_in(&server).await);
    let envelope = shop.auth.refresh_token().await;

    let error = envelope.error().expect("refresh rejected");
    assert_eq!(error.kind, ErrorKind::Unauthorized);
    assert_eq!(error.status, Some(401));
    assert_eq!(error.message, "Token is blacklisted");
    assert!(shop.client().credentials().access_token().await.is_none());
}

#[tokio::test]
async fn test_refresh_timeout_is_reported_as_timeout() {
    let server = MockServer::start().await;
    mount_refresh(
        &server,
        ResponseTemplate::new(200)
            .set_body_json(json!({ "access": "new" }))
            .set_delay(Duration::from_secs(2)),
        1,
    )
    .await;

    let credentials = CredentialStore::in_memory();
    credentials.store_tokens("old", Some("r1"), false).await;
    let client = ApiClient::new(
        ClientConfig {
            timeout_ms: 100,
            ..config(&server)
        },
        credentials,
    )
    .expect("client");

    let error = client.refresh().await.expect_err("timed out");
    assert_eq!(error.kind, ErrorKind::Timeout);
    assert!(client.credentials().refresh_token().await.is_none());
}

#[tokio::test]
async fn test_restored_session_refreshes_into_persisted_tier() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/wishlist/"))
        .and(header("authorization", "Bearer old"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({ "access": "new" })),
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/api/wishlist/"))
        .and(header("authorization", "Bearer new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .expect(1)
        .mount(&server)
        .await;

    // Tokens left on disk by an earlier remembered login.
    let restored = MemoryStore::with_data(HashMap::from([
        (ACCESS_TOKEN_KEY.to_string(), Secret::new("old")),
        (REFRESH_TOKEN_KEY.to_string(), Secret::new("r1")),
    ]));
    let credentials = CredentialStore::new(Arc::new(MemoryStore::new()), Arc::new(restored));
    let client = ApiClient::new(config(&server), credentials).unwrap();

    assert!(client.send::<Value>(ApiRequest::get("wishlist/")).await.is_success());

    let credentials = client.credentials();
    assert_eq!(
        credentials.read_tier(Tier::Persisted, ACCESS_TOKEN_KEY).await.unwrap().expose(),
        "new"
    );
    assert_eq!(credentials.refresh_token().await.unwrap().expose(), "r1");
}
