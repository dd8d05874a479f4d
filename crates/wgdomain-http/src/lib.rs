//! HTTP administrative surface for the wgdomain system.
//!
//! A thin axum adapter over the domain store and the reconciliation engine.
//! Handlers validate input and translate outcomes into status codes; all
//! state lives behind the [`Reconciler`].
//!
//! | Route | Purpose |
//! |---|---|
//! | `GET /api/domains` | List the allowlist |
//! | `POST /api/add` | Add `{"domain": ...}` |
//! | `POST /api/remove` | Remove `{"domain": ...}` |
//! | `POST /api/update` | Run a reconciliation cycle now |
//! | `GET /healthz` | Liveness probe |

use std::future::Future;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use wgdomain_core::{AddOutcome, Domain, DomainStore, Error, Reconciler, RemoveOutcome};

const MISSING_DOMAIN: &str = "Missing 'domain' field";
const INVALID_DOMAIN: &str = "Invalid domain format";

/// Body of the add and remove requests
#[derive(Debug, Deserialize)]
struct DomainRequest {
    #[serde(default)]
    domain: Option<String>,
}

/// Build the admin router.
pub fn routes(engine: Arc<Reconciler>) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/api/domains", get(list_handler))
        .route("/api/add", post(add_handler))
        .route("/api/remove", post(remove_handler))
        .route("/api/update", post(update_handler))
        .with_state(engine)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Serve the admin router until `shutdown` resolves.
pub async fn serve<F>(
    listener: tokio::net::TcpListener,
    engine: Arc<Reconciler>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Admin API listening on http://{}", addr);
    }

    axum::serve(listener, routes(engine))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::debug!("Admin API stopped");
    Ok(())
}

async fn health() -> &'static str {
    "OK"
}

/// GET /api/domains
async fn list_handler(State(engine): State<Arc<Reconciler>>) -> Response {
    match engine.store().list().await {
        Ok(domains) => {
            let names: Vec<String> = domains.into_iter().map(Domain::into_inner).collect();
            (StatusCode::OK, Json(json!({ "domains": names }))).into_response()
        }
        Err(e) => {
            tracing::error!("Error reading domains: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// POST /api/add
async fn add_handler(
    State(engine): State<Arc<Reconciler>>,
    payload: Result<Json<DomainRequest>, JsonRejection>,
) -> Response {
    let domain = match requested_domain(payload) {
        Ok(domain) => domain,
        Err(response) => return response,
    };

    match engine.store().insert(domain.clone()).await {
        Ok(AddOutcome::Added) => {
            tracing::info!("Domain added: {}", domain);
            message_response(true, format!("Domain '{}' added", domain))
        }
        Ok(AddOutcome::AlreadyExists) => {
            message_response(false, format!("Domain '{}' already exists", domain))
        }
        Err(e) => {
            tracing::error!("Error adding domain: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// POST /api/remove
async fn remove_handler(
    State(engine): State<Arc<Reconciler>>,
    payload: Result<Json<DomainRequest>, JsonRejection>,
) -> Response {
    let domain = match requested_domain(payload) {
        Ok(domain) => domain,
        Err(response) => return response,
    };

    match engine.store().remove(domain.as_str()).await {
        Ok(RemoveOutcome::Removed) => {
            tracing::info!("Domain removed: {}", domain);
            message_response(true, format!("Domain '{}' removed", domain))
        }
        Ok(RemoveOutcome::NotFound) => {
            message_response(false, format!("Domain '{}' not found", domain))
        }
        Err(e) => {
            tracing::error!("Error removing domain: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// POST /api/update
///
/// The cycle runs on its own task, so it completes even if the client
/// disconnects before the response is written.
async fn update_handler(State(engine): State<Arc<Reconciler>>) -> Response {
    let report = match engine.spawn_reconcile().await {
        Ok(Ok(report)) => report,
        Ok(Err(Error::CycleInProgress)) => {
            return update_failure(StatusCode::CONFLICT, Error::CycleInProgress.to_string());
        }
        Ok(Err(e)) => {
            tracing::error!("Error updating domains: {}", e);
            return update_failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
        Err(e) => {
            tracing::error!("Reconciliation task failed: {}", e);
            return update_failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };

    match report.apply_error() {
        None => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Update completed",
                "stats": report.stats,
            })),
        )
            .into_response(),
        Some(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "success": false,
                "error": format!("Update failed: {}", e),
                "stats": report.stats,
            })),
        )
            .into_response(),
    }
}

/// Pull a trimmed, validated domain out of a request body
fn requested_domain(
    payload: Result<Json<DomainRequest>, JsonRejection>,
) -> Result<Domain, Response> {
    let name = match payload {
        Ok(Json(DomainRequest { domain: Some(name) })) => name,
        Ok(_) => return Err(error_response(StatusCode::BAD_REQUEST, MISSING_DOMAIN)),
        Err(rejection) => {
            tracing::debug!("Rejected request body: {}", rejection);
            return Err(error_response(StatusCode::BAD_REQUEST, MISSING_DOMAIN));
        }
    };

    Domain::parse(name.trim())
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, INVALID_DOMAIN))
}

fn message_response(success: bool, message: String) -> Response {
    (
        StatusCode::OK,
        Json(json!({ "success": success, "message": message })),
    )
        .into_response()
}

/// Update failures that carry no stats (the cycle never got to aggregate)
fn update_failure(status: StatusCode, error: String) -> Response {
    (status, Json(json!({ "success": false, "error": error }))).into_response()
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (status, Json(json!({ "error": error.into() }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tower::ServiceExt;
    use wgdomain_core::{
        AddressSet, ApplyError, EngineConfig, Firewall, MemoryDomainStore, ResolveError,
        ResolvedAddresses, Resolver,
    };

    /// Resolves `*.invalid` to nothing and everything else to 192.0.2.1
    struct FixedResolver;

    #[async_trait]
    impl Resolver for FixedResolver {
        async fn resolve(
            &self,
            domain: &Domain,
            _timeout: Duration,
        ) -> Result<ResolvedAddresses, ResolveError> {
            if domain.as_str().ends_with(".invalid") {
                return Err(ResolveError::NotFound);
            }
            Ok(ResolvedAddresses::new(
                vec![Ipv4Addr::new(192, 0, 2, 1)],
                Vec::new(),
            ))
        }

        fn resolver_name(&self) -> &'static str {
            "fixed"
        }
    }

    struct SwitchFirewall {
        failing: Arc<AtomicBool>,
        delay: Duration,
    }

    #[async_trait]
    impl Firewall for SwitchFirewall {
        async fn apply(&self, _addresses: &AddressSet) -> Result<(), ApplyError> {
            tokio::time::sleep(self.delay).await;
            if self.failing.load(Ordering::SeqCst) {
                return Err(ApplyError::rejected("Error: Could not process rule"));
            }
            Ok(())
        }

        fn firewall_name(&self) -> &'static str {
            "switch"
        }
    }

    fn test_engine(
        store: MemoryDomainStore,
        failing: bool,
        delay: Duration,
    ) -> Arc<Reconciler> {
        let (engine, _event_rx) = Reconciler::new(
            Arc::new(store),
            Box::new(FixedResolver),
            Box::new(SwitchFirewall {
                failing: Arc::new(AtomicBool::new(failing)),
                delay,
            }),
            EngineConfig::default(),
        )
        .unwrap();
        Arc::new(engine)
    }

    fn test_app(store: MemoryDomainStore) -> Router {
        routes(test_engine(store, false, Duration::ZERO))
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        let app = test_app(MemoryDomainStore::new());
        let req = Request::get("/healthz").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn list_returns_domains_in_order() {
        let store = MemoryDomainStore::new();
        store.add("b.example").await.unwrap();
        store.add("a.example").await.unwrap();

        let app = test_app(store);
        let req = Request::get("/api/domains").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            body_json(resp).await,
            json!({ "domains": ["b.example", "a.example"] })
        );
    }

    #[tokio::test]
    async fn add_trims_and_stores() {
        let store = MemoryDomainStore::new();
        let app = test_app(store.clone());

        let resp = app
            .oneshot(post_json("/api/add", r#"{"domain": "  example.com "}"#))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            body_json(resp).await,
            json!({ "success": true, "message": "Domain 'example.com' added" })
        );
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn add_existing_is_not_an_error() {
        let store = MemoryDomainStore::new();
        store.add("example.com").await.unwrap();
        let app = test_app(store.clone());

        let resp = app
            .oneshot(post_json("/api/add", r#"{"domain": "example.com"}"#))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            body_json(resp).await,
            json!({ "success": false, "message": "Domain 'example.com' already exists" })
        );
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn add_invalid_returns_400() {
        let store = MemoryDomainStore::new();
        let app = test_app(store.clone());

        let resp = app
            .oneshot(post_json("/api/add", r#"{"domain": "bad domain!"}"#))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await, json!({ "error": "Invalid domain format" }));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn add_missing_field_returns_400() {
        let app = test_app(MemoryDomainStore::new());

        for body in [r#"{}"#, r#"{"name": "example.com"}"#, "not json"] {
            let resp = app
                .clone()
                .oneshot(post_json("/api/add", body))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body: {}", body);
            assert_eq!(
                body_json(resp).await,
                json!({ "error": "Missing 'domain' field" })
            );
        }
    }

    #[tokio::test]
    async fn remove_reports_outcome() {
        let store = MemoryDomainStore::new();
        store.add("example.com").await.unwrap();
        let app = test_app(store.clone());

        let resp = app
            .clone()
            .oneshot(post_json("/api/remove", r#"{"domain": "example.com"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            body_json(resp).await,
            json!({ "success": true, "message": "Domain 'example.com' removed" })
        );

        let resp = app
            .oneshot(post_json("/api/remove", r#"{"domain": "example.com"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            body_json(resp).await,
            json!({ "success": false, "message": "Domain 'example.com' not found" })
        );
    }

    #[tokio::test]
    async fn update_returns_stats() {
        let store = MemoryDomainStore::new();
        store.add("good.example").await.unwrap();
        store.add("bad.invalid").await.unwrap();
        let app = test_app(store);

        let resp = app.oneshot(post_json("/api/update", "")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            body_json(resp).await,
            json!({
                "success": true,
                "message": "Update completed",
                "stats": {
                    "domains_processed": 2,
                    "domains_resolved": 1,
                    "ipv4_count": 1,
                    "ipv6_count": 0,
                    "failed_domains": ["bad.invalid"],
                },
            })
        );
    }

    #[tokio::test]
    async fn update_apply_failure_returns_500() {
        let store = MemoryDomainStore::new();
        store.add("good.example").await.unwrap();
        let app = routes(test_engine(store, true, Duration::ZERO));

        let resp = app.oneshot(post_json("/api/update", "")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(resp).await;
        assert_eq!(json["success"], json!(false));
        assert!(json["error"].as_str().unwrap().starts_with("Update failed"));
        assert_eq!(json["stats"]["domains_resolved"], json!(1));
    }

    #[tokio::test]
    async fn concurrent_update_returns_409() {
        let engine = test_engine(MemoryDomainStore::new(), false, Duration::from_millis(300));
        let app = routes(Arc::clone(&engine));

        let running = engine.spawn_reconcile();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let resp = app.oneshot(post_json("/api/update", "")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(resp).await["success"], json!(false));

        assert!(running.await.unwrap().is_ok());
    }

    /// A store whose reads always fail
    struct BrokenStore;

    #[async_trait]
    impl DomainStore for BrokenStore {
        async fn insert(&self, _domain: Domain) -> wgdomain_core::Result<AddOutcome> {
            Err(Error::store("disk unavailable"))
        }

        async fn remove(&self, _name: &str) -> wgdomain_core::Result<RemoveOutcome> {
            Err(Error::store("disk unavailable"))
        }

        async fn list(&self) -> wgdomain_core::Result<Vec<Domain>> {
            Err(Error::store("disk unavailable"))
        }
    }

    #[tokio::test]
    async fn update_store_failure_returns_500_with_success_false() {
        let (engine, _event_rx) = Reconciler::new(
            Arc::new(BrokenStore),
            Box::new(FixedResolver),
            Box::new(SwitchFirewall {
                failing: Arc::new(AtomicBool::new(false)),
                delay: Duration::ZERO,
            }),
            EngineConfig::default(),
        )
        .unwrap();
        let app = routes(Arc::new(engine));

        let resp = app.oneshot(post_json("/api/update", "")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(resp).await;
        assert_eq!(json["success"], json!(false));
        assert!(json["error"].as_str().unwrap().contains("disk unavailable"));
    }

    #[tokio::test]
    async fn nonexistent_route_returns_404() {
        let app = test_app(MemoryDomainStore::new());
        let req = Request::get("/nonexistent").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
