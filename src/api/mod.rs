//! HTTP surface: subscriber WebSocket at `/ws` and the admin REST routes

pub mod admin;
pub mod auth;
pub mod error;

pub use auth::{AdminAuth, Claims};
pub use error::ApiError;

use crate::hub::{serve_subscriber, Hub};
use crate::store::Directory;
use axum::{
    extract::{State, WebSocketUpgrade},
    http::HeaderValue,
    middleware,
    response::Response,
    routing::{get, post, put},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Hub>,
    pub directory: Directory,
    /// `None` disables login and the CRUD routes.
    pub auth: Option<Arc<AdminAuth>>,
}

async fn subscriber_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| serve_subscriber(socket, state.hub))
}

fn cors_layer(client_url: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match client_url.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            log::warn!("⚠️  CLIENT_URL '{}' is not a valid origin, allowing any", client_url);
            layer.allow_origin(Any)
        }
    }
}

pub fn create_router(state: AppState, client_url: &str) -> Router {
    let admin = Router::new()
        .route(
            "/api/country-talkgroups",
            get(admin::list_talkgroups).post(admin::create_talkgroup),
        )
        .route(
            "/api/country-talkgroups/:id",
            put(admin::update_talkgroup).delete(admin::delete_talkgroup),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_admin));

    Router::new()
        .route("/ws", get(subscriber_socket))
        .route("/api/login", post(admin::login))
        .merge(admin)
        .layer(cors_layer(client_url))
        .with_state(state)
}

/// Bind and serve until `shutdown` resolves.
pub async fn run_server<F>(addr: SocketAddr, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("🌐 Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router).with_graceful_shutdown(shutdown).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::AggregationEngine;
    use crate::clock::system_clock;
    use crate::config::AdminCredentials;
    use crate::store::test_support::open_test_db;
    use crate::store::TalkgroupEntry;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const PASSWORD: &str = "correct horse";

    fn app(with_admin: bool) -> (TempDir, Directory, Router) {
        let (dir, db) = open_test_db();
        let directory = db.directory();
        let engine = AggregationEngine::new(db.readers(), directory.clone(), system_clock());
        let auth = with_admin.then(|| {
            Arc::new(AdminAuth::new(&AdminCredentials {
                password_hash: bcrypt::hash(PASSWORD, 4).unwrap(),
                jwt_secret: "router-test-secret".to_string(),
            }))
        });
        let state = AppState {
            hub: Arc::new(Hub::new(engine)),
            directory: directory.clone(),
            auth,
        };
        (dir, directory, create_router(state, "http://localhost:3000"))
    }

    fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", token);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn login(router: &Router) -> String {
        let response = router
            .clone()
            .oneshot(json_request("POST", "/api/login", None, json!({"password": PASSWORD})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["auth"], true);
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_login_rejects_wrong_password() {
        let (_dir, _directory, router) = app(true);
        let response = router
            .oneshot(json_request("POST", "/api/login", None, json!({"password": "nope"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_crud_requires_valid_token() {
        let (_dir, _directory, router) = app(true);

        let missing = router
            .clone()
            .oneshot(Request::builder().uri("/api/country-talkgroups").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let invalid = router
            .oneshot(
                Request::builder()
                    .uri("/api/country-talkgroups")
                    .header("authorization", "Bearer forged.token.value")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(invalid.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_crud_round_trip_visible_in_directory() {
        let (_dir, directory, router) = app(true);
        let token = login(&router).await;

        let created = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/country-talkgroups",
                Some(&token),
                json!({"talkgroup": "2620", "country": "DE", "name": "Bayern"}),
            ))
            .await
            .unwrap();
        assert_eq!(created.status(), StatusCode::OK);
        let id = body_json(created).await["id"].as_i64().unwrap();
        assert_eq!(directory.destination_ids_for_country("DE").unwrap(), vec![2620]);

        let duplicate = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/country-talkgroups",
                Some(&format!("Bearer {}", token)),
                json!({"talkgroup": "2620", "country": "DE", "name": "Again"}),
            ))
            .await
            .unwrap();
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);

        let updated = router
            .clone()
            .oneshot(json_request(
                "PUT",
                &format!("/api/country-talkgroups/{}", id),
                Some(&token),
                json!({"talkgroup": "2620", "country": "DE", "name": "Bavaria"}),
            ))
            .await
            .unwrap();
        assert_eq!(updated.status(), StatusCode::OK);
        assert_eq!(
            directory.talkgroup("2620").unwrap(),
            Some(TalkgroupEntry {
                talkgroup: "2620".to_string(),
                country: "DE".to_string(),
                name: "Bavaria".to_string()
            })
        );

        let listed = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/country-talkgroups")
                    .header("authorization", token.as_str())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_json(listed).await.as_array().unwrap().len(), 1);

        let deleted = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/country-talkgroups/{}", id))
                    .header("authorization", token.as_str())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(deleted.status(), StatusCode::OK);
        assert!(directory.list_talkgroups().unwrap().is_empty());

        let gone = router
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/country-talkgroups/{}", id))
                    .header("authorization", token.as_str())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(gone.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_rejects_blank_fields() {
        let (_dir, _directory, router) = app(true);
        let token = login(&router).await;

        let response = router
            .oneshot(json_request(
                "POST",
                "/api/country-talkgroups",
                Some(&token),
                json!({"talkgroup": " ", "country": "DE", "name": "x"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_admin_disabled_without_credentials() {
        let (_dir, _directory, router) = app(false);

        let response = router
            .clone()
            .oneshot(json_request("POST", "/api/login", None, json!({"password": PASSWORD})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = router
            .oneshot(Request::builder().uri("/api/country-talkgroups").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
