// src/routes.rs

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{config::AppState, docs::ApiDoc, handlers, middleware::auth::auth_guard};

const MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;

pub fn build_router(app_state: AppState) -> Router {
    // Define as rotas de autenticação (públicas)
    let auth_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login));

    // Define as rotas de usuário (protegidas pelo middleware)
    let user_routes = Router::new()
        .route("/me", get(handlers::auth::get_me))
        .layer(axum_middleware::from_fn_with_state(app_state.clone(), auth_guard));

    let shipment_routes = Router::new()
        .route(
            "/",
            get(handlers::shipments::list_shipments).post(handlers::shipments::create_shipment),
        )
        .route("/changes", get(handlers::changes::stream_changes))
        .route(
            "/{id}",
            get(handlers::shipments::get_shipment).patch(handlers::shipments::update_shipment),
        )
        .route("/{id}/inspection", post(handlers::shipments::inspect_shipment))
        .route("/{id}/certificate", post(handlers::shipments::issue_certificate))
        .route(
            "/{id}/documents/{file_name}",
            put(handlers::documents::upload_document).layer(DefaultBodyLimit::max(MAX_DOCUMENT_BYTES)),
        )
        .layer(axum_middleware::from_fn_with_state(app_state.clone(), auth_guard));

    let document_routes = Router::new()
        .route("/signed-urls", post(handlers::documents::create_signed_urls))
        .layer(axum_middleware::from_fn_with_state(app_state.clone(), auth_guard));

    let certificate_routes = Router::new()
        .route("/{shipment_id}/pdf", get(handlers::certificates::certificate_pdf))
        .layer(axum_middleware::from_fn_with_state(app_state.clone(), auth_guard));

    // Edge function: CORS aberto, sem autenticação
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);
    let function_routes = Router::new()
        .route(
            "/issue-vc",
            post(handlers::functions::issue_vc).options(handlers::functions::issue_vc_preflight),
        )
        .layer(cors);

    // Combina tudo no router principal
    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route("/api/verify/{id}", get(handlers::certificates::verify_certificate))
        .route("/storage/documents", get(handlers::documents::download_signed))
        .nest("/api/auth", auth_routes)
        .nest("/api/users", user_routes)
        .nest("/api/shipments", shipment_routes)
        .nest("/api/documents", document_routes)
        .nest("/api/certificates", certificate_routes)
        .nest("/functions/v1", function_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            auth::Principal,
            shipment::{QualityCriterion, ShipmentPatch, ShipmentStatus},
        },
        services::shipment_service::tests::beans,
        sync::{memory::MemoryStore, ShipmentStore},
    };
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt; // for `oneshot`
    use uuid::Uuid;

    struct TestApp {
        router: Router,
        store: Arc<MemoryStore>,
        _dir: TempDir,
    }

    fn test_app() -> TestApp {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let state = AppState::for_tests(store.clone(), dir.path());
        TestApp { router: build_router(state), store, _dir: dir }
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, body)
    }

    fn issue_vc_request(body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/functions/v1/issue-vc")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ORIGIN, "https://app.example")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn seeded_shipment(store: &MemoryStore) -> Uuid {
        let exporter = Uuid::new_v4();
        let principal = Principal::User { id: exporter, role: crate::models::auth::UserRole::Exporter };
        store.insert(&principal, exporter, &beans()).await.unwrap().id
    }

    #[tokio::test]
    async fn health_check_is_public() {
        let app = test_app();
        let response = app
            .router
            .clone()
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_routes_require_a_bearer_token() {
        let app = test_app();
        let (status, _, body) = send(
            &app.router,
            Request::builder().uri("/api/shipments").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn issue_vc_without_shipment_id_is_a_bad_request() {
        let app = test_app();
        let (status, headers, body) = send(&app.router, issue_vc_request("{}")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "shipmentId required");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn issue_vc_for_unknown_shipment_is_not_found() {
        let app = test_app();
        let body = format!(r#"{{"shipmentId":"{}"}}"#, Uuid::new_v4());
        let (status, _, body) = send(&app.router, issue_vc_request(&body)).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn issue_vc_marks_the_shipment() {
        let app = test_app();
        let id = seeded_shipment(&app.store).await;

        let body = format!(r#"{{"shipmentId":"{}"}}"#, id);
        let (status, headers, body) = send(&app.router, issue_vc_request(&body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "VC issued successfully");
        let vc_id = body["vc_id"].as_str().unwrap();
        assert!(vc_id.starts_with(&format!("vc-{}-", id)));

        let stored = app.store.get(&Principal::Service, id).await.unwrap().unwrap();
        assert_eq!(stored.vc_status.as_deref(), Some("issued"));
        assert_eq!(stored.vc_id.as_deref(), Some(vc_id));
    }

    #[tokio::test]
    async fn issue_vc_answers_preflight() {
        let app = test_app();
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/functions/v1/issue-vc")
            .header(header::ORIGIN, "https://app.example")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
            .body(Body::empty())
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();

        assert!(response.status().is_success());
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        let methods = response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
        assert!(methods.contains("POST") && methods.contains("OPTIONS"));
    }

    #[tokio::test]
    async fn public_verification_only_reports_issued_certificates() {
        let app = test_app();
        let id = seeded_shipment(&app.store).await;
        let uri = format!("/api/verify/{}", id);

        let (status, _, _) = send(&app.router, Request::builder().uri(&uri).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // Inspeção aprovada + emissão direto no store
        let qa = Principal::User { id: Uuid::new_v4(), role: crate::models::auth::UserRole::Qa };
        let patch = ShipmentPatch {
            status: Some(ShipmentStatus::InspectedPass),
            quality_criterion: Some(QualityCriterion {
                name: "Moisture Content".into(),
                value: Some("12.5".into()),
            }),
            ..Default::default()
        };
        let inspected = app.store.update(&qa, id, &patch).await.unwrap();
        let draft = crate::models::certificate::Certificate::draft_for(&inspected, "Agro QA Labs");
        app.store.issue_certificate(&qa, &draft).await.unwrap();

        let (status, _, body) = send(&app.router, Request::builder().uri(&uri).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"], "Pass");
    }
}
