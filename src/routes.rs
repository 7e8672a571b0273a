// src/routes.rs

use anyhow::Context;
use axum::{
    http::HeaderValue,
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

use crate::{
    config::AppState,
    docs::ApiDoc,
    handlers,
    middleware::auth::{auth_guard, tenant_guard},
};

/// CORS do frontend: origem única se configurada, senão liberado (desenvolvimento)
pub fn cors_layer(allowed_origin: Option<&str>) -> anyhow::Result<CorsLayer> {
    match allowed_origin {
        Some(origin) => {
            let origin: HeaderValue = origin
                .trim()
                .parse()
                .with_context(|| format!("CORS_ALLOWED_ORIGIN inválida: {}", origin))?;
            Ok(CorsLayer::new()
                .allow_origin(origin)
                .allow_methods(Any)
                .allow_headers(Any))
        }
        None => Ok(CorsLayer::permissive()),
    }
}

pub fn build_router(app_state: AppState, cors: CorsLayer) -> Router {
    // Rotas de autenticação (públicas)
    let auth_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login));

    // Rotas que exigem apenas o JWT
    let user_routes = Router::new()
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/users/me", get(handlers::auth::get_me))
        .route(
            "/api/tenants",
            post(handlers::tenancy::create_tenant).get(handlers::tenancy::list_my_tenants),
        )
        .route_layer(axum_middleware::from_fn_with_state(app_state.clone(), auth_guard));

    // =========================================================================
    //  ROTAS DA CORRETORA (JWT + X-Tenant-ID)
    // =========================================================================

    let pipeline_routes = Router::new()
        .route(
            "/fases",
            get(handlers::pipeline::list_phases).post(handlers::pipeline::create_phase),
        )
        .route("/fases/reordenar", post(handlers::pipeline::reorder_phases))
        .route(
            "/fases/{id}",
            put(handlers::pipeline::update_phase).delete(handlers::pipeline::delete_phase),
        )
        .route("/board", get(handlers::pipeline::get_board))
        .route("/follow-ups", get(handlers::pipeline::list_follow_ups));

    let quote_routes = Router::new()
        .route(
            "/",
            post(handlers::quotes::create_quote).get(handlers::quotes::list_quotes),
        )
        .route(
            "/{id}",
            get(handlers::quotes::get_quote).put(handlers::quotes::update_quote_status),
        )
        .route("/{id}/follow-up", post(handlers::quotes::schedule_follow_up))
        .route("/{id}/historico", get(handlers::quotes::get_history))
        .route("/{id}/rascunho-cliente", get(handlers::quotes::get_client_draft));

    let client_routes = Router::new()
        .route(
            "/",
            post(handlers::clients::create_client).get(handlers::clients::list_clients),
        )
        .route(
            "/{id}",
            get(handlers::clients::get_client)
                .put(handlers::clients::update_client)
                .delete(handlers::clients::deactivate_client),
        )
        .route("/{id}/resumo-360", get(handlers::clients::client_overview));

    let portfolio_routes = Router::new()
        .route(
            "/api/apolices",
            post(handlers::portfolio::create_policy).get(handlers::portfolio::list_policies),
        )
        .route("/api/apolices/{id}", get(handlers::portfolio::get_policy))
        .route(
            "/api/sinistros",
            post(handlers::portfolio::create_claim).get(handlers::portfolio::list_claims),
        )
        .route(
            "/api/consorcios",
            post(handlers::portfolio::create_consortium).get(handlers::portfolio::list_consortiums),
        )
        .route(
            "/api/planos-saude",
            post(handlers::portfolio::create_health_plan).get(handlers::portfolio::list_health_plans),
        )
        .route(
            "/api/financiamentos",
            post(handlers::portfolio::create_financing).get(handlers::portfolio::list_financings),
        )
        .route(
            "/api/comissoes",
            post(handlers::portfolio::create_commission).get(handlers::portfolio::list_commissions),
        )
        .route("/api/comissoes/resumo", get(handlers::portfolio::commission_summary))
        .route(
            "/api/comissoes/{id}/recebida",
            post(handlers::portfolio::mark_commission_received),
        );

    let tenant_routes = Router::new()
        .nest("/api/pipeline", pipeline_routes)
        .nest("/api/cotacoes", quote_routes)
        .nest("/api/clientes", client_routes)
        .merge(portfolio_routes)
        .route_layer(axum_middleware::from_fn_with_state(app_state.clone(), tenant_guard));

    // Combina tudo no router principal
    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/auth", auth_routes)
        .merge(user_routes)
        .merge(tenant_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    // A pool é preguiçosa: nenhuma destas rotas chega ao banco
    fn test_router() -> Router {
        let config = Config::from_lookup(|key| match key {
            "DATABASE_URL" => Some("postgres://localhost/corretora_test".to_string()),
            "JWT_SECRET" => Some("segredo-de-teste".to_string()),
            _ => None,
        })
        .unwrap();
        let pool = PgPoolOptions::new().connect_lazy(&config.database_url).unwrap();
        let state = AppState::from_pool(pool, &config).unwrap();
        build_router(state, cors_layer(None).unwrap())
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_answers_ok() {
        let app = test_router();
        let req = Request::builder().uri("/api/health").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"OK");
    }

    #[tokio::test]
    async fn tenant_routes_require_a_token() {
        let app = test_router();
        let req = Request::builder()
            .uri("/api/pipeline/board")
            .header("x-tenant-id", uuid::Uuid::new_v4().to_string())
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let body = body_json(resp).await;
        assert_eq!(body["error"], "Token de autenticação inválido ou ausente.");
    }

    #[tokio::test]
    async fn error_message_follows_accept_language() {
        let app = test_router();
        let req = Request::builder()
            .method("PUT")
            .uri(format!("/api/cotacoes/{}", uuid::Uuid::new_v4()))
            .header("accept-language", "en-US,en;q=0.9")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let body = body_json(resp).await;
        assert_eq!(body["error"], "Authentication token is invalid or missing.");
    }

    #[tokio::test]
    async fn forged_token_is_rejected() {
        let app = test_router();
        let req = Request::builder()
            .uri("/api/users/me")
            .header("authorization", "Bearer nao.e.um.jwt")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn user_routes_require_a_token() {
        let app = test_router();
        let req = Request::builder().uri("/api/tenants").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let app = test_router();
        let req = Request::builder().uri("/api/estoque").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn openapi_document_lists_pipeline_paths() {
        let app = test_router();
        let req = Request::builder()
            .uri("/api-docs/openapi.json")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let doc = body_json(resp).await;
        assert!(doc["paths"]["/api/pipeline/board"].is_object());
        assert!(doc["paths"]["/api/cotacoes/{id}"]["put"].is_object());
        assert!(doc["components"]["securitySchemes"]["api_jwt"].is_object());
    }

    #[tokio::test]
    async fn board_history_and_draft_routes_are_guarded() {
        let quote_id = uuid::Uuid::new_v4();
        let uris = [
            "/api/pipeline/board".to_string(),
            format!("/api/cotacoes/{}/historico", quote_id),
            format!("/api/cotacoes/{}/rascunho-cliente", quote_id),
        ];

        for uri in uris {
            let req = Request::builder().uri(&uri).body(Body::empty()).unwrap();
            let resp = test_router().oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        }
    }

    #[tokio::test]
    async fn malformed_json_body_gets_a_json_error() {
        let app = test_router();
        let req = Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"email": 1"#))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(resp.headers()["content-type"], "application/json");

        let body = body_json(resp).await;
        assert!(body["error"].as_str().unwrap().starts_with("Requisição malformada:"));
    }

    #[tokio::test]
    async fn body_without_json_content_type_is_rejected_in_the_client_language() {
        let app = test_router();
        let req = Request::builder()
            .method("POST")
            .uri("/api/auth/register")
            .header("accept-language", "en")
            .body(Body::from(r#"{"email": "a@b.com", "password": "12345678"}"#))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let body = body_json(resp).await;
        assert!(body["error"].as_str().unwrap().starts_with("Malformed request:"));
    }

    #[test]
    fn cors_rejects_malformed_origin() {
        assert!(cors_layer(Some("http://localhost:5173")).is_ok());
        assert!(cors_layer(Some("http://bad\norigin")).is_err());
    }
}
