// src/handlers/portfolio.rs

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{
        db_utils::get_rls_connection,
        error::{ApiError, AppError},
    },
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        extract::{AppJson, AppPath, AppQuery},
        i18n::Locale,
        tenancy::TenantContext,
    },
    models::portfolio::{
        Claim, Commission, CommissionSummary, Consortium, Financing, HealthPlan, NewClaim,
        NewCommission, NewConsortium, NewFinancing, NewHealthPlan, NewPolicy, Policy,
    },
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ClientFilter {
    /// Restringe ao cliente informado
    pub cliente_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PolicyFilter {
    /// Restringe à apólice informada
    pub apolice_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct MarkReceivedPayload {
    // Padrão: hoje
    #[schema(value_type = Option<String>, format = Date)]
    pub recebida_em: Option<NaiveDate>,
}

// =============================================================================
//  APÓLICES
// =============================================================================

// POST /api/apolices
#[utoipa::path(
    post,
    path = "/api/apolices",
    tag = "Carteira",
    request_body = NewPolicy,
    responses(
        (status = 201, description = "Apólice criada", body = Policy),
        (status = 400, description = "Dados inválidos"),
        (status = 404, description = "Cliente não encontrado"),
        (status = 409, description = "Número de apólice já cadastrado")
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID da Corretora")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_policy(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    AppJson(payload): AppJson<NewPolicy>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state.db_pool, tenant.0, user.0.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let created = app_state
        .portfolio_service
        .create_policy(&mut *rls_conn, tenant.0, &payload)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(created)))
}

// GET /api/apolices
#[utoipa::path(
    get,
    path = "/api/apolices",
    tag = "Carteira",
    responses(
        (status = 200, description = "Apólices", body = Vec<Policy>)
    ),
    params(
        ClientFilter,
        ("x-tenant-id" = Uuid, Header, description = "ID da Corretora")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_policies(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    AppQuery(filter): AppQuery<ClientFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state.db_pool, tenant.0, user.0.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let items = app_state
        .portfolio_service
        .list_policies(&mut *rls_conn, tenant.0, filter.cliente_id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(items)))
}

// GET /api/apolices/{id}
#[utoipa::path(
    get,
    path = "/api/apolices/{id}",
    tag = "Carteira",
    responses(
        (status = 200, description = "Apólice", body = Policy),
        (status = 404, description = "Apólice não encontrada")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da apólice"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Corretora")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_policy(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    AppPath(policy_id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state.db_pool, tenant.0, user.0.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let policy = app_state
        .portfolio_service
        .get_policy(&mut *rls_conn, tenant.0, policy_id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(policy)))
}

// =============================================================================
//  SINISTROS
// =============================================================================

// POST /api/sinistros
#[utoipa::path(
    post,
    path = "/api/sinistros",
    tag = "Carteira",
    request_body = NewClaim,
    responses(
        (status = 201, description = "Sinistro aberto", body = Claim),
        (status = 400, description = "Dados inválidos"),
        (status = 404, description = "Cliente ou apólice não encontrados"),
        (status = 422, description = "Apólice de outro cliente")
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID da Corretora")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_claim(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    AppJson(payload): AppJson<NewClaim>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state.db_pool, tenant.0, user.0.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let created = app_state
        .portfolio_service
        .create_claim(&mut *rls_conn, tenant.0, &payload)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(created)))
}

// GET /api/sinistros
#[utoipa::path(
    get,
    path = "/api/sinistros",
    tag = "Carteira",
    responses(
        (status = 200, description = "Sinistros", body = Vec<Claim>)
    ),
    params(
        ClientFilter,
        ("x-tenant-id" = Uuid, Header, description = "ID da Corretora")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_claims(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    AppQuery(filter): AppQuery<ClientFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state.db_pool, tenant.0, user.0.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let items = app_state
        .portfolio_service
        .list_claims(&mut *rls_conn, tenant.0, filter.cliente_id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(items)))
}

// =============================================================================
//  CONSÓRCIOS
// =============================================================================

// POST /api/consorcios
#[utoipa::path(
    post,
    path = "/api/consorcios",
    tag = "Carteira",
    request_body = NewConsortium,
    responses(
        (status = 201, description = "Consórcio cadastrado", body = Consortium),
        (status = 400, description = "Dados inválidos"),
        (status = 404, description = "Cliente não encontrado")
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID da Corretora")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_consortium(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    AppJson(payload): AppJson<NewConsortium>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state.db_pool, tenant.0, user.0.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let created = app_state
        .portfolio_service
        .create_consortium(&mut *rls_conn, tenant.0, &payload)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(created)))
}

// GET /api/consorcios
#[utoipa::path(
    get,
    path = "/api/consorcios",
    tag = "Carteira",
    responses(
        (status = 200, description = "Consórcios", body = Vec<Consortium>)
    ),
    params(
        ClientFilter,
        ("x-tenant-id" = Uuid, Header, description = "ID da Corretora")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_consortiums(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    AppQuery(filter): AppQuery<ClientFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state.db_pool, tenant.0, user.0.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let items = app_state
        .portfolio_service
        .list_consortiums(&mut *rls_conn, tenant.0, filter.cliente_id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(items)))
}

// =============================================================================
//  PLANOS DE SAÚDE
// =============================================================================

// POST /api/planos-saude
#[utoipa::path(
    post,
    path = "/api/planos-saude",
    tag = "Carteira",
    request_body = NewHealthPlan,
    responses(
        (status = 201, description = "Plano de saúde cadastrado", body = HealthPlan),
        (status = 400, description = "Dados inválidos"),
        (status = 404, description = "Cliente não encontrado")
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID da Corretora")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_health_plan(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    AppJson(payload): AppJson<NewHealthPlan>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state.db_pool, tenant.0, user.0.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let created = app_state
        .portfolio_service
        .create_health_plan(&mut *rls_conn, tenant.0, &payload)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(created)))
}

// GET /api/planos-saude
#[utoipa::path(
    get,
    path = "/api/planos-saude",
    tag = "Carteira",
    responses(
        (status = 200, description = "Planos de saúde", body = Vec<HealthPlan>)
    ),
    params(
        ClientFilter,
        ("x-tenant-id" = Uuid, Header, description = "ID da Corretora")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_health_plans(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    AppQuery(filter): AppQuery<ClientFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state.db_pool, tenant.0, user.0.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let items = app_state
        .portfolio_service
        .list_health_plans(&mut *rls_conn, tenant.0, filter.cliente_id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(items)))
}

// =============================================================================
//  FINANCIAMENTOS
// =============================================================================

// POST /api/financiamentos
#[utoipa::path(
    post,
    path = "/api/financiamentos",
    tag = "Carteira",
    request_body = NewFinancing,
    responses(
        (status = 201, description = "Financiamento cadastrado", body = Financing),
        (status = 400, description = "Dados inválidos"),
        (status = 404, description = "Cliente não encontrado")
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID da Corretora")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_financing(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    AppJson(payload): AppJson<NewFinancing>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state.db_pool, tenant.0, user.0.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let created = app_state
        .portfolio_service
        .create_financing(&mut *rls_conn, tenant.0, &payload)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(created)))
}

// GET /api/financiamentos
#[utoipa::path(
    get,
    path = "/api/financiamentos",
    tag = "Carteira",
    responses(
        (status = 200, description = "Financiamentos", body = Vec<Financing>)
    ),
    params(
        ClientFilter,
        ("x-tenant-id" = Uuid, Header, description = "ID da Corretora")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_financings(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    AppQuery(filter): AppQuery<ClientFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state.db_pool, tenant.0, user.0.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let items = app_state
        .portfolio_service
        .list_financings(&mut *rls_conn, tenant.0, filter.cliente_id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(items)))
}

// =============================================================================
//  COMISSÕES
// =============================================================================

// POST /api/comissoes
#[utoipa::path(
    post,
    path = "/api/comissoes",
    tag = "Carteira",
    request_body = NewCommission,
    responses(
        (status = 201, description = "Comissão lançada (valor padrão: prêmio x taxa)", body = Commission),
        (status = 400, description = "Dados inválidos"),
        (status = 404, description = "Apólice não encontrada")
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID da Corretora")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_commission(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    AppJson(payload): AppJson<NewCommission>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state.db_pool, tenant.0, user.0.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let created = app_state
        .portfolio_service
        .create_commission(&mut *rls_conn, tenant.0, &payload)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(created)))
}

// GET /api/comissoes
#[utoipa::path(
    get,
    path = "/api/comissoes",
    tag = "Carteira",
    responses(
        (status = 200, description = "Comissões (por vencimento)", body = Vec<Commission>)
    ),
    params(
        PolicyFilter,
        ("x-tenant-id" = Uuid, Header, description = "ID da Corretora")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_commissions(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    AppQuery(filter): AppQuery<PolicyFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state.db_pool, tenant.0, user.0.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let items = app_state
        .portfolio_service
        .list_commissions(&mut *rls_conn, tenant.0, filter.apolice_id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(items)))
}

// POST /api/comissoes/{id}/recebida
#[utoipa::path(
    post,
    path = "/api/comissoes/{id}/recebida",
    tag = "Carteira",
    request_body = MarkReceivedPayload,
    responses(
        (status = 200, description = "Comissão baixada como recebida", body = Commission),
        (status = 404, description = "Comissão não encontrada")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da comissão"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Corretora")
    ),
    security(("api_jwt" = []))
)]
pub async fn mark_commission_received(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    AppPath(commission_id): AppPath<Uuid>,
    payload: Option<AppJson<MarkReceivedPayload>>,
) -> Result<impl IntoResponse, ApiError> {
    let AppJson(payload) = payload.unwrap_or_default();
    let received_on = payload.recebida_em.unwrap_or_else(|| Utc::now().date_naive());

    let mut rls_conn = get_rls_connection(&app_state.db_pool, tenant.0, user.0.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let commission = app_state
        .portfolio_service
        .mark_commission_received(&mut *rls_conn, tenant.0, commission_id, received_on)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(commission)))
}

// GET /api/comissoes/resumo
#[utoipa::path(
    get,
    path = "/api/comissoes/resumo",
    tag = "Carteira",
    responses(
        (status = 200, description = "Totais pendentes e recebidos", body = CommissionSummary)
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID da Corretora")
    ),
    security(("api_jwt" = []))
)]
pub async fn commission_summary(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state.db_pool, tenant.0, user.0.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let summary = app_state
        .portfolio_service
        .commission_summary(&mut *rls_conn, tenant.0)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(summary)))
}
