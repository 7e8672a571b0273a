// src/handlers/pipeline.rs

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
use validator::{Validate, ValidationError};

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
    models::{
        pipeline::{BoardOptions, PipelineBoard, PipelinePhase},
        quote::Quote,
    },
    services::pipeline_service::PhaseOrder,
};

// =============================================================================
//  PAYLOADS
// =============================================================================

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("O nome da fase não pode ficar em branco.".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePhasePayload {
    #[validate(
        length(min = 1, max = 60, message = "O nome da fase deve ter entre 1 e 60 caracteres."),
        custom(function = "not_blank")
    )]
    #[schema(example = "Em Negociação")]
    pub nome: String,

    #[validate(length(min = 1, max = 32, message = "Cor inválida."))]
    #[schema(example = "amber")]
    pub cor: Option<String>,

    // Sem ordem: a fase entra no fim do funil
    #[schema(example = 4)]
    pub ordem: Option<i32>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdatePhasePayload {
    #[validate(
        length(min = 1, max = 60, message = "O nome da fase deve ter entre 1 e 60 caracteres."),
        custom(function = "not_blank")
    )]
    pub nome: Option<String>,

    #[validate(length(min = 1, max = 32, message = "Cor inválida."))]
    pub cor: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ReorderPhasesPayload {
    #[validate(length(min = 1, message = "Informe a nova ordem das fases."))]
    pub ordem: Vec<PhaseOrder>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FollowUpQuery {
    /// Data limite (inclusive). Padrão: hoje.
    #[param(value_type = Option<String>, format = Date)]
    pub ate: Option<NaiveDate>,
}

// =============================================================================
//  FASES
// =============================================================================

// GET /api/pipeline/fases
#[utoipa::path(
    get,
    path = "/api/pipeline/fases",
    tag = "Pipeline",
    responses(
        (status = 200, description = "Fases do funil em ordem", body = Vec<PipelinePhase>)
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID da Corretora")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_phases(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state.db_pool, tenant.0, user.0.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let phases = app_state
        .pipeline_service
        .list_phases(&mut *rls_conn, tenant.0)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(phases)))
}

// POST /api/pipeline/fases
#[utoipa::path(
    post,
    path = "/api/pipeline/fases",
    tag = "Pipeline",
    request_body = CreatePhasePayload,
    responses(
        (status = 201, description = "Fase criada", body = PipelinePhase),
        (status = 400, description = "Dados inválidos"),
        (status = 422, description = "Nome sem caracteres válidos")
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID da Corretora")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_phase(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    AppJson(payload): AppJson<CreatePhasePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state.db_pool, tenant.0, user.0.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let phase = app_state
        .pipeline_service
        .create_phase(
            &mut *rls_conn,
            tenant.0,
            &payload.nome,
            payload.cor.as_deref(),
            payload.ordem,
        )
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(phase)))
}

// PUT /api/pipeline/fases/{id}
#[utoipa::path(
    put,
    path = "/api/pipeline/fases/{id}",
    tag = "Pipeline",
    request_body = UpdatePhasePayload,
    responses(
        (status = 200, description = "Fase atualizada (chave e ordem não mudam)", body = PipelinePhase),
        (status = 404, description = "Fase não encontrada")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da fase"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Corretora")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_phase(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    AppPath(phase_id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdatePhasePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state.db_pool, tenant.0, user.0.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let phase = app_state
        .pipeline_service
        .update_phase(
            &mut *rls_conn,
            tenant.0,
            phase_id,
            payload.nome.as_deref(),
            payload.cor.as_deref(),
        )
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(phase)))
}

// POST /api/pipeline/fases/reordenar
#[utoipa::path(
    post,
    path = "/api/pipeline/fases/reordenar",
    tag = "Pipeline",
    request_body = ReorderPhasesPayload,
    responses(
        (status = 200, description = "Fases renumeradas de 1 a n", body = Vec<PipelinePhase>),
        (status = 422, description = "Lista incompleta, repetida ou fases de sistema fora de ordem")
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID da Corretora")
    ),
    security(("api_jwt" = []))
)]
pub async fn reorder_phases(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    AppJson(payload): AppJson<ReorderPhasesPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state.db_pool, tenant.0, user.0.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let phases = app_state
        .pipeline_service
        .reorder_phases(&mut *rls_conn, tenant.0, &payload.ordem)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(phases)))
}

// DELETE /api/pipeline/fases/{id}
#[utoipa::path(
    delete,
    path = "/api/pipeline/fases/{id}",
    tag = "Pipeline",
    responses(
        (status = 204, description = "Fase removida"),
        (status = 404, description = "Fase não encontrada"),
        (status = 422, description = "Fase de sistema ou em uso por cotações")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da fase"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Corretora")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_phase(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    AppPath(phase_id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state.db_pool, tenant.0, user.0.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    app_state
        .pipeline_service
        .delete_phase(&mut *rls_conn, tenant.0, phase_id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
//  QUADRO E FOLLOW-UPS
// =============================================================================

// GET /api/pipeline/board
#[utoipa::path(
    get,
    path = "/api/pipeline/board",
    tag = "Pipeline",
    responses(
        (status = 200, description = "Kanban: uma coluna por fase (+ coluna 'unknown' se houver)", body = PipelineBoard)
    ),
    params(
        BoardOptions,
        ("x-tenant-id" = Uuid, Header, description = "ID da Corretora")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_board(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    AppQuery(options): AppQuery<BoardOptions>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state.db_pool, tenant.0, user.0.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let board = app_state
        .board_service
        .load_board(&mut *rls_conn, tenant.0, options)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(board)))
}

// GET /api/pipeline/follow-ups
#[utoipa::path(
    get,
    path = "/api/pipeline/follow-ups",
    tag = "Pipeline",
    responses(
        (status = 200, description = "Cotações em aberto com contato agendado até a data", body = Vec<Quote>)
    ),
    params(
        FollowUpQuery,
        ("x-tenant-id" = Uuid, Header, description = "ID da Corretora")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_follow_ups(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    AppQuery(query): AppQuery<FollowUpQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let until = query.ate.unwrap_or_else(|| Utc::now().date_naive());

    let mut rls_conn = get_rls_connection(&app_state.db_pool, tenant.0, user.0.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let quotes = app_state
        .quote_service
        .list_due_follow_ups(&mut *rls_conn, tenant.0, until)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(quotes)))
}
