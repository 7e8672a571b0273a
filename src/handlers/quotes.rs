// src/handlers/quotes.rs

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use serde::{
    de::{value::StringDeserializer, IntoDeserializer},
    Deserialize, Deserializer,
};
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
    models::quote::{ClientDraft, LossReason, NewQuotePayload, Quote, QuoteTransition},
    services::quote_service::StatusChange,
};

// =============================================================================
//  PAYLOADS
// =============================================================================

/// Mudança de fase vinda do kanban (arrastar o card) ou dos modais de ganho/perda
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateQuoteStatusPayload {
    #[validate(length(min = 1, message = "Informe a fase de destino."))]
    #[schema(example = "won")]
    pub status_pipeline: String,

    // Obrigatório só para "lost"; "" (select sem escolha) conta como ausente
    #[serde(default, deserialize_with = "blank_loss_reason")]
    pub motivo_perda: Option<LossReason>,

    #[validate(length(max = 2000, message = "Observação muito longa."))]
    pub notas: Option<String>,

    // Obrigatório para "won" (completado com os dados da cotação)
    #[validate(nested)]
    pub dados_cliente: Option<ClientDraft>,

    // Versão lida pelo cliente; se divergir, 409
    #[schema(example = 3)]
    pub versao: Option<i32>,
}

impl UpdateQuoteStatusPayload {
    fn into_change(self) -> StatusChange {
        StatusChange {
            target: self.status_pipeline.trim().to_string(),
            loss_reason: self.motivo_perda,
            notes: self.notas,
            client_draft: self.dados_cliente,
            expected_version: self.versao,
        }
    }
}

fn blank_loss_reason<'de, D>(deserializer: D) -> Result<Option<LossReason>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => {
            let value: StringDeserializer<D::Error> = raw.trim().to_string().into_deserializer();
            LossReason::deserialize(value).map(Some)
        }
        _ => Ok(None),
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct FollowUpPayload {
    #[schema(value_type = String, format = Date, example = "2025-03-10")]
    pub proximo_contato: NaiveDate,

    #[validate(length(max = 2000, message = "Observação muito longa."))]
    pub notas: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuotesQuery {
    /// Filtra por chave de fase
    pub status: Option<String>,
}

// =============================================================================
//  CRUD
// =============================================================================

// POST /api/cotacoes
#[utoipa::path(
    post,
    path = "/api/cotacoes",
    tag = "Cotações",
    request_body = NewQuotePayload,
    responses(
        (status = 201, description = "Cotação criada na primeira fase em aberto", body = Quote),
        (status = 400, description = "Dados inválidos"),
        (status = 404, description = "Cliente não encontrado")
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID da Corretora")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_quote(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    AppJson(payload): AppJson<NewQuotePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state.db_pool, tenant.0, user.0.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let quote = app_state
        .quote_service
        .create_quote(&mut *rls_conn, tenant.0, &payload)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(quote)))
}

// GET /api/cotacoes
#[utoipa::path(
    get,
    path = "/api/cotacoes",
    tag = "Cotações",
    responses(
        (status = 200, description = "Cotações (mais recentes primeiro)", body = Vec<Quote>)
    ),
    params(
        ListQuotesQuery,
        ("x-tenant-id" = Uuid, Header, description = "ID da Corretora")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_quotes(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    AppQuery(query): AppQuery<ListQuotesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state.db_pool, tenant.0, user.0.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let quotes = app_state
        .quote_service
        .list_quotes(&mut *rls_conn, tenant.0, query.status.as_deref())
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(quotes)))
}

// GET /api/cotacoes/{id}
#[utoipa::path(
    get,
    path = "/api/cotacoes/{id}",
    tag = "Cotações",
    responses(
        (status = 200, description = "Cotação", body = Quote),
        (status = 404, description = "Cotação não encontrada")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da cotação"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Corretora")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_quote(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    AppPath(quote_id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state.db_pool, tenant.0, user.0.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let quote = app_state
        .quote_service
        .get_quote(&mut *rls_conn, tenant.0, quote_id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(quote)))
}

// =============================================================================
//  TRANSIÇÕES
// =============================================================================

// PUT /api/cotacoes/{id}
#[utoipa::path(
    put,
    path = "/api/cotacoes/{id}",
    tag = "Cotações",
    request_body = UpdateQuoteStatusPayload,
    responses(
        (status = 200, description = "Cotação na nova fase", body = Quote),
        (status = 404, description = "Cotação não encontrada"),
        (status = 409, description = "Versão desatualizada"),
        (status = 422, description = "Fase desconhecida, motivo de perda ou dados do cliente ausentes")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da cotação"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Corretora")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_quote_status(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    AppPath(quote_id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateQuoteStatusPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let change = payload.into_change();

    let mut rls_conn = get_rls_connection(&app_state.db_pool, tenant.0, user.0.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let quote = app_state
        .quote_service
        .change_status(&mut *rls_conn, tenant.0, user.0.id, quote_id, &change)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(quote)))
}

// POST /api/cotacoes/{id}/follow-up
#[utoipa::path(
    post,
    path = "/api/cotacoes/{id}/follow-up",
    tag = "Cotações",
    request_body = FollowUpPayload,
    responses(
        (status = 200, description = "Próximo contato agendado", body = Quote),
        (status = 404, description = "Cotação não encontrada")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da cotação"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Corretora")
    ),
    security(("api_jwt" = []))
)]
pub async fn schedule_follow_up(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    AppPath(quote_id): AppPath<Uuid>,
    AppJson(payload): AppJson<FollowUpPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state.db_pool, tenant.0, user.0.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let quote = app_state
        .quote_service
        .schedule_follow_up(
            &mut *rls_conn,
            tenant.0,
            quote_id,
            payload.proximo_contato,
            payload.notas.as_deref(),
        )
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(quote)))
}

// GET /api/cotacoes/{id}/historico
#[utoipa::path(
    get,
    path = "/api/cotacoes/{id}/historico",
    tag = "Cotações",
    responses(
        (status = 200, description = "Transições da cotação (mais recentes primeiro)", body = Vec<QuoteTransition>),
        (status = 404, description = "Cotação não encontrada")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da cotação"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Corretora")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_history(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    AppPath(quote_id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state.db_pool, tenant.0, user.0.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let history = app_state
        .quote_service
        .history(&mut *rls_conn, tenant.0, quote_id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(history)))
}

// GET /api/cotacoes/{id}/rascunho-cliente
#[utoipa::path(
    get,
    path = "/api/cotacoes/{id}/rascunho-cliente",
    tag = "Cotações",
    responses(
        (status = 200, description = "Dados do cliente pré-preenchidos para o modal de ganho", body = ClientDraft),
        (status = 404, description = "Cotação não encontrada")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da cotação"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Corretora")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_client_draft(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    AppPath(quote_id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state.db_pool, tenant.0, user.0.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let draft = app_state
        .quote_service
        .draft_for_quote(&mut *rls_conn, tenant.0, quote_id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(draft)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::quote_service::{
        plan_transition,
        tests::{default_phases, quote_in},
    };
    use serde_json::json;

    fn parse(body: serde_json::Value) -> UpdateQuoteStatusPayload {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn blank_loss_reason_is_treated_as_missing() {
        assert_eq!(parse(json!({ "status_pipeline": "lost", "motivo_perda": "" })).motivo_perda, None);
        assert_eq!(parse(json!({ "status_pipeline": "lost", "motivo_perda": "  " })).motivo_perda, None);
        assert_eq!(parse(json!({ "status_pipeline": "lost", "motivo_perda": null })).motivo_perda, None);
        assert_eq!(parse(json!({ "status_pipeline": "lost" })).motivo_perda, None);
    }

    #[test]
    fn loss_reason_accepts_known_values_only() {
        assert_eq!(
            parse(json!({ "status_pipeline": "lost", "motivo_perda": "price" })).motivo_perda,
            Some(LossReason::Price)
        );
        assert_eq!(
            parse(json!({ "status_pipeline": "lost", "motivo_perda": "no-response" })).motivo_perda,
            Some(LossReason::NoResponse)
        );

        let unknown = serde_json::from_value::<UpdateQuoteStatusPayload>(
            json!({ "status_pipeline": "lost", "motivo_perda": "azar" }),
        );
        assert!(unknown.is_err());
    }

    #[test]
    fn losing_with_blank_reason_asks_for_the_reason() {
        let change = parse(json!({ "status_pipeline": " lost ", "motivo_perda": "" })).into_change();
        assert_eq!(change.target, "lost");

        let result = plan_transition(&quote_in("quoting"), &default_phases(), &change, None);
        assert!(matches!(result, Err(AppError::LossReasonRequired)));
    }
}
