use std::collections::HashMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::{common::i18n::I18nStore, middleware::i18n::Locale};

// Nosso tipo de erro de domínio/infra. Vira `ApiError` na borda HTTP.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("E-mail já existe")]
    EmailAlreadyExists,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Requisição malformada: {0}")]
    MalformedRequest(String),

    #[error("Recurso não encontrado: {0}")]
    ResourceNotFound(String),

    #[error("Violação de unicidade: {0}")]
    UniqueConstraintViolation(String),

    #[error("Cabeçalho X-Tenant-ID ausente")]
    MissingTenantHeader,

    #[error("Cabeçalho X-Tenant-ID inválido")]
    InvalidTenantHeader,

    #[error("Usuário sem acesso à corretora")]
    TenantAccessDenied,

    #[error("Corretora '{0}' já existe para este usuário")]
    TenantNameAlreadyExists(String),

    // --- Funil ---
    #[error("Nome de fase sem caracteres válidos")]
    InvalidPhaseName,

    #[error("Fase de sistema protegida: {0}")]
    SystemPhaseProtected(String),

    #[error("Fase '{key}' em uso por {count} cotações")]
    PhaseInUse { key: String, count: i64 },

    #[error("Fase desconhecida: {0}")]
    UnknownPhase(String),

    #[error("Reordenação incompleta: {expected} esperadas, {received} recebidas")]
    ReorderIncomplete { expected: usize, received: usize },

    #[error("Fase repetida na reordenação: {0}")]
    ReorderDuplicate(Uuid),

    #[error("Fase fora do funil: {0}")]
    ReorderUnknownPhase(Uuid),

    #[error("Motivo de perda obrigatório")]
    LossReasonRequired,

    #[error("Dados do cliente obrigatórios")]
    ClientDraftRequired,

    #[error("CPF/CNPJ inválido")]
    InvalidTaxId,

    #[error("Conflito de versão (atual {current})")]
    VersionConflict { current: i32 },

    // --- Carteira ---
    #[error("Apólice não pertence ao cliente")]
    PolicyClientMismatch,

    // Variante para erros de banco de dados
    #[error("Erro de banco de dados: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_)
            | AppError::MalformedRequest(_)
            | AppError::MissingTenantHeader
            | AppError::InvalidTenantHeader => StatusCode::BAD_REQUEST,

            AppError::InvalidCredentials | AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::TenantAccessDenied => StatusCode::FORBIDDEN,
            AppError::ResourceNotFound(_) => StatusCode::NOT_FOUND,

            AppError::EmailAlreadyExists
            | AppError::UniqueConstraintViolation(_)
            | AppError::TenantNameAlreadyExists(_)
            | AppError::VersionConflict { .. } => StatusCode::CONFLICT,

            AppError::InvalidPhaseName
            | AppError::SystemPhaseProtected(_)
            | AppError::PhaseInUse { .. }
            | AppError::UnknownPhase(_)
            | AppError::ReorderIncomplete { .. }
            | AppError::ReorderDuplicate(_)
            | AppError::ReorderUnknownPhase(_)
            | AppError::LossReasonRequired
            | AppError::ClientDraftRequired
            | AppError::InvalidTaxId
            | AppError::PolicyClientMismatch => StatusCode::UNPROCESSABLE_ENTITY,

            AppError::DatabaseError(_)
            | AppError::InternalServerError(_)
            | AppError::BcryptError(_)
            | AppError::JwtError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Código da mensagem no catálogo de idiomas.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "validation_error",
            AppError::EmailAlreadyExists => "email_already_exists",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::InvalidToken => "invalid_token",
            AppError::MalformedRequest(_) => "malformed_request",
            AppError::ResourceNotFound(_) => "resource_not_found",
            AppError::UniqueConstraintViolation(_) => "unique_violation",
            AppError::MissingTenantHeader => "missing_tenant_header",
            AppError::InvalidTenantHeader => "invalid_tenant_header",
            AppError::TenantAccessDenied => "tenant_access_denied",
            AppError::TenantNameAlreadyExists(_) => "tenant_name_already_exists",
            AppError::InvalidPhaseName => "invalid_phase_name",
            AppError::SystemPhaseProtected(_) => "system_phase_protected",
            AppError::PhaseInUse { .. } => "phase_in_use",
            AppError::UnknownPhase(_) => "unknown_phase",
            AppError::ReorderIncomplete { .. } => "reorder_incomplete",
            AppError::ReorderDuplicate(_) => "reorder_duplicate",
            AppError::ReorderUnknownPhase(_) => "reorder_unknown_phase",
            AppError::LossReasonRequired => "loss_reason_required",
            AppError::ClientDraftRequired => "client_draft_required",
            AppError::InvalidTaxId => "invalid_tax_id",
            AppError::VersionConflict { .. } => "version_conflict",
            AppError::PolicyClientMismatch => "policy_client_mismatch",
            AppError::DatabaseError(_)
            | AppError::InternalServerError(_)
            | AppError::BcryptError(_)
            | AppError::JwtError(_) => "internal_error",
        }
    }

    fn message_args(&self) -> Vec<String> {
        match self {
            AppError::ResourceNotFound(what)
            | AppError::MalformedRequest(what)
            | AppError::UniqueConstraintViolation(what)
            | AppError::TenantNameAlreadyExists(what)
            | AppError::SystemPhaseProtected(what)
            | AppError::UnknownPhase(what) => vec![what.clone()],
            AppError::PhaseInUse { key, count } => vec![key.clone(), count.to_string()],
            AppError::ReorderIncomplete { expected, received } => {
                vec![expected.to_string(), received.to_string()]
            }
            AppError::ReorderDuplicate(id) | AppError::ReorderUnknownPhase(id) => vec![id.to_string()],
            AppError::VersionConflict { current } => vec![current.to_string()],
            _ => vec![],
        }
    }

    /// Converte para o erro HTTP, com a mensagem no idioma do cliente.
    pub fn to_api_error(&self, locale: &Locale, store: &I18nStore) -> ApiError {
        let status = self.status();
        let error = store.translate(&locale.0, self.code(), &self.message_args());

        if status.is_server_error() {
            tracing::error!("Erro Interno do Servidor: {}", self);
        } else {
            tracing::warn!(code = self.code(), "Requisição rejeitada: {}", self);
        }

        // Retornamos todos os detalhes da validação, campo a campo
        let details = match self {
            AppError::ValidationError(errors) => {
                let mut details: HashMap<String, Vec<String>> = HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                        })
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                serde_json::to_value(details).ok()
            }
            _ => None,
        };

        ApiError { status, error, details }
    }
}

// O erro que de fato sai na resposta: `{ "error": "...", "details": {...} }`
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Traduz violação de unicidade do Postgres em conflito amigável.
pub fn map_unique_violation(e: sqlx::Error, what: impl FnOnce() -> String) -> AppError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            return AppError::UniqueConstraintViolation(what());
        }
    }
    e.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::{ValidationError, ValidationErrors};

    fn pt() -> Locale {
        Locale("pt".to_string())
    }

    #[test]
    fn business_rejections_are_unprocessable() {
        assert_eq!(AppError::LossReasonRequired.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            AppError::PhaseInUse { key: "quoting".into(), count: 2 }.status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::SystemPhaseProtected("won".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn conflicts_and_auth_map_to_conventional_codes() {
        assert_eq!(AppError::VersionConflict { current: 4 }.status(), StatusCode::CONFLICT);
        assert_eq!(AppError::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::TenantAccessDenied.status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::ResourceNotFound("Cotação".into()).status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn phase_in_use_message_names_key_and_count() {
        let store = I18nStore::load().unwrap();
        let api = AppError::PhaseInUse { key: "quoting".into(), count: 3 }.to_api_error(&pt(), &store);
        assert_eq!(api.error, "A fase 'quoting' está em uso por 3 cotação(ões) e não pode ser removida.");
        assert!(api.details.is_none());
    }

    #[test]
    fn internal_errors_hide_details() {
        let store = I18nStore::load().unwrap();
        let api = AppError::InternalServerError(anyhow::anyhow!("pool timed out"))
            .to_api_error(&pt(), &store);
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.error, "Ocorreu um erro inesperado.");
    }

    #[test]
    fn malformed_request_is_a_client_error_with_the_reason() {
        let store = I18nStore::load().unwrap();
        let api = AppError::MalformedRequest("EOF while parsing an object".into()).to_api_error(&pt(), &store);
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.error, "Requisição malformada: EOF while parsing an object");
    }

    #[test]
    fn validation_errors_carry_field_details() {
        let store = I18nStore::load().unwrap();
        let mut errors = ValidationErrors::new();
        let mut err = ValidationError::new("length");
        err.message = Some("required".into());
        errors.add("nome", err);

        let api = AppError::ValidationError(errors).to_api_error(&pt(), &store);
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.details.unwrap()["nome"][0], "required");
    }
}
