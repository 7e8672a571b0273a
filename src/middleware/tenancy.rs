// src/middleware/tenancy.rs

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use uuid::Uuid;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::i18n::Locale,
};

// O nome do nosso cabeçalho HTTP customizado
pub const TENANT_ID_HEADER: &str = "x-tenant-id";

/// Lê e valida o cabeçalho X-Tenant-ID
pub fn parse_tenant_header(headers: &HeaderMap) -> Result<Uuid, AppError> {
    let value = headers.get(TENANT_ID_HEADER).ok_or(AppError::MissingTenantHeader)?;
    let value_str = value.to_str().map_err(|_| AppError::InvalidTenantHeader)?;
    Uuid::parse_str(value_str.trim()).map_err(|_| AppError::InvalidTenantHeader)
}

// A corretora já validada pelo `tenant_guard` (membro confirmado)
#[derive(Debug, Clone, Copy)]
pub struct TenantContext(pub Uuid);

impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<TenantContext>() {
            Some(tenant) => Ok(*tenant),
            None => {
                let app_state = AppState::from_ref(state);
                let locale = Locale::from_request_parts(parts, state).await.unwrap_or_default();
                Err(AppError::MissingTenantHeader.to_api_error(&locale, &app_state.i18n_store))
            }
        }
    }
}
