// src/middleware/auth.rs

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    typed_header::TypedHeaderRejection,
    TypedHeader,
};

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{
        i18n::Locale,
        tenancy::{parse_tenant_header, TenantContext},
    },
    models::auth::{Claims, User},
};

type BearerHeader = Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>;

async fn authenticate(app_state: &AppState, bearer: BearerHeader) -> Result<(User, Claims), AppError> {
    // Cabeçalho ausente ou malformado: mesma resposta de token inválido
    let TypedHeader(Authorization(bearer)) = bearer.map_err(|_| AppError::InvalidToken)?;
    app_state.auth_service.validate_token(bearer.token()).await
}

// ---
// Guard das rotas de usuário: exige apenas o JWT
// ---
pub async fn auth_guard(
    State(app_state): State<AppState>,
    locale: Locale,
    bearer: BearerHeader,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (user, claims) = authenticate(&app_state, bearer)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    // Insere o usuário e a sessão nos "extensions" da requisição
    request.extensions_mut().insert(user);
    request.extensions_mut().insert(CurrentSession(claims));
    Ok(next.run(request).await)
}

// ---
// Guard das rotas de negócio: JWT + X-Tenant-ID + vínculo com a corretora
// ---
pub async fn tenant_guard(
    State(app_state): State<AppState>,
    locale: Locale,
    bearer: BearerHeader,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let to_api = |e: AppError| e.to_api_error(&locale, &app_state.i18n_store);

    let (user, claims) = authenticate(&app_state, bearer).await.map_err(to_api)?;
    let tenant_id = parse_tenant_header(request.headers()).map_err(to_api)?;

    let is_member = app_state
        .tenant_service
        .is_member(user.id, tenant_id)
        .await
        .map_err(to_api)?;

    if !is_member {
        tracing::warn!("🚫 Usuário {} sem acesso à corretora {}", user.id, tenant_id);
        return Err(to_api(AppError::TenantAccessDenied));
    }

    request.extensions_mut().insert(user);
    request.extensions_mut().insert(CurrentSession(claims));
    request.extensions_mut().insert(TenantContext(tenant_id));
    Ok(next.run(request).await)
}

async fn reject<S>(parts: &mut Parts, state: &S) -> ApiError
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    let app_state = AppState::from_ref(state);
    let locale = Locale::from_request_parts(parts, state).await.unwrap_or_default();
    AppError::InvalidToken.to_api_error(&locale, &app_state.i18n_store)
}

// Extrator para obter o usuário autenticado diretamente nos handlers
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<User>().cloned() {
            Some(user) => Ok(AuthenticatedUser(user)),
            None => Err(reject(parts, state).await),
        }
    }
}

// As claims do token em uso (para o logout)
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Claims);

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<CurrentSession>().cloned() {
            Some(session) => Ok(session),
            None => Err(reject(parts, state).await),
        }
    }
}
