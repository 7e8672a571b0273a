// src/middleware/extract.rs

// Extratores de corpo, caminho e query que respondem no formato `ApiError`.
// Os do axum rejeitam com texto puro em inglês.

use axum::{
    extract::{FromRef, FromRequest, FromRequestParts, OptionalFromRequest, Path, Query, Request},
    http::{request::Parts, StatusCode},
    Json,
};
use serde::de::DeserializeOwned;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::i18n::Locale,
};

fn reject<S>(state: &S, locale: &Locale, status: StatusCode, detail: String) -> ApiError
where
    AppState: FromRef<S>,
{
    let app_state = AppState::from_ref(state);
    let mut api_error = AppError::MalformedRequest(detail).to_api_error(locale, &app_state.i18n_store);
    // Mantém o status do axum (400, 415, 422...)
    api_error.status = status;
    api_error
}

// ---
// Corpo JSON
// ---
#[derive(Debug, Clone, Copy, Default)]
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let locale = Locale::from_headers(req.headers());

        match <Json<T> as FromRequest<S>>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(reject(state, &locale, rejection.status(), rejection.body_text())),
        }
    }
}

// Corpo opcional: sem Content-Type JSON vira `None`
impl<T, S> OptionalFromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Option<Self>, Self::Rejection> {
        let locale = Locale::from_headers(req.headers());

        match <Json<T> as OptionalFromRequest<S>>::from_request(req, state).await {
            Ok(value) => Ok(value.map(|Json(value)| AppJson(value))),
            Err(rejection) => Err(reject(state, &locale, rejection.status(), rejection.body_text())),
        }
    }
}

// ---
// Parâmetros de caminho
// ---
#[derive(Debug)]
pub struct AppPath<T>(pub T);

impl<T, S> FromRequestParts<S> for AppPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(AppPath(value)),
            Err(rejection) => {
                let locale = Locale::from_headers(&parts.headers);
                Err(reject(state, &locale, rejection.status(), rejection.body_text()))
            }
        }
    }
}

// ---
// Query string
// ---
#[derive(Debug)]
pub struct AppQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for AppQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(AppQuery(value)),
            Err(rejection) => {
                let locale = Locale::from_headers(&parts.headers);
                Err(reject(state, &locale, rejection.status(), rejection.body_text()))
            }
        }
    }
}
