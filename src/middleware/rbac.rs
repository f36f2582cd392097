// src/middleware/rbac.rs

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use std::marker::PhantomData;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::i18n::Locale,
    models::auth::{User, UserRole},
};

/// 1. O Trait que define qual papel uma rota exige
pub trait RoleDef: Send + Sync + 'static {
    fn role() -> UserRole;
}

/// 2. O Extractor (Guardião). Depende do `auth_guard` ter rodado antes.
pub struct RequireRole<T>(pub PhantomData<T>);

impl<T, S> FromRequestParts<S> for RequireRole<T>
where
    T: RoleDef,
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let locale = Locale::from_request_parts(parts, state)
            .await
            .unwrap_or_else(|never| match never {});

        let user = parts
            .extensions
            .get::<User>()
            .ok_or_else(|| AppError::InvalidToken.to_api_error(&locale, &app_state.i18n_store))?;

        let required = T::role();
        if user.role != required {
            tracing::warn!("⛔ Usuário {} ({}) tentou acessar rota de '{}'", user.id, user.role, required);
            return Err(AppError::Forbidden(format!("papel '{}' exigido", required))
                .to_api_error(&locale, &app_state.i18n_store));
        }

        Ok(RequireRole(PhantomData))
    }
}

// ---
// DEFINIÇÃO DOS PAPÉIS (TIPOS)
// ---

pub struct QaRole;
impl RoleDef for QaRole {
    fn role() -> UserRole { UserRole::Qa }
}

pub struct ExporterRole;
impl RoleDef for ExporterRole {
    fn role() -> UserRole { UserRole::Exporter }
}
