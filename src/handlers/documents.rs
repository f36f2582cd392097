// src/handlers/documents.rs

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::shipment::Shipment,
    services::document_service::{shipment_of, SignedUrlBatch},
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SignedUrlsPayload {
    #[validate(length(min = 1, max = 100, message = "required"))]
    pub paths: Vec<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct DownloadQuery {
    /// Token da URL assinada
    pub token: String,
}

#[utoipa::path(
    put,
    path = "/api/shipments/{id}/documents/{file_name}",
    tag = "Documents",
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    params(
        ("id" = Uuid, Path, description = "ID do Embarque"),
        ("file_name" = String, Path, description = "Nome do arquivo")
    ),
    responses(
        (status = 201, description = "Documento anexado ao embarque", body = Shipment)
    ),
    security(("api_jwt" = []))
)]
pub async fn upload_document(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((id, file_name)): Path<(Uuid, String)>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    // Confere a visibilidade antes de tocar no disco
    app_state
        .shipment_service
        .get(&user, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let path = app_state
        .document_service
        .store_document(id, &file_name, &body)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let shipment = app_state
        .shipment_service
        .attach_document(&user, id, path)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(shipment)))
}

#[utoipa::path(
    post,
    path = "/api/documents/signed-urls",
    tag = "Documents",
    request_body = SignedUrlsPayload,
    responses(
        (status = 200, description = "URLs assinadas; caminhos com falha aparecem em 'errors'", body = SignedUrlBatch)
    ),
    security(("api_jwt" = []))
)]
pub async fn create_signed_urls(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<SignedUrlsPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    // Só assina caminhos de embarques que o usuário enxerga.
    let mut allowed = Vec::with_capacity(payload.paths.len());
    let mut denied = Vec::new();
    for path in payload.paths {
        let visible = match shipment_of(&path) {
            Some(shipment_id) => app_state.shipment_service.get(&user, shipment_id).await,
            None => Err(AppError::InvalidDocumentPath(path.clone())),
        };
        match visible {
            Ok(_) => allowed.push(path),
            Err(e) => denied.push((path, e.to_string())),
        }
    }

    let mut batch = app_state.document_service.sign_batch(&allowed).await;
    batch.errors.extend(denied);

    Ok(Json(batch))
}

#[utoipa::path(
    get,
    path = "/storage/documents",
    tag = "Documents",
    params(DownloadQuery),
    responses(
        (status = 200, description = "Conteúdo do documento", body = Vec<u8>, content_type = "application/octet-stream"),
        (status = 401, description = "Token inválido ou expirado")
    )
)]
pub async fn download_signed(
    State(app_state): State<AppState>,
    locale: Locale,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let (path, bytes) = app_state
        .document_service
        .resolve_signed(&query.token)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let file_name = path.rsplit('/').next().unwrap_or("documento").to_string();
    let headers = [
        (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", file_name)),
    ];

    Ok((headers, bytes).into_response())
}
