// src/handlers/shipments.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{ExporterRole, QaRole, RequireRole},
    },
    models::{
        certificate::Certificate,
        shipment::{InspectionInput, NewShipment, Shipment, ShipmentPatch},
    },
    services::shipment_service::InspectionOutcome,
};

/// Embarque já emitido junto do registro do certificado.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCertificate {
    pub shipment: Shipment,
    pub certificate: Certificate,
}

#[utoipa::path(
    get,
    path = "/api/shipments",
    tag = "Shipments",
    responses(
        (status = 200, description = "Embarques visíveis para o papel do usuário, mais novos primeiro", body = Vec<Shipment>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_shipments(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let shipments = app_state
        .shipment_service
        .list(&user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(shipments))
}

#[utoipa::path(
    post,
    path = "/api/shipments",
    tag = "Shipments",
    request_body = NewShipment,
    responses(
        (status = 201, description = "Embarque criado como 'Pending Inspection'", body = Shipment),
        (status = 400, description = "Campos inválidos")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_shipment(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequireRole<ExporterRole>,
    Json(payload): Json<NewShipment>,
) -> Result<impl IntoResponse, ApiError> {
    let shipment = app_state
        .shipment_service
        .create(&user, payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(shipment)))
}

#[utoipa::path(
    get,
    path = "/api/shipments/{id}",
    tag = "Shipments",
    params(
        ("id" = Uuid, Path, description = "ID do Embarque")
    ),
    responses(
        (status = 200, description = "Embarque", body = Shipment),
        (status = 404, description = "Não encontrado ou fora da visibilidade do usuário")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_shipment(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let shipment = app_state
        .shipment_service
        .get(&user, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(shipment))
}

#[utoipa::path(
    patch,
    path = "/api/shipments/{id}",
    tag = "Shipments",
    request_body = ShipmentPatch,
    params(
        ("id" = Uuid, Path, description = "ID do Embarque")
    ),
    responses(
        (status = 200, description = "Embarque atualizado", body = Shipment),
        (status = 409, description = "Transição de status inválida")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_shipment(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<ShipmentPatch>,
) -> Result<impl IntoResponse, ApiError> {
    let shipment = app_state
        .shipment_service
        .update(&user, id, patch)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(shipment))
}

#[utoipa::path(
    post,
    path = "/api/shipments/{id}/inspection",
    tag = "Shipments",
    request_body = InspectionInput,
    params(
        ("id" = Uuid, Path, description = "ID do Embarque")
    ),
    responses(
        (status = 200, description = "Inspeção gravada; 'Pass' já emite o certificado", body = InspectionOutcome)
    ),
    security(("api_jwt" = []))
)]
pub async fn inspect_shipment(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequireRole<QaRole>,
    Path(id): Path<Uuid>,
    Json(payload): Json<InspectionInput>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = app_state
        .shipment_service
        .inspect(&user, id, payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(outcome))
}

#[utoipa::path(
    post,
    path = "/api/shipments/{id}/certificate",
    tag = "Shipments",
    params(
        ("id" = Uuid, Path, description = "ID do Embarque")
    ),
    responses(
        (status = 201, description = "Certificado emitido", body = IssuedCertificate),
        (status = 409, description = "Embarque não está 'Inspected - Pass'")
    ),
    security(("api_jwt" = []))
)]
pub async fn issue_certificate(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequireRole<QaRole>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let (shipment, certificate) = app_state
        .shipment_service
        .issue_certificate(&user, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(IssuedCertificate { shipment, certificate })))
}
