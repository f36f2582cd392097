// src/handlers/functions.rs
//
// Edge function `issue-vc`: emite a credencial verificável simulada de um embarque.
// Sem autenticação e com CORS liberado, como as funções serverless que ela imita.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{common::error::AppError, config::AppState};

pub const MISSING_SHIPMENT_ID: &str = "shipmentId required";

#[derive(Debug, Serialize, ToSchema)]
pub struct IssueVcResponse {
    pub success: bool,
    pub vc_id: String,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssueVcRequest {
    pub shipment_id: Uuid,
}

/// Lê `shipmentId` do corpo. Corpo vazio, JSON inválido ou id ausente dão `None`.
pub fn parse_shipment_id(body: &[u8]) -> Option<Uuid> {
    let value: Value = serde_json::from_slice(body).ok()?;
    let raw = value.get("shipmentId")?.as_str()?;
    Uuid::parse_str(raw.trim()).ok()
}

#[utoipa::path(
    post,
    path = "/functions/v1/issue-vc",
    tag = "Functions",
    request_body = IssueVcRequest,
    responses(
        (status = 200, description = "Credencial emitida", body = IssueVcResponse),
        (status = 400, description = "shipmentId ausente"),
        (status = 404, description = "Embarque inexistente"),
        (status = 500, description = "Falha ao gravar a credencial")
    )
)]
pub async fn issue_vc(State(app_state): State<AppState>, body: Bytes) -> Response {
    let Some(shipment_id) = parse_shipment_id(&body) else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": MISSING_SHIPMENT_ID }))).into_response();
    };

    match app_state.credential_service.issue(shipment_id).await {
        Ok(vc_id) => Json(IssueVcResponse {
            success: true,
            vc_id,
            message: "VC issued successfully".to_string(),
        })
        .into_response(),
        Err(e @ AppError::ShipmentNotFound(_)) => {
            (StatusCode::NOT_FOUND, Json(json!({ "error": e.to_string() }))).into_response()
        }
        Err(e) => {
            tracing::error!("🔥 issue-vc falhou para {}: {}", shipment_id, e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))).into_response()
        }
    }
}

// OPTIONS simples (sem Access-Control-Request-Method) que o CorsLayer deixa passar.
pub async fn issue_vc_preflight() -> &'static str {
    "ok"
}
