// src/handlers/certificates.rs

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::certificate::CertificateView,
};

// Rota pública: é o destino do QR code impresso no certificado.
#[utoipa::path(
    get,
    path = "/api/verify/{id}",
    tag = "Certificates",
    params(
        ("id" = String, Path, description = "ID do embarque ou do certificado (CERT-...)")
    ),
    responses(
        (status = 200, description = "Certificado válido", body = CertificateView),
        (status = 404, description = "Não encontrado ou não emitido")
    )
)]
pub async fn verify_certificate(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let view = app_state
        .shipment_service
        .verify(&id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(view))
}

#[utoipa::path(
    get,
    path = "/api/certificates/{shipment_id}/pdf",
    tag = "Certificates",
    params(
        ("shipment_id" = Uuid, Path, description = "ID do Embarque")
    ),
    responses(
        (status = 200, description = "PDF do certificado com QR code de verificação", body = Vec<u8>, content_type = "application/pdf")
    ),
    security(("api_jwt" = []))
)]
pub async fn certificate_pdf(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(shipment_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let (shipment, certificate) = app_state
        .shipment_service
        .issued_certificate(&user, shipment_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    // genpdf é síncrono e pesado; fora do runtime
    let documents = app_state.document_service.clone();
    let pdf_bytes = tokio::task::spawn_blocking(move || documents.generate_certificate_pdf(&shipment, &certificate))
        .await
        .map_err(|e| {
            AppError::InternalServerError(anyhow::anyhow!("Falha na task do PDF: {}", e))
                .to_api_error(&locale, &app_state.i18n_store)
        })?
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    // Configura os Headers para o navegador baixar ou mostrar o PDF
    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"certificado_{}.pdf\"", shipment_id),
        ),
    ];

    Ok((headers, pdf_bytes).into_response())
}
