// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::register,
        handlers::auth::login,

        // --- Users ---
        handlers::auth::get_me,

        // --- Shipments ---
        handlers::shipments::list_shipments,
        handlers::shipments::create_shipment,
        handlers::shipments::get_shipment,
        handlers::shipments::update_shipment,
        handlers::shipments::inspect_shipment,
        handlers::shipments::issue_certificate,
        handlers::changes::stream_changes,

        // --- Certificates ---
        handlers::certificates::verify_certificate,
        handlers::certificates::certificate_pdf,

        // --- Documents ---
        handlers::documents::upload_document,
        handlers::documents::create_signed_urls,
        handlers::documents::download_signed,

        // --- Functions ---
        handlers::functions::issue_vc,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::UserRole,
            models::auth::Profile,
            models::auth::RegisterUserPayload,
            models::auth::LoginUserPayload,
            models::auth::AuthResponse,

            // --- Shipments ---
            models::shipment::ShipmentStatus,
            models::shipment::InspectionResult,
            models::shipment::QualityCriterion,
            models::shipment::Shipment,
            models::shipment::NewShipment,
            models::shipment::ShipmentPatch,
            models::shipment::InspectionInput,
            models::changes::ChangeEvent,
            models::changes::RemovedShipment,
            services::shipment_service::InspectionOutcome,
            handlers::shipments::IssuedCertificate,

            // --- Certificates ---
            models::certificate::Certificate,
            models::certificate::CertificateView,

            // --- Documents ---
            services::document_service::SignedUrlBatch,
            handlers::documents::SignedUrlsPayload,

            // --- Functions ---
            handlers::functions::IssueVcRequest,
            handlers::functions::IssueVcResponse,
        )
    ),
    tags(
        (name = "Auth", description = "Autenticação e Registro"),
        (name = "Users", description = "Dados do Usuário e Perfil"),
        (name = "Shipments", description = "Embarques, Inspeção e Feed de Mudanças"),
        (name = "Certificates", description = "Verificação Pública e PDF do Certificado"),
        (name = "Documents", description = "Documentos de Suporte e URLs Assinadas"),
        (name = "Functions", description = "Edge Function de Credencial Verificável")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/shipments",
            "/api/shipments/{id}",
            "/api/shipments/{id}/inspection",
            "/api/shipments/{id}/certificate",
            "/api/verify/{id}",
            "/functions/v1/issue-vc",
            "/storage/documents",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path}");
        }
        assert!(doc.components.unwrap().security_schemes.contains_key("api_jwt"));
    }
}
