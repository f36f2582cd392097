// src/services/shipment_service.rs

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    models::{
        auth::{Principal, User, UserRole},
        certificate::{Certificate, CertificateView},
        shipment::{InspectionInput, InspectionResult, NewShipment, Shipment, ShipmentPatch, ShipmentScope, ShipmentStatus},
    },
    sync::ShipmentStore,
};

/// Resultado de uma inspeção: o certificado só existe para `Pass`.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InspectionOutcome {
    pub shipment: Shipment,
    pub certificate: Option<Certificate>,
}

#[derive(Clone)]
pub struct ShipmentService {
    store: Arc<dyn ShipmentStore>,
}

impl ShipmentService {
    pub fn new(store: Arc<dyn ShipmentStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self, user: &User) -> Result<Vec<Shipment>, AppError> {
        self.store
            .list(&user.principal(), ShipmentScope::for_user(user.id, user.role))
            .await
    }

    pub async fn get(&self, user: &User, id: Uuid) -> Result<Shipment, AppError> {
        self.store
            .get(&user.principal(), id)
            .await?
            .ok_or(AppError::ShipmentNotFound(id))
    }

    pub async fn create(&self, user: &User, input: NewShipment) -> Result<Shipment, AppError> {
        input.validate()?;
        if user.role != UserRole::Exporter {
            return Err(AppError::Forbidden("apenas exportadores criam embarques".into()));
        }

        let shipment = self.store.insert(&user.principal(), user.id, &input).await?;
        tracing::info!("✅ Embarque {} criado por {}", shipment.id, user.id);
        Ok(shipment)
    }

    /// Update parcial com as regras de campo por papel:
    /// exportador edita os campos comerciais, QA os de inspeção, importador só lê.
    /// `Certificate Issued` só é alcançado pela emissão.
    pub async fn update(&self, user: &User, id: Uuid, patch: ShipmentPatch) -> Result<Shipment, AppError> {
        patch.validate()?;

        patch
            .check_role(user.role)
            .map_err(|reason| AppError::Forbidden(reason.into()))?;
        if patch.status == Some(ShipmentStatus::CertificateIssued) {
            return Err(AppError::Forbidden("use a emissão de certificado".into()));
        }

        let current = self.get(user, id).await?;
        let changed = patch.changed_fields(&current);
        if changed.is_empty() {
            return Ok(current);
        }

        self.store.update(&user.principal(), id, &changed).await
    }

    /// Grava a inspeção e, se aprovada, emite o certificado na sequência.
    pub async fn inspect(&self, user: &User, id: Uuid, input: InspectionInput) -> Result<InspectionOutcome, AppError> {
        input.validate()?;
        require_qa(user)?;

        let result = input.result;
        let current = self.get(user, id).await?;
        let patch = input.into_patch(&current, user.id, Utc::now());
        let inspected = self.store.update(&user.principal(), id, &patch).await?;
        tracing::info!("🔎 Embarque {} inspecionado: {}", id, result.as_str());

        if result == InspectionResult::Fail {
            return Ok(InspectionOutcome { shipment: inspected, certificate: None });
        }

        let (shipment, certificate) = self.issue(user, &inspected).await?;
        Ok(InspectionOutcome { shipment, certificate: Some(certificate) })
    }

    pub async fn issue_certificate(&self, user: &User, id: Uuid) -> Result<(Shipment, Certificate), AppError> {
        require_qa(user)?;
        let shipment = self.get(user, id).await?;
        self.issue(user, &shipment).await
    }

    async fn issue(&self, user: &User, shipment: &Shipment) -> Result<(Shipment, Certificate), AppError> {
        if shipment.status != ShipmentStatus::InspectedPass {
            return Err(AppError::InvalidTransition {
                from: shipment.status,
                to: ShipmentStatus::CertificateIssued,
            });
        }

        let draft = Certificate::draft_for(shipment, &user.organization);
        let (shipment, certificate) = self.store.issue_certificate(&user.principal(), &draft).await?;
        tracing::info!("📜 Certificado {} emitido para {}", certificate.id, shipment.id);
        Ok((shipment, certificate))
    }

    /// Verificação pública. Aceita o id do embarque ou o id do certificado (`CERT-...`).
    pub async fn verify(&self, id: &str) -> Result<CertificateView, AppError> {
        let id = id.trim();
        let not_found = || AppError::CertificateNotFound(id.to_string());
        let principal = Principal::Service;

        let (shipment, certificate) = match Uuid::parse_str(id) {
            Ok(shipment_id) => {
                let shipment = self.store.get(&principal, shipment_id).await?.ok_or_else(not_found)?;
                // Só conta como emitido com o registro do certificado gravado.
                let certificate = self
                    .store
                    .certificate_for_shipment(&principal, shipment_id)
                    .await?
                    .ok_or_else(not_found)?;
                (shipment, certificate)
            }
            Err(_) => {
                let certificate = self
                    .store
                    .find_certificate(&principal, &id.to_uppercase())
                    .await?
                    .ok_or_else(not_found)?;
                let shipment = self
                    .store
                    .get(&principal, certificate.shipment_id)
                    .await?
                    .ok_or_else(not_found)?;
                (shipment, certificate)
            }
        };

        CertificateView::project(&shipment, &certificate).ok_or_else(not_found)
    }

    /// Embarque emitido + registro do certificado, respeitando a visibilidade do usuário.
    pub async fn issued_certificate(&self, user: &User, shipment_id: Uuid) -> Result<(Shipment, Certificate), AppError> {
        let shipment = self.get(user, shipment_id).await?;
        if shipment.status != ShipmentStatus::CertificateIssued {
            return Err(AppError::CertificateNotFound(shipment_id.to_string()));
        }
        let certificate = self
            .store
            .certificate_for_shipment(&user.principal(), shipment_id)
            .await?
            .ok_or_else(|| AppError::CertificateNotFound(shipment_id.to_string()))?;
        Ok((shipment, certificate))
    }

    /// Acrescenta um documento de suporte ao embarque (caminho no storage).
    pub async fn attach_document(&self, user: &User, id: Uuid, path: String) -> Result<Shipment, AppError> {
        let current = self.get(user, id).await?;
        let mut documents = current.supporting_documents.clone().unwrap_or_default();
        if documents.contains(&path) {
            return Ok(current);
        }
        documents.push(path);

        let patch = ShipmentPatch { supporting_documents: Some(documents), ..Default::default() };
        self.store.update(&user.principal(), id, &patch).await
    }
}

fn require_qa(user: &User) -> Result<(), AppError> {
    if user.role != UserRole::Qa {
        return Err(AppError::Forbidden("apenas agentes de QA inspecionam e certificam".into()));
    }
    Ok(())
}
