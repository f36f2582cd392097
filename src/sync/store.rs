// src/sync/store.rs

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        auth::Principal,
        certificate::Certificate,
        shipment::{NewShipment, Shipment, ShipmentPatch, ShipmentScope},
    },
    services::change_feed::ChangeSubscription,
};

/// Contrato do store remoto de embarques.
///
/// A visibilidade das linhas é decidida pelo próprio store a partir do
/// `Principal` (RLS no Postgres). O `ShipmentScope` de `list` é só uma
/// projeção de conveniência aplicada por cima.
#[async_trait]
pub trait ShipmentStore: Send + Sync {
    /// Ordenado por `created_at` decrescente.
    async fn list(&self, principal: &Principal, scope: ShipmentScope) -> Result<Vec<Shipment>, AppError>;

    async fn get(&self, principal: &Principal, id: Uuid) -> Result<Option<Shipment>, AppError>;

    /// Idempotente por `client_ref`: reenvios devolvem a linha já existente.
    async fn insert(
        &self,
        principal: &Principal,
        exporter_id: Uuid,
        input: &NewShipment,
    ) -> Result<Shipment, AppError>;

    /// Persiste só os campos do patch, respeitando a máquina de estados.
    /// Incrementa `revision`.
    async fn update(&self, principal: &Principal, id: Uuid, patch: &ShipmentPatch) -> Result<Shipment, AppError>;

    /// Grava o certificado e move o embarque para `Certificate Issued` na mesma transação.
    async fn issue_certificate(
        &self,
        principal: &Principal,
        draft: &Certificate,
    ) -> Result<(Shipment, Certificate), AppError>;

    async fn find_certificate(&self, principal: &Principal, id: &str) -> Result<Option<Certificate>, AppError>;

    async fn certificate_for_shipment(
        &self,
        principal: &Principal,
        shipment_id: Uuid,
    ) -> Result<Option<Certificate>, AppError>;

    /// Marca a credencial simulada. `None` se o embarque não existe.
    async fn set_credential(&self, shipment_id: Uuid, vc_id: &str) -> Result<Option<Shipment>, AppError>;

    fn subscribe(&self, scope: ShipmentScope) -> ChangeSubscription;
}
