// src/sync/memory.rs
//
// Store em memória para os testes: mesma regra de visibilidade da política RLS,
// idempotência por `client_ref` e emissão atômica de certificado.

use std::collections::HashSet;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Mutex, MutexGuard,
};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        auth::{Principal, UserRole},
        certificate::Certificate,
        changes::{ChangeEvent, RemovedShipment},
        shipment::{NewShipment, Shipment, ShipmentPatch, ShipmentScope, ShipmentStatus},
    },
    services::change_feed::{ChangeFeed, ChangeSubscription},
    sync::store::ShipmentStore,
};

#[derive(Default)]
struct Tables {
    shipments: Vec<Shipment>,
    certificates: Vec<Certificate>,
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    tables: Mutex<Tables>,
    feed: ChangeFeed,
    offline: AtomicBool,
    inserts: AtomicUsize,
    rejected_refs: Mutex<HashSet<Uuid>>,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Simula falha de transporte em todas as chamadas.
    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Faz o insert com esse `client_ref` falhar (isolamento por item no replay).
    pub(crate) fn reject_client_ref(&self, client_ref: Uuid) {
        self.rejected_refs.lock().unwrap().insert(client_ref);
    }

    /// Quantas linhas foram realmente criadas.
    pub(crate) fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    /// Todas as linhas, ignorando visibilidade.
    pub(crate) fn rows(&self) -> Vec<Shipment> {
        self.tables().shipments.clone()
    }

    /// Sobrescreve uma linha sem passar pelas regras do store (dados legados).
    pub(crate) fn put_row(&self, row: Shipment) {
        let mut tables = self.tables();
        match tables.shipments.iter_mut().find(|s| s.id == row.id) {
            Some(existing) => *existing = row,
            None => tables.shipments.push(row),
        }
    }

    pub(crate) fn delete(&self, id: Uuid) {
        let removed = {
            let mut tables = self.tables();
            let pos = tables.shipments.iter().position(|s| s.id == id);
            pos.map(|p| tables.shipments.remove(p))
        };
        if let Some(row) = removed {
            self.feed.publish(ChangeEvent::Delete {
                old: RemovedShipment { id: row.id, exporter_id: row.exporter_id, importer_id: row.importer_id },
            });
        }
    }

    pub(crate) fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }

    fn check_online(&self) -> Result<(), AppError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AppError::StoreUnavailable("memory store offline".into()));
        }
        Ok(())
    }

    /// Espelha o trigger `shipments_inspection_guard`.
    fn can_inspect(principal: &Principal) -> bool {
        matches!(principal, Principal::Service | Principal::User { role: UserRole::Qa, .. })
    }

    fn can_write(principal: &Principal, exporter_id: Uuid) -> bool {
        match principal {
            Principal::Service | Principal::User { role: UserRole::Qa, .. } => true,
            Principal::User { id, .. } => *id == exporter_id,
        }
    }
}

#[async_trait]
impl ShipmentStore for MemoryStore {
    async fn list(&self, principal: &Principal, scope: ShipmentScope) -> Result<Vec<Shipment>, AppError> {
        self.check_online()?;
        let mut rows: Vec<Shipment> = self
            .tables()
            .shipments
            .iter()
            .filter(|s| principal.can_see(s.exporter_id, s.importer_id))
            .filter(|s| scope.matches(s.exporter_id, s.importer_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn get(&self, principal: &Principal, id: Uuid) -> Result<Option<Shipment>, AppError> {
        self.check_online()?;
        Ok(self
            .tables()
            .shipments
            .iter()
            .find(|s| s.id == id && principal.can_see(s.exporter_id, s.importer_id))
            .cloned())
    }

    async fn insert(
        &self,
        principal: &Principal,
        exporter_id: Uuid,
        input: &NewShipment,
    ) -> Result<Shipment, AppError> {
        self.check_online()?;
        if let Some(client_ref) = input.client_ref {
            if self.rejected_refs.lock().unwrap().contains(&client_ref) {
                return Err(AppError::StoreUnavailable(format!("insert rejected: {}", client_ref)));
            }
        }
        if !Self::can_write(principal, exporter_id) {
            return Err(AppError::Forbidden("row-level security".into()));
        }

        let row = {
            let mut tables = self.tables();
            if let Some(client_ref) = input.client_ref {
                if let Some(existing) = tables.shipments.iter().find(|s| s.client_ref == Some(client_ref)) {
                    // A chave pertence a uma linha que este usuário não enxerga.
                    if !principal.can_see(existing.exporter_id, existing.importer_id) {
                        return Err(AppError::ClientRefConflict(client_ref));
                    }
                    return Ok(existing.clone());
                }
            }

            // Timestamps estritamente crescentes para a ordenação ser determinística.
            let seq = self.inserts.fetch_add(1, Ordering::SeqCst) as i64;
            let mut row = Shipment::local_draft(exporter_id, input);
            row.id = Uuid::new_v4();
            row.client_ref = input.client_ref;
            row.revision = 1;
            row.created_at = Utc::now() + Duration::milliseconds(seq);
            row.updated_at = row.created_at;
            tables.shipments.push(row.clone());
            row
        };

        self.feed.publish(ChangeEvent::Insert { new: row.clone() });
        Ok(row)
    }

    async fn update(&self, principal: &Principal, id: Uuid, patch: &ShipmentPatch) -> Result<Shipment, AppError> {
        self.check_online()?;
        let row = {
            let mut tables = self.tables();
            let row = tables
                .shipments
                .iter_mut()
                .find(|s| s.id == id && principal.can_see(s.exporter_id, s.importer_id))
                .ok_or(AppError::ShipmentNotFound(id))?;
            if !Self::can_write(principal, row.exporter_id) {
                return Err(AppError::Forbidden("row-level security".into()));
            }
            if !Self::can_inspect(principal) && patch.touches_inspection_fields() {
                return Err(AppError::Forbidden("inspection columns".into()));
            }

            let mut next = row.clone();
            patch.apply_checked(&mut next)?;
            next.revision += 1;
            next.updated_at = Utc::now();
            *row = next.clone();
            next
        };

        self.feed.publish(ChangeEvent::Update { new: row.clone() });
        Ok(row)
    }

    async fn issue_certificate(
        &self,
        principal: &Principal,
        draft: &Certificate,
    ) -> Result<(Shipment, Certificate), AppError> {
        self.check_online()?;
        let row = {
            let mut tables = self.tables();
            let row = tables
                .shipments
                .iter_mut()
                .find(|s| s.id == draft.shipment_id && principal.can_see(s.exporter_id, s.importer_id))
                .ok_or(AppError::ShipmentNotFound(draft.shipment_id))?;
            if row.status != ShipmentStatus::InspectedPass {
                return Err(AppError::InvalidTransition { from: row.status, to: ShipmentStatus::CertificateIssued });
            }

            row.status = ShipmentStatus::CertificateIssued;
            row.revision += 1;
            row.updated_at = Utc::now();
            let row = row.clone();
            tables.certificates.push(draft.clone());
            row
        };

        self.feed.publish(ChangeEvent::Update { new: row.clone() });
        Ok((row, draft.clone()))
    }

    async fn find_certificate(&self, _principal: &Principal, id: &str) -> Result<Option<Certificate>, AppError> {
        self.check_online()?;
        Ok(self.tables().certificates.iter().find(|c| c.id == id).cloned())
    }

    async fn certificate_for_shipment(
        &self,
        _principal: &Principal,
        shipment_id: Uuid,
    ) -> Result<Option<Certificate>, AppError> {
        self.check_online()?;
        Ok(self.tables().certificates.iter().find(|c| c.shipment_id == shipment_id).cloned())
    }

    async fn set_credential(&self, shipment_id: Uuid, vc_id: &str) -> Result<Option<Shipment>, AppError> {
        self.check_online()?;
        let row = {
            let mut tables = self.tables();
            let Some(row) = tables.shipments.iter_mut().find(|s| s.id == shipment_id) else {
                return Ok(None);
            };
            row.vc_status = Some(crate::services::credential_service::VC_STATUS_ISSUED.into());
            row.vc_id = Some(vc_id.to_string());
            row.revision += 1;
            row.updated_at = Utc::now();
            row.clone()
        };

        self.feed.publish(ChangeEvent::Update { new: row.clone() });
        Ok(Some(row))
    }

    fn subscribe(&self, scope: ShipmentScope) -> ChangeSubscription {
        self.feed.subscribe(scope)
    }
}
