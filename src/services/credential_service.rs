// src/services/credential_service.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{common::error::AppError, sync::ShipmentStore};

pub const VC_STATUS_ISSUED: &str = "issued";

/// Id da credencial simulada: não há esquema criptográfico por trás.
pub fn credential_id(shipment_id: Uuid, at: DateTime<Utc>) -> String {
    format!("vc-{}-{}", shipment_id, at.timestamp_millis())
}

/// Comportamento da edge function `issue-vc`: só os campos `vc_*` são tocados.
#[derive(Clone)]
pub struct CredentialService {
    store: Arc<dyn ShipmentStore>,
}

impl CredentialService {
    pub fn new(store: Arc<dyn ShipmentStore>) -> Self {
        Self { store }
    }

    pub async fn issue(&self, shipment_id: Uuid) -> Result<String, AppError> {
        let vc_id = credential_id(shipment_id, Utc::now());
        self.store
            .set_credential(shipment_id, &vc_id)
            .await?
            .ok_or(AppError::ShipmentNotFound(shipment_id))?;

        tracing::info!("🪪 Credencial {} emitida", vc_id);
        Ok(vc_id)
    }
}
