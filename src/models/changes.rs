// src/models/changes.rs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::shipment::{Shipment, ShipmentScope};

/// Chaves mínimas de uma linha removida (o feed não carrega a linha inteira no DELETE).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemovedShipment {
    pub id: Uuid,
    pub exporter_id: Uuid,
    pub importer_id: Option<Uuid>,
}

/// Notificação do feed de mudanças da tabela `shipments`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "eventType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeEvent {
    Insert { new: Shipment },
    Update { new: Shipment },
    Delete { old: RemovedShipment },
}

impl ChangeEvent {
    pub fn shipment_id(&self) -> Uuid {
        match self {
            ChangeEvent::Insert { new } | ChangeEvent::Update { new } => new.id,
            ChangeEvent::Delete { old } => old.id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::Insert { .. } => "INSERT",
            ChangeEvent::Update { .. } => "UPDATE",
            ChangeEvent::Delete { .. } => "DELETE",
        }
    }

    pub fn visible_to(&self, scope: &ShipmentScope) -> bool {
        match self {
            ChangeEvent::Insert { new } | ChangeEvent::Update { new } => {
                scope.matches(new.exporter_id, new.importer_id)
            }
            ChangeEvent::Delete { old } => scope.matches(old.exporter_id, old.importer_id),
        }
    }
}
