// src/sync/tracked.rs

use crate::models::shipment::{Shipment, ShipmentPatch};

/// O que aconteceu com uma notificação recebida pelo feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Applied,
    /// Mais antiga que a escrita otimista em voo; guardada para reconciliar.
    Deferred,
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingWrite {
    expected_revision: i64,
    in_flight: u32,
}

/// Registro em memória com a revisão do servidor e, enquanto houver escrita
/// otimista em voo, a revisão esperada para a confirmação (`base + 1` por escrita).
#[derive(Debug, Clone)]
pub struct TrackedShipment {
    current: Shipment,
    pending: Option<PendingWrite>,
    deferred: Option<Shipment>,
}

impl TrackedShipment {
    pub fn new(shipment: Shipment) -> Self {
        Self { current: shipment, pending: None, deferred: None }
    }

    pub fn id(&self) -> uuid::Uuid {
        self.current.id
    }

    pub fn current(&self) -> &Shipment {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut Shipment {
        &mut self.current
    }

    pub fn has_pending_write(&self) -> bool {
        self.pending.is_some()
    }

    pub fn expected_revision(&self) -> Option<i64> {
        self.pending.map(|p| p.expected_revision)
    }

    /// Aplica o patch de forma otimista e registra a escrita em voo.
    pub fn begin_write(&mut self, patch: &ShipmentPatch) {
        let pending = match self.pending {
            Some(p) => PendingWrite {
                expected_revision: p.expected_revision + 1,
                in_flight: p.in_flight + 1,
            },
            None => PendingWrite {
                expected_revision: self.current.revision + 1,
                in_flight: 1,
            },
        };
        self.pending = Some(pending);
        patch.apply_to(&mut self.current);
    }

    /// Encerra uma escrita. `confirmed` é a linha devolvida pelo store em caso de sucesso;
    /// em falha o merge otimista permanece.
    pub fn settle_write(&mut self, confirmed: Option<Shipment>) {
        if let Some(row) = confirmed {
            if row.revision >= self.current.revision {
                self.current = row;
            }
        }

        let Some(mut pending) = self.pending.take() else {
            return;
        };
        pending.in_flight = pending.in_flight.saturating_sub(1);
        if pending.in_flight > 0 {
            self.pending = Some(pending);
            return;
        }

        if let Some(deferred) = self.deferred.take() {
            if deferred.revision > self.current.revision {
                self.current = deferred;
            }
        }
    }

    /// Regra de merge das notificações de UPDATE.
    pub fn receive_push(&mut self, incoming: Shipment) -> PushOutcome {
        match self.pending {
            Some(pending) if incoming.revision < pending.expected_revision => {
                let newer = self
                    .deferred
                    .as_ref()
                    .is_none_or(|d| incoming.revision >= d.revision);
                if newer {
                    self.deferred = Some(incoming);
                }
                PushOutcome::Deferred
            }
            Some(_) => {
                self.current = incoming;
                PushOutcome::Applied
            }
            None if incoming.revision >= self.current.revision => {
                self.current = incoming;
                PushOutcome::Applied
            }
            None => PushOutcome::Ignored,
        }
    }
}
