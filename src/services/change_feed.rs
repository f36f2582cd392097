// src/services/change_feed.rs

use tokio::sync::broadcast::{self, error::RecvError};

use crate::models::{changes::ChangeEvent, shipment::ShipmentScope};

/// Hub em processo das mudanças da tabela `shipments`.
/// Quem escreve publica; cada assinatura filtra pelo próprio escopo.
#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Sem assinantes o evento é simplesmente descartado.
    pub fn publish(&self, event: ChangeEvent) {
        tracing::debug!("📣 {} {}", event.kind(), event.shipment_id());
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self, scope: ShipmentScope) -> ChangeSubscription {
        ChangeSubscription {
            scope,
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(256)
    }
}

pub struct ChangeSubscription {
    scope: ShipmentScope,
    receiver: broadcast::Receiver<ChangeEvent>,
}

impl ChangeSubscription {
    pub fn scope(&self) -> ShipmentScope {
        self.scope
    }

    /// Próximo evento visível neste escopo; `None` quando o feed fecha.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.visible_to(&self.scope) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("⚠️ Assinatura atrasada: {} eventos descartados", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{changes::RemovedShipment, shipment::sample_shipment};
    use uuid::Uuid;

    #[tokio::test]
    async fn subscription_only_sees_its_scope() {
        let feed = ChangeFeed::new(16);
        let mine = Uuid::new_v4();
        let mut sub = feed.subscribe(ShipmentScope::Exporter(mine));

        feed.publish(ChangeEvent::Insert { new: sample_shipment(Uuid::new_v4()) });
        let own = sample_shipment(mine);
        feed.publish(ChangeEvent::Insert { new: own.clone() });

        assert_eq!(sub.next().await, Some(ChangeEvent::Insert { new: own }));
    }

    #[tokio::test]
    async fn deletes_are_scoped_by_the_removed_keys() {
        let feed = ChangeFeed::new(16);
        let importer = Uuid::new_v4();
        let mut sub = feed.subscribe(ShipmentScope::Importer(importer));

        let removed = RemovedShipment { id: Uuid::new_v4(), exporter_id: Uuid::new_v4(), importer_id: Some(importer) };
        feed.publish(ChangeEvent::Delete { old: removed.clone() });

        assert_eq!(sub.next().await, Some(ChangeEvent::Delete { old: removed }));
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_ahead() {
        let feed = ChangeFeed::new(2);
        let mut sub = feed.subscribe(ShipmentScope::All);

        let shipments: Vec<_> = (0..4).map(|_| sample_shipment(Uuid::new_v4())).collect();
        for s in &shipments {
            feed.publish(ChangeEvent::Insert { new: s.clone() });
        }

        // Os dois mais antigos foram descartados.
        assert_eq!(sub.next().await.map(|e| e.shipment_id()), Some(shipments[2].id));
    }

    #[tokio::test]
    async fn closes_when_the_feed_is_dropped() {
        let feed = ChangeFeed::new(4);
        let mut sub = feed.subscribe(ShipmentScope::All);
        assert_eq!(feed.subscriber_count(), 1);
        drop(feed);
        assert_eq!(sub.next().await, None);
    }
}
