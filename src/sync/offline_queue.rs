// src/sync/offline_queue.rs

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::models::shipment::Shipment;

/// Nome da chave durável que guarda os embarques criados sem identidade remota.
pub const LOCAL_SHIPMENTS_KEY: &str = "certify:local_shipments";

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("falha de I/O na fila offline: {0}")]
    Io(#[from] std::io::Error),

    #[error("fila offline corrompida: {0}")]
    Format(#[from] serde_json::Error),
}

#[async_trait]
pub trait OfflineQueue: Send + Sync {
    async fn load(&self) -> Result<Vec<Shipment>, QueueError>;

    /// Substitui o conteúdo inteiro da fila.
    async fn store(&self, entries: &[Shipment]) -> Result<(), QueueError>;

    async fn append(&self, entry: Shipment) -> Result<(), QueueError> {
        let mut entries = self.load().await?;
        entries.push(entry);
        self.store(&entries).await
    }
}

/// Fila em um arquivo JSON. Cada escrita vai para um `.tmp` e depois é
/// renomeada, então um crash no meio nunca deixa o arquivo pela metade.
#[derive(Debug, Clone)]
pub struct FileOfflineQueue {
    path: PathBuf,
}

impl FileOfflineQueue {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let file_name = format!("{}.json", LOCAL_SHIPMENTS_KEY.replace(':', "_"));
        Self { path: dir.as_ref().join(file_name) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl OfflineQueue for FileOfflineQueue {
    async fn load(&self) -> Result<Vec<Shipment>, QueueError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn store(&self, entries: &[Shipment]) -> Result<(), QueueError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(entries)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        tracing::debug!("💾 Fila offline gravada com {} registro(s)", entries.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::shipment::sample_shipment;
    use tempfile::TempDir;
    use uuid::Uuid;

    #[tokio::test]
    async fn missing_file_is_an_empty_queue() {
        let dir = TempDir::new().unwrap();
        let queue = FileOfflineQueue::new(dir.path());
        assert!(queue.load().await.unwrap().is_empty());
        assert!(queue.path().ends_with("certify_local_shipments.json"));
    }

    #[tokio::test]
    async fn entries_survive_a_new_queue_instance() {
        let dir = TempDir::new().unwrap();
        let first = sample_shipment(Uuid::new_v4());
        let second = sample_shipment(Uuid::new_v4());

        let queue = FileOfflineQueue::new(dir.path());
        queue.append(first.clone()).await.unwrap();
        queue.append(second.clone()).await.unwrap();
        drop(queue);

        let reopened = FileOfflineQueue::new(dir.path());
        assert_eq!(reopened.load().await.unwrap(), vec![first, second]);
    }

    #[tokio::test]
    async fn store_rewrites_the_whole_list() {
        let dir = TempDir::new().unwrap();
        let queue = FileOfflineQueue::new(dir.path());
        queue.append(sample_shipment(Uuid::new_v4())).await.unwrap();

        queue.store(&[]).await.unwrap();
        assert!(queue.load().await.unwrap().is_empty());
        assert!(!queue.path().with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupted_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let queue = FileOfflineQueue::new(dir.path());
        std::fs::write(queue.path(), b"{not json").unwrap();
        assert!(matches!(queue.load().await, Err(QueueError::Format(_))));
    }
}
