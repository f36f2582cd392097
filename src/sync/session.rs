// src/sync/session.rs

use std::sync::{Arc, Mutex};

use serde::Serialize;
use thiserror::Error;
use tokio::{sync::RwLock, task::JoinHandle};
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{
    common::error::AppError,
    models::{
        auth::{Principal, Profile, UserRole},
        certificate::Certificate,
        changes::ChangeEvent,
        shipment::{NewShipment, Shipment, ShipmentPatch, ShipmentScope, ShipmentStatus},
    },
    sync::{
        offline_queue::{OfflineQueue, QueueError},
        store::ShipmentStore,
        tracked::TrackedShipment,
    },
};

/// Quem está usando a sessão.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// Autenticado no store remoto.
    Authenticated(Profile),
    /// Identidade local sem acesso remoto: criações vão para a fila offline.
    Demo(Profile),
}

impl Identity {
    pub fn profile(&self) -> &Profile {
        match self {
            Identity::Authenticated(p) | Identity::Demo(p) => p,
        }
    }
}

/// Snapshot para depurar problemas de acesso (linhas que existem no store mas
/// não aparecem para a identidade atual) sem ler os logs do servidor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub last_fetch_count: Option<usize>,
    pub last_fetch_role: Option<UserRole>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub replayed: usize,
    pub remaining: usize,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("nenhuma identidade autenticada na sessão")]
    NotSignedIn,

    #[error("embarque desconhecido nesta sessão: {0}")]
    UnknownShipment(Uuid),

    #[error("transição de status inválida: {from} -> {to}")]
    InvalidTransition { from: ShipmentStatus, to: ShipmentStatus },

    #[error("o papel '{0}' não pode executar esta operação")]
    RoleNotAllowed(UserRole),

    #[error("dados inválidos: {0}")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Store(#[from] AppError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

#[derive(Default)]
struct SessionState {
    identity: Option<Identity>,
    shipments: Vec<TrackedShipment>,
    certificates: Vec<Certificate>,
    diagnostics: Diagnostics,
}

impl SessionState {
    fn find(&self, id: Uuid) -> Option<&TrackedShipment> {
        self.shipments.iter().find(|t| t.id() == id)
    }

    fn find_mut(&mut self, id: Uuid) -> Option<&mut TrackedShipment> {
        self.shipments.iter_mut().find(|t| t.id() == id)
    }

    /// Mais novo primeiro.
    fn insert_sorted(&mut self, shipment: Shipment) {
        let at = self
            .shipments
            .partition_point(|t| t.current().created_at > shipment.created_at);
        self.shipments.insert(at, TrackedShipment::new(shipment));
    }

    /// Linha canônica vinda do store (feed, replay ou confirmação).
    fn merge_server_row(&mut self, row: Shipment) {
        // Uma cópia local da fila offline é substituída pela linha remota.
        if let Some(local_id) = row.client_ref.filter(|r| *r != row.id) {
            self.shipments.retain(|t| t.id() != local_id);
        }

        match self.find_mut(row.id) {
            Some(tracked) => {
                let outcome = tracked.receive_push(row);
                tracing::trace!("🔁 merge de push: {:?}", outcome);
            }
            None => self.insert_sorted(row),
        }
    }

    /// Substitui a lista inteira, preservando a reconciliação de escritas em voo.
    fn replace_all(&mut self, rows: Vec<Shipment>) {
        let mut previous = std::mem::take(&mut self.shipments);
        self.shipments = rows
            .into_iter()
            .map(|row| match previous.iter().position(|t| t.id() == row.id && t.has_pending_write()) {
                Some(pos) => {
                    let mut tracked = previous.swap_remove(pos);
                    tracked.receive_push(row);
                    tracked
                }
                None => TrackedShipment::new(row),
            })
            .collect();
    }

    fn apply_change(&mut self, event: ChangeEvent) {
        match event {
            ChangeEvent::Insert { new } | ChangeEvent::Update { new } => self.merge_server_row(new),
            ChangeEvent::Delete { old } => self.shipments.retain(|t| t.id() != old.id),
        }
    }

    fn record_error(&mut self, err: &dyn std::fmt::Display) {
        self.diagnostics.last_error = Some(err.to_string());
    }

    fn remember_certificate(&mut self, certificate: Certificate) {
        match self.certificates.iter_mut().find(|c| c.id == certificate.id) {
            Some(existing) => *existing = certificate,
            None => self.certificates.push(certificate),
        }
    }
}

struct ActiveSubscription {
    user_id: Uuid,
    role: UserRole,
    task: JoinHandle<()>,
}

/// Contexto de sincronização de embarques de uma sessão.
///
/// Media entre o estado em memória, o store remoto e o feed de mudanças.
/// Store e fila offline são injetados; não existe estado global.
pub struct ShipmentSession {
    store: Arc<dyn ShipmentStore>,
    queue: Arc<dyn OfflineQueue>,
    state: Arc<RwLock<SessionState>>,
    subscription: Mutex<Option<ActiveSubscription>>,
}

impl ShipmentSession {
    pub fn new(store: Arc<dyn ShipmentStore>, queue: Arc<dyn OfflineQueue>) -> Self {
        Self {
            store,
            queue,
            state: Arc::new(RwLock::new(SessionState::default())),
            subscription: Mutex::new(None),
        }
    }

    // ---
    // Identidade e ciclo de vida
    // ---

    /// Autentica a sessão: abre a assinatura, reenvia a fila offline e recarrega a lista.
    pub async fn sign_in(&self, profile: Profile) -> ReplayReport {
        {
            let mut state = self.state.write().await;
            let same_user = state.identity.as_ref().map(|i| i.profile().id) == Some(profile.id);
            if !same_user {
                state.shipments.clear();
                state.certificates.clear();
                state.diagnostics = Diagnostics::default();
            }
            state.identity = Some(Identity::Authenticated(profile.clone()));
        }
        tracing::info!("🔑 Sessão autenticada para {} ({})", profile.email, profile.role);

        // Assina antes de buscar para não perder eventos entre as duas coisas.
        self.ensure_subscription(&profile);

        let report = match self.replay_offline_queue().await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!("⚠️ Falha ao reenviar a fila offline: {}", e);
                self.state.write().await.record_error(&e);
                ReplayReport::default()
            }
        };

        if report.replayed == 0 {
            // `replay_offline_queue` já recarrega quando algo foi reenviado.
            self.fetch_all().await;
        }
        report
    }

    /// Modo degradado: sem store remoto, registros vão para a fila offline.
    pub async fn enter_demo(&self, profile: Profile) -> Result<(), SessionError> {
        self.close_subscription();
        let queued = self.queue.load().await?;

        let mut state = self.state.write().await;
        *state = SessionState::default();
        state.identity = Some(Identity::Demo(profile));
        for entry in queued {
            state.insert_sorted(entry);
        }
        tracing::info!("🧪 Sessão em modo demo com {} registro(s) na fila", state.shipments.len());
        Ok(())
    }

    pub async fn sign_out(&self) {
        self.close_subscription();
        *self.state.write().await = SessionState::default();
        tracing::info!("👋 Sessão encerrada");
    }

    /// Garante exatamente uma assinatura ativa para o usuário/papel atual.
    fn ensure_subscription(&self, profile: &Profile) {
        let mut slot = self.subscription.lock().unwrap_or_else(|p| p.into_inner());

        if let Some(active) = slot.as_ref() {
            if active.user_id == profile.id && active.role == profile.role && !active.task.is_finished() {
                return;
            }
        }
        if let Some(old) = slot.take() {
            old.task.abort();
            tracing::debug!("🔌 Assinatura anterior de {} encerrada", old.user_id);
        }

        let mut subscription = self.store.subscribe(ShipmentScope::for_user(profile.id, profile.role));
        let state = Arc::clone(&self.state);
        let task = tokio::spawn(async move {
            while let Some(event) = subscription.next().await {
                tracing::debug!("📨 {} {}", event.kind(), event.shipment_id());
                state.write().await.apply_change(event);
            }
        });

        *slot = Some(ActiveSubscription { user_id: profile.id, role: profile.role, task });
    }

    fn close_subscription(&self) {
        let mut slot = self.subscription.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(active) = slot.take() {
            active.task.abort();
        }
    }

    pub fn has_active_subscription(&self) -> bool {
        self.subscription
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()
            .is_some_and(|a| !a.task.is_finished())
    }

    async fn authenticated(&self) -> Option<Profile> {
        match &self.state.read().await.identity {
            Some(Identity::Authenticated(p)) => Some(p.clone()),
            _ => None,
        }
    }

    // ---
    // Operações
    // ---

    /// Recarrega a lista visível para a identidade atual. Nunca falha: erros
    /// ficam nos diagnósticos e o estado anterior é mantido.
    pub async fn fetch_all(&self) {
        let Some(profile) = self.authenticated().await else {
            tracing::debug!("fetch_all ignorado: sessão sem identidade autenticada");
            return;
        };

        let scope = ShipmentScope::for_user(profile.id, profile.role);
        let result = self.store.list(&profile.principal(), scope).await;

        let mut state = self.state.write().await;
        // A identidade pode ter mudado enquanto a busca estava em voo.
        if state.identity.as_ref().map(|i| i.profile().id) != Some(profile.id) {
            return;
        }
        state.diagnostics.last_fetch_role = Some(profile.role);
        match result {
            Ok(rows) => {
                tracing::debug!("📦 {} embarque(s) visíveis para {} ({})", rows.len(), profile.id, profile.role);
                state.diagnostics.last_fetch_count = Some(rows.len());
                state.diagnostics.last_error = None;
                state.replace_all(rows);
            }
            Err(e) => {
                tracing::warn!("⚠️ Falha ao buscar embarques: {}", e);
                state.diagnostics.last_fetch_count = None;
                state.record_error(&e);
            }
        }
    }

    /// Cria um embarque com status `Pending Inspection`.
    pub async fn create(&self, input: NewShipment) -> Result<Shipment, SessionError> {
        input.validate()?;

        let identity = self.state.read().await.identity.clone();
        match identity {
            None => Err(SessionError::NotSignedIn),
            Some(Identity::Demo(profile)) => {
                let draft = Shipment::local_draft(profile.id, &input);
                self.queue.append(draft.clone()).await?;
                self.state.write().await.shipments.insert(0, TrackedShipment::new(draft.clone()));
                tracing::info!("📝 Embarque {} guardado na fila offline", draft.id);
                Ok(draft)
            }
            Some(Identity::Authenticated(profile)) => {
                if profile.role != UserRole::Exporter {
                    return Err(SessionError::RoleNotAllowed(profile.role));
                }
                let row = match self.store.insert(&profile.principal(), profile.id, &input).await {
                    Ok(row) => row,
                    Err(e) => {
                        self.state.write().await.record_error(&e);
                        return Err(e.into());
                    }
                };
                tracing::info!("✅ Embarque {} criado", row.id);

                self.fetch_all().await;
                let mut state = self.state.write().await;
                if state.find(row.id).is_none() {
                    state.merge_server_row(row.clone());
                }
                Ok(row)
            }
        }
    }

    /// Merge otimista imediato e persistência apenas dos campos alterados.
    /// Segue as regras de campo por papel; `Certificate Issued` só pela emissão.
    /// Em falha o merge otimista NÃO é desfeito; o erro fica nos diagnósticos.
    pub async fn update(&self, id: Uuid, patch: ShipmentPatch) -> Result<Shipment, SessionError> {
        patch.validate()?;

        let (identity, changed) = {
            let state = self.state.read().await;
            let identity = state.identity.clone().ok_or(SessionError::NotSignedIn)?;
            let role = identity.profile().role;
            if patch.check_role(role).is_err() {
                return Err(SessionError::RoleNotAllowed(role));
            }
            let current = state.find(id).ok_or(SessionError::UnknownShipment(id))?.current();
            if let Some(next) = patch.refused_status(current.status) {
                return Err(SessionError::InvalidTransition { from: current.status, to: next });
            }
            (identity, patch.changed_fields(current))
        };

        let profile = match identity {
            Identity::Demo(_) => return self.update_queued(id, &changed).await,
            Identity::Authenticated(profile) => profile,
        };

        if changed.is_empty() {
            return self.shipment(id).await.ok_or(SessionError::UnknownShipment(id));
        }

        if let Some(tracked) = self.state.write().await.find_mut(id) {
            tracked.begin_write(&changed);
        }

        let result = self.store.update(&profile.principal(), id, &changed).await;

        let mut state = self.state.write().await;
        if let Some(tracked) = state.find_mut(id) {
            tracked.settle_write(result.as_ref().ok().cloned());
        }
        match result {
            Ok(_) => state
                .find(id)
                .map(|t| t.current().clone())
                .ok_or(SessionError::UnknownShipment(id)),
            Err(e) => {
                tracing::warn!("⚠️ Falha ao atualizar embarque {}: {}", id, e);
                state.record_error(&e);
                Err(e.into())
            }
        }
    }

    /// Modo demo: o patch vale para a memória e para a entrada da fila.
    async fn update_queued(&self, id: Uuid, changed: &ShipmentPatch) -> Result<Shipment, SessionError> {
        let mut queued = self.queue.load().await?;
        if let Some(entry) = queued.iter_mut().find(|s| s.id == id) {
            changed.apply_to(entry);
            self.queue.store(&queued).await?;
        }

        let mut state = self.state.write().await;
        let tracked = state.find_mut(id).ok_or(SessionError::UnknownShipment(id))?;
        changed.apply_to(tracked.current_mut());
        Ok(tracked.current().clone())
    }

    /// Emite o certificado de um embarque aprovado numa única chamada atômica.
    /// O estado local só muda depois da confirmação do store.
    pub async fn issue_certificate(&self, shipment_id: Uuid) -> Result<Certificate, SessionError> {
        let profile = self.authenticated().await.ok_or(SessionError::NotSignedIn)?;
        if profile.role != UserRole::Qa {
            return Err(SessionError::RoleNotAllowed(profile.role));
        }

        let shipment = self.shipment(shipment_id).await.ok_or(SessionError::UnknownShipment(shipment_id))?;
        if shipment.status != ShipmentStatus::InspectedPass {
            return Err(SessionError::InvalidTransition {
                from: shipment.status,
                to: ShipmentStatus::CertificateIssued,
            });
        }

        let draft = Certificate::draft_for(&shipment, &profile.organization);
        let result = self.store.issue_certificate(&profile.principal(), &draft).await;

        let mut state = self.state.write().await;
        match result {
            Ok((row, certificate)) => {
                tracing::info!("📜 Certificado {} emitido para {}", certificate.id, row.id);
                state.merge_server_row(row);
                state.remember_certificate(certificate.clone());
                Ok(certificate)
            }
            Err(e) => {
                tracing::warn!("⚠️ Falha ao emitir certificado para {}: {}", shipment_id, e);
                state.record_error(&e);
                Err(e.into())
            }
        }
    }

    /// Reenvia a fila offline. Falhas ficam na fila; sucessos entram na memória.
    pub async fn replay_offline_queue(&self) -> Result<ReplayReport, SessionError> {
        let profile = self.authenticated().await.ok_or(SessionError::NotSignedIn)?;
        let queued = self.queue.load().await?;
        if queued.is_empty() {
            return Ok(ReplayReport::default());
        }
        if profile.role != UserRole::Exporter {
            tracing::info!("⏸️ {} registro(s) na fila aguardando um exportador", queued.len());
            return Ok(ReplayReport { replayed: 0, remaining: queued.len() });
        }

        let principal = profile.principal();
        let mut remaining = Vec::new();
        let mut replayed = 0;

        for entry in queued {
            let input = NewShipment::from_queued(&entry);
            match self.store.insert(&principal, profile.id, &input).await {
                Ok(row) => {
                    replayed += 1;
                    self.state.write().await.merge_server_row(row);
                }
                Err(e) => {
                    tracing::warn!("⚠️ Registro offline {} continua na fila: {}", entry.id, e);
                    self.state.write().await.record_error(&e);
                    remaining.push(entry);
                }
            }
        }

        self.queue.store(&remaining).await?;
        tracing::info!("📤 Fila offline: {} reenviado(s), {} pendente(s)", replayed, remaining.len());

        if replayed > 0 {
            self.fetch_all().await;
        }
        Ok(ReplayReport { replayed, remaining: remaining.len() })
    }

    /// Aplica uma notificação do feed (a tarefa de assinatura chama o mesmo merge).
    pub async fn apply_change(&self, event: ChangeEvent) {
        self.state.write().await.apply_change(event);
    }

    // ---
    // Leitura
    // ---

    pub async fn identity(&self) -> Option<Identity> {
        self.state.read().await.identity.clone()
    }

    pub async fn principal(&self) -> Option<Principal> {
        self.authenticated().await.map(|p| p.principal())
    }

    pub async fn shipments(&self) -> Vec<Shipment> {
        self.state.read().await.shipments.iter().map(|t| t.current().clone()).collect()
    }

    pub async fn shipment(&self, id: Uuid) -> Option<Shipment> {
        self.state.read().await.find(id).map(|t| t.current().clone())
    }

    pub async fn certificates(&self) -> Vec<Certificate> {
        self.state.read().await.certificates.clone()
    }

    pub async fn certificate(&self, id: &str) -> Option<Certificate> {
        self.state.read().await.certificates.iter().find(|c| c.id == id).cloned()
    }

    pub async fn diagnostics(&self) -> Diagnostics {
        self.state.read().await.diagnostics.clone()
    }
}

impl Drop for ShipmentSession {
    fn drop(&mut self) {
        self.close_subscription();
    }
}
