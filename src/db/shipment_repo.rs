// src/db/shipment_repo.rs

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::{postgres::PgListener, types::Json, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    common::{db_utils::begin_rls, error::AppError},
    models::{
        auth::Principal,
        certificate::Certificate,
        changes::{ChangeEvent, RemovedShipment},
        shipment::{NewShipment, Shipment, ShipmentPatch, ShipmentRow, ShipmentScope, ShipmentStatus},
    },
    services::change_feed::{ChangeFeed, ChangeSubscription},
    sync::ShipmentStore,
};

pub const CHANGES_CHANNEL: &str = "shipment_changes";

const SHIPMENT_COLUMNS: &str = "id, exporter_id, importer_id, product_name, quantity, unit, price, origin, \
    reference_id, notes, status, quality_criteria, inspection_comments, inspected_at, inspector_id, \
    supporting_documents, reported, vc_status, vc_id, client_ref, revision, created_at, updated_at";

const CERTIFICATE_COLUMNS: &str =
    "id, shipment_id, result, criterion_name, criterion_value, issued_at, issuer, digital_signature, payload";

// SQLSTATE 42501: violação de RLS ou recusa do trigger de inspeção.
fn refused_by_policy(e: sqlx::Error, reason: &str) -> AppError {
    let refused = matches!(&e, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("42501"));
    if refused {
        AppError::Forbidden(reason.into())
    } else {
        e.into()
    }
}

// Repositório da tabela `shipments`. Toda consulta roda dentro de uma
// transação com as variáveis de RLS do principal.
#[derive(Clone)]
pub struct ShipmentRepository {
    pool: PgPool,
    feed: ChangeFeed,
}

impl ShipmentRepository {
    pub fn new(pool: PgPool, feed: ChangeFeed) -> Self {
        Self { pool, feed }
    }

    async fn select_one(
        tx: &mut Transaction<'static, Postgres>,
        id: Uuid,
        for_update: bool,
    ) -> Result<Option<Shipment>, AppError> {
        let lock = if for_update { " FOR UPDATE" } else { "" };
        let row = sqlx::query_as::<_, ShipmentRow>(&format!(
            "SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE id = $1{lock}"
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

        row.map(Shipment::try_from).transpose()
    }
}

#[async_trait]
impl ShipmentStore for ShipmentRepository {
    async fn list(&self, principal: &Principal, scope: ShipmentScope) -> Result<Vec<Shipment>, AppError> {
        let mut tx = begin_rls(&self.pool, principal).await?;

        // O filtro por papel é só projeção; quem decide a visibilidade é a política RLS.
        let rows = sqlx::query_as::<_, ShipmentRow>(&format!(
            r#"
            SELECT {SHIPMENT_COLUMNS} FROM shipments
            WHERE ($1::uuid IS NULL OR exporter_id = $1)
              AND ($2::uuid IS NULL OR importer_id = $2)
            ORDER BY created_at DESC
            "#
        ))
        .bind(scope.exporter_filter())
        .bind(scope.importer_filter())
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        rows.into_iter().map(Shipment::try_from).collect()
    }

    async fn get(&self, principal: &Principal, id: Uuid) -> Result<Option<Shipment>, AppError> {
        let mut tx = begin_rls(&self.pool, principal).await?;
        let shipment = Self::select_one(&mut tx, id, false).await?;
        tx.commit().await?;
        Ok(shipment)
    }

    async fn insert(
        &self,
        principal: &Principal,
        exporter_id: Uuid,
        input: &NewShipment,
    ) -> Result<Shipment, AppError> {
        let mut tx = begin_rls(&self.pool, principal).await?;

        let inserted = sqlx::query_as::<_, ShipmentRow>(&format!(
            r#"
            INSERT INTO shipments (
                exporter_id, importer_id, product_name, quantity, unit, price,
                origin, reference_id, notes, quality_criteria, client_ref
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (client_ref) DO NOTHING
            RETURNING {SHIPMENT_COLUMNS}
            "#
        ))
        .bind(exporter_id)
        .bind(input.importer_id)
        .bind(&input.product_name)
        .bind(input.quantity)
        .bind(&input.unit)
        .bind(input.price)
        .bind(&input.origin)
        .bind(&input.reference_id)
        .bind(&input.notes)
        .bind(input.quality_criterion.as_ref().map(Json))
        .bind(input.client_ref)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| refused_by_policy(e, "política de visibilidade recusou o registro"))?;

        let row = match inserted {
            Some(row) => row,
            // Reenvio de um registro offline: devolve o que já existe.
            None => {
                tracing::debug!("♻️ client_ref {:?} já inserido; devolvendo a linha existente", input.client_ref);
                sqlx::query_as::<_, ShipmentRow>(&format!(
                    "SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE client_ref = $1"
                ))
                .bind(input.client_ref)
                .fetch_optional(&mut *tx)
                .await?
                // A linha existe, mas a RLS a esconde: a chave é de outro usuário.
                .ok_or(AppError::ClientRefConflict(input.client_ref.unwrap_or_default()))?
            }
        };

        tx.commit().await?;
        Shipment::try_from(row)
    }

    async fn update(&self, principal: &Principal, id: Uuid, patch: &ShipmentPatch) -> Result<Shipment, AppError> {
        let mut tx = begin_rls(&self.pool, principal).await?;

        let mut shipment = Self::select_one(&mut tx, id, true)
            .await?
            .ok_or(AppError::ShipmentNotFound(id))?;
        patch.apply_checked(&mut shipment)?;

        let row = sqlx::query_as::<_, ShipmentRow>(&format!(
            r#"
            UPDATE shipments SET
                importer_id = $2, product_name = $3, quantity = $4, unit = $5, price = $6,
                origin = $7, reference_id = $8, notes = $9, status = $10, quality_criteria = $11,
                inspection_comments = $12, inspected_at = $13, inspector_id = $14,
                supporting_documents = $15, reported = $16,
                revision = revision + 1, updated_at = NOW()
            WHERE id = $1
            RETURNING {SHIPMENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(shipment.importer_id)
        .bind(&shipment.product_name)
        .bind(shipment.quantity)
        .bind(&shipment.unit)
        .bind(shipment.price)
        .bind(&shipment.origin)
        .bind(&shipment.reference_id)
        .bind(&shipment.notes)
        .bind(shipment.status.as_str())
        .bind(shipment.quality_criterion.as_ref().map(Json))
        .bind(&shipment.inspection_comments)
        .bind(shipment.inspected_at)
        .bind(shipment.inspector_id)
        .bind(&shipment.supporting_documents)
        .bind(shipment.reported)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| refused_by_policy(e, "colunas de inspeção são exclusivas do QA"))?;

        tx.commit().await?;
        Shipment::try_from(row)
    }

    async fn issue_certificate(
        &self,
        principal: &Principal,
        draft: &Certificate,
    ) -> Result<(Shipment, Certificate), AppError> {
        let mut tx = begin_rls(&self.pool, principal).await?;

        let current = Self::select_one(&mut tx, draft.shipment_id, true)
            .await?
            .ok_or(AppError::ShipmentNotFound(draft.shipment_id))?;
        if current.status != ShipmentStatus::InspectedPass {
            return Err(AppError::InvalidTransition {
                from: current.status,
                to: ShipmentStatus::CertificateIssued,
            });
        }

        let certificate = sqlx::query_as::<_, Certificate>(&format!(
            r#"
            INSERT INTO certificates (
                id, shipment_id, result, criterion_name, criterion_value,
                issued_at, issuer, digital_signature, payload
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {CERTIFICATE_COLUMNS}
            "#
        ))
        .bind(&draft.id)
        .bind(draft.shipment_id)
        .bind(&draft.result)
        .bind(&draft.criterion_name)
        .bind(&draft.criterion_value)
        .bind(draft.issued_at)
        .bind(&draft.issuer)
        .bind(&draft.digital_signature)
        .bind(&draft.payload)
        .fetch_one(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, ShipmentRow>(&format!(
            r#"
            UPDATE shipments SET status = $2, revision = revision + 1, updated_at = NOW()
            WHERE id = $1
            RETURNING {SHIPMENT_COLUMNS}
            "#
        ))
        .bind(draft.shipment_id)
        .bind(ShipmentStatus::CertificateIssued.as_str())
        .fetch_one(&mut *tx)
        .await?;

        // Se qualquer passo acima falhar, o drop do `tx` faz rollback dos dois.
        tx.commit().await?;
        Ok((Shipment::try_from(row)?, certificate))
    }

    async fn find_certificate(&self, principal: &Principal, id: &str) -> Result<Option<Certificate>, AppError> {
        let mut tx = begin_rls(&self.pool, principal).await?;
        let certificate = sqlx::query_as::<_, Certificate>(&format!(
            "SELECT {CERTIFICATE_COLUMNS} FROM certificates WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(certificate)
    }

    async fn certificate_for_shipment(
        &self,
        principal: &Principal,
        shipment_id: Uuid,
    ) -> Result<Option<Certificate>, AppError> {
        let mut tx = begin_rls(&self.pool, principal).await?;
        let certificate = sqlx::query_as::<_, Certificate>(&format!(
            "SELECT {CERTIFICATE_COLUMNS} FROM certificates WHERE shipment_id = $1"
        ))
        .bind(shipment_id)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(certificate)
    }

    async fn set_credential(&self, shipment_id: Uuid, vc_id: &str) -> Result<Option<Shipment>, AppError> {
        let mut tx = begin_rls(&self.pool, &Principal::Service).await?;
        let row = sqlx::query_as::<_, ShipmentRow>(&format!(
            r#"
            UPDATE shipments SET vc_status = $2, vc_id = $3, revision = revision + 1, updated_at = NOW()
            WHERE id = $1
            RETURNING {SHIPMENT_COLUMNS}
            "#
        ))
        .bind(shipment_id)
        .bind(crate::services::credential_service::VC_STATUS_ISSUED)
        .bind(vc_id)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;
        row.map(Shipment::try_from).transpose()
    }

    fn subscribe(&self, scope: ShipmentScope) -> ChangeSubscription {
        self.feed.subscribe(scope)
    }
}

// ---
// Listener do NOTIFY disparado pelo trigger `shipments_notify`
// ---

#[derive(Debug, Deserialize)]
struct RowChange {
    op: String,
    id: Uuid,
    exporter_id: Uuid,
    importer_id: Option<Uuid>,
}

impl ShipmentRepository {
    /// Consome `shipment_changes` e republica cada mudança no `ChangeFeed`.
    /// Roda até o processo terminar; quedas de conexão são refeitas pelo `PgListener`.
    pub async fn run_change_listener(self) -> Result<(), AppError> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(CHANGES_CHANNEL).await?;
        tracing::info!("👂 Escutando o canal '{}'", CHANGES_CHANNEL);

        loop {
            let notification = match listener.recv().await {
                Ok(n) => n,
                Err(e) => {
                    tracing::error!("🔥 Falha no listener de mudanças: {:?}", e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            let change: RowChange = match serde_json::from_str(notification.payload()) {
                Ok(change) => change,
                Err(e) => {
                    tracing::warn!("⚠️ Payload de mudança inválido ({}): {}", e, notification.payload());
                    continue;
                }
            };

            match self.event_for(change).await {
                Ok(Some(event)) => self.feed.publish(event),
                Ok(None) => {}
                Err(e) => tracing::warn!("⚠️ Não foi possível carregar a linha alterada: {}", e),
            }
        }
    }

    async fn event_for(&self, change: RowChange) -> Result<Option<ChangeEvent>, AppError> {
        if change.op == "DELETE" {
            return Ok(Some(ChangeEvent::Delete {
                old: RemovedShipment {
                    id: change.id,
                    exporter_id: change.exporter_id,
                    importer_id: change.importer_id,
                },
            }));
        }

        // A linha pode ter sido apagada entre o NOTIFY e esta leitura.
        let Some(row) = self.get(&Principal::Service, change.id).await? else {
            return Ok(None);
        };
        Ok(Some(match change.op.as_str() {
            "INSERT" => ChangeEvent::Insert { new: row },
            _ => ChangeEvent::Update { new: row },
        }))
    }
}
