// src/models/shipment.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::{types::Json, FromRow};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{common::error::AppError, models::auth::UserRole};

// --- Enums ---

/// Status de um embarque. A máquina de estados só anda para frente:
///
/// ```text
/// Pending Inspection -> Inspected - Pass -> Certificate Issued
/// Pending Inspection -> Inspected - Fail
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum ShipmentStatus {
    #[serde(rename = "Pending Inspection")]
    PendingInspection,
    #[serde(rename = "Inspected - Pass")]
    InspectedPass,
    #[serde(rename = "Inspected - Fail")]
    InspectedFail,
    #[serde(rename = "Certificate Issued")]
    CertificateIssued,
}

impl ShipmentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::PendingInspection => "Pending Inspection",
            ShipmentStatus::InspectedPass => "Inspected - Pass",
            ShipmentStatus::InspectedFail => "Inspected - Fail",
            ShipmentStatus::CertificateIssued => "Certificate Issued",
        }
    }

    /// Transições de identidade são aceitas para que updates repetidos sejam idempotentes.
    pub fn can_transition_to(self, next: ShipmentStatus) -> bool {
        use ShipmentStatus::*;
        self == next
            || matches!(
                (self, next),
                (PendingInspection, InspectedPass)
                    | (PendingInspection, InspectedFail)
                    | (InspectedPass, CertificateIssued)
            )
    }

    /// Rótulo usado no certificado ("Pass"/"Fail"); pendentes mostram o próprio status.
    pub fn result_label(&self) -> &'static str {
        match self {
            ShipmentStatus::InspectedPass | ShipmentStatus::CertificateIssued => "Pass",
            ShipmentStatus::InspectedFail => "Fail",
            ShipmentStatus::PendingInspection => self.as_str(),
        }
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShipmentStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending Inspection" => Ok(ShipmentStatus::PendingInspection),
            "Inspected - Pass" => Ok(ShipmentStatus::InspectedPass),
            "Inspected - Fail" => Ok(ShipmentStatus::InspectedFail),
            "Certificate Issued" => Ok(ShipmentStatus::CertificateIssued),
            other => Err(AppError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum InspectionResult {
    Pass,
    Fail,
}

impl InspectionResult {
    pub const fn as_str(&self) -> &'static str {
        match self {
            InspectionResult::Pass => "Pass",
            InspectionResult::Fail => "Fail",
        }
    }

    pub const fn status(&self) -> ShipmentStatus {
        match self {
            InspectionResult::Pass => ShipmentStatus::InspectedPass,
            InspectionResult::Fail => ShipmentStatus::InspectedFail,
        }
    }
}

impl FromStr for InspectionResult {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pass" => Ok(InspectionResult::Pass),
            "Fail" => Ok(InspectionResult::Fail),
            other => Err(AppError::UnknownStatus(other.to_string())),
        }
    }
}

// --- Critério de qualidade ---

pub const DEFAULT_CRITERION_NAME: &str = "Quality Check";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QualityCriterion {
    #[schema(example = "Moisture Content")]
    pub name: String,

    /// Valor medido. Aceita número ou texto no JSON; guardado como texto.
    #[serde(default, deserialize_with = "measured_value", skip_serializing_if = "Option::is_none")]
    #[schema(example = "12.5")]
    pub value: Option<String>,
}

fn measured_value<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "valor de critério inválido: {}",
            other
        ))),
    }
}

// --- Entidade principal ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Shipment {
    pub id: Uuid,
    pub exporter_id: Uuid,
    pub importer_id: Option<Uuid>,
    #[schema(example = "Beans")]
    pub product_name: String,
    #[schema(example = "100")]
    pub quantity: Decimal,
    #[schema(example = "kg")]
    pub unit: String,
    #[schema(example = "0")]
    pub price: Decimal,
    #[schema(example = "Region A")]
    pub origin: String,
    #[schema(example = "PO-1")]
    pub reference_id: String,
    pub notes: Option<String>,
    pub status: ShipmentStatus,
    pub quality_criterion: Option<QualityCriterion>,
    pub inspection_comments: Option<String>,
    pub inspected_at: Option<DateTime<Utc>>,
    pub inspector_id: Option<Uuid>,
    pub supporting_documents: Option<Vec<String>>,
    pub reported: Option<bool>,
    pub vc_status: Option<String>,
    pub vc_id: Option<String>,
    #[schema(ignore)]
    pub client_ref: Option<Uuid>,
    /// Versão monotônica do servidor, incrementada a cada update.
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shipment {
    pub fn criterion_name(&self) -> &str {
        self.quality_criterion
            .as_ref()
            .map(|c| c.name.as_str())
            .unwrap_or(DEFAULT_CRITERION_NAME)
    }

    pub fn criterion_value(&self) -> Option<&str> {
        self.quality_criterion.as_ref().and_then(|c| c.value.as_deref())
    }

    /// Registro local criado sem identidade remota (modo demo/offline).
    pub fn local_draft(exporter_id: Uuid, input: &NewShipment) -> Self {
        let id = Uuid::new_v4();
        let now = Utc::now();
        Self {
            id,
            exporter_id,
            importer_id: input.importer_id,
            product_name: input.product_name.clone(),
            quantity: input.quantity,
            unit: input.unit.clone(),
            price: input.price,
            origin: input.origin.clone(),
            reference_id: input.reference_id.clone(),
            notes: input.notes.clone(),
            status: ShipmentStatus::PendingInspection,
            quality_criterion: input.quality_criterion.clone(),
            inspection_comments: None,
            inspected_at: None,
            inspector_id: None,
            supporting_documents: None,
            reported: None,
            vc_status: None,
            vc_id: None,
            client_ref: Some(id),
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Linha crua da tabela `shipments`.
#[derive(Debug, FromRow)]
pub struct ShipmentRow {
    pub id: Uuid,
    pub exporter_id: Uuid,
    pub importer_id: Option<Uuid>,
    pub product_name: String,
    pub quantity: Decimal,
    pub unit: String,
    pub price: Decimal,
    pub origin: String,
    pub reference_id: String,
    pub notes: Option<String>,
    pub status: String,
    pub quality_criteria: Option<Json<QualityCriterion>>,
    pub inspection_comments: Option<String>,
    pub inspected_at: Option<DateTime<Utc>>,
    pub inspector_id: Option<Uuid>,
    pub supporting_documents: Option<Vec<String>>,
    pub reported: Option<bool>,
    pub vc_status: Option<String>,
    pub vc_id: Option<String>,
    pub client_ref: Option<Uuid>,
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ShipmentRow> for Shipment {
    type Error = AppError;

    fn try_from(r: ShipmentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            exporter_id: r.exporter_id,
            importer_id: r.importer_id,
            product_name: r.product_name,
            quantity: r.quantity,
            unit: r.unit,
            price: r.price,
            origin: r.origin,
            reference_id: r.reference_id,
            notes: r.notes,
            status: r.status.parse()?,
            quality_criterion: r.quality_criteria.map(|Json(c)| c),
            inspection_comments: r.inspection_comments,
            inspected_at: r.inspected_at,
            inspector_id: r.inspector_id,
            supporting_documents: r.supporting_documents,
            reported: r.reported,
            vc_status: r.vc_status,
            vc_id: r.vc_id,
            client_ref: r.client_ref,
            revision: r.revision,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

// ---
// Validação Customizada
// ---
pub(crate) fn validate_not_negative(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_sign_negative() && !val.is_zero() {
        let mut err = ValidationError::new("range");
        err.add_param("min".into(), &0.0);
        return Err(err);
    }
    Ok(())
}

fn default_unit() -> String {
    "kg".to_string()
}

// ---
// Payload: criação de embarque
// ---
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewShipment {
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "Beans")]
    pub product_name: String,

    #[validate(custom(function = "validate_not_negative"))]
    #[schema(example = "100")]
    pub quantity: Decimal,

    #[serde(default = "default_unit")]
    #[schema(example = "kg")]
    pub unit: String,

    #[serde(default)]
    #[validate(custom(function = "validate_not_negative"))]
    pub price: Decimal,

    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "Region A")]
    pub origin: String,

    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "PO-1")]
    pub reference_id: String,

    pub notes: Option<String>,

    pub quality_criterion: Option<QualityCriterion>,

    pub importer_id: Option<Uuid>,

    /// Chave de idempotência: reenvios com o mesmo valor não duplicam o registro.
    #[serde(default)]
    pub client_ref: Option<Uuid>,
}

impl NewShipment {
    /// Reconstrói o payload de criação a partir de um registro da fila offline.
    pub fn from_queued(local: &Shipment) -> Self {
        Self {
            product_name: local.product_name.clone(),
            quantity: local.quantity,
            unit: local.unit.clone(),
            price: local.price,
            origin: local.origin.clone(),
            reference_id: local.reference_id.clone(),
            notes: local.notes.clone(),
            quality_criterion: local.quality_criterion.clone(),
            importer_id: local.importer_id,
            client_ref: local.client_ref.or(Some(local.id)),
        }
    }
}

// ---
// Payload: update parcial
// ---
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentPatch {
    pub product_name: Option<String>,
    #[validate(custom(function = "validate_not_negative"))]
    pub quantity: Option<Decimal>,
    pub unit: Option<String>,
    #[validate(custom(function = "validate_not_negative"))]
    pub price: Option<Decimal>,
    pub origin: Option<String>,
    pub reference_id: Option<String>,
    pub notes: Option<String>,
    pub importer_id: Option<Uuid>,
    pub status: Option<ShipmentStatus>,
    pub quality_criterion: Option<QualityCriterion>,
    pub inspection_comments: Option<String>,
    pub inspected_at: Option<DateTime<Utc>>,
    pub inspector_id: Option<Uuid>,
    pub supporting_documents: Option<Vec<String>>,
    pub reported: Option<bool>,
}

macro_rules! for_each_patch_field {
    ($m:ident) => {
        $m!(product_name);
        $m!(quantity);
        $m!(unit);
        $m!(price);
        $m!(origin);
        $m!(reference_id);
        $m!(notes, opt);
        $m!(importer_id, opt);
        $m!(status);
        $m!(quality_criterion, opt);
        $m!(inspection_comments, opt);
        $m!(inspected_at, opt);
        $m!(inspector_id, opt);
        $m!(supporting_documents, opt);
        $m!(reported, opt);
    };
}

impl ShipmentPatch {
    pub fn is_empty(&self) -> bool {
        *self == ShipmentPatch::default()
    }

    pub fn status(status: ShipmentStatus) -> Self {
        Self { status: Some(status), ..Default::default() }
    }

    /// Campos comerciais: editáveis pelo exportador dono.
    pub fn touches_commercial_fields(&self) -> bool {
        self.product_name.is_some()
            || self.quantity.is_some()
            || self.unit.is_some()
            || self.price.is_some()
            || self.origin.is_some()
            || self.reference_id.is_some()
            || self.notes.is_some()
            || self.importer_id.is_some()
    }

    /// Campos de inspeção: exclusivos do QA.
    pub fn touches_inspection_fields(&self) -> bool {
        self.status.is_some()
            || self.quality_criterion.is_some()
            || self.inspection_comments.is_some()
            || self.inspected_at.is_some()
            || self.inspector_id.is_some()
    }

    /// Mantém apenas os campos cujo valor difere do registro atual.
    pub fn changed_fields(&self, current: &Shipment) -> ShipmentPatch {
        let patch = self;
        let mut changed = ShipmentPatch::default();
        macro_rules! keep_if_changed {
            ($f:ident) => {
                if let Some(v) = &patch.$f {
                    if *v != current.$f {
                        changed.$f = Some(v.clone());
                    }
                }
            };
            ($f:ident, opt) => {
                if let Some(v) = &patch.$f {
                    if current.$f.as_ref() != Some(v) {
                        changed.$f = Some(v.clone());
                    }
                }
            };
        }
        for_each_patch_field!(keep_if_changed);
        changed
    }

    /// Merge sem checagem de transição (uso otimista e espelho da fila offline).
    pub fn apply_to(&self, target: &mut Shipment) {
        let patch = self;
        macro_rules! assign {
            ($f:ident) => {
                if let Some(v) = &patch.$f {
                    target.$f = v.clone();
                }
            };
            ($f:ident, opt) => {
                if let Some(v) = &patch.$f {
                    target.$f = Some(v.clone());
                }
            };
        }
        for_each_patch_field!(assign);
    }

    /// Regras de campo por papel: exportador edita os campos comerciais,
    /// QA os de inspeção, importador só lê. O erro traz o motivo da recusa.
    pub fn check_role(&self, role: UserRole) -> Result<(), &'static str> {
        match role {
            UserRole::Importer => Err("importadores têm acesso somente leitura"),
            UserRole::Exporter if self.touches_inspection_fields() => Err("campos de inspeção são exclusivos do QA"),
            UserRole::Qa if self.touches_commercial_fields() => Err("campos comerciais são do exportador"),
            _ => Ok(()),
        }
    }

    /// Status pedido que um update não pode aplicar partindo de `from`.
    /// `Certificate Issued` só é alcançado pela emissão do certificado.
    pub fn refused_status(&self, from: ShipmentStatus) -> Option<ShipmentStatus> {
        let next = self.status?;
        let skips_issuance = next == ShipmentStatus::CertificateIssued && from != next;
        (skips_issuance || !from.can_transition_to(next)).then_some(next)
    }

    /// Merge autoritativo do lado do servidor: respeita a máquina de estados.
    pub fn apply_checked(&self, target: &mut Shipment) -> Result<(), AppError> {
        if let Some(next) = self.refused_status(target.status) {
            return Err(AppError::InvalidTransition { from: target.status, to: next });
        }
        self.apply_to(target);
        Ok(())
    }
}

// ---
// Payload: inspeção do QA
// ---
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InspectionInput {
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "12.5")]
    pub criterion_value: String,

    pub result: InspectionResult,

    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "Grãos uniformes, umidade dentro do limite.")]
    pub comments: String,

    #[serde(default)]
    pub supporting_documents: Option<Vec<String>>,
}

impl InspectionInput {
    pub fn into_patch(self, shipment: &Shipment, inspector_id: Uuid, at: DateTime<Utc>) -> ShipmentPatch {
        ShipmentPatch {
            status: Some(self.result.status()),
            quality_criterion: Some(QualityCriterion {
                name: shipment.criterion_name().to_string(),
                value: Some(self.criterion_value),
            }),
            inspection_comments: Some(self.comments),
            inspected_at: Some(at),
            inspector_id: Some(inspector_id),
            supporting_documents: self.supporting_documents,
            ..Default::default()
        }
    }
}

// ---
// Escopo de visibilidade (listagem e assinatura de mudanças)
// ---
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShipmentScope {
    All,
    Exporter(Uuid),
    Importer(Uuid),
}

impl ShipmentScope {
    pub fn for_user(user_id: Uuid, role: UserRole) -> Self {
        match role {
            UserRole::Qa => ShipmentScope::All,
            UserRole::Exporter => ShipmentScope::Exporter(user_id),
            UserRole::Importer => ShipmentScope::Importer(user_id),
        }
    }

    pub fn matches(&self, exporter_id: Uuid, importer_id: Option<Uuid>) -> bool {
        match self {
            ShipmentScope::All => true,
            ShipmentScope::Exporter(id) => exporter_id == *id,
            ShipmentScope::Importer(id) => importer_id == Some(*id),
        }
    }

    pub fn exporter_filter(&self) -> Option<Uuid> {
        match self {
            ShipmentScope::Exporter(id) => Some(*id),
            _ => None,
        }
    }

    pub fn importer_filter(&self) -> Option<Uuid> {
        match self {
            ShipmentScope::Importer(id) => Some(*id),
            _ => None,
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_shipment(exporter_id: Uuid) -> Shipment {
    let input = NewShipment {
        product_name: "Beans".into(),
        quantity: Decimal::from(100),
        unit: "kg".into(),
        price: Decimal::ZERO,
        origin: "Region A".into(),
        reference_id: "PO-1".into(),
        notes: None,
        quality_criterion: Some(QualityCriterion { name: "Moisture Content".into(), value: None }),
        importer_id: None,
        client_ref: None,
    };
    let mut s = Shipment::local_draft(exporter_id, &input);
    s.client_ref = None;
    s.revision = 1;
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use ShipmentStatus::*;

    #[test]
    fn status_machine_only_moves_forward() {
        assert!(PendingInspection.can_transition_to(InspectedPass));
        assert!(PendingInspection.can_transition_to(InspectedFail));
        assert!(InspectedPass.can_transition_to(CertificateIssued));

        assert!(!CertificateIssued.can_transition_to(PendingInspection));
        assert!(!InspectedFail.can_transition_to(CertificateIssued));
        assert!(!PendingInspection.can_transition_to(CertificateIssued));
        assert!(!InspectedPass.can_transition_to(InspectedFail));
    }

    #[test]
    fn status_uses_original_wire_strings() {
        let json = serde_json::to_string(&InspectedPass).unwrap();
        assert_eq!(json, "\"Inspected - Pass\"");
        let back: ShipmentStatus = serde_json::from_str("\"Certificate Issued\"").unwrap();
        assert_eq!(back, CertificateIssued);
        assert_eq!("Pending Inspection".parse::<ShipmentStatus>().unwrap(), PendingInspection);
        assert!("Shipped".parse::<ShipmentStatus>().is_err());
    }

    #[test]
    fn criterion_value_accepts_number_or_text() {
        let c: QualityCriterion = serde_json::from_str(r#"{"name":"Moisture","value":12.5}"#).unwrap();
        assert_eq!(c.value.as_deref(), Some("12.5"));
        let c: QualityCriterion = serde_json::from_str(r#"{"name":"Purity","value":"Pass"}"#).unwrap();
        assert_eq!(c.value.as_deref(), Some("Pass"));
        let c: QualityCriterion = serde_json::from_str(r#"{"name":"Purity"}"#).unwrap();
        assert_eq!(c.value, None);
    }

    #[test]
    fn new_shipment_rejects_negative_quantity_and_missing_fields() {
        let mut input: NewShipment = serde_json::from_str(
            r#"{"productName":"Beans","quantity":100,"origin":"Region A","referenceId":"PO-1"}"#,
        )
        .unwrap();
        assert_eq!(input.unit, "kg");
        assert!(input.validate().is_ok());

        input.quantity = Decimal::from(-1);
        input.origin.clear();
        let errors = input.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("quantity"));
        assert!(fields.contains_key("origin"));
    }

    #[test]
    fn changed_fields_drops_values_already_present() {
        let current = sample_shipment(Uuid::new_v4());
        let patch = ShipmentPatch {
            product_name: Some("Beans".into()),
            origin: Some("Region B".into()),
            notes: Some("fragile".into()),
            ..Default::default()
        };

        let changed = patch.changed_fields(&current);
        assert_eq!(changed.product_name, None);
        assert_eq!(changed.origin.as_deref(), Some("Region B"));
        assert_eq!(changed.notes.as_deref(), Some("fragile"));
    }

    #[test]
    fn applying_the_same_patch_twice_is_idempotent() {
        let mut once = sample_shipment(Uuid::new_v4());
        let patch = ShipmentPatch {
            status: Some(InspectedPass),
            inspection_comments: Some("ok".into()),
            ..Default::default()
        };
        patch.apply_checked(&mut once).unwrap();
        let mut twice = once.clone();
        patch.apply_checked(&mut twice).unwrap();
        assert_eq!(once, twice);
        assert!(patch.changed_fields(&twice).is_empty());
    }

    #[test]
    fn apply_checked_refuses_backward_transition() {
        let mut s = sample_shipment(Uuid::new_v4());
        s.status = CertificateIssued;
        let err = ShipmentPatch::status(PendingInspection).apply_checked(&mut s).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { from: CertificateIssued, to: PendingInspection }));
        assert_eq!(s.status, CertificateIssued);
    }

    #[test]
    fn apply_checked_never_issues_a_certificate() {
        let mut s = sample_shipment(Uuid::new_v4());
        s.status = InspectedPass;
        let err = ShipmentPatch::status(CertificateIssued).apply_checked(&mut s).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { from: InspectedPass, to: CertificateIssued }));
        assert_eq!(s.status, InspectedPass);

        // Repetir o status atual continua idempotente.
        s.status = CertificateIssued;
        assert_eq!(ShipmentPatch::status(CertificateIssued).refused_status(s.status), None);
    }

    #[test]
    fn field_rules_follow_the_role() {
        let inspection = ShipmentPatch::status(InspectedPass);
        let commercial = ShipmentPatch { notes: Some("x".into()), ..Default::default() };
        let documents = ShipmentPatch { supporting_documents: Some(vec!["a/b.pdf".into()]), ..Default::default() };

        assert!(inspection.check_role(UserRole::Exporter).is_err());
        assert!(commercial.check_role(UserRole::Exporter).is_ok());
        assert!(inspection.check_role(UserRole::Qa).is_ok());
        assert!(commercial.check_role(UserRole::Qa).is_err());
        assert!(documents.check_role(UserRole::Qa).is_ok());
        assert!(documents.check_role(UserRole::Importer).is_err());
    }

    #[test]
    fn inspection_patch_keeps_criterion_name() {
        let s = sample_shipment(Uuid::new_v4());
        let inspector = Uuid::new_v4();
        let input = InspectionInput {
            criterion_value: "12.5".into(),
            result: InspectionResult::Pass,
            comments: "ok".into(),
            supporting_documents: None,
        };
        let patch = input.into_patch(&s, inspector, Utc::now());
        assert_eq!(patch.status, Some(InspectedPass));
        assert_eq!(patch.inspector_id, Some(inspector));
        let criterion = patch.quality_criterion.unwrap();
        assert_eq!(criterion.name, "Moisture Content");
        assert_eq!(criterion.value.as_deref(), Some("12.5"));
    }

    #[test]
    fn scope_follows_role() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let exporter = ShipmentScope::for_user(me, UserRole::Exporter);
        assert!(exporter.matches(me, None));
        assert!(!exporter.matches(other, None));

        let importer = ShipmentScope::for_user(me, UserRole::Importer);
        assert!(importer.matches(other, Some(me)));
        assert!(!importer.matches(me, None));

        assert!(ShipmentScope::for_user(me, UserRole::Qa).matches(other, None));
    }
}
