// src/models/certificate.rs

use chrono::{DateTime, Utc};
use rand::{distr::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::shipment::{InspectionResult, Shipment, ShipmentStatus};

/// Certificado emitido para um embarque aprovado.
///
/// A assinatura é uma string aleatória: não existe vínculo criptográfico com o conteúdo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    #[schema(example = "CERT-1A2B3C4D")]
    pub id: String,
    pub shipment_id: Uuid,
    #[schema(example = "Pass")]
    pub result: String,
    #[schema(example = "Moisture Content")]
    pub criterion_name: String,
    #[schema(example = "12.5")]
    pub criterion_value: Option<String>,
    pub issued_at: DateTime<Utc>,
    #[schema(example = "Agro QA Labs")]
    pub issuer: String,
    #[schema(example = "SHA256:k3j9x0a1b2c3d4e5f6g7h8i9j0")]
    pub digital_signature: String,
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
}

impl Certificate {
    /// Monta o rascunho que será persistido junto com a troca de status.
    pub fn draft_for(shipment: &Shipment, issuer: &str) -> Self {
        let issued_at = Utc::now();
        let id = format!(
            "CERT-{}",
            &Uuid::new_v4().simple().to_string()[..8].to_uppercase()
        );
        let signature: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(26)
            .map(char::from)
            .collect::<String>()
            .to_lowercase();

        let issuer_did = format!(
            "did:example:{}",
            issuer.to_lowercase().split_whitespace().collect::<Vec<_>>().join("-")
        );
        let criterion_name = shipment.criterion_name().to_string();
        let criterion_value = shipment.criterion_value().map(str::to_string);

        let payload = json!({
            "@context": [
                "https://www.w3.org/2018/credentials/v1",
                "https://certify.example/context/v1"
            ],
            "type": ["VerifiableCredential", "QualityCertificate"],
            "issuer": issuer_did,
            "issuanceDate": issued_at.to_rfc3339(),
            "credentialSubject": {
                "id": format!("did:example:shipment-{}", shipment.id),
                "shipmentId": shipment.id,
                "productName": shipment.product_name,
                "inspectionResult": InspectionResult::Pass.as_str(),
                "qualityMetric": {
                    "name": criterion_name,
                    "value": criterion_value,
                }
            }
        });

        Self {
            id,
            shipment_id: shipment.id,
            result: InspectionResult::Pass.as_str().to_string(),
            criterion_name,
            criterion_value,
            issued_at,
            issuer: issuer.to_string(),
            digital_signature: format!("SHA256:{}", signature),
            payload,
        }
    }
}

/// Projeção pública usada na verificação. Sintetizada a partir do embarque;
/// os campos do registro de certificado entram quando ele existe.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CertificateView {
    pub certificate_id: Option<String>,
    pub shipment_id: Uuid,
    pub product_name: String,
    pub quantity: rust_decimal::Decimal,
    pub unit: String,
    pub origin: String,
    pub reference_id: String,
    #[schema(example = "Pass")]
    pub result: String,
    pub criterion_name: String,
    pub criterion_value: Option<String>,
    pub inspection_comments: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub issuer: Option<String>,
    pub digital_signature: Option<String>,
}

impl CertificateView {
    /// `None` quando o embarque ainda não tem certificado emitido
    /// ou quando o registro não pertence a ele.
    pub fn project(shipment: &Shipment, certificate: &Certificate) -> Option<Self> {
        if shipment.status != ShipmentStatus::CertificateIssued || certificate.shipment_id != shipment.id {
            return None;
        }

        Some(Self {
            certificate_id: Some(certificate.id.clone()),
            shipment_id: shipment.id,
            product_name: shipment.product_name.clone(),
            quantity: shipment.quantity,
            unit: shipment.unit.clone(),
            origin: shipment.origin.clone(),
            reference_id: shipment.reference_id.clone(),
            result: shipment.status.result_label().to_string(),
            criterion_name: certificate.criterion_name.clone(),
            criterion_value: certificate
                .criterion_value
                .clone()
                .or_else(|| shipment.criterion_value().map(str::to_string)),
            inspection_comments: shipment.inspection_comments.clone(),
            issued_at: certificate.issued_at,
            issuer: Some(certificate.issuer.clone()),
            digital_signature: Some(certificate.digital_signature.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::shipment::{sample_shipment, QualityCriterion};

    #[test]
    fn draft_carries_shipment_criterion_and_mock_signature() {
        let mut shipment = sample_shipment(Uuid::new_v4());
        shipment.status = ShipmentStatus::InspectedPass;
        shipment.quality_criterion = Some(QualityCriterion {
            name: "Moisture Content".into(),
            value: Some("12.5".into()),
        });

        let cert = Certificate::draft_for(&shipment, "Agro QA Labs");
        assert!(cert.id.starts_with("CERT-"));
        assert_eq!(cert.id.len(), "CERT-".len() + 8);
        assert!(cert.digital_signature.starts_with("SHA256:"));
        assert_eq!(cert.result, "Pass");
        assert_eq!(cert.criterion_value.as_deref(), Some("12.5"));
        assert_eq!(cert.payload["issuer"], "did:example:agro-qa-labs");
        assert_eq!(cert.payload["credentialSubject"]["productName"], "Beans");
    }

    #[test]
    fn view_only_exists_for_issued_shipments_with_their_record() {
        let mut shipment = sample_shipment(Uuid::new_v4());
        shipment.status = ShipmentStatus::InspectedPass;
        let cert = Certificate::draft_for(&shipment, "Agro QA Labs");

        shipment.status = ShipmentStatus::InspectedFail;
        assert!(CertificateView::project(&shipment, &cert).is_none());

        shipment.status = ShipmentStatus::CertificateIssued;
        let view = CertificateView::project(&shipment, &cert).unwrap();
        assert_eq!(view.result, "Pass");
        assert_eq!(view.certificate_id.as_deref(), Some(cert.id.as_str()));
        assert_eq!(view.criterion_name, "Moisture Content");

        let other = sample_shipment(Uuid::new_v4());
        let foreign = Certificate { shipment_id: other.id, ..cert };
        assert!(CertificateView::project(&shipment, &foreign).is_none());
    }
}
