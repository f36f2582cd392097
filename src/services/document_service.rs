// src/services/document_service.rs

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use genpdf::{elements, style, Element};
use image::Luma;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use qrcode::QrCode;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::Config,
    models::{certificate::Certificate, shipment::Shipment},
};

const DOCUMENTS_BUCKET: &str = "documents";
const SIGNED_URL_AUDIENCE: &str = "certify:documents";

// Claims do token embutido na URL assinada
#[derive(Debug, Serialize, Deserialize)]
struct DocumentClaims {
    path: String,
    aud: String,
    exp: usize,
}

/// Resultado de um lote de URLs assinadas: cada caminho falha sozinho.
#[derive(Debug, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignedUrlBatch {
    pub urls: BTreeMap<String, String>,
    pub errors: BTreeMap<String, String>,
}

#[derive(Clone)]
pub struct DocumentService {
    storage_dir: PathBuf,
    fonts_dir: PathBuf,
    public_base_url: String,
    signing_secret: String,
    signed_url_ttl_secs: u64,
}

impl DocumentService {
    pub fn new(config: &Config) -> Self {
        Self {
            storage_dir: config.storage_dir.join(DOCUMENTS_BUCKET),
            fonts_dir: config.fonts_dir.clone(),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
            signing_secret: config.jwt_secret.clone(),
            signed_url_ttl_secs: config.signed_url_ttl_secs,
        }
    }

    /// URL pública de verificação (a mesma que vai no QR code).
    pub fn verification_url(&self, shipment_id: Uuid) -> String {
        format!("{}/verify/{}", self.public_base_url, shipment_id)
    }

    // ---
    // PDF do certificado
    // ---

    pub fn generate_certificate_pdf(&self, shipment: &Shipment, certificate: &Certificate) -> Result<Vec<u8>, AppError> {
        // Carrega a fonte da pasta configurada
        let font_family = genpdf::fonts::from_files(&self.fonts_dir, "Roboto", None).map_err(|_| {
            AppError::FontNotFound(format!("Fonte Roboto não encontrada em {}", self.fonts_dir.display()))
        })?;

        let mut doc = genpdf::Document::new(font_family);
        doc.set_title(format!("Certificate {}", certificate.id));
        let mut decorator = genpdf::SimplePageDecorator::new();
        decorator.set_margins(10);
        doc.set_page_decorator(decorator);

        // --- CABEÇALHO ---
        doc.push(elements::Paragraph::new("QUALITY CERTIFICATE").styled(style::Style::new().bold().with_font_size(18)));
        doc.push(elements::Paragraph::new(format!("Certificate ID: {}", certificate.id)).styled(style::Style::new().with_font_size(10)));
        doc.push(elements::Paragraph::new(format!("Issued by {} on {}", certificate.issuer, certificate.issued_at.format("%Y-%m-%d"))));
        doc.push(elements::Break::new(1.5));

        // --- DADOS DO EMBARQUE ---
        let mut table = elements::TableLayout::new(vec![2, 3]);
        table.set_cell_decorator(elements::FrameCellDecorator::new(true, true, false));
        let label = style::Style::new().bold();
        let rows = [
            ("Product", shipment.product_name.clone()),
            ("Quantity", format!("{} {}", shipment.quantity, shipment.unit)),
            ("Origin", shipment.origin.clone()),
            ("Reference", shipment.reference_id.clone()),
            ("Result", certificate.result.clone()),
            (
                "Quality metric",
                format!(
                    "{}: {}",
                    certificate.criterion_name,
                    certificate.criterion_value.as_deref().unwrap_or("-")
                ),
            ),
        ];
        for (name, value) in rows {
            table
                .row()
                .element(elements::Paragraph::new(name).styled(label))
                .element(elements::Paragraph::new(value))
                .push()
                .map_err(|e| AppError::InternalServerError(anyhow::Error::msg(e.to_string())))?;
        }
        doc.push(table);

        if let Some(comments) = &shipment.inspection_comments {
            doc.push(elements::Break::new(1));
            doc.push(elements::Paragraph::new(format!("Inspector notes: {}", comments)).styled(style::Style::new().italic()));
        }
        doc.push(elements::Break::new(2));

        // --- QR CODE DE VERIFICAÇÃO ---
        let url = self.verification_url(shipment.id);
        doc.push(elements::Paragraph::new("Scan to verify").styled(style::Style::new().bold().with_font_size(12)));
        doc.push(
            elements::Image::from_dynamic_image(verification_qr(&url)?)
                .map_err(|e| AppError::InternalServerError(anyhow::Error::msg(e.to_string())))?
                .with_scale(genpdf::Scale::new(0.5, 0.5)),
        );
        doc.push(elements::Paragraph::new(url).styled(style::Style::new().with_font_size(8)));

        doc.push(elements::Break::new(1));
        doc.push(
            elements::Paragraph::new(format!("Signature: {}", certificate.digital_signature))
                .styled(style::Style::new().italic().with_font_size(8)),
        );

        // Renderiza para Buffer (Memória)
        let mut buffer = Vec::new();
        doc.render(&mut buffer)
            .map_err(|e| AppError::InternalServerError(anyhow::Error::msg(e.to_string())))?;

        Ok(buffer)
    }

    // ---
    // Documentos de suporte
    // ---

    /// Grava o arquivo em `<storage>/documents/<shipment_id>/<file_name>` e devolve o caminho relativo.
    pub async fn store_document(&self, shipment_id: Uuid, file_name: &str, bytes: &[u8]) -> Result<String, AppError> {
        let relative = format!("{}/{}", shipment_id, file_name);
        let full = self.storage_dir.join(sanitize_path(&relative)?);

        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, bytes).await?;
        tracing::info!("📎 Documento {} gravado ({} bytes)", relative, bytes.len());
        Ok(relative)
    }

    /// Assina um lote de caminhos; um caminho inválido ou inexistente não derruba os outros.
    pub async fn sign_batch(&self, paths: &[String]) -> SignedUrlBatch {
        let mut batch = SignedUrlBatch::default();
        for path in paths {
            match self.signed_url(path).await {
                Ok(url) => {
                    batch.urls.insert(path.clone(), url);
                }
                Err(e) => {
                    tracing::warn!("⚠️ Não foi possível assinar {}: {}", path, e);
                    batch.errors.insert(path.clone(), e.to_string());
                }
            }
        }
        batch
    }

    pub async fn signed_url(&self, path: &str) -> Result<String, AppError> {
        let relative = sanitize_path(path)?;
        if !tokio::fs::try_exists(self.storage_dir.join(&relative)).await? {
            return Err(AppError::InvalidDocumentPath(path.to_string()));
        }

        let claims = DocumentClaims {
            path: path.to_string(),
            aud: SIGNED_URL_AUDIENCE.to_string(),
            exp: (Utc::now().timestamp() as u64 + self.signed_url_ttl_secs) as usize,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(self.signing_secret.as_ref()))?;
        Ok(format!("{}/storage/{}?token={}", self.public_base_url, DOCUMENTS_BUCKET, token))
    }

    /// Valida o token de uma URL assinada e devolve (caminho, conteúdo).
    pub async fn resolve_signed(&self, token: &str) -> Result<(String, Vec<u8>), AppError> {
        let mut validation = Validation::default();
        validation.set_audience(&[SIGNED_URL_AUDIENCE]);
        let claims = decode::<DocumentClaims>(token, &DecodingKey::from_secret(self.signing_secret.as_ref()), &validation)
            .map_err(|_| AppError::InvalidToken)?
            .claims;

        let relative = sanitize_path(&claims.path)?;
        match tokio::fs::read(self.storage_dir.join(relative)).await {
            Ok(bytes) => Ok((claims.path, bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AppError::InvalidDocumentPath(claims.path)),
            Err(e) => Err(e.into()),
        }
    }
}

/// Embarque dono de um caminho `<shipment_id>/<arquivo>`.
pub fn shipment_of(path: &str) -> Option<Uuid> {
    path.split('/').next().and_then(|head| Uuid::parse_str(head).ok())
}

/// Só caminhos relativos, sem `..`, sem componentes vazios e sem barra invertida.
pub fn sanitize_path(path: &str) -> Result<PathBuf, AppError> {
    let invalid = || AppError::InvalidDocumentPath(path.to_string());
    let bad_segment = |s: &str| s.is_empty() || s == "." || s == "..";
    if path.is_empty() || path.contains('\\') || path.split('/').any(bad_segment) {
        return Err(invalid());
    }

    let candidate = Path::new(path);
    if !candidate.components().all(|c| matches!(c, Component::Normal(_))) {
        return Err(invalid());
    }
    Ok(candidate.to_path_buf())
}

/// QR code renderizado em imagem para o genpdf.
pub fn verification_qr(url: &str) -> Result<image::DynamicImage, AppError> {
    let code = QrCode::new(url.as_bytes())
        .map_err(|e| AppError::InternalServerError(anyhow::Error::msg(e.to_string())))?;
    let image_buffer = code.render::<Luma<u8>>().build();
    Ok(image::DynamicImage::ImageLuma8(image_buffer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::shipment::sample_shipment;
    use tempfile::TempDir;

    fn config(dir: &Path) -> Config {
        Config {
            database_url: String::new(),
            jwt_secret: "segredo".into(),
            bind_addr: "127.0.0.1:0".into(),
            storage_dir: dir.join("storage"),
            public_base_url: "http://localhost:3000/".into(),
            fonts_dir: dir.join("fonts"),
            signed_url_ttl_secs: 3600,
        }
    }

    #[test]
    fn rejects_traversal_and_absolute_paths() {
        assert!(sanitize_path("abc/report.pdf").is_ok());
        for bad in ["", "../etc/passwd", "/etc/passwd", "a//b", "a/./b", "a\\b", "a/../../b"] {
            assert!(matches!(sanitize_path(bad), Err(AppError::InvalidDocumentPath(_))), "{bad}");
        }
    }

    #[test]
    fn path_owner_is_the_first_segment() {
        let id = Uuid::new_v4();
        assert_eq!(shipment_of(&format!("{}/lab.pdf", id)), Some(id));
        assert_eq!(shipment_of("misc/lab.pdf"), None);
    }

    #[test]
    fn verification_url_and_qr_point_to_the_shipment() {
        let dir = TempDir::new().unwrap();
        let svc = DocumentService::new(&config(dir.path()));
        let id = Uuid::new_v4();

        let url = svc.verification_url(id);
        assert_eq!(url, format!("http://localhost:3000/verify/{}", id));
        let qr = verification_qr(&url).unwrap();
        assert!(qr.to_luma8().width() > 0);
    }

    #[tokio::test]
    async fn signed_urls_round_trip_and_isolate_failures() {
        let dir = TempDir::new().unwrap();
        let svc = DocumentService::new(&config(dir.path()));
        let shipment_id = Uuid::new_v4();

        let stored = svc.store_document(shipment_id, "lab.pdf", b"%PDF-1.4").await.unwrap();
        let batch = svc
            .sign_batch(&[stored.clone(), format!("{}/missing.pdf", shipment_id), "../secret".into()])
            .await;

        assert_eq!(batch.urls.len(), 1);
        assert_eq!(batch.errors.len(), 2);

        let url = &batch.urls[&stored];
        assert!(url.starts_with("http://localhost:3000/storage/documents?token="));
        let token = url.split("token=").nth(1).unwrap();

        let (path, bytes) = svc.resolve_signed(token).await.unwrap();
        assert_eq!(path, stored);
        assert_eq!(bytes, b"%PDF-1.4");
    }

    #[tokio::test]
    async fn session_tokens_are_not_download_tokens() {
        let dir = TempDir::new().unwrap();
        let svc = DocumentService::new(&config(dir.path()));
        let session_token = crate::services::auth::create_token(Uuid::new_v4(), "segredo").unwrap();
        assert!(matches!(svc.resolve_signed(&session_token).await, Err(AppError::InvalidToken)));
    }

    #[test]
    fn missing_fonts_are_reported() {
        let dir = TempDir::new().unwrap();
        let svc = DocumentService::new(&config(dir.path()));
        let shipment = sample_shipment(Uuid::new_v4());
        let certificate = Certificate::draft_for(&shipment, "Agro QA Labs");

        assert!(matches!(
            svc.generate_certificate_pdf(&shipment, &certificate),
            Err(AppError::FontNotFound(_))
        ));
    }
}
