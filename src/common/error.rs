use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::{common::i18n::I18nStore, middleware::i18n::Locale, models::shipment::ShipmentStatus};

// Nosso tipo de erro, agora com `thiserror` para melhor ergonomia.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("E-mail já existe")]
    EmailAlreadyExists,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Usuário não encontrado")]
    UserNotFound,

    #[error("Acesso negado: {0}")]
    Forbidden(String),

    #[error("Embarque não encontrado: {0}")]
    ShipmentNotFound(Uuid),

    #[error("Certificado não encontrado ou não emitido: {0}")]
    CertificateNotFound(String),

    #[error("Transição de status inválida: {from} -> {to}")]
    InvalidTransition { from: ShipmentStatus, to: ShipmentStatus },

    #[error("client_ref já usado por outro registro: {0}")]
    ClientRefConflict(Uuid),

    #[error("Status desconhecido: {0}")]
    UnknownStatus(String),

    #[error("Caminho de documento inválido: {0}")]
    InvalidDocumentPath(String),

    #[error("Fonte não encontrada: {0}")]
    FontNotFound(String),

    #[error("Store indisponível: {0}")]
    StoreUnavailable(String),

    // Variante para erros de banco de dados
    #[error("Erro de banco de dados: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro de I/O: {0}")]
    IoError(#[from] std::io::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    /// Status HTTP e chave de tradução de cada variante.
    pub fn status_and_key(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, "error.validation"),
            AppError::EmailAlreadyExists => (StatusCode::CONFLICT, "error.email_exists"),
            AppError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "error.invalid_credentials"),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "error.invalid_token"),
            AppError::UserNotFound => (StatusCode::NOT_FOUND, "error.user_not_found"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "error.forbidden"),
            AppError::ShipmentNotFound(_) => (StatusCode::NOT_FOUND, "error.shipment_not_found"),
            AppError::CertificateNotFound(_) => (StatusCode::NOT_FOUND, "error.certificate_not_found"),
            AppError::InvalidTransition { .. } => (StatusCode::CONFLICT, "error.invalid_transition"),
            AppError::ClientRefConflict(_) => (StatusCode::CONFLICT, "error.client_ref_conflict"),
            AppError::InvalidDocumentPath(_) => (StatusCode::BAD_REQUEST, "error.invalid_document_path"),
            AppError::StoreUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "error.unavailable"),
            // Todos os outros erros viram 500.
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "error.internal"),
        }
    }

    /// Converte para a resposta HTTP já traduzida para o idioma do cliente.
    pub fn to_api_error(&self, locale: &Locale, i18n: &I18nStore) -> ApiError {
        let (status, key) = self.status_and_key();
        let lang = locale.0.as_str();

        let details = match self {
            AppError::ValidationError(errors) => {
                let mut fields = serde_json::Map::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<Value> = field_errors
                        .iter()
                        .map(|e| {
                            let code = e.message.as_deref().unwrap_or(e.code.as_ref());
                            Value::String(i18n.translate(lang, &format!("validation.{}", code)))
                        })
                        .collect();
                    fields.insert(field.to_string(), Value::Array(messages));
                }
                Some(Value::Object(fields))
            }
            AppError::InvalidTransition { from, to } => Some(json!({ "from": from, "to": to })),
            AppError::ShipmentNotFound(id) => Some(json!({ "id": id })),
            AppError::ClientRefConflict(client_ref) => Some(json!({ "clientRef": client_ref })),
            AppError::CertificateNotFound(id) => Some(json!({ "id": id })),
            _ => None,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            // O `tracing` loga a mensagem detalhada; o cliente só vê a genérica.
            tracing::error!("Erro Interno do Servidor: {}", self);
        }

        ApiError {
            status,
            error: i18n.translate(lang, key),
            details,
        }
    }
}

/// Erro já pronto para virar resposta HTTP.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => json!({ "error": self.error, "details": details }),
            None => json!({ "error": self.error }),
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Form {
        #[validate(length(min = 1, message = "required"))]
        name: String,
    }

    #[test]
    fn validation_errors_are_localized_per_field() {
        let i18n = I18nStore::builtin();
        let err = AppError::from(Form { name: String::new() }.validate().unwrap_err());

        let api = err.to_api_error(&Locale("pt".into()), &i18n);
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.error, "Um ou mais campos são inválidos.");
        assert_eq!(api.details.unwrap()["name"][0], "Campo obrigatório.");
    }

    #[test]
    fn transition_errors_are_conflicts_with_context() {
        let i18n = I18nStore::builtin();
        let err = AppError::InvalidTransition {
            from: ShipmentStatus::CertificateIssued,
            to: ShipmentStatus::PendingInspection,
        };
        let api = err.to_api_error(&Locale("en".into()), &i18n);
        assert_eq!(api.status, StatusCode::CONFLICT);
        let details = api.details.unwrap();
        assert_eq!(details["from"], "Certificate Issued");
        assert_eq!(details["to"], "Pending Inspection");
    }

    #[test]
    fn foreign_client_ref_is_a_conflict() {
        let i18n = I18nStore::builtin();
        let client_ref = Uuid::new_v4();
        let api = AppError::ClientRefConflict(client_ref).to_api_error(&Locale("pt".into()), &i18n);
        assert_eq!(api.status, StatusCode::CONFLICT);
        assert_eq!(api.error, "Esta referência de cliente já é usada por outro registro.");
        assert_eq!(api.details.unwrap()["clientRef"], client_ref.to_string());
    }

    #[test]
    fn internal_errors_hide_details() {
        let i18n = I18nStore::builtin();
        let err = AppError::InternalServerError(anyhow::anyhow!("pool exhausted"));
        let api = err.to_api_error(&Locale("en".into()), &i18n);
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!api.error.contains("pool"));
    }
}
