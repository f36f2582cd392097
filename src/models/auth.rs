// src/models/auth.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, thiserror::Error)]
#[error("papel de usuário desconhecido: {0}")]
pub struct UnknownRole(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Exporter,
    Qa,
    Importer,
}

impl UserRole {
    pub const fn as_str(&self) -> &'static str {
        match self {
            UserRole::Exporter => "exporter",
            UserRole::Qa => "qa",
            UserRole::Importer => "importer",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exporter" => Ok(UserRole::Exporter),
            "qa" => Ok(UserRole::Qa),
            "importer" => Ok(UserRole::Importer),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl TryFrom<String> for UserRole {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// Representa um usuário vindo do banco de dados
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub role: UserRole,
    pub organization: String,

    #[serde(skip_serializing)] // IMPORTANTE para segurança
    #[schema(ignore)]
    pub password_hash: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn profile(&self) -> Profile {
        Profile {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            organization: self.organization.clone(),
        }
    }

    pub fn principal(&self) -> Principal {
        Principal::User { id: self.id, role: self.role }
    }
}

/// Identidade pública de um usuário (o que a sessão de sincronização conhece).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub organization: String,
}

impl Profile {
    pub fn principal(&self) -> Principal {
        Principal::User { id: self.id, role: self.role }
    }
}

/// Quem está acessando o store. Vira as variáveis de RLS `app.user_id` / `app.role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    User { id: Uuid, role: UserRole },
    /// Acesso interno (verificação pública, edge function, listener de mudanças).
    Service,
}

impl Principal {
    pub fn rls_user_id(&self) -> String {
        match self {
            Principal::User { id, .. } => id.to_string(),
            Principal::Service => String::new(),
        }
    }

    pub fn rls_role(&self) -> &'static str {
        match self {
            Principal::User { role, .. } => role.as_str(),
            Principal::Service => "service",
        }
    }

    /// Mesma regra da política `shipments_visibility`.
    pub fn can_see(&self, exporter_id: Uuid, importer_id: Option<Uuid>) -> bool {
        match self {
            Principal::Service | Principal::User { role: UserRole::Qa, .. } => true,
            Principal::User { id, .. } => exporter_id == *id || importer_id == Some(*id),
        }
    }
}

// Dados para registro de um novo usuário
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserPayload {
    #[validate(email(message = "invalid_email"))]
    #[schema(example = "exporter@agro.example")]
    pub email: String,
    #[validate(length(min = 6, message = "password_too_short"))]
    pub password: String,
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "Ana Souza")]
    pub name: String,
    pub role: UserRole,
    #[serde(default)]
    #[schema(example = "Agro Export Ltda")]
    pub organization: String,
}

// Dados para login
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginUserPayload {
    #[validate(email(message = "invalid_email"))]
    pub email: String,
    #[validate(length(min = 6, message = "password_too_short"))]
    pub password: String,
}

// Resposta de autenticação com o token
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: Profile,
}

// Estrutura de dados ("claims") dentro do JWT
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,  // Subject (ID do usuário)
    pub exp: usize, // Expiration time (quando o token expira)
    pub iat: usize, // Issued At (quando o token foi criado)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_database_text() {
        assert_eq!(UserRole::try_from("qa".to_string()).unwrap(), UserRole::Qa);
        assert_eq!(UserRole::Importer.as_str(), "importer");
        assert!(UserRole::try_from("admin".to_string()).is_err());
    }

    #[test]
    fn principal_visibility_matches_rls_policy() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();

        let exporter = Principal::User { id: me, role: UserRole::Exporter };
        assert!(exporter.can_see(me, None));
        assert!(!exporter.can_see(other, None));

        let importer = Principal::User { id: me, role: UserRole::Importer };
        assert!(importer.can_see(other, Some(me)));

        let qa = Principal::User { id: me, role: UserRole::Qa };
        assert!(qa.can_see(other, None));
        assert_eq!(qa.rls_role(), "qa");

        assert!(Principal::Service.can_see(other, None));
        assert_eq!(Principal::Service.rls_user_id(), "");
    }
}
