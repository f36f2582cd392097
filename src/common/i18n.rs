// src/common/i18n.rs

use std::collections::HashMap;

const DEFAULT_LANG: &str = "en";

// (chave, inglês, português)
const CATALOG: &[(&str, &str, &str)] = &[
    ("error.validation", "One or more fields are invalid.", "Um ou mais campos são inválidos."),
    ("error.email_exists", "This e-mail is already registered.", "Este e-mail já está cadastrado."),
    ("error.invalid_credentials", "Invalid e-mail or password.", "E-mail ou senha inválidos."),
    ("error.invalid_token", "Missing or invalid authentication token.", "Token de autenticação ausente ou inválido."),
    ("error.user_not_found", "User not found.", "Usuário não encontrado."),
    ("error.forbidden", "You are not allowed to perform this action.", "Você não tem permissão para realizar esta ação."),
    ("error.shipment_not_found", "Shipment not found.", "Embarque não encontrado."),
    ("error.certificate_not_found", "Certificate not found or not issued.", "Certificado não encontrado ou não emitido."),
    ("error.invalid_transition", "This status change is not allowed.", "Esta mudança de status não é permitida."),
    ("error.client_ref_conflict", "This client reference is already used by another record.", "Esta referência de cliente já é usada por outro registro."),
    ("error.invalid_document_path", "Invalid document path.", "Caminho de documento inválido."),
    ("error.unavailable", "The record store is unavailable. Try again later.", "O armazenamento está indisponível. Tente novamente mais tarde."),
    ("error.internal", "Internal server error.", "Erro interno do servidor."),
    ("validation.required", "This field is required.", "Campo obrigatório."),
    ("validation.invalid_email", "Invalid e-mail address.", "Endereço de e-mail inválido."),
    ("validation.password_too_short", "Password must be at least 6 characters.", "A senha deve ter pelo menos 6 caracteres."),
    ("validation.range", "Value must not be negative.", "O valor não pode ser negativo."),
];

/// Catálogo de mensagens por idioma. Idiomas desconhecidos caem no inglês;
/// chaves desconhecidas são devolvidas como estão.
#[derive(Debug, Clone, Default)]
pub struct I18nStore {
    messages: HashMap<String, HashMap<String, String>>,
}

impl I18nStore {
    pub fn builtin() -> Self {
        let mut store = Self::default();
        for (key, en, pt) in CATALOG {
            store.insert("en", key, en);
            store.insert("pt", key, pt);
        }
        store
    }

    pub fn insert(&mut self, lang: &str, key: &str, message: &str) {
        self.messages
            .entry(lang.to_string())
            .or_default()
            .insert(key.to_string(), message.to_string());
    }

    pub fn translate(&self, lang: &str, key: &str) -> String {
        self.lookup(lang, key)
            .or_else(|| self.lookup(DEFAULT_LANG, key))
            .unwrap_or(key)
            .to_string()
    }

    fn lookup(&self, lang: &str, key: &str) -> Option<&str> {
        self.messages.get(lang)?.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_english_then_to_the_key() {
        let i18n = I18nStore::builtin();
        assert_eq!(i18n.translate("pt", "error.shipment_not_found"), "Embarque não encontrado.");
        assert_eq!(i18n.translate("fr", "error.shipment_not_found"), "Shipment not found.");
        assert_eq!(i18n.translate("pt", "error.nope"), "error.nope");
    }

    #[test]
    fn every_key_exists_in_both_languages() {
        let i18n = I18nStore::builtin();
        for (key, _, _) in CATALOG {
            assert!(i18n.lookup("en", key).is_some());
            assert!(i18n.lookup("pt", key).is_some());
        }
    }
}
