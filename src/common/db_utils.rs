// src/common/db_utils.rs

use sqlx::{PgPool, Postgres, Transaction};

use crate::{common::error::AppError, models::auth::Principal};

// ---
// Helper RLS: A "Chave" para o Banco de Dados
// ---
/// Abre uma transação e define as variáveis lidas pela política
/// `shipments_visibility`. Com `is_local = true` elas morrem no commit/rollback,
/// então a conexão volta limpa para a pool.
pub(crate) async fn begin_rls(
    pool: &PgPool,
    principal: &Principal,
) -> Result<Transaction<'static, Postgres>, AppError> {
    // O operador '?' converte automaticamente sqlx::Error -> AppError::DatabaseError
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT set_config('app.user_id', $1, true)")
        .bind(principal.rls_user_id())
        .execute(&mut *tx)
        .await?;

    sqlx::query("SELECT set_config('app.role', $1, true)")
        .bind(principal.rls_role())
        .execute(&mut *tx)
        .await?;

    Ok(tx)
}
