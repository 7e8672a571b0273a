use sqlx::{pool::PoolConnection, Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::common::error::AppError;

// ---
// Helper RLS: A "Chave" para o Banco de Dados
// ---
/// Adquire uma conexão da pool e define as variáveis RLS da sessão.
/// As políticas de `tenant_isolation` só enxergam linhas de `app.tenant_id`.
pub(crate) async fn get_rls_connection(
    pool: &PgPool,
    tenant_id: Uuid,
    user_id: Uuid,
) -> Result<PoolConnection<Postgres>, AppError> {
    // O operador '?' converte automaticamente sqlx::Error -> AppError::DatabaseError
    let mut conn = pool.acquire().await?;

    // is_local = false: vale para a sessão inteira, não só para a próxima instrução.
    // Toda aquisição sobrescreve, então uma conexão devolvida à pool não vaza o tenant.
    sqlx::query("SELECT set_config('app.tenant_id', $1, false), set_config('app.user_id', $2, false)")
        .bind(tenant_id.to_string())
        .bind(user_id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(conn)
}

/// Define o tenant apenas dentro da transação corrente (ex.: criação da corretora).
pub(crate) async fn set_transaction_tenant<'e, E>(executor: E, tenant_id: Uuid) -> Result<(), AppError>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query("SELECT set_config('app.tenant_id', $1, true)")
        .bind(tenant_id.to_string())
        .execute(executor)
        .await?;

    Ok(())
}
