// src/db/pipeline_repo.rs

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::{map_unique_violation, AppError},
    models::pipeline::PipelinePhase,
};

#[derive(Clone, Default)]
pub struct PipelineRepository;

impl PipelineRepository {
    pub fn new() -> Self {
        Self
    }

    // =========================================================================
    //  LEITURA
    // =========================================================================

    pub async fn list_phases<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
    ) -> Result<Vec<PipelinePhase>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let phases = sqlx::query_as::<_, PipelinePhase>(
            "SELECT * FROM pipeline_phases WHERE tenant_id = $1 ORDER BY position ASC",
        )
        .bind(tenant_id)
        .fetch_all(executor)
        .await?;

        Ok(phases)
    }

    /// Mesma lista, mas travando as linhas até o fim da transação.
    /// Usado por toda escrita que renumera posições.
    pub async fn list_phases_for_update<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
    ) -> Result<Vec<PipelinePhase>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let phases = sqlx::query_as::<_, PipelinePhase>(
            "SELECT * FROM pipeline_phases WHERE tenant_id = $1 ORDER BY position ASC FOR UPDATE",
        )
        .bind(tenant_id)
        .fetch_all(executor)
        .await?;

        Ok(phases)
    }

    /// Trava a fase (compartilhado) até o fim da transação.
    /// Uma exclusão concorrente da mesma fase espera o commit de quem a usa.
    pub async fn lock_phase_by_key<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        key: &str,
    ) -> Result<Option<PipelinePhase>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let phase = sqlx::query_as::<_, PipelinePhase>(
            "SELECT * FROM pipeline_phases WHERE tenant_id = $1 AND key = $2 FOR SHARE",
        )
        .bind(tenant_id)
        .bind(key)
        .fetch_optional(executor)
        .await?;

        Ok(phase)
    }

    pub async fn count_quotes_in_phase<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        key: &str,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM quotes WHERE tenant_id = $1 AND pipeline_status = $2",
        )
        .bind(tenant_id)
        .bind(key)
        .fetch_one(executor)
        .await?;

        Ok(count)
    }

    // =========================================================================
    //  ESCRITA
    // =========================================================================

    pub async fn insert_phase<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        name: &str,
        key: &str,
        color: &str,
        position: i32,
        is_system: bool,
    ) -> Result<PipelinePhase, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, PipelinePhase>(
            r#"
            INSERT INTO pipeline_phases (tenant_id, name, key, color, position, is_system)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(name)
        .bind(key)
        .bind(color)
        .bind(position)
        .bind(is_system)
        .fetch_one(executor)
        .await
        .map_err(|e| map_unique_violation(e, || format!("fase '{}'", key)))
    }

    /// Insere uma fase padrão; se a chave já existe (semeadura concorrente), não faz nada.
    pub async fn insert_default_phase<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        name: &str,
        key: &str,
        color: &str,
        position: i32,
        is_system: bool,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO pipeline_phases (tenant_id, name, key, color, position, is_system)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT ON CONSTRAINT pipeline_phases_tenant_key_key DO NOTHING
            "#,
        )
        .bind(tenant_id)
        .bind(name)
        .bind(key)
        .bind(color)
        .bind(position)
        .bind(is_system)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Abre espaço para uma inserção na posição informada
    pub async fn shift_positions_from<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        from_position: i32,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE pipeline_phases
            SET position = position + 1, updated_at = NOW()
            WHERE tenant_id = $1 AND position >= $2
            "#,
        )
        .bind(tenant_id)
        .bind(from_position)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn set_position<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        phase_id: Uuid,
        position: i32,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE pipeline_phases
            SET position = $3, updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2 AND position <> $3
            "#,
        )
        .bind(tenant_id)
        .bind(phase_id)
        .bind(position)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn update_phase<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        phase_id: Uuid,
        name: Option<&str>,
        color: Option<&str>,
    ) -> Result<Option<PipelinePhase>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let phase = sqlx::query_as::<_, PipelinePhase>(
            r#"
            UPDATE pipeline_phases
            SET name = COALESCE($3, name),
                color = COALESCE($4, color),
                updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(phase_id)
        .bind(name)
        .bind(color)
        .fetch_optional(executor)
        .await?;

        Ok(phase)
    }

    pub async fn delete_phase<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        phase_id: Uuid,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("DELETE FROM pipeline_phases WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(phase_id)
            .execute(executor)
            .await?;

        Ok(())
    }
}
