// src/db/client_repo.rs

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::{map_unique_violation, AppError},
    models::client::Client,
};

#[derive(Clone, Default)]
pub struct ClientRepository;

impl ClientRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn create_client<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        name: &str,
        tax_id: &str,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Client, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Client>(
            r#"
            INSERT INTO clients (tenant_id, name, tax_id, email, phone)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(name)
        .bind(tax_id)
        .bind(email)
        .bind(phone)
        .fetch_one(executor)
        .await
        .map_err(|e| map_unique_violation(e, || format!("CPF/CNPJ {}", tax_id)))
    }

    /// Cria ou reativa o cliente pelo CPF/CNPJ.
    /// A constraint (tenant_id, tax_id) garante um único registro mesmo em retentativas.
    pub async fn upsert_by_tax_id<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        name: &str,
        tax_id: &str,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Client, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let client = sqlx::query_as::<_, Client>(
            r#"
            INSERT INTO clients (tenant_id, name, tax_id, email, phone)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT ON CONSTRAINT clients_tenant_tax_id_key
            DO UPDATE SET
                name = EXCLUDED.name,
                email = COALESCE(EXCLUDED.email, clients.email),
                phone = COALESCE(EXCLUDED.phone, clients.phone),
                active = TRUE,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(name)
        .bind(tax_id)
        .bind(email)
        .bind(phone)
        .fetch_one(executor)
        .await?;

        Ok(client)
    }

    pub async fn find_by_id<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        client_id: Uuid,
    ) -> Result<Option<Client>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let client = sqlx::query_as::<_, Client>(
            "SELECT * FROM clients WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(client_id)
        .fetch_optional(executor)
        .await?;

        Ok(client)
    }

    /// Busca por nome, documento ou e-mail (ou todos, sem termo)
    pub async fn list_clients<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        query: Option<&str>,
        include_inactive: bool,
    ) -> Result<Vec<Client>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let search_term = query.map(|q| format!("%{}%", q.trim()));

        let clients = sqlx::query_as::<_, Client>(
            r#"
            SELECT * FROM clients
            WHERE tenant_id = $1
              AND ($2::text IS NULL OR name ILIKE $2 OR tax_id ILIKE $2 OR email ILIKE $2)
              AND ($3 OR active)
            ORDER BY name ASC
            LIMIT 200
            "#,
        )
        .bind(tenant_id)
        .bind(search_term)
        .bind(include_inactive)
        .fetch_all(executor)
        .await?;

        Ok(clients)
    }

    pub async fn update_client<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        client_id: Uuid,
        name: Option<&str>,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Option<Client>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let client = sqlx::query_as::<_, Client>(
            r#"
            UPDATE clients
            SET name = COALESCE($3, name),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(client_id)
        .bind(name)
        .bind(email)
        .bind(phone)
        .fetch_optional(executor)
        .await?;

        Ok(client)
    }

    /// Exclusão lógica: o cliente some das buscas mas mantém o histórico
    pub async fn deactivate_client<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        client_id: Uuid,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            "UPDATE clients SET active = FALSE, updated_at = NOW() WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(client_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
