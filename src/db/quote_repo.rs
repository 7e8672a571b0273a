// src/db/quote_repo.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::quote::{LossReason, Quote, QuoteTransition},
};

/// Campos de uma nova cotação, já validados pelo serviço
pub struct NewQuote<'a> {
    pub client_id: Option<Uuid>,
    pub ramo: &'a str,
    pub pipeline_status: &'a str,
    pub estimated_value: Option<Decimal>,
    pub next_contact_date: Option<NaiveDate>,
    pub notes: Option<&'a str>,
    pub contact_name: Option<&'a str>,
    pub contact_tax_id: Option<&'a str>,
    pub contact_email: Option<&'a str>,
    pub contact_phone: Option<&'a str>,
}

/// Um registro de transição a gravar no histórico
pub struct NewTransition<'a> {
    pub quote_id: Uuid,
    pub from_status: &'a str,
    pub to_status: &'a str,
    pub loss_reason: Option<LossReason>,
    pub notes: Option<&'a str>,
    pub client_id: Option<Uuid>,
    pub user_id: Uuid,
}

#[derive(Clone, Default)]
pub struct QuoteRepository;

impl QuoteRepository {
    pub fn new() -> Self {
        Self
    }

    // =========================================================================
    //  COTAÇÕES
    // =========================================================================

    pub async fn create_quote<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        quote: NewQuote<'_>,
    ) -> Result<Quote, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let created = sqlx::query_as::<_, Quote>(
            r#"
            INSERT INTO quotes (
                tenant_id, client_id, ramo, pipeline_status, estimated_value,
                next_contact_date, notes, contact_name, contact_tax_id,
                contact_email, contact_phone
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(quote.client_id)
        .bind(quote.ramo)
        .bind(quote.pipeline_status)
        .bind(quote.estimated_value)
        .bind(quote.next_contact_date)
        .bind(quote.notes)
        .bind(quote.contact_name)
        .bind(quote.contact_tax_id)
        .bind(quote.contact_email)
        .bind(quote.contact_phone)
        .fetch_one(executor)
        .await?;

        Ok(created)
    }

    pub async fn find_by_id<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        quote_id: Uuid,
    ) -> Result<Option<Quote>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let quote = sqlx::query_as::<_, Quote>("SELECT * FROM quotes WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(quote_id)
            .fetch_optional(executor)
            .await?;

        Ok(quote)
    }

    /// Trava a cotação até o fim da transação: duas transições simultâneas
    /// sobre o mesmo card são serializadas aqui.
    pub async fn find_for_update<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        quote_id: Uuid,
    ) -> Result<Option<Quote>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let quote = sqlx::query_as::<_, Quote>(
            "SELECT * FROM quotes WHERE tenant_id = $1 AND id = $2 FOR UPDATE",
        )
        .bind(tenant_id)
        .bind(quote_id)
        .fetch_optional(executor)
        .await?;

        Ok(quote)
    }

    pub async fn list_quotes<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        status: Option<&str>,
    ) -> Result<Vec<Quote>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let quotes = sqlx::query_as::<_, Quote>(
            r#"
            SELECT * FROM quotes
            WHERE tenant_id = $1 AND ($2::text IS NULL OR pipeline_status = $2)
            ORDER BY updated_at DESC
            "#,
        )
        .bind(tenant_id)
        .bind(status)
        .fetch_all(executor)
        .await?;

        Ok(quotes)
    }

    pub async fn list_by_client<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        client_id: Uuid,
    ) -> Result<Vec<Quote>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let quotes = sqlx::query_as::<_, Quote>(
            "SELECT * FROM quotes WHERE tenant_id = $1 AND client_id = $2 ORDER BY created_at DESC",
        )
        .bind(tenant_id)
        .bind(client_id)
        .fetch_all(executor)
        .await?;

        Ok(quotes)
    }

    /// Cotações fora das fases terminais com contato agendado até a data
    pub async fn list_due_follow_ups<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        until: NaiveDate,
        terminal_keys: &[&str],
    ) -> Result<Vec<Quote>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let quotes = sqlx::query_as::<_, Quote>(
            r#"
            SELECT * FROM quotes
            WHERE tenant_id = $1
              AND next_contact_date IS NOT NULL
              AND next_contact_date <= $2
              AND NOT (pipeline_status = ANY($3))
            ORDER BY next_contact_date ASC, updated_at DESC
            "#,
        )
        .bind(tenant_id)
        .bind(until)
        .bind(terminal_keys)
        .fetch_all(executor)
        .await?;

        Ok(quotes)
    }

    /// Grava o novo status. Campos de perda só ficam preenchidos em "lost".
    pub async fn update_status<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        quote_id: Uuid,
        new_status: &str,
        client_id: Option<Uuid>,
        loss_reason: Option<LossReason>,
        loss_notes: Option<&str>,
    ) -> Result<Quote, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let quote = sqlx::query_as::<_, Quote>(
            r#"
            UPDATE quotes
            SET pipeline_status = $3,
                client_id = COALESCE($4, client_id),
                loss_reason = $5,
                loss_notes = $6,
                version = version + 1,
                updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(quote_id)
        .bind(new_status)
        .bind(client_id)
        .bind(loss_reason)
        .bind(loss_notes)
        .fetch_one(executor)
        .await?;

        Ok(quote)
    }

    pub async fn schedule_follow_up<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        quote_id: Uuid,
        next_contact_date: NaiveDate,
        notes: Option<&str>,
    ) -> Result<Option<Quote>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let quote = sqlx::query_as::<_, Quote>(
            r#"
            UPDATE quotes
            SET next_contact_date = $3,
                notes = COALESCE($4, notes),
                version = version + 1,
                updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(quote_id)
        .bind(next_contact_date)
        .bind(notes)
        .fetch_optional(executor)
        .await?;

        Ok(quote)
    }

    // =========================================================================
    //  HISTÓRICO DE TRANSIÇÕES
    // =========================================================================

    pub async fn insert_transition<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        transition: NewTransition<'_>,
    ) -> Result<QuoteTransition, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let record = sqlx::query_as::<_, QuoteTransition>(
            r#"
            INSERT INTO quote_transitions (
                tenant_id, quote_id, from_status, to_status,
                loss_reason, notes, client_id, user_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(transition.quote_id)
        .bind(transition.from_status)
        .bind(transition.to_status)
        .bind(transition.loss_reason)
        .bind(transition.notes)
        .bind(transition.client_id)
        .bind(transition.user_id)
        .fetch_one(executor)
        .await?;

        Ok(record)
    }

    pub async fn list_transitions<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        quote_id: Uuid,
    ) -> Result<Vec<QuoteTransition>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let records = sqlx::query_as::<_, QuoteTransition>(
            r#"
            SELECT * FROM quote_transitions
            WHERE tenant_id = $1 AND quote_id = $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(tenant_id)
        .bind(quote_id)
        .fetch_all(executor)
        .await?;

        Ok(records)
    }
}
