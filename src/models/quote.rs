// src/models/quote.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;
use utoipa::ToSchema;

// --- Enums ---

// Mapeia o CREATE TYPE loss_reason do banco
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "loss_reason", rename_all = "snake_case")]
#[serde(rename_all = "kebab-case")]
pub enum LossReason {
    Price,
    Coverage,
    NoResponse,
    ClientWithdrew,
    LostToCompetitor,
    Other,
}

// --- Cotação (Card do Funil) ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub id: Uuid,
    #[schema(ignore)]
    #[serde(skip_serializing)]
    pub tenant_id: Uuid,
    pub client_id: Option<Uuid>,
    #[schema(example = "Automóvel")]
    pub ramo: String,
    #[schema(example = "quoting")]
    pub pipeline_status: String,
    #[schema(example = "3200.00")]
    pub estimated_value: Option<Decimal>,
    #[schema(value_type = Option<String>, format = Date, example = "2025-03-10")]
    pub next_contact_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub loss_reason: Option<LossReason>,
    pub loss_notes: Option<String>,
    pub contact_name: Option<String>,
    pub contact_tax_id: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    #[schema(example = 3)]
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Registro de transição (histórico) ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuoteTransition {
    pub id: Uuid,
    #[schema(ignore)]
    #[serde(skip_serializing)]
    pub tenant_id: Uuid,
    pub quote_id: Uuid,
    pub from_status: String,
    pub to_status: String,
    pub loss_reason: Option<LossReason>,
    pub notes: Option<String>,
    pub client_id: Option<Uuid>,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

// --- Rascunho de cliente (coletado na transição para "ganho") ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientDraft {
    #[serde(default, alias = "nome")]
    #[validate(length(max = 200, message = "too_long"))]
    #[schema(example = "Jane Doe")]
    pub name: Option<String>,

    #[serde(default, alias = "cpf_cnpj")]
    #[schema(example = "123.456.789-00")]
    pub tax_id: Option<String>,

    #[serde(default)]
    #[validate(email(message = "invalid_email"))]
    #[schema(example = "jane@email.com")]
    pub email: Option<String>,

    #[serde(default, alias = "telefone")]
    #[schema(example = "(11) 98888-7777")]
    pub phone: Option<String>,
}

// --- Payload de criação da cotação ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct NewQuotePayload {
    pub cliente_id: Option<Uuid>,
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "Automóvel")]
    pub ramo: String,
    #[validate(custom(function = "crate::models::portfolio::non_negative"))]
    #[schema(example = "3200.00")]
    pub valor_estimado: Option<Decimal>,
    #[schema(value_type = Option<String>, format = Date, example = "2025-03-10")]
    pub proximo_contato: Option<NaiveDate>,
    pub notas: Option<String>,
    #[schema(example = "Jane Doe")]
    pub contato_nome: Option<String>,
    #[schema(example = "123.456.789-00")]
    pub contato_cpf_cnpj: Option<String>,
    #[validate(email(message = "invalid_email"))]
    pub contato_email: Option<String>,
    pub contato_telefone: Option<String>,
}
