// src/models/client.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use utoipa::ToSchema;
use validator::Validate;

use crate::models::{
    portfolio::{Claim, Consortium, Financing, HealthPlan, Policy},
    quote::Quote,
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: Uuid,
    #[schema(ignore)]
    #[serde(skip_serializing)]
    pub tenant_id: Uuid,
    #[schema(example = "Maria da Silva")]
    pub name: String,
    // Só dígitos: 11 (CPF) ou 14 (CNPJ)
    #[schema(example = "12345678900")]
    pub tax_id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Visão 360º do cliente ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientTotals {
    pub active_policies: usize,
    pub active_premium: Decimal,
    pub open_claims: usize,
    pub consortium_credit: Decimal,
    pub health_monthly_fees: Decimal,
    pub health_lives: i64,
    pub financed_amount: Decimal,
    pub open_quotes: usize,
    pub open_pipeline_value: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientOverview {
    pub client: Client,
    pub policies: Vec<Policy>,
    pub claims: Vec<Claim>,
    pub consortiums: Vec<Consortium>,
    pub health_plans: Vec<HealthPlan>,
    pub financings: Vec<Financing>,
    pub quotes: Vec<Quote>,
    pub totals: ClientTotals,
}

// --- Payloads ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct NewClientPayload {
    #[validate(length(min = 1, max = 200, message = "required"))]
    #[schema(example = "Maria da Silva")]
    pub nome: String,
    #[validate(length(min = 11, message = "invalid_tax_id"))]
    #[schema(example = "123.456.789-00")]
    pub cpf_cnpj: String,
    #[validate(email(message = "invalid_email"))]
    pub email: Option<String>,
    pub telefone: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateClientPayload {
    #[validate(length(min = 1, max = 200, message = "required"))]
    pub nome: Option<String>,
    #[validate(email(message = "invalid_email"))]
    pub email: Option<String>,
    pub telefone: Option<String>,
}
