// src/models/portfolio.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "policy_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PolicyStatus {
    Active,
    Cancelled,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "claim_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Open,
    InReview,
    Paid,
    Denied,
}

impl ClaimStatus {
    pub fn is_open(self) -> bool {
        matches!(self, ClaimStatus::Open | ClaimStatus::InReview)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "commission_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    Pending,
    Received,
}

// --- Apólice ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub id: Uuid,
    #[schema(ignore)]
    #[serde(skip_serializing)]
    pub tenant_id: Uuid,
    pub client_id: Uuid,
    #[schema(example = "Porto Seguro")]
    pub insurer: String,
    #[schema(example = "Automóvel")]
    pub ramo: String,
    #[schema(example = "0531.12.345678")]
    pub policy_number: String,
    #[schema(example = "3200.00")]
    pub premium: Decimal,
    #[schema(example = "15.00")]
    pub commission_rate: Decimal,
    #[schema(value_type = String, format = Date)]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = Date)]
    pub end_date: NaiveDate,
    pub status: PolicyStatus,
    pub created_at: DateTime<Utc>,
}

// --- Sinistro ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub id: Uuid,
    #[schema(ignore)]
    #[serde(skip_serializing)]
    pub tenant_id: Uuid,
    pub client_id: Uuid,
    pub policy_id: Uuid,
    #[schema(value_type = String, format = Date)]
    pub occurred_on: NaiveDate,
    pub description: String,
    pub claimed_amount: Option<Decimal>,
    pub status: ClaimStatus,
    pub created_at: DateTime<Utc>,
}

// --- Consórcio ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Consortium {
    pub id: Uuid,
    #[schema(ignore)]
    #[serde(skip_serializing)]
    pub tenant_id: Uuid,
    pub client_id: Uuid,
    pub administrator: String,
    pub group_code: String,
    pub quota: String,
    pub credit_value: Decimal,
    pub monthly_installment: Decimal,
    pub created_at: DateTime<Utc>,
}

// --- Plano de Saúde ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthPlan {
    pub id: Uuid,
    #[schema(ignore)]
    #[serde(skip_serializing)]
    pub tenant_id: Uuid,
    pub client_id: Uuid,
    pub operator: String,
    pub plan_name: String,
    pub lives: i32,
    pub monthly_fee: Decimal,
    pub created_at: DateTime<Utc>,
}

// --- Financiamento ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Financing {
    pub id: Uuid,
    #[schema(ignore)]
    #[serde(skip_serializing)]
    pub tenant_id: Uuid,
    pub client_id: Uuid,
    pub institution: String,
    pub financed_amount: Decimal,
    pub installments: i32,
    pub installment_value: Decimal,
    pub created_at: DateTime<Utc>,
}

// --- Comissão ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Commission {
    pub id: Uuid,
    #[schema(ignore)]
    #[serde(skip_serializing)]
    pub tenant_id: Uuid,
    pub policy_id: Uuid,
    pub amount: Decimal,
    #[schema(value_type = String, format = Date)]
    pub due_date: NaiveDate,
    #[schema(value_type = Option<String>, format = Date)]
    pub received_on: Option<NaiveDate>,
    pub status: CommissionStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommissionSummary {
    pub pending_count: usize,
    pub pending_amount: Decimal,
    pub received_count: usize,
    pub received_amount: Decimal,
}

// =============================================================================
//  PAYLOADS DE CRIAÇÃO (passados direto ao repositório, como no settings)
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct NewPolicy {
    pub cliente_id: Uuid,
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "Porto Seguro")]
    pub seguradora: String,
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "Automóvel")]
    pub ramo: String,
    #[validate(length(min = 1, message = "required"))]
    pub numero_apolice: String,
    #[schema(example = "3200.00")]
    #[validate(custom(function = "non_negative"))]
    pub premio: Decimal,
    #[serde(default)]
    #[schema(example = "15.00")]
    #[validate(custom(function = "non_negative"))]
    pub taxa_comissao: Decimal,
    #[schema(value_type = String, format = Date)]
    pub inicio_vigencia: NaiveDate,
    #[schema(value_type = String, format = Date)]
    pub fim_vigencia: NaiveDate,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct NewClaim {
    pub cliente_id: Uuid,
    pub apolice_id: Uuid,
    #[schema(value_type = String, format = Date)]
    pub data_ocorrencia: NaiveDate,
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "Colisão traseira no estacionamento")]
    pub descricao: String,
    #[validate(custom(function = "non_negative"))]
    pub valor_reclamado: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct NewConsortium {
    pub cliente_id: Uuid,
    #[validate(length(min = 1, message = "required"))]
    pub administradora: String,
    #[validate(length(min = 1, message = "required"))]
    pub grupo: String,
    #[validate(length(min = 1, message = "required"))]
    pub cota: String,
    #[validate(custom(function = "non_negative"))]
    pub valor_credito: Decimal,
    #[validate(custom(function = "non_negative"))]
    pub parcela_mensal: Decimal,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct NewHealthPlan {
    pub cliente_id: Uuid,
    #[validate(length(min = 1, message = "required"))]
    pub operadora: String,
    #[validate(length(min = 1, message = "required"))]
    pub plano: String,
    #[validate(range(min = 1, message = "invalid_lives"))]
    pub vidas: i32,
    #[validate(custom(function = "non_negative"))]
    pub mensalidade: Decimal,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct NewFinancing {
    pub cliente_id: Uuid,
    #[validate(length(min = 1, message = "required"))]
    pub instituicao: String,
    #[validate(custom(function = "non_negative"))]
    pub valor_financiado: Decimal,
    #[validate(range(min = 1, message = "invalid_installments"))]
    pub parcelas: i32,
    #[validate(custom(function = "non_negative"))]
    pub valor_parcela: Decimal,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct NewCommission {
    pub apolice_id: Uuid,
    // Sem valor: prêmio x taxa de comissão da apólice
    #[validate(custom(function = "non_negative"))]
    pub valor: Option<Decimal>,
    #[schema(value_type = String, format = Date)]
    pub vencimento: NaiveDate,
}

/// Valores monetários da carteira nunca são negativos
pub fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::new("non_negative").with_message("must_not_be_negative".into()));
    }
    Ok(())
}
