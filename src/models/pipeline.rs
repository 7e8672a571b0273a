// src/models/pipeline.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use utoipa::{IntoParams, ToSchema};

use crate::models::quote::Quote;

// --- Chaves das fases de sistema ---
pub const NEW_KEY: &str = "new";
pub const WON_KEY: &str = "won";
pub const LOST_KEY: &str = "lost";

/// Fases terminais disparam coleta de dados extra na transição.
pub fn is_terminal_key(key: &str) -> bool {
    key == WON_KEY || key == LOST_KEY
}

// --- Fase do Funil (Coluna do Kanban) ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PipelinePhase {
    #[schema(example = "550e8400-e29b-41d4-a716-446655440001")]
    pub id: Uuid,
    #[schema(ignore)]
    #[serde(skip_serializing)]
    pub tenant_id: Uuid,
    #[schema(example = "Em Negociação")]
    pub name: String,
    #[schema(example = "em_negociacao")]
    pub key: String,
    #[schema(example = "amber")]
    pub color: String,
    #[sqlx(rename = "position")]
    #[schema(example = 4)]
    pub order: i32,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PipelinePhase {
    pub fn is_terminal(&self) -> bool {
        is_terminal_key(&self.key)
    }
}

// --- Fases padrão criadas para toda corretora ---

pub struct DefaultPhase {
    pub key: &'static str,
    pub name: &'static str,
    pub color: &'static str,
    pub is_system: bool,
}

pub const DEFAULT_PHASES: [DefaultPhase; 6] = [
    DefaultPhase { key: NEW_KEY, name: "Novo", color: "slate", is_system: true },
    DefaultPhase { key: "contacted", name: "Em contato", color: "sky", is_system: false },
    DefaultPhase { key: "quoting", name: "Cotando", color: "indigo", is_system: false },
    DefaultPhase { key: "proposal", name: "Proposta enviada", color: "amber", is_system: false },
    DefaultPhase { key: WON_KEY, name: "Ganho", color: "emerald", is_system: true },
    DefaultPhase { key: LOST_KEY, name: "Perdido", color: "rose", is_system: true },
];

// --- Quadro (Board) ---

#[derive(Debug, Clone, Copy, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BoardOptions {
    #[serde(default = "default_true", rename = "mostrar_ganhos")]
    pub show_won: bool,
    #[serde(default = "default_true", rename = "mostrar_perdidos")]
    pub show_lost: bool,
}

impl Default for BoardOptions {
    fn default() -> Self {
        Self { show_won: true, show_lost: true }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ColumnKind {
    Phase { phase: PipelinePhase },
    // Cotações cujo status não bate com nenhuma fase atual
    Unknown {
        #[serde(rename = "statusKeys")]
        status_keys: Vec<String>,
    },
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BoardColumn {
    pub kind: ColumnKind,
    pub quotes: Vec<Quote>,
    pub count: usize,
    #[schema(example = "15000.00")]
    pub total_estimated: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PipelineBoard {
    pub columns: Vec<BoardColumn>,
    pub total_quotes: usize,
}
