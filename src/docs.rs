// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::logout,

        // --- Users ---
        handlers::auth::get_me,

        // --- Tenancy ---
        handlers::tenancy::create_tenant,
        handlers::tenancy::list_my_tenants,

        // --- Pipeline ---
        handlers::pipeline::list_phases,
        handlers::pipeline::create_phase,
        handlers::pipeline::update_phase,
        handlers::pipeline::reorder_phases,
        handlers::pipeline::delete_phase,
        handlers::pipeline::get_board,
        handlers::pipeline::list_follow_ups,

        // --- Cotações ---
        handlers::quotes::create_quote,
        handlers::quotes::list_quotes,
        handlers::quotes::get_quote,
        handlers::quotes::update_quote_status,
        handlers::quotes::schedule_follow_up,
        handlers::quotes::get_history,
        handlers::quotes::get_client_draft,

        // --- Clientes ---
        handlers::clients::create_client,
        handlers::clients::list_clients,
        handlers::clients::get_client,
        handlers::clients::update_client,
        handlers::clients::deactivate_client,
        handlers::clients::client_overview,

        // --- Carteira ---
        handlers::portfolio::create_policy,
        handlers::portfolio::list_policies,
        handlers::portfolio::get_policy,
        handlers::portfolio::create_claim,
        handlers::portfolio::list_claims,
        handlers::portfolio::create_consortium,
        handlers::portfolio::list_consortiums,
        handlers::portfolio::create_health_plan,
        handlers::portfolio::list_health_plans,
        handlers::portfolio::create_financing,
        handlers::portfolio::list_financings,
        handlers::portfolio::create_commission,
        handlers::portfolio::list_commissions,
        handlers::portfolio::mark_commission_received,
        handlers::portfolio::commission_summary,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::User,
            models::auth::RegisterUserPayload,
            models::auth::LoginUserPayload,
            models::auth::AuthResponse,

            // --- TENANCY ---
            models::tenancy::Tenant,
            models::tenancy::TenantMember,
            handlers::tenancy::CreateTenantPayload,

            // --- Pipeline ---
            models::pipeline::PipelinePhase,
            models::pipeline::ColumnKind,
            models::pipeline::BoardColumn,
            models::pipeline::PipelineBoard,
            services::pipeline_service::PhaseOrder,
            handlers::pipeline::CreatePhasePayload,
            handlers::pipeline::UpdatePhasePayload,
            handlers::pipeline::ReorderPhasesPayload,

            // --- Cotações ---
            models::quote::LossReason,
            models::quote::Quote,
            models::quote::QuoteTransition,
            models::quote::ClientDraft,
            models::quote::NewQuotePayload,
            handlers::quotes::UpdateQuoteStatusPayload,
            handlers::quotes::FollowUpPayload,

            // --- Clientes ---
            models::client::Client,
            models::client::ClientTotals,
            models::client::ClientOverview,
            models::client::NewClientPayload,
            models::client::UpdateClientPayload,

            // --- Carteira ---
            models::portfolio::PolicyStatus,
            models::portfolio::ClaimStatus,
            models::portfolio::CommissionStatus,
            models::portfolio::Policy,
            models::portfolio::Claim,
            models::portfolio::Consortium,
            models::portfolio::HealthPlan,
            models::portfolio::Financing,
            models::portfolio::Commission,
            models::portfolio::CommissionSummary,
            models::portfolio::NewPolicy,
            models::portfolio::NewClaim,
            models::portfolio::NewConsortium,
            models::portfolio::NewHealthPlan,
            models::portfolio::NewFinancing,
            models::portfolio::NewCommission,
            handlers::portfolio::MarkReceivedPayload,
        )
    ),
    tags(
        (name = "Auth", description = "Autenticação e Registro"),
        (name = "Users", description = "Dados do Usuário e Perfil"),
        (name = "Tenancy", description = "Gestão de Corretoras e Acesso"),
        (name = "Pipeline", description = "Fases do funil, quadro kanban e follow-ups"),
        (name = "Cotações", description = "Cotações e transições de fase (ganho/perda)"),
        (name = "Clientes", description = "Cadastro de clientes e visão 360"),
        (name = "Carteira", description = "Apólices, sinistros, consórcios, planos de saúde, financiamentos e comissões")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}
