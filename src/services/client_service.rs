// src/services/client_service.rs

use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::{db_utils::get_rls_connection, error::AppError},
    db::{ClientRepository, PortfolioRepository, QuoteRepository},
    models::{
        client::{Client, ClientOverview, ClientTotals, NewClientPayload, UpdateClientPayload},
        pipeline::is_terminal_key,
        portfolio::{Claim, Consortium, Financing, HealthPlan, Policy, PolicyStatus},
        quote::Quote,
    },
    services::quote_service::normalize_tax_id,
};

/// Totais da visão 360º, calculados em memória sobre as listas já carregadas
pub fn compute_totals(
    policies: &[Policy],
    claims: &[Claim],
    consortiums: &[Consortium],
    health_plans: &[HealthPlan],
    financings: &[Financing],
    quotes: &[Quote],
) -> ClientTotals {
    let active: Vec<&Policy> = policies.iter().filter(|p| p.status == PolicyStatus::Active).collect();
    let open_quotes: Vec<&Quote> = quotes.iter().filter(|q| !is_terminal_key(&q.pipeline_status)).collect();

    ClientTotals {
        active_policies: active.len(),
        active_premium: active.iter().map(|p| p.premium).sum(),
        open_claims: claims.iter().filter(|c| c.status.is_open()).count(),
        consortium_credit: consortiums.iter().map(|c| c.credit_value).sum(),
        health_monthly_fees: health_plans.iter().map(|h| h.monthly_fee).sum(),
        health_lives: health_plans.iter().map(|h| i64::from(h.lives)).sum(),
        financed_amount: financings.iter().map(|f| f.financed_amount).sum(),
        open_quotes: open_quotes.len(),
        open_pipeline_value: open_quotes.iter().filter_map(|q| q.estimated_value).sum::<Decimal>(),
    }
}

#[derive(Clone)]
pub struct ClientService {
    client_repo: ClientRepository,
    portfolio_repo: PortfolioRepository,
    quote_repo: QuoteRepository,
}

impl ClientService {
    pub fn new(
        client_repo: ClientRepository,
        portfolio_repo: PortfolioRepository,
        quote_repo: QuoteRepository,
    ) -> Self {
        Self { client_repo, portfolio_repo, quote_repo }
    }

    pub async fn create_client<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        payload: &NewClientPayload,
    ) -> Result<Client, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let tax_id = normalize_tax_id(&payload.cpf_cnpj).ok_or(AppError::InvalidTaxId)?;

        self.client_repo
            .create_client(
                executor,
                tenant_id,
                payload.nome.trim(),
                &tax_id,
                payload.email.as_deref(),
                payload.telefone.as_deref(),
            )
            .await
    }

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
        let query = query.map(str::trim).filter(|q| !q.is_empty());
        self.client_repo.list_clients(executor, tenant_id, query, include_inactive).await
    }

    pub async fn get_client<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        client_id: Uuid,
    ) -> Result<Client, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.client_repo
            .find_by_id(executor, tenant_id, client_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound(format!("Cliente {}", client_id)))
    }

    pub async fn update_client<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        client_id: Uuid,
        payload: &UpdateClientPayload,
    ) -> Result<Client, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.client_repo
            .update_client(
                executor,
                tenant_id,
                client_id,
                payload.nome.as_deref().map(str::trim),
                payload.email.as_deref(),
                payload.telefone.as_deref(),
            )
            .await?
            .ok_or_else(|| AppError::ResourceNotFound(format!("Cliente {}", client_id)))
    }

    pub async fn deactivate_client<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        client_id: Uuid,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        if !self.client_repo.deactivate_client(executor, tenant_id, client_id).await? {
            return Err(AppError::ResourceNotFound(format!("Cliente {}", client_id)));
        }
        Ok(())
    }

    /// Resumo 360º: o cliente e as seis carteiras, lidas em paralelo.
    /// Cada leitura usa a sua própria conexão com o contexto RLS.
    pub async fn client_overview(
        &self,
        pool: &PgPool,
        tenant_id: Uuid,
        user_id: Uuid,
        client_id: Uuid,
    ) -> Result<ClientOverview, AppError> {
        let client = {
            let mut conn = get_rls_connection(pool, tenant_id, user_id).await?;
            self.get_client(&mut *conn, tenant_id, client_id).await?
        };

        let filter = Some(client_id);

        let (policies, claims, consortiums, health_plans, financings, quotes) = tokio::try_join!(
            async {
                let mut conn = get_rls_connection(pool, tenant_id, user_id).await?;
                self.portfolio_repo.list_policies(&mut *conn, tenant_id, filter).await
            },
            async {
                let mut conn = get_rls_connection(pool, tenant_id, user_id).await?;
                self.portfolio_repo.list_claims(&mut *conn, tenant_id, filter).await
            },
            async {
                let mut conn = get_rls_connection(pool, tenant_id, user_id).await?;
                self.portfolio_repo.list_consortiums(&mut *conn, tenant_id, filter).await
            },
            async {
                let mut conn = get_rls_connection(pool, tenant_id, user_id).await?;
                self.portfolio_repo.list_health_plans(&mut *conn, tenant_id, filter).await
            },
            async {
                let mut conn = get_rls_connection(pool, tenant_id, user_id).await?;
                self.portfolio_repo.list_financings(&mut *conn, tenant_id, filter).await
            },
            async {
                let mut conn = get_rls_connection(pool, tenant_id, user_id).await?;
                self.quote_repo.list_by_client(&mut *conn, tenant_id, client_id).await
            },
        )?;

        let totals = compute_totals(&policies, &claims, &consortiums, &health_plans, &financings, &quotes);

        Ok(ClientOverview {
            client,
            policies,
            claims,
            consortiums,
            health_plans,
            financings,
            quotes,
            totals,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::portfolio::ClaimStatus;
    use crate::services::quote_service::tests::quote_in;
    use chrono::{NaiveDate, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn policy(premium: i64, status: PolicyStatus) -> Policy {
        Policy {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            client_id: Uuid::nil(),
            insurer: "Porto Seguro".to_string(),
            ramo: "Automóvel".to_string(),
            policy_number: Uuid::new_v4().to_string(),
            premium: Decimal::from(premium),
            commission_rate: Decimal::from(15),
            start_date: date(2025, 1, 1),
            end_date: date(2026, 1, 1),
            status,
            created_at: Utc::now(),
        }
    }

    fn claim(status: ClaimStatus) -> Claim {
        Claim {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            client_id: Uuid::nil(),
            policy_id: Uuid::nil(),
            occurred_on: date(2025, 3, 2),
            description: "Colisão".to_string(),
            claimed_amount: None,
            status,
            created_at: Utc::now(),
        }
    }

    fn health_plan(lives: i32, fee: i64) -> HealthPlan {
        HealthPlan {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            client_id: Uuid::nil(),
            operator: "Unimed".to_string(),
            plan_name: "Empresarial".to_string(),
            lives,
            monthly_fee: Decimal::from(fee),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_portfolio_has_zero_totals() {
        assert_eq!(compute_totals(&[], &[], &[], &[], &[], &[]), ClientTotals::default());
    }

    #[test]
    fn totals_only_count_active_and_open_items() {
        let policies = vec![
            policy(3200, PolicyStatus::Active),
            policy(1800, PolicyStatus::Active),
            policy(999, PolicyStatus::Cancelled),
        ];
        let claims = vec![claim(ClaimStatus::Open), claim(ClaimStatus::InReview), claim(ClaimStatus::Paid)];
        let plans = vec![health_plan(3, 1500), health_plan(1, 400)];

        let mut open = quote_in("quoting");
        open.estimated_value = Some(Decimal::from(700));
        let mut won = quote_in("won");
        won.estimated_value = Some(Decimal::from(5000));

        let totals = compute_totals(&policies, &claims, &[], &plans, &[], &[open, won, quote_in("new")]);

        assert_eq!(totals.active_policies, 2);
        assert_eq!(totals.active_premium, Decimal::from(5000));
        assert_eq!(totals.open_claims, 2);
        assert_eq!(totals.health_monthly_fees, Decimal::from(1900));
        assert_eq!(totals.health_lives, 4);
        assert_eq!(totals.open_quotes, 2);
        assert_eq!(totals.open_pipeline_value, Decimal::from(700));
    }
}
