// src/services/portfolio_service.rs

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use sqlx::{Acquire, Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{ClientRepository, PortfolioRepository},
    models::portfolio::{
        Claim, Commission, CommissionStatus, CommissionSummary, Consortium, Financing, HealthPlan,
        NewClaim, NewCommission, NewConsortium, NewFinancing, NewHealthPlan, NewPolicy, Policy,
    },
};

/// Comissão padrão: prêmio x taxa / 100, em centavos (meio para cima)
pub fn default_commission(premium: Decimal, rate_percent: Decimal) -> Decimal {
    (premium * rate_percent / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn summarize_commissions(commissions: &[Commission]) -> CommissionSummary {
    commissions.iter().fold(CommissionSummary::default(), |mut acc, c| {
        match c.status {
            CommissionStatus::Pending => {
                acc.pending_count += 1;
                acc.pending_amount += c.amount;
            }
            CommissionStatus::Received => {
                acc.received_count += 1;
                acc.received_amount += c.amount;
            }
        }
        acc
    })
}

#[derive(Clone)]
pub struct PortfolioService {
    portfolio_repo: PortfolioRepository,
    client_repo: ClientRepository,
}

impl PortfolioService {
    pub fn new(portfolio_repo: PortfolioRepository, client_repo: ClientRepository) -> Self {
        Self { portfolio_repo, client_repo }
    }

    async fn ensure_client<'e, E>(&self, executor: E, tenant_id: Uuid, client_id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.client_repo
            .find_by_id(executor, tenant_id, client_id)
            .await?
            .map(|_| ())
            .ok_or_else(|| AppError::ResourceNotFound(format!("Cliente {}", client_id)))
    }

    // =========================================================================
    //  APÓLICES
    // =========================================================================

    pub async fn create_policy<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        input: &NewPolicy,
    ) -> Result<Policy, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        self.ensure_client(&mut *tx, tenant_id, input.cliente_id).await?;
        let policy = self.portfolio_repo.create_policy(&mut *tx, tenant_id, input).await?;

        tx.commit().await?;
        Ok(policy)
    }

    pub async fn get_policy<'e, E>(&self, executor: E, tenant_id: Uuid, policy_id: Uuid) -> Result<Policy, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.portfolio_repo
            .find_policy(executor, tenant_id, policy_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound(format!("Apólice {}", policy_id)))
    }

    pub async fn list_policies<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        client_id: Option<Uuid>,
    ) -> Result<Vec<Policy>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.portfolio_repo.list_policies(executor, tenant_id, client_id).await
    }

    // =========================================================================
    //  SINISTROS
    // =========================================================================

    /// O sinistro precisa apontar para uma apólice do mesmo cliente
    pub async fn create_claim<'e, E>(&self, executor: E, tenant_id: Uuid, input: &NewClaim) -> Result<Claim, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        self.ensure_client(&mut *tx, tenant_id, input.cliente_id).await?;
        let policy = self.get_policy(&mut *tx, tenant_id, input.apolice_id).await?;
        if policy.client_id != input.cliente_id {
            return Err(AppError::PolicyClientMismatch);
        }

        let claim = self.portfolio_repo.create_claim(&mut *tx, tenant_id, input).await?;

        tx.commit().await?;
        Ok(claim)
    }

    pub async fn list_claims<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        client_id: Option<Uuid>,
    ) -> Result<Vec<Claim>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.portfolio_repo.list_claims(executor, tenant_id, client_id).await
    }

    // =========================================================================
    //  CONSÓRCIOS, SAÚDE E FINANCIAMENTOS
    // =========================================================================

    pub async fn create_consortium<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        input: &NewConsortium,
    ) -> Result<Consortium, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        self.ensure_client(&mut *tx, tenant_id, input.cliente_id).await?;
        let consortium = self.portfolio_repo.create_consortium(&mut *tx, tenant_id, input).await?;

        tx.commit().await?;
        Ok(consortium)
    }

    pub async fn list_consortiums<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        client_id: Option<Uuid>,
    ) -> Result<Vec<Consortium>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.portfolio_repo.list_consortiums(executor, tenant_id, client_id).await
    }

    pub async fn create_health_plan<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        input: &NewHealthPlan,
    ) -> Result<HealthPlan, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        self.ensure_client(&mut *tx, tenant_id, input.cliente_id).await?;
        let plan = self.portfolio_repo.create_health_plan(&mut *tx, tenant_id, input).await?;

        tx.commit().await?;
        Ok(plan)
    }

    pub async fn list_health_plans<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        client_id: Option<Uuid>,
    ) -> Result<Vec<HealthPlan>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.portfolio_repo.list_health_plans(executor, tenant_id, client_id).await
    }

    pub async fn create_financing<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        input: &NewFinancing,
    ) -> Result<Financing, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        self.ensure_client(&mut *tx, tenant_id, input.cliente_id).await?;
        let financing = self.portfolio_repo.create_financing(&mut *tx, tenant_id, input).await?;

        tx.commit().await?;
        Ok(financing)
    }

    pub async fn list_financings<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        client_id: Option<Uuid>,
    ) -> Result<Vec<Financing>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.portfolio_repo.list_financings(executor, tenant_id, client_id).await
    }

    // =========================================================================
    //  COMISSÕES
    // =========================================================================

    pub async fn create_commission<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        input: &NewCommission,
    ) -> Result<Commission, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let policy = self.get_policy(&mut *tx, tenant_id, input.apolice_id).await?;
        let amount = input
            .valor
            .unwrap_or_else(|| default_commission(policy.premium, policy.commission_rate));

        let commission = self
            .portfolio_repo
            .create_commission(&mut *tx, tenant_id, policy.id, amount, input.vencimento)
            .await?;

        tx.commit().await?;
        Ok(commission)
    }

    pub async fn list_commissions<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        policy_id: Option<Uuid>,
    ) -> Result<Vec<Commission>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.portfolio_repo.list_commissions(executor, tenant_id, policy_id).await
    }

    pub async fn mark_commission_received<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        commission_id: Uuid,
        received_on: NaiveDate,
    ) -> Result<Commission, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.portfolio_repo
            .mark_commission_received(executor, tenant_id, commission_id, received_on)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound(format!("Comissão {}", commission_id)))
    }

    pub async fn commission_summary<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
    ) -> Result<CommissionSummary, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let commissions = self.portfolio_repo.list_commissions(executor, tenant_id, None).await?;
        Ok(summarize_commissions(&commissions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::str::FromStr;

    fn money(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    fn commission(amount: &str, status: CommissionStatus) -> Commission {
        Commission {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            policy_id: Uuid::nil(),
            amount: money(amount),
            due_date: NaiveDate::from_ymd_opt(2025, 4, 10).unwrap(),
            received_on: None,
            status,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn default_commission_is_premium_times_rate() {
        assert_eq!(default_commission(money("3200.00"), money("15")), money("480.00"));
        assert_eq!(default_commission(money("1000"), money("0")), Decimal::ZERO);
    }

    #[test]
    fn default_commission_rounds_to_cents() {
        // 1234.57 x 12.5% = 154.32125
        assert_eq!(default_commission(money("1234.57"), money("12.5")), money("154.32"));
        // 0.10 x 5% = 0.005 -> 0.01
        assert_eq!(default_commission(money("0.10"), money("5")), money("0.01"));
    }

    #[test]
    fn summary_splits_pending_and_received() {
        let commissions = vec![
            commission("100.50", CommissionStatus::Pending),
            commission("49.50", CommissionStatus::Pending),
            commission("300.00", CommissionStatus::Received),
        ];

        let summary = summarize_commissions(&commissions);
        assert_eq!(summary.pending_count, 2);
        assert_eq!(summary.pending_amount, money("150.00"));
        assert_eq!(summary.received_count, 1);
        assert_eq!(summary.received_amount, money("300.00"));
    }
}
