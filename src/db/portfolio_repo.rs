// src/db/portfolio_repo.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::{map_unique_violation, AppError},
    models::portfolio::{
        Claim, Commission, Consortium, Financing, HealthPlan, NewClaim, NewConsortium,
        NewFinancing, NewHealthPlan, NewPolicy, Policy,
    },
};

#[derive(Clone, Default)]
pub struct PortfolioRepository;

impl PortfolioRepository {
    pub fn new() -> Self {
        Self
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
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Policy>(
            r#"
            INSERT INTO policies (
                tenant_id, client_id, insurer, ramo, policy_number,
                premium, commission_rate, start_date, end_date
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(input.cliente_id)
        .bind(&input.seguradora)
        .bind(&input.ramo)
        .bind(&input.numero_apolice)
        .bind(input.premio)
        .bind(input.taxa_comissao)
        .bind(input.inicio_vigencia)
        .bind(input.fim_vigencia)
        .fetch_one(executor)
        .await
        .map_err(|e| map_unique_violation(e, || format!("apólice {}", input.numero_apolice)))
    }

    pub async fn find_policy<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        policy_id: Uuid,
    ) -> Result<Option<Policy>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let policy = sqlx::query_as::<_, Policy>("SELECT * FROM policies WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(policy_id)
            .fetch_optional(executor)
            .await?;

        Ok(policy)
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
        let policies = sqlx::query_as::<_, Policy>(
            r#"
            SELECT * FROM policies
            WHERE tenant_id = $1 AND ($2::uuid IS NULL OR client_id = $2)
            ORDER BY end_date ASC
            "#,
        )
        .bind(tenant_id)
        .bind(client_id)
        .fetch_all(executor)
        .await?;

        Ok(policies)
    }

    // =========================================================================
    //  SINISTROS
    // =========================================================================

    pub async fn create_claim<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        input: &NewClaim,
    ) -> Result<Claim, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let claim = sqlx::query_as::<_, Claim>(
            r#"
            INSERT INTO claims (tenant_id, client_id, policy_id, occurred_on, description, claimed_amount)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(input.cliente_id)
        .bind(input.apolice_id)
        .bind(input.data_ocorrencia)
        .bind(&input.descricao)
        .bind(input.valor_reclamado)
        .fetch_one(executor)
        .await?;

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
        let claims = sqlx::query_as::<_, Claim>(
            r#"
            SELECT * FROM claims
            WHERE tenant_id = $1 AND ($2::uuid IS NULL OR client_id = $2)
            ORDER BY occurred_on DESC
            "#,
        )
        .bind(tenant_id)
        .bind(client_id)
        .fetch_all(executor)
        .await?;

        Ok(claims)
    }

    // =========================================================================
    //  CONSÓRCIOS, PLANOS DE SAÚDE E FINANCIAMENTOS
    // =========================================================================

    pub async fn create_consortium<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        input: &NewConsortium,
    ) -> Result<Consortium, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let consortium = sqlx::query_as::<_, Consortium>(
            r#"
            INSERT INTO consortiums (
                tenant_id, client_id, administrator, group_code, quota,
                credit_value, monthly_installment
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(input.cliente_id)
        .bind(&input.administradora)
        .bind(&input.grupo)
        .bind(&input.cota)
        .bind(input.valor_credito)
        .bind(input.parcela_mensal)
        .fetch_one(executor)
        .await?;

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
        let consortiums = sqlx::query_as::<_, Consortium>(
            r#"
            SELECT * FROM consortiums
            WHERE tenant_id = $1 AND ($2::uuid IS NULL OR client_id = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(tenant_id)
        .bind(client_id)
        .fetch_all(executor)
        .await?;

        Ok(consortiums)
    }

    pub async fn create_health_plan<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        input: &NewHealthPlan,
    ) -> Result<HealthPlan, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let plan = sqlx::query_as::<_, HealthPlan>(
            r#"
            INSERT INTO health_plans (tenant_id, client_id, operator, plan_name, lives, monthly_fee)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(input.cliente_id)
        .bind(&input.operadora)
        .bind(&input.plano)
        .bind(input.vidas)
        .bind(input.mensalidade)
        .fetch_one(executor)
        .await?;

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
        let plans = sqlx::query_as::<_, HealthPlan>(
            r#"
            SELECT * FROM health_plans
            WHERE tenant_id = $1 AND ($2::uuid IS NULL OR client_id = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(tenant_id)
        .bind(client_id)
        .fetch_all(executor)
        .await?;

        Ok(plans)
    }

    pub async fn create_financing<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        input: &NewFinancing,
    ) -> Result<Financing, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let financing = sqlx::query_as::<_, Financing>(
            r#"
            INSERT INTO financings (
                tenant_id, client_id, institution, financed_amount, installments, installment_value
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(input.cliente_id)
        .bind(&input.instituicao)
        .bind(input.valor_financiado)
        .bind(input.parcelas)
        .bind(input.valor_parcela)
        .fetch_one(executor)
        .await?;

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
        let financings = sqlx::query_as::<_, Financing>(
            r#"
            SELECT * FROM financings
            WHERE tenant_id = $1 AND ($2::uuid IS NULL OR client_id = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(tenant_id)
        .bind(client_id)
        .fetch_all(executor)
        .await?;

        Ok(financings)
    }

    // =========================================================================
    //  COMISSÕES
    // =========================================================================

    pub async fn create_commission<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        policy_id: Uuid,
        amount: Decimal,
        due_date: NaiveDate,
    ) -> Result<Commission, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let commission = sqlx::query_as::<_, Commission>(
            r#"
            INSERT INTO commissions (tenant_id, policy_id, amount, due_date)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(policy_id)
        .bind(amount)
        .bind(due_date)
        .fetch_one(executor)
        .await?;

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
        let commissions = sqlx::query_as::<_, Commission>(
            r#"
            SELECT * FROM commissions
            WHERE tenant_id = $1 AND ($2::uuid IS NULL OR policy_id = $2)
            ORDER BY due_date ASC
            "#,
        )
        .bind(tenant_id)
        .bind(policy_id)
        .fetch_all(executor)
        .await?;

        Ok(commissions)
    }

    pub async fn mark_commission_received<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        commission_id: Uuid,
        received_on: NaiveDate,
    ) -> Result<Option<Commission>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let commission = sqlx::query_as::<_, Commission>(
            r#"
            UPDATE commissions
            SET status = 'received', received_on = $3
            WHERE tenant_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(commission_id)
        .bind(received_on)
        .fetch_optional(executor)
        .await?;

        Ok(commission)
    }
}
