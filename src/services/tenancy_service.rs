// src/services/tenancy_service.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{db_utils::set_transaction_tenant, error::AppError},
    db::TenantRepository,
    models::tenancy::Tenant,
    services::pipeline_service::PipelineService,
};

#[derive(Clone)]
pub struct TenantService {
    tenant_repo: TenantRepository,
    pipeline_service: PipelineService,
    pool: PgPool, // Usamos a pool para iniciar transações
}

impl TenantService {
    pub fn new(tenant_repo: TenantRepository, pipeline_service: PipelineService, pool: PgPool) -> Self {
        Self { tenant_repo, pipeline_service, pool }
    }

    /// Cria a corretora e, atomicamente, torna o criador membro
    /// e semeia as fases padrão do funil.
    pub async fn create_tenant_with_owner(
        &self,
        name: &str,
        description: Option<&str>,
        owner_id: Uuid,
    ) -> Result<Tenant, AppError> {
        let name = name.trim();

        if self.tenant_repo.user_has_tenant_with_name(owner_id, name).await? {
            return Err(AppError::TenantNameAlreadyExists(name.to_string()));
        }

        let mut tx = self.pool.begin().await?;

        let new_tenant = self.tenant_repo.create_tenant(&mut *tx, name, description).await?;
        self.tenant_repo.add_member(&mut *tx, new_tenant.id, owner_id).await?;

        // As fases ficam sob RLS: o contexto vale só para esta transação
        set_transaction_tenant(&mut *tx, new_tenant.id).await?;
        self.pipeline_service.seed_default_phases(&mut *tx, new_tenant.id).await?;

        tx.commit().await?;

        tracing::info!("🏢 Corretora '{}' criada por {}", new_tenant.name, owner_id);
        Ok(new_tenant)
    }

    pub async fn list_user_tenants(&self, user_id: Uuid) -> Result<Vec<Tenant>, AppError> {
        self.tenant_repo.list_for_user(user_id).await
    }

    pub async fn is_member(&self, user_id: Uuid, tenant_id: Uuid) -> Result<bool, AppError> {
        self.tenant_repo.is_member(user_id, tenant_id).await
    }
}
