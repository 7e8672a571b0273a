// src/services/pipeline_service.rs

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sqlx::{Acquire, Executor, PgConnection, Postgres};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::PipelineRepository,
    models::pipeline::{PipelinePhase, DEFAULT_PHASES},
};

pub const DEFAULT_COLOR: &str = "slate";

/// Uma entrada da reordenação: `{id, ordem}`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct PhaseOrder {
    pub id: Uuid,
    pub ordem: i32,
}

// =============================================================================
//  REGRAS PURAS (sem banco)
// =============================================================================

/// Nome exibido da fase: sem espaços nas pontas e nunca vazio
fn clean_phase_name(name: &str) -> Result<&str, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidPhaseName);
    }
    Ok(name)
}

/// Gera a chave estável da fase a partir do nome:
/// minúsculas, sem acento, separadores viram `_`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_separator = false;

    for ch in name.chars().flat_map(char::to_lowercase).map(fold_accent) {
        if ch.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('_');
            }
            pending_separator = false;
            slug.push(ch);
        } else {
            pending_separator = true;
        }
    }

    slug
}

fn fold_accent(ch: char) -> char {
    match ch {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        other => other,
    }
}

/// Resolve colisão de chave com sufixo numérico (`_2`, `_3`, ...)
pub fn unique_key(base: &str, existing: &[PipelinePhase]) -> String {
    let taken: HashSet<&str> = existing.iter().map(|p| p.key.as_str()).collect();
    if !taken.contains(base) {
        return base.to_string();
    }

    (2..)
        .map(|n| format!("{}_{}", base, n))
        .find(|candidate| !taken.contains(candidate.as_str()))
        .unwrap_or_else(|| base.to_string())
}

/// Posição final de uma nova fase: fim da fila, ou a pedida (limitada ao intervalo válido).
pub fn plan_insert_position(current_max: i32, requested: Option<i32>) -> i32 {
    match requested {
        None => current_max + 1,
        Some(position) => position.clamp(1, current_max + 1),
    }
}

/// Valida a reordenação e devolve `(id, posição)` contíguos a partir de 1.
///
/// A submissão precisa listar todas as fases exatamente uma vez. Fases de
/// sistema mantêm a sequência relativa entre si; as demais podem ir para
/// qualquer lugar entre elas.
pub fn plan_reorder(
    current: &[PipelinePhase],
    requested: &[PhaseOrder],
) -> Result<Vec<(Uuid, i32)>, AppError> {
    let known: HashSet<Uuid> = current.iter().map(|p| p.id).collect();
    let mut seen = HashSet::with_capacity(requested.len());

    for entry in requested {
        if !known.contains(&entry.id) {
            return Err(AppError::ReorderUnknownPhase(entry.id));
        }
        if !seen.insert(entry.id) {
            return Err(AppError::ReorderDuplicate(entry.id));
        }
    }

    if requested.len() != current.len() {
        return Err(AppError::ReorderIncomplete {
            expected: current.len(),
            received: requested.len(),
        });
    }

    // sort estável: empates de `ordem` preservam a ordem do array
    let mut sequence: Vec<&PhaseOrder> = requested.iter().collect();
    sequence.sort_by_key(|entry| entry.ordem);

    let mut current_sorted: Vec<&PipelinePhase> = current.iter().collect();
    current_sorted.sort_by_key(|p| p.order);

    let system_before: Vec<&PipelinePhase> =
        current_sorted.into_iter().filter(|p| p.is_system).collect();
    let system_after: Vec<Uuid> = sequence
        .iter()
        .filter(|entry| system_before.iter().any(|p| p.id == entry.id))
        .map(|entry| entry.id)
        .collect();

    if let Some(moved) = system_before
        .iter()
        .zip(system_after.iter())
        .find(|(before, after)| before.id != **after)
        .map(|(before, _)| before)
    {
        return Err(AppError::SystemPhaseProtected(moved.key.clone()));
    }

    Ok(sequence
        .iter()
        .enumerate()
        .map(|(index, entry)| (entry.id, index as i32 + 1))
        .collect())
}

/// Fase de sistema nunca sai; fase em uso também não.
pub fn check_deletable(phase: &PipelinePhase, quotes_using: i64) -> Result<(), AppError> {
    if phase.is_system {
        return Err(AppError::SystemPhaseProtected(phase.key.clone()));
    }
    if quotes_using > 0 {
        return Err(AppError::PhaseInUse {
            key: phase.key.clone(),
            count: quotes_using,
        });
    }
    Ok(())
}

/// Posições contíguas para as fases restantes (já ordenadas)
pub fn compact_positions(remaining: &[PipelinePhase]) -> Vec<(Uuid, i32)> {
    remaining
        .iter()
        .enumerate()
        .map(|(index, phase)| (phase.id, index as i32 + 1))
        .collect()
}

// =============================================================================
//  SERVIÇO
// =============================================================================

#[derive(Clone)]
pub struct PipelineService {
    repo: PipelineRepository,
}

impl PipelineService {
    pub fn new(repo: PipelineRepository) -> Self {
        Self { repo }
    }

    /// Cria as fases padrão que ainda não existem para a corretora.
    pub async fn seed_default_phases(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
    ) -> Result<(), AppError> {
        let existing = self.repo.list_phases(&mut *conn, tenant_id).await?;
        if !existing.is_empty() {
            return Ok(());
        }

        for (index, default) in DEFAULT_PHASES.iter().enumerate() {
            self.repo
                .insert_default_phase(
                    &mut *conn,
                    tenant_id,
                    default.name,
                    default.key,
                    default.color,
                    index as i32 + 1,
                    default.is_system,
                )
                .await?;
        }

        tracing::info!("🌱 Fases padrão criadas para a corretora {}", tenant_id);
        Ok(())
    }

    pub async fn list_phases<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
    ) -> Result<Vec<PipelinePhase>, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let mut phases = self.repo.list_phases(&mut *tx, tenant_id).await?;
        if phases.is_empty() {
            self.seed_default_phases(&mut *tx, tenant_id).await?;
            phases = self.repo.list_phases(&mut *tx, tenant_id).await?;
        }

        tx.commit().await?;
        Ok(phases)
    }

    pub async fn create_phase<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        name: &str,
        color: Option<&str>,
        order: Option<i32>,
    ) -> Result<PipelinePhase, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let base_key = slugify(name);
        if base_key.is_empty() {
            return Err(AppError::InvalidPhaseName);
        }

        let mut tx = executor.begin().await?;

        // Trava a lista: dois cadastros simultâneos não disputam a mesma posição
        let phases = self.repo.list_phases_for_update(&mut *tx, tenant_id).await?;
        let key = unique_key(&base_key, &phases);
        let current_max = phases.iter().map(|p| p.order).max().unwrap_or(0);
        let position = plan_insert_position(current_max, order);

        if position <= current_max {
            self.repo.shift_positions_from(&mut *tx, tenant_id, position).await?;
        }

        let phase = self
            .repo
            .insert_phase(
                &mut *tx,
                tenant_id,
                name.trim(),
                &key,
                color.unwrap_or(DEFAULT_COLOR),
                position,
                false,
            )
            .await?;

        tx.commit().await?;

        tracing::info!("➕ Fase '{}' criada na posição {}", phase.key, phase.order);
        Ok(phase)
    }

    pub async fn update_phase<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        phase_id: Uuid,
        name: Option<&str>,
        color: Option<&str>,
    ) -> Result<PipelinePhase, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let name = name.map(clean_phase_name).transpose()?;

        self.repo
            .update_phase(executor, tenant_id, phase_id, name, color)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound(format!("Fase {}", phase_id)))
    }

    pub async fn reorder_phases<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        requested: &[PhaseOrder],
    ) -> Result<Vec<PipelinePhase>, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let phases = self.repo.list_phases_for_update(&mut *tx, tenant_id).await?;
        let plan = plan_reorder(&phases, requested)?;

        // A unique (tenant_id, position) é DEFERRABLE: só é checada no commit
        for (phase_id, position) in plan {
            self.repo.set_position(&mut *tx, tenant_id, phase_id, position).await?;
        }

        let reordered = self.repo.list_phases(&mut *tx, tenant_id).await?;
        tx.commit().await?;

        Ok(reordered)
    }

    pub async fn delete_phase<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        phase_id: Uuid,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let phases = self.repo.list_phases_for_update(&mut *tx, tenant_id).await?;
        let phase = phases
            .iter()
            .find(|p| p.id == phase_id)
            .ok_or_else(|| AppError::ResourceNotFound(format!("Fase {}", phase_id)))?;

        let quotes_using = self.repo.count_quotes_in_phase(&mut *tx, tenant_id, &phase.key).await?;
        check_deletable(phase, quotes_using)?;

        self.repo.delete_phase(&mut *tx, tenant_id, phase_id).await?;

        let remaining: Vec<PipelinePhase> =
            phases.iter().filter(|p| p.id != phase_id).cloned().collect();
        for (id, position) in compact_positions(&remaining) {
            self.repo.set_position(&mut *tx, tenant_id, id, position).await?;
        }

        tx.commit().await?;

        tracing::info!("🗑️ Fase '{}' removida", phase.key);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        common::db_utils::get_rls_connection,
        services::quote_service::{tests::new_quote, StatusChange},
        test_support,
    };
    use chrono::Utc;

    pub(crate) fn phase(key: &str, order: i32, is_system: bool) -> PipelinePhase {
        PipelinePhase {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            name: key.to_string(),
            key: key.to_string(),
            color: DEFAULT_COLOR.to_string(),
            order,
            is_system,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn scenario_phases() -> Vec<PipelinePhase> {
        vec![
            phase("new", 1, false),
            phase("quoting", 2, false),
            phase("won", 3, true),
            phase("lost", 4, true),
        ]
    }

    fn orders(entries: &[(Uuid, i32)]) -> Vec<PhaseOrder> {
        entries.iter().map(|&(id, ordem)| PhaseOrder { id, ordem }).collect()
    }

    #[test]
    fn rename_to_whitespace_is_rejected() {
        assert!(matches!(clean_phase_name("   "), Err(AppError::InvalidPhaseName)));
        assert!(matches!(clean_phase_name(""), Err(AppError::InvalidPhaseName)));
        assert_eq!(clean_phase_name("  Vistoria ").unwrap(), "Vistoria");
    }

    #[test]
    fn slugify_folds_accents_and_separators() {
        assert_eq!(slugify("Em Negociação"), "em_negociacao");
        assert_eq!(slugify("  Proposta -- Enviada! "), "proposta_enviada");
        assert_eq!(slugify("Negotiating"), "negotiating");
        assert_eq!(slugify("2ª Via"), "2_via");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn unique_key_appends_suffix_on_collision() {
        let phases = vec![phase("quoting", 1, false), phase("quoting_2", 2, false)];
        assert_eq!(unique_key("quoting", &phases), "quoting_3");
        assert_eq!(unique_key("proposal", &phases), "proposal");
    }

    #[test]
    fn new_phase_goes_after_current_max() {
        // max atual 3 -> nova fase recebe 4
        assert_eq!(plan_insert_position(3, None), 4);
    }

    #[test]
    fn requested_position_is_clamped() {
        assert_eq!(plan_insert_position(3, Some(2)), 2);
        assert_eq!(plan_insert_position(3, Some(0)), 1);
        assert_eq!(plan_insert_position(3, Some(99)), 4);
        assert_eq!(plan_insert_position(0, None), 1);
    }

    #[test]
    fn reorder_rewrites_contiguous_positions() {
        let phases = vec![phase("a", 1, false), phase("b", 2, false), phase("c", 3, false)];
        let (a, b, c) = (phases[0].id, phases[1].id, phases[2].id);

        // [A,B,C] -> [C,A,B], com ordens esparsas vindas do cliente
        let plan = plan_reorder(&phases, &orders(&[(a, 20), (b, 30), (c, 10)])).unwrap();
        assert_eq!(plan, vec![(c, 1), (a, 2), (b, 3)]);
    }

    #[test]
    fn reorder_ties_keep_submission_order() {
        let phases = vec![phase("a", 1, false), phase("b", 2, false)];
        let (a, b) = (phases[0].id, phases[1].id);

        let plan = plan_reorder(&phases, &orders(&[(b, 1), (a, 1)])).unwrap();
        assert_eq!(plan, vec![(b, 1), (a, 2)]);
    }

    #[test]
    fn reorder_must_list_every_phase_once() {
        let phases = scenario_phases();
        let ids: Vec<Uuid> = phases.iter().map(|p| p.id).collect();

        let partial = orders(&[(ids[0], 1), (ids[1], 2)]);
        assert!(matches!(
            plan_reorder(&phases, &partial),
            Err(AppError::ReorderIncomplete { expected: 4, received: 2 })
        ));

        let duplicated = orders(&[(ids[0], 1), (ids[0], 2), (ids[2], 3), (ids[3], 4)]);
        assert!(matches!(plan_reorder(&phases, &duplicated), Err(AppError::ReorderDuplicate(id)) if id == ids[0]));

        let stranger = Uuid::new_v4();
        let unknown = orders(&[(stranger, 1), (ids[1], 2), (ids[2], 3), (ids[3], 4)]);
        assert!(matches!(plan_reorder(&phases, &unknown), Err(AppError::ReorderUnknownPhase(id)) if id == stranger));
    }

    #[test]
    fn reorder_cannot_swap_system_phases() {
        let phases = scenario_phases();
        let ids: Vec<Uuid> = phases.iter().map(|p| p.id).collect();

        // lost antes de won
        let swapped = orders(&[(ids[0], 1), (ids[1], 2), (ids[3], 3), (ids[2], 4)]);
        assert!(matches!(
            plan_reorder(&phases, &swapped),
            Err(AppError::SystemPhaseProtected(key)) if key == "won"
        ));
    }

    #[test]
    fn ordinary_phases_may_move_around_system_phases() {
        let mut phases = scenario_phases();
        phases.push(phase("negotiating", 5, false));
        let ids: Vec<Uuid> = phases.iter().map(|p| p.id).collect();

        // negotiating sai do fim e entra antes de won
        let plan = plan_reorder(
            &phases,
            &orders(&[(ids[0], 1), (ids[1], 2), (ids[4], 3), (ids[2], 4), (ids[3], 5)]),
        )
        .unwrap();
        assert_eq!(plan[2], (ids[4], 3));
        assert_eq!(plan[3], (ids[2], 4));
    }

    #[test]
    fn system_phase_is_never_deletable() {
        let won = phase("won", 3, true);
        assert!(matches!(check_deletable(&won, 0), Err(AppError::SystemPhaseProtected(k)) if k == "won"));
        assert!(matches!(check_deletable(&won, 7), Err(AppError::SystemPhaseProtected(_))));
    }

    #[test]
    fn phase_in_use_is_not_deletable() {
        let quoting = phase("quoting", 2, false);
        assert!(matches!(
            check_deletable(&quoting, 2),
            Err(AppError::PhaseInUse { ref key, count: 2 }) if key == "quoting"
        ));
        assert!(check_deletable(&quoting, 0).is_ok());
    }

    #[test]
    fn compaction_closes_gaps() {
        let remaining = vec![phase("a", 1, false), phase("c", 3, false), phase("d", 4, true)];
        let positions: Vec<i32> = compact_positions(&remaining).into_iter().map(|(_, p)| p).collect();
        assert_eq!(positions, vec![1, 2, 3]);
    }

    // =========================================================================
    //  Com banco (DATABASE_URL)
    // =========================================================================

    fn keys(phases: &[PipelinePhase]) -> Vec<&str> {
        phases.iter().map(|p| p.key.as_str()).collect()
    }

    fn positions(phases: &[PipelinePhase]) -> Vec<i32> {
        phases.iter().map(|p| p.order).collect()
    }

    #[tokio::test]
    async fn reorder_is_persisted_with_contiguous_positions() {
        let Some(state) = test_support::app_state().await else { return };
        let (user_id, tenant_id) = test_support::broker(&state).await;
        let mut conn = get_rls_connection(&state.db_pool, tenant_id, user_id).await.unwrap();
        let service = &state.pipeline_service;

        let phases = service.list_phases(&mut *conn, tenant_id).await.unwrap();
        let id_of = |key: &str| phases.iter().find(|p| p.key == key).unwrap().id;

        // [contacted, quoting, proposal] -> [proposal, contacted, quoting]
        let wanted = ["new", "proposal", "contacted", "quoting", "won", "lost"];
        let requested: Vec<PhaseOrder> = wanted
            .iter()
            .enumerate()
            .map(|(index, &key)| PhaseOrder { id: id_of(key), ordem: (index as i32 + 1) * 10 })
            .collect();
        service.reorder_phases(&mut *conn, tenant_id, &requested).await.unwrap();

        let mut fresh = get_rls_connection(&state.db_pool, tenant_id, user_id).await.unwrap();
        let reloaded = service.list_phases(&mut *fresh, tenant_id).await.unwrap();
        assert_eq!(keys(&reloaded), wanted);
        assert_eq!(positions(&reloaded), [1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn phase_with_quotes_is_kept_and_empty_one_is_removed() {
        let Some(state) = test_support::app_state().await else { return };
        let (user_id, tenant_id) = test_support::broker(&state).await;
        let mut conn = get_rls_connection(&state.db_pool, tenant_id, user_id).await.unwrap();
        let service = &state.pipeline_service;

        let quote = state.quote_service.create_quote(&mut *conn, tenant_id, &new_quote("Vida")).await.unwrap();
        let to_contacted = StatusChange { target: "contacted".to_string(), ..Default::default() };
        state
            .quote_service
            .change_status(&mut *conn, tenant_id, user_id, quote.id, &to_contacted)
            .await
            .unwrap();

        let phases = service.list_phases(&mut *conn, tenant_id).await.unwrap();
        let id_of = |key: &str| phases.iter().find(|p| p.key == key).unwrap().id;

        let in_use = service.delete_phase(&mut *conn, tenant_id, id_of("contacted")).await;
        assert!(matches!(&in_use, Err(AppError::PhaseInUse { key, count: 1 }) if key == "contacted"));

        service.delete_phase(&mut *conn, tenant_id, id_of("quoting")).await.unwrap();

        let reloaded = service.list_phases(&mut *conn, tenant_id).await.unwrap();
        assert_eq!(keys(&reloaded), ["new", "contacted", "proposal", "won", "lost"]);
        assert_eq!(positions(&reloaded), [1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn phase_created_with_position_pushes_the_rest_down() {
        let Some(state) = test_support::app_state().await else { return };
        let (user_id, tenant_id) = test_support::broker(&state).await;
        let mut conn = get_rls_connection(&state.db_pool, tenant_id, user_id).await.unwrap();
        let service = &state.pipeline_service;

        let created = service
            .create_phase(&mut *conn, tenant_id, " Vistoria ", Some("teal"), Some(2))
            .await
            .unwrap();
        assert_eq!(created.key, "vistoria");
        assert_eq!(created.name, "Vistoria");
        assert_eq!(created.order, 2);

        let reloaded = service.list_phases(&mut *conn, tenant_id).await.unwrap();
        assert_eq!(
            keys(&reloaded),
            ["new", "vistoria", "contacted", "quoting", "proposal", "won", "lost"]
        );
        assert_eq!(positions(&reloaded), [1, 2, 3, 4, 5, 6, 7]);
    }

    #[tokio::test]
    async fn concurrent_first_listing_seeds_the_funnel_once() {
        let Some(state) = test_support::app_state().await else { return };
        let (user_id, tenant_id) = test_support::bare_broker(&state).await;
        let mut first = get_rls_connection(&state.db_pool, tenant_id, user_id).await.unwrap();
        let mut second = get_rls_connection(&state.db_pool, tenant_id, user_id).await.unwrap();
        let service = &state.pipeline_service;

        let (a, b) = tokio::join!(
            service.list_phases(&mut *first, tenant_id),
            service.list_phases(&mut *second, tenant_id),
        );
        assert_eq!(a.unwrap().len(), DEFAULT_PHASES.len());
        assert_eq!(b.unwrap().len(), DEFAULT_PHASES.len());

        let stored = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM pipeline_phases WHERE tenant_id = $1")
            .bind(tenant_id)
            .fetch_one(&mut *first)
            .await
            .unwrap();
        assert_eq!(stored, DEFAULT_PHASES.len() as i64);
    }

    #[tokio::test]
    async fn rename_to_whitespace_leaves_the_phase_as_is() {
        let Some(state) = test_support::app_state().await else { return };
        let (user_id, tenant_id) = test_support::broker(&state).await;
        let mut conn = get_rls_connection(&state.db_pool, tenant_id, user_id).await.unwrap();
        let service = &state.pipeline_service;

        let phases = service.list_phases(&mut *conn, tenant_id).await.unwrap();
        let quoting = phases.iter().find(|p| p.key == "quoting").unwrap();

        let result = service.update_phase(&mut *conn, tenant_id, quoting.id, Some("   "), None).await;
        assert!(matches!(result, Err(AppError::InvalidPhaseName)));

        let reloaded = service.list_phases(&mut *conn, tenant_id).await.unwrap();
        let unchanged = reloaded.iter().find(|p| p.id == quoting.id).unwrap();
        assert_eq!(unchanged.name, quoting.name);
    }
}
