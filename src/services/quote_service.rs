// src/services/quote_service.rs

use chrono::NaiveDate;
use sqlx::{Acquire, Executor, PgConnection, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{
        quote_repo::{NewQuote, NewTransition},
        ClientRepository, PipelineRepository, QuoteRepository,
    },
    models::{
        client::Client,
        pipeline::{PipelinePhase, LOST_KEY, NEW_KEY, WON_KEY},
        quote::{ClientDraft, LossReason, NewQuotePayload, Quote, QuoteTransition},
    },
};

/// Pedido de mudança de fase, já desserializado pelo handler
#[derive(Debug, Clone, Default)]
pub struct StatusChange {
    pub target: String,
    pub loss_reason: Option<LossReason>,
    pub notes: Option<String>,
    pub client_draft: Option<ClientDraft>,
    pub expected_version: Option<i32>,
}

/// Cliente pronto para o upsert: nome presente e CPF/CNPJ só com dígitos
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedClient {
    pub name: String,
    pub tax_id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransitionPlan {
    Unchanged,
    Move,
    Lose { reason: LossReason, notes: Option<String> },
    Win { client: ResolvedClient },
}

// =============================================================================
//  REGRAS PURAS
// =============================================================================

/// CPF (11) ou CNPJ (14), só dígitos. Pontuação é descartada.
pub fn normalize_tax_id(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    matches!(digits.len(), 11 | 14).then_some(digits)
}

fn first_filled(candidates: [Option<&str>; 3]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// Rascunho do cliente: o que veio no pedido, depois os dados de contato
/// da cotação, depois o cliente já vinculado.
pub fn merge_draft(draft: Option<&ClientDraft>, quote: &Quote, linked: Option<&Client>) -> ClientDraft {
    ClientDraft {
        name: first_filled([
            draft.and_then(|d| d.name.as_deref()),
            quote.contact_name.as_deref(),
            linked.map(|c| c.name.as_str()),
        ]),
        tax_id: first_filled([
            draft.and_then(|d| d.tax_id.as_deref()),
            quote.contact_tax_id.as_deref(),
            linked.map(|c| c.tax_id.as_str()),
        ]),
        email: first_filled([
            draft.and_then(|d| d.email.as_deref()),
            quote.contact_email.as_deref(),
            linked.and_then(|c| c.email.as_deref()),
        ]),
        phone: first_filled([
            draft.and_then(|d| d.phone.as_deref()),
            quote.contact_phone.as_deref(),
            linked.and_then(|c| c.phone.as_deref()),
        ]),
    }
}

pub fn resolve_client(merged: ClientDraft) -> Result<ResolvedClient, AppError> {
    let name = merged.name.ok_or(AppError::ClientDraftRequired)?;
    let raw_tax_id = merged.tax_id.ok_or(AppError::ClientDraftRequired)?;
    let tax_id = normalize_tax_id(&raw_tax_id).ok_or(AppError::InvalidTaxId)?;

    Ok(ResolvedClient {
        name,
        tax_id,
        email: merged.email,
        phone: merged.phone,
    })
}

/// Decide o que a transição faz, sem tocar no banco.
/// Qualquer erro aqui significa que nada é gravado.
pub fn plan_transition(
    quote: &Quote,
    phases: &[PipelinePhase],
    change: &StatusChange,
    linked: Option<&Client>,
) -> Result<TransitionPlan, AppError> {
    if let Some(expected) = change.expected_version {
        if expected != quote.version {
            return Err(AppError::VersionConflict { current: quote.version });
        }
    }

    if !phases.iter().any(|p| p.key == change.target) {
        return Err(AppError::UnknownPhase(change.target.clone()));
    }

    match change.target.as_str() {
        LOST_KEY => {
            let reason = change.loss_reason.ok_or(AppError::LossReasonRequired)?;
            let notes = change
                .notes
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string);
            Ok(TransitionPlan::Lose { reason, notes })
        }
        WON_KEY => {
            let merged = merge_draft(change.client_draft.as_ref(), quote, linked);
            Ok(TransitionPlan::Win { client: resolve_client(merged)? })
        }
        target if target == quote.pipeline_status => Ok(TransitionPlan::Unchanged),
        _ => Ok(TransitionPlan::Move),
    }
}

/// Fase de entrada de uma cotação nova: a primeira não terminal
pub fn entry_phase_key(phases: &[PipelinePhase]) -> &str {
    phases
        .iter()
        .filter(|p| !p.is_terminal())
        .min_by_key(|p| p.order)
        .map(|p| p.key.as_str())
        .unwrap_or(NEW_KEY)
}

// =============================================================================
//  SERVIÇO
// =============================================================================

#[derive(Clone)]
pub struct QuoteService {
    quote_repo: QuoteRepository,
    pipeline_repo: PipelineRepository,
    client_repo: ClientRepository,
}

impl QuoteService {
    pub fn new(
        quote_repo: QuoteRepository,
        pipeline_repo: PipelineRepository,
        client_repo: ClientRepository,
    ) -> Self {
        Self { quote_repo, pipeline_repo, client_repo }
    }

    pub async fn create_quote<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        payload: &NewQuotePayload,
    ) -> Result<Quote, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        if let Some(client_id) = payload.cliente_id {
            self.client_repo
                .find_by_id(&mut *tx, tenant_id, client_id)
                .await?
                .ok_or_else(|| AppError::ResourceNotFound(format!("Cliente {}", client_id)))?;
        }

        let phases = self.pipeline_repo.list_phases(&mut *tx, tenant_id).await?;
        let status = entry_phase_key(&phases);
        if !phases.is_empty() {
            self.lock_target_phase(&mut *tx, tenant_id, status).await?;
        }

        let quote = self
            .quote_repo
            .create_quote(
                &mut *tx,
                tenant_id,
                NewQuote {
                    client_id: payload.cliente_id,
                    ramo: payload.ramo.trim(),
                    pipeline_status: status,
                    estimated_value: payload.valor_estimado,
                    next_contact_date: payload.proximo_contato,
                    notes: payload.notas.as_deref(),
                    contact_name: payload.contato_nome.as_deref(),
                    contact_tax_id: payload.contato_cpf_cnpj.as_deref(),
                    contact_email: payload.contato_email.as_deref(),
                    contact_phone: payload.contato_telefone.as_deref(),
                },
            )
            .await?;

        tx.commit().await?;
        Ok(quote)
    }

    pub async fn get_quote<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        quote_id: Uuid,
    ) -> Result<Quote, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.quote_repo
            .find_by_id(executor, tenant_id, quote_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound(format!("Cotação {}", quote_id)))
    }

    pub async fn list_quotes<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        status: Option<&str>,
    ) -> Result<Vec<Quote>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.quote_repo.list_quotes(executor, tenant_id, status).await
    }

    /// Move a cotação de fase.
    ///
    /// Tudo acontece numa transação com a linha da cotação travada: em "won"
    /// o upsert do cliente, o vínculo, a mudança de status e o histórico
    /// são confirmados juntos ou nada é gravado.
    pub async fn change_status<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        user_id: Uuid,
        quote_id: Uuid,
        change: &StatusChange,
    ) -> Result<Quote, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let quote = self
            .quote_repo
            .find_for_update(&mut *tx, tenant_id, quote_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound(format!("Cotação {}", quote_id)))?;

        let phases = self.pipeline_repo.list_phases(&mut *tx, tenant_id).await?;

        let linked = match (change.target.as_str(), quote.client_id) {
            (WON_KEY, Some(client_id)) => {
                self.client_repo.find_by_id(&mut *tx, tenant_id, client_id).await?
            }
            _ => None,
        };

        let plan = plan_transition(&quote, &phases, change, linked.as_ref())?;

        let target = match &plan {
            TransitionPlan::Unchanged => return Ok(quote),
            TransitionPlan::Move => change.target.as_str(),
            TransitionPlan::Lose { .. } => LOST_KEY,
            TransitionPlan::Win { .. } => WON_KEY,
        };
        self.lock_target_phase(&mut *tx, tenant_id, target).await?;

        let (updated, loss_reason, notes, client_id) = match plan {
            TransitionPlan::Unchanged => return Ok(quote),
            TransitionPlan::Move => {
                let updated = self
                    .quote_repo
                    .update_status(&mut *tx, tenant_id, quote_id, &change.target, None, None, None)
                    .await?;
                (updated, None, change.notes.clone(), None)
            }
            TransitionPlan::Lose { reason, notes } => {
                let updated = self
                    .quote_repo
                    .update_status(
                        &mut *tx,
                        tenant_id,
                        quote_id,
                        LOST_KEY,
                        None,
                        Some(reason),
                        notes.as_deref(),
                    )
                    .await?;
                (updated, Some(reason), notes, None)
            }
            TransitionPlan::Win { client } => {
                let client = self
                    .client_repo
                    .upsert_by_tax_id(
                        &mut *tx,
                        tenant_id,
                        &client.name,
                        &client.tax_id,
                        client.email.as_deref(),
                        client.phone.as_deref(),
                    )
                    .await?;
                let updated = self
                    .quote_repo
                    .update_status(&mut *tx, tenant_id, quote_id, WON_KEY, Some(client.id), None, None)
                    .await?;
                (updated, None, change.notes.clone(), Some(client.id))
            }
        };

        if quote.pipeline_status != updated.pipeline_status {
            self.quote_repo
                .insert_transition(
                    &mut *tx,
                    tenant_id,
                    NewTransition {
                        quote_id,
                        from_status: &quote.pipeline_status,
                        to_status: &updated.pipeline_status,
                        loss_reason,
                        notes: notes.as_deref(),
                        client_id,
                        user_id,
                    },
                )
                .await?;
        }

        tx.commit().await?;

        tracing::info!(
            "🔀 Cotação {} movida de '{}' para '{}'",
            quote_id,
            quote.pipeline_status,
            updated.pipeline_status
        );
        Ok(updated)
    }

    /// Segura a fase de destino até o commit; se ela sumiu nesse meio tempo, a mudança é recusada.
    async fn lock_target_phase(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        key: &str,
    ) -> Result<(), AppError> {
        self.pipeline_repo
            .lock_phase_by_key(&mut *conn, tenant_id, key)
            .await?
            .ok_or_else(|| AppError::UnknownPhase(key.to_string()))?;
        Ok(())
    }

    /// Rascunho pré-preenchido para o modal de "ganho"
    pub async fn draft_for_quote(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        quote_id: Uuid,
    ) -> Result<ClientDraft, AppError> {
        let quote = self.get_quote(&mut *conn, tenant_id, quote_id).await?;
        let linked = match quote.client_id {
            Some(client_id) => self.client_repo.find_by_id(&mut *conn, tenant_id, client_id).await?,
            None => None,
        };

        Ok(merge_draft(None, &quote, linked.as_ref()))
    }

    pub async fn schedule_follow_up<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        quote_id: Uuid,
        next_contact_date: NaiveDate,
        notes: Option<&str>,
    ) -> Result<Quote, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.quote_repo
            .schedule_follow_up(executor, tenant_id, quote_id, next_contact_date, notes)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound(format!("Cotação {}", quote_id)))
    }

    pub async fn list_due_follow_ups<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        until: NaiveDate,
    ) -> Result<Vec<Quote>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.quote_repo
            .list_due_follow_ups(executor, tenant_id, until, &[WON_KEY, LOST_KEY])
            .await
    }

    pub async fn history(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        quote_id: Uuid,
    ) -> Result<Vec<QuoteTransition>, AppError> {
        self.get_quote(&mut *conn, tenant_id, quote_id).await?;
        self.quote_repo.list_transitions(&mut *conn, tenant_id, quote_id).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::services::pipeline_service::tests::phase;
    use crate::{common::db_utils::get_rls_connection, test_support};
    use chrono::Utc;

    pub(crate) fn quote_in(status: &str) -> Quote {
        Quote {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            client_id: None,
            ramo: "Automóvel".to_string(),
            pipeline_status: status.to_string(),
            estimated_value: None,
            next_contact_date: None,
            notes: None,
            loss_reason: None,
            loss_notes: None,
            contact_name: None,
            contact_tax_id: None,
            contact_email: None,
            contact_phone: None,
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub(crate) fn default_phases() -> Vec<PipelinePhase> {
        vec![
            phase("new", 1, true),
            phase("contacted", 2, false),
            phase("quoting", 3, false),
            phase("won", 4, true),
            phase("lost", 5, true),
        ]
    }

    fn change_to(target: &str) -> StatusChange {
        StatusChange { target: target.to_string(), ..Default::default() }
    }

    fn linked_client() -> Client {
        Client {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            name: "Cliente Antigo".to_string(),
            tax_id: "98765432100".to_string(),
            email: Some("antigo@email.com".to_string()),
            phone: None,
            active: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn tax_id_is_reduced_to_digits() {
        assert_eq!(normalize_tax_id("123.456.789-00").as_deref(), Some("12345678900"));
        assert_eq!(normalize_tax_id("12.345.678/0001-90").as_deref(), Some("12345678000190"));
        assert_eq!(normalize_tax_id("1234"), None);
        assert_eq!(normalize_tax_id(""), None);
    }

    #[test]
    fn moving_to_lost_requires_a_reason() {
        let quote = quote_in("quoting");
        let result = plan_transition(&quote, &default_phases(), &change_to("lost"), None);
        assert!(matches!(result, Err(AppError::LossReasonRequired)));
    }

    #[test]
    fn lost_keeps_reason_and_trimmed_notes() {
        let quote = quote_in("quoting");
        let change = StatusChange {
            loss_reason: Some(LossReason::Price),
            notes: Some("  achou caro  ".to_string()),
            ..change_to("lost")
        };

        let plan = plan_transition(&quote, &default_phases(), &change, None).unwrap();
        assert_eq!(
            plan,
            TransitionPlan::Lose { reason: LossReason::Price, notes: Some("achou caro".to_string()) }
        );
    }

    #[test]
    fn won_normalizes_the_submitted_draft() {
        let quote = quote_in("quoting");
        let change = StatusChange {
            client_draft: Some(ClientDraft {
                name: Some("Jane Doe".to_string()),
                tax_id: Some("123.456.789-00".to_string()),
                ..Default::default()
            }),
            ..change_to("won")
        };

        let plan = plan_transition(&quote, &default_phases(), &change, None).unwrap();
        assert_eq!(
            plan,
            TransitionPlan::Win {
                client: ResolvedClient {
                    name: "Jane Doe".to_string(),
                    tax_id: "12345678900".to_string(),
                    email: None,
                    phone: None,
                }
            }
        );
    }

    #[test]
    fn won_without_any_client_data_is_rejected() {
        let quote = quote_in("proposal");
        let result = plan_transition(&quote, &default_phases(), &change_to("won"), None);
        assert!(matches!(result, Err(AppError::ClientDraftRequired)));
    }

    #[test]
    fn won_with_malformed_tax_id_is_rejected() {
        let quote = quote_in("quoting");
        let change = StatusChange {
            client_draft: Some(ClientDraft {
                name: Some("Jane Doe".to_string()),
                tax_id: Some("123".to_string()),
                ..Default::default()
            }),
            ..change_to("won")
        };
        assert!(matches!(
            plan_transition(&quote, &default_phases(), &change, None),
            Err(AppError::InvalidTaxId)
        ));
    }

    #[test]
    fn draft_falls_back_to_quote_contact_then_linked_client() {
        let mut quote = quote_in("quoting");
        quote.contact_name = Some("Contato da Cotação".to_string());
        quote.contact_phone = Some("(11) 98888-7777".to_string());
        let client = linked_client();

        let draft = ClientDraft { email: Some("novo@email.com".to_string()), ..Default::default() };
        let merged = merge_draft(Some(&draft), &quote, Some(&client));

        assert_eq!(merged.name.as_deref(), Some("Contato da Cotação"));
        assert_eq!(merged.tax_id.as_deref(), Some("98765432100"));
        assert_eq!(merged.email.as_deref(), Some("novo@email.com"));
        assert_eq!(merged.phone.as_deref(), Some("(11) 98888-7777"));
    }

    #[test]
    fn blank_draft_fields_do_not_shadow_fallbacks() {
        let mut quote = quote_in("quoting");
        quote.contact_name = Some("Maria".to_string());

        let draft = ClientDraft { name: Some("   ".to_string()), ..Default::default() };
        assert_eq!(merge_draft(Some(&draft), &quote, None).name.as_deref(), Some("Maria"));
    }

    #[test]
    fn unknown_target_is_rejected() {
        let quote = quote_in("quoting");
        assert!(matches!(
            plan_transition(&quote, &default_phases(), &change_to("negotiating"), None),
            Err(AppError::UnknownPhase(key)) if key == "negotiating"
        ));
    }

    #[test]
    fn same_phase_move_is_a_no_op() {
        let quote = quote_in("quoting");
        let plan = plan_transition(&quote, &default_phases(), &change_to("quoting"), None).unwrap();
        assert_eq!(plan, TransitionPlan::Unchanged);

        let plan = plan_transition(&quote, &default_phases(), &change_to("contacted"), None).unwrap();
        assert_eq!(plan, TransitionPlan::Move);
    }

    #[test]
    fn stale_version_is_a_conflict() {
        let mut quote = quote_in("quoting");
        quote.version = 4;
        let change = StatusChange { expected_version: Some(3), ..change_to("contacted") };

        assert!(matches!(
            plan_transition(&quote, &default_phases(), &change, None),
            Err(AppError::VersionConflict { current: 4 })
        ));
    }

    #[test]
    fn new_quotes_enter_the_first_open_phase() {
        let phases = vec![phase("won", 1, true), phase("triagem", 2, false), phase("new", 3, true)];
        assert_eq!(entry_phase_key(&phases), "triagem");
        assert_eq!(entry_phase_key(&[]), NEW_KEY);
    }

    // =========================================================================
    //  Com banco (DATABASE_URL)
    // =========================================================================

    pub(crate) fn new_quote(ramo: &str) -> NewQuotePayload {
        NewQuotePayload {
            cliente_id: None,
            ramo: ramo.to_string(),
            valor_estimado: None,
            proximo_contato: None,
            notas: None,
            contato_nome: Some("Maria da Silva".to_string()),
            contato_cpf_cnpj: None,
            contato_email: None,
            contato_telefone: None,
        }
    }

    fn win_as(name: &str, tax_id: &str) -> StatusChange {
        StatusChange {
            target: WON_KEY.to_string(),
            client_draft: Some(ClientDraft {
                name: Some(name.to_string()),
                tax_id: Some(tax_id.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    async fn clients_with_tax_id(conn: &mut PgConnection, tenant_id: Uuid, tax_id: &str) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM clients WHERE tenant_id = $1 AND tax_id = $2")
            .bind(tenant_id)
            .bind(tax_id)
            .fetch_one(conn)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn won_retry_keeps_one_client_per_tax_id() {
        let Some(state) = test_support::app_state().await else { return };
        let (user_id, tenant_id) = test_support::broker(&state).await;
        let mut conn = get_rls_connection(&state.db_pool, tenant_id, user_id).await.unwrap();
        let service = &state.quote_service;

        let first = service.create_quote(&mut *conn, tenant_id, &new_quote("Automóvel")).await.unwrap();
        let second = service.create_quote(&mut *conn, tenant_id, &new_quote("Residencial")).await.unwrap();

        let won = service
            .change_status(&mut *conn, tenant_id, user_id, first.id, &win_as("Maria da Silva", "123.456.789-09"))
            .await
            .unwrap();
        // mesmo pedido reenviado (duplo clique no modal)
        let retried = service
            .change_status(&mut *conn, tenant_id, user_id, first.id, &win_as("Maria da Silva", "123.456.789-09"))
            .await
            .unwrap();
        let other = service
            .change_status(&mut *conn, tenant_id, user_id, second.id, &win_as("Maria Silva", "12345678909"))
            .await
            .unwrap();

        assert!(won.client_id.is_some());
        assert_eq!(retried.client_id, won.client_id);
        assert_eq!(other.client_id, won.client_id);
        assert_eq!(clients_with_tax_id(&mut *conn, tenant_id, "12345678909").await, 1);

        let history = service.history(&mut *conn, tenant_id, first.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].to_status, WON_KEY);
    }

    #[tokio::test]
    async fn failed_client_upsert_leaves_the_quote_untouched() {
        let Some(state) = test_support::app_state().await else { return };
        let (user_id, tenant_id) = test_support::broker(&state).await;
        let mut conn = get_rls_connection(&state.db_pool, tenant_id, user_id).await.unwrap();
        let service = &state.quote_service;

        let quote = service.create_quote(&mut *conn, tenant_id, &new_quote("Vida")).await.unwrap();

        // nome acima do limite da tabela de clientes: o upsert falha no banco
        let too_long = "M".repeat(300);
        let result = service
            .change_status(&mut *conn, tenant_id, user_id, quote.id, &win_as(&too_long, "98765432100"))
            .await;
        assert!(matches!(result, Err(AppError::DatabaseError(_))));

        let reloaded = service.get_quote(&mut *conn, tenant_id, quote.id).await.unwrap();
        assert_eq!(reloaded.pipeline_status, quote.pipeline_status);
        assert_eq!(reloaded.client_id, None);
        assert_eq!(reloaded.version, quote.version);
        assert!(service.history(&mut *conn, tenant_id, quote.id).await.unwrap().is_empty());
        assert_eq!(clients_with_tax_id(&mut *conn, tenant_id, "98765432100").await, 0);
    }

    #[tokio::test]
    async fn deleting_a_phase_waits_for_a_pending_move_into_it() {
        let Some(state) = test_support::app_state().await else { return };
        let (user_id, tenant_id) = test_support::broker(&state).await;
        let mut conn = get_rls_connection(&state.db_pool, tenant_id, user_id).await.unwrap();

        let quote = state.quote_service.create_quote(&mut *conn, tenant_id, &new_quote("Vida")).await.unwrap();
        let phases = state.pipeline_service.list_phases(&mut *conn, tenant_id).await.unwrap();
        let proposal_id = phases.iter().find(|p| p.key == "proposal").unwrap().id;

        // Mudança para "proposal" em andamento, do jeito que change_status faz
        let mut tx = (&mut *conn).begin().await.unwrap();
        PipelineRepository::new()
            .lock_phase_by_key(&mut *tx, tenant_id, "proposal")
            .await
            .unwrap()
            .unwrap();
        QuoteRepository::new()
            .update_status(&mut *tx, tenant_id, quote.id, "proposal", None, None, None)
            .await
            .unwrap();

        let deleter = state.clone();
        let delete = tokio::spawn(async move {
            let mut conn = get_rls_connection(&deleter.db_pool, tenant_id, user_id).await?;
            deleter.pipeline_service.delete_phase(&mut *conn, tenant_id, proposal_id).await
        });

        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        assert!(!delete.is_finished());

        tx.commit().await.unwrap();

        let result = delete.await.unwrap();
        assert!(matches!(&result, Err(AppError::PhaseInUse { key, count: 1 }) if key == "proposal"));
    }

    #[tokio::test]
    async fn moving_into_a_removed_phase_is_refused() {
        let Some(state) = test_support::app_state().await else { return };
        let (user_id, tenant_id) = test_support::broker(&state).await;
        let mut conn = get_rls_connection(&state.db_pool, tenant_id, user_id).await.unwrap();

        let quote = state.quote_service.create_quote(&mut *conn, tenant_id, &new_quote("Vida")).await.unwrap();
        let phases = state.pipeline_service.list_phases(&mut *conn, tenant_id).await.unwrap();
        let quoting_id = phases.iter().find(|p| p.key == "quoting").unwrap().id;
        state.pipeline_service.delete_phase(&mut *conn, tenant_id, quoting_id).await.unwrap();

        let result = state
            .quote_service
            .change_status(&mut *conn, tenant_id, user_id, quote.id, &change_to("quoting"))
            .await;
        assert!(matches!(&result, Err(AppError::UnknownPhase(key)) if key == "quoting"));
    }
}
