// src/services/board_service.rs

use std::collections::{BTreeSet, HashMap};

use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::QuoteRepository,
    models::{
        pipeline::{BoardColumn, BoardOptions, ColumnKind, PipelineBoard, PipelinePhase, LOST_KEY, WON_KEY},
        quote::Quote,
    },
    services::pipeline_service::PipelineService,
};

fn column(kind: ColumnKind, mut quotes: Vec<Quote>) -> BoardColumn {
    quotes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    let total_estimated = quotes.iter().filter_map(|q| q.estimated_value).sum::<Decimal>();

    BoardColumn {
        kind,
        count: quotes.len(),
        total_estimated,
        quotes,
    }
}

/// Agrupa as cotações nas colunas do kanban.
///
/// Uma coluna por fase visível, em ordem crescente. Status que não batem com
/// nenhuma fase vão para a coluna `unknown` (só emitida quando não vazia);
/// cotações de fases ocultas ficam de fora.
pub fn build_board(phases: &[PipelinePhase], quotes: Vec<Quote>, options: BoardOptions) -> PipelineBoard {
    let mut ordered: Vec<&PipelinePhase> = phases.iter().collect();
    ordered.sort_by_key(|p| p.order);

    let hidden = |key: &str| (key == WON_KEY && !options.show_won) || (key == LOST_KEY && !options.show_lost);

    // chave -> índice da coluna, montado uma vez só
    let index: HashMap<&str, usize> =
        ordered.iter().enumerate().map(|(i, p)| (p.key.as_str(), i)).collect();

    let mut buckets: Vec<Vec<Quote>> = vec![Vec::new(); ordered.len()];
    let mut unknown: Vec<Quote> = Vec::new();

    for quote in quotes {
        match index.get(quote.pipeline_status.as_str()) {
            Some(&i) => buckets[i].push(quote),
            None => unknown.push(quote),
        }
    }

    let mut columns: Vec<BoardColumn> = ordered
        .into_iter()
        .zip(buckets)
        .filter(|(phase, _)| !hidden(&phase.key))
        .map(|(phase, quotes)| column(ColumnKind::Phase { phase: phase.clone() }, quotes))
        .collect();

    if !unknown.is_empty() {
        let status_keys: BTreeSet<String> = unknown.iter().map(|q| q.pipeline_status.clone()).collect();
        tracing::warn!("⚠️ {} cotações com status fora do funil: {:?}", unknown.len(), status_keys);
        columns.push(column(
            ColumnKind::Unknown { status_keys: status_keys.into_iter().collect() },
            unknown,
        ));
    }

    let total_quotes = columns.iter().map(|c| c.count).sum();
    PipelineBoard { columns, total_quotes }
}

#[derive(Clone)]
pub struct BoardService {
    pipeline_service: PipelineService,
    quote_repo: QuoteRepository,
}

impl BoardService {
    pub fn new(pipeline_service: PipelineService, quote_repo: QuoteRepository) -> Self {
        Self { pipeline_service, quote_repo }
    }

    pub async fn load_board(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        options: BoardOptions,
    ) -> Result<PipelineBoard, AppError> {
        let phases = self.pipeline_service.list_phases(&mut *conn, tenant_id).await?;
        let quotes = self.quote_repo.list_quotes(&mut *conn, tenant_id, None).await?;

        Ok(build_board(&phases, quotes, options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{pipeline_service::tests::phase, quote_service::tests::quote_in};
    use chrono::{Duration, Utc};

    fn phases() -> Vec<PipelinePhase> {
        // fora de ordem de propósito
        vec![
            phase("won", 4, true),
            phase("new", 1, true),
            phase("quoting", 2, false),
            phase("proposal", 3, false),
            phase("lost", 5, true),
        ]
    }

    fn phase_keys(board: &PipelineBoard) -> Vec<String> {
        board
            .columns
            .iter()
            .map(|c| match &c.kind {
                ColumnKind::Phase { phase } => phase.key.clone(),
                ColumnKind::Unknown { .. } => "?".to_string(),
            })
            .collect()
    }

    fn dec(value: i64) -> Decimal {
        Decimal::from(value)
    }

    fn valued(status: &str, value: i64) -> Quote {
        let mut quote = quote_in(status);
        quote.estimated_value = Some(dec(value));
        quote
    }

    #[test]
    fn one_column_per_phase_in_ascending_order() {
        let board = build_board(&phases(), vec![], BoardOptions::default());
        assert_eq!(phase_keys(&board), vec!["new", "quoting", "proposal", "won", "lost"]);
        assert_eq!(board.total_quotes, 0);
        assert!(board.columns.iter().all(|c| c.count == 0 && c.total_estimated.is_zero()));
    }

    #[test]
    fn quotes_land_in_their_phase_with_totals() {
        let quotes = vec![valued("quoting", 1000), valued("quoting", 250), quote_in("new")];
        let board = build_board(&phases(), quotes, BoardOptions::default());

        let quoting = &board.columns[1];
        assert_eq!(quoting.count, 2);
        assert_eq!(quoting.total_estimated, dec(1250));
        assert_eq!(board.columns[0].count, 1);
        assert_eq!(board.total_quotes, 3);
    }

    #[test]
    fn unknown_status_gets_its_own_column() {
        let quotes = vec![quote_in("negotiating"), quote_in("negotiating"), quote_in("archived"), quote_in("new")];
        let board = build_board(&phases(), quotes, BoardOptions::default());

        let last = board.columns.last().unwrap();
        match &last.kind {
            ColumnKind::Unknown { status_keys } => {
                assert_eq!(status_keys, &vec!["archived".to_string(), "negotiating".to_string()])
            }
            other => panic!("esperava coluna unknown, veio {:?}", other),
        }
        assert_eq!(last.count, 3);
        assert_eq!(board.total_quotes, 4);
    }

    #[test]
    fn hidden_terminal_columns_omit_their_quotes() {
        let quotes = vec![quote_in("won"), quote_in("lost"), quote_in("quoting")];
        let options = BoardOptions { show_won: false, show_lost: false };
        let board = build_board(&phases(), quotes, options);

        assert_eq!(phase_keys(&board), vec!["new", "quoting", "proposal"]);
        assert_eq!(board.total_quotes, 1);
    }

    #[test]
    fn most_recently_updated_first() {
        let mut older = quote_in("quoting");
        older.updated_at = Utc::now() - Duration::days(2);
        let newer = quote_in("quoting");
        let newer_id = newer.id;

        let board = build_board(&phases(), vec![older, newer], BoardOptions::default());
        assert_eq!(board.columns[1].quotes[0].id, newer_id);
    }
}
