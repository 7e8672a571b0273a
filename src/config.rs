// src/config.rs

use crate::{
    common::i18n::I18nStore,
    db::{ClientRepository, PipelineRepository, PortfolioRepository, QuoteRepository, TenantRepository, UserRepository},
    services::{
        auth::{AuthService, SessionRegistry},
        board_service::BoardService,
        client_service::ClientService,
        pipeline_service::PipelineService,
        portfolio_service::PortfolioService,
        quote_service::QuoteService,
        tenancy_service::TenantService,
    },
};
use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{env, time::Duration};

// ---
// Configuração lida do ambiente (.env)
// ---
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub jwt_expiration_hours: i64,
    pub cors_allowed_origin: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Monta a configuração a partir de qualquer fonte chave -> valor
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).with_context(|| format!("{} deve ser definida", key));

        fn parsed<T: std::str::FromStr>(value: Option<String>, key: &str, default: T) -> anyhow::Result<T>
        where
            T::Err: std::fmt::Display,
        {
            match value {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map_err(|e| anyhow::anyhow!("{} inválida ({}): {}", key, raw, e)),
                None => Ok(default),
            }
        }

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            server_addr: lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            max_connections: parsed(lookup("DATABASE_MAX_CONNECTIONS"), "DATABASE_MAX_CONNECTIONS", 10)?,
            acquire_timeout_secs: parsed(lookup("DATABASE_ACQUIRE_TIMEOUT_SECS"), "DATABASE_ACQUIRE_TIMEOUT_SECS", 3)?,
            jwt_expiration_hours: parsed(lookup("JWT_EXPIRATION_HOURS"), "JWT_EXPIRATION_HOURS", 168)?,
            cors_allowed_origin: lookup("CORS_ALLOWED_ORIGIN").filter(|origin| !origin.trim().is_empty()),
        })
    }
}

// O estado compartilhado que será acessível em toda a aplicação
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub i18n_store: I18nStore,
    pub auth_service: AuthService,
    pub tenant_service: TenantService,
    pub pipeline_service: PipelineService,
    pub quote_service: QuoteService,
    pub board_service: BoardService,
    pub client_service: ClientService,
    pub portfolio_service: PortfolioService,
}

impl AppState {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        Self::from_pool(db_pool, config)
    }

    /// Monta o gráfico de dependências sobre uma pool já criada
    pub fn from_pool(db_pool: PgPool, config: &Config) -> anyhow::Result<Self> {
        let i18n_store = I18nStore::load()?;

        let pipeline_repo = PipelineRepository::new();
        let quote_repo = QuoteRepository::new();
        let client_repo = ClientRepository::new();
        let portfolio_repo = PortfolioRepository::new();

        let auth_service = AuthService::new(
            UserRepository::new(db_pool.clone()),
            config.jwt_secret.clone(),
            chrono::Duration::hours(config.jwt_expiration_hours),
            SessionRegistry::new(),
            db_pool.clone(),
        );
        let pipeline_service = PipelineService::new(pipeline_repo.clone());
        let tenant_service = TenantService::new(
            TenantRepository::new(db_pool.clone()),
            pipeline_service.clone(),
            db_pool.clone(),
        );
        let quote_service = QuoteService::new(quote_repo.clone(), pipeline_repo, client_repo.clone());
        let board_service = BoardService::new(pipeline_service.clone(), quote_repo.clone());
        let client_service = ClientService::new(client_repo.clone(), portfolio_repo.clone(), quote_repo);
        let portfolio_service = PortfolioService::new(portfolio_repo, client_repo);

        Ok(Self {
            db_pool,
            i18n_store,
            auth_service,
            tenant_service,
            pipeline_service,
            quote_service,
            board_service,
            client_service,
            portfolio_service,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_optional_vars_are_missing() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/corretora"),
            ("JWT_SECRET", "segredo"),
        ]))
        .unwrap();

        assert_eq!(config.server_addr, "0.0.0.0:3000");
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.acquire_timeout_secs, 3);
        assert_eq!(config.jwt_expiration_hours, 168);
        assert_eq!(config.cors_allowed_origin, None);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/corretora"),
            ("JWT_SECRET", "segredo"),
            ("SERVER_ADDR", "127.0.0.1:8080"),
            ("DATABASE_MAX_CONNECTIONS", " 20 "),
            ("JWT_EXPIRATION_HOURS", "12"),
            ("CORS_ALLOWED_ORIGIN", "http://localhost:5173"),
        ]))
        .unwrap();

        assert_eq!(config.server_addr, "127.0.0.1:8080");
        assert_eq!(config.max_connections, 20);
        assert_eq!(config.jwt_expiration_hours, 12);
        assert_eq!(config.cors_allowed_origin.as_deref(), Some("http://localhost:5173"));
    }

    #[test]
    fn missing_secret_is_an_error() {
        let err = Config::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://localhost/corretora")]))
            .unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn malformed_number_is_an_error() {
        let err = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/corretora"),
            ("JWT_SECRET", "segredo"),
            ("DATABASE_MAX_CONNECTIONS", "muitas"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("DATABASE_MAX_CONNECTIONS"));
    }
}
