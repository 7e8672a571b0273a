// src/test_support.rs

// Testes com Postgres de verdade: usam DATABASE_URL (ou o .env).
// Sem banco configurado, o teste avisa e retorna sem checar nada.

use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use crate::{
    config::{AppState, Config},
    db::{TenantRepository, UserRepository},
};

pub(crate) async fn app_state() -> Option<AppState> {
    dotenvy::dotenv().ok();
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL não definida: teste de banco ignorado");
        return None;
    };

    let config = Config::from_lookup(|key| match key {
        "DATABASE_URL" => Some(database_url.clone()),
        "JWT_SECRET" => Some("segredo-de-teste".to_string()),
        _ => None,
    })
    .unwrap();

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .unwrap();
    sqlx::migrate!().run(&pool).await.unwrap();

    Some(AppState::from_pool(pool, &config).unwrap())
}

/// Usuário novo, dono de uma corretora nova com as fases padrão.
pub(crate) async fn broker(state: &AppState) -> (Uuid, Uuid) {
    let user_id = new_user(state).await;
    let tenant = state
        .tenant_service
        .create_tenant_with_owner(&format!("Corretora {}", Uuid::new_v4()), None, user_id)
        .await
        .unwrap();
    (user_id, tenant.id)
}

/// Corretora criada sem passar pelo serviço: nenhuma fase cadastrada.
pub(crate) async fn bare_broker(state: &AppState) -> (Uuid, Uuid) {
    let user_id = new_user(state).await;
    let repo = TenantRepository::new(state.db_pool.clone());
    let tenant = repo
        .create_tenant(&state.db_pool, "Corretora sem funil", None)
        .await
        .unwrap();
    repo.add_member(&state.db_pool, tenant.id, user_id).await.unwrap();
    (user_id, tenant.id)
}

async fn new_user(state: &AppState) -> Uuid {
    let email = format!("teste-{}@corretora.dev", Uuid::new_v4());
    UserRepository::new(state.db_pool.clone())
        .create_user(&state.db_pool, &email, "hash-de-teste")
        .await
        .unwrap()
        .id
}
