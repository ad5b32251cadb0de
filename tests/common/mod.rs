#![allow(dead_code)]

use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use copiloto::backend_client::SupabaseClient;
use copiloto::config::Config;
use copiloto::handlers::AppState;
use copiloto::kv_store::{KvStore, MemoryKvStore};
use copiloto::models::{Role, Seller};
use copiloto::session::{Session, SessionManager};
use copiloto::user_data::UserDataCache;

pub fn create_test_config(supabase_url: String) -> Config {
    Config {
        supabase_url,
        supabase_anon_key: "test_anon_key".to_string(),
        port: 8080,
        data_dir: PathBuf::from("/tmp/copiloto-test"),
        backend_timeout_secs: 5,
    }
}

pub fn backend(uri: &str) -> SupabaseClient {
    SupabaseClient::new(
        uri.to_string(),
        "test_anon_key".to_string(),
        Duration::from_secs(5),
    )
    .expect("client")
}

pub fn session(role: Role) -> Session {
    Session {
        token: "test-session".to_string(),
        user: Seller {
            id: "user-1".to_string(),
            codigo_vendedor: "V001".to_string(),
            nome: "Ana Souza".to_string(),
            email: Some("ana@otica.com.br".to_string()),
            role,
            gerente_codigo: Some("G01".to_string()),
        },
        access_token: "user-jwt".to_string(),
        created_at: Utc::now(),
    }
}

pub fn app_state(uri: &str, store: Arc<MemoryKvStore>) -> Arc<AppState> {
    let backend = backend(uri);
    let store: Arc<dyn KvStore> = store;
    Arc::new(AppState {
        config: create_test_config(uri.to_string()),
        sessions: SessionManager::new(backend.clone(), store.clone()),
        user_data: UserDataCache::new(backend.clone(), store),
        backend,
    })
}
