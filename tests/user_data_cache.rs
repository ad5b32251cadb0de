/// Per-seller cached bundle: first load fans out to the backend, later loads
/// hydrate from the store, refresh overwrites and clear drops it.
mod common;

use std::sync::Arc;

use common::{backend, session};
use copiloto::cache_validator;
use copiloto::core::user_data::UserDataCache;
use copiloto::kv_store::{bundle_key, KvStore, MemoryKvStore};
use copiloto::models::{Role, UserDataBundle};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_views(mock_server: &MockServer, failing: Option<&str>, expected_calls: u64) {
    let views = [
        (
            "vw_clientes_completo",
            json!([
                { "codigo_cliente": "C1", "nome_fantasia": "Ótica Sol", "limite_credito": 1234.56, "percentual_atingimento": 0.1 },
                { "codigo_cliente": "C2", "nome_fantasia": "Ótica Lua", "rota": "Rota Sul", "valor_oportunidade": 0.3 }
            ]),
        ),
        (
            "vw_ranking_rotas",
            json!([{ "rota": "Rota Sul", "vendido": 1e6 / 3.0, "ranking": 1 }]),
        ),
        (
            "vw_cidades",
            json!([{ "cidade": "Campinas", "rota": "Rota Sul", "ativos": 3 }]),
        ),
        (
            "vw_vendas_mensais",
            json!([{ "mes": "2026-09", "valor": 18000.75, "meta": 20000 }]),
        ),
        (
            "vw_titulos_abertos",
            json!([{ "codigo_cliente": "C2", "valor": 450.1, "dias_atraso": 35, "vencimento": "2026-09-13" }]),
        ),
    ];

    for (view, body) in views {
        let response = if failing == Some(view) {
            ResponseTemplate::new(503).set_body_string("unavailable")
        } else {
            ResponseTemplate::new(200).set_body_json(body)
        };
        Mock::given(method("GET"))
            .and(path(format!("/rest/v1/{}", view)))
            .respond_with(response)
            .expect(expected_calls)
            .mount(mock_server)
            .await;
    }
}

#[tokio::test]
async fn test_first_load_fetches_then_hydrates_from_store() {
    let mock_server = MockServer::start().await;
    mount_views(&mock_server, None, 1).await;

    let store = Arc::new(MemoryKvStore::new());
    let s = session(Role::Representante);

    let first = UserDataCache::new(backend(&mock_server.uri()), store.clone())
        .load(&s)
        .await
        .unwrap();
    assert_eq!(first.clientes.len(), 2);
    assert!(!first.is_partial());

    // A fresh cache (new process) hydrates from the store without backend calls
    let second = UserDataCache::new(backend(&mock_server.uri()), store.clone())
        .load(&s)
        .await
        .unwrap();
    assert_eq!(*second, *first);
}

#[tokio::test]
async fn test_store_roundtrip_is_lossless() {
    let mock_server = MockServer::start().await;
    mount_views(&mock_server, None, 1).await;

    let store = Arc::new(MemoryKvStore::new());
    let s = session(Role::Representante);
    let loaded = UserDataCache::new(backend(&mock_server.uri()), store.clone())
        .load(&s)
        .await
        .unwrap();

    let stored = store.get(&bundle_key("V001")).await.unwrap().unwrap();
    let reopened: UserDataBundle = cache_validator::open(&stored).unwrap();

    assert_eq!(reopened, *loaded);
    assert_eq!(
        serde_json::to_string(&reopened).unwrap(),
        serde_json::to_string(loaded.as_ref()).unwrap()
    );
}

#[tokio::test]
async fn test_failed_slice_defaults_to_empty_and_is_reported() {
    let mock_server = MockServer::start().await;
    mount_views(&mock_server, Some("vw_cidades"), 1).await;

    let cache = UserDataCache::new(backend(&mock_server.uri()), Arc::new(MemoryKvStore::new()));
    let bundle = cache.load(&session(Role::Representante)).await.unwrap();

    assert!(bundle.cidades.is_empty());
    assert_eq!(bundle.falhas, vec!["cidades".to_string()]);
    assert_eq!(bundle.rotas.len(), 1);
    assert_eq!(bundle.titulos[0].dias_atraso, 35);
}

#[tokio::test]
async fn test_refresh_refetches_and_clear_drops() {
    let mock_server = MockServer::start().await;
    mount_views(&mock_server, None, 2).await;

    let store = Arc::new(MemoryKvStore::new());
    let cache = UserDataCache::new(backend(&mock_server.uri()), store.clone());
    let s = session(Role::Representante);

    let first = cache.load(&s).await.unwrap();
    let refreshed = cache.refresh(&s).await.unwrap();
    assert!(refreshed.carregado_em >= first.carregado_em);

    cache.clear(&s).await.unwrap();
    assert_eq!(store.get(&bundle_key("V001")).await.unwrap(), None);
}

#[tokio::test]
async fn test_tampered_blob_is_refetched() {
    let mock_server = MockServer::start().await;
    mount_views(&mock_server, None, 1).await;

    let store = Arc::new(MemoryKvStore::new());
    store
        .set(&bundle_key("V001"), "{\"data\":\"{}\",\"checksum\":\"deadbeef\"}")
        .await
        .unwrap();

    let cache = UserDataCache::new(backend(&mock_server.uri()), store.clone());
    let bundle = cache.load(&session(Role::Representante)).await.unwrap();

    assert_eq!(bundle.clientes.len(), 2);
}
