/// Full HTTP flow through the router: sign-in, protected pages and sign-out,
/// with the backend mocked.
mod common;

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use copiloto::kv_store::MemoryKvStore;
use copiloto::routes;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_auth(mock_server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "user-jwt",
            "refresh_token": "refresh",
            "user": { "id": "user-1", "email": "ana@otica.com.br" }
        })))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/vendedores"))
        .and(query_param("user_id", "eq.user-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "user_id": "user-1", "codigo_vendedor": "V001", "nome": "Ana Souza", "cargo": "Representante" }
        ])))
        .mount(mock_server)
        .await;
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

async fn login(app: &Router) -> String {
    let request = Request::builder()
        .method("POST")
        .uri("/api/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "email": "Ana@Otica.com.br", "senha": "segredo" }).to_string(),
        ))
        .unwrap();

    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    assert_eq!(body["usuario"]["codigo_vendedor"], "V001");
    assert_eq!(body["usuario"]["role"], "representante");
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_login_then_dashboard() {
    let mock_server = MockServer::start().await;
    mount_auth(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/vw_dashboard_metricas"))
        .and(query_param("codigo_vendedor", "eq.V001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "vendas_mes": 12345, "meta_mes": 20000, "clientes_ativos": 40 }
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/vw_top20_clientes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "codigo_cliente": "C1", "nome_fantasia": "Ótica Sol", "percentual": 80 },
            { "codigo_cliente": "C2", "nome_fantasia": "Ótica Lua", "percentual": 130 }
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/vw_top10_cidades"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    // vw_ranking_rotas is not mounted: the page renders without it

    let store = Arc::new(MemoryKvStore::new());
    let app = routes::app(common::app_state(&mock_server.uri(), store.clone()));
    let token = login(&app).await;
    assert_eq!(store.len().await, 1);

    let (status, body) = send(&app, get("/api/dashboard", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["percentual_meta"], 62);
    assert_eq!(body["percentual_formatado"], "62%");
    assert_eq!(body["vendas_formatado"], "R$ 12.345,00");
    assert_eq!(body["melhor_cliente"]["codigo_cliente"], "C2");
    assert_eq!(body["top_clientes"][1]["posicao"], 2);
    assert_eq!(body["falhas"], json!(["ranking_rotas"]));
}

#[tokio::test]
async fn test_client_detail_goal_risk_threshold() {
    let mock_server = MockServer::start().await;
    mount_auth(&mock_server).await;

    for (code, percentual) in [("C49", 49), ("C50", 50)] {
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/get_cliente_detalhe"))
            .and(body_json(json!({ "p_codigo_cliente": code })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "codigo_cliente": code,
                "nome_fantasia": "Ótica Centro",
                "percentual_atingimento": percentual,
                "dias_sem_compra": 61,
                "credito_disponivel": 1500.5,
                "estrelas": 9
            })))
            .mount(&mock_server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path("/rest/v1/vw_titulos_abertos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "codigo_cliente": "C49", "valor": 100.25, "dias_atraso": 12 },
            { "codigo_cliente": "C49", "valor": 200, "dias_atraso": 0 }
        ])))
        .mount(&mock_server)
        .await;

    let app = routes::app(common::app_state(
        &mock_server.uri(),
        Arc::new(MemoryKvStore::new()),
    ));
    let token = login(&app).await;

    let (status, body) = send(&app, get("/api/cliente/C49", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["indicadores"]["meta_em_risco"], true);
    assert_eq!(body["indicadores"]["titulos_vencidos"], true);
    assert_eq!(body["indicadores"]["sem_compra_recente"], true);
    assert_eq!(body["estrelas"], 5);
    assert_eq!(body["valor_total_formatado"], "R$ 300,25");
    assert_eq!(body["credito_disponivel_formatado"], "R$ 1.500,50");

    let (status, body) = send(&app, get("/api/cliente/C50", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["indicadores"]["meta_em_risco"], false);
}

#[tokio::test]
async fn test_protected_routes_require_session() {
    let mock_server = MockServer::start().await;
    let app = routes::app(common::app_state(
        &mock_server.uri(),
        Arc::new(MemoryKvStore::new()),
    ));

    let request = Request::builder()
        .uri("/api/dashboard")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, get("/api/clientes", "made-up")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_session_survives_restart_and_logout_ends_it() {
    let mock_server = MockServer::start().await;
    mount_auth(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/vw_clientes_completo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "codigo_cliente": "C1", "nome_fantasia": "Óptica São João", "situacao_financeira": "Em dia" },
            { "codigo_cliente": "C2", "nome_fantasia": "Ótica Lua", "situacao_financeira": "Inadimplente" }
        ])))
        .mount(&mock_server)
        .await;

    let store = Arc::new(MemoryKvStore::new());
    let token = login(&routes::app(common::app_state(
        &mock_server.uri(),
        store.clone(),
    )))
    .await;

    // New process, same store
    let app = routes::app(common::app_state(&mock_server.uri(), store.clone()));
    let (status, body) = send(&app, get("/api/clientes?busca=sao%20joao", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["clientes"][0]["codigo_cliente"], "C1");

    let request = Request::builder()
        .method("POST")
        .uri("/api/logout")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, get("/api/sessao", &token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_rejections_carry_form_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant" })))
        .mount(&mock_server)
        .await;

    let app = routes::app(common::app_state(
        &mock_server.uri(),
        Arc::new(MemoryKvStore::new()),
    ));

    let request = |email: &str| {
        Request::builder()
            .method("POST")
            .uri("/api/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "email": email, "senha": "x" }).to_string()))
            .unwrap()
    };

    let (status, body) = send(&app, request("ana@otica.com.br")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "E-mail ou senha inválidos");

    let (status, _) = send(&app, request("not-an-email")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

async fn mount_view(mock_server: &MockServer, view: &str, rows: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/rest/v1/{}", view)))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(mock_server)
        .await;
}

fn open_invoices() -> Value {
    json!([
        { "codigo_cliente": "A", "nome_fantasia": "Ótica Sol", "valor": 100.0, "dias_atraso": 10 },
        { "codigo_cliente": "B", "nome_fantasia": "Ótica Lua", "valor": 50.0, "dias_atraso": 45 },
        { "codigo_cliente": "A", "nome_fantasia": "Ótica Sol", "valor": 25.5, "dias_atraso": 40 },
        { "codigo_cliente": "C", "nome_fantasia": "Ótica Mar", "valor": 10.0, "dias_atraso": 30 }
    ])
}

#[tokio::test]
async fn test_delinquents_totals_come_from_grouped_invoices() {
    let mock_server = MockServer::start().await;
    mount_auth(&mock_server).await;
    mount_view(&mock_server, "vw_titulos_abertos", open_invoices()).await;
    mount_view(
        &mock_server,
        "vw_inadimplentes_resumo",
        json!([{ "total_clientes": 3, "valor_total": 185.503 }]),
    )
    .await;

    let app = routes::app(common::app_state(
        &mock_server.uri(),
        Arc::new(MemoryKvStore::new()),
    ));
    let token = login(&app).await;

    let (status, body) = send(
        &app,
        get(
            "/api/inadimplentes?ordenar=valor_total_titulos&direcao=desc",
            &token,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let resumo = &body["resumo"];
    assert_eq!(resumo["clientes"], 3);
    assert_eq!(resumo["valor_total"], 185.5);
    assert_eq!(resumo["valor_total_formatado"], "R$ 185,50");
    // 30 days exactly is not above 30
    assert_eq!(resumo["acima_30_dias"], 2);
    assert_eq!(resumo["total_resumo"], 185.503);
    assert_eq!(resumo["divergente"], false);

    let rows = body["inadimplentes"].as_array().unwrap();
    assert_eq!(rows[0]["codigo_cliente"], "A");
    assert_eq!(rows[0]["valor_total_titulos"], 125.5);
    assert_eq!(rows[0]["maior_dias_atraso"], 40);
    assert_eq!(rows[0]["titulos"].as_array().unwrap().len(), 2);
    assert_eq!(body["falhas"], json!([]));
}

#[tokio::test]
async fn test_delinquents_flag_diverging_summary() {
    let mock_server = MockServer::start().await;
    mount_auth(&mock_server).await;
    mount_view(&mock_server, "vw_titulos_abertos", open_invoices()).await;
    mount_view(
        &mock_server,
        "vw_inadimplentes_resumo",
        json!([{ "total_clientes": 3, "valor_total": 185.51 }]),
    )
    .await;

    let app = routes::app(common::app_state(
        &mock_server.uri(),
        Arc::new(MemoryKvStore::new()),
    ));
    let token = login(&app).await;

    let (status, body) = send(&app, get("/api/inadimplentes", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resumo"]["valor_total"], 185.5);
    assert_eq!(body["resumo"]["total_resumo"], 185.51);
    assert_eq!(body["resumo"]["divergente"], true);
}

#[tokio::test]
async fn test_delinquents_without_summary_view() {
    let mock_server = MockServer::start().await;
    mount_auth(&mock_server).await;
    mount_view(&mock_server, "vw_titulos_abertos", open_invoices()).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/vw_inadimplentes_resumo"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let app = routes::app(common::app_state(
        &mock_server.uri(),
        Arc::new(MemoryKvStore::new()),
    ));
    let token = login(&app).await;

    let (status, body) = send(&app, get("/api/inadimplentes", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resumo"]["valor_total"], 185.5);
    assert_eq!(body["resumo"]["total_resumo"], Value::Null);
    assert_eq!(body["resumo"]["divergente"], false);
    assert_eq!(body["falhas"], json!(["resumo"]));
}

#[tokio::test]
async fn test_routes_resort_recomputes_positions() {
    let mock_server = MockServer::start().await;
    mount_auth(&mock_server).await;
    mount_view(
        &mock_server,
        "vw_ranking_rotas",
        json!([
            { "rota": "Rota Norte", "meta": 100, "vendido": 10, "ranking": 1 },
            { "rota": "Rota Sul", "meta": 100, "vendido": 90, "ranking": 2 },
            { "rota": "Rota Leste", "meta": 200, "vendido": 50, "ranking": 3 }
        ]),
    )
    .await;
    mount_view(&mock_server, "vw_ranking_vendedores", json!([])).await;

    let app = routes::app(common::app_state(
        &mock_server.uri(),
        Arc::new(MemoryKvStore::new()),
    ));
    let token = login(&app).await;

    let (status, body) = send(&app, get("/api/rotas", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rotas"][0]["rota"], "Rota Norte");
    assert_eq!(body["rotas"][2]["ranking"], 3);
    assert_eq!(body["total_vendido"], 150.0);
    assert_eq!(body["total_meta"], 400.0);
    assert_eq!(body["percentual_geral"], 38);

    let (status, body) = send(&app, get("/api/rotas?ordenar=vendido&direcao=desc", &token)).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["rotas"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["rota"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Rota Sul", "Rota Leste", "Rota Norte"]);
    let positions: Vec<i64> = body["rotas"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["ranking"].as_i64().unwrap())
        .collect();
    assert_eq!(positions, vec![1, 2, 3]);

    let (status, _) = send(&app, get("/api/rotas?ordenar=inexistente", &token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Rejected the same way when the backend returns no rows
    let (status, _) = send(
        &app,
        get("/api/vendedores/ranking?ordenar=inexistente", &token),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cities_totals_follow_filters() {
    let mock_server = MockServer::start().await;
    mount_auth(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/vw_cidades"))
        .and(query_param("rota", "eq.Rota Sul"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "cidade": "Campinas", "rota": "Rota Sul", "ativos": 10, "pendentes": 2, "inativos": 1, "inadimplentes": 3, "oportunidade": 1500.5 },
            { "cidade": "São Carlos", "rota": "Rota Sul", "ativos": 4, "pendentes": 1, "inativos": 0, "inadimplentes": 1, "oportunidade": 250.25 },
            { "cidade": "Sumaré", "rota": "Rota Sul", "ativos": 7, "oportunidade": 99 }
        ])))
        .expect(2)
        .mount(&mock_server)
        .await;

    let app = routes::app(common::app_state(
        &mock_server.uri(),
        Arc::new(MemoryKvStore::new()),
    ));
    let token = login(&app).await;

    let (status, body) = send(&app, get("/api/cidades?rota=Rota%20Sul", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cidades"].as_array().unwrap().len(), 3);
    assert_eq!(
        body["totais"],
        json!({
            "ativos": 21,
            "pendentes": 3,
            "inativos": 1,
            "inadimplentes": 4,
            "oportunidade": 1849.75
        })
    );

    // Totals cover only the cities left after the search
    let (status, body) = send(
        &app,
        get("/api/cidades?rota=Rota%20Sul&busca=sao%20carlos", &token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cidades"][0]["cidade"], "São Carlos");
    assert_eq!(body["totais"]["ativos"], 4);
    assert_eq!(body["totais"]["oportunidade"], 250.25);
}

#[tokio::test]
async fn test_cached_data_lifecycle() {
    let mock_server = MockServer::start().await;
    mount_auth(&mock_server).await;

    let views = [
        (
            "vw_clientes_completo",
            json!([{ "codigo_cliente": "C1", "nome_fantasia": "Ótica Sol" }]),
        ),
        ("vw_ranking_rotas", json!([{ "rota": "Rota Sul", "ranking": 1 }])),
        ("vw_cidades", json!([{ "cidade": "Campinas", "ativos": 3 }])),
        (
            "vw_vendas_mensais",
            json!([{ "mes": "2026-09", "valor": 18000.75, "meta": 20000 }]),
        ),
        (
            "vw_titulos_abertos",
            json!([{ "codigo_cliente": "C1", "valor": 450.1, "dias_atraso": 35 }]),
        ),
    ];
    // First load, explicit refresh, reload after clear
    for (view, rows) in views {
        Mock::given(method("GET"))
            .and(path(format!("/rest/v1/{}", view)))
            .respond_with(ResponseTemplate::new(200).set_body_json(rows))
            .expect(3)
            .mount(&mock_server)
            .await;
    }

    let store = Arc::new(MemoryKvStore::new());
    let app = routes::app(common::app_state(&mock_server.uri(), store.clone()));
    let token = login(&app).await;

    let (status, first) = send(&app, get("/api/dados", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["codigo_vendedor"], "V001");
    assert_eq!(first["clientes"][0]["codigo_cliente"], "C1");
    assert_eq!(first["vendas"][0]["valor"], 18000.75);
    assert_eq!(first["falhas"], json!([]));
    // Session plus bundle
    assert_eq!(store.len().await, 2);

    let (status, cached) = send(&app, get("/api/dados", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cached, first);

    let request = Request::builder()
        .method("POST")
        .uri("/api/dados/atualizar")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let (status, refreshed) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refreshed["clientes"], first["clientes"]);

    let request = Request::builder()
        .method("DELETE")
        .uri("/api/dados")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(store.len().await, 1);

    let (status, reloaded) = send(&app, get("/api/dados", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reloaded["clientes"], first["clientes"]);
}
