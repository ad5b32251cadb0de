use crate::backend_client::SupabaseClient;
use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::middleware::{bearer_token, CurrentSession};
use crate::models::*;
use crate::queries::{cities, clients, dashboard, delinquents, routes, sellers};
use crate::session::SessionManager;
use crate::text::{format_currency, format_percent, percent_of};
use crate::user_data::{isolate, UserDataCache};
use crate::view::{
    assign_positions, best_by_percentual, count_overdue_over, group_invoices, urgent_indicators,
    ListParams, SortDirection, UrgentIndicators,
};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Handle to the hosted database/auth service.
    pub backend: SupabaseClient,
    /// Sign-in and session storage.
    pub sessions: SessionManager,
    /// Per-seller cached data bundles.
    pub user_data: UserDataCache,
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "copiloto",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

// ============ Session ============

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub senha: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub usuario: Seller,
}

/// POST /api/login
///
/// Failures answer with the message the login form shows inline.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Response {
    match state.sessions.login(&request.email, &request.senha).await {
        Ok(session) => Json(LoginResponse {
            token: session.token,
            usuario: session.user,
        })
        .into_response(),
        Err(e) => {
            let status = match e.root() {
                AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
                AppError::InvalidCredentials(_) => StatusCode::UNAUTHORIZED,
                _ => StatusCode::BAD_GATEWAY,
            };
            let message = match e.root() {
                AppError::BadRequest(msg) => msg.clone(),
                _ => state
                    .sessions
                    .login_state(&request.email)
                    .await
                    .error()
                    .map(str::to_string)
                    .unwrap_or_else(|| "Erro de conexão. Tente novamente.".to_string()),
            };
            (status, Json(json!({ "error": message }))).into_response()
        }
    }
}

/// POST /api/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let token = bearer_token(&headers)
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;
    state.sessions.logout(token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/sessao
pub async fn current_user(CurrentSession(session): CurrentSession) -> Json<Seller> {
    Json(session.user)
}

// ============ Dashboard ============

#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardView {
    pub metricas: DashboardMetrics,
    pub percentual_meta: i64,
    pub percentual_formatado: String,
    pub vendas_formatado: String,
    pub meta_formatado: String,
    pub top_cidades: Vec<City>,
    pub ranking_rotas: Vec<Route>,
    pub top_clientes: Vec<TopClient>,
    pub melhor_cliente: Option<TopClient>,
    pub falhas: Vec<String>,
}

/// GET /api/dashboard
///
/// Four concurrent reads; a failed one is reported in `falhas` and the rest
/// of the page still renders.
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<DashboardView>, AppError> {
    let backend = &state.backend;
    let (metrics, top_cities, route_ranking, top_clients) = tokio::join!(
        dashboard::metrics(backend, &session),
        cities::top_cities(backend, &session),
        routes::ranking(backend, &session),
        clients::top_clients(backend, &session),
    );

    let mut falhas = Vec::new();
    let metricas = isolate("metricas", metrics, &mut falhas)?;
    let top_cidades = isolate("top_cidades", top_cities, &mut falhas)?;
    let ranking_rotas = isolate("ranking_rotas", route_ranking, &mut falhas)?;
    let top_clientes = isolate("top_clientes", top_clients, &mut falhas)?;

    let percentual_meta = percent_of(metricas.vendas_mes, metricas.meta_mes);
    let melhor_cliente = best_by_percentual(&top_clientes).cloned();

    tracing::info!(
        "Dashboard for seller {}: {}% of goal, {} failed slice(s)",
        session.user.codigo_vendedor,
        percentual_meta,
        falhas.len()
    );

    Ok(Json(DashboardView {
        percentual_formatado: format_percent(percentual_meta),
        vendas_formatado: format_currency(Some(metricas.vendas_mes)),
        meta_formatado: format_currency(Some(metricas.meta_mes)),
        percentual_meta,
        metricas,
        top_cidades,
        ranking_rotas,
        top_clientes,
        melhor_cliente,
        falhas,
    }))
}

// ============ Clients ============

#[derive(Debug, Default, Deserialize)]
pub struct ClientListQuery {
    pub rota: Option<String>,
    pub cidade: Option<String>,
    pub busca: Option<String>,
    pub ordenar: Option<String>,
    pub direcao: Option<SortDirection>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClientsView {
    pub total: usize,
    /// Client count per financial status, over the filtered list.
    pub por_situacao: BTreeMap<String, usize>,
    pub clientes: Vec<Client>,
}

/// GET /api/clientes
pub async fn list_clients(
    State(state): State<Arc<AppState>>,
    CurrentSession(session): CurrentSession,
    Query(query): Query<ClientListQuery>,
) -> Result<Json<ClientsView>, AppError> {
    let rows = clients::list(
        &state.backend,
        &session,
        query.rota.as_deref(),
        query.cidade.as_deref(),
    )
    .await
    .context("loading client directory")?;

    let params = ListParams {
        busca: query.busca,
        ordenar: query.ordenar,
        direcao: query.direcao,
    };
    let clientes = params.apply(rows)?;

    let mut por_situacao = BTreeMap::new();
    for client in &clientes {
        *por_situacao
            .entry(client.situacao_financeira.clone())
            .or_insert(0) += 1;
    }

    Ok(Json(ClientsView {
        total: clientes.len(),
        por_situacao,
        clientes,
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClientDetailView {
    pub cliente: ClientDetail,
    pub titulos: Vec<OpenInvoice>,
    pub valor_total_titulos: f64,
    pub valor_total_formatado: String,
    pub credito_disponivel_formatado: String,
    pub estrelas: u8,
    pub indicadores: UrgentIndicators,
    pub falhas: Vec<String>,
}

/// GET /api/cliente/:id
pub async fn client_detail(
    State(state): State<Arc<AppState>>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<String>,
) -> Result<Json<ClientDetailView>, AppError> {
    let code = id.trim();
    if code.is_empty() {
        return Err(AppError::BadRequest("Código do cliente obrigatório".to_string()));
    }

    let (detail, invoices) = tokio::join!(
        clients::detail(&state.backend, &session, code),
        delinquents::open_invoices(&state.backend, &session, Some(code)),
    );

    let cliente = detail.with_context(|| format!("loading client {}", code))?;
    let mut falhas = Vec::new();
    let titulos = isolate("titulos", invoices, &mut falhas)?;

    let valor_total_titulos: f64 = titulos.iter().map(|t| t.valor).sum();
    let indicadores = urgent_indicators(&cliente.cliente, &titulos);
    if indicadores.any() {
        tracing::debug!("Client {} has urgent indicators: {:?}", code, indicadores);
    }

    Ok(Json(ClientDetailView {
        valor_total_formatado: format_currency(Some(valor_total_titulos)),
        credito_disponivel_formatado: format_currency(Some(cliente.cliente.credito_disponivel)),
        estrelas: cliente.cliente.stars(),
        valor_total_titulos,
        indicadores,
        titulos,
        cliente,
        falhas,
    }))
}

// ============ Routes ============

#[derive(Debug, Serialize, Deserialize)]
pub struct RoutesView {
    pub rotas: Vec<Route>,
    pub total_vendido: f64,
    pub total_meta: f64,
    pub percentual_geral: i64,
}

/// GET /api/rotas
///
/// Ranking positions are recomputed whenever the caller re-sorts.
pub async fn list_routes(
    State(state): State<Arc<AppState>>,
    CurrentSession(session): CurrentSession,
    Query(params): Query<ListParams>,
) -> Result<Json<RoutesView>, AppError> {
    let rows = routes::ranking(&state.backend, &session)
        .await
        .context("loading route ranking")?;

    let total_vendido: f64 = rows.iter().map(|r| r.vendido).sum();
    let total_meta: f64 = rows.iter().map(|r| r.meta).sum();

    let sorted = params.sort_state().direction != SortDirection::None;
    let rows = params.apply(rows)?;
    let rotas = if sorted { assign_positions(&rows) } else { rows };

    Ok(Json(RoutesView {
        rotas,
        total_vendido,
        total_meta,
        percentual_geral: percent_of(total_vendido, total_meta),
    }))
}

// ============ Cities ============

#[derive(Debug, Default, Deserialize)]
pub struct CityListQuery {
    pub rota: Option<String>,
    pub busca: Option<String>,
    pub ordenar: Option<String>,
    pub direcao: Option<SortDirection>,
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CityTotals {
    pub ativos: i64,
    pub pendentes: i64,
    pub inativos: i64,
    pub inadimplentes: i64,
    pub oportunidade: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CitiesView {
    pub cidades: Vec<City>,
    pub totais: CityTotals,
}

/// GET /api/cidades
pub async fn list_cities(
    State(state): State<Arc<AppState>>,
    CurrentSession(session): CurrentSession,
    Query(query): Query<CityListQuery>,
) -> Result<Json<CitiesView>, AppError> {
    let rows = cities::list(&state.backend, &session, query.rota.as_deref())
        .await
        .context("loading cities")?;

    let params = ListParams {
        busca: query.busca,
        ordenar: query.ordenar,
        direcao: query.direcao,
    };
    let cidades = params.apply(rows)?;

    let totais = cidades.iter().fold(CityTotals::default(), |mut acc, city| {
        acc.ativos += city.ativos;
        acc.pendentes += city.pendentes;
        acc.inativos += city.inativos;
        acc.inadimplentes += city.inadimplentes;
        acc.oportunidade += city.oportunidade;
        acc
    });

    Ok(Json(CitiesView { cidades, totais }))
}

// ============ Delinquents ============

#[derive(Debug, Serialize, Deserialize)]
pub struct DelinquencyOverview {
    pub clientes: usize,
    pub valor_total: f64,
    pub valor_total_formatado: String,
    pub acima_30_dias: usize,
    /// Total reported by the backend aggregate view, when available.
    pub total_resumo: Option<f64>,
    /// The aggregate view disagrees with the invoice list.
    pub divergente: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DelinquentsView {
    pub resumo: DelinquencyOverview,
    pub inadimplentes: Vec<DelinquentClient>,
    pub falhas: Vec<String>,
}

/// GET /api/inadimplentes
///
/// Totals come from the grouped invoice list; the aggregate view is only
/// reported alongside.
pub async fn list_delinquents(
    State(state): State<Arc<AppState>>,
    CurrentSession(session): CurrentSession,
    Query(params): Query<ListParams>,
) -> Result<Json<DelinquentsView>, AppError> {
    let (invoices, summary) = tokio::join!(
        delinquents::open_invoices(&state.backend, &session, None),
        delinquents::summary(&state.backend, &session),
    );

    let invoices = invoices.context("loading open invoices")?;
    let mut falhas = Vec::new();
    let summary = match summary {
        Ok(summary) => Some(summary),
        Err(e) => {
            isolate::<()>("resumo", Err(e), &mut falhas)?;
            None
        }
    };

    let groups = group_invoices(&invoices);
    let valor_total: f64 = groups.iter().map(|g| g.valor_total_titulos).sum();
    let total_resumo = summary.map(|s| s.valor_total);
    let divergente = total_resumo.is_some_and(|total| (total - valor_total).abs() > 0.005);
    if divergente {
        tracing::warn!(
            "Delinquency totals diverge for seller {}: invoices {} vs summary {:?}",
            session.user.codigo_vendedor,
            valor_total,
            total_resumo
        );
    }

    let resumo = DelinquencyOverview {
        clientes: groups.len(),
        valor_total,
        valor_total_formatado: format_currency(Some(valor_total)),
        acima_30_dias: count_overdue_over(&groups, 30),
        total_resumo,
        divergente,
    };

    Ok(Json(DelinquentsView {
        resumo,
        inadimplentes: params.apply(groups)?,
        falhas,
    }))
}

// ============ Sellers ============

/// GET /api/vendedores/ranking
pub async fn seller_ranking(
    State(state): State<Arc<AppState>>,
    CurrentSession(session): CurrentSession,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<SellerRanking>>, AppError> {
    let rows = sellers::ranking(&state.backend, &session)
        .await
        .context("loading seller ranking")?;
    Ok(Json(params.apply(rows)?))
}

// ============ Cached bundle ============

/// GET /api/dados
pub async fn cached_data(
    State(state): State<Arc<AppState>>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<Arc<UserDataBundle>>, AppError> {
    Ok(Json(state.user_data.load(&session).await?))
}

/// POST /api/dados/atualizar
pub async fn refresh_data(
    State(state): State<Arc<AppState>>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<Arc<UserDataBundle>>, AppError> {
    Ok(Json(state.user_data.refresh(&session).await?))
}

/// DELETE /api/dados
pub async fn clear_data(
    State(state): State<Arc<AppState>>,
    CurrentSession(session): CurrentSession,
) -> Result<StatusCode, AppError> {
    state.user_data.clear(&session).await?;
    Ok(StatusCode::NO_CONTENT)
}
