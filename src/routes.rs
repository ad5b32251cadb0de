use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::handlers::{self, AppState};
use crate::middleware::require_session;

/// Static route table. Everything under `/api` except login requires a session.
pub fn app(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/api/logout", post(handlers::logout))
        .route("/api/sessao", get(handlers::current_user))
        .route("/api/dashboard", get(handlers::dashboard))
        .route("/api/clientes", get(handlers::list_clients))
        .route("/api/cliente/:id", get(handlers::client_detail))
        .route("/api/rotas", get(handlers::list_routes))
        .route("/api/cidades", get(handlers::list_cities))
        .route("/api/inadimplentes", get(handlers::list_delinquents))
        .route("/api/vendedores/ranking", get(handlers::seller_ranking))
        .route(
            "/api/dados",
            get(handlers::cached_data).delete(handlers::clear_data),
        )
        .route("/api/dados/atualizar", post(handlers::refresh_data))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/login", post(handlers::login))
        .merge(protected)
        .with_state(state)
}
