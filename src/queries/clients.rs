use serde_json::json;

use crate::backend_client::SupabaseClient;
use crate::errors::AppError;
use crate::models::{Client, ClientDetail, TopClient};
use crate::session::Session;
use crate::view::assign_positions;
use crate::view_query::{Order, ViewQuery};

use super::{access_token, scoped, views};

/// Top 20 clients by sales, with positions assigned in that order.
pub async fn top_clients(
    client: &SupabaseClient,
    session: &Session,
) -> Result<Vec<TopClient>, AppError> {
    let query = scoped(
        ViewQuery::new(views::TOP20_CLIENTES)
            .order("valor_vendas", Order::Desc)
            .limit(20),
        session,
    );
    let rows: Vec<TopClient> = client.select(access_token(session)?, &query).await?;
    Ok(assign_positions(&rows))
}

/// Full client directory, optionally filtered by route and/or city.
pub async fn list(
    client: &SupabaseClient,
    session: &Session,
    route: Option<&str>,
    city: Option<&str>,
) -> Result<Vec<Client>, AppError> {
    let mut query = ViewQuery::new(views::CLIENTES_COMPLETO);
    if let Some(route) = route.filter(|r| !r.trim().is_empty()) {
        query = query.eq("rota", route);
    }
    if let Some(city) = city.filter(|c| !c.trim().is_empty()) {
        query = query.eq("cidade", city);
    }
    let query = scoped(query.order("nome_fantasia", Order::Asc), session);
    client.select(access_token(session)?, &query).await
}

/// Aggregated detail of one client.
///
/// The procedure answers with either one object or a one-element array.
pub async fn detail(
    client: &SupabaseClient,
    session: &Session,
    code: &str,
) -> Result<ClientDetail, AppError> {
    let payload: Option<serde_json::Value> = client
        .rpc_optional(
            access_token(session)?,
            views::RPC_CLIENTE_DETALHE,
            &json!({ "p_codigo_cliente": code }),
        )
        .await?;

    let row = match payload {
        Some(serde_json::Value::Array(rows)) => rows.into_iter().next(),
        Some(serde_json::Value::Null) | None => None,
        Some(other) => Some(other),
    };

    let row = row.ok_or_else(|| AppError::NotFound(format!("Cliente {} não encontrado", code)))?;
    serde_json::from_value(row).map_err(|e| {
        AppError::BackendError(format!("Unexpected client detail payload: {}", e))
    })
}
