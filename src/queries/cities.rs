use crate::backend_client::SupabaseClient;
use crate::errors::AppError;
use crate::models::City;
use crate::session::Session;
use crate::view_query::{Order, ViewQuery};

use super::{access_token, scoped, views};

pub async fn top_cities(client: &SupabaseClient, session: &Session) -> Result<Vec<City>, AppError> {
    let query = scoped(
        ViewQuery::new(views::TOP10_CIDADES)
            .order("oportunidade", Order::Desc)
            .limit(10),
        session,
    );
    client.select(access_token(session)?, &query).await
}

/// Every city of the seller, optionally restricted to one route.
pub async fn list(
    client: &SupabaseClient,
    session: &Session,
    route: Option<&str>,
) -> Result<Vec<City>, AppError> {
    let mut query = ViewQuery::new(views::CIDADES);
    if let Some(route) = route.filter(|r| !r.trim().is_empty()) {
        query = query.eq("rota", route);
    }
    let query = scoped(query.order("cidade", Order::Asc), session);
    client.select(access_token(session)?, &query).await
}
