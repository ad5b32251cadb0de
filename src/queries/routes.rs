use crate::backend_client::SupabaseClient;
use crate::errors::AppError;
use crate::models::Route;
use crate::session::Session;
use crate::view_query::{Order, ViewQuery};

use super::{access_token, scoped, views};

pub async fn ranking(client: &SupabaseClient, session: &Session) -> Result<Vec<Route>, AppError> {
    let query = scoped(
        ViewQuery::new(views::RANKING_ROTAS).order("ranking", Order::Asc),
        session,
    );
    client.select(access_token(session)?, &query).await
}
