use serde_json::json;

use crate::backend_client::SupabaseClient;
use crate::errors::AppError;
use crate::models::{Seller, SellerRanking, SellerRow};
use crate::session::Session;
use crate::view_query::{Order, ViewQuery};

use super::{access_token, views};

/// Seller ranking. Visibility across sellers is left to the backend.
pub async fn ranking(
    client: &SupabaseClient,
    session: &Session,
) -> Result<Vec<SellerRanking>, AppError> {
    let query = ViewQuery::new(views::RANKING_VENDEDORES).order("ranking", Order::Asc);
    client.select(access_token(session)?, &query).await
}

/// Profile of an auth user. Used right after sign-in, before a session exists.
pub async fn profile(
    client: &SupabaseClient,
    access_token: &str,
    user_id: &str,
) -> Result<Seller, AppError> {
    let query = ViewQuery::new(views::VENDEDORES)
        .select(&[
            "user_id",
            "codigo_vendedor",
            "nome",
            "email",
            "cargo",
            "gerente_codigo",
        ])
        .eq("user_id", user_id)
        .limit(1);
    let rows: Vec<SellerRow> = client.select(access_token, &query).await?;

    rows.into_iter()
        .next()
        .map(Seller::from)
        .ok_or_else(|| {
            AppError::InvalidCredentials("Usuário sem cadastro de vendedor".to_string())
        })
}

/// SQL definition of a view, for the debug scripts.
pub async fn view_definition(
    client: &SupabaseClient,
    session: &Session,
    view: &str,
) -> Result<Option<String>, AppError> {
    client
        .rpc_optional(
            access_token(session)?,
            views::RPC_VIEW_DEFINITION,
            &json!({ "view_name": view }),
        )
        .await
}
