use crate::backend_client::SupabaseClient;
use crate::errors::AppError;
use crate::models::{DelinquencySummary, OpenInvoice};
use crate::session::Session;
use crate::view_query::{Order, ViewQuery};

use super::{access_token, scoped, views};

/// Open invoices, most overdue first. `client_code` narrows to one client.
pub async fn open_invoices(
    client: &SupabaseClient,
    session: &Session,
    client_code: Option<&str>,
) -> Result<Vec<OpenInvoice>, AppError> {
    let mut query = ViewQuery::new(views::TITULOS_ABERTOS);
    if let Some(code) = client_code {
        query = query.eq("codigo_cliente", code);
    }
    let query = scoped(query.order("dias_atraso", Order::Desc), session);
    client.select(access_token(session)?, &query).await
}

/// Totals as computed by the backend aggregate view.
pub async fn summary(
    client: &SupabaseClient,
    session: &Session,
) -> Result<DelinquencySummary, AppError> {
    let query = scoped(ViewQuery::new(views::INADIMPLENTES_RESUMO).limit(1), session);
    let rows: Vec<DelinquencySummary> = client.select(access_token(session)?, &query).await?;
    Ok(rows.into_iter().next().unwrap_or_default())
}
