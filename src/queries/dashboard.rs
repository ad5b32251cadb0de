use crate::backend_client::SupabaseClient;
use crate::errors::AppError;
use crate::models::{DashboardMetrics, MonthlySale};
use crate::session::Session;
use crate::view_query::{Order, ViewQuery};

use super::{access_token, scoped, views};

/// Monthly aggregates for the signed-in seller. No row means zeros.
pub async fn metrics(
    client: &SupabaseClient,
    session: &Session,
) -> Result<DashboardMetrics, AppError> {
    let query = scoped(
        ViewQuery::new(views::DASHBOARD_METRICAS)
            .select(&["vendas_mes", "meta_mes", "percentual_meta", "clientes_ativos"])
            .limit(1),
        session,
    );
    let rows: Vec<DashboardMetrics> = client.select(access_token(session)?, &query).await?;

    Ok(rows.into_iter().next().unwrap_or_else(|| {
        tracing::debug!(
            "No dashboard metrics for seller {}",
            session.user.codigo_vendedor
        );
        DashboardMetrics::default()
    }))
}

/// Sales per month, oldest first.
pub async fn monthly_sales(
    client: &SupabaseClient,
    session: &Session,
) -> Result<Vec<MonthlySale>, AppError> {
    let query = scoped(
        ViewQuery::new(views::VENDAS_MENSAIS).order("mes", Order::Asc),
        session,
    );
    client.select(access_token(session)?, &query).await
}
