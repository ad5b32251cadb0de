//! Read modules, one per domain. Every read is scoped to the signed-in
//! seller: the session's access token is forwarded so backend row-level
//! security applies, and reps additionally filter by their own seller code.

pub mod cities;
pub mod clients;
pub mod dashboard;
pub mod delinquents;
pub mod routes;
pub mod sellers;

use crate::errors::AppError;
use crate::session::Session;
use crate::view_query::ViewQuery;

/// Backend views and procedures read by this service.
pub mod views {
    pub const DASHBOARD_METRICAS: &str = "vw_dashboard_metricas";
    pub const VENDAS_MENSAIS: &str = "vw_vendas_mensais";
    pub const TOP10_CIDADES: &str = "vw_top10_cidades";
    pub const CIDADES: &str = "vw_cidades";
    pub const TOP20_CLIENTES: &str = "vw_top20_clientes";
    pub const CLIENTES_COMPLETO: &str = "vw_clientes_completo";
    pub const RANKING_ROTAS: &str = "vw_ranking_rotas";
    pub const TITULOS_ABERTOS: &str = "vw_titulos_abertos";
    pub const INADIMPLENTES_RESUMO: &str = "vw_inadimplentes_resumo";
    pub const RANKING_VENDEDORES: &str = "vw_ranking_vendedores";
    pub const VENDEDORES: &str = "vendedores";

    pub const RPC_CLIENTE_DETALHE: &str = "get_cliente_detalhe";
    pub const RPC_VIEW_DEFINITION: &str = "get_view_definition";

    /// Views whose rows carry `codigo_vendedor` and must only show the
    /// signed-in seller's portfolio.
    pub const PER_SELLER: &[&str] = &[
        DASHBOARD_METRICAS,
        VENDAS_MENSAIS,
        TOP10_CIDADES,
        CIDADES,
        TOP20_CLIENTES,
        CLIENTES_COMPLETO,
        RANKING_ROTAS,
        TITULOS_ABERTOS,
        INADIMPLENTES_RESUMO,
    ];
}

/// Access token of the session, or `Unauthorized` when there is none.
pub(crate) fn access_token(session: &Session) -> Result<&str, AppError> {
    if session.access_token.trim().is_empty() {
        return Err(AppError::Unauthorized(format!(
            "Session {} has no access token",
            session.token
        )));
    }
    Ok(&session.access_token)
}

/// Restricts a per-seller view to the session's own rows for reps.
pub(crate) fn scoped(query: ViewQuery, session: &Session) -> ViewQuery {
    if session.user.role.is_restricted() {
        query.eq("codigo_vendedor", &session.user.codigo_vendedor)
    } else {
        query
    }
}
