use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::text::normalize;

/// Placeholder for a client or city with no route assigned.
pub const SEM_ROTA: &str = "Sem rota";
/// Placeholder for any other missing text column.
pub const NAO_INFORMADO: &str = "Não informado";

/// Lenient decoders for backend columns.
///
/// Views return `numeric` columns as JSON numbers, strings or `null`
/// depending on the column type; all of them map to a plain `f64`.
pub mod de {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn value_to_f64(value: Option<Value>) -> f64 {
        match value {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
            Some(Value::Bool(b)) => f64::from(u8::from(b)),
            _ => 0.0,
        }
    }

    pub fn number_or_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(value_to_f64(Option::<Value>::deserialize(deserializer)?))
    }

    pub fn integer_or_zero<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(value_to_f64(Option::<Value>::deserialize(deserializer)?).round() as i64)
    }

    fn text_or(value: Option<Value>, placeholder: &str) -> String {
        match value {
            Some(Value::String(s)) if !s.trim().is_empty() => s,
            Some(Value::Number(n)) => n.to_string(),
            _ => placeholder.to_string(),
        }
    }

    pub fn route<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(text_or(
            Option::<Value>::deserialize(deserializer)?,
            super::SEM_ROTA,
        ))
    }

    pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(text_or(
            Option::<Value>::deserialize(deserializer)?,
            super::NAO_INFORMADO,
        ))
    }

    /// Identifiers may arrive as numbers (`codigo_cliente: 1042`).
    pub fn code<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(text_or(Option::<Value>::deserialize(deserializer)?, ""))
    }
}

fn sem_rota() -> String {
    SEM_ROTA.to_string()
}

fn nao_informado() -> String {
    NAO_INFORMADO.to_string()
}

// ============ Users ============

/// Position of a seller in the sales hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Representante,
    Gerente,
    Diretor,
}

impl Role {
    /// Parses the backend `cargo` column. Unknown values are treated as reps.
    pub fn from_cargo(cargo: &str) -> Self {
        let cargo = normalize(cargo);
        if cargo.starts_with("diretor") {
            Role::Diretor
        } else if cargo.starts_with("gerente") || cargo.starts_with("gestor") {
            Role::Gerente
        } else {
            Role::Representante
        }
    }

    /// Reps only ever see their own portfolio.
    pub fn is_restricted(self) -> bool {
        self == Role::Representante
    }
}

/// Row of the `vendedores` table.
#[derive(Debug, Clone, Deserialize)]
pub struct SellerRow {
    pub user_id: String,
    #[serde(deserialize_with = "de::code")]
    pub codigo_vendedor: String,
    #[serde(default = "nao_informado", deserialize_with = "de::text")]
    pub nome: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub cargo: Option<String>,
    #[serde(default)]
    pub gerente_codigo: Option<String>,
}

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seller {
    pub id: String,
    pub codigo_vendedor: String,
    pub nome: String,
    pub email: Option<String>,
    pub role: Role,
    pub gerente_codigo: Option<String>,
}

impl From<SellerRow> for Seller {
    fn from(row: SellerRow) -> Self {
        Self {
            role: row
                .cargo
                .as_deref()
                .map(Role::from_cargo)
                .unwrap_or(Role::Representante),
            id: row.user_id,
            codigo_vendedor: row.codigo_vendedor,
            nome: row.nome,
            email: row.email,
            gerente_codigo: row.gerente_codigo.filter(|c| !c.trim().is_empty()),
        }
    }
}

// ============ Clients ============

/// A client account (ótica), as surfaced by `vw_clientes_completo`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    #[serde(deserialize_with = "de::code")]
    pub codigo_cliente: String,
    #[serde(default = "nao_informado", deserialize_with = "de::text")]
    pub nome_fantasia: String,
    #[serde(default = "nao_informado", deserialize_with = "de::text")]
    pub cidade: String,
    #[serde(default = "nao_informado", deserialize_with = "de::text")]
    pub bairro: String,
    #[serde(default = "sem_rota", deserialize_with = "de::route")]
    pub rota: String,
    #[serde(default = "nao_informado", deserialize_with = "de::text")]
    pub situacao_financeira: String,
    #[serde(default, deserialize_with = "de::number_or_zero")]
    pub limite_credito: f64,
    #[serde(default, deserialize_with = "de::number_or_zero")]
    pub credito_utilizado: f64,
    #[serde(default, deserialize_with = "de::number_or_zero")]
    pub credito_disponivel: f64,
    /// Days since the last purchase (DSV).
    #[serde(default, deserialize_with = "de::integer_or_zero")]
    pub dias_sem_compra: i64,
    #[serde(default, deserialize_with = "de::number_or_zero")]
    pub valor_oportunidade: f64,
    #[serde(default, deserialize_with = "de::number_or_zero")]
    pub meta: f64,
    #[serde(default, deserialize_with = "de::number_or_zero")]
    pub vendido: f64,
    #[serde(default, deserialize_with = "de::number_or_zero")]
    pub percentual_atingimento: f64,
    #[serde(default, deserialize_with = "de::integer_or_zero")]
    pub estrelas: i64,
    #[serde(default = "nao_informado", deserialize_with = "de::text")]
    pub acao_recomendada: String,
}

impl Client {
    /// Star rating clamped to 0..=5.
    pub fn stars(&self) -> u8 {
        self.estrelas.clamp(0, 5) as u8
    }
}

/// Row of `vw_top20_clientes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopClient {
    #[serde(deserialize_with = "de::code")]
    pub codigo_cliente: String,
    #[serde(default = "nao_informado", deserialize_with = "de::text")]
    pub nome_fantasia: String,
    #[serde(default = "nao_informado", deserialize_with = "de::text")]
    pub cidade: String,
    #[serde(default, deserialize_with = "de::number_or_zero")]
    pub valor_vendas: f64,
    #[serde(default, deserialize_with = "de::number_or_zero")]
    pub meta: f64,
    #[serde(default, deserialize_with = "de::number_or_zero")]
    pub percentual: f64,
    /// 1-based position in the current ordering.
    #[serde(default)]
    pub posicao: usize,
}

/// Result of the `get_cliente_detalhe` RPC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientDetail {
    #[serde(flatten)]
    pub cliente: Client,
    #[serde(default)]
    pub ultima_compra: Option<NaiveDate>,
    #[serde(default, deserialize_with = "de::number_or_zero")]
    pub ticket_medio: f64,
    #[serde(default, deserialize_with = "de::integer_or_zero")]
    pub compras_ultimos_12_meses: i64,
}

// ============ Routes & cities ============

/// Row of `vw_ranking_rotas`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(default = "sem_rota", deserialize_with = "de::route")]
    pub rota: String,
    #[serde(default, deserialize_with = "de::integer_or_zero")]
    pub qtd_cidades: i64,
    #[serde(default, deserialize_with = "de::integer_or_zero")]
    pub qtd_clientes: i64,
    #[serde(default, deserialize_with = "de::number_or_zero")]
    pub oportunidade: f64,
    #[serde(default, deserialize_with = "de::number_or_zero")]
    pub meta: f64,
    #[serde(default, deserialize_with = "de::number_or_zero")]
    pub vendido: f64,
    #[serde(default, deserialize_with = "de::number_or_zero")]
    pub percentual_meta: f64,
    #[serde(default, deserialize_with = "de::integer_or_zero")]
    pub ranking: i64,
}

/// Row of `vw_cidades` / `vw_top10_cidades`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    #[serde(default = "nao_informado", deserialize_with = "de::text")]
    pub cidade: String,
    #[serde(default = "sem_rota", deserialize_with = "de::route")]
    pub rota: String,
    #[serde(default, deserialize_with = "de::integer_or_zero")]
    pub ativos: i64,
    #[serde(default, deserialize_with = "de::integer_or_zero")]
    pub pendentes: i64,
    #[serde(default, deserialize_with = "de::integer_or_zero")]
    pub inativos: i64,
    #[serde(default, deserialize_with = "de::integer_or_zero")]
    pub inadimplentes: i64,
    #[serde(default, deserialize_with = "de::number_or_zero")]
    pub oportunidade: f64,
    #[serde(default, deserialize_with = "de::number_or_zero")]
    pub saldo_meta: f64,
}

impl City {
    pub fn total_clientes(&self) -> i64 {
        self.ativos + self.pendentes + self.inativos + self.inadimplentes
    }
}

// ============ Delinquency ============

/// Row of `vw_titulos_abertos`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenInvoice {
    #[serde(deserialize_with = "de::code")]
    pub codigo_cliente: String,
    #[serde(default = "nao_informado", deserialize_with = "de::text")]
    pub nome_fantasia: String,
    #[serde(default = "nao_informado", deserialize_with = "de::text")]
    pub cidade: String,
    #[serde(default, deserialize_with = "de::code")]
    pub numero_titulo: String,
    #[serde(default)]
    pub vencimento: Option<NaiveDate>,
    #[serde(default, deserialize_with = "de::number_or_zero")]
    pub valor: f64,
    #[serde(default, deserialize_with = "de::integer_or_zero")]
    pub dias_atraso: i64,
}

/// Open invoices of one client, grouped locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelinquentClient {
    pub codigo_cliente: String,
    pub nome_fantasia: String,
    pub cidade: String,
    pub titulos: Vec<OpenInvoice>,
    pub valor_total_titulos: f64,
    pub maior_dias_atraso: i64,
}

/// Row of `vw_inadimplentes_resumo`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DelinquencySummary {
    #[serde(default, deserialize_with = "de::integer_or_zero")]
    pub total_clientes: i64,
    #[serde(default, deserialize_with = "de::number_or_zero")]
    pub valor_total: f64,
}

// ============ Metrics ============

/// Row of `vw_dashboard_metricas`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardMetrics {
    #[serde(default, deserialize_with = "de::number_or_zero")]
    pub vendas_mes: f64,
    #[serde(default, deserialize_with = "de::number_or_zero")]
    pub meta_mes: f64,
    #[serde(default, deserialize_with = "de::number_or_zero")]
    pub percentual_meta: f64,
    #[serde(default, deserialize_with = "de::integer_or_zero")]
    pub clientes_ativos: i64,
}

/// Row of `vw_vendas_mensais`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySale {
    #[serde(deserialize_with = "de::code")]
    pub mes: String,
    #[serde(default, deserialize_with = "de::number_or_zero")]
    pub valor: f64,
    #[serde(default, deserialize_with = "de::number_or_zero")]
    pub meta: f64,
}

/// Row of `vw_ranking_vendedores`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellerRanking {
    #[serde(deserialize_with = "de::code")]
    pub codigo_vendedor: String,
    #[serde(default = "nao_informado", deserialize_with = "de::text")]
    pub nome: String,
    #[serde(default, deserialize_with = "de::number_or_zero")]
    pub vendido: f64,
    #[serde(default, deserialize_with = "de::number_or_zero")]
    pub meta: f64,
    #[serde(default, deserialize_with = "de::number_or_zero")]
    pub percentual: f64,
    #[serde(default, deserialize_with = "de::integer_or_zero")]
    pub ranking: i64,
}

// ============ Cached bundle ============

/// Everything the pages of one seller need, fetched once and persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDataBundle {
    pub codigo_vendedor: String,
    pub clientes: Vec<Client>,
    pub rotas: Vec<Route>,
    pub cidades: Vec<City>,
    pub vendas: Vec<MonthlySale>,
    pub titulos: Vec<OpenInvoice>,
    /// Slices that failed to load and were defaulted to empty.
    pub falhas: Vec<String>,
    pub carregado_em: DateTime<Utc>,
}

impl UserDataBundle {
    pub fn is_partial(&self) -> bool {
        !self.falhas.is_empty()
    }
}
