//! Page-level derivations computed over fetched rows: free-text search,
//! sort toggling, ranking positions and invoice grouping.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::errors::AppError;
use crate::models::{
    City, Client, DelinquentClient, OpenInvoice, Route, SellerRanking, TopClient,
};
use crate::text::{matches_search, normalize};

/// Sort direction of a column header. Toggling cycles Asc → Desc → None.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
    #[default]
    None,
}

impl SortDirection {
    pub fn toggle(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::None,
            SortDirection::None => SortDirection::Asc,
        }
    }
}

/// Which column is sorted, and how.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    pub key: Option<String>,
    pub direction: SortDirection,
}

impl SortState {
    /// Clicking the active column advances its direction; clicking another
    /// column starts it ascending.
    pub fn toggle_key(&mut self, key: &str) {
        if self.key.as_deref() == Some(key) {
            self.direction = self.direction.toggle();
            if self.direction == SortDirection::None {
                self.key = None;
            }
        } else {
            self.key = Some(key.to_string());
            self.direction = SortDirection::Asc;
        }
    }
}

/// A comparable cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    Number(f64),
    Text(String),
}

impl SortValue {
    fn text(value: &str) -> Self {
        SortValue::Text(normalize(value))
    }

    fn compare(&self, other: &SortValue) -> Ordering {
        match (self, other) {
            (SortValue::Number(a), SortValue::Number(b)) => a.total_cmp(b),
            (SortValue::Text(a), SortValue::Text(b)) => a.cmp(b),
            (SortValue::Number(_), SortValue::Text(_)) => Ordering::Less,
            (SortValue::Text(_), SortValue::Number(_)) => Ordering::Greater,
        }
    }
}

/// Rows that can be sorted by a named column.
pub trait Sortable {
    /// Columns accepted by `sort_value`.
    const SORT_KEYS: &'static [&'static str];

    /// `None` when the row has no such column.
    fn sort_value(&self, key: &str) -> Option<SortValue>;
}

/// Rows that take part in free-text search.
pub trait Searchable {
    fn search_fields(&self) -> Vec<&str>;
}

/// Rows carrying a 1-based ranking position.
pub trait Ranked {
    fn set_position(&mut self, position: usize);
}

/// Stable sort by a named column. `SortDirection::None` keeps the order as-is.
///
/// The key is checked against `T::SORT_KEYS` whatever the rows or direction.
pub fn sort_rows<T: Sortable>(
    rows: &mut [T],
    key: &str,
    direction: SortDirection,
) -> Result<(), AppError> {
    if !T::SORT_KEYS.iter().any(|column| *column == key) {
        return Err(AppError::BadRequest(format!(
            "Coluna de ordenação inválida: {}",
            key
        )));
    }
    if direction == SortDirection::None {
        return Ok(());
    }

    rows.sort_by(|a, b| {
        let ordering = match (a.sort_value(key), b.sort_value(key)) {
            (Some(x), Some(y)) => x.compare(&y),
            _ => Ordering::Equal,
        };
        match direction {
            SortDirection::Desc => ordering.reverse(),
            _ => ordering,
        }
    });
    Ok(())
}

/// Copies the rows with positions matching their current order.
///
/// The caller's slice is left untouched.
pub fn assign_positions<T: Ranked + Clone>(rows: &[T]) -> Vec<T> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            let mut row = row.clone();
            row.set_position(index + 1);
            row
        })
        .collect()
}

/// Groups open invoices by client code, keeping first-seen order.
pub fn group_invoices(rows: &[OpenInvoice]) -> Vec<DelinquentClient> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<DelinquentClient> = Vec::new();

    for row in rows {
        match index.get(row.codigo_cliente.as_str()) {
            Some(&i) => {
                let group = &mut groups[i];
                group.valor_total_titulos += row.valor;
                group.maior_dias_atraso = group.maior_dias_atraso.max(row.dias_atraso);
                group.titulos.push(row.clone());
            }
            None => {
                index.insert(row.codigo_cliente.as_str(), groups.len());
                groups.push(DelinquentClient {
                    codigo_cliente: row.codigo_cliente.clone(),
                    nome_fantasia: row.nome_fantasia.clone(),
                    cidade: row.cidade.clone(),
                    titulos: vec![row.clone()],
                    valor_total_titulos: row.valor,
                    maior_dias_atraso: row.dias_atraso,
                });
            }
        }
    }

    groups
}

/// Number of clients whose oldest invoice is more than `days` overdue.
pub fn count_overdue_over(groups: &[DelinquentClient], days: i64) -> usize {
    groups
        .iter()
        .filter(|group| group.maior_dias_atraso > days)
        .count()
}

/// Client with the highest goal percentage.
pub fn best_by_percentual(clients: &[TopClient]) -> Option<&TopClient> {
    clients
        .iter()
        .max_by(|a, b| a.percentual.total_cmp(&b.percentual))
}

/// Goal percentage below which a client's goal is flagged at risk.
pub const META_EM_RISCO_ABAIXO_DE: f64 = 50.0;
/// Days without purchase (DSV) after which a client is flagged.
pub const DIAS_SEM_COMPRA_ALERTA: i64 = 60;

/// Urgent flags shown on the client detail page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrgentIndicators {
    pub meta_em_risco: bool,
    pub titulos_vencidos: bool,
    pub sem_compra_recente: bool,
}

impl UrgentIndicators {
    pub fn any(&self) -> bool {
        self.meta_em_risco || self.titulos_vencidos || self.sem_compra_recente
    }
}

pub fn urgent_indicators(client: &Client, invoices: &[OpenInvoice]) -> UrgentIndicators {
    UrgentIndicators {
        meta_em_risco: client.percentual_atingimento < META_EM_RISCO_ABAIXO_DE,
        titulos_vencidos: invoices.iter().any(|invoice| invoice.dias_atraso > 0),
        sem_compra_recente: client.dias_sem_compra > DIAS_SEM_COMPRA_ALERTA,
    }
}

/// Search and sort parameters shared by every list page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub busca: Option<String>,
    pub ordenar: Option<String>,
    pub direcao: Option<SortDirection>,
}

impl ListParams {
    pub fn sort_state(&self) -> SortState {
        match self.ordenar.as_deref().filter(|k| !k.trim().is_empty()) {
            Some(key) => SortState {
                key: Some(key.to_string()),
                direction: self.direcao.unwrap_or(SortDirection::Asc),
            },
            None => SortState::default(),
        }
    }

    /// Filters by the search term, then sorts.
    pub fn apply<T: Searchable + Sortable>(&self, rows: Vec<T>) -> Result<Vec<T>, AppError> {
        let term = self.busca.as_deref().unwrap_or("");
        let mut rows: Vec<T> = rows
            .into_iter()
            .filter(|row| matches_search(row.search_fields(), term))
            .collect();

        let sort = self.sort_state();
        if let Some(key) = sort.key.as_deref() {
            sort_rows(&mut rows, key, sort.direction)?;
        }
        Ok(rows)
    }
}

// ============ Row impls ============

impl Searchable for Client {
    fn search_fields(&self) -> Vec<&str> {
        vec![
            self.nome_fantasia.as_str(),
            self.codigo_cliente.as_str(),
            self.cidade.as_str(),
            self.bairro.as_str(),
            self.rota.as_str(),
        ]
    }
}

impl Sortable for Client {
    const SORT_KEYS: &'static [&'static str] = &[
        "codigo_cliente",
        "nome_fantasia",
        "cidade",
        "rota",
        "situacao_financeira",
        "credito_disponivel",
        "dias_sem_compra",
        "valor_oportunidade",
        "meta",
        "vendido",
        "percentual_atingimento",
        "estrelas",
    ];

    fn sort_value(&self, key: &str) -> Option<SortValue> {
        Some(match key {
            "codigo_cliente" => SortValue::text(&self.codigo_cliente),
            "nome_fantasia" => SortValue::text(&self.nome_fantasia),
            "cidade" => SortValue::text(&self.cidade),
            "rota" => SortValue::text(&self.rota),
            "situacao_financeira" => SortValue::text(&self.situacao_financeira),
            "credito_disponivel" => SortValue::Number(self.credito_disponivel),
            "dias_sem_compra" => SortValue::Number(self.dias_sem_compra as f64),
            "valor_oportunidade" => SortValue::Number(self.valor_oportunidade),
            "meta" => SortValue::Number(self.meta),
            "vendido" => SortValue::Number(self.vendido),
            "percentual_atingimento" => SortValue::Number(self.percentual_atingimento),
            "estrelas" => SortValue::Number(self.estrelas as f64),
            _ => return None,
        })
    }
}

impl Searchable for Route {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.rota.as_str()]
    }
}

impl Sortable for Route {
    const SORT_KEYS: &'static [&'static str] = &[
        "rota",
        "qtd_cidades",
        "qtd_clientes",
        "oportunidade",
        "meta",
        "vendido",
        "percentual_meta",
        "ranking",
    ];

    fn sort_value(&self, key: &str) -> Option<SortValue> {
        Some(match key {
            "rota" => SortValue::text(&self.rota),
            "qtd_cidades" => SortValue::Number(self.qtd_cidades as f64),
            "qtd_clientes" => SortValue::Number(self.qtd_clientes as f64),
            "oportunidade" => SortValue::Number(self.oportunidade),
            "meta" => SortValue::Number(self.meta),
            "vendido" => SortValue::Number(self.vendido),
            "percentual_meta" => SortValue::Number(self.percentual_meta),
            "ranking" => SortValue::Number(self.ranking as f64),
            _ => return None,
        })
    }
}

impl Ranked for Route {
    fn set_position(&mut self, position: usize) {
        self.ranking = position as i64;
    }
}

impl Searchable for City {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.cidade.as_str(), self.rota.as_str()]
    }
}

impl Sortable for City {
    const SORT_KEYS: &'static [&'static str] = &[
        "cidade",
        "rota",
        "ativos",
        "pendentes",
        "inativos",
        "inadimplentes",
        "oportunidade",
        "saldo_meta",
    ];

    fn sort_value(&self, key: &str) -> Option<SortValue> {
        Some(match key {
            "cidade" => SortValue::text(&self.cidade),
            "rota" => SortValue::text(&self.rota),
            "ativos" => SortValue::Number(self.ativos as f64),
            "pendentes" => SortValue::Number(self.pendentes as f64),
            "inativos" => SortValue::Number(self.inativos as f64),
            "inadimplentes" => SortValue::Number(self.inadimplentes as f64),
            "oportunidade" => SortValue::Number(self.oportunidade),
            "saldo_meta" => SortValue::Number(self.saldo_meta),
            _ => return None,
        })
    }
}

impl Searchable for TopClient {
    fn search_fields(&self) -> Vec<&str> {
        vec![
            self.nome_fantasia.as_str(),
            self.codigo_cliente.as_str(),
            self.cidade.as_str(),
        ]
    }
}

impl Sortable for TopClient {
    const SORT_KEYS: &'static [&'static str] = &[
        "nome_fantasia",
        "cidade",
        "valor_vendas",
        "meta",
        "percentual",
        "posicao",
    ];

    fn sort_value(&self, key: &str) -> Option<SortValue> {
        Some(match key {
            "nome_fantasia" => SortValue::text(&self.nome_fantasia),
            "cidade" => SortValue::text(&self.cidade),
            "valor_vendas" => SortValue::Number(self.valor_vendas),
            "meta" => SortValue::Number(self.meta),
            "percentual" => SortValue::Number(self.percentual),
            "posicao" => SortValue::Number(self.posicao as f64),
            _ => return None,
        })
    }
}

impl Ranked for TopClient {
    fn set_position(&mut self, position: usize) {
        self.posicao = position;
    }
}

impl Searchable for DelinquentClient {
    fn search_fields(&self) -> Vec<&str> {
        vec![
            self.nome_fantasia.as_str(),
            self.codigo_cliente.as_str(),
            self.cidade.as_str(),
        ]
    }
}

impl Sortable for DelinquentClient {
    const SORT_KEYS: &'static [&'static str] = &[
        "codigo_cliente",
        "nome_fantasia",
        "cidade",
        "valor_total_titulos",
        "maior_dias_atraso",
        "qtd_titulos",
    ];

    fn sort_value(&self, key: &str) -> Option<SortValue> {
        Some(match key {
            "codigo_cliente" => SortValue::text(&self.codigo_cliente),
            "nome_fantasia" => SortValue::text(&self.nome_fantasia),
            "cidade" => SortValue::text(&self.cidade),
            "valor_total_titulos" => SortValue::Number(self.valor_total_titulos),
            "maior_dias_atraso" => SortValue::Number(self.maior_dias_atraso as f64),
            "qtd_titulos" => SortValue::Number(self.titulos.len() as f64),
            _ => return None,
        })
    }
}

impl Searchable for SellerRanking {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.nome.as_str(), self.codigo_vendedor.as_str()]
    }
}

impl Sortable for SellerRanking {
    const SORT_KEYS: &'static [&'static str] = &[
        "nome",
        "vendido",
        "meta",
        "percentual",
        "ranking",
    ];

    fn sort_value(&self, key: &str) -> Option<SortValue> {
        Some(match key {
            "nome" => SortValue::text(&self.nome),
            "vendido" => SortValue::Number(self.vendido),
            "meta" => SortValue::Number(self.meta),
            "percentual" => SortValue::Number(self.percentual),
            "ranking" => SortValue::Number(self.ranking as f64),
            _ => return None,
        })
    }
}
