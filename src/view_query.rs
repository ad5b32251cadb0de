//! Read query against a named backend view, rendered as PostgREST parameters.

/// Order direction for an `order=` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    fn as_str(self) -> &'static str {
        match self {
            Order::Asc => "asc",
            Order::Desc => "desc",
        }
    }
}

/// Filtered, ordered, limited select from one view or table.
///
/// # Example
///
/// ```rust
/// use copiloto::view_query::{Order, ViewQuery};
///
/// let query = ViewQuery::new("vw_top20_clientes")
///     .eq("codigo_vendedor", "V001")
///     .order("valor_vendas", Order::Desc)
///     .limit(20);
///
/// assert_eq!(query.view(), "vw_top20_clientes");
/// assert!(query.params().contains(&("limit".to_string(), "20".to_string())));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ViewQuery {
    view: String,
    select: String,
    filters: Vec<(String, String)>,
    order: Vec<(String, Order)>,
    limit: Option<usize>,
}

impl ViewQuery {
    pub fn new(view: impl Into<String>) -> Self {
        Self {
            view: view.into(),
            select: "*".to_string(),
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    /// Explicit column projection. Defaults to `*`.
    pub fn select(mut self, columns: &[&str]) -> Self {
        if !columns.is_empty() {
            self.select = columns.join(",");
        }
        self
    }

    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters
            .push((column.to_string(), format!("eq.{}", value.to_string())));
        self
    }

    /// Case-insensitive containment match.
    pub fn ilike(mut self, column: &str, value: &str) -> Self {
        self.filters
            .push((column.to_string(), format!("ilike.*{}*", value)));
        self
    }

    /// Adds an order key. Keys apply in the order they are added.
    pub fn order(mut self, column: &str, direction: Order) -> Self {
        self.order.push((column.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn view(&self) -> &str {
        &self.view
    }

    /// Query-string pairs, unencoded.
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), self.select.clone())];
        params.extend(self.filters.iter().cloned());

        if !self.order.is_empty() {
            let order = self
                .order
                .iter()
                .map(|(column, direction)| format!("{}.{}", column, direction.as_str()))
                .collect::<Vec<_>>()
                .join(",");
            params.push(("order".to_string(), order));
        }

        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }

        params
    }
}
