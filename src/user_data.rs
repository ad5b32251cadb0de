//! Per-seller cached data bundle.
//!
//! Loaded once per seller code and persisted; later loads hydrate from the
//! store without touching the backend. Only `refresh` and `clear` invalidate.

use chrono::Utc;
use moka::future::Cache;
use std::sync::Arc;

use crate::backend_client::SupabaseClient;
use crate::cache_validator;
use crate::errors::AppError;
use crate::kv_store::{bundle_key, KvStore};
use crate::models::UserDataBundle;
use crate::queries::{cities, clients, dashboard, delinquents, routes};
use crate::session::Session;

/// Outcome of one branch of a fan-out: the rows, or empty plus a recorded failure.
///
/// Session errors are not isolated: they mean no branch can succeed.
pub fn isolate<T: Default>(
    slice: &str,
    result: Result<T, AppError>,
    failures: &mut Vec<String>,
) -> Result<T, AppError> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if matches!(e.root(), AppError::Unauthorized(_)) => Err(e),
        Err(e) => {
            tracing::warn!("Failed to load {}, defaulting to empty: {}", slice, e);
            failures.push(slice.to_string());
            Ok(T::default())
        }
    }
}

#[derive(Clone)]
pub struct UserDataCache {
    backend: SupabaseClient,
    store: Arc<dyn KvStore>,
    bundles: Cache<String, Arc<UserDataBundle>>,
}

impl UserDataCache {
    pub fn new(backend: SupabaseClient, store: Arc<dyn KvStore>) -> Self {
        Self {
            backend,
            store,
            bundles: Cache::builder().max_capacity(1_000).build(),
        }
    }

    /// Bundle of the session's seller: memory, then store, then backend.
    pub async fn load(&self, session: &Session) -> Result<Arc<UserDataBundle>, AppError> {
        let code = &session.user.codigo_vendedor;

        if let Some(bundle) = self.bundles.get(code).await {
            return Ok(bundle);
        }

        if let Some(stored) = self.store.get(&bundle_key(code)).await? {
            if let Some(bundle) = cache_validator::open::<UserDataBundle>(&stored) {
                tracing::debug!(
                    "Hydrated cached bundle for seller {} (loaded at {})",
                    code,
                    bundle.carregado_em
                );
                let bundle = Arc::new(bundle);
                self.bundles.insert(code.clone(), bundle.clone()).await;
                return Ok(bundle);
            }
        }

        self.refresh(session).await
    }

    /// Re-fetches every slice and overwrites the cached bundle.
    pub async fn refresh(&self, session: &Session) -> Result<Arc<UserDataBundle>, AppError> {
        let bundle = Arc::new(self.fetch(session).await?);
        let code = &session.user.codigo_vendedor;

        match cache_validator::seal(bundle.as_ref()) {
            Ok(sealed) => {
                if let Err(e) = self.store.set(&bundle_key(code), &sealed).await {
                    tracing::error!("Failed to persist bundle for seller {}: {}", code, e);
                }
            }
            Err(e) => tracing::error!("Failed to serialize bundle for seller {}: {}", code, e),
        }

        self.bundles.insert(code.clone(), bundle.clone()).await;
        Ok(bundle)
    }

    /// Drops the cached bundle of the session's seller.
    pub async fn clear(&self, session: &Session) -> Result<(), AppError> {
        let code = &session.user.codigo_vendedor;
        self.bundles.invalidate(code).await;
        self.store.remove(&bundle_key(code)).await?;
        tracing::info!("Cleared cached bundle for seller {}", code);
        Ok(())
    }

    async fn fetch(&self, session: &Session) -> Result<UserDataBundle, AppError> {
        let backend = &self.backend;
        tracing::info!(
            "Loading data bundle for seller {}",
            session.user.codigo_vendedor
        );

        let (clientes, rotas, cidades, vendas, titulos) = tokio::join!(
            clients::list(backend, session, None, None),
            routes::ranking(backend, session),
            cities::list(backend, session, None),
            dashboard::monthly_sales(backend, session),
            delinquents::open_invoices(backend, session, None),
        );

        let mut falhas = Vec::new();
        let bundle = UserDataBundle {
            codigo_vendedor: session.user.codigo_vendedor.clone(),
            clientes: isolate("clientes", clientes, &mut falhas)?,
            rotas: isolate("rotas", rotas, &mut falhas)?,
            cidades: isolate("cidades", cidades, &mut falhas)?,
            vendas: isolate("vendas", vendas, &mut falhas)?,
            titulos: isolate("titulos", titulos, &mut falhas)?,
            falhas,
            carregado_em: Utc::now(),
        };

        if bundle.is_partial() {
            tracing::warn!(
                "Bundle for seller {} loaded partially, failed: {:?}",
                bundle.codigo_vendedor,
                bundle.falhas
            );
        }
        Ok(bundle)
    }
}
