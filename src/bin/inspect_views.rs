//! Prints the SQL definition of every view the service reads.

use std::sync::Arc;

use copiloto::backend_client::SupabaseClient;
use copiloto::config::Config;
use copiloto::kv_store::MemoryKvStore;
use copiloto::queries::{sellers, views};
use copiloto::session::SessionManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    let email = std::env::var("PROBE_EMAIL")
        .map_err(|_| anyhow::anyhow!("PROBE_EMAIL environment variable required"))?;
    let password = std::env::var("PROBE_PASSWORD")
        .map_err(|_| anyhow::anyhow!("PROBE_PASSWORD environment variable required"))?;

    let backend = SupabaseClient::new(
        config.supabase_url.clone(),
        config.supabase_anon_key.clone(),
        config.backend_timeout(),
    )?;
    let sessions = SessionManager::new(backend.clone(), Arc::new(MemoryKvStore::new()));
    let session = sessions.login(&email, &password).await?;

    let mut all_views: Vec<&str> = views::PER_SELLER.to_vec();
    all_views.push(views::RANKING_VENDEDORES);

    for view in all_views {
        println!("-- {}", view);
        match sellers::view_definition(&backend, &session, view).await? {
            Some(definition) => println!("{}\n", definition.trim()),
            None => println!("(definition unavailable)\n"),
        }
    }

    sessions.logout(&session.token).await?;
    Ok(())
}
