//! Checks whether per-seller views only return the signed-in seller's rows.
//!
//! Signs in with `PROBE_EMAIL` / `PROBE_PASSWORD` and reads every per-seller
//! view, reporting rows whose `codigo_vendedor` belongs to someone else.

use std::sync::Arc;

use copiloto::backend_client::SupabaseClient;
use copiloto::config::Config;
use copiloto::kv_store::MemoryKvStore;
use copiloto::queries::views;
use copiloto::session::SessionManager;
use copiloto::view_query::ViewQuery;

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
    let own_code = session.user.codigo_vendedor.clone();

    println!(
        "Signed in as {} (seller {}, {:?})\n",
        session.user.nome, own_code, session.user.role
    );

    let mut leaking = 0;
    for view in views::PER_SELLER {
        // No explicit seller filter: this measures what the backend alone returns
        let query = ViewQuery::new(*view);
        let rows: Vec<serde_json::Value> = match backend.select(&session.access_token, &query).await
        {
            Ok(rows) => rows,
            Err(e) => {
                println!("✗ {:<28} read failed: {}", view, e);
                continue;
            }
        };

        let foreign: Vec<String> = rows
            .iter()
            .filter_map(|row| row.get("codigo_vendedor"))
            .map(|code| match code {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .filter(|code| *code != own_code)
            .collect();

        let has_column = rows.iter().any(|row| row.get("codigo_vendedor").is_some());
        if !has_column && !rows.is_empty() {
            println!("? {:<28} {} row(s), no codigo_vendedor column", view, rows.len());
        } else if foreign.is_empty() {
            println!("✓ {:<28} {} row(s), all own", view, rows.len());
        } else {
            leaking += 1;
            let mut sellers = foreign.clone();
            sellers.sort();
            sellers.dedup();
            println!(
                "✗ {:<28} {} of {} row(s) from other sellers: {:?}",
                view,
                foreign.len(),
                rows.len(),
                sellers
            );
        }
    }

    sessions.logout(&session.token).await?;
    println!("\n{} view(s) returned rows of other sellers", leaking);
    Ok(())
}
