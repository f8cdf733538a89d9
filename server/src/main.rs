//! elemental-server: loads settings and the catalog, then serves the entity routes.
//!
//! Run from repo root: `cargo run -p elemental-server`

use elemental::{app, apply_ownership_fields, load_from_pool, load_manifest, resolve, AppState, Settings};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("elemental=info,elemental_server=info")),
        )
        .init();

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await?;

    let mut manifest = match &settings.catalog_path {
        Some(path) => load_manifest(path)?,
        None => load_from_pool(&pool, &settings.schema).await?,
    };
    apply_ownership_fields(&mut manifest, &settings.ownership_fields)?;
    let catalog = resolve(&manifest)?;
    let state = AppState::new(pool, catalog);

    let router = app(state, settings.body_limit_bytes);
    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("elemental listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router).await?;
    Ok(())
}
