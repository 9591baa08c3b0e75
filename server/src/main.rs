//! medcms server: migrate the schema, then serve the admin API.
//!
//! Run from repo root: `cargo run -p medcms-server`

use medcms::{apply_migrations, app, build_store, cms_catalog, ensure_database_exists, resolve, AppState, Settings};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("medcms=info,tower_http=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    ensure_database_exists(&settings.database_url).await?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await?;

    let catalog = resolve(&cms_catalog(), &settings.schema)?;
    apply_migrations(&pool, &catalog).await?;

    let uploads = build_store(&settings).await;
    let bind = settings.bind;
    let state = AppState::new(pool, catalog, settings, uploads);

    let listener = TcpListener::bind(bind).await?;
    tracing::info!("medcms listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app(state)).await?;
    Ok(())
}
