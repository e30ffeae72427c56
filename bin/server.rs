// Finance App - API Server
// REST API with Axum over a single SQLite database

use anyhow::{Context, Result};
use tracing::info;

use finance_app::server::{ensure_admin, serve, AppState};
use finance_app::{db, logging, AppConfig};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    logging::init("info");

    let config = AppConfig::from_env()?;

    let conn = db::open(&config.server.db_path)
        .with_context(|| format!("opening database {}", config.server.db_path.display()))?;
    info!(path = %config.server.db_path.display(), "database ready");

    if ensure_admin(&conn, &config.server)? {
        info!("first start: log in with the FINANCE_ADMIN_* credentials");
    }

    let state = AppState::new(conn, &config.server)?;
    serve(&config.server.addr, state).await
}
