use std::sync::Arc;

use salebot_core::{
    config::Config,
    store::{seed_settings, SqliteStore},
};

#[tokio::main]
async fn main() -> Result<(), salebot_core::Error> {
    salebot_core::logging::init("salebot")?;

    let cfg = Arc::new(Config::load()?);

    let store = Arc::new(SqliteStore::open(&cfg.database_path)?);
    seed_settings(&*store, &cfg).await?;
    tracing::info!(path = %cfg.database_path.display(), "settings seeded");

    salebot_telegram::router::run_polling(cfg, store)
        .await
        .map_err(|e| salebot_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
