use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use tally_core::{
    bot::ExpenseBot,
    config::{Config, StoreKind},
    store::{MemoryStore, RecordStore},
};
use tally_keepalive::KeepaliveConfig;
use tally_sqlite::SqliteStore;

#[tokio::main]
async fn main() -> Result<(), tally_core::Error> {
    tally_core::logging::init("tally")?;

    let cfg = Arc::new(Config::load()?);

    let store: Arc<dyn RecordStore> = match cfg.store {
        StoreKind::Memory => {
            tracing::info!("using in-memory store; records are lost on restart");
            Arc::new(MemoryStore::new())
        }
        StoreKind::Sqlite => {
            tracing::info!(path = %cfg.database_path.display(), "using sqlite store");
            Arc::new(SqliteStore::open(&cfg.database_path)?)
        }
    };

    let cancel = CancellationToken::new();
    if cfg.keepalive_enabled {
        tally_keepalive::spawn(KeepaliveConfig::from(cfg.as_ref()), cancel.clone()).await?;
    }

    let bot = Arc::new(ExpenseBot::new(cfg, store));
    let result = tally_telegram::router::run_polling(bot)
        .await
        .map_err(|e| tally_core::Error::External(format!("telegram bot failed: {e}")));

    cancel.cancel();
    result
}
