use anyhow::Context;
use tourbook::config::Config;
use tourbook::observability::init_tracing;
use tourbook::repository::{DocumentStore, MemoryStore};
use tourbook::routes::api_router;
use tourbook::server::Server;
use tourbook::state::AppState;

async fn run<S: DocumentStore>(store: S, config: Config) -> anyhow::Result<()> {
    let state = AppState::builder(store)
        .config(config.clone())
        .build()
        .await
        .context("failed to build application state")?;

    Server::new(config).serve(api_router(state)).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    init_tracing(&config)?;

    #[cfg(feature = "mongodb")]
    if let Some(database) = &config.database {
        let store = tourbook::repository::MongoStore::connect(&database.connection_url(), &database.name)
            .await
            .context("failed to connect to MongoDB")?;
        tracing::info!(database = %database.name, "using MongoDB store");
        return run(store, config).await;
    }

    if config.database.is_some() {
        tracing::warn!("database configured but the mongodb feature is disabled; using the in-memory store");
    } else {
        tracing::info!("using the in-memory store");
    }
    run(MemoryStore::new(), config).await
}
