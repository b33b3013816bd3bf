use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use salesbot_agent::catalog::CatalogError;
use salesbot_agent::llm::{HttpChatModel, ModelError};
use salesbot_agent::ConversationGraph;
use salesbot_core::config::{AppConfig, ConfigError, LoadOptions};
use salesbot_db::{
    connect, migrations, ConversationCache, DbPool, InMemoryConversationCache,
    SqlConversationRepository, StateStore,
};

use crate::clients::CatalogClient;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub store: Arc<StateStore>,
    pub graph: Arc<ConversationGraph>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("model client construction failed: {0}")]
    Model(#[source] ModelError),
    #[error("catalog client construction failed: {0}")]
    Catalog(#[source] CatalogError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let model = Arc::new(HttpChatModel::new(&config.llm).map_err(BootstrapError::Model)?);
    let catalog =
        Arc::new(CatalogClient::new(&config.search).map_err(BootstrapError::Catalog)?);

    let cache: Option<Arc<dyn ConversationCache>> = config
        .cache
        .enabled
        .then(|| Arc::new(InMemoryConversationCache::new()) as Arc<dyn ConversationCache>);
    let store = Arc::new(StateStore::new(
        Arc::new(SqlConversationRepository::new(db_pool.clone())),
        cache,
        Duration::from_secs(config.cache.ttl_secs),
    ));

    let graph =
        Arc::new(ConversationGraph::new(model, catalog.clone(), catalog.clone(), catalog));

    info!(
        event_name = "system.bootstrap.ready",
        cache_enabled = config.cache.enabled,
        "application bootstrap complete"
    );

    Ok(Application { config, db_pool, store, graph })
}

#[cfg(test)]
mod tests {
    use salesbot_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    fn memory_options(cache_enabled: bool) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:?cache=shared".to_string()),
                cache_enabled: Some(cache_enabled),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_applies_migrations_on_a_fresh_database() {
        let app = bootstrap(memory_options(true)).await.expect("bootstrap");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name = 'conversation_message'",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("schema query");
        assert_eq!(table_count, 1);

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_succeeds_with_the_cache_disabled() {
        let app = bootstrap(memory_options(false)).await.expect("bootstrap");
        assert!(!app.config.cache.enabled);
        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_rejects_a_non_sqlite_database_url() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("postgres://localhost/salesbot".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        assert!(result.is_err());
    }
}
