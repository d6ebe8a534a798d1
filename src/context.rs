/// Application context and dependency injection
use crate::{
    auth::AuthService,
    clock::{Clock, SystemClock},
    config::{ServerConfig, StorageConfig},
    db,
    error::WishlistResult,
    item::ItemService,
    mailer::{Mailer, Notifier},
    rate_limit::RateLimiter,
    store::{memory::MemoryStore, ItemStore, UserStore},
    user::UserService,
};
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub auth: Arc<AuthService>,
    pub users: Arc<UserService>,
    pub items: Arc<ItemService>,
    pub rate_limiter: RateLimiter,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> WishlistResult<Self> {
        // Validate configuration
        config.validate()?;

        let (user_store, item_store): (Arc<dyn UserStore>, Arc<dyn ItemStore>) =
            match &config.storage {
                StorageConfig::Sqlite {
                    path,
                    max_connections,
                } => {
                    let pool = db::create_pool(
                        path,
                        db::DatabaseOptions {
                            max_connections: *max_connections,
                            ..Default::default()
                        },
                    )
                    .await?;
                    db::run_migrations(&pool).await?;
                    db::test_connection(&pool).await?;

                    tracing::info!("Using SQLite storage at {}", path.display());
                    let users: Arc<dyn UserStore> = Arc::new(db::SqliteUserStore::new(pool.clone()));
                    let items: Arc<dyn ItemStore> = Arc::new(db::SqliteItemStore::new(pool));
                    (users, items)
                }
                StorageConfig::Memory => {
                    tracing::warn!("Using in-memory storage, data is lost on restart");
                    let store = Arc::new(MemoryStore::new());
                    let users: Arc<dyn UserStore> = store.clone();
                    let items: Arc<dyn ItemStore> = store;
                    (users, items)
                }
            };

        let mailer = Mailer::new(&config.email)?;
        if !mailer.is_configured() {
            tracing::warn!("Password reset emails will not be delivered");
        }

        Ok(Self::from_parts(
            config,
            user_store,
            item_store,
            Arc::new(mailer),
            Arc::new(SystemClock),
        ))
    }

    /// Wire the services around already built collaborators
    pub fn from_parts(
        config: ServerConfig,
        user_store: Arc<dyn UserStore>,
        item_store: Arc<dyn ItemStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let auth = AuthService::new(user_store.clone(), clock.clone(), &config.authentication);
        let users = UserService::new(user_store, notifier, clock);
        let items = ItemService::new(item_store);
        let rate_limiter = RateLimiter::new(&config.rate_limit);

        Self {
            config: Arc::new(config),
            auth: Arc::new(auth),
            users: Arc::new(users),
            items: Arc::new(items),
            rate_limiter,
        }
    }

    /// Address the HTTP listener binds to
    pub fn bind_address(&self) -> String {
        self.config.bind_address()
    }
}

/// In-memory context plus handles on its fakes
#[cfg(test)]
pub(crate) struct TestContext {
    pub ctx: AppContext,
    pub store: Arc<MemoryStore>,
    pub outbox: Arc<crate::mailer::RecordingNotifier>,
}

#[cfg(test)]
impl TestContext {
    pub fn router(&self) -> axum::Router {
        crate::server::build_router(self.ctx.clone())
    }
}

#[cfg(test)]
pub(crate) fn test_context() -> TestContext {
    let store = Arc::new(MemoryStore::new());
    let outbox = Arc::new(crate::mailer::RecordingNotifier::default());
    let ctx = AppContext::from_parts(
        crate::config::test_config(),
        store.clone(),
        store.clone(),
        outbox.clone(),
        Arc::new(SystemClock),
    );

    TestContext { ctx, store, outbox }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[tokio::test]
    async fn test_memory_context_from_config() {
        let ctx = AppContext::new(test_config()).await.unwrap();
        assert!(ctx.items.get_wanted().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_context_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config();
        config.storage = StorageConfig::Sqlite {
            path: dir.path().join("wishlist.sqlite"),
            max_connections: 2,
        };

        let ctx = AppContext::new(config).await.unwrap();
        ctx.items
            .add_item("Kettle", "https://example.com/kettle", 1)
            .await
            .unwrap();
        assert_eq!(ctx.items.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut config = test_config();
        config.authentication.jwt_secret = "short".to_string();
        assert!(AppContext::new(config).await.is_err());
    }
}
