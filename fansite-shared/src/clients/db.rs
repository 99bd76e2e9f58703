use std::collections::HashMap;
use std::time::Duration;

use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::{QueryResult, RunQueryDsl};

use crate::errors::{AppError, AppResult};

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

#[derive(Debug, Clone, Copy)]
pub struct PoolSettings {
    pub max_size: u32,
    pub connection_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_size: 10,
            connection_timeout: Duration::from_secs(3),
        }
    }
}

/// Builds a pool without opening any connection. A store that is down at
/// startup only fails the requests that address it.
pub fn create_pool(database_url: &str, settings: PoolSettings) -> DbPool {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = Pool::builder()
        .max_size(settings.max_size)
        .min_idle(Some(0))
        .connection_timeout(settings.connection_timeout)
        .test_on_check_out(true)
        .build_unchecked(manager);

    tracing::info!(max_size = settings.max_size, "database connection pool created");
    pool
}

/// One independent pool per logical store, keyed by store name.
///
/// Built once at startup and shared by reference; each pool has its own
/// connection budget so exhausting one store never starves another.
#[derive(Default)]
pub struct StoreRegistry {
    pools: HashMap<String, DbPool>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, store: impl Into<String>, pool: DbPool) {
        let store = store.into();
        tracing::debug!(store = %store, "store registered");
        self.pools.insert(store, pool);
    }

    pub fn contains(&self, store: &str) -> bool {
        self.pools.contains_key(store)
    }

    pub fn pool(&self, store: &str) -> AppResult<&DbPool> {
        self.pools
            .get(store)
            .ok_or_else(|| AppError::configuration(format!("unknown store '{store}'")))
    }

    /// Runs `query` against a connection from `store`'s pool on the blocking
    /// thread pool.
    pub async fn execute<T, F>(&self, store: &str, query: F) -> AppResult<T>
    where
        F: FnOnce(&mut PgConnection) -> QueryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool(store)?.clone();
        let store = store.to_string();

        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| {
                tracing::warn!(store = %store, error = %e, "store checkout failed");
                AppError::connectivity(format!("store '{store}' is unreachable"))
            })?;
            query(&mut conn).map_err(AppError::from)
        })
        .await
        .map_err(|e| AppError::internal(format!("store task failed: {e}")))?
    }

    pub async fn ping(&self, store: &str) -> AppResult<()> {
        self.execute(store, |conn| diesel::sql_query("SELECT 1").execute(conn))
            .await
            .map(|_| ())
    }
}
