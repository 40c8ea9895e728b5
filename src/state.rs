use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::db;
use crate::mailer::{LogMailer, Mailer};
use crate::middleware::{Metrics, RateLimiter};
use crate::movies::{MovieStore, PgMovieStore};
use crate::permissions::{PermissionStore, PgPermissionStore};
use crate::tokens::{PgTokenStore, TokenStore};
use crate::users::{PgUserStore, UserStore};

/// Shared application state, cloned per request. Stores and the mailer are
/// trait objects so tests can substitute in-memory fakes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: PgPool,
    pub movies: Arc<dyn MovieStore>,
    pub users: Arc<dyn UserStore>,
    pub tokens: Arc<dyn TokenStore>,
    pub permissions: Arc<dyn PermissionStore>,
    pub mailer: Arc<dyn Mailer>,
    pub limiter: Arc<RateLimiter>,
    pub metrics: Arc<Metrics>,
    pub tasks: TaskTracker,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;
        let pool = db::connect(&config.db).await?;
        info!("database connection pool established");

        let limiter = Arc::new(RateLimiter::new(&config.limiter));
        {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.run_sweeper().await });
        }

        Ok(Self {
            movies: Arc::new(PgMovieStore::new(pool.clone())),
            users: Arc::new(PgUserStore::new(pool.clone())),
            tokens: Arc::new(PgTokenStore::new(pool.clone())),
            permissions: Arc::new(PgPermissionStore::new(pool.clone())),
            mailer: Arc::new(LogMailer::new(&config.smtp)),
            limiter,
            metrics: Arc::new(Metrics::default()),
            tasks: TaskTracker::new(),
            config: Arc::new(config),
            db: pool,
        })
    }

    /// Assembles a state from pre-built components. Intended for tests; the
    /// pool is lazy and never actually connects unless a store uses it.
    pub fn from_parts(
        config: AppConfig,
        movies: Arc<dyn MovieStore>,
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn TokenStore>,
        permissions: Arc<dyn PermissionStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let pool = PgPoolOptions::new().connect_lazy("postgres://localhost/unused");
        let pool = match pool {
            Ok(pool) => pool,
            Err(_) => unreachable!("lazy pool construction does not touch the network"),
        };

        let limiter = Arc::new(RateLimiter::new(&config.limiter));
        Self {
            config: Arc::new(config),
            db: pool,
            movies,
            users,
            tokens,
            permissions,
            mailer,
            limiter,
            metrics: Arc::new(Metrics::default()),
            tasks: TaskTracker::new(),
        }
    }

    /// Spawns a tracked background task. Panics are contained and logged so
    /// a misbehaving task can never take the process down.
    pub fn spawn_background<F>(&self, task: &'static str, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(async move {
            if std::panic::AssertUnwindSafe(fut)
                .catch_unwind()
                .await
                .is_err()
            {
                error!(task, "background task panicked");
            }
        });
    }
}
