use tracing::warn;
use tracing_subscriber::EnvFilter;

use cinelog::app::{build_app, serve};
use cinelog::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("cinelog=debug,axum=info,tower_http=info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let state = AppState::init().await?;

    if let Err(err) = sqlx::migrate!("./migrations").run(&state.db).await {
        // Concurrent deploys can race on the migration lock; the loser keeps
        // serving against the already-migrated schema.
        warn!(error = %err, "database migration failed");
    }

    let app = build_app(state.clone());
    serve(app, state).await
}
