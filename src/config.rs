use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimiterConfig {
    pub rps: f64,
    pub burst: u32,
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub sender: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub port: u16,
    pub env: String,
    pub db: DbConfig,
    pub limiter: LimiterConfig,
    pub smtp: SmtpConfig,
    pub cors_trusted_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let db = DbConfig {
            url: std::env::var("DATABASE_URL")?,
            max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(25),
            idle_timeout_secs: std::env::var("DB_IDLE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15 * 60),
        };

        let limiter = LimiterConfig {
            rps: std::env::var("LIMITER_RPS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2.0),
            burst: std::env::var("LIMITER_BURST")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4),
            enabled: std::env::var("LIMITER_ENABLED")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
        };

        let smtp = SmtpConfig {
            host: std::env::var("SMTP_HOST").unwrap_or_default(),
            port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(25),
            username: std::env::var("SMTP_USERNAME").unwrap_or_default(),
            password: std::env::var("SMTP_PASSWORD").unwrap_or_default(),
            sender: std::env::var("SMTP_SENDER")
                .unwrap_or_else(|_| "Cinelog <no-reply@cinelog.local>".into()),
        };

        // Space-separated list of exact origins, e.g. "https://a.example https://b.example".
        let cors_trusted_origins = std::env::var("CORS_TRUSTED_ORIGINS")
            .map(|v| v.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        Ok(Self {
            port: std::env::var("APP_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4000),
            env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
            db,
            limiter,
            smtp,
            cors_trusted_origins,
        })
    }
}
