mod auth;
mod metrics;
mod rate_limit;

pub use auth::{
    authenticate, require_activated, require_authenticated, require_movies_read,
    require_movies_write, CurrentUser,
};
pub use metrics::{collect_metrics, metrics_handler, Metrics};
pub use rate_limit::{rate_limit, RateLimiter};
