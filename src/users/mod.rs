mod dto;
pub mod handlers;
pub mod password;
mod repo;

pub use repo::{validate_email, validate_user, PgUserStore, User, UserStore};

use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
