pub mod handlers;
mod repo;

pub use repo::{
    generate_token, hash_plaintext, validate_token_plaintext, PgTokenStore, Token, TokenStore,
    SCOPE_ACTIVATION, SCOPE_AUTHENTICATION,
};

use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
