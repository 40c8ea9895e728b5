mod dto;
pub mod handlers;
mod repo;
mod runtime;

pub use repo::{validate_movie, Movie, MovieStore, PgMovieStore, SORT_SAFE_LIST};
pub use runtime::Runtime;

use axum::Router;

use crate::state::AppState;

pub fn router(state: AppState) -> Router<AppState> {
    handlers::routes(state)
}
