use serde::Deserialize;

use crate::movies::runtime::Runtime;

/// Request body for creating a movie. Optional fields let validation report
/// "must be provided" rather than failing at the deserializer.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateMovieRequest {
    #[serde(default)]
    pub title: String,
    pub year: Option<i32>,
    pub runtime: Option<Runtime>,
    #[serde(default)]
    pub genres: Vec<String>,
}

/// Request body for a partial update. An omitted field preserves the stored
/// value.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateMovieRequest {
    pub title: Option<String>,
    pub year: Option<i32>,
    pub runtime: Option<Runtime>,
    pub genres: Option<Vec<String>>,
}

/// Query string parameters for the filtered listing.
#[derive(Debug, Deserialize)]
pub struct ListMoviesParams {
    pub title: Option<String>,
    /// Comma-separated genre tags.
    pub genres: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub sort: Option<String>,
}
