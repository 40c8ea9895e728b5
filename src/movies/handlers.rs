use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::middleware::from_fn_with_state;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use time::OffsetDateTime;
use tracing::instrument;

use crate::errors::ApiError;
use crate::filters::Filters;
use crate::middleware::{require_movies_read, require_movies_write};
use crate::movies::dto::{CreateMovieRequest, ListMoviesParams, UpdateMovieRequest};
use crate::movies::repo::{validate_movie, Movie, SORT_SAFE_LIST};
use crate::movies::runtime::Runtime;
use crate::state::AppState;
use crate::validator::Validator;

pub fn routes(state: AppState) -> Router<AppState> {
    let read = Router::new()
        .route("/movies", get(list_movies))
        .route("/movies/:id", get(show_movie))
        .route_layer(from_fn_with_state(state.clone(), require_movies_read));

    let write = Router::new()
        .route("/movies", axum::routing::post(create_movie))
        .route(
            "/movies/:id",
            axum::routing::patch(update_movie).delete(delete_movie),
        )
        .route_layer(from_fn_with_state(state, require_movies_write));

    read.merge(write)
}

#[instrument(skip(state, params))]
pub async fn list_movies(
    State(state): State<AppState>,
    params: Result<Query<ListMoviesParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(params) = params?;

    let title = params.title.unwrap_or_default();
    // An empty tag set places no constraint, so `genres=` must behave the
    // same as omitting the parameter.
    let genres: Vec<String> = params
        .genres
        .as_deref()
        .map(|csv| {
            csv.split(',')
                .filter(|genre| !genre.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let filters = Filters {
        page: params.page.unwrap_or(1),
        page_size: params.page_size.unwrap_or(20),
        sort: params.sort.unwrap_or_else(|| "id".to_string()),
        safe_list: SORT_SAFE_LIST,
    };

    let mut v = Validator::new();
    filters.validate(&mut v);
    if !v.valid() {
        return Err(ApiError::FailedValidation(v.into_errors()));
    }

    let (movies, metadata) = state.movies.list(&title, &genres, &filters).await?;

    Ok(Json(json!({ "movies": movies, "metadata": metadata })))
}

#[instrument(skip(state))]
pub async fn show_movie(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id?;
    let movie = state.movies.get(id).await?;
    Ok(Json(json!({ "movie": movie })))
}

#[instrument(skip(state, payload))]
pub async fn create_movie(
    State(state): State<AppState>,
    payload: Result<Json<CreateMovieRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(input) = payload?;

    // Absent numeric fields become zero so validation reports them as
    // "must be provided".
    let mut movie = Movie {
        id: 0,
        created_at: OffsetDateTime::now_utc(),
        title: input.title,
        year: input.year.unwrap_or(0),
        runtime: input.runtime.unwrap_or(Runtime(0)),
        genres: input.genres,
        version: 0,
    };

    let mut v = Validator::new();
    validate_movie(&mut v, &movie);
    if !v.valid() {
        return Err(ApiError::FailedValidation(v.into_errors()));
    }

    state.movies.insert(&mut movie).await?;

    let location = format!("/v1/movies/{}", movie.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(json!({ "movie": movie })),
    ))
}

#[instrument(skip(state, payload))]
pub async fn update_movie(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateMovieRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id?;
    let Json(input) = payload?;

    let mut movie = state.movies.get(id).await?;

    if let Some(title) = input.title {
        movie.title = title;
    }
    if let Some(year) = input.year {
        movie.year = year;
    }
    if let Some(runtime) = input.runtime {
        movie.runtime = runtime;
    }
    if let Some(genres) = input.genres {
        movie.genres = genres;
    }

    let mut v = Validator::new();
    validate_movie(&mut v, &movie);
    if !v.valid() {
        return Err(ApiError::FailedValidation(v.into_errors()));
    }

    state.movies.update(&mut movie).await?;

    Ok(Json(json!({ "movie": movie })))
}

#[instrument(skip(state))]
pub async fn delete_movie(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id?;
    state.movies.delete(id).await?;
    Ok(Json(json!({ "message": "movie successfully deleted" })))
}
