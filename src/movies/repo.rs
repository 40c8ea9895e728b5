use async_trait::async_trait;
use serde::Serialize;
use sqlx::{PgPool, Row};
use time::OffsetDateTime;

use crate::db::{with_timeout, StoreError};
use crate::filters::{Filters, Metadata};
use crate::movies::runtime::Runtime;
use crate::validator::{unique, Validator};

/// Sort values accepted by the movie listing. Everything else is rejected
/// before any SQL is built.
pub const SORT_SAFE_LIST: &[&str] = &[
    "id", "title", "year", "runtime", "-id", "-title", "-year", "-runtime",
];

/// A catalog entry. `version` increments on every successful update and backs
/// the optimistic concurrency check.
#[derive(Debug, Clone, Serialize)]
pub struct Movie {
    pub id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub title: String,
    pub year: i32,
    pub runtime: Runtime,
    pub genres: Vec<String>,
    pub version: i32,
}

pub fn validate_movie(v: &mut Validator, movie: &Movie) {
    v.check(!movie.title.is_empty(), "title", "must be provided");
    v.check(
        movie.title.len() <= 500,
        "title",
        "must not be more than 500 bytes long",
    );

    v.check(movie.year != 0, "year", "must be provided");
    v.check(movie.year >= 1888, "year", "must be greater than 1888");
    v.check(
        movie.year <= OffsetDateTime::now_utc().year(),
        "year",
        "must not be in the future",
    );

    v.check(movie.runtime.0 != 0, "runtime", "must be provided");
    v.check(movie.runtime.0 > 0, "runtime", "must be a positive integer");

    v.check(!movie.genres.is_empty(), "genres", "must contain at least 1 genre");
    v.check(
        movie.genres.len() <= 5,
        "genres",
        "must not contain more than 5 genres",
    );
    v.check(
        unique(&movie.genres),
        "genres",
        "must not contain duplicate values",
    );
}

#[async_trait]
pub trait MovieStore: Send + Sync {
    async fn insert(&self, movie: &mut Movie) -> Result<(), StoreError>;
    async fn get(&self, id: i64) -> Result<Movie, StoreError>;

    /// Version-checked update. A stale version surfaces as
    /// [`StoreError::EditConflict`].
    async fn update(&self, movie: &mut Movie) -> Result<(), StoreError>;
    async fn delete(&self, id: i64) -> Result<(), StoreError>;

    /// Full-text title filter plus genre containment, paginated and sorted
    /// per `filters`. Returns the page of movies and the pre-pagination
    /// metadata.
    async fn list(
        &self,
        title: &str,
        genres: &[String],
        filters: &Filters,
    ) -> Result<(Vec<Movie>, Metadata), StoreError>;
}

pub struct PgMovieStore {
    db: PgPool,
}

impl PgMovieStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn movie_from_row(row: &sqlx::postgres::PgRow) -> Result<Movie, sqlx::Error> {
    Ok(Movie {
        id: row.try_get("id")?,
        created_at: row.try_get("created_at")?,
        title: row.try_get("title")?,
        year: row.try_get("year")?,
        runtime: Runtime(row.try_get("runtime")?),
        genres: row.try_get("genres")?,
        version: row.try_get("version")?,
    })
}

#[async_trait]
impl MovieStore for PgMovieStore {
    async fn insert(&self, movie: &mut Movie) -> Result<(), StoreError> {
        let row = with_timeout(
            sqlx::query(
                r#"
                INSERT INTO movies (title, year, runtime, genres)
                VALUES ($1, $2, $3, $4)
                RETURNING id, created_at, version
                "#,
            )
            .bind(&movie.title)
            .bind(movie.year)
            .bind(movie.runtime.0)
            .bind(&movie.genres)
            .fetch_one(&self.db),
        )
        .await?;

        movie.id = row.try_get("id").map_err(StoreError::from)?;
        movie.created_at = row.try_get("created_at").map_err(StoreError::from)?;
        movie.version = row.try_get("version").map_err(StoreError::from)?;
        Ok(())
    }

    async fn get(&self, id: i64) -> Result<Movie, StoreError> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }

        let row = with_timeout(
            sqlx::query(
                r#"
                SELECT id, created_at, title, year, runtime, genres, version
                FROM movies
                WHERE id = $1
                "#,
            )
            .bind(id)
            .fetch_one(&self.db),
        )
        .await?;

        movie_from_row(&row).map_err(StoreError::from)
    }

    async fn update(&self, movie: &mut Movie) -> Result<(), StoreError> {
        let version = with_timeout(
            sqlx::query_scalar::<_, i32>(
                r#"
                UPDATE movies
                SET title = $1, year = $2, runtime = $3, genres = $4,
                    version = version + 1
                WHERE id = $5 AND version = $6
                RETURNING version
                "#,
            )
            .bind(&movie.title)
            .bind(movie.year)
            .bind(movie.runtime.0)
            .bind(&movie.genres)
            .bind(movie.id)
            .bind(movie.version)
            .fetch_one(&self.db),
        )
        .await
        .map_err(|err| match err {
            // Row gone or version moved on; the caller re-fetches and retries.
            StoreError::NotFound => StoreError::EditConflict,
            other => other,
        })?;

        movie.version = version;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }

        let result = with_timeout(
            sqlx::query("DELETE FROM movies WHERE id = $1")
                .bind(id)
                .execute(&self.db),
        )
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list(
        &self,
        title: &str,
        genres: &[String],
        filters: &Filters,
    ) -> Result<(Vec<Movie>, Metadata), StoreError> {
        let column = filters
            .sort_column()
            .ok_or_else(|| StoreError::UnsafeSort(filters.sort.clone()))?;
        let direction = filters.sort_direction();

        // Only the safe-listed column name and the fixed direction keyword
        // are interpolated; all client values travel as bind parameters.
        let query = format!(
            r#"
            SELECT count(*) OVER() AS total_records,
                   id, created_at, title, year, runtime, genres, version
            FROM movies
            WHERE (to_tsvector('simple', title) @@ plainto_tsquery('simple', $1) OR $1 = '')
              AND (genres @> $2 OR $2 = '{{}}')
            ORDER BY {column} {direction}, id ASC
            LIMIT $3 OFFSET $4
            "#
        );

        let rows = with_timeout(
            sqlx::query(&query)
                .bind(title)
                .bind(genres)
                .bind(filters.limit())
                .bind(filters.offset())
                .fetch_all(&self.db),
        )
        .await?;

        let mut total_records = 0i64;
        let mut movies = Vec::with_capacity(rows.len());
        for row in &rows {
            total_records = row.try_get("total_records").map_err(StoreError::from)?;
            movies.push(movie_from_row(row).map_err(StoreError::from)?);
        }

        let metadata = Metadata::calculate(total_records, filters.page, filters.page_size);
        Ok((movies, metadata))
    }
}
