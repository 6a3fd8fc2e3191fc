use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::error::{AppError, AppResult};

/// Creates a PostgreSQL connection pool
///
/// The pool is shared by the HTTP handlers and the sync job. Both only hold a
/// connection for the duration of a single query.
pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Applies pending migrations from `./migrations`
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}

/// Converts a count or offset into a SQL integer, rejecting values Postgres would see as negative
pub(crate) fn sql_int<T: TryFrom<usize>>(name: &str, value: usize) -> AppResult<T> {
    T::try_from(value).map_err(|_| AppError::InvalidInput(format!("{} is too large: {}", name, value)))
}
