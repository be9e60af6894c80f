//! Database connection lifecycle. Connect and disconnect log their outcome
//! and never fail the caller.

use crate::config::DatabaseSettings;
use crate::error::StoreError;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool};
use std::str::FromStr;

/// Open a pool. Returns `None` (after logging) when the URL is malformed or
/// the server is unreachable.
pub async fn connect(settings: &DatabaseSettings) -> Option<PgPool> {
    let options = match PgConnectOptions::from_str(&settings.url) {
        Ok(o) => o,
        Err(e) => {
            tracing::error!(error = %e, "invalid DATABASE_URL");
            return None;
        }
    };
    let options = if settings.debug {
        options
    } else {
        options.disable_statement_logging()
    };
    match PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect_with(options)
        .await
    {
        Ok(pool) => {
            tracing::info!(max_connections = settings.max_connections, "database connected");
            Some(pool)
        }
        Err(e) => {
            tracing::error!(error = %e, "database connection failed");
            None
        }
    }
}

pub async fn disconnect(pool: PgPool) {
    pool.close().await;
    tracing::info!("database disconnected");
}

/// Create the database named in `database_url` if it does not exist, by
/// connecting to the `postgres` maintenance database on the same server.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), StoreError> {
    let (admin_url, db_name) = split_database_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = PgConnectOptions::from_str(&admin_url)?;
    let mut conn = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", quote_ident(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

fn split_database_url(url: &str) -> Result<(String, String), StoreError> {
    let scheme_end = url.find("://").map(|i| i + 3).unwrap_or(0);
    let path_start = url[scheme_end..]
        .find('/')
        .map(|i| scheme_end + i + 1)
        .ok_or_else(|| StoreError::Backend("DATABASE_URL: no database path".into()))?;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    Ok((format!("{}postgres", base), db_name.to_string()))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
