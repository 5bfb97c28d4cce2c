use chrono::{DateTime, Utc};
use housia_core::AppError;
use housia_core::models::{Listing, NewListing};
use housia_core::traits::ListingStore;
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

const LISTING_COLUMNS: &str = "id, name, description, price, size, city, post_code, rooms, dpe, url, \
     is_favorite, is_archived, is_housia_picked, is_user_picked, created_at";

/// Repository for scraped listings in PostgreSQL.
///
/// The `houses.url` unique constraint is the final arbiter of duplicates.
#[derive(Clone)]
pub struct ListingRepository {
    pool: Pool<Postgres>,
}

impl ListingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ListingStore for ListingRepository {
    async fn find_by_url(&self, url: &str) -> Result<Option<Listing>, AppError> {
        let row = sqlx::query_as::<_, ListingRow>(&format!(
            "SELECT {LISTING_COLUMNS} FROM houses WHERE url = $1"
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await
        .map_err(lookup_error)?;

        Ok(row.map(Into::into))
    }

    async fn create(&self, listing: &NewListing) -> Result<Listing, AppError> {
        let row = sqlx::query_as::<_, ListingRow>(&format!(
            r#"
            INSERT INTO houses (name, description, price, size, city, post_code, rooms, dpe, url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {LISTING_COLUMNS}
            "#
        ))
        .bind(&listing.name)
        .bind(&listing.description)
        .bind(listing.price)
        .bind(listing.size)
        .bind(&listing.city)
        .bind(&listing.post_code)
        .bind(listing.rooms)
        .bind(&listing.dpe)
        .bind(&listing.url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::DuplicateError(listing.url.clone())
            }
            other => AppError::PersistenceError(other.to_string()),
        })?;

        tracing::debug!(listing_id = %row.id, url = %row.url, "Listing stored");
        Ok(row.into())
    }
}

/// Unreachable database is a connection problem, anything else a store failure.
fn lookup_error(e: sqlx::Error) -> AppError {
    match e {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            AppError::ConnectionError(e.to_string())
        }
        other => AppError::PersistenceError(other.to_string()),
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct ListingRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    price: f64,
    size: f64,
    city: String,
    post_code: String,
    rooms: i32,
    dpe: Option<String>,
    url: String,
    is_favorite: bool,
    is_archived: bool,
    is_housia_picked: bool,
    is_user_picked: bool,
    created_at: DateTime<Utc>,
}

impl From<ListingRow> for Listing {
    fn from(row: ListingRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            size: row.size,
            city: row.city,
            post_code: row.post_code,
            rooms: row.rooms,
            dpe: row.dpe,
            url: row.url,
            is_favorite: row.is_favorite,
            is_archived: row.is_archived,
            is_housia_picked: row.is_housia_picked,
            is_user_picked: row.is_user_picked,
            created_at: row.created_at,
        }
    }
}
