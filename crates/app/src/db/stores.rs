//! `PostgreSQL` store directory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use stock_sync_core::{ShopDomain, ShopId};

use super::{
    NewStore, RepositoryError, StoreDirectory, StoreRecord, join_scopes, split_scopes,
};

// =============================================================================
// Rows
// =============================================================================

/// Internal row type for `PostgreSQL` queries.
#[derive(sqlx::FromRow)]
struct StoreRow {
    shop_id: i64,
    shop_domain: String,
    access_token: String,
    scopes: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<StoreRow> for StoreRecord {
    type Error = RepositoryError;

    fn try_from(row: StoreRow) -> Result<Self, Self::Error> {
        let shop_id = u64::try_from(row.shop_id).map_err(|_| {
            RepositoryError::DataCorruption(format!("negative shop_id {}", row.shop_id))
        })?;
        let shop_domain = ShopDomain::parse(&row.shop_domain).map_err(|e| {
            RepositoryError::DataCorruption(format!("shop_domain {:?}: {e}", row.shop_domain))
        })?;

        Ok(Self {
            shop_id: ShopId::new(shop_id),
            shop_domain,
            access_token: SecretString::from(row.access_token),
            scopes: split_scopes(&row.scopes),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_STORE: &str = r"
    SELECT shop_id, shop_domain, access_token, scopes, created_at, updated_at
    FROM stock_sync.stores
";

// =============================================================================
// Repository
// =============================================================================

/// Store directory backed by the `stock_sync.stores` table.
#[derive(Debug, Clone)]
pub struct StoreRepository {
    pool: PgPool,
}

impl StoreRepository {
    /// Create a new store repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn map_unique_violation(err: sqlx::Error, shop_domain: &ShopDomain) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!(
            "shop domain {shop_domain} belongs to another shop"
        ));
    }
    RepositoryError::Database(err)
}

#[async_trait]
impl StoreDirectory for StoreRepository {
    async fn find_by_domain(
        &self,
        shop: &ShopDomain,
    ) -> Result<Option<StoreRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(&format!("{SELECT_STORE} WHERE shop_domain = $1"))
            .bind(shop)
            .fetch_optional(&self.pool)
            .await?;

        row.map(StoreRecord::try_from).transpose()
    }

    async fn upsert(&self, store: &NewStore) -> Result<StoreRecord, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(
            r"
            INSERT INTO stock_sync.stores (shop_id, shop_domain, access_token, scopes)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (shop_id) DO UPDATE SET
                shop_domain = EXCLUDED.shop_domain,
                access_token = EXCLUDED.access_token,
                scopes = EXCLUDED.scopes,
                updated_at = (CURRENT_TIMESTAMP AT TIME ZONE 'utc')
            RETURNING shop_id, shop_domain, access_token, scopes, created_at, updated_at
            ",
        )
        .bind(store.shop_id)
        .bind(&store.shop_domain)
        .bind(store.access_token.expose_secret())
        .bind(join_scopes(&store.scopes))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &store.shop_domain))?;

        StoreRecord::try_from(row)
    }

    async fn delete_by_domain(&self, shop: &ShopDomain) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM stock_sync.stores WHERE shop_domain = $1")
            .bind(shop)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> Result<Vec<StoreRecord>, RepositoryError> {
        let rows = sqlx::query_as::<_, StoreRow>(&format!("{SELECT_STORE} ORDER BY shop_domain"))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(StoreRecord::try_from).collect()
    }

    async fn health_check(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
