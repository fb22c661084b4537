// ============================================================================
// Shop Store - the only state this service owns
// ============================================================================
//
// Shops and follow edges live in Postgres; products and accounts belong to
// other services. The store is a trait so the orchestrator can be exercised
// against an in-memory double.
//
// ============================================================================

mod postgres;

pub use postgres::PgShopStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("shop {0} not found")]
    ShopNotFound(i64),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A shop row as stored in Postgres.
#[derive(Debug, Clone, PartialEq)]
pub struct Shop {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateShopParams {
    pub owner_id: i64,
    pub name: String,
    /// `None` is stored as NULL; shops without an avatar render a default.
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateShopNameParams {
    pub owner_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowShopParams {
    pub shop_id: i64,
    pub follower_id: i64,
}

#[async_trait]
pub trait ShopStore: Send + Sync {
    async fn create_shop(&self, params: CreateShopParams) -> Result<(), StoreError>;

    async fn shop_by_id(&self, shop_id: i64) -> Result<Shop, StoreError>;

    /// Renames the shop owned by `owner_id`. Owners without a shop row make
    /// this a no-op, matching the platform's historical behavior.
    async fn update_shop_name(&self, params: UpdateShopNameParams) -> Result<(), StoreError>;

    /// Records a follow edge. Following a shop twice is a no-op.
    async fn follow_shop(&self, params: FollowShopParams) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error_names_the_shop() {
        let err = StoreError::ShopNotFound(17);
        assert_eq!(err.to_string(), "shop 17 not found");
    }

    #[test]
    fn test_database_errors_wrap_the_sqlx_cause() {
        let err = StoreError::from(sqlx::Error::PoolTimedOut);
        assert!(err.to_string().starts_with("database error"));
    }
}
