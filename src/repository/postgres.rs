use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;

use super::{
    CreateShopParams, FollowShopParams, Shop, ShopStore, StoreError, UpdateShopNameParams,
};

/// Postgres-backed shop store. Queries are bound at runtime so the build
/// never needs a live database.
pub struct PgShopStore {
    pool: PgPool,
}

impl PgShopStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShopStore for PgShopStore {
    async fn create_shop(&self, params: CreateShopParams) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO shops (owner_id, name, avatar) VALUES ($1, $2, $3)")
            .bind(params.owner_id)
            .bind(&params.name)
            .bind(&params.avatar)
            .execute(&self.pool)
            .await?;

        tracing::debug!(
            owner_id = params.owner_id,
            name = %params.name,
            "created shop row"
        );
        Ok(())
    }

    async fn shop_by_id(&self, shop_id: i64) -> Result<Shop, StoreError> {
        let row = sqlx::query(
            "SELECT id, owner_id, name, avatar, created_at FROM shops WHERE id = $1",
        )
        .bind(shop_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::ShopNotFound(shop_id))?;

        Ok(Shop {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            name: row.try_get("name")?,
            avatar: row.try_get("avatar")?,
            created_at: row.try_get("created_at")?,
        })
    }

    async fn update_shop_name(&self, params: UpdateShopNameParams) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE shops SET name = $1 WHERE owner_id = $2")
            .bind(&params.name)
            .bind(params.owner_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            tracing::warn!(
                owner_id = params.owner_id,
                "shop name update matched no shop row"
            );
        }
        Ok(())
    }

    async fn follow_shop(&self, params: FollowShopParams) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO shop_followers (shop_id, follower_id) VALUES ($1, $2) \
             ON CONFLICT (shop_id, follower_id) DO NOTHING",
        )
        .bind(params.shop_id)
        .bind(params.follower_id)
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            shop_id = params.shop_id,
            follower_id = params.follower_id,
            "recorded follow edge"
        );
        Ok(())
    }
}

// ============================================================================
// Integration Test Notes
// ============================================================================
//
// These queries run against a schema created by migrations/0001_shops.sql
// and are exercised end to end in the platform's integration environment:
//
// 1. create_shop persists NULL when no avatar was supplied
// 2. shop_by_id distinguishes a missing row (ShopNotFound) from a
//    connection failure (Database)
// 3. update_shop_name touches only the caller's shop and is a no-op for
//    owners without one
// 4. follow_shop is idempotent thanks to ON CONFLICT DO NOTHING
//
// The orchestrator's behavior on top of this trait is unit tested with an
// in-memory store double in src/service/.
//
// ============================================================================
