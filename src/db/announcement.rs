use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::domain::announcement::{Announcement, AnnouncementOwner, AnnouncementSummary};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::item::Item;
use crate::domain::wallet::Wallet;
use crate::usecases::{AnnouncementRepository, FindAnnouncementQuery};

pub struct PgAnnouncementRepository {
    pool: PgPool,
}

impl PgAnnouncementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Posting an offer takes the quantity out of the owner's holding lot
    /// first; an owner cannot announce more items than they hold.
    pub async fn create(
        &self,
        owner_id: Uuid,
        item_id: Uuid,
        value_per_item: Decimal,
        quantity_available: i32,
    ) -> DomainResult<Uuid> {
        if value_per_item <= Decimal::ZERO {
            return Err(DomainError::validation("value per item must be positive"));
        }
        if quantity_available <= 0 {
            return Err(DomainError::validation(
                "announced quantity must be greater than 0",
            ));
        }

        let mut tx = self.pool.begin().await?;

        let reserved = sqlx::query(
            r#"
            UPDATE user_items SET quantity = quantity - $1
            WHERE user_id = $2 AND item_id = $3 AND quantity >= $1
            "#,
        )
        .bind(quantity_available)
        .bind(owner_id)
        .bind(item_id)
        .execute(&mut *tx)
        .await?;

        if reserved.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(DomainError::business_rule(
                "not enough items held to announce",
            ));
        }

        let id: Uuid = sqlx::query(
            r#"
            INSERT INTO announcements (user_id, item_id, value_per_item, quantity_available)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(owner_id)
        .bind(item_id)
        .bind(value_per_item)
        .bind(quantity_available)
        .fetch_one(&mut *tx)
        .await?
        .try_get("id")?;

        tx.commit().await?;
        tracing::info!(announcement = %id, owner = %owner_id, "announcement posted");
        Ok(id)
    }

    pub async fn list_open(&self) -> DomainResult<Vec<AnnouncementSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT a.id, a.user_id, u.name AS owner_name, a.item_id,
                   a.value_per_item, a.quantity_available
            FROM announcements a
            INNER JOIN users u ON u.id = a.user_id
            WHERE a.quantity_available > 0
            ORDER BY a.created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(AnnouncementSummary {
                    id: row.try_get("id")?,
                    owner_id: row.try_get("user_id")?,
                    owner_name: row.try_get("owner_name")?,
                    item_id: row.try_get("item_id")?,
                    value_per_item: row.try_get("value_per_item")?,
                    quantity_available: row.try_get("quantity_available")?,
                })
            })
            .collect()
    }

    pub async fn list_items(&self) -> DomainResult<Vec<Item>> {
        let rows = sqlx::query("SELECT id, name FROM items ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(Item {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                })
            })
            .collect()
    }

    pub async fn create_item(&self, name: &str) -> DomainResult<Uuid> {
        if name.trim().is_empty() {
            return Err(DomainError::validation("item name cannot be empty"));
        }
        let id = sqlx::query("INSERT INTO items (name) VALUES ($1) RETURNING id")
            .bind(name)
            .fetch_one(&self.pool)
            .await?
            .try_get("id")?;
        Ok(id)
    }

    /// Admin path seeding a user's holding lot; trades are the only other
    /// way item quantities grow.
    pub async fn grant_items(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> DomainResult<()> {
        if quantity <= 0 {
            return Err(DomainError::validation(
                "granted quantity must be greater than 0",
            ));
        }
        sqlx::query(
            r#"
            INSERT INTO user_items (user_id, item_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, item_id)
            DO UPDATE SET quantity = user_items.quantity + EXCLUDED.quantity
            "#,
        )
        .bind(user_id)
        .bind(item_id)
        .bind(quantity)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl AnnouncementRepository for PgAnnouncementRepository {
    async fn find_by(&self, query: FindAnnouncementQuery) -> DomainResult<Option<Announcement>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT a.id, a.item_id, a.value_per_item, a.quantity_available,
                   u.id AS owner_id, u.name AS owner_name,
                   w.id AS wallet_id, w.balance
            FROM announcements a
            INNER JOIN users u ON u.id = a.user_id
            INNER JOIN wallets w ON w.id = u.wallet_id
            WHERE 1 = 1
            "#,
        );
        if let Some(id) = query.id {
            builder.push(" AND a.id = ").push_bind(id);
        }
        if let Some(owner_id) = query.owner_id {
            builder.push(" AND a.user_id = ").push_bind(owner_id);
        }

        let row = builder.build().fetch_optional(&self.pool).await?;
        row.map(|row| {
            let wallet = Wallet::new(row.try_get("wallet_id")?, row.try_get("balance")?)
                .map_err(|err| DomainError::Repository(format!("invalid wallet row: {err}")))?;
            Announcement::new(
                row.try_get("id")?,
                AnnouncementOwner {
                    id: row.try_get("owner_id")?,
                    name: row.try_get("owner_name")?,
                    wallet,
                },
                row.try_get("item_id")?,
                row.try_get("value_per_item")?,
                row.try_get("quantity_available")?,
            )
            .map_err(|err| DomainError::Repository(format!("invalid announcement row: {err}")))
        })
        .transpose()
    }
}
