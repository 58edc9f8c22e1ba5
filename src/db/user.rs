use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::item::UserItem;
use crate::domain::user::{Role, User, UserStatus, UserSummary};
use crate::domain::wallet::Wallet;
use crate::usecases::{FindUserQuery, PresenceUpdate, UserRepository};

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Wallet top-up for the authenticated user. The positive-amount check
    /// is the only guard needed; credits cannot violate the non-negative
    /// balance constraint.
    pub async fn deposit(&self, user_id: Uuid, amount: Decimal) -> DomainResult<Decimal> {
        if amount <= Decimal::ZERO {
            return Err(DomainError::validation("deposit amount must be positive"));
        }

        let row = sqlx::query(
            r#"
            UPDATE wallets SET balance = balance + $1
            WHERE id = (SELECT wallet_id FROM users WHERE id = $2)
            RETURNING balance
            "#,
        )
        .bind(amount)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row.try_get("balance")?),
            None => Err(DomainError::NotFound("user")),
        }
    }

    async fn load_items(&self, user_id: Uuid) -> DomainResult<Vec<UserItem>> {
        let rows = sqlx::query(
            "SELECT item_id, quantity, buyed_per FROM user_items WHERE user_id = $1 AND quantity > 0",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(UserItem {
                    item_id: row.try_get("item_id")?,
                    quantity: row.try_get("quantity")?,
                    buyed_per: row.try_get("buyed_per")?,
                })
            })
            .collect()
    }

    fn map_user(row: &PgRow, user_items: Vec<UserItem>) -> DomainResult<User> {
        let role: String = row.try_get("role")?;
        let status: String = row.try_get("status")?;
        // the INNER JOIN guarantees the wallet columns; Wallet::new still
        // rejects a corrupted negative balance instead of carrying it
        let wallet = Wallet::new(row.try_get("wallet_id")?, row.try_get("balance")?)
            .map_err(|err| DomainError::Repository(format!("invalid wallet row: {err}")))?;

        Ok(User::new(
            row.try_get("id")?,
            row.try_get("name")?,
            row.try_get("email")?,
            Role::try_from(role.as_str())?,
            UserStatus::try_from(status.as_str())?,
            row.try_get("socket_id")?,
            row.try_get("avatar_url")?,
            wallet,
            user_items,
        ))
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by(&self, query: FindUserQuery) -> DomainResult<Option<User>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT u.id, u.name, u.email, u.role, u.status, u.socket_id, u.avatar_url,
                   w.id AS wallet_id, w.balance
            FROM users u
            INNER JOIN wallets w ON w.id = u.wallet_id
            WHERE 1 = 1
            "#,
        );
        if let Some(id) = query.id {
            builder.push(" AND u.id = ").push_bind(id);
        }
        if let Some(name) = query.name {
            builder.push(" AND u.name = ").push_bind(name);
        }
        if let Some(email) = query.email {
            builder.push(" AND u.email = ").push_bind(email);
        }
        if let Some(role) = query.role {
            builder.push(" AND u.role = ").push_bind(role.as_str());
        }
        if let Some(wallet_id) = query.wallet_id {
            builder.push(" AND u.wallet_id = ").push_bind(wallet_id);
        }
        if let Some(socket_id) = query.socket_id {
            builder.push(" AND u.socket_id = ").push_bind(socket_id);
        }

        let row = builder.build().fetch_optional(&self.pool).await?;
        match row {
            Some(row) => {
                let user_id: Uuid = row.try_get("id")?;
                let user_items = self.load_items(user_id).await?;
                Ok(Some(Self::map_user(&row, user_items)?))
            }
            None => Ok(None),
        }
    }

    async fn update_presence(&self, update: PresenceUpdate, id: Uuid) -> DomainResult<()> {
        let result = sqlx::query(
            "UPDATE users SET status = $1, socket_id = $2, updated_at = now() WHERE id = $3",
        )
        .bind(update.status.as_str())
        .bind(update.socket_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound("user"));
        }
        Ok(())
    }

    async fn list_online(&self, excluding: Uuid) -> DomainResult<Vec<UserSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, status, socket_id, avatar_url
            FROM users
            WHERE status = 'ONLINE' AND id <> $1
            "#,
        )
        .bind(excluding)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let status: String = row.try_get("status")?;
                Ok(UserSummary {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    status: UserStatus::try_from(status.as_str())?,
                    socket_id: row.try_get("socket_id")?,
                    avatar_url: row.try_get("avatar_url")?,
                })
            })
            .collect()
    }
}
