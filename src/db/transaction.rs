use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::domain::error::DomainResult;
use crate::domain::transaction::{Transaction, TransactionRecord, TransactionStatus};
use crate::usecases::{ListTransactionsQuery, TransactionRepository};

pub struct PgTransactionRepository {
    pool: PgPool,
}

#[derive(FromRow)]
struct TransactionRow {
    id: Uuid,
    from_wallet: Uuid,
    to_wallet: Uuid,
    announcement_id: Uuid,
    status: String,
    quantity_items_asked: i32,
    amount: Decimal,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for TransactionRecord {
    type Error = crate::domain::error::DomainError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            from_wallet: row.from_wallet,
            to_wallet: row.to_wallet,
            announcement_id: row.announcement_id,
            status: TransactionStatus::try_from(row.status.as_str())?,
            quantity_items_asked: row.quantity_items_asked,
            amount: row.amount,
            created_at: row.created_at,
        })
    }
}

impl PgTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Terminal records that moved no funds (REJECTED/FAILED) are written
    // outside the settlement transaction, after its rollback.
    async fn insert_record(&self, record: TransactionRecord) -> DomainResult<TransactionRecord> {
        sqlx::query(
            r#"
            INSERT INTO transactions
                (id, from_wallet, to_wallet, announcement_id, status,
                 quantity_items_asked, amount, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now())
            "#,
        )
        .bind(record.id)
        .bind(record.from_wallet)
        .bind(record.to_wallet)
        .bind(record.announcement_id)
        .bind(record.status.as_str())
        .bind(record.quantity_items_asked)
        .bind(record.amount)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(record)
    }
}

#[async_trait]
impl TransactionRepository for PgTransactionRepository {
    /// Settlement as conditional updates: the announcement quantity and
    /// the buyer balance are both decremented with a sufficiency guard in
    /// the WHERE clause, so two racing settlements can never both succeed
    /// on the same wallet or the same last items.
    async fn settle(&self, transaction: Transaction) -> DomainResult<TransactionRecord> {
        let quantity = transaction.quantity_items_asked();
        let amount = transaction.amount();
        let announcement_id = transaction.announcement().id();
        let item_id = transaction.announcement().item_id();
        let unit_price = transaction.announcement().value_per_item();
        let from_wallet = transaction.from().id();
        let to_wallet = transaction.to().id();
        let mut transaction = transaction;

        let mut tx = self.pool.begin().await?;

        let reserved = sqlx::query(
            r#"
            UPDATE announcements SET quantity_available = quantity_available - $1
            WHERE id = $2 AND quantity_available >= $1
            "#,
        )
        .bind(quantity)
        .bind(announcement_id)
        .execute(&mut *tx)
        .await?;

        if reserved.rows_affected() == 0 {
            tx.rollback().await?;
            tracing::warn!(
                announcement = %announcement_id,
                quantity,
                "trade rejected, announcement cannot supply the quantity"
            );
            transaction.reject()?;
            return self.insert_record(transaction.record()).await;
        }

        let debited = sqlx::query(
            r#"
            UPDATE wallets SET balance = balance - $1
            WHERE id = $2 AND balance >= $1
            "#,
        )
        .bind(amount)
        .bind(from_wallet)
        .execute(&mut *tx)
        .await?;

        if debited.rows_affected() == 0 {
            tx.rollback().await?;
            tracing::warn!(
                wallet = %from_wallet,
                amount = %amount,
                "settlement failed, insufficient funds"
            );
            transaction.fail()?;
            return self.insert_record(transaction.record()).await;
        }

        sqlx::query("UPDATE wallets SET balance = balance + $1 WHERE id = $2")
            .bind(amount)
            .bind(to_wallet)
            .execute(&mut *tx)
            .await?;

        // traded items land in the buyer's holding lot at the trade price
        sqlx::query(
            r#"
            INSERT INTO user_items (user_id, item_id, quantity, buyed_per)
            SELECT id, $2, $3, $4 FROM users WHERE wallet_id = $1
            ON CONFLICT (user_id, item_id)
            DO UPDATE SET quantity = user_items.quantity + EXCLUDED.quantity,
                          buyed_per = EXCLUDED.buyed_per
            "#,
        )
        .bind(from_wallet)
        .bind(item_id)
        .bind(quantity)
        .bind(unit_price)
        .execute(&mut *tx)
        .await?;

        transaction.accept()?;
        let record = transaction.record();

        sqlx::query(
            r#"
            INSERT INTO transactions
                (id, from_wallet, to_wallet, announcement_id, status,
                 quantity_items_asked, amount, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now())
            "#,
        )
        .bind(record.id)
        .bind(record.from_wallet)
        .bind(record.to_wallet)
        .bind(record.announcement_id)
        .bind(record.status.as_str())
        .bind(record.quantity_items_asked)
        .bind(record.amount)
        .bind(record.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(transaction = %record.id, amount = %amount, "trade settled");
        Ok(record)
    }

    async fn list(&self, query: ListTransactionsQuery) -> DomainResult<Vec<TransactionRecord>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT id, from_wallet, to_wallet, announcement_id, status,
                   quantity_items_asked, amount, created_at
            FROM transactions
            WHERE 1 = 1
            "#,
        );
        if let Some(status) = query.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(from_wallet) = query.from_wallet {
            builder.push(" AND from_wallet = ").push_bind(from_wallet);
        }
        if let Some(to_wallet) = query.to_wallet {
            builder.push(" AND to_wallet = ").push_bind(to_wallet);
        }
        if let Some(wallet) = query.wallet {
            builder
                .push(" AND (from_wallet = ")
                .push_bind(wallet)
                .push(" OR to_wallet = ")
                .push_bind(wallet)
                .push(")");
        }
        builder.push(" ORDER BY created_at DESC");

        let rows: Vec<TransactionRow> = builder
            .build_query_as::<TransactionRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TransactionRecord::try_from).collect()
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<TransactionRecord>> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT id, from_wallet, to_wallet, announcement_id, status,
                   quantity_items_asked, amount, created_at
            FROM transactions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TransactionRecord::try_from).transpose()
    }
}
