use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::announcement::Announcement;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::item::UserItem;
use crate::domain::transaction::{Transaction, TransactionRecord};
use crate::domain::user::{User, UserStatus, UserSummary};
use crate::domain::wallet::Wallet;
use crate::usecases::{
    AnnouncementRepository, FindAnnouncementQuery, FindUserQuery, ListTransactionsQuery,
    PresenceUpdate, TransactionRepository, UserRepository,
};

/// Store over shared hash maps, standing in for Postgres in unit tests.
/// Settlement takes the users write lock for its whole critical section,
/// which serializes concurrent settlements the way the conditional SQL
/// update does.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
    announcements: Arc<RwLock<HashMap<Uuid, Announcement>>>,
    records: Arc<RwLock<Vec<TransactionRecord>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: User) {
        self.users.write().await.insert(user.id, user);
    }

    pub async fn insert_announcement(&self, announcement: Announcement) {
        self.announcements
            .write()
            .await
            .insert(announcement.id(), announcement);
    }

    pub async fn insert_record(&self, record: TransactionRecord) {
        self.records.write().await.push(record);
    }

    pub async fn balance_of(&self, wallet_id: Uuid) -> Option<rust_decimal::Decimal> {
        let users = self.users.read().await;
        users
            .values()
            .find(|u| u.wallet.id() == wallet_id)
            .map(|u| u.wallet.balance())
    }

    fn holder_of(
        users: &HashMap<Uuid, User>,
        wallet_id: Uuid,
    ) -> DomainResult<(Uuid, Wallet)> {
        users
            .values()
            .find(|u| u.wallet.id() == wallet_id)
            .map(|u| (u.id, u.wallet.clone()))
            .ok_or(DomainError::NotFound("wallet"))
    }
}

#[async_trait]
impl TransactionRepository for InMemoryStore {
    async fn settle(&self, mut transaction: Transaction) -> DomainResult<TransactionRecord> {
        let announcement_id = transaction.announcement().id();
        let item_id = transaction.announcement().item_id();
        let unit_price = transaction.announcement().value_per_item();
        let quantity = transaction.quantity_items_asked();
        let from_wallet = transaction.from().id();
        let to_wallet = transaction.to().id();

        let mut users = self.users.write().await;
        let mut announcements = self.announcements.write().await;

        let announcement = announcements
            .get_mut(&announcement_id)
            .ok_or(DomainError::NotFound("announcement"))?;

        if !announcement.can_supply(quantity) {
            transaction.reject()?;
            let record = transaction.record();
            self.records.write().await.push(record.clone());
            return Ok(record);
        }

        let (from_user, current_from) = Self::holder_of(&users, from_wallet)?;
        let (to_user, current_to) = Self::holder_of(&users, to_wallet)?;
        transaction.refresh_parties(current_from, current_to)?;

        match transaction.settle() {
            Ok(()) => {
                announcement.reserve(quantity)?;
                let settled_from = transaction.from().clone();
                let settled_to = transaction.to().clone();
                if let Some(buyer) = users.get_mut(&from_user) {
                    buyer.wallet = settled_from;
                    match buyer.user_items.iter_mut().find(|i| i.item_id == item_id) {
                        Some(lot) => {
                            lot.quantity += quantity;
                            lot.buyed_per = unit_price;
                        }
                        None => buyer.user_items.push(UserItem {
                            item_id,
                            quantity,
                            buyed_per: unit_price,
                        }),
                    }
                }
                if let Some(seller) = users.get_mut(&to_user) {
                    seller.wallet = settled_to;
                }
            }
            Err(DomainError::InsufficientFunds { .. }) => {}
            Err(other) => return Err(other),
        }

        let record = transaction.record();
        self.records.write().await.push(record.clone());
        Ok(record)
    }

    async fn list(&self, query: ListTransactionsQuery) -> DomainResult<Vec<TransactionRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| query.status.map_or(true, |s| r.status == s))
            .filter(|r| query.from_wallet.map_or(true, |w| r.from_wallet == w))
            .filter(|r| query.to_wallet.map_or(true, |w| r.to_wallet == w))
            .filter(|r| {
                query
                    .wallet
                    .map_or(true, |w| r.from_wallet == w || r.to_wallet == w)
            })
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<TransactionRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_by(&self, query: FindUserQuery) -> DomainResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| {
                query.id.map_or(true, |id| u.id == id)
                    && query.name.as_deref().map_or(true, |n| u.name == n)
                    && query.email.as_deref().map_or(true, |e| u.email == e)
                    && query.role.map_or(true, |r| u.role == r)
                    && query.wallet_id.map_or(true, |w| u.wallet.id() == w)
                    && query
                        .socket_id
                        .as_deref()
                        .map_or(true, |s| u.socket_id.as_deref() == Some(s))
            })
            .cloned())
    }

    async fn update_presence(&self, update: PresenceUpdate, id: Uuid) -> DomainResult<()> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(DomainError::NotFound("user"))?;
        user.status = update.status;
        user.socket_id = update.socket_id;
        Ok(())
    }

    async fn list_online(&self, excluding: Uuid) -> DomainResult<Vec<UserSummary>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .filter(|u| u.status == UserStatus::Online && u.id != excluding)
            .map(UserSummary::from)
            .collect())
    }
}

#[async_trait]
impl AnnouncementRepository for InMemoryStore {
    async fn find_by(&self, query: FindAnnouncementQuery) -> DomainResult<Option<Announcement>> {
        let announcements = self.announcements.read().await;
        Ok(announcements
            .values()
            .find(|a| {
                query.id.map_or(true, |id| a.id() == id)
                    && query.owner_id.map_or(true, |o| a.owner().id == o)
            })
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::announcement::AnnouncementOwner;
    use crate::domain::transaction::{NewTransaction, TransactionStatus};
    use crate::domain::user::Role;
    use rust_decimal::Decimal;

    fn user(name: &str, balance: i64) -> User {
        User::new(
            Uuid::new_v4(),
            name.to_string(),
            format!("{name}@example.com"),
            Role::User,
            UserStatus::Online,
            None,
            None,
            Wallet::new(Uuid::new_v4(), Decimal::from(balance)).unwrap(),
            Vec::new(),
        )
    }

    fn announcement_by(owner: &User, price: i64, quantity: i32) -> Announcement {
        Announcement::new(
            Uuid::new_v4(),
            AnnouncementOwner {
                id: owner.id,
                name: owner.name.clone(),
                wallet: owner.wallet.clone(),
            },
            Uuid::new_v4(),
            Decimal::from(price),
            quantity,
        )
        .unwrap()
    }

    fn trade(buyer: &User, announcement: &Announcement, quantity: i32) -> Transaction {
        Transaction::create(NewTransaction {
            from: buyer.wallet.clone(),
            to: announcement.owner().wallet.clone(),
            quantity_items_asked: quantity,
            announcement: announcement.clone(),
        })
        .unwrap()
    }

    async fn seeded(
        buyer_balance: i64,
        seller_balance: i64,
        price: i64,
        available: i32,
    ) -> (Arc<InMemoryStore>, User, User, Announcement) {
        let store = Arc::new(InMemoryStore::new());
        let buyer = user("buyer", buyer_balance);
        let seller = user("seller", seller_balance);
        let announcement = announcement_by(&seller, price, available);
        store.insert_user(buyer.clone()).await;
        store.insert_user(seller.clone()).await;
        store.insert_announcement(announcement.clone()).await;
        (store, buyer, seller, announcement)
    }

    #[tokio::test]
    async fn accepted_settlement_moves_funds_items_and_quantity() {
        let (store, buyer, seller, announcement) = seeded(100, 50, 10, 5).await;

        let record = store.settle(trade(&buyer, &announcement, 3)).await.unwrap();

        assert_eq!(record.status, TransactionStatus::Accepted);
        assert_eq!(
            store.balance_of(buyer.wallet.id()).await.unwrap(),
            Decimal::from(70)
        );
        assert_eq!(
            store.balance_of(seller.wallet.id()).await.unwrap(),
            Decimal::from(80)
        );

        let remaining =
            AnnouncementRepository::find_by(&*store, FindAnnouncementQuery::by_id(announcement.id()))
                .await
                .unwrap()
                .unwrap();
        assert_eq!(remaining.quantity_available(), 2);

        let buyer_after = UserRepository::find_by(&*store, FindUserQuery::by_id(buyer.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(buyer_after.user_items.len(), 1);
        assert_eq!(buyer_after.user_items[0].quantity, 3);
        assert_eq!(buyer_after.user_items[0].buyed_per, Decimal::from(10));
    }

    #[tokio::test]
    async fn failed_settlement_keeps_balances_and_records_the_attempt() {
        let (store, buyer, seller, announcement) = seeded(20, 50, 10, 5).await;

        let record = store.settle(trade(&buyer, &announcement, 3)).await.unwrap();

        assert_eq!(record.status, TransactionStatus::Failed);
        assert_eq!(
            store.balance_of(buyer.wallet.id()).await.unwrap(),
            Decimal::from(20)
        );
        assert_eq!(
            store.balance_of(seller.wallet.id()).await.unwrap(),
            Decimal::from(50)
        );
        assert_eq!(
            store
                .list(ListTransactionsQuery::default())
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn exhausted_announcement_rejects_the_trade() {
        let (store, buyer, seller, announcement) = seeded(100, 50, 10, 2).await;

        let record = store.settle(trade(&buyer, &announcement, 3)).await.unwrap();

        assert_eq!(record.status, TransactionStatus::Rejected);
        assert_eq!(
            store.balance_of(buyer.wallet.id()).await.unwrap(),
            Decimal::from(100)
        );
        assert_eq!(
            store.balance_of(seller.wallet.id()).await.unwrap(),
            Decimal::from(50)
        );
    }

    #[tokio::test]
    async fn concurrent_settlements_cannot_both_drain_the_same_wallet() {
        // balance 100, two trades of 80 each: exactly one may go through
        let (store, buyer, seller, announcement) = seeded(100, 50, 80, 10).await;

        let first = trade(&buyer, &announcement, 1);
        let second = trade(&buyer, &announcement, 1);

        let s1 = store.clone();
        let s2 = store.clone();
        let h1 = tokio::spawn(async move { s1.settle(first).await });
        let h2 = tokio::spawn(async move { s2.settle(second).await });

        let r1 = h1.await.unwrap().unwrap();
        let r2 = h2.await.unwrap().unwrap();

        let statuses = [r1.status, r2.status];
        assert!(statuses.contains(&TransactionStatus::Accepted));
        assert!(statuses.contains(&TransactionStatus::Failed));

        assert_eq!(
            store.balance_of(buyer.wallet.id()).await.unwrap(),
            Decimal::from(20)
        );
        assert_eq!(
            store.balance_of(seller.wallet.id()).await.unwrap(),
            Decimal::from(130)
        );
    }
}
