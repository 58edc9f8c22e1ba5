use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::transaction::{NewTransaction, Transaction, TransactionRecord};

use super::{
    AnnouncementRepository, FindAnnouncementQuery, FindUserQuery, TokenVerifier,
    TransactionRepository, UserRepository,
};

/// Wire shape of a trade request. Anything else in the payload, amount
/// fields included, is dropped by deserialization.
#[derive(Debug, Clone, Deserialize)]
pub struct AskTradeRequest {
    pub announcement_id: Uuid,
    pub quantity_items_asked: i32,
}

/// Validates a trade request, builds the pending transaction and hands it
/// to the transaction repository for settlement.
pub struct AskTrade {
    users: Arc<dyn UserRepository>,
    announcements: Arc<dyn AnnouncementRepository>,
    transactions: Arc<dyn TransactionRepository>,
    tokens: Arc<dyn TokenVerifier>,
}

impl AskTrade {
    pub fn new(
        users: Arc<dyn UserRepository>,
        announcements: Arc<dyn AnnouncementRepository>,
        transactions: Arc<dyn TransactionRepository>,
        tokens: Arc<dyn TokenVerifier>,
    ) -> Self {
        Self {
            users,
            announcements,
            transactions,
            tokens,
        }
    }

    /// Validation order: cheap input checks, then identity, then lookups,
    /// then business rules; only a request that passed all of them creates
    /// a transaction. The settlement outcome is returned as the persisted
    /// record, failed settlements included.
    pub async fn exec(
        &self,
        request: AskTradeRequest,
        token: &str,
    ) -> DomainResult<TransactionRecord> {
        if request.quantity_items_asked <= 0 {
            return Err(DomainError::validation(
                "quantity asked must be greater than 0",
            ));
        }

        let caller = self.tokens.resolve(token)?;

        let requester = self
            .users
            .find_by(FindUserQuery::by_id(caller))
            .await?
            .ok_or(DomainError::NotFound("user"))?;

        let announcement = self
            .announcements
            .find_by(FindAnnouncementQuery::by_id(request.announcement_id))
            .await?
            .ok_or(DomainError::NotFound("announcement"))?;

        if announcement.owner().id == requester.id {
            return Err(DomainError::business_rule("cannot trade with yourself"));
        }

        let transaction = Transaction::create(NewTransaction {
            from: requester.wallet.clone(),
            to: announcement.owner().wallet.clone(),
            quantity_items_asked: request.quantity_items_asked,
            announcement,
        })?;

        tracing::info!(
            transaction = %transaction.id(),
            buyer = %requester.id,
            amount = %transaction.amount(),
            "trade request accepted for settlement"
        );

        self.transactions.settle(transaction).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::announcement::{Announcement, AnnouncementOwner};
    use crate::domain::transaction::TransactionStatus;
    use crate::domain::user::{Role, User, UserStatus, UserSummary};
    use crate::domain::wallet::Wallet;
    use crate::usecases::{ListTransactionsQuery, PresenceUpdate};
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MockUsers {
        users: Mutex<HashMap<Uuid, User>>,
    }

    impl MockUsers {
        fn with(users: Vec<User>) -> Self {
            Self {
                users: Mutex::new(users.into_iter().map(|u| (u.id, u)).collect()),
            }
        }
    }

    #[async_trait]
    impl UserRepository for MockUsers {
        async fn find_by(&self, query: FindUserQuery) -> DomainResult<Option<User>> {
            let users = self.users.lock().unwrap();
            Ok(query.id.and_then(|id| users.get(&id).cloned()))
        }

        async fn update_presence(&self, _update: PresenceUpdate, _id: Uuid) -> DomainResult<()> {
            Ok(())
        }

        async fn list_online(&self, excluding: Uuid) -> DomainResult<Vec<UserSummary>> {
            let users = self.users.lock().unwrap();
            Ok(users
                .values()
                .filter(|u| u.status == UserStatus::Online && u.id != excluding)
                .map(UserSummary::from)
                .collect())
        }
    }

    struct MockAnnouncements {
        announcements: Mutex<HashMap<Uuid, Announcement>>,
    }

    impl MockAnnouncements {
        fn with(announcements: Vec<Announcement>) -> Self {
            Self {
                announcements: Mutex::new(
                    announcements.into_iter().map(|a| (a.id(), a)).collect(),
                ),
            }
        }
    }

    #[async_trait]
    impl AnnouncementRepository for MockAnnouncements {
        async fn find_by(
            &self,
            query: FindAnnouncementQuery,
        ) -> DomainResult<Option<Announcement>> {
            let announcements = self.announcements.lock().unwrap();
            Ok(query.id.and_then(|id| announcements.get(&id).cloned()))
        }
    }

    /// Settles in process against the snapshot wallets and keeps every
    /// record, mirroring what the real stores do at their boundary.
    #[derive(Default)]
    struct RecordingTransactions {
        records: Mutex<Vec<TransactionRecord>>,
    }

    #[async_trait]
    impl TransactionRepository for RecordingTransactions {
        async fn settle(&self, mut transaction: Transaction) -> DomainResult<TransactionRecord> {
            match transaction.settle() {
                Ok(()) | Err(DomainError::InsufficientFunds { .. }) => {}
                Err(other) => return Err(other),
            }
            let record = transaction.record();
            self.records.lock().unwrap().push(record.clone());
            Ok(record)
        }

        async fn list(
            &self,
            _query: ListTransactionsQuery,
        ) -> DomainResult<Vec<TransactionRecord>> {
            Ok(self.records.lock().unwrap().clone())
        }

        async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<TransactionRecord>> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.id == id)
                .cloned())
        }
    }

    struct StubTokens {
        caller: Option<Uuid>,
    }

    impl TokenVerifier for StubTokens {
        fn resolve(&self, _token: &str) -> DomainResult<Uuid> {
            self.caller
                .ok_or_else(|| DomainError::Auth("invalid token".to_string()))
        }
    }

    fn user(name: &str, balance: i64) -> User {
        User::new(
            Uuid::new_v4(),
            name.to_string(),
            format!("{name}@example.com"),
            Role::User,
            UserStatus::Offline,
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

    struct Scenario {
        use_case: AskTrade,
        transactions: Arc<RecordingTransactions>,
        announcement_id: Uuid,
    }

    fn scenario(buyer: User, seller: User, price: i64) -> Scenario {
        let announcement = announcement_by(&seller, price, 100);
        let announcement_id = announcement.id();
        let transactions = Arc::new(RecordingTransactions::default());
        let caller = buyer.id;
        let use_case = AskTrade::new(
            Arc::new(MockUsers::with(vec![buyer, seller])),
            Arc::new(MockAnnouncements::with(vec![announcement])),
            transactions.clone(),
            Arc::new(StubTokens {
                caller: Some(caller),
            }),
        );
        Scenario {
            use_case,
            transactions,
            announcement_id,
        }
    }

    fn request(s: &Scenario, quantity: i32) -> AskTradeRequest {
        AskTradeRequest {
            announcement_id: s.announcement_id,
            quantity_items_asked: quantity,
        }
    }

    #[tokio::test]
    async fn non_positive_quantity_is_rejected_before_anything_else() {
        let s = scenario(user("buyer", 100), user("seller", 50), 10);

        let result = s.use_case.exec(request(&s, 0), "token").await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert!(s.transactions.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_token_surfaces_before_domain_logic() {
        let seller = user("seller", 50);
        let announcement = announcement_by(&seller, 10, 5);
        let announcement_id = announcement.id();
        let transactions = Arc::new(RecordingTransactions::default());
        let use_case = AskTrade::new(
            Arc::new(MockUsers::with(vec![seller])),
            Arc::new(MockAnnouncements::with(vec![announcement])),
            transactions.clone(),
            Arc::new(StubTokens { caller: None }),
        );

        let result = use_case
            .exec(
                AskTradeRequest {
                    announcement_id,
                    quantity_items_asked: 1,
                },
                "expired",
            )
            .await;

        assert!(matches!(result, Err(DomainError::Auth(_))));
        assert!(transactions.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_requester_is_not_found() {
        let seller = user("seller", 50);
        let announcement = announcement_by(&seller, 10, 5);
        let announcement_id = announcement.id();
        let use_case = AskTrade::new(
            Arc::new(MockUsers::with(vec![seller])),
            Arc::new(MockAnnouncements::with(vec![announcement])),
            Arc::new(RecordingTransactions::default()),
            Arc::new(StubTokens {
                caller: Some(Uuid::new_v4()),
            }),
        );

        let result = use_case
            .exec(
                AskTradeRequest {
                    announcement_id,
                    quantity_items_asked: 1,
                },
                "token",
            )
            .await;

        assert!(matches!(result, Err(DomainError::NotFound("user"))));
    }

    #[tokio::test]
    async fn unknown_announcement_is_not_found() {
        let s = scenario(user("buyer", 100), user("seller", 50), 10);

        let result = s
            .use_case
            .exec(
                AskTradeRequest {
                    announcement_id: Uuid::new_v4(),
                    quantity_items_asked: 1,
                },
                "token",
            )
            .await;

        assert!(matches!(result, Err(DomainError::NotFound("announcement"))));
        assert!(s.transactions.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn trading_with_yourself_is_refused() {
        let buyer = user("solo", 100);
        let announcement = announcement_by(&buyer, 10, 5);
        let announcement_id = announcement.id();
        let transactions = Arc::new(RecordingTransactions::default());
        let caller = buyer.id;
        let use_case = AskTrade::new(
            Arc::new(MockUsers::with(vec![buyer])),
            Arc::new(MockAnnouncements::with(vec![announcement])),
            transactions.clone(),
            Arc::new(StubTokens {
                caller: Some(caller),
            }),
        );

        let result = use_case
            .exec(
                AskTradeRequest {
                    announcement_id,
                    quantity_items_asked: 1,
                },
                "token",
            )
            .await;

        assert!(matches!(result, Err(DomainError::BusinessRule(_))));
        assert!(transactions.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn settles_the_worked_example() {
        let s = scenario(user("buyer", 100), user("seller", 50), 10);

        let record = s.use_case.exec(request(&s, 3), "token").await.unwrap();

        assert_eq!(record.status, TransactionStatus::Accepted);
        assert_eq!(record.amount, Decimal::from(30));
        assert_eq!(record.quantity_items_asked, 3);
        assert_eq!(s.transactions.records.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn insufficient_funds_returns_the_failed_record() {
        let s = scenario(user("buyer", 20), user("seller", 50), 10);

        let record = s.use_case.exec(request(&s, 3), "token").await.unwrap();

        assert_eq!(record.status, TransactionStatus::Failed);
        // the failed attempt stays on the audit trail
        assert_eq!(s.transactions.records.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn amount_in_the_raw_payload_is_ignored() {
        let s = scenario(user("buyer", 100), user("seller", 50), 10);

        let raw = serde_json::json!({
            "announcement_id": s.announcement_id,
            "quantity_items_asked": 3,
            "amount": "9999",
        });
        let parsed: AskTradeRequest = serde_json::from_value(raw).unwrap();

        let record = s.use_case.exec(parsed, "token").await.unwrap();
        assert_eq!(record.amount, Decimal::from(30));
    }
}
