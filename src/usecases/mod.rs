use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::announcement::Announcement;
use crate::domain::error::DomainResult;
use crate::domain::transaction::{Transaction, TransactionRecord, TransactionStatus};
use crate::domain::user::{Role, User, UserStatus, UserSummary};

pub mod ask_trade;
pub mod queries;

/// Lookup criteria for users. Every field is optional and the populated
/// ones are ANDed together.
#[derive(Debug, Default, Clone)]
pub struct FindUserQuery {
    pub id: Option<Uuid>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub wallet_id: Option<Uuid>,
    pub socket_id: Option<String>,
}

impl FindUserQuery {
    pub fn by_id(id: Uuid) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct FindAnnouncementQuery {
    pub id: Option<Uuid>,
    pub owner_id: Option<Uuid>,
}

impl FindAnnouncementQuery {
    pub fn by_id(id: Uuid) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ListTransactionsQuery {
    pub status: Option<TransactionStatus>,
    pub from_wallet: Option<Uuid>,
    pub to_wallet: Option<Uuid>,
    /// Matches either side of the transaction.
    pub wallet: Option<Uuid>,
}

impl ListTransactionsQuery {
    /// Transactions awaiting settlement where `wallet` is the receiving
    /// party.
    pub fn pending_for(wallet: Uuid) -> Self {
        Self {
            status: Some(TransactionStatus::Pending),
            to_wallet: Some(wallet),
            ..Self::default()
        }
    }

    pub fn involving(wallet: Uuid) -> Self {
        Self {
            wallet: Some(wallet),
            ..Self::default()
        }
    }
}

/// Typed partial update for the presence columns.
#[derive(Debug, Clone)]
pub struct PresenceUpdate {
    pub status: UserStatus,
    pub socket_id: Option<String>,
}

/// Resolves a bearer credential to the caller's user id. Injected into use
/// cases so tests can substitute it.
pub trait TokenVerifier: Send + Sync {
    fn resolve(&self, token: &str) -> DomainResult<Uuid>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by(&self, query: FindUserQuery) -> DomainResult<Option<User>>;

    async fn update_presence(&self, update: PresenceUpdate, id: Uuid) -> DomainResult<()>;

    async fn list_online(&self, excluding: Uuid) -> DomainResult<Vec<UserSummary>>;
}

#[async_trait]
pub trait AnnouncementRepository: Send + Sync {
    async fn find_by(&self, query: FindAnnouncementQuery) -> DomainResult<Option<Announcement>>;
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Attempts settlement of a pending transaction and records the
    /// outcome. The record is persisted whatever the outcome: ACCEPTED
    /// when the guarded transfer went through, REJECTED when the
    /// announcement could not supply the quantity, FAILED when the buyer
    /// balance guard was hit.
    async fn settle(&self, transaction: Transaction) -> DomainResult<TransactionRecord>;

    async fn list(&self, query: ListTransactionsQuery) -> DomainResult<Vec<TransactionRecord>>;

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<TransactionRecord>>;
}
