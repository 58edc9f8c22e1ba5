use std::sync::Arc;

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::transaction::TransactionRecord;
use crate::domain::user::UserSummary;

use super::{
    FindUserQuery, ListTransactionsQuery, TokenVerifier, TransactionRepository, UserRepository,
};

/// Read side: transactions still pending where the caller is the
/// receiving party.
pub struct ListPendingTransactions {
    users: Arc<dyn UserRepository>,
    transactions: Arc<dyn TransactionRepository>,
    tokens: Arc<dyn TokenVerifier>,
}

impl ListPendingTransactions {
    pub fn new(
        users: Arc<dyn UserRepository>,
        transactions: Arc<dyn TransactionRepository>,
        tokens: Arc<dyn TokenVerifier>,
    ) -> Self {
        Self {
            users,
            transactions,
            tokens,
        }
    }

    pub async fn exec(&self, token: &str) -> DomainResult<Vec<TransactionRecord>> {
        let caller = self.tokens.resolve(token)?;
        let user = self
            .users
            .find_by(FindUserQuery::by_id(caller))
            .await?
            .ok_or(DomainError::NotFound("user"))?;

        self.transactions
            .list(ListTransactionsQuery::pending_for(user.wallet.id()))
            .await
    }
}

/// Read side: everyone currently online, the caller excluded.
pub struct ListOnlineUsers {
    users: Arc<dyn UserRepository>,
    tokens: Arc<dyn TokenVerifier>,
}

impl ListOnlineUsers {
    pub fn new(users: Arc<dyn UserRepository>, tokens: Arc<dyn TokenVerifier>) -> Self {
        Self { users, tokens }
    }

    pub async fn exec(&self, token: &str) -> DomainResult<Vec<UserSummary>> {
        let caller = self.tokens.resolve(token)?;
        self.users.list_online(caller).await
    }
}
