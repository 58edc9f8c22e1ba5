use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::announcement::Announcement;
use super::error::{DomainError, DomainResult};
use super::wallet::Wallet;

/// Lifecycle of a trade attempt. `Pending` is the only initial state and
/// the other three are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Accepted,
    Rejected,
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(self, Self::Pending) && target.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TransactionStatus {
    type Error = DomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "PENDING" => Ok(Self::Pending),
            "ACCEPTED" => Ok(Self::Accepted),
            "REJECTED" => Ok(Self::Rejected),
            "FAILED" => Ok(Self::Failed),
            other => Err(DomainError::Repository(format!(
                "unknown transaction status: {other}"
            ))),
        }
    }
}

/// Input for [`Transaction::create`]. Deliberately has no amount field:
/// the amount is always derived from the announcement's unit price.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub from: Wallet,
    pub to: Wallet,
    pub quantity_items_asked: i32,
    pub announcement: Announcement,
}

/// One trade attempt between a buyer (`from`) and the announcement owner
/// (`to`). Everything except the status is fixed at creation time.
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    id: Uuid,
    from: Wallet,
    to: Wallet,
    status: TransactionStatus,
    quantity_items_asked: i32,
    amount: Decimal,
    announcement: Announcement,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn create(props: NewTransaction) -> DomainResult<Self> {
        if props.quantity_items_asked <= 0 {
            return Err(DomainError::validation(
                "quantity asked must be greater than 0",
            ));
        }
        if props.from.id() == props.to.id() {
            return Err(DomainError::business_rule("cannot trade with yourself"));
        }
        let amount = props.announcement.value_of(props.quantity_items_asked);
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            from: props.from,
            to: props.to,
            status: TransactionStatus::Pending,
            quantity_items_asked: props.quantity_items_asked,
            amount,
            announcement: props.announcement,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn from(&self) -> &Wallet {
        &self.from
    }

    pub fn to(&self) -> &Wallet {
        &self.to
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn quantity_items_asked(&self) -> i32 {
        self.quantity_items_asked
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn announcement(&self) -> &Announcement {
        &self.announcement
    }

    fn transition(&mut self, target: TransactionStatus) -> DomainResult<()> {
        if !self.status.can_transition_to(target) {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to: target,
            });
        }
        self.status = target;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Moves `amount` from the buyer wallet to the seller wallet together
    /// with the status transition. On insufficient funds both balances stay
    /// untouched and the transaction ends up `Failed`.
    pub fn settle(&mut self) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to: TransactionStatus::Accepted,
            });
        }
        if !self.from.has_at_least(self.amount) {
            let balance = self.from.balance();
            self.transition(TransactionStatus::Failed)?;
            return Err(DomainError::InsufficientFunds {
                balance,
                amount: self.amount,
            });
        }
        self.from.debit(self.amount)?;
        self.to.credit(self.amount)?;
        self.transition(TransactionStatus::Accepted)
    }

    /// Business rejection, e.g. the announcement can no longer supply the
    /// requested quantity. No funds move.
    pub fn reject(&mut self) -> DomainResult<()> {
        self.transition(TransactionStatus::Rejected)
    }

    /// Maps a persistence-boundary accepted settlement onto the entity.
    /// Used when the balance transfer already happened as a conditional
    /// update in the store.
    pub fn accept(&mut self) -> DomainResult<()> {
        self.transition(TransactionStatus::Accepted)
    }

    /// Maps a persistence-boundary failed settlement (balance guard hit)
    /// onto the entity.
    pub fn fail(&mut self) -> DomainResult<()> {
        self.transition(TransactionStatus::Failed)
    }

    /// Replaces the wallet snapshots with freshly loaded state before an
    /// in-process settlement. Only legal while pending and only for the
    /// same wallet pair.
    pub fn refresh_parties(&mut self, from: Wallet, to: Wallet) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to: self.status,
            });
        }
        if from.id() != self.from.id() || to.id() != self.to.id() {
            return Err(DomainError::validation(
                "refreshed wallets do not match the transaction parties",
            ));
        }
        self.from = from;
        self.to = to;
        Ok(())
    }

    pub fn record(&self) -> TransactionRecord {
        TransactionRecord {
            id: self.id,
            from_wallet: self.from.id(),
            to_wallet: self.to.id(),
            announcement_id: self.announcement.id(),
            status: self.status,
            quantity_items_asked: self.quantity_items_asked,
            amount: self.amount,
            created_at: self.created_at,
        }
    }
}

/// What repositories persist and hand back: the flat, audit-trail shape of
/// a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub from_wallet: Uuid,
    pub to_wallet: Uuid,
    pub announcement_id: Uuid,
    pub status: TransactionStatus,
    pub quantity_items_asked: i32,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::announcement::AnnouncementOwner;

    fn wallet(balance: i64) -> Wallet {
        Wallet::new(Uuid::new_v4(), Decimal::from(balance)).unwrap()
    }

    fn announcement_with(owner_wallet: &Wallet, price: i64, quantity: i32) -> Announcement {
        Announcement::new(
            Uuid::new_v4(),
            AnnouncementOwner {
                id: Uuid::new_v4(),
                name: "seller".to_string(),
                wallet: owner_wallet.clone(),
            },
            Uuid::new_v4(),
            Decimal::from(price),
            quantity,
        )
        .unwrap()
    }

    fn pending(buyer_balance: i64, seller_balance: i64, price: i64, qty: i32) -> Transaction {
        let from = wallet(buyer_balance);
        let to = wallet(seller_balance);
        let announcement = announcement_with(&to, price, 100);
        Transaction::create(NewTransaction {
            from,
            to,
            quantity_items_asked: qty,
            announcement,
        })
        .unwrap()
    }

    mod status {
        use super::*;

        #[test]
        fn pending_is_the_only_non_terminal_state() {
            assert!(!TransactionStatus::Pending.is_terminal());
            assert!(TransactionStatus::Accepted.is_terminal());
            assert!(TransactionStatus::Rejected.is_terminal());
            assert!(TransactionStatus::Failed.is_terminal());
        }

        #[test]
        fn terminal_states_allow_no_transitions() {
            for terminal in [
                TransactionStatus::Accepted,
                TransactionStatus::Rejected,
                TransactionStatus::Failed,
            ] {
                assert!(!terminal.can_transition_to(TransactionStatus::Pending));
                assert!(!terminal.can_transition_to(TransactionStatus::Accepted));
            }
        }

        #[test]
        fn text_roundtrip() {
            for status in [
                TransactionStatus::Pending,
                TransactionStatus::Accepted,
                TransactionStatus::Rejected,
                TransactionStatus::Failed,
            ] {
                assert_eq!(TransactionStatus::try_from(status.as_str()).unwrap(), status);
            }
            assert!(TransactionStatus::try_from("SETTLED").is_err());
        }
    }

    mod create {
        use super::*;

        #[test]
        fn starts_pending_with_derived_amount() {
            let tx = pending(100, 50, 10, 3);
            assert_eq!(tx.status(), TransactionStatus::Pending);
            assert_eq!(tx.amount(), Decimal::from(30));
        }

        #[test]
        fn rejects_non_positive_quantity() {
            let from = wallet(100);
            let to = wallet(50);
            let announcement = announcement_with(&to, 10, 5);
            for qty in [0, -3] {
                let result = Transaction::create(NewTransaction {
                    from: from.clone(),
                    to: to.clone(),
                    quantity_items_asked: qty,
                    announcement: announcement.clone(),
                });
                assert!(matches!(result, Err(DomainError::Validation(_))));
            }
        }

        #[test]
        fn rejects_identical_parties() {
            let only = wallet(100);
            let announcement = announcement_with(&only, 10, 5);
            let result = Transaction::create(NewTransaction {
                from: only.clone(),
                to: only,
                quantity_items_asked: 1,
                announcement,
            });
            assert!(matches!(result, Err(DomainError::BusinessRule(_))));
        }
    }

    mod settle {
        use super::*;

        #[test]
        fn moves_the_amount_and_conserves_the_total() {
            // worked example: price 10 x qty 3, buyer 100 -> 70, seller 50 -> 80
            let mut tx = pending(100, 50, 10, 3);
            let total_before = tx.from().balance() + tx.to().balance();

            tx.settle().unwrap();

            assert_eq!(tx.status(), TransactionStatus::Accepted);
            assert_eq!(tx.from().balance(), Decimal::from(70));
            assert_eq!(tx.to().balance(), Decimal::from(80));
            assert_eq!(tx.from().balance() + tx.to().balance(), total_before);
        }

        #[test]
        fn insufficient_funds_fails_without_partial_transfer() {
            let mut tx = pending(20, 50, 10, 3);

            let result = tx.settle();

            assert!(matches!(result, Err(DomainError::InsufficientFunds { .. })));
            assert_eq!(tx.status(), TransactionStatus::Failed);
            assert_eq!(tx.from().balance(), Decimal::from(20));
            assert_eq!(tx.to().balance(), Decimal::from(50));
        }

        #[test]
        fn settle_is_not_retryable_after_failure() {
            let mut tx = pending(20, 50, 10, 3);
            let _ = tx.settle();

            let retry = tx.settle();
            assert!(matches!(retry, Err(DomainError::InvalidTransition { .. })));
            assert_eq!(tx.status(), TransactionStatus::Failed);
        }

        #[test]
        fn settled_transaction_cannot_be_rejected() {
            let mut tx = pending(100, 50, 10, 3);
            tx.settle().unwrap();
            assert!(matches!(
                tx.reject(),
                Err(DomainError::InvalidTransition { .. })
            ));
        }
    }

    mod refresh_parties {
        use super::*;

        #[test]
        fn refuses_a_foreign_wallet_pair() {
            let mut tx = pending(100, 50, 10, 3);
            let result = tx.refresh_parties(wallet(1), wallet(2));
            assert!(matches!(result, Err(DomainError::Validation(_))));
        }

        #[test]
        fn swaps_in_current_balances_for_the_same_pair() {
            let mut tx = pending(100, 50, 10, 3);
            let fresh_from = Wallet::new(tx.from().id(), Decimal::from(5)).unwrap();
            let fresh_to = Wallet::new(tx.to().id(), Decimal::from(50)).unwrap();

            tx.refresh_parties(fresh_from, fresh_to).unwrap();

            // with the refreshed balance the settlement now fails
            assert!(matches!(
                tx.settle(),
                Err(DomainError::InsufficientFunds { .. })
            ));
        }
    }

    mod record {
        use super::*;

        #[test]
        fn projects_the_flat_audit_shape() {
            let tx = pending(100, 50, 10, 3);
            let record = tx.record();
            assert_eq!(record.id, tx.id());
            assert_eq!(record.from_wallet, tx.from().id());
            assert_eq!(record.to_wallet, tx.to().id());
            assert_eq!(record.announcement_id, tx.announcement().id());
            assert_eq!(record.status, TransactionStatus::Pending);
            assert_eq!(record.amount, Decimal::from(30));
        }
    }
}
