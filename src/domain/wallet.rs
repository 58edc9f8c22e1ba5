use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{DomainError, DomainResult};

/// A user's balance holder. The balance can only be mutated through
/// `credit`/`debit`, both of which keep it non-negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    id: Uuid,
    balance: Decimal,
}

impl Wallet {
    pub fn new(id: Uuid, balance: Decimal) -> DomainResult<Self> {
        if balance < Decimal::ZERO {
            return Err(DomainError::validation("wallet balance cannot be negative"));
        }
        Ok(Self { id, balance })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn has_at_least(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }

    /// Removes `amount` from the balance. The balance is left untouched when
    /// it cannot cover the amount.
    pub fn debit(&mut self, amount: Decimal) -> DomainResult<()> {
        if amount <= Decimal::ZERO {
            return Err(DomainError::validation("debit amount must be positive"));
        }
        if self.balance < amount {
            return Err(DomainError::InsufficientFunds {
                balance: self.balance,
                amount,
            });
        }
        self.balance -= amount;
        Ok(())
    }

    pub fn credit(&mut self, amount: Decimal) -> DomainResult<()> {
        if amount <= Decimal::ZERO {
            return Err(DomainError::validation("credit amount must be positive"));
        }
        self.balance += amount;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet(balance: i64) -> Wallet {
        Wallet::new(Uuid::new_v4(), Decimal::from(balance)).unwrap()
    }

    #[test]
    fn rejects_negative_starting_balance() {
        let result = Wallet::new(Uuid::new_v4(), Decimal::from(-1));
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn debit_and_credit_move_the_exact_amount() {
        let mut w = wallet(100);
        w.debit(Decimal::from(30)).unwrap();
        assert_eq!(w.balance(), Decimal::from(70));
        w.credit(Decimal::from(5)).unwrap();
        assert_eq!(w.balance(), Decimal::from(75));
    }

    #[test]
    fn debit_beyond_balance_fails_and_leaves_balance_untouched() {
        let mut w = wallet(10);
        let result = w.debit(Decimal::from(11));
        assert!(matches!(result, Err(DomainError::InsufficientFunds { .. })));
        assert_eq!(w.balance(), Decimal::from(10));
    }

    #[test]
    fn zero_and_negative_amounts_are_rejected() {
        let mut w = wallet(10);
        assert!(w.debit(Decimal::ZERO).is_err());
        assert!(w.credit(Decimal::from(-1)).is_err());
        assert_eq!(w.balance(), Decimal::from(10));
    }
}
