use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{DomainError, DomainResult};
use super::wallet::Wallet;

/// The seller side of an announcement. Carries the wallet so settlement
/// knows where the funds go without another lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnouncementOwner {
    pub id: Uuid,
    pub name: String,
    pub wallet: Wallet,
}

/// A standing sell offer: `quantity_available` units of `item_id` at
/// `value_per_item` each, owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    id: Uuid,
    owner: AnnouncementOwner,
    item_id: Uuid,
    value_per_item: Decimal,
    quantity_available: i32,
}

impl Announcement {
    pub fn new(
        id: Uuid,
        owner: AnnouncementOwner,
        item_id: Uuid,
        value_per_item: Decimal,
        quantity_available: i32,
    ) -> DomainResult<Self> {
        if value_per_item <= Decimal::ZERO {
            return Err(DomainError::validation("value per item must be positive"));
        }
        if quantity_available < 0 {
            return Err(DomainError::validation(
                "available quantity cannot be negative",
            ));
        }
        Ok(Self {
            id,
            owner,
            item_id,
            value_per_item,
            quantity_available,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn owner(&self) -> &AnnouncementOwner {
        &self.owner
    }

    pub fn item_id(&self) -> Uuid {
        self.item_id
    }

    pub fn value_per_item(&self) -> Decimal {
        self.value_per_item
    }

    pub fn quantity_available(&self) -> i32 {
        self.quantity_available
    }

    pub fn can_supply(&self, quantity: i32) -> bool {
        quantity > 0 && self.quantity_available >= quantity
    }

    /// Price of `quantity` units at this announcement's unit price.
    pub fn value_of(&self, quantity: i32) -> Decimal {
        Decimal::from(quantity) * self.value_per_item
    }

    /// Takes `quantity` units out of the offer.
    pub fn reserve(&mut self, quantity: i32) -> DomainResult<()> {
        if !self.can_supply(quantity) {
            return Err(DomainError::business_rule(format!(
                "announcement cannot supply {quantity} items, {} available",
                self.quantity_available
            )));
        }
        self.quantity_available -= quantity;
        Ok(())
    }
}

/// Read-side projection for listing open offers.
#[derive(Debug, Clone, Serialize)]
pub struct AnnouncementSummary {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub owner_name: String,
    pub item_id: Uuid,
    pub value_per_item: Decimal,
    pub quantity_available: i32,
}
