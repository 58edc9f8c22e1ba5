use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A catalog entry users can own and trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub name: String,
}

/// One user's holding lot of an item: how many they own and the unit
/// price the lot was last bought at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserItem {
    pub item_id: Uuid,
    pub quantity: i32,
    pub buyed_per: Decimal,
}

