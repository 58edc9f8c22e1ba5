use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::DomainError;
use super::item::UserItem;
use super::wallet::Wallet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Admin => "ADMIN",
        }
    }
}

impl TryFrom<&str> for Role {
    type Error = DomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "USER" => Ok(Self::User),
            "ADMIN" => Ok(Self::Admin),
            other => Err(DomainError::Repository(format!("unknown role: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    Online,
    Offline,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "ONLINE",
            Self::Offline => "OFFLINE",
        }
    }
}

impl TryFrom<&str> for UserStatus {
    type Error = DomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "ONLINE" => Ok(Self::Online),
            "OFFLINE" => Ok(Self::Offline),
            other => Err(DomainError::Repository(format!("unknown status: {other}"))),
        }
    }
}

/// A fully loaded account. The constructor takes the wallet by value: a
/// record without a wallet is a mapping problem in the db layer and never
/// reaches the domain.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub status: UserStatus,
    pub socket_id: Option<String>,
    pub avatar_url: Option<String>,
    pub wallet: Wallet,
    pub user_items: Vec<UserItem>,
}

impl User {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: Uuid,
        name: String,
        email: String,
        role: Role,
        status: UserStatus,
        socket_id: Option<String>,
        avatar_url: Option<String>,
        wallet: Wallet,
        user_items: Vec<UserItem>,
    ) -> Self {
        Self {
            id,
            name,
            email,
            role,
            status,
            socket_id,
            avatar_url,
            wallet,
            user_items,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Presence-oriented projection returned by listings; carries no wallet
/// and no credentials.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub status: UserStatus,
    pub socket_id: Option<String>,
    pub avatar_url: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            status: user.status,
            socket_id: user.socket_id.clone(),
            avatar_url: user.avatar_url.clone(),
        }
    }
}
