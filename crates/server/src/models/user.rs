use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub name: String,
    pub handle: String,
    pub avatar: Option<String>,
    pub role: String,
    pub status: String,
    pub last_seen: Option<String>,
    pub notifications_enabled: bool,
}

/// Profile fields shown next to a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub handle: String,
    pub avatar: Option<String>,
    pub status: String,
    pub last_seen: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Online,
    Busy,
    Offline,
    Away,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Online => "online",
            UserStatus::Busy => "busy",
            UserStatus::Offline => "offline",
            UserStatus::Away => "away",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parley_shared::validation::validate_status(s)?;
        Ok(match s {
            "online" => UserStatus::Online,
            "busy" => UserStatus::Busy,
            "away" => UserStatus::Away,
            _ => UserStatus::Offline,
        })
    }
}

/// A user id qualified by the tenant it belongs to. Ids are only unique per store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserKey {
    pub tenant: String,
    pub user_id: String,
}

impl UserKey {
    pub fn new(tenant: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            user_id: user_id.into(),
        }
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant, self.user_id)
    }
}
