use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

use crate::models::UserKey;
use crate::ws::gateway::ClientId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arrival {
    /// The user had no live connection before this one.
    pub first_connection: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub user: UserKey,
    /// This was the user's last live connection.
    pub last_connection_closed: bool,
}

#[derive(Default)]
struct Connections {
    by_user: HashMap<UserKey, HashSet<ClientId>>,
    by_conn: HashMap<ClientId, UserKey>,
}

/// Live connections per user, across all tenants. A user is online while they
/// have at least one.
#[derive(Default)]
pub struct PresenceTracker {
    inner: RwLock<Connections>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_connection(&self, user: &UserKey, client_id: ClientId) -> Arrival {
        let mut inner = self.inner.write().await;
        inner.by_conn.insert(client_id, user.clone());
        let conns = inner.by_user.entry(user.clone()).or_default();
        let first_connection = conns.is_empty();
        conns.insert(client_id);
        Arrival { first_connection }
    }

    /// `None` for a connection that was never added or is already gone.
    pub async fn remove_connection(&self, client_id: ClientId) -> Option<Departure> {
        let mut inner = self.inner.write().await;
        let user = inner.by_conn.remove(&client_id)?;

        let last_connection_closed = match inner.by_user.get_mut(&user) {
            Some(conns) => {
                conns.remove(&client_id);
                conns.is_empty()
            }
            None => true,
        };
        if last_connection_closed {
            inner.by_user.remove(&user);
        }

        Some(Departure {
            user,
            last_connection_closed,
        })
    }

    pub async fn is_online(&self, user: &UserKey) -> bool {
        self.inner.read().await.by_user.contains_key(user)
    }

    pub async fn connections(&self, user: &UserKey) -> Vec<ClientId> {
        let inner = self.inner.read().await;
        let mut ids: Vec<ClientId> = inner
            .by_user
            .get(user)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    pub async fn online_users(&self, tenant: &str) -> Vec<String> {
        let inner = self.inner.read().await;
        let mut users: Vec<String> = inner
            .by_user
            .keys()
            .filter(|k| k.tenant == tenant)
            .map(|k| k.user_id.clone())
            .collect();
        users.sort();
        users
    }
}
