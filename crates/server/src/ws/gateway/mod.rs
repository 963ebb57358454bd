mod broadcast;

use std::collections::{HashMap, HashSet};
use tokio::sync::{mpsc, RwLock};

pub type ClientId = u64;

/// A fan-out group. Rooms only exist inside one tenant; the same id in two tenants
/// names two different rooms.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Room {
    Conversation(String),
    User(String),
    Role(String),
}

impl Room {
    fn scoped(&self, tenant: &str) -> String {
        match self {
            Room::Conversation(id) => format!("{}:conversation_{}", tenant, id),
            Room::User(id) => format!("{}:user_{}", tenant, id),
            Room::Role(role) => format!("{}:role_{}", tenant, role),
        }
    }
}

pub struct ConnectedClient {
    pub tenant: String,
    pub user_id: String,
    pub tx: mpsc::UnboundedSender<String>,
    pub rooms: HashSet<String>,
}

pub struct GatewayState {
    next_id: RwLock<u64>,
    pub clients: RwLock<HashMap<ClientId, ConnectedClient>>,
    /// scoped room key -> members
    pub rooms: RwLock<HashMap<String, HashSet<ClientId>>>,
}

impl Default for GatewayState {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayState {
    pub fn new() -> Self {
        Self {
            next_id: RwLock::new(1),
            clients: RwLock::new(HashMap::new()),
            rooms: RwLock::new(HashMap::new()),
        }
    }

    pub async fn next_client_id(&self) -> ClientId {
        let mut id = self.next_id.write().await;
        let current = *id;
        *id += 1;
        current
    }

    pub async fn register(
        &self,
        client_id: ClientId,
        tenant: String,
        user_id: String,
        tx: mpsc::UnboundedSender<String>,
    ) {
        let client = ConnectedClient {
            tenant,
            user_id,
            tx,
            rooms: HashSet::new(),
        };
        self.clients.write().await.insert(client_id, client);
    }

    /// Removes the client and every room membership it held.
    pub async fn unregister(&self, client_id: ClientId) -> Option<ConnectedClient> {
        let mut rooms = self.rooms.write().await;
        let client = self.clients.write().await.remove(&client_id)?;

        for key in &client.rooms {
            if let Some(set) = rooms.get_mut(key) {
                set.remove(&client_id);
                if set.is_empty() {
                    rooms.remove(key);
                }
            }
        }

        tracing::debug!(
            "Client {} of {}/{} disconnected",
            client_id,
            client.tenant,
            client.user_id
        );
        Some(client)
    }

    pub async fn join(&self, client_id: ClientId, room: &Room) {
        let mut rooms = self.rooms.write().await;
        let mut clients = self.clients.write().await;
        let Some(client) = clients.get_mut(&client_id) else {
            return;
        };

        let key = room.scoped(&client.tenant);
        rooms.entry(key.clone()).or_default().insert(client_id);
        client.rooms.insert(key);
    }

    pub async fn leave(&self, client_id: ClientId, room: &Room) {
        let mut rooms = self.rooms.write().await;
        let mut clients = self.clients.write().await;
        let Some(client) = clients.get_mut(&client_id) else {
            return;
        };

        let key = room.scoped(&client.tenant);
        if let Some(set) = rooms.get_mut(&key) {
            set.remove(&client_id);
            if set.is_empty() {
                rooms.remove(&key);
            }
        }
        client.rooms.remove(&key);
    }

    /// Every current member of `from` also joins `to`.
    pub async fn join_members(&self, tenant: &str, from: &Room, to: &Room) {
        let mut rooms = self.rooms.write().await;
        let mut clients = self.clients.write().await;

        let members: Vec<ClientId> = rooms
            .get(&from.scoped(tenant))
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        if members.is_empty() {
            return;
        }

        let key = to.scoped(tenant);
        let target = rooms.entry(key.clone()).or_default();
        for cid in members {
            if let Some(client) = clients.get_mut(&cid) {
                target.insert(cid);
                client.rooms.insert(key.clone());
            }
        }
    }

    pub async fn room_members(&self, tenant: &str, room: &Room) -> Vec<ClientId> {
        let rooms = self.rooms.read().await;
        let mut members: Vec<ClientId> = rooms
            .get(&room.scoped(tenant))
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        members.sort_unstable();
        members
    }

    pub async fn is_member(&self, client_id: ClientId, room: &Room) -> bool {
        let clients = self.clients.read().await;
        clients
            .get(&client_id)
            .is_some_and(|c| c.rooms.contains(&room.scoped(&c.tenant)))
    }
}
