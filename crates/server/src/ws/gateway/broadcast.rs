use super::{ClientId, GatewayState, Room};
use crate::ws::events::ServerEvent;

impl GatewayState {
    pub async fn broadcast_room(
        &self,
        tenant: &str,
        room: &Room,
        event: &ServerEvent,
        exclude: Option<ClientId>,
    ) {
        let msg = match serde_json::to_string(event) {
            Ok(m) => m,
            Err(_) => return,
        };

        let rooms = self.rooms.read().await;
        let clients = self.clients.read().await;

        if let Some(member_ids) = rooms.get(&room.scoped(tenant)) {
            for &cid in member_ids {
                if Some(cid) == exclude {
                    continue;
                }
                if let Some(client) = clients.get(&cid) {
                    let _ = client.tx.send(msg.clone());
                }
            }
        }
    }

    /// Every connection of one tenant.
    pub async fn broadcast_tenant(&self, tenant: &str, event: &ServerEvent, exclude: Option<ClientId>) {
        let msg = match serde_json::to_string(event) {
            Ok(m) => m,
            Err(_) => return,
        };

        let clients = self.clients.read().await;
        for (&cid, client) in clients.iter() {
            if Some(cid) == exclude || client.tenant != tenant {
                continue;
            }
            let _ = client.tx.send(msg.clone());
        }
    }

    pub async fn send_to(&self, client_id: ClientId, event: &ServerEvent) {
        let msg = match serde_json::to_string(event) {
            Ok(m) => m,
            Err(_) => return,
        };

        let clients = self.clients.read().await;
        if let Some(client) = clients.get(&client_id) {
            let _ = client.tx.send(msg);
        }
    }
}
