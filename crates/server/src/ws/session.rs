use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::error::ChatError;
use crate::models::{User, UserKey};
use crate::store::ConversationStore;
use crate::tenant::{ConnectionContext, Resolution, TenantStore};
use crate::ws::events::ServerEvent;
use crate::ws::fanout::Fanout;
use crate::ws::gateway::{ClientId, Room};
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Connecting,
    Authenticated,
    Active,
    Closed,
}

/// One live connection bound to a verified user of one tenant.
pub struct MessagingSession {
    pub(crate) state: Arc<AppState>,
    client_id: ClientId,
    tenant: TenantStore,
    user: User,
    phase: Mutex<SessionPhase>,
}

impl MessagingSession {
    /// Resolves the tenant strictly and verifies the token against its store.
    pub async fn authenticate(
        state: Arc<AppState>,
        ctx: &ConnectionContext,
        token: Option<&str>,
    ) -> Result<Self, ChatError> {
        let tenant = state.resolver.resolve(ctx, Resolution::Strict).await?;
        let token = token.ok_or(ChatError::AuthenticationFailure)?;
        let user = state.verifier.verify(token, &tenant).await?;
        let client_id = state.gateway.next_client_id().await;

        Ok(Self {
            state,
            client_id,
            tenant,
            user,
            phase: Mutex::new(SessionPhase::Authenticated),
        })
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn tenant_key(&self) -> &str {
        &self.tenant.key
    }

    pub fn user_key(&self) -> UserKey {
        UserKey::new(self.tenant.key.clone(), self.user.id.clone())
    }

    pub fn store(&self) -> ConversationStore {
        self.tenant.conversations()
    }

    pub fn phase(&self) -> SessionPhase {
        *self.lock_phase()
    }

    fn lock_phase(&self) -> std::sync::MutexGuard<'_, SessionPhase> {
        match self.phase.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub(crate) fn ensure_active(&self) -> Result<(), ChatError> {
        if self.phase() == SessionPhase::Active {
            Ok(())
        } else {
            Err(ChatError::SessionClosed)
        }
    }

    /// Registers the connection for fan-out and announces the user if this is their
    /// first live connection.
    pub async fn activate(&self, tx: mpsc::UnboundedSender<String>) -> Result<(), ChatError> {
        {
            let mut phase = self.lock_phase();
            if *phase != SessionPhase::Authenticated {
                return Err(ChatError::SessionClosed);
            }
            *phase = SessionPhase::Active;
        }

        let gateway = &self.state.gateway;
        gateway
            .register(self.client_id, self.tenant.key.clone(), self.user.id.clone(), tx)
            .await;
        gateway.join(self.client_id, &Room::User(self.user.id.clone())).await;
        gateway.join(self.client_id, &Room::Role(self.user.role.clone())).await;

        let arrival = self
            .state
            .presence
            .add_connection(&self.user_key(), self.client_id)
            .await;

        if arrival.first_connection {
            let store = self.store();
            store.mark_online(&self.user.id).await?;
            let status = store.find_user(&self.user.id).await?.status;
            tracing::info!("{} is online", self.user_key());

            gateway
                .broadcast_tenant(
                    &self.tenant.key,
                    &ServerEvent::UserOnline {
                        user_id: self.user.id.clone(),
                        status,
                    },
                    Some(self.client_id),
                )
                .await;
        }

        let user_ids = self
            .state
            .presence
            .online_users(&self.tenant.key)
            .await
            .into_iter()
            .filter(|id| *id != self.user.id)
            .collect();
        gateway
            .send_to(self.client_id, &ServerEvent::OnlineUsers { user_ids })
            .await;

        Ok(())
    }

    /// Leaves every room and, on the user's last connection, records last-seen and
    /// announces them offline. Safe to call more than once.
    pub async fn close(&self) {
        let previous = {
            let mut phase = self.lock_phase();
            std::mem::replace(&mut *phase, SessionPhase::Closed)
        };
        if previous != SessionPhase::Active {
            return;
        }

        self.state.gateway.unregister(self.client_id).await;

        let Some(departure) = self.state.presence.remove_connection(self.client_id).await else {
            return;
        };
        if !departure.last_connection_closed {
            return;
        }

        // A new first connection may already be opening. Skip the offline write if it
        // registered, and undo it if it registered while the write was in flight.
        let presence = &self.state.presence;
        if presence.is_online(&departure.user).await {
            return;
        }

        let store = self.store();
        let last_seen = crate::db::timestamp();
        if let Err(e) = store.mark_offline(&self.user.id, &last_seen).await {
            tracing::error!("Failed to record last seen for {}: {:?}", departure.user, e);
        }

        if presence.is_online(&departure.user).await {
            if let Err(e) = store.mark_online(&self.user.id).await {
                tracing::error!("Failed to restore online status for {}: {:?}", departure.user, e);
            }
            return;
        }
        tracing::info!("{} is offline", departure.user);

        self.state
            .gateway
            .broadcast_tenant(
                &self.tenant.key,
                &ServerEvent::UserOffline {
                    user_id: self.user.id.clone(),
                    last_seen,
                },
                None,
            )
            .await;
    }

    pub(crate) fn fanout(&self) -> Fanout<'_> {
        Fanout::new(&self.state.gateway, &self.tenant.key)
    }

    /// Sends an event to this connection only.
    pub async fn reply(&self, event: &ServerEvent) {
        self.state.gateway.send_to(self.client_id, event).await;
    }

    pub(crate) async fn to_room(&self, room: &Room, event: &ServerEvent, exclude: Option<ClientId>) {
        self.state
            .gateway
            .broadcast_room(&self.tenant.key, room, event, exclude)
            .await;
    }

    /// Reports a failed operation to this connection. The connection stays open.
    pub async fn report(&self, err: ChatError, temp_id: Option<String>) {
        let event = match err {
            ChatError::RateLimited => {
                tracing::warn!("Rate limited {}", self.user_key());
                ServerEvent::RateLimited {
                    message: err.to_string(),
                }
            }
            err => {
                if let ChatError::Store(ref e) = err {
                    tracing::error!("Store failure for {}: {:?}", self.user_key(), e);
                }
                ServerEvent::Error {
                    message: err.to_string(),
                    details: err.details(),
                    temp_id,
                }
            }
        };
        self.reply(&event).await;
    }
}
