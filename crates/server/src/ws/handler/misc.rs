use crate::error::ChatError;
use crate::models::UserStatus;
use crate::ws::gateway::Room;
use crate::ws::session::MessagingSession;

/// Subscribes to the given conversations, skipping any the user is not part of.
pub async fn join(session: &MessagingSession, conversation_ids: Vec<String>) -> Result<(), ChatError> {
    let allowed = session
        .store()
        .participant_conversations(&session.user().id, &conversation_ids)
        .await?;

    for conversation_id in allowed {
        session
            .state
            .gateway
            .join(session.client_id(), &Room::Conversation(conversation_id))
            .await;
    }
    Ok(())
}

pub async fn leave(session: &MessagingSession, conversation_id: String) -> Result<(), ChatError> {
    session
        .state
        .gateway
        .leave(session.client_id(), &Room::Conversation(conversation_id))
        .await;
    Ok(())
}

pub async fn change_status(session: &MessagingSession, status: String) -> Result<(), ChatError> {
    let parsed: UserStatus = status
        .parse()
        .map_err(|_| ChatError::InvalidStatus(status.clone()))?;

    session.store().set_status(&session.user().id, parsed).await?;

    session
        .fanout()
        .status_changed(&session.user().id, parsed.as_str())
        .await;
    Ok(())
}
