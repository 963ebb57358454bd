use parley_shared::validation::validate_message_content;

use crate::error::ChatError;
use crate::models::{Attachment, MessageType, NewMessage};
use crate::ws::events::{Notification, SendMessage, ServerEvent};
use crate::ws::gateway::Room;
use crate::ws::session::MessagingSession;

pub async fn send_message(session: &MessagingSession, send: SendMessage) -> Result<(), ChatError> {
    if !session.state.rate_limiter.allow(&session.user_key()) {
        return Err(ChatError::RateLimited);
    }

    let attachment = send.file_url.filter(|u| !u.trim().is_empty()).map(|url| Attachment {
        url,
        name: send.file_name,
        extension: send.file_extension,
        size: send.file_size,
    });

    validate_message_content(&send.message, attachment.is_some()).map_err(ChatError::Validation)?;

    let kind = match send.message_type.as_deref().filter(|t| !t.is_empty()) {
        Some(t) => t.parse::<MessageType>().map_err(ChatError::Validation)?,
        None => match &attachment {
            Some(a) => MessageType::infer(a.extension.as_deref()),
            None => MessageType::Text,
        },
    };

    let sender = session.user();
    if send.receiver_id == sender.id {
        return Err(ChatError::Validation(
            "Cannot start a conversation with yourself".into(),
        ));
    }

    let store = session.store();
    let receiver = store.find_user(&send.receiver_id).await?;

    // A reply needs an earlier message, so it can never open a conversation.
    if send.reply.is_some()
        && store
            .find_conversation_between(&sender.id, &receiver.id)
            .await?
            .is_none()
    {
        return Err(ChatError::NotFound("message"));
    }

    let (conversation, created) = store
        .find_or_create_conversation(&sender.id, &receiver.id)
        .await?;

    let message = store
        .create_message(NewMessage {
            conversation_id: conversation.id.clone(),
            sender_id: sender.id.clone(),
            receiver_id: receiver.id.clone(),
            body: send.message,
            kind,
            attachment,
            reply_to: send.reply,
        })
        .await?;

    session
        .reply(&ServerEvent::MessageSent {
            temp_id: send.temp_id,
            message: message.clone(),
        })
        .await;

    let gateway = &session.state.gateway;
    let tenant = session.tenant_key();
    let room = Room::Conversation(conversation.id.clone());

    if created {
        for participant in [&sender.id, &receiver.id] {
            gateway
                .join_members(tenant, &Room::User(participant.clone()), &room)
                .await;
        }
        session
            .to_room(
                &room,
                &ServerEvent::NewConversation {
                    conversation,
                    message: message.clone(),
                },
                None,
            )
            .await;
    } else {
        session
            .to_room(&room, &ServerEvent::NewMessage(message.clone()), None)
            .await;
    }

    let personal = Room::User(receiver.id.clone());
    if receiver.notifications_enabled {
        let notification = Notification {
            sender_image: sender.avatar.clone(),
            sender_name: sender.name.clone(),
            message: message.body.clone(),
            file_type: message.kind.to_string(),
            conversation_id: message.conversation_id.clone(),
            message_id: message.id.clone(),
        };
        session
            .to_room(&personal, &ServerEvent::Notification(notification), None)
            .await;
    }

    let unread = store.unread_count(&receiver.id).await?;
    session.fanout().unread_count(&receiver.id, unread).await;

    Ok(())
}

pub async fn edit_message(
    session: &MessagingSession,
    message_id: String,
    body: String,
) -> Result<(), ChatError> {
    validate_message_content(&body, false).map_err(ChatError::Validation)?;

    let message = session
        .store()
        .edit_message(&message_id, &session.user().id, &body)
        .await?;

    session.fanout().message_edited(&message).await;
    Ok(())
}

pub async fn delete_message(session: &MessagingSession, message_id: String) -> Result<(), ChatError> {
    let actor = &session.user().id;
    let outcome = session.store().delete_message(&message_id, actor).await?;

    session
        .fanout()
        .message_deleted(actor, &outcome, &session.state.config.upload_dir)
        .await;
    Ok(())
}

/// Bulk read of a conversation, or a single message when `message_id` is given.
pub async fn mark_read(
    session: &MessagingSession,
    conversation_id: Option<String>,
    message_id: Option<String>,
) -> Result<(), ChatError> {
    let reader = &session.user().id;
    let store = session.store();
    let fanout = session.fanout();

    match (message_id, conversation_id) {
        (Some(message_id), _) => {
            let (message, flipped) = store.mark_message_read(&message_id, reader).await?;
            if flipped {
                fanout.message_read(&message, reader).await;
            }
        }
        (None, Some(conversation_id)) => {
            let message_ids = store.mark_read(&conversation_id, reader).await?;
            fanout.messages_read(&conversation_id, reader, message_ids).await;
        }
        (None, None) => {
            return Err(ChatError::Validation(
                "conversation_id or messageId is required".into(),
            ));
        }
    }

    let unread = store.unread_count(reader).await?;
    fanout.unread_count(reader, unread).await;
    Ok(())
}

pub async fn typing(
    session: &MessagingSession,
    conversation_id: String,
    active: bool,
) -> Result<(), ChatError> {
    let room = Room::Conversation(conversation_id.clone());
    if !session.state.gateway.is_member(session.client_id(), &room).await {
        return Err(ChatError::Forbidden("not subscribed to this conversation"));
    }

    let user_id = session.user().id.clone();
    let event = if active {
        ServerEvent::Typing {
            conversation_id,
            user_id,
        }
    } else {
        ServerEvent::StopTyping {
            conversation_id,
            user_id,
        }
    };
    session.to_room(&room, &event, Some(session.client_id())).await;
    Ok(())
}
