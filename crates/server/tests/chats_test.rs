mod common;

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Request, StatusCode};
use axum_test::TestServer;
use parley_server::models::{MessageType, NewMessage};
use parley_server::tenant::TenantStore;
use parley_server::ws::events::ClientEvent;
use parley_server::ws::handler::handle_client_event;
use parley_server::ws::session::MessagingSession;
use parley_server::AppState;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower::ServiceExt;

fn auth_header(token: &str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("authorization"),
        format!("Bearer {}", token).parse().unwrap(),
    )
}

fn tenant_header(key: &str) -> (HeaderName, HeaderValue) {
    (HeaderName::from_static("x-tenant-id"), key.parse().unwrap())
}

async fn setup() -> (TestServer, Arc<AppState>, TenantStore) {
    let state = common::test_state();
    let app = common::create_test_app(state.clone());
    let server = TestServer::new(app).unwrap();
    let acme = common::tenant_store(&state, "acme").await;
    (server, state, acme)
}

async fn post_message(store: &TenantStore, conversation_id: &str, from: &str, to: &str, body: &str) -> String {
    store
        .conversations()
        .create_message(NewMessage {
            conversation_id: conversation_id.into(),
            sender_id: from.into(),
            receiver_id: to.into(),
            body: body.into(),
            kind: MessageType::Text,
            attachment: None,
            reply_to: None,
        })
        .await
        .unwrap()
        .id
}

/// A live session subscribed to one conversation, with its queue emptied.
async fn watch(
    state: &Arc<AppState>,
    token: &str,
    conversation_id: &str,
) -> (MessagingSession, mpsc::UnboundedReceiver<String>) {
    let (session, mut rx) = common::connect_session(state, "acme", token).await;
    handle_client_event(
        &session,
        ClientEvent::Join {
            conversation_ids: vec![conversation_id.to_string()],
        },
    )
    .await;
    common::drain(&mut rx);
    (session, rx)
}

#[tokio::test]
async fn health_falls_back_to_default_store() {
    let (server, _, _) = setup().await;

    let (h, v) = tenant_header("acme");
    let res = server.get("/health").add_header(h, v).await;
    res.assert_status_ok();
    assert_eq!(res.json::<serde_json::Value>()["tenant"], "acme");

    let (h, v) = tenant_header("initech");
    let res = server.get("/health").add_header(h, v).await;
    res.assert_status_ok();
    let body: serde_json::Value = res.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["tenant"], "default");
}

#[tokio::test]
async fn host_subdomain_selects_tenant() {
    let state = common::test_state();
    let app = common::create_test_app(state);

    let res = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("host", "globex.example.app")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["tenant"], "globex");
}

#[tokio::test]
async fn api_requires_known_tenant_and_token() {
    let (server, state, acme) = setup().await;
    let (_, token) = common::create_test_user(&acme, "Alice").await;

    let (th, tv) = tenant_header("acme");
    server
        .get("/api/chats")
        .add_header(th, tv)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let (th, tv) = tenant_header("initech");
    let (h, v) = auth_header(&token);
    let res = server.get("/api/chats").add_header(th, tv).add_header(h, v).await;
    res.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(res.json::<serde_json::Value>()["error"], "tenant not found: initech");

    // Tokens do not cross tenants.
    common::tenant_store(&state, "globex").await;
    let (th, tv) = tenant_header("globex");
    let (h, v) = auth_header(&token);
    server
        .get("/api/users/me")
        .add_header(th, tv)
        .add_header(h, v)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_chat_is_idempotent() {
    let (server, _, acme) = setup().await;
    let (u1, t1) = common::create_test_user(&acme, "Alice").await;
    let (u2, _) = common::create_test_user(&acme, "Bob").await;

    let (th, tv) = tenant_header("acme");
    let (h, v) = auth_header(&t1);
    let res = server
        .post("/api/chats")
        .add_header(th.clone(), tv.clone())
        .add_header(h.clone(), v.clone())
        .json(&json!({ "receiver_id": u2 }))
        .await;
    res.assert_status(StatusCode::CREATED);
    let first: serde_json::Value = res.json();
    assert_eq!(first["created"], true);

    let res = server
        .post("/api/chats")
        .add_header(th.clone(), tv.clone())
        .add_header(h.clone(), v.clone())
        .json(&json!({ "receiver_id": u2 }))
        .await;
    res.assert_status_ok();
    let second: serde_json::Value = res.json();
    assert_eq!(second["created"], false);
    assert_eq!(second["conversation"]["id"], first["conversation"]["id"]);

    let res = server
        .post("/api/chats")
        .add_header(th, tv)
        .add_header(h, v)
        .json(&json!({ "receiver_id": u1 }))
        .await;
    res.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_and_detail() {
    let (server, _, acme) = setup().await;
    let (u1, t1) = common::create_test_user(&acme, "Alice").await;
    let (u2, _) = common::create_test_user(&acme, "Bob").await;
    let (_, t3) = common::create_test_user(&acme, "Mallory").await;

    let (conversation, _) = acme
        .conversations()
        .find_or_create_conversation(&u1, &u2)
        .await
        .unwrap();

    let (th, tv) = tenant_header("acme");
    let (h, v) = auth_header(&t1);

    // No visible messages yet: not listed.
    let res = server
        .get("/api/chats")
        .add_header(th.clone(), tv.clone())
        .add_header(h.clone(), v.clone())
        .await;
    res.assert_status_ok();
    assert_eq!(res.json::<serde_json::Value>(), json!([]));

    post_message(&acme, &conversation.id, &u1, &u2, "first").await;
    post_message(&acme, &conversation.id, &u2, &u1, "second").await;

    let res = server
        .get("/api/chats")
        .add_header(th.clone(), tv.clone())
        .add_header(h.clone(), v.clone())
        .await;
    let list: serde_json::Value = res.json();
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["id"], conversation.id.as_str());
    assert_eq!(list[0]["last_message"]["message"], "second");
    assert_eq!(list[0]["other_user"]["name"], "Bob");

    let path = format!("/api/chats/{}", conversation.id);
    let res = server
        .get(&path)
        .add_header(th.clone(), tv.clone())
        .add_header(h.clone(), v.clone())
        .await;
    res.assert_status_ok();
    let detail: serde_json::Value = res.json();
    let bodies: Vec<&str> = detail["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["message"].as_str().unwrap())
        .collect();
    assert_eq!(bodies, vec!["first", "second"]);

    let (mh, mv) = auth_header(&t3);
    server
        .get(&path)
        .add_header(th.clone(), tv.clone())
        .add_header(mh, mv)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    server
        .get("/api/chats/nope")
        .add_header(th, tv)
        .add_header(h, v)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_chat_purges_after_both_sides() {
    let (server, state, acme) = setup().await;
    let (u1, t1) = common::create_test_user(&acme, "Alice").await;
    let (u2, t2) = common::create_test_user(&acme, "Bob").await;

    let (conversation, _) = acme
        .conversations()
        .find_or_create_conversation(&u1, &u2)
        .await
        .unwrap();
    post_message(&acme, &conversation.id, &u1, &u2, "hello").await;

    let (_watcher, mut rx) = watch(&state, &t2, &conversation.id).await;

    let path = format!("/api/chats/{}", conversation.id);
    let (th, tv) = tenant_header("acme");

    let (h, v) = auth_header(&t1);
    let res = server.delete(&path).add_header(th.clone(), tv.clone()).add_header(h.clone(), v.clone()).await;
    res.assert_status_ok();
    assert_eq!(res.json::<serde_json::Value>(), json!({ "removed": false }));
    assert!(common::drain(&mut rx).is_empty());

    // Gone from the deleter's list, still there for the other side.
    let list: serde_json::Value = server
        .get("/api/chats")
        .add_header(th.clone(), tv.clone())
        .add_header(h, v)
        .await
        .json();
    assert_eq!(list, json!([]));

    let (h, v) = auth_header(&t2);
    let res = server.delete(&path).add_header(th, tv).add_header(h, v).await;
    assert_eq!(res.json::<serde_json::Value>(), json!({ "removed": true }));

    let events = common::drain(&mut rx);
    let deleted = common::of_type(&events, "conversation_deleted");
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0]["conversation_id"], conversation.id.as_str());

    assert!(acme.conversations().find_conversation(&conversation.id).await.is_err());
}

#[tokio::test]
async fn clear_messages_needs_messages_and_membership() {
    let (server, state, acme) = setup().await;
    let (u1, t1) = common::create_test_user(&acme, "Alice").await;
    let (u2, t2) = common::create_test_user(&acme, "Bob").await;
    let (_, t3) = common::create_test_user(&acme, "Mallory").await;

    let (conversation, _) = acme
        .conversations()
        .find_or_create_conversation(&u1, &u2)
        .await
        .unwrap();
    let path = format!("/api/chats/{}/messages", conversation.id);
    let (th, tv) = tenant_header("acme");
    let (h1, v1) = auth_header(&t1);

    let res = server.delete(&path).add_header(th.clone(), tv.clone()).add_header(h1.clone(), v1.clone()).await;
    res.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(res.json::<serde_json::Value>()["error"], "message not found");

    post_message(&acme, &conversation.id, &u1, &u2, "hello").await;
    let (_watcher, mut rx) = watch(&state, &t2, &conversation.id).await;

    let (h3, v3) = auth_header(&t3);
    server
        .delete(&path)
        .add_header(th.clone(), tv.clone())
        .add_header(h3, v3)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let res = server.delete(&path).add_header(th.clone(), tv.clone()).add_header(h1, v1).await;
    assert_eq!(res.json::<serde_json::Value>(), json!({ "removed": false }));
    assert!(common::drain(&mut rx).is_empty());

    let (h2, v2) = auth_header(&t2);
    let res = server.delete(&path).add_header(th, tv).add_header(h2, v2).await;
    assert_eq!(res.json::<serde_json::Value>(), json!({ "removed": true }));
    assert_eq!(common::of_type(&common::drain(&mut rx), "conversation_deleted").len(), 1);
}

#[tokio::test]
async fn edit_and_delete_message_over_http() {
    let (server, state, acme) = setup().await;
    let (u1, t1) = common::create_test_user(&acme, "Alice").await;
    let (u2, t2) = common::create_test_user(&acme, "Bob").await;

    let (conversation, _) = acme
        .conversations()
        .find_or_create_conversation(&u1, &u2)
        .await
        .unwrap();
    let message_id = post_message(&acme, &conversation.id, &u1, &u2, "orig").await;
    let (_watcher, mut rx) = watch(&state, &t2, &conversation.id).await;

    let path = format!("/api/chats/messages/{}", message_id);
    let (th, tv) = tenant_header("acme");
    let (h1, v1) = auth_header(&t1);
    let (h2, v2) = auth_header(&t2);

    server
        .patch(&path)
        .add_header(th.clone(), tv.clone())
        .add_header(h2.clone(), v2.clone())
        .json(&json!({ "message": "hijack" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    server
        .patch(&path)
        .add_header(th.clone(), tv.clone())
        .add_header(h1.clone(), v1.clone())
        .json(&json!({ "message": "   " }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    assert!(common::drain(&mut rx).is_empty());

    let res = server
        .patch(&path)
        .add_header(th.clone(), tv.clone())
        .add_header(h1.clone(), v1.clone())
        .json(&json!({ "message": "fixed" }))
        .await;
    res.assert_status_ok();
    let edited: serde_json::Value = res.json();
    assert_eq!(edited["message"], "fixed");
    assert!(edited["edited_at"].is_string());

    let events = common::drain(&mut rx);
    let pushed = common::of_type(&events, "message_edited");
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0]["messageId"], message_id.as_str());

    server
        .delete("/api/chats/messages/missing")
        .add_header(th.clone(), tv.clone())
        .add_header(h1.clone(), v1.clone())
        .await
        .assert_status(StatusCode::NOT_FOUND);

    // Still unread, so the sender's delete removes it for both. The now empty chat stays.
    let res = server.delete(&path).add_header(th, tv).add_header(h1, v1).await;
    res.assert_status_ok();
    assert_eq!(
        res.json::<serde_json::Value>(),
        json!({ "both": true, "conversation_removed": false })
    );

    let events = common::drain(&mut rx);
    assert_eq!(common::of_type(&events, "message_deleted")[0]["both"], true);
    assert!(common::of_type(&events, "conversation_deleted").is_empty());
    assert!(acme.conversations().find_message(&message_id).await.is_err());
}

#[tokio::test]
async fn mark_read_over_http() {
    let (server, state, acme) = setup().await;
    let (u1, t1) = common::create_test_user(&acme, "Alice").await;
    let (u2, t2) = common::create_test_user(&acme, "Bob").await;

    let (conversation, _) = acme
        .conversations()
        .find_or_create_conversation(&u1, &u2)
        .await
        .unwrap();
    let first = post_message(&acme, &conversation.id, &u1, &u2, "one").await;
    let second = post_message(&acme, &conversation.id, &u1, &u2, "two").await;
    let (_alice, mut alice_rx) = watch(&state, &t1, &conversation.id).await;

    let (th, tv) = tenant_header("acme");
    let (h, v) = auth_header(&t2);
    let res = server
        .put("/api/chats/messages/mark-read")
        .add_header(th.clone(), tv.clone())
        .add_header(h.clone(), v.clone())
        .json(&json!({ "conversationId": conversation.id }))
        .await;
    res.assert_status_ok();
    let mut ids: Vec<String> = serde_json::from_value(res.json::<serde_json::Value>()["messageIds"].clone()).unwrap();
    ids.sort();
    let mut expected = vec![first, second];
    expected.sort();
    assert_eq!(ids, expected);

    let read = common::of_type(&common::drain(&mut alice_rx), "messages_read")[0].clone();
    assert_eq!(read["userId"], u2.as_str());
    assert_eq!(acme.conversations().unread_count(&u2).await.unwrap(), 0);

    let (h1, v1) = auth_header(&t1);
    let res = server
        .put("/api/chats/messages/mark-read")
        .add_header(th, tv)
        .add_header(h1, v1)
        .json(&json!({ "conversation_id": conversation.id }))
        .await;
    res.assert_status_ok();
    assert_eq!(res.json::<serde_json::Value>()["messageIds"], json!([]));
}

#[tokio::test]
async fn status_update_is_broadcast() {
    let (server, state, acme) = setup().await;
    let (u1, t1) = common::create_test_user(&acme, "Alice").await;
    let (_, t2) = common::create_test_user(&acme, "Bob").await;
    let (_bob, mut bob_rx) = common::connect_session(&state, "acme", &t2).await;
    common::drain(&mut bob_rx);

    let (th, tv) = tenant_header("acme");
    let (h, v) = auth_header(&t1);
    let res = server
        .patch("/api/users/status")
        .add_header(th.clone(), tv.clone())
        .add_header(h.clone(), v.clone())
        .json(&json!({ "status": "busy" }))
        .await;
    res.assert_status_ok();
    let me: serde_json::Value = res.json();
    assert_eq!(me["id"], u1.as_str());
    assert_eq!(me["status"], "busy");

    let changed = common::of_type(&common::drain(&mut bob_rx), "user_status_changed")[0].clone();
    assert_eq!(changed["userId"], u1.as_str());
    assert_eq!(changed["status"], "busy");

    server
        .patch("/api/users/status")
        .add_header(th, tv)
        .add_header(h, v)
        .json(&json!({ "status": "sleeping" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    assert!(common::drain(&mut bob_rx).is_empty());
}

#[tokio::test]
async fn users_lists_everyone_else() {
    let (server, _, acme) = setup().await;
    let (u1, t1) = common::create_test_user(&acme, "Alice").await;
    let (u2, _) = common::create_test_user(&acme, "Bob").await;

    let (th, tv) = tenant_header("acme");
    let (h, v) = auth_header(&t1);
    let res = server
        .get("/api/users")
        .add_header(th.clone(), tv.clone())
        .add_header(h.clone(), v.clone())
        .await;
    res.assert_status_ok();
    let users: serde_json::Value = res.json();
    assert_eq!(users.as_array().unwrap().len(), 1);
    assert_eq!(users[0]["id"], u2.as_str());

    let me: serde_json::Value = server
        .get("/api/users/me")
        .add_header(th, tv)
        .add_header(h, v)
        .await
        .json();
    assert_eq!(me["id"], u1.as_str());
    assert_eq!(me["handle"], "alice");
}
