use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use agrichat::client::Client;
use agrichat::send::{PendingState, SendError};
use agrichat::session::ConversationSession;
use agrichat::test_utils::{
    MockHttpClient, create_test_api, create_test_client, start_test_client,
    wait_until_disconnected,
};
use agrichat::transport::mock::MockTransportHandle;
use agrichat::upload::{MediaError, OutgoingAttachment};
use agrichat::wire::c2s;
use serde_json::{Value, json};
use tokio::task::JoinHandle;

fn conversation_json(id: &str) -> Value {
    json!({
        "_id": id,
        "farmer": {"_id": "farmer-1", "name": "Asha Devi"},
        "assignedSupport": {"_id": "agent-1", "name": "Ravi"},
        "status": "open",
        "unreadCounts": {"farmer": 0, "support": 0},
        "createdAt": "2026-02-20T08:00:00Z",
        "updatedAt": "2026-03-01T09:59:00Z"
    })
}

fn empty_page() -> Value {
    json!({"messages": [], "page": 1, "totalPages": 1, "total": 0})
}

async fn open_session() -> (
    Arc<Client>,
    MockTransportHandle,
    Arc<MockHttpClient>,
    ConversationSession,
) {
    let (client, handle) = create_test_client();
    start_test_client(&client).await;

    let http = Arc::new(MockHttpClient::new());
    let api = create_test_api(http.clone());
    let mut session = ConversationSession::new(client.clone(), api, "agent-1");

    http.push_json(200, &conversation_json("c1"));
    http.push_json(200, &empty_page());
    session.open("c1").await.unwrap();
    handle.clear_sent();

    (client, handle, http, session)
}

/// Acks every `message:send` frame with a server-confirmed message built
/// from the frame's own payload.
fn spawn_ack_responder(handle: MockTransportHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut acked: HashSet<String> = HashSet::new();
        let mut counter = 0u32;
        loop {
            for frame in handle.sent_for_event(c2s::MESSAGE_SEND) {
                let Some(ack_id) = frame.ack.clone() else {
                    continue;
                };
                if !acked.insert(ack_id.clone()) {
                    continue;
                }
                counter += 1;
                let data = frame.data.expect("message:send carries a payload");
                let media = data
                    .get("mediaId")
                    .map(|id| json!({"_id": id, "url": "chat/media/stored", "name": null, "format": null}));
                let message = json!({
                    "_id": format!("srv-{counter}"),
                    "conversationId": data["conversationId"],
                    "senderId": "agent-1",
                    "messageType": data["messageType"],
                    "content": data.get("content").cloned().unwrap_or(Value::Null),
                    "media": media,
                    "timestamp": "2026-03-01T10:02:00Z",
                    "tempId": data["tempId"]
                });
                handle.push_ack(&ack_id, json!({"message": message})).await;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
}

/// Rejects every `message:send` ack.
fn spawn_rejecting_responder(handle: MockTransportHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut acked: HashSet<String> = HashSet::new();
        loop {
            for frame in handle.sent_for_event(c2s::MESSAGE_SEND) {
                let Some(ack_id) = frame.ack.clone() else {
                    continue;
                };
                if !acked.insert(ack_id.clone()) {
                    continue;
                }
                handle.push_ack_error(&ack_id, "conversation closed").await;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
}

#[tokio::test]
async fn text_send_confirms_through_the_ack() {
    let (_client, handle, _http, mut session) = open_session().await;
    let responder = spawn_ack_responder(handle.clone());

    let temp_id = session.send_text("Hello").await.unwrap();
    responder.abort();

    assert!(temp_id.starts_with("tmp-"));
    assert_eq!(session.pending_state(&temp_id), None, "cleared on ack");

    let sent = handle.sent_for_event(c2s::MESSAGE_SEND);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].data.as_ref().unwrap()["content"], "Hello");

    // The confirmed message landed in the transcript once.
    assert_eq!(session.messages().len(), 1);
    assert_eq!(session.messages()[0].temp_id.as_deref(), Some(temp_id.as_str()));
}

#[tokio::test]
async fn rejected_send_is_reported_and_kept_out_of_the_transcript() {
    let (_client, handle, _http, mut session) = open_session().await;
    let responder = spawn_rejecting_responder(handle.clone());

    let err = session.send_text("Hello").await.unwrap_err();
    responder.abort();

    let SendError::Emit { temp_id, media_id, .. } = err else {
        panic!("expected Emit error");
    };
    assert!(media_id.is_none());
    assert_eq!(session.pending_state(&temp_id), Some(PendingState::Failed));
    assert!(session.messages().is_empty(), "failed sends are never rendered");
}

#[tokio::test]
async fn disconnected_sends_are_rejected_without_emitting() {
    let (client, handle, _http, mut session) = open_session().await;

    // Hold the client offline: the first reconnect attempt has no backoff,
    // so the disconnected window would otherwise be unobservably short.
    client
        .enable_auto_reconnect
        .store(false, std::sync::atomic::Ordering::SeqCst);
    handle.drop_connection().await;
    wait_until_disconnected(&client).await;

    let err = session.send_text("Hello").await.unwrap_err();
    assert!(matches!(err, SendError::NotConnected));
    assert!(handle.sent_for_event(c2s::MESSAGE_SEND).is_empty());

    // After a reconnect nothing is resent on its own; the user must resend.
    client
        .enable_auto_reconnect
        .store(true, std::sync::atomic::Ordering::SeqCst);
    start_test_client(&client).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(handle.sent_for_event(c2s::MESSAGE_SEND).is_empty());
}

#[tokio::test]
async fn oversize_attachment_fails_before_any_upload() {
    let (_client, handle, http, mut session) = open_session().await;
    let requests_before = http.request_count();

    let oversize = OutgoingAttachment {
        file_name: "field.jpg".into(),
        mime_type: "image/jpeg".into(),
        data: vec![0u8; 3 * 1024 * 1024],
    };
    let err = session.send_attachments(vec![oversize], None).await.unwrap_err();

    assert!(matches!(
        err,
        SendError::Media(MediaError::TooLarge { .. })
    ));
    assert_eq!(http.request_count(), requests_before, "no upload call");
    assert!(handle.sent_for_event(c2s::MESSAGE_SEND).is_empty());
}

#[tokio::test]
async fn media_goes_out_before_the_caption() {
    let (_client, handle, http, mut session) = open_session().await;
    http.push_json(
        200,
        &json!({"media": [{"_id": "media-1", "url": "chat/media/field.png", "name": "field.png", "format": "png"}]}),
    );
    let responder = spawn_ack_responder(handle.clone());

    let photo = OutgoingAttachment {
        file_name: "field.png".into(),
        mime_type: "image/png".into(),
        data: vec![0u8; 64 * 1024],
    };
    let temp_ids = session
        .send_attachments(vec![photo], Some("leaf spots up close"))
        .await
        .unwrap();
    responder.abort();

    assert_eq!(temp_ids.len(), 2);

    let sent = handle.sent_for_event(c2s::MESSAGE_SEND);
    assert_eq!(sent.len(), 2);

    let first = sent[0].data.as_ref().unwrap();
    assert_eq!(first["messageType"], "image");
    assert_eq!(first["mediaId"], "media-1");
    assert!(first.get("content").is_none());

    let second = sent[1].data.as_ref().unwrap();
    assert_eq!(second["messageType"], "text");
    assert_eq!(second["content"], "leaf spots up close");
    assert!(second.get("mediaId").is_none());

    // Exactly one multipart upload, issued before the emits resolved.
    let uploads: Vec<_> = http
        .requests()
        .into_iter()
        .filter(|r| r.url.ends_with("/chat/upload"))
        .collect();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].method, "POST");

    // Both media and caption messages made it into the transcript in order.
    assert_eq!(session.messages().len(), 2);
    assert_eq!(session.messages()[0].media.as_ref().unwrap().id, "media-1");
    assert_eq!(
        session.messages()[1].content.as_deref(),
        Some("leaf spots up close")
    );
}

#[tokio::test]
async fn failed_media_emit_reports_the_uploaded_object() {
    let (_client, handle, http, mut session) = open_session().await;
    http.push_json(
        200,
        &json!({"media": [{"_id": "media-9", "url": "chat/media/x.png"}]}),
    );
    let responder = spawn_rejecting_responder(handle.clone());

    let photo = OutgoingAttachment {
        file_name: "x.png".into(),
        mime_type: "image/png".into(),
        data: vec![0u8; 1024],
    };
    let err = session.send_attachments(vec![photo], None).await.unwrap_err();
    responder.abort();

    let SendError::Emit {
        media_id, uploaded, ..
    } = err
    else {
        panic!("expected Emit error");
    };
    // The media object exists server-side; callers may retry the emit with
    // the same id instead of re-uploading.
    assert_eq!(media_id.as_deref(), Some("media-9"));
    assert_eq!(uploaded.len(), 1);
    assert_eq!(uploaded[0].id, "media-9");
}

#[tokio::test]
async fn empty_text_never_reaches_the_wire() {
    let (_client, handle, _http, mut session) = open_session().await;

    let err = session.send_text("   ").await.unwrap_err();
    assert!(matches!(err, SendError::EmptyMessage));
    assert!(handle.sent_for_event(c2s::MESSAGE_SEND).is_empty());
}

#[tokio::test]
async fn ack_and_broadcast_of_the_same_message_render_once() {
    let (client, handle, _http, mut session) = open_session().await;
    let mut message_rx = client.event_bus().message.subscribe();
    let responder = spawn_ack_responder(handle.clone());

    let temp_id = session.send_text("Hello").await.unwrap();
    responder.abort();
    assert_eq!(session.messages().len(), 1);
    let confirmed_id = session.messages()[0].id.clone();

    // The room broadcast echoes the same confirmed message.
    handle
        .push_server_event(
            "message:new",
            json!({
                "conversationId": "c1",
                "message": {
                    "_id": confirmed_id,
                    "conversationId": "c1",
                    "senderId": "agent-1",
                    "messageType": "text",
                    "content": "Hello",
                    "timestamp": "2026-03-01T10:02:00Z",
                    "tempId": temp_id
                }
            }),
        )
        .await;

    let event = tokio::time::timeout(Duration::from_secs(1), message_rx.recv())
        .await
        .unwrap()
        .unwrap();
    session.handle_message(&event).await;

    assert_eq!(session.messages().len(), 1, "broadcast must deduplicate");
}
