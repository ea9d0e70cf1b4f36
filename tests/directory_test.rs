use std::sync::Arc;

use agrichat::client::Client;
use agrichat::directory::{ConversationDirectory, DirectoryError};
use agrichat::test_utils::{MockHttpClient, create_test_api, create_test_client, start_test_client};
use agrichat::types::conversation::{ConversationStatus, ParticipantRole};
use agrichat::types::events::{ConversationRead, NewMessageNotification, PresenceUpdate};
use serde_json::{Value, json};

fn conversation_json(id: &str, farmer_id: &str, support_unread: u32) -> Value {
    json!({
        "_id": id,
        "farmer": {"_id": farmer_id, "name": "Asha Devi"},
        "assignedSupport": {"_id": "agent-1", "name": "Ravi"},
        "status": "open",
        "unreadCounts": {"farmer": 0, "support": support_unread},
        "lastMessage": {"messageType": "text", "preview": "hello", "timestamp": "2026-03-01T09:00:00Z"},
        "createdAt": "2026-02-20T08:00:00Z",
        "updatedAt": "2026-03-01T09:00:00Z"
    })
}

fn list_json(conversations: Vec<Value>, page: u32, total_pages: u32) -> Value {
    let total = conversations.len() as u64;
    json!({
        "conversations": conversations,
        "page": page,
        "totalPages": total_pages,
        "total": total
    })
}

async fn support_directory() -> (Arc<Client>, Arc<MockHttpClient>, ConversationDirectory) {
    directory_with_role(ParticipantRole::Support).await
}

async fn directory_with_role(
    role: ParticipantRole,
) -> (Arc<Client>, Arc<MockHttpClient>, ConversationDirectory) {
    let (client, _handle) = create_test_client();
    start_test_client(&client).await;
    let http = Arc::new(MockHttpClient::new());
    let api = create_test_api(http.clone());
    let directory = ConversationDirectory::new(client.clone(), api, role);
    (client, http, directory)
}

#[tokio::test]
async fn refresh_loads_the_filtered_page() {
    let (_client, http, mut directory) = support_directory().await;
    http.push_json(
        200,
        &list_json(
            vec![
                conversation_json("c1", "farmer-1", 4),
                conversation_json("c2", "farmer-2", 0),
            ],
            1,
            5,
        ),
    );

    directory.refresh().await.unwrap();

    assert_eq!(directory.items().len(), 2);
    assert_eq!(directory.page(), 1);
    assert_eq!(directory.total_pages(), 5);
    assert_eq!(directory.unread_for("c1"), 4);
    assert_eq!(directory.unread_for("c2"), 0);

    let request = &http.requests()[0];
    assert!(request.url.contains("page=1"));
    assert!(request.url.contains("limit=20"));
}

#[tokio::test]
async fn filter_changes_reset_to_page_one() {
    let (_client, _http, mut directory) = support_directory().await;

    directory.set_page(4);
    assert_eq!(directory.page(), 4);

    directory.set_search(Some("asha".into()));
    assert_eq!(directory.page(), 1);

    directory.set_page(3);
    directory.set_status(Some(ConversationStatus::Waiting));
    assert_eq!(directory.page(), 1);

    // Setting the same filter again is not a change and keeps the page.
    directory.set_page(2);
    directory.set_status(Some(ConversationStatus::Waiting));
    assert_eq!(directory.page(), 2);
}

#[tokio::test]
async fn assigned_agent_filter_is_admin_only() {
    let (_client, _http, mut directory) = support_directory().await;
    let err = directory.set_assigned_agent(Some("agent-2".into())).unwrap_err();
    assert!(matches!(err, DirectoryError::NotPermitted(_)));

    let (_client, _http, mut admin_directory) =
        directory_with_role(ParticipantRole::Admin).await;
    admin_directory
        .set_assigned_agent(Some("agent-2".into()))
        .unwrap();
    assert_eq!(admin_directory.page(), 1);
}

#[tokio::test]
async fn fetch_failure_keeps_last_known_good_rows() {
    let (_client, http, mut directory) = support_directory().await;
    http.push_json(
        200,
        &list_json(vec![conversation_json("c1", "farmer-1", 1)], 1, 1),
    );
    directory.refresh().await.unwrap();
    assert_eq!(directory.items().len(), 1);

    http.push_json(500, &json!({"error": "downstream"}));
    assert!(directory.refresh().await.is_err());

    assert_eq!(directory.items().len(), 1, "stale rows beat empty rows");
    assert_eq!(directory.items()[0].id, "c1");
}

#[tokio::test]
async fn notification_bumps_unread_and_all_read_zeroes_it() {
    let (_client, http, mut directory) = support_directory().await;
    http.push_json(
        200,
        &list_json(vec![conversation_json("c1", "farmer-1", 4)], 1, 1),
    );
    directory.refresh().await.unwrap();
    let requests_after_refresh = http.request_count();

    let notification: NewMessageNotification = serde_json::from_value(json!({
        "conversationId": "c1",
        "sender": {"_id": "farmer-1", "name": "Asha Devi"},
        "message": {
            "_id": "m9",
            "conversationId": "c1",
            "senderId": "farmer-1",
            "messageType": "text",
            "content": "any update?",
            "timestamp": "2026-03-01T10:30:00Z"
        }
    }))
    .unwrap();
    directory.apply_notification(&notification);

    assert_eq!(directory.unread_for("c1"), 5);
    let row = &directory.items()[0];
    assert_eq!(
        row.last_message.as_ref().unwrap().preview.as_deref(),
        Some("any update?")
    );

    // Opening the conversation confirms the bulk read.
    let all_read: ConversationRead =
        serde_json::from_value(json!({"conversationId": "c1"})).unwrap();
    directory.apply_all_read(&all_read);
    assert_eq!(directory.unread_for("c1"), 0);

    assert_eq!(
        http.request_count(),
        requests_after_refresh,
        "badge updates never refetch"
    );
}

#[tokio::test]
async fn presence_updates_rows_without_refetching() {
    let (_client, http, mut directory) = support_directory().await;
    http.push_json(
        200,
        &list_json(vec![conversation_json("c1", "farmer-1", 0)], 1, 1),
    );
    directory.refresh().await.unwrap();
    let requests_after_refresh = http.request_count();

    assert!(!directory.is_online("farmer-1"));

    let online: PresenceUpdate =
        serde_json::from_value(json!({"userId": "farmer-1", "isOnline": true})).unwrap();
    directory.apply_presence(&online);
    assert!(directory.is_online("farmer-1"));

    let offline: PresenceUpdate = serde_json::from_value(json!({
        "userId": "farmer-1",
        "isOnline": false,
        "lastSeen": "2026-03-01T10:45:00Z"
    }))
    .unwrap();
    directory.apply_presence(&offline);
    assert!(!directory.is_online("farmer-1"));
    assert!(
        directory
            .presence_of("farmer-1")
            .unwrap()
            .last_seen
            .is_some()
    );

    assert_eq!(http.request_count(), requests_after_refresh);
}

#[tokio::test]
async fn reassign_is_admin_only_and_refreshes_on_success() {
    let (_client, http, mut directory) = directory_with_role(ParticipantRole::Admin).await;
    http.push_json(
        200,
        &list_json(vec![conversation_json("c1", "farmer-1", 0)], 1, 1),
    );
    directory.refresh().await.unwrap();

    http.push_json(200, &conversation_json("c1", "farmer-1", 0));
    http.push_json(
        200,
        &list_json(vec![conversation_json("c1", "farmer-1", 0)], 1, 1),
    );
    directory.reassign("c1", "agent-2").await.unwrap();

    let requests = http.requests();
    let patch = requests
        .iter()
        .find(|r| r.method == "PATCH")
        .expect("reassign issues a PATCH");
    assert!(patch.url.ends_with("/chat/conversations/c1/assign"));
    let body: Value =
        serde_json::from_slice(patch.body.as_ref().unwrap()).unwrap();
    assert_eq!(body["assignedSupportId"], "agent-2");

    // The mutation is followed by a list refresh.
    let last = requests.last().unwrap();
    assert!(last.url.contains("/chat/conversations?"));

    let (_client, _http, mut support_directory) = support_directory().await;
    let err = support_directory.reassign("c1", "agent-2").await.unwrap_err();
    assert!(matches!(err, DirectoryError::NotPermitted(_)));
}

#[tokio::test]
async fn stats_surface_the_agent_breakdown() {
    let (_client, http, directory) = support_directory().await;
    http.push_json(
        200,
        &json!({
            "total": 128,
            "active": 17,
            "byStatus": [
                {"status": "open", "count": 12},
                {"status": "resolved", "count": 100}
            ],
            "byAgent": [
                {"agentId": "agent-1", "agentName": "Ravi", "count": 9}
            ]
        }),
    );

    let stats = directory.stats().await.unwrap();
    assert_eq!(stats.total, 128);
    assert_eq!(stats.active, 17);
    assert_eq!(stats.by_agent[0].agent_id, "agent-1");
    assert_eq!(stats.by_status.len(), 2);
}
