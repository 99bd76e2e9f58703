//! Runs the chat core against real Postgres stores.
//!
//! `FANSITE_TEST_DATABASE_URL` must point at a scratch database; both sides
//! use their own schema inside it. Run with `cargo test -- --ignored`.

use std::sync::Arc;
use std::time::Duration;

use fansite_shared::clients::db::{create_pool, PoolSettings, StoreRegistry};

use fansite_chat::hub::ChatHub;
use fansite_chat::models::{Identities, MessagePayload, Side};
use fansite_chat::store::PgMessageLog;

fn hub(url: &str) -> ChatHub {
    let mut registry = StoreRegistry::new();
    registry.register(Side::Visitor.store_name(), create_pool(url, PoolSettings::default()));
    registry.register(Side::Operator.store_name(), create_pool(url, PoolSettings::default()));
    let registry = Arc::new(registry);

    ChatHub::new(
        Arc::new(PgMessageLog::new(registry.clone(), Side::Visitor, "test_visitor_chat")),
        Arc::new(PgMessageLog::new(registry, Side::Operator, "test_operator_chat")),
        Identities::new("operator", "all"),
        "welcome",
    )
}

fn message(sender: &str, receiver: &str, content: &str) -> MessagePayload {
    MessagePayload {
        sender: sender.into(),
        receiver: Some(receiver.into()),
        content: Some(content.into()),
        ..Default::default()
    }
}

#[tokio::test]
#[ignore = "requires FANSITE_TEST_DATABASE_URL"]
async fn conversation_round_trip_through_postgres() {
    let url = std::env::var("FANSITE_TEST_DATABASE_URL").expect("FANSITE_TEST_DATABASE_URL");
    let hub = hub(&url);
    hub.reset_schemas().await.unwrap();

    hub.send_message(Side::Visitor, &message("alice", "operator", "hi")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    hub.send_message(Side::Operator, &message("operator", "alice", "hello")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    hub.send_message(Side::Visitor, &message("bob", "operator", "hey")).await.unwrap();

    for side in Side::ALL {
        let rows = hub.store(side).conversation("alice", 50).await.unwrap();
        let contents: Vec<_> = rows.iter().filter_map(|m| m.content.as_deref()).collect();
        assert_eq!(contents, ["hi", "hello"], "{side} store");
    }

    let merged = hub.merged_recent(50).await.unwrap();
    assert_eq!(merged.len(), 3);
    assert!(merged.windows(2).all(|w| w[0].created_at <= w[1].created_at));

    let participants = hub.participants().await.unwrap();
    let names: Vec<_> = participants.iter().map(|p| p.identity.as_str()).collect();
    assert_eq!(names, ["bob", "alice"]);
}
