use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use validator::Validate;

use fansite_shared::errors::{AppError, AppResult};

use super::MessageLog;
use crate::models::{
    now_micros, ConversationFilter, Identities, IdentityActivity, Message, MessagePayload, NewMessage, Side,
};
use crate::replication::Replicator;

pub const MAX_LIMIT: i64 = 100;

/// Clamps a caller-supplied limit to `1..=MAX_LIMIT`.
pub fn clamp_limit(limit: i64) -> i64 {
    limit.clamp(1, MAX_LIMIT)
}

/// How a write reached a store.
///
/// Only an `Origin` write carries a replicator, so a `Replicated` write has
/// nothing to forward with.
pub enum Delivery<'a> {
    Origin(&'a Replicator<'a>),
    Replicated { created_at: DateTime<Utc> },
}

/// The send/query contract of one side, identical for both sides.
///
/// The table is created on first use. A failed attempt is not remembered, so
/// a store that was down at startup starts serving once it is reachable.
pub struct MessageStore {
    side: Side,
    log: Arc<dyn MessageLog>,
    identities: Arc<Identities>,
    schema_ready: OnceCell<()>,
}

impl MessageStore {
    pub fn new(side: Side, log: Arc<dyn MessageLog>, identities: Arc<Identities>) -> Self {
        Self {
            side,
            log,
            identities,
            schema_ready: OnceCell::new(),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn identities(&self) -> &Identities {
        &self.identities
    }

    async fn ready(&self) -> AppResult<()> {
        self.schema_ready
            .get_or_try_init(|| self.log.ensure_schema())
            .await
            .map(|_| ())
    }

    /// Appends the message locally and, for an origin write, mirrors it to
    /// the counterpart. The result reflects the local write only.
    pub async fn send_message(&self, payload: &MessagePayload, delivery: Delivery<'_>) -> AppResult<i64> {
        payload
            .validate()
            .map_err(|e| AppError::validation(e.to_string()))?;
        self.ready().await?;

        let created_at = match &delivery {
            Delivery::Origin(_) => now_micros(),
            Delivery::Replicated { created_at } => *created_at,
        };

        let row = NewMessage::from_payload(payload, &self.identities.broadcast, created_at);
        let id = self.log.append(row).await?;

        tracing::debug!(side = %self.side, id, replicated = matches!(delivery, Delivery::Replicated { .. }), "message stored");

        if let Delivery::Origin(replicator) = delivery {
            match replicator.forward(payload, created_at).await {
                Ok(replica_id) => {
                    tracing::debug!(origin = %self.side, target = %replicator.target(), id, replica_id, "message replicated");
                }
                Err(e) => {
                    tracing::warn!(origin = %self.side, target = %replicator.target(), id, error = %e, "replication failed");
                    metrics::counter!(
                        "chat_replication_failures_total",
                        "origin" => self.side.store_name(),
                        "target" => replicator.target().store_name()
                    )
                    .increment(1);
                }
            }
        }

        Ok(id)
    }

    /// The most recent messages in this store only, oldest-first.
    pub async fn recent_messages(&self, limit: i64) -> AppResult<Vec<Message>> {
        self.ready().await?;
        self.log.recent(clamp_limit(limit)).await
    }

    /// The tail of the conversation between `peer` and the operator, oldest-first.
    pub async fn conversation(&self, peer: &str, limit: i64) -> AppResult<Vec<Message>> {
        self.ready().await?;
        let filter = ConversationFilter::new(peer, &self.identities);
        self.log.conversation(filter, clamp_limit(limit)).await
    }

    /// Last-seen time of every identity that sent or received here.
    pub async fn activity(&self) -> AppResult<Vec<IdentityActivity>> {
        self.ready().await?;
        self.log.activity().await
    }

    pub async fn ensure_schema(&self) -> AppResult<()> {
        self.ready().await
    }

    /// Destroys every message in this store. Administrative only.
    pub async fn reset_schema(&self) -> AppResult<()> {
        self.log.reset_schema().await?;
        // Already set means the table existed before the reset.
        let _ = self.schema_ready.set(());
        Ok(())
    }

    pub async fn ping(&self) -> AppResult<()> {
        self.log.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{alice_to_operator, identities, FlakySchemaLog, MemoryLog, UnreachableLog};
    use fansite_shared::errors::ErrorCode;

    fn store(side: Side, log: Arc<dyn MessageLog>) -> MessageStore {
        MessageStore::new(side, log, identities())
    }

    #[test]
    fn limits_are_clamped() {
        assert_eq!(clamp_limit(1000), 100);
        assert_eq!(clamp_limit(0), 1);
        assert_eq!(clamp_limit(-5), 1);
        assert_eq!(clamp_limit(42), 42);
    }

    #[tokio::test]
    async fn empty_sender_is_rejected_before_any_write() {
        let log = MemoryLog::new();
        let visitor = store(Side::Visitor, log.clone());
        let operator = store(Side::Operator, MemoryLog::new());
        let replicator = Replicator::toward(&operator);

        for sender in ["", "   "] {
            let payload = MessagePayload {
                sender: sender.into(),
                content: Some("hi".into()),
                ..Default::default()
            };
            let err = visitor
                .send_message(&payload, Delivery::Origin(&replicator))
                .await
                .unwrap_err();
            assert_eq!(err.code(), ErrorCode::ValidationError);
        }
        assert_eq!(log.append_count(), 0);
    }

    #[tokio::test]
    async fn origin_write_is_mirrored_once() {
        let visitor_log = MemoryLog::new();
        let operator_log = MemoryLog::new();
        let visitor = store(Side::Visitor, visitor_log.clone());
        let operator = store(Side::Operator, operator_log.clone());
        let replicator = Replicator::toward(&operator);

        visitor
            .send_message(&alice_to_operator("hi"), Delivery::Origin(&replicator))
            .await
            .unwrap();

        assert_eq!(visitor_log.append_count(), 1);
        assert_eq!(operator_log.append_count(), 1);

        let local = &visitor_log.rows()[0];
        let mirrored = &operator_log.rows()[0];
        assert_eq!(local.created_at, mirrored.created_at);
        assert_eq!(local.content, mirrored.content);
    }

    #[tokio::test]
    async fn replicated_write_is_never_forwarded() {
        let operator_log = MemoryLog::new();
        let operator = store(Side::Operator, operator_log.clone());

        operator
            .send_message(&alice_to_operator("hi"), Delivery::Replicated { created_at: now_micros() })
            .await
            .unwrap();

        assert_eq!(operator_log.append_count(), 1);
    }

    #[tokio::test]
    async fn send_succeeds_when_counterpart_is_down() {
        let visitor_log = MemoryLog::new();
        let visitor = store(Side::Visitor, visitor_log.clone());
        let operator = store(Side::Operator, Arc::new(UnreachableLog));
        let replicator = Replicator::toward(&operator);

        let id = visitor
            .send_message(&alice_to_operator("hi"), Delivery::Origin(&replicator))
            .await
            .unwrap();

        assert_eq!(id, 1);
        assert_eq!(visitor.recent_messages(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn local_write_failure_propagates() {
        let visitor = store(Side::Visitor, Arc::new(UnreachableLog));
        let operator_log = MemoryLog::new();
        let operator = store(Side::Operator, operator_log.clone());
        let replicator = Replicator::toward(&operator);

        let err = visitor
            .send_message(&alice_to_operator("hi"), Delivery::Origin(&replicator))
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::ConnectivityError);
        assert_eq!(operator_log.append_count(), 0);
    }

    #[tokio::test]
    async fn conversation_is_oldest_first_and_clamped() {
        let log = MemoryLog::new();
        let visitor = store(Side::Visitor, log.clone());

        for i in 0..150 {
            visitor
                .send_message(
                    &alice_to_operator(&format!("m{i}")),
                    Delivery::Replicated { created_at: crate::testing::at(i) },
                )
                .await
                .unwrap();
        }

        let rows = visitor.conversation("alice", 1000).await.unwrap();
        assert_eq!(rows.len(), 100);
        assert!(rows.windows(2).all(|w| w[0].created_at <= w[1].created_at));
        assert_eq!(rows.last().unwrap().content.as_deref(), Some("m149"));

        assert_eq!(visitor.recent_messages(0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn store_down_at_startup_serves_once_reachable() {
        let log = FlakySchemaLog::failing(2);
        let visitor = store(Side::Visitor, log.clone());
        let operator = store(Side::Operator, MemoryLog::new());
        let replicator = Replicator::toward(&operator);

        assert_eq!(visitor.ensure_schema().await.unwrap_err().code(), ErrorCode::ConnectivityError);

        let err = visitor
            .send_message(&alice_to_operator("early"), Delivery::Origin(&replicator))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConnectivityError);
        assert_eq!(log.inner.append_count(), 0);

        visitor
            .send_message(&alice_to_operator("hi"), Delivery::Origin(&replicator))
            .await
            .unwrap();
        assert_eq!(visitor.recent_messages(10).await.unwrap().len(), 1);
        assert_eq!(visitor.conversation("alice", 10).await.unwrap().len(), 1);

        // Prepared once; later calls go straight to the table.
        assert_eq!(log.ensure_calls(), 3);
    }

    #[tokio::test]
    async fn reset_marks_the_table_prepared() {
        let log = FlakySchemaLog::failing(usize::MAX);
        let visitor = store(Side::Visitor, log.clone());

        visitor.reset_schema().await.unwrap();
        assert!(visitor.recent_messages(10).await.unwrap().is_empty());
        assert_eq!(log.ensure_calls(), 0);
    }
}
