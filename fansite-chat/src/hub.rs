use std::sync::Arc;

use fansite_shared::errors::AppResult;

use crate::consolidator::ViewConsolidator;
use crate::directory::ParticipantDirectory;
use crate::models::{Identities, Message, MessagePayload, Participant, Side};
use crate::replication::Replicator;
use crate::store::{Delivery, MessageLog, MessageStore};

/// Entry point for request handlers: both stores plus the merged views.
pub struct ChatHub {
    visitor: Arc<MessageStore>,
    operator: Arc<MessageStore>,
    views: ViewConsolidator,
    directory: ParticipantDirectory,
}

impl ChatHub {
    pub fn new(
        visitor_log: Arc<dyn MessageLog>,
        operator_log: Arc<dyn MessageLog>,
        identities: Identities,
        greeting: impl Into<String>,
    ) -> Self {
        let identities = Arc::new(identities);
        let visitor = Arc::new(MessageStore::new(Side::Visitor, visitor_log, identities.clone()));
        let operator = Arc::new(MessageStore::new(Side::Operator, operator_log, identities));

        Self {
            views: ViewConsolidator::new(visitor.clone(), operator.clone(), greeting),
            directory: ParticipantDirectory::new(visitor.clone(), operator.clone()),
            visitor,
            operator,
        }
    }

    pub fn store(&self, side: Side) -> &MessageStore {
        match side {
            Side::Visitor => self.visitor.as_ref(),
            Side::Operator => self.operator.as_ref(),
        }
    }

    /// Writes to `side` and mirrors into the other side. Returns the id in
    /// `side`'s store.
    pub async fn send_message(&self, side: Side, payload: &MessagePayload) -> AppResult<i64> {
        let replicator = Replicator::toward(self.store(side.counterpart()));
        self.store(side)
            .send_message(payload, Delivery::Origin(&replicator))
            .await
    }

    pub async fn recent_messages(&self, side: Side, limit: i64) -> AppResult<Vec<Message>> {
        self.store(side).recent_messages(limit).await
    }

    pub async fn merged_recent(&self, limit: i64) -> AppResult<Vec<Message>> {
        self.views.merged_recent(limit).await
    }

    pub async fn merged_conversation(&self, peer: &str, limit: i64) -> AppResult<Vec<Message>> {
        self.views.merged_conversation(peer, limit).await
    }

    pub async fn participants(&self) -> AppResult<Vec<Participant>> {
        self.directory.participants().await
    }

    /// Creates missing tables up front. A store that is down is logged and
    /// skipped; its first request once reachable creates the table instead.
    pub async fn ensure_schemas(&self) {
        for side in Side::ALL {
            if let Err(e) = self.store(side).ensure_schema().await {
                tracing::error!(side = %side, error = %e, "could not prepare chat table");
            }
        }
    }

    pub async fn reset_schemas(&self) -> AppResult<()> {
        for side in Side::ALL {
            self.store(side).reset_schema().await?;
        }
        Ok(())
    }
}
