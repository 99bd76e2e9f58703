use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use fansite_shared::errors::AppResult;

use crate::models::{now_micros, Message, Side};
use crate::store::{clamp_limit, MessageStore};

/// Cross-store identity of a message. Store-local ids differ between an
/// origin row and its replica, so the row's content is the key.
///
/// Two distinct messages from the same sender to the same receiver with the
/// same content and timestamp collapse into one entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    sender: String,
    receiver: String,
    content: Option<String>,
    created_at: DateTime<Utc>,
}

impl DedupKey {
    pub fn of(message: &Message) -> Self {
        Self {
            sender: message.sender.clone(),
            receiver: message.receiver.clone(),
            content: message.content.clone(),
            created_at: message.created_at,
        }
    }
}

/// Keeps the first row seen for each key.
pub fn dedup(rows: Vec<Message>) -> Vec<Message> {
    let mut seen = HashSet::with_capacity(rows.len());
    rows.into_iter().filter(|m| seen.insert(DedupKey::of(m))).collect()
}

/// Dedups, orders oldest-first and keeps the newest `limit` rows.
pub fn merge(rows: Vec<Message>, limit: usize) -> Vec<Message> {
    let mut rows = dedup(rows);
    rows.sort_by_key(|m| m.created_at);
    if rows.len() > limit {
        rows.drain(..rows.len() - limit);
    }
    rows
}

/// Combines the result of reading both sides. One failed side is logged and
/// skipped; if both fail the visitor side's error is returned.
pub(crate) fn either_side<T>(
    what: &'static str,
    visitor: AppResult<Vec<T>>,
    operator: AppResult<Vec<T>>,
) -> AppResult<Vec<T>> {
    match (visitor, operator) {
        (Ok(mut a), Ok(b)) => {
            a.extend(b);
            Ok(a)
        }
        (Ok(rows), Err(e)) => {
            tracing::warn!(read = what, failed = Side::Operator.store_name(), error = %e, "serving from one store only");
            Ok(rows)
        }
        (Err(e), Ok(rows)) => {
            tracing::warn!(read = what, failed = Side::Visitor.store_name(), error = %e, "serving from one store only");
            Ok(rows)
        }
        (Err(e), Err(other)) => {
            tracing::warn!(read = what, error = %other, "operator store read failed too");
            Err(e)
        }
    }
}

/// Read-time merge of both stores into one history.
pub struct ViewConsolidator {
    visitor: Arc<MessageStore>,
    operator: Arc<MessageStore>,
    greeting: String,
}

impl ViewConsolidator {
    pub fn new(visitor: Arc<MessageStore>, operator: Arc<MessageStore>, greeting: impl Into<String>) -> Self {
        Self {
            visitor,
            operator,
            greeting: greeting.into(),
        }
    }

    pub async fn merged_recent(&self, limit: i64) -> AppResult<Vec<Message>> {
        let limit = clamp_limit(limit);
        let (visitor, operator) = tokio::join!(
            self.visitor.recent_messages(limit),
            self.operator.recent_messages(limit),
        );
        let rows = either_side("recent", visitor, operator)?;
        Ok(merge(rows, limit as usize))
    }

    /// Never empty: a peer with no history yet gets the operator greeting.
    pub async fn merged_conversation(&self, peer: &str, limit: i64) -> AppResult<Vec<Message>> {
        let limit = clamp_limit(limit);
        let (visitor, operator) = tokio::join!(
            self.visitor.conversation(peer, limit),
            self.operator.conversation(peer, limit),
        );
        let rows = either_side("conversation", visitor, operator)?;
        if rows.is_empty() {
            return Ok(vec![self.greeting_for(peer)]);
        }
        Ok(merge(rows, limit as usize))
    }

    fn greeting_for(&self, peer: &str) -> Message {
        Message {
            id: 0,
            sender: self.visitor.identities().operator.clone(),
            receiver: peer.to_string(),
            content: Some(self.greeting.clone()),
            image_ref: None,
            video_ref: None,
            created_at: now_micros(),
        }
    }
}
