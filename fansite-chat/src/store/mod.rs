//! Per-side message logs.
//!
//! [`MessageLog`] is the raw append/query surface of one store's table;
//! [`MessageStore`] puts the send contract (validation, timestamps,
//! replication) on top of it.

use async_trait::async_trait;

use fansite_shared::errors::AppResult;

use crate::models::{ConversationFilter, IdentityActivity, Message, NewMessage};

mod message_store;
mod sql;

pub use message_store::{clamp_limit, Delivery, MessageStore, MAX_LIMIT};
pub use sql::PgMessageLog;

/// Append-only log backing one side. Every read returns rows oldest-first.
#[async_trait]
pub trait MessageLog: Send + Sync {
    /// Appends `row` and returns its store-local id.
    async fn append(&self, row: NewMessage) -> AppResult<i64>;

    /// The `limit` most recent rows.
    async fn recent(&self, limit: i64) -> AppResult<Vec<Message>>;

    /// The `limit` most recent rows matching `filter`.
    async fn conversation(&self, filter: ConversationFilter<'_>, limit: i64) -> AppResult<Vec<Message>>;

    /// Every identity seen as sender or receiver, with its latest timestamp.
    /// Reserved identities are included; callers filter them.
    async fn activity(&self) -> AppResult<Vec<IdentityActivity>>;

    /// Creates the table if it does not exist yet.
    async fn ensure_schema(&self) -> AppResult<()>;

    /// Drops and recreates the table.
    async fn reset_schema(&self) -> AppResult<()>;

    async fn ping(&self) -> AppResult<()>;
}
