//! In-memory logs for exercising the core without Postgres.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use fansite_shared::errors::{AppError, AppResult};

use crate::models::{ConversationFilter, IdentityActivity, Identities, Message, MessagePayload, NewMessage};
use crate::store::MessageLog;

pub fn identities() -> Arc<Identities> {
    Arc::new(Identities::new("operator", "all"))
}

/// A fixed instant `seconds` after an arbitrary epoch.
pub fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
}

pub fn alice_to_operator(content: &str) -> MessagePayload {
    MessagePayload {
        sender: "alice".into(),
        receiver: Some("operator".into()),
        content: Some(content.into()),
        ..Default::default()
    }
}

#[derive(Default)]
pub struct MemoryLog {
    rows: Mutex<Vec<Message>>,
    appends: AtomicUsize,
}

impl MemoryLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_rows(rows: Vec<Message>) -> Arc<Self> {
        Arc::new(Self {
            rows: Mutex::new(rows),
            appends: AtomicUsize::new(0),
        })
    }

    pub fn rows(&self) -> Vec<Message> {
        self.rows.lock().unwrap().clone()
    }

    pub fn append_count(&self) -> usize {
        self.appends.load(Ordering::SeqCst)
    }

    fn tail(&self, keep: impl Fn(&Message) -> bool, limit: i64) -> Vec<Message> {
        let mut rows: Vec<Message> = self.rows().into_iter().filter(|m| keep(m)).collect();
        rows.sort_by_key(|m| (m.created_at, m.id));
        let excess = rows.len().saturating_sub(limit as usize);
        rows.split_off(excess)
    }
}

#[async_trait]
impl MessageLog for MemoryLog {
    async fn append(&self, row: NewMessage) -> AppResult<i64> {
        self.appends.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.lock().unwrap();
        let id = rows.iter().map(|m| m.id).max().unwrap_or(0) + 1;
        rows.push(row.into_message(id));
        Ok(id)
    }

    async fn recent(&self, limit: i64) -> AppResult<Vec<Message>> {
        Ok(self.tail(|_| true, limit))
    }

    async fn conversation(&self, filter: ConversationFilter<'_>, limit: i64) -> AppResult<Vec<Message>> {
        Ok(self.tail(|m| filter.matches(m), limit))
    }

    async fn activity(&self) -> AppResult<Vec<IdentityActivity>> {
        Ok(self
            .rows()
            .into_iter()
            .flat_map(|m| {
                [
                    IdentityActivity { identity: m.sender, last_active: m.created_at },
                    IdentityActivity { identity: m.receiver, last_active: m.created_at },
                ]
            })
            .collect())
    }

    async fn ensure_schema(&self) -> AppResult<()> {
        Ok(())
    }

    async fn reset_schema(&self) -> AppResult<()> {
        self.rows.lock().unwrap().clear();
        Ok(())
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

/// A store whose every call fails as if the database were down.
pub struct UnreachableLog;

fn down<T>() -> AppResult<T> {
    Err(AppError::connectivity("store 'test' is unreachable"))
}

#[async_trait]
impl MessageLog for UnreachableLog {
    async fn append(&self, _row: NewMessage) -> AppResult<i64> {
        down()
    }

    async fn recent(&self, _limit: i64) -> AppResult<Vec<Message>> {
        down()
    }

    async fn conversation(&self, _filter: ConversationFilter<'_>, _limit: i64) -> AppResult<Vec<Message>> {
        down()
    }

    async fn activity(&self) -> AppResult<Vec<IdentityActivity>> {
        down()
    }

    async fn ensure_schema(&self) -> AppResult<()> {
        down()
    }

    async fn reset_schema(&self) -> AppResult<()> {
        down()
    }

    async fn ping(&self) -> AppResult<()> {
        down()
    }
}

/// A store whose table cannot be prepared for the first `failures` attempts,
/// as if the database were still coming up.
pub struct FlakySchemaLog {
    pub inner: Arc<MemoryLog>,
    failures: usize,
    ensures: AtomicUsize,
}

impl FlakySchemaLog {
    pub fn failing(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryLog::new(),
            failures,
            ensures: AtomicUsize::new(0),
        })
    }

    pub fn ensure_calls(&self) -> usize {
        self.ensures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageLog for FlakySchemaLog {
    async fn append(&self, row: NewMessage) -> AppResult<i64> {
        self.inner.append(row).await
    }

    async fn recent(&self, limit: i64) -> AppResult<Vec<Message>> {
        self.inner.recent(limit).await
    }

    async fn conversation(&self, filter: ConversationFilter<'_>, limit: i64) -> AppResult<Vec<Message>> {
        self.inner.conversation(filter, limit).await
    }

    async fn activity(&self) -> AppResult<Vec<IdentityActivity>> {
        self.inner.activity().await
    }

    async fn ensure_schema(&self) -> AppResult<()> {
        let attempt = self.ensures.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return down();
        }
        self.inner.ensure_schema().await
    }

    async fn reset_schema(&self) -> AppResult<()> {
        self.inner.reset_schema().await
    }

    async fn ping(&self) -> AppResult<()> {
        self.inner.ping().await
    }
}
