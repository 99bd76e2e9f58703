use std::sync::Arc;

use async_trait::async_trait;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Nullable, Text, Timestamptz};

use fansite_shared::clients::db::StoreRegistry;
use fansite_shared::errors::AppResult;

use super::MessageLog;
use crate::models::{ConversationFilter, IdentityActivity, Message, NewMessage, Side};

const COLUMNS: &str = "id, sender, receiver, content, image_ref, video_ref, created_at";

/// `<schema>.chat_messages` in the store registered for one side.
///
/// The schema name is spliced into SQL text and must already be validated
/// as a plain identifier (see `AppConfig::validate`); all values are bound.
pub struct PgMessageLog {
    registry: Arc<StoreRegistry>,
    side: Side,
    schema: String,
    table: String,
}

impl PgMessageLog {
    pub fn new(registry: Arc<StoreRegistry>, side: Side, schema: impl Into<String>) -> Self {
        let schema = schema.into();
        let table = format!("{schema}.chat_messages");
        Self {
            registry,
            side,
            schema,
            table,
        }
    }

    fn create_ddl(&self) -> String {
        format!(
            "CREATE SCHEMA IF NOT EXISTS {schema}; \
             CREATE TABLE IF NOT EXISTS {table} ( \
                 id BIGSERIAL PRIMARY KEY, \
                 sender TEXT NOT NULL, \
                 receiver TEXT NOT NULL, \
                 content TEXT, \
                 image_ref TEXT, \
                 video_ref TEXT, \
                 created_at TIMESTAMPTZ NOT NULL DEFAULT NOW() \
             ); \
             CREATE INDEX IF NOT EXISTS chat_messages_created_at_idx ON {table} (created_at);",
            schema = self.schema,
            table = self.table,
        )
    }
}

#[derive(QueryableByName)]
struct InsertedId {
    #[diesel(sql_type = BigInt)]
    id: i64,
}

#[async_trait]
impl MessageLog for PgMessageLog {
    async fn append(&self, row: NewMessage) -> AppResult<i64> {
        let sql = format!(
            "INSERT INTO {} (sender, receiver, content, image_ref, video_ref, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
            self.table
        );

        let inserted = self
            .registry
            .execute(self.side.store_name(), move |conn| {
                diesel::sql_query(sql)
                    .bind::<Text, _>(row.sender)
                    .bind::<Text, _>(row.receiver)
                    .bind::<Nullable<Text>, _>(row.content)
                    .bind::<Nullable<Text>, _>(row.image_ref)
                    .bind::<Nullable<Text>, _>(row.video_ref)
                    .bind::<Timestamptz, _>(row.created_at)
                    .get_result::<InsertedId>(conn)
            })
            .await?;

        Ok(inserted.id)
    }

    async fn recent(&self, limit: i64) -> AppResult<Vec<Message>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM ( \
                 SELECT {COLUMNS} FROM {} ORDER BY created_at DESC, id DESC LIMIT $1 \
             ) latest ORDER BY created_at ASC, id ASC",
            self.table
        );

        self.registry
            .execute(self.side.store_name(), move |conn| {
                diesel::sql_query(sql)
                    .bind::<BigInt, _>(limit)
                    .load::<Message>(conn)
            })
            .await
    }

    async fn conversation(&self, filter: ConversationFilter<'_>, limit: i64) -> AppResult<Vec<Message>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM ( \
                 SELECT {COLUMNS} FROM {} \
                 WHERE (sender = $1 AND receiver = $2) \
                    OR (sender = $2 AND receiver IN ($1, $3)) \
                 ORDER BY created_at DESC, id DESC LIMIT $4 \
             ) latest ORDER BY created_at ASC, id ASC",
            self.table
        );
        let peer = filter.peer.to_string();
        let operator = filter.identities.operator.clone();
        let broadcast = filter.identities.broadcast.clone();

        self.registry
            .execute(self.side.store_name(), move |conn| {
                diesel::sql_query(sql)
                    .bind::<Text, _>(peer)
                    .bind::<Text, _>(operator)
                    .bind::<Text, _>(broadcast)
                    .bind::<BigInt, _>(limit)
                    .load::<Message>(conn)
            })
            .await
    }

    async fn activity(&self) -> AppResult<Vec<IdentityActivity>> {
        let sql = format!(
            "SELECT identity, MAX(last_active) AS last_active FROM ( \
                 SELECT sender AS identity, created_at AS last_active FROM {table} \
                 UNION ALL \
                 SELECT receiver AS identity, created_at AS last_active FROM {table} \
             ) seen GROUP BY identity",
            table = self.table
        );

        self.registry
            .execute(self.side.store_name(), move |conn| {
                diesel::sql_query(sql).load::<IdentityActivity>(conn)
            })
            .await
    }

    async fn ensure_schema(&self) -> AppResult<()> {
        let ddl = self.create_ddl();
        self.registry
            .execute(self.side.store_name(), move |conn| conn.batch_execute(&ddl))
            .await?;
        tracing::info!(side = %self.side, table = %self.table, "chat table ready");
        Ok(())
    }

    async fn reset_schema(&self) -> AppResult<()> {
        let ddl = format!("DROP TABLE IF EXISTS {}; {}", self.table, self.create_ddl());
        self.registry
            .execute(self.side.store_name(), move |conn| conn.batch_execute(&ddl))
            .await?;
        tracing::warn!(side = %self.side, table = %self.table, "chat table recreated");
        Ok(())
    }

    async fn ping(&self) -> AppResult<()> {
        self.registry.ping(self.side.store_name()).await
    }
}
