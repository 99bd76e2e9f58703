use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;

use fansite_shared::errors::{AppError, AppResult};

use crate::models::{MessagePayload, Side};
use crate::store::{Delivery, MessageStore};

/// Mirrors an origin write into the counterpart store.
///
/// Forwarded writes are delivered as [`Delivery::Replicated`], which carries
/// no replicator, so a mirrored write can never be forwarded again.
pub struct Replicator<'a> {
    counterpart: &'a MessageStore,
}

impl<'a> Replicator<'a> {
    pub fn toward(counterpart: &'a MessageStore) -> Self {
        Self { counterpart }
    }

    pub fn target(&self) -> Side {
        self.counterpart.side()
    }

    /// Best effort and unretried. The mirrored row keeps the origin's
    /// `created_at` so both copies share a dedup key.
    pub fn forward<'p>(
        &'p self,
        payload: &'p MessagePayload,
        created_at: DateTime<Utc>,
    ) -> BoxFuture<'p, AppResult<i64>> {
        async move {
            self.counterpart
                .send_message(payload, Delivery::Replicated { created_at })
                .await
                .map_err(|e| {
                    AppError::replication(format!(
                        "mirror to {} store failed: {e}",
                        self.counterpart.side()
                    ))
                })
        }
        .boxed()
    }
}
