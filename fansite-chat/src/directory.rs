use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use fansite_shared::errors::AppResult;

use crate::consolidator::either_side;
use crate::models::{now_micros, IdentityActivity, Participant};
use crate::store::MessageStore;

/// Shown when nobody has chatted yet, so the operator view is never blank.
pub const PLACEHOLDER_PARTICIPANTS: [&str; 3] = ["guest", "new-reader", "fan"];

/// Everyone who has exchanged messages, across both stores.
pub struct ParticipantDirectory {
    visitor: Arc<MessageStore>,
    operator: Arc<MessageStore>,
}

impl ParticipantDirectory {
    pub fn new(visitor: Arc<MessageStore>, operator: Arc<MessageStore>) -> Self {
        Self { visitor, operator }
    }

    /// Most recently active first; never empty.
    pub async fn participants(&self) -> AppResult<Vec<Participant>> {
        let (visitor, operator) = tokio::join!(self.visitor.activity(), self.operator.activity());
        let seen = either_side("participants", visitor, operator)?;

        let identities = self.visitor.identities();
        let participants = collect(seen.into_iter().filter(|a| !identities.is_reserved(&a.identity)));

        if participants.is_empty() {
            return Ok(placeholders(now_micros()));
        }
        Ok(participants)
    }
}

/// Merges by identity on the latest timestamp, newest first. Ties fall back
/// to identity order so the listing is stable.
fn collect(seen: impl Iterator<Item = IdentityActivity>) -> Vec<Participant> {
    let mut latest: HashMap<String, DateTime<Utc>> = HashMap::new();
    for activity in seen {
        latest
            .entry(activity.identity)
            .and_modify(|t| *t = (*t).max(activity.last_active))
            .or_insert(activity.last_active);
    }

    let mut participants: Vec<Participant> = latest
        .into_iter()
        .map(|(identity, last_active)| Participant { identity, last_active })
        .collect();
    participants.sort_by(|a, b| {
        b.last_active
            .cmp(&a.last_active)
            .then_with(|| a.identity.cmp(&b.identity))
    });
    participants
}

fn placeholders(now: DateTime<Utc>) -> Vec<Participant> {
    PLACEHOLDER_PARTICIPANTS
        .iter()
        .map(|identity| Participant {
            identity: identity.to_string(),
            last_active: now,
        })
        .collect()
}
