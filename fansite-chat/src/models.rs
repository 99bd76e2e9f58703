use chrono::{DateTime, SubsecRound, Utc};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Nullable, Text, Timestamptz};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

// --- Side ---

/// The two logical stores. `Visitor` is Side A, `Operator` is Side B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Visitor,
    Operator,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Visitor, Side::Operator];

    /// Registry key of the store backing this side.
    pub fn store_name(&self) -> &'static str {
        match self {
            Self::Visitor => "visitor",
            Self::Operator => "operator",
        }
    }

    pub fn counterpart(&self) -> Side {
        match self {
            Self::Visitor => Self::Operator,
            Self::Operator => Self::Visitor,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.store_name())
    }
}

// --- Reserved identities ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identities {
    pub operator: String,
    pub broadcast: String,
}

impl Identities {
    pub fn new(operator: impl Into<String>, broadcast: impl Into<String>) -> Self {
        Self {
            operator: operator.into(),
            broadcast: broadcast.into(),
        }
    }

    pub fn is_reserved(&self, identity: &str) -> bool {
        identity == self.operator || identity == self.broadcast
    }
}

// --- Message ---

/// One row of a store's log. `id` is only meaningful within the store it
/// was read from.
#[derive(Debug, Clone, PartialEq, Eq, QueryableByName, Serialize)]
pub struct Message {
    #[diesel(sql_type = BigInt)]
    pub id: i64,
    #[diesel(sql_type = Text)]
    pub sender: String,
    #[diesel(sql_type = Text)]
    pub receiver: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub content: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub image_ref: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub video_ref: Option<String>,
    #[diesel(sql_type = Timestamptz)]
    pub created_at: DateTime<Utc>,
}

/// Incoming send request, as accepted from either side.
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct MessagePayload {
    #[serde(default)]
    #[validate(custom = "validate_sender")]
    pub sender: String,
    #[serde(default)]
    pub receiver: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub image_ref: Option<String>,
    #[serde(default)]
    pub video_ref: Option<String>,
}

/// Whitespace-only senders count as missing; stored senders are trimmed.
fn validate_sender(sender: &str) -> Result<(), ValidationError> {
    if sender.trim().is_empty() {
        let mut err = ValidationError::new("required");
        err.message = Some("sender is required".into());
        return Err(err);
    }
    Ok(())
}

/// A row ready to append: identities resolved, timestamp assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub sender: String,
    pub receiver: String,
    pub content: Option<String>,
    pub image_ref: Option<String>,
    pub video_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewMessage {
    /// A blank or omitted receiver addresses everyone.
    pub fn from_payload(payload: &MessagePayload, broadcast: &str, created_at: DateTime<Utc>) -> Self {
        let receiver = payload
            .receiver
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(broadcast);

        Self {
            sender: payload.sender.trim().to_string(),
            receiver: receiver.to_string(),
            content: payload.content.clone(),
            image_ref: payload.image_ref.clone(),
            video_ref: payload.video_ref.clone(),
            created_at,
        }
    }

    pub fn into_message(self, id: i64) -> Message {
        Message {
            id,
            sender: self.sender,
            receiver: self.receiver,
            content: self.content,
            image_ref: self.image_ref,
            video_ref: self.video_ref,
            created_at: self.created_at,
        }
    }
}

/// Server clock at the precision Postgres keeps, so a timestamp written and
/// read back compares equal to the one handed to the replica.
pub fn now_micros() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

// --- Conversation ---

/// Rows between one peer and the operator: the peer writing to the operator,
/// or the operator writing to the peer or to everyone.
#[derive(Debug, Clone, Copy)]
pub struct ConversationFilter<'a> {
    pub peer: &'a str,
    pub identities: &'a Identities,
}

impl<'a> ConversationFilter<'a> {
    pub fn new(peer: &'a str, identities: &'a Identities) -> Self {
        Self { peer, identities }
    }

    pub fn matches(&self, message: &Message) -> bool {
        let operator = self.identities.operator.as_str();
        (message.sender == self.peer && message.receiver == operator)
            || (message.sender == operator
                && (message.receiver == self.peer || message.receiver == self.identities.broadcast))
    }
}

// --- Participants ---

/// Latest activity of one identity in one store, in either role.
#[derive(Debug, Clone, PartialEq, Eq, QueryableByName)]
pub struct IdentityActivity {
    #[diesel(sql_type = Text)]
    pub identity: String,
    #[diesel(sql_type = Timestamptz)]
    pub last_active: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
    pub identity: String,
    pub last_active: DateTime<Utc>,
}
