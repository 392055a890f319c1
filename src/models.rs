use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub status: ContactStatus,
    pub verified: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactStatus {
    Online,
    Offline,
}

/// The signed-in identity. Passed explicitly to every operation that
/// authors content or adds "me" to a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl CurrentUser {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        CurrentUser {
            id: id.into(),
            name: name.into(),
            avatar: None,
        }
    }

    pub fn as_sender(&self) -> Sender {
        Sender {
            id: self.id.clone(),
            name: self.name.clone(),
            avatar: self.avatar.clone(),
        }
    }

    /// The current user as a conversation participant. Always online and verified.
    pub fn as_participant(&self) -> Contact {
        Contact {
            id: self.id.clone(),
            name: self.name.clone(),
            avatar: self.avatar.clone(),
            status: ContactStatus::Online,
            verified: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sender {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Snapshot of the message being replied to, taken at send time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyRef {
    pub id: String,
    pub content: String,
    pub sender: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender: Sender,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub status: DeliveryStatus,
    pub verified: bool,
    pub is_mine: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<ReplyRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub last_message: String,
    pub timestamp: DateTime<Utc>,
    pub unread_count: u32,
    pub verified: bool,
    pub is_group: bool,
    pub participants: Vec<Contact>,
    pub messages: Vec<Message>,
}

impl Conversation {
    /// True for a direct thread that has `contact_id` as its other participant,
    /// i.e. not the entry for `me_id`.
    pub fn is_direct_with(&self, me_id: &str, contact_id: &str) -> bool {
        !self.is_group
            && contact_id != me_id
            && self.participants.iter().any(|p| p.id == contact_id)
    }

    pub fn message(&self, message_id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == message_id)
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent = 0,      // Accepted locally
    Delivered = 1, // Acknowledged by the recipient's device
    Read = 2,      // Read by recipient
}

impl DeliveryStatus {
    /// The only status this one may move to, if any.
    pub fn next(self) -> Option<DeliveryStatus> {
        match self {
            DeliveryStatus::Sent => Some(DeliveryStatus::Delivered),
            DeliveryStatus::Delivered => Some(DeliveryStatus::Read),
            DeliveryStatus::Read => None,
        }
    }

    /// Moves to `target` only if it is the immediate successor.
    /// Returns whether the status changed.
    pub fn advance_to(&mut self, target: DeliveryStatus) -> bool {
        if self.next() == Some(target) {
            *self = target;
            true
        } else {
            false
        }
    }

    pub fn ticks(self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "✓",
            DeliveryStatus::Delivered => "✓✓",
            DeliveryStatus::Read => "✓✓✓",
        }
    }
}
