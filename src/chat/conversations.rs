// Conversation store: the single owner of conversations, contacts and the
// current selection. All mutation goes through the methods below.

use chrono::Utc;
use log::{debug, info};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Contact, Conversation, CurrentUser, DeliveryStatus, Message, ReplyRef};

pub const NEW_CHAT_PREVIEW: &str = "Start a conversation";
pub const NEW_GROUP_PREVIEW: &str = "Group created";
pub const GROUP_AVATAR: &str = "/avatars/group.png";
const PREVIEW_MAX_CHARS: usize = 80;

/// Precondition failures. State is left untouched whenever one is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("unknown contact: {0}")]
    UnknownContact(String),
    #[error("unknown conversation: {0}")]
    UnknownConversation(String),
    #[error("a group needs at least one contact besides you")]
    NotEnoughParticipants,
    #[error("message content is empty")]
    EmptyContent,
}

#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    conversations: Vec<Conversation>,
    contacts: Vec<Contact>,
    selected: Option<String>,
}

impl ConversationStore {
    pub fn new(contacts: Vec<Contact>, conversations: Vec<Conversation>) -> Self {
        let selected = conversations.first().map(|c| c.id.clone());
        ConversationStore {
            conversations,
            contacts,
            selected,
        }
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected(&self) -> Option<&Conversation> {
        self.selected.as_deref().and_then(|id| self.conversation(id))
    }

    pub fn conversation(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn contact(&self, id: &str) -> Option<&Contact> {
        self.contacts.iter().find(|c| c.id == id)
    }

    fn conversation_mut(&mut self, id: &str) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }

    pub fn select(&mut self, id: Option<&str>) -> Result<(), ChatError> {
        match id {
            Some(id) if self.conversation(id).is_none() => {
                Err(ChatError::UnknownConversation(id.to_string()))
            }
            Some(id) => {
                self.selected = Some(id.to_string());
                Ok(())
            }
            None => {
                self.selected = None;
                Ok(())
            }
        }
    }

    /// Opens the direct conversation with `contact_id`, creating it if needed.
    /// Returns the id of the selected conversation. `me` is never a contact,
    /// even when a contact shares its id.
    pub fn start_direct(&mut self, me: &CurrentUser, contact_id: &str) -> Result<String, ChatError> {
        let contact = self
            .contact(contact_id)
            .filter(|c| c.id != me.id)
            .cloned()
            .ok_or_else(|| ChatError::UnknownContact(contact_id.to_string()))?;

        if let Some(existing) = self
            .conversations
            .iter()
            .find(|c| c.is_direct_with(&me.id, contact_id))
        {
            let id = existing.id.clone();
            debug!("Reusing direct conversation {} with {}", id, contact_id);
            self.selected = Some(id.clone());
            return Ok(id);
        }

        let conversation = Conversation {
            id: format!("chat-{}", Uuid::new_v4()),
            name: contact.name.clone(),
            avatar: contact.avatar.clone(),
            last_message: NEW_CHAT_PREVIEW.to_string(),
            timestamp: Utc::now(),
            unread_count: 0,
            verified: contact.verified,
            is_group: false,
            participants: vec![contact, me.as_participant()],
            messages: Vec::new(),
        };
        let id = conversation.id.clone();
        info!("Created direct conversation {} with {}", id, contact_id);

        self.conversations.insert(0, conversation);
        self.selected = Some(id.clone());
        Ok(id)
    }

    /// Creates a group of the given contacts plus `me`. Unknown ids are skipped.
    pub fn create_group(
        &mut self,
        me: &CurrentUser,
        name: &str,
        contact_ids: &[String],
    ) -> Result<String, ChatError> {
        let mut participants: Vec<Contact> = Vec::new();
        for contact in &self.contacts {
            if contact_ids.iter().any(|id| id == &contact.id) && contact.id != me.id {
                participants.push(contact.clone());
            }
        }

        if participants.is_empty() {
            debug!("Refusing to create group '{}': no known contacts in {:?}", name, contact_ids);
            return Err(ChatError::NotEnoughParticipants);
        }
        participants.push(me.as_participant());

        let conversation = Conversation {
            id: format!("group-{}", Uuid::new_v4()),
            name: name.to_string(),
            avatar: Some(GROUP_AVATAR.to_string()),
            last_message: NEW_GROUP_PREVIEW.to_string(),
            timestamp: Utc::now(),
            unread_count: 0,
            verified: participants.iter().all(|p| p.verified),
            is_group: true,
            participants,
            messages: Vec::new(),
        };
        let id = conversation.id.clone();
        info!("Created group {} '{}' with {} participants", id, name, conversation.participants.len());

        self.conversations.insert(0, conversation);
        self.selected = Some(id.clone());
        Ok(id)
    }

    pub fn delete(&mut self, id: &str) -> Result<Conversation, ChatError> {
        let index = self
            .conversations
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| ChatError::UnknownConversation(id.to_string()))?;
        let removed = self.conversations.remove(index);

        if self.selected.as_deref() == Some(id) {
            self.selected = self.conversations.first().map(|c| c.id.clone());
        }
        info!("Deleted conversation {}", id);
        Ok(removed)
    }

    /// Appends a message from `me`. Returns the new message so the caller can
    /// schedule its lifecycle.
    pub fn send_message(
        &mut self,
        me: &CurrentUser,
        conversation_id: &str,
        content: &str,
        reply_to: Option<&str>,
    ) -> Result<Message, ChatError> {
        if content.trim().is_empty() {
            return Err(ChatError::EmptyContent);
        }
        let conversation = self
            .conversation_mut(conversation_id)
            .ok_or_else(|| ChatError::UnknownConversation(conversation_id.to_string()))?;

        let now = Utc::now();
        let reply_to = reply_to.and_then(|target| {
            let snapshot = conversation.message(target).map(|m| ReplyRef {
                id: m.id.clone(),
                content: m.content.clone(),
                sender: m.sender.name.clone(),
            });
            if snapshot.is_none() {
                debug!("Reply target {} not found in {}, sending without reply", target, conversation_id);
            }
            snapshot
        });

        let message = Message {
            id: format!("msg-{}", Uuid::new_v4()),
            sender: me.as_sender(),
            content: content.to_string(),
            timestamp: now,
            status: DeliveryStatus::Sent,
            verified: true,
            is_mine: true,
            reply_to,
        };

        conversation.last_message = format!("You: {}", excerpt(content));
        conversation.timestamp = now;
        conversation.messages.push(message.clone());

        debug!("Appended message {} to {}", message.id, conversation_id);
        Ok(message)
    }

    /// Moves one message to `next`. Missing targets and anything other than
    /// the immediate successor are ignored.
    pub(crate) fn advance_status(
        &mut self,
        conversation_id: &str,
        message_id: &str,
        next: DeliveryStatus,
    ) -> bool {
        let Some(conversation) = self.conversation_mut(conversation_id) else {
            debug!("Status update for {} skipped: conversation {} is gone", message_id, conversation_id);
            return false;
        };
        match conversation.messages.iter_mut().find(|m| m.id == message_id) {
            Some(message) => {
                let previous = message.status;
                let changed = message.status.advance_to(next);
                if changed {
                    info!("Updating message {} status from {:?} to {:?}", message_id, previous, next);
                }
                changed
            }
            None => {
                debug!("Tried to update status for unknown message ID: {}", message_id);
                false
            }
        }
    }
}

fn excerpt(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(PREVIEW_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
