// Chat data layer
// ChatStore is the shared handle every caller goes through; the state itself
// lives in ConversationStore behind an async mutex.

use log::{debug, info};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex as TokioMutex};

pub mod conversations;
pub mod delivery_status;
pub mod seed;

pub use conversations::{ChatError, ConversationStore};
pub use delivery_status::DeliveryTimings;

use crate::models::{Contact, Conversation, CurrentUser, DeliveryStatus};

const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Change notifications for whoever renders the store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    SelectionChanged(Option<String>),
    ConversationCreated(String),
    ConversationDeleted(String),
    MessageAppended {
        conversation_id: String,
        message_id: String,
    },
    StatusChanged {
        conversation_id: String,
        message_id: String,
        status: DeliveryStatus,
    },
}

#[derive(Clone)]
pub struct ChatStore {
    inner: Arc<TokioMutex<ConversationStore>>,
    events_tx: mpsc::Sender<StoreEvent>,
    timings: DeliveryTimings,
}

impl ChatStore {
    pub fn new(store: ConversationStore, timings: DeliveryTimings) -> (Self, mpsc::Receiver<StoreEvent>) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let chat = Self {
            inner: Arc::new(TokioMutex::new(store)),
            events_tx,
            timings,
        };
        (chat, events_rx)
    }

    pub fn timings(&self) -> DeliveryTimings {
        self.timings
    }

    // Events are best effort; a slow or absent reader never stalls a mutation.
    // Callers emit while still holding the store lock, so events are queued
    // in the order the mutations were applied.
    fn emit(&self, event: StoreEvent) {
        if let Err(e) = self.events_tx.try_send(event) {
            debug!("Dropped store event: {}", e);
        }
    }

    pub async fn conversations(&self) -> Vec<Conversation> {
        self.inner.lock().await.conversations().to_vec()
    }

    pub async fn contacts(&self) -> Vec<Contact> {
        self.inner.lock().await.contacts().to_vec()
    }

    pub async fn conversation(&self, id: &str) -> Option<Conversation> {
        self.inner.lock().await.conversation(id).cloned()
    }

    pub async fn selected_id(&self) -> Option<String> {
        self.inner.lock().await.selected_id().map(str::to_string)
    }

    pub async fn selected(&self) -> Option<Conversation> {
        self.inner.lock().await.selected().cloned()
    }

    pub async fn select(&self, id: Option<&str>) -> Result<(), ChatError> {
        let mut inner = self.inner.lock().await;
        inner.select(id)?;
        self.emit(StoreEvent::SelectionChanged(id.map(str::to_string)));
        Ok(())
    }

    pub async fn start_direct(&self, me: &CurrentUser, contact_id: &str) -> Result<String, ChatError> {
        let mut inner = self.inner.lock().await;
        let before = inner.conversations().len();
        let id = inner.start_direct(me, contact_id)?;

        if inner.conversations().len() > before {
            self.emit(StoreEvent::ConversationCreated(id.clone()));
        }
        self.emit(StoreEvent::SelectionChanged(Some(id.clone())));
        Ok(id)
    }

    pub async fn create_group(
        &self,
        me: &CurrentUser,
        name: &str,
        contact_ids: &[String],
    ) -> Result<String, ChatError> {
        let mut inner = self.inner.lock().await;
        let id = inner.create_group(me, name, contact_ids)?;
        self.emit(StoreEvent::ConversationCreated(id.clone()));
        self.emit(StoreEvent::SelectionChanged(Some(id.clone())));
        Ok(id)
    }

    pub async fn delete(&self, id: &str) -> Result<(), ChatError> {
        let mut inner = self.inner.lock().await;
        let selected_before = inner.selected_id().map(str::to_string);
        inner.delete(id)?;
        let selected_after = inner.selected_id().map(str::to_string);

        self.emit(StoreEvent::ConversationDeleted(id.to_string()));
        if selected_before != selected_after {
            self.emit(StoreEvent::SelectionChanged(selected_after));
        }
        Ok(())
    }

    /// Appends a message and starts its simulated delivery.
    /// Returns the new message id.
    pub async fn send_message(
        &self,
        me: &CurrentUser,
        conversation_id: &str,
        content: &str,
        reply_to: Option<&str>,
    ) -> Result<String, ChatError> {
        let mut inner = self.inner.lock().await;
        let message = inner.send_message(me, conversation_id, content, reply_to)?;
        info!("Message {} queued in {}", message.id, conversation_id);

        self.emit(StoreEvent::MessageAppended {
            conversation_id: conversation_id.to_string(),
            message_id: message.id.clone(),
        });
        drop(inner);

        self.schedule_delivery(conversation_id.to_string(), message.id.clone());
        Ok(message.id)
    }
}
