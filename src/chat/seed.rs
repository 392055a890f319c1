// Demo contacts and conversations the application starts with.

use chrono::{Duration, Utc};

use crate::models::{
    Contact, ContactStatus, Conversation, CurrentUser, DeliveryStatus, Message, ReplyRef, Sender,
};
use super::conversations::{ConversationStore, GROUP_AVATAR};

fn contact(id: &str, name: &str, status: ContactStatus, verified: bool) -> Contact {
    Contact {
        id: id.to_string(),
        name: name.to_string(),
        avatar: Some(format!("/avatars/{}.png", id)),
        status,
        verified,
    }
}

pub fn contacts() -> Vec<Contact> {
    vec![
        contact("alice", "Alice Smith", ContactStatus::Online, true),
        contact("bob", "Bob Johnson", ContactStatus::Offline, true),
        contact("charlie", "Charlie Davis", ContactStatus::Online, false),
        contact("david", "David Wilson", ContactStatus::Offline, true),
        contact("eva", "Eva Martinez", ContactStatus::Online, true),
        contact("frank", "Frank Thomas", ContactStatus::Offline, false),
    ]
}

/// A message from a contact, `minutes_ago` before now.
fn theirs(id: &str, from: &Contact, content: &str, minutes_ago: i64, verified: bool) -> Message {
    let first_name = from.name.split_whitespace().next().unwrap_or(&from.name);
    Message {
        id: id.to_string(),
        sender: Sender {
            id: from.id.clone(),
            name: first_name.to_string(),
            avatar: from.avatar.clone(),
        },
        content: content.to_string(),
        timestamp: Utc::now() - Duration::minutes(minutes_ago),
        status: DeliveryStatus::Read,
        verified,
        is_mine: false,
        reply_to: None,
    }
}

fn mine(id: &str, me: &CurrentUser, content: &str, minutes_ago: i64, status: DeliveryStatus) -> Message {
    Message {
        id: id.to_string(),
        sender: me.as_sender(),
        content: content.to_string(),
        timestamp: Utc::now() - Duration::minutes(minutes_ago),
        status,
        verified: true,
        is_mine: true,
        reply_to: None,
    }
}

fn direct(id: &str, with: &Contact, me: &CurrentUser, messages: Vec<Message>) -> Conversation {
    let last_message = messages.last().map(|m| m.content.clone()).unwrap_or_default();
    let timestamp = messages.last().map(|m| m.timestamp).unwrap_or_else(Utc::now);
    Conversation {
        id: id.to_string(),
        name: with.name.clone(),
        avatar: with.avatar.clone(),
        last_message,
        timestamp,
        unread_count: 0,
        verified: with.verified,
        is_group: false,
        participants: vec![with.clone(), me.as_participant()],
        messages,
    }
}

pub fn conversations(contacts: &[Contact], me: &CurrentUser) -> Vec<Conversation> {
    let find = |id: &str| contacts.iter().find(|c| c.id == id).cloned();
    let (Some(alice), Some(bob), Some(charlie), Some(david)) =
        (find("alice"), find("bob"), find("charlie"), find("david"))
    else {
        return Vec::new();
    };

    let challenges = "It has its challenges, but the libraries we're using make it much easier.";
    let mut testing = theirs("8", &alice, "When do you think it will be ready for testing?", 10, true);
    testing.reply_to = Some(ReplyRef {
        id: "7".to_string(),
        content: challenges.to_string(),
        sender: me.name.clone(),
    });

    let mut alice_chat = direct(
        "chat-alice",
        &alice,
        me,
        vec![
            theirs("1", &alice, "Hey there! How are you doing?", 60 * 24, true),
            mine("2", me, "I'm doing great! Just working on this new chat app design. How about you?", 60 * 23, DeliveryStatus::Read),
            theirs("3", &alice, "That sounds interesting! Can you tell me more about the security features?", 60 * 22, true),
            mine("4", me, "Sure! We're implementing end-to-end encryption and blockchain verification for all messages.", 60 * 22 - 5, DeliveryStatus::Read),
            mine("5", me, "This ensures that messages cannot be tampered with and provides a cryptographic proof of authenticity.", 60 * 22 - 7, DeliveryStatus::Read),
            theirs("6", &alice, "That sounds really secure! Is it difficult to implement?", 30, true),
            mine("7", me, challenges, 25, DeliveryStatus::Read),
            testing,
            mine("9", me, "We're aiming to have a prototype ready by the end of next week. I'll let you know when you can try it out!", 5, DeliveryStatus::Delivered),
        ],
    );
    alice_chat.last_message = "When do you think it will be ready for testing?".to_string();
    alice_chat.timestamp = Utc::now() - Duration::minutes(10);

    let bob_chat = direct(
        "chat-bob",
        &bob,
        me,
        vec![
            theirs("b1", &bob, "Hi there, do you have time for a meeting tomorrow?", 60 * 4, true),
            mine("b2", me, "Sure, what time were you thinking?", 60 * 3, DeliveryStatus::Read),
            theirs("b3", &bob, "How about 10 AM?", 60 * 2, true),
            mine("b4", me, "Works for me.", 60, DeliveryStatus::Read),
            theirs("b5", &bob, "The meeting is scheduled for tomorrow.", 30, true),
        ],
    );

    let team_messages = vec![
        theirs("pt1", &alice, "Has everyone reviewed the latest design?", 60 * 5, true),
        theirs("pt2", &bob, "Yes, I think it looks good!", 60 * 4, true),
        mine("pt3", me, "I have some suggestions for the security section.", 60 * 3, DeliveryStatus::Read),
        theirs("pt4", &charlie, "I've updated the documentation.", 60 * 2, false),
    ];
    let team = Conversation {
        id: "chat-project-team".to_string(),
        name: "Project Team".to_string(),
        avatar: Some(GROUP_AVATAR.to_string()),
        last_message: "Charlie: I've updated the documentation.".to_string(),
        timestamp: Utc::now() - Duration::hours(2),
        unread_count: 5,
        verified: false,
        is_group: true,
        participants: vec![alice, bob, charlie, me.as_participant()],
        messages: team_messages,
    };

    let david_chat = direct(
        "chat-david",
        &david,
        me,
        vec![
            theirs("d1", &david, "Hey, do you have those security implementation files?", 60 * 25, true),
            mine("d2", me, "Yes, I'll gather them for you.", 60 * 24 + 30, DeliveryStatus::Read),
            theirs("d3", &david, "Can you send me the files?", 60 * 24, true),
        ],
    );

    vec![alice_chat, bob_chat, team, david_chat]
}

/// Store seeded with the demo data; the first conversation is selected.
pub fn demo_store(me: &CurrentUser) -> ConversationStore {
    let contacts = contacts();
    let conversations = conversations(&contacts, me);
    ConversationStore::new(contacts, conversations)
}
