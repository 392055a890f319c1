use anyhow::{anyhow, Result};
use chrono::{DateTime, Local, Utc};

use verichat::models::{Contact, ContactStatus, Conversation, DeliveryStatus, Message};
use verichat::StoreEvent;

// Line-oriented chat console: command parsing and plain-text rendering.

pub const HELP: &str = "\
Commands:
  /list                      show conversations
  /contacts                  show contacts
  /open <conversation-id>    select a conversation
  /new <contact-id>          start (or reopen) a direct chat
  /group <name> <ids...>     create a group with the given contacts
  /delete <conversation-id>  delete a conversation
  /reply <message-id> <text> reply to a message in the open conversation
  /show                      print the open conversation
  /help                      show this help
  /quit                      leave
Anything else is sent to the open conversation.";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    List,
    Contacts,
    Show,
    Open(String),
    New(String),
    Group { name: String, members: Vec<String> },
    Delete(String),
    Reply { to: String, text: String },
    Send(String),
    Quit,
}

/// Parse one input line. Plain text becomes `Command::Send`.
pub fn parse_command(line: &str) -> Result<Command> {
    let trimmed = line.trim();
    if !trimmed.starts_with('/') {
        return Ok(Command::Send(line.to_string()));
    }

    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default();
    let rest = parts.next().unwrap_or_default().trim();
    let required = |what: &str| -> Result<String> {
        if rest.is_empty() {
            Err(anyhow!("{} needs {}", name, what))
        } else {
            Ok(rest.to_string())
        }
    };

    match name {
        "/help" | "/?" => Ok(Command::Help),
        "/list" => Ok(Command::List),
        "/contacts" => Ok(Command::Contacts),
        "/show" => Ok(Command::Show),
        "/quit" | "/exit" => Ok(Command::Quit),
        "/open" => Ok(Command::Open(required("a conversation id")?)),
        "/new" => Ok(Command::New(required("a contact id")?)),
        "/delete" => Ok(Command::Delete(required("a conversation id")?)),
        "/group" => {
            let mut words = rest.split_whitespace();
            let name = words
                .next()
                .ok_or_else(|| anyhow!("/group needs a name and at least one contact id"))?;
            Ok(Command::Group {
                name: name.to_string(),
                members: words.map(str::to_string).collect(),
            })
        }
        "/reply" => {
            let mut split = rest.splitn(2, char::is_whitespace);
            let to = split.next().filter(|s| !s.is_empty());
            let text = split.next().map(str::trim).filter(|s| !s.is_empty());
            match (to, text) {
                (Some(to), Some(text)) => Ok(Command::Reply {
                    to: to.to_string(),
                    text: text.to_string(),
                }),
                _ => Err(anyhow!("/reply needs a message id and some text")),
            }
        }
        other => Err(anyhow!("Unknown command {} (try /help)", other)),
    }
}

fn local_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%H:%M").to_string()
}

pub fn render_conversations(conversations: &[Conversation], selected: Option<&str>) -> String {
    if conversations.is_empty() {
        return "No conversations. Start one with /new <contact-id>.".to_string();
    }
    conversations
        .iter()
        .map(|c| {
            let marker = if Some(c.id.as_str()) == selected { ">" } else { " " };
            let kind = if c.is_group { "group" } else { "direct" };
            let verified = if c.verified { " [verified]" } else { "" };
            let unread = if c.unread_count > 0 {
                format!(" ({} unread)", c.unread_count)
            } else {
                String::new()
            };
            format!(
                "{} {} [{}] {}{}{} - {} ({})",
                marker, c.id, kind, c.name, verified, unread, c.last_message, local_time(c.timestamp)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_contacts(contacts: &[Contact]) -> String {
    contacts
        .iter()
        .map(|c| {
            let presence = match c.status {
                ContactStatus::Online => "online",
                ContactStatus::Offline => "offline",
            };
            let verified = if c.verified { " [verified]" } else { "" };
            format!("  {} - {} ({}){}", c.id, c.name, presence, verified)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_message(message: &Message) -> String {
    let mut out = String::new();
    if let Some(reply) = &message.reply_to {
        out.push_str(&format!("    | {}: {}\n", reply.sender, reply.content));
    }
    let ticks = if message.is_mine {
        format!(" {}", message.status.ticks())
    } else {
        String::new()
    };
    out.push_str(&format!(
        "[{}] {} <{}> {}{}",
        local_time(message.timestamp),
        message.id,
        message.sender.name,
        message.content,
        ticks
    ));
    out
}

pub fn render_conversation(conversation: &Conversation) -> String {
    let mut lines = vec![format!("== {} ==", conversation.name)];
    if conversation.is_group {
        let names: Vec<&str> = conversation.participants.iter().map(|p| p.name.as_str()).collect();
        lines.push(format!("Participants: {}", names.join(", ")));
    }
    if conversation.messages.is_empty() {
        lines.push("(no messages yet)".to_string());
    }
    lines.extend(conversation.messages.iter().map(render_message));
    lines.join("\n")
}

/// Console line for a store event, if it is worth showing.
pub fn render_event(event: &StoreEvent) -> Option<String> {
    match event {
        StoreEvent::StatusChanged { message_id, status, .. } => {
            let label = match status {
                DeliveryStatus::Sent => "sent",
                DeliveryStatus::Delivered => "delivered",
                DeliveryStatus::Read => "read",
            };
            Some(format!("  {} {} {}", status.ticks(), message_id, label))
        }
        StoreEvent::ConversationDeleted(id) => Some(format!("  conversation {} deleted", id)),
        _ => None,
    }
}
