//! Append-then-mutate message and part log (spec §4.F).
//!
//! Messages and parts are appended in order and occasionally mutated in
//! place (streaming text accumulation, tool-call status transitions). This
//! crate is the sole writer of `sortOrder`, so the ordering invariants in
//! spec §4.F hold regardless of what the caller passes in.

mod patch;

pub use patch::PartPatch;

use forge_bus::BroadcastBus;
use forge_error::Error;
use forge_error::Result;
use forge_protocol::Event;
use forge_protocol::Message;
use forge_protocol::MessageRole;
use forge_protocol::Part;
use forge_protocol::PartKind;
use forge_store::Store;
use tracing::debug;

/// Appends and mutates messages/parts against a [`Store`], assigning dense
/// `sortOrder` values and emitting events for each write.
pub struct MessageStore<S> {
    store: S,
    bus: BroadcastBus,
}

impl<S> MessageStore<S>
where
    S: Store,
{
    pub fn new(store: S, bus: BroadcastBus) -> Self {
        Self { store, bus }
    }

    /// Appends a new message to the session, assigning it the next
    /// `sortOrder` and emitting `message.created`.
    pub async fn append_message(
        &self,
        session_id: &str,
        id: &str,
        role: MessageRole,
    ) -> Result<Message> {
        let mut messages = self.store.get_messages(session_id).await?;
        let sort_order = next_message_sort_order(&messages);
        let message = Message::new(id, session_id, role, sort_order);
        messages.push(message.clone());
        self.store.set_messages(session_id, messages).await?;

        debug!(session_id, message_id = id, sort_order, "appended message");
        self.bus
            .publish(Event::MessageCreated {
                session_id: session_id.to_string(),
                message: message.clone(),
            })
            .await;
        Ok(message)
    }

    /// Appends a part to `message_id`, assigning it the next dense
    /// `sortOrder` within that message, and emits `part.created`.
    pub async fn append_part(
        &self,
        session_id: &str,
        message_id: &str,
        part_id: &str,
        kind: PartKind,
    ) -> Result<Part> {
        let mut messages = self.store.get_messages(session_id).await?;
        let message = find_message_mut(&mut messages, message_id)?;

        let sort_order = next_part_sort_order(&message.parts);
        let part = Part::new(part_id, message_id, session_id, sort_order, kind);
        message.parts.push(part.clone());
        self.store.set_messages(session_id, messages).await?;

        debug!(session_id, message_id, part_id, sort_order, "appended part");
        self.bus
            .publish(Event::PartCreated {
                session_id: session_id.to_string(),
                message_id: message_id.to_string(),
                part: part.clone(),
            })
            .await;
        Ok(part)
    }

    /// Merges `patch` into the part's kind-specific fields in place. Used for
    /// streaming text accumulation and tool-call status transitions. Emits
    /// `part.updated`.
    pub async fn update_part(
        &self,
        session_id: &str,
        message_id: &str,
        part_id: &str,
        patch: PartPatch,
    ) -> Result<Part> {
        let mut messages = self.store.get_messages(session_id).await?;
        let message = find_message_mut(&mut messages, message_id)?;
        let part = message
            .parts
            .iter_mut()
            .find(|p| p.id == part_id)
            .ok_or_else(|| Error::not_found("Part", part_id.to_string()))?;

        patch.apply(&mut part.kind)?;
        let updated = part.clone();
        self.store.set_messages(session_id, messages).await?;

        debug!(session_id, message_id, part_id, "updated part");
        self.bus
            .publish(Event::PartUpdated {
                session_id: session_id.to_string(),
                message_id: message_id.to_string(),
                part: updated.clone(),
            })
            .await;
        Ok(updated)
    }

    /// Marks a message complete: sets `timeCompleted = now` and records the
    /// provider metadata, if any. Emits `message.completed`.
    pub async fn complete_message(
        &self,
        session_id: &str,
        message_id: &str,
        provider_metadata: Option<serde_json::Value>,
    ) -> Result<Message> {
        let mut messages = self.store.get_messages(session_id).await?;
        let message = find_message_mut(&mut messages, message_id)?;

        message.time_completed = Some(chrono::Utc::now());
        if provider_metadata.is_some() {
            message.provider_metadata = provider_metadata;
        }
        let completed = message.clone();
        self.store.set_messages(session_id, messages).await?;

        debug!(session_id, message_id, "completed message");
        self.bus
            .publish(Event::MessageCompleted {
                session_id: session_id.to_string(),
                message_id: message_id.to_string(),
            })
            .await;
        Ok(completed)
    }
}

fn next_message_sort_order(messages: &[Message]) -> i64 {
    messages.iter().map(|m| m.sort_order).max().map_or(0, |m| m + 1)
}

fn next_part_sort_order(parts: &[Part]) -> i64 {
    parts.iter().map(|p| p.sort_order).max().map_or(0, |m| m + 1)
}

fn find_message_mut<'a>(messages: &'a mut [Message], message_id: &str) -> Result<&'a mut Message> {
    messages
        .iter_mut()
        .find(|m| m.id == message_id)
        .ok_or_else(|| Error::not_found("Message", message_id.to_string()))
}

#[cfg(test)]
#[path = "lib.test.rs"]
mod tests;
