// Single-slot in-app notification. Last write wins; each expiry timer carries the id it
// was scheduled for and only clears that exact instance.

use std::time::Duration;

use crate::state::{now_millis, InAppNotification, NotificationCategory};

/// Chat message previews are cut to this many characters.
const MESSAGE_PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NotificationDraft {
    pub(crate) title: String,
    pub(crate) message: String,
    pub(crate) category: NotificationCategory,
    pub(crate) payload: Option<String>,
    pub(crate) sender_id: String,
}

impl NotificationDraft {
    /// `conversation_id` from the JSON payload, when the event belongs to a chat.
    pub(crate) fn conversation_id(&self) -> Option<String> {
        let payload: serde_json::Value = serde_json::from_str(self.payload.as_deref()?).ok()?;
        payload
            .get("conversation_id")?
            .as_str()
            .map(str::to_owned)
    }
}

/// Returned by `show`; the actor turns it into a timer that calls `expire(id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExpiryTicket {
    pub(crate) id: String,
    pub(crate) after: Duration,
}

#[derive(Debug)]
pub(crate) struct InAppNotificationQueue {
    active: Option<InAppNotification>,
    display_duration: Duration,
}

impl InAppNotificationQueue {
    pub(crate) fn new(display_duration: Duration) -> Self {
        Self {
            active: None,
            display_duration,
        }
    }

    pub(crate) fn active(&self) -> Option<&InAppNotification> {
        self.active.as_ref()
    }

    pub(crate) fn show(&mut self, draft: NotificationDraft) -> ExpiryTicket {
        let notification = InAppNotification {
            id: uuid::Uuid::new_v4().to_string(),
            title: draft.title,
            message: match draft.category {
                NotificationCategory::Message => preview(draft.message),
                _ => draft.message,
            },
            category: draft.category,
            payload: draft.payload,
            sender_id: draft.sender_id,
            created_at_ms: now_millis(),
        };
        if let Some(prev) = self.active.as_ref() {
            tracing::debug!(superseded = %prev.id, by = %notification.id, "in-app: superseded");
        }
        let ticket = ExpiryTicket {
            id: notification.id.clone(),
            after: self.display_duration,
        };
        self.active = Some(notification);
        ticket
    }

    /// Clears the slot only if `id` is still the active notification.
    pub(crate) fn expire(&mut self, id: &str) -> bool {
        match self.active.as_ref() {
            Some(current) if current.id == id => {
                self.active = None;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn dismiss(&mut self) -> bool {
        self.active.take().is_some()
    }
}

fn preview(message: String) -> String {
    if message.chars().count() <= MESSAGE_PREVIEW_CHARS {
        return message;
    }
    let mut cut: String = message.chars().take(MESSAGE_PREVIEW_CHARS).collect();
    cut.push_str("...");
    cut
}
