// Realtime subscription bookkeeping: one channel per authenticated identity, plus the
// filter every inbound event goes through before it may become an in-app notification.

use super::block_list::BlockListCache;
use super::in_app::NotificationDraft;
use crate::backend::ChannelHandle;
use crate::error::{BackendError, SubscriptionError};
use crate::state::{RealtimeEvent, SubscriptionStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Subscription {
    pub(crate) bound_user_id: String,
    pub(crate) channel: ChannelHandle,
    /// Set once the backend confirmed the channel.
    pub(crate) active: bool,
}

/// Side effects the actor must run for one reconciliation. Teardown always precedes
/// establishment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SyncPlan {
    Noop,
    Teardown {
        channel: ChannelHandle,
    },
    Establish {
        teardown: Option<ChannelHandle>,
        user_id: String,
        channel: ChannelHandle,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EstablishOutcome {
    Active,
    Failed(SubscriptionError),
    /// Result for a channel that was already replaced. `cleanup` asks the actor to
    /// unsubscribe it since the backend opened it after we moved on.
    Stale { cleanup: bool },
}

/// Why an inbound event was filtered. Not an error: dropped events are normal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DropReason {
    StaleChannel,
    OwnEvent,
    BlockedByMe,
    BlockingMe,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EventVerdict {
    Accept(NotificationDraft),
    Drop(DropReason),
}

#[derive(Debug)]
pub(crate) struct SubscriptionManager {
    current: Option<Subscription>,
    next_channel: u64,
    status: SubscriptionStatus,
}

impl SubscriptionManager {
    pub(crate) fn new() -> Self {
        Self {
            current: None,
            next_channel: 0,
            status: SubscriptionStatus::Idle,
        }
    }

    pub(crate) fn status(&self) -> &SubscriptionStatus {
        &self.status
    }

    #[cfg(test)]
    pub(crate) fn current(&self) -> Option<&Subscription> {
        self.current.as_ref()
    }

    /// Idempotent reconciliation against the current identity.
    pub(crate) fn sync(&mut self, current_user_id: Option<&str>) -> SyncPlan {
        match (current_user_id, self.current.as_ref()) {
            (None, None) => {
                self.status = SubscriptionStatus::Idle;
                SyncPlan::Noop
            }
            (None, Some(_)) => {
                let old = self.current.take().map(|s| s.channel);
                self.status = SubscriptionStatus::Idle;
                match old {
                    Some(channel) => {
                        tracing::info!(%channel, "realtime: tearing down (signed out)");
                        SyncPlan::Teardown { channel }
                    }
                    None => SyncPlan::Noop,
                }
            }
            (Some(user_id), Some(sub)) if sub.bound_user_id == user_id => SyncPlan::Noop,
            (Some(user_id), _) => {
                let teardown = self.current.take().map(|s| s.channel);
                self.next_channel += 1;
                let channel = ChannelHandle(self.next_channel);
                tracing::info!(%user_id, %channel, replaced = ?teardown, "realtime: establishing");
                self.current = Some(Subscription {
                    bound_user_id: user_id.to_string(),
                    channel,
                    active: false,
                });
                self.status = SubscriptionStatus::Connecting {
                    user_id: user_id.to_string(),
                };
                SyncPlan::Establish {
                    teardown,
                    user_id: user_id.to_string(),
                    channel,
                }
            }
        }
    }

    pub(crate) fn on_established(
        &mut self,
        channel: ChannelHandle,
        user_id: &str,
        result: Result<(), BackendError>,
    ) -> EstablishOutcome {
        let is_current = self
            .current
            .as_ref()
            .is_some_and(|s| s.channel == channel && s.bound_user_id == user_id);
        if !is_current {
            tracing::debug!(%channel, %user_id, ok = result.is_ok(), "realtime: stale establish result");
            return EstablishOutcome::Stale {
                cleanup: result.is_ok(),
            };
        }

        match result {
            Ok(()) => {
                if let Some(sub) = self.current.as_mut() {
                    sub.active = true;
                }
                tracing::info!(%channel, %user_id, "realtime: subscribed");
                self.status = SubscriptionStatus::Active {
                    user_id: user_id.to_string(),
                };
                EstablishOutcome::Active
            }
            Err(source) => {
                // Slot is cleared so the next sync re-establishes; no automatic retry.
                self.current = None;
                let err = SubscriptionError::Transport {
                    user_id: user_id.to_string(),
                    source,
                };
                tracing::warn!(%channel, err = %err, "realtime: subscribe failed");
                self.status = SubscriptionStatus::Failed {
                    user_id: user_id.to_string(),
                    message: err.to_string(),
                };
                EstablishOutcome::Failed(err)
            }
        }
    }

    /// The backend reported that a confirmed or pending channel dropped. Clears the slot so
    /// the next `sync` re-establishes. Errors from retired channels are ignored.
    pub(crate) fn on_channel_error(
        &mut self,
        channel: ChannelHandle,
        source: BackendError,
    ) -> Option<SubscriptionError> {
        if self.current.as_ref().map(|s| s.channel) != Some(channel) {
            tracing::debug!(%channel, err = %source, "realtime: error on retired channel");
            return None;
        }
        let sub = self.current.take()?;
        let err = SubscriptionError::Transport {
            user_id: sub.bound_user_id.clone(),
            source,
        };
        tracing::warn!(%channel, was_active = sub.active, err = %err, "realtime: channel failed");
        self.status = SubscriptionStatus::Failed {
            user_id: sub.bound_user_id,
            message: err.to_string(),
        };
        Some(err)
    }

    /// Decides whether an event delivered on `channel` may be shown. Filtering is
    /// bidirectional over the block relationships.
    pub(crate) fn filter(
        &self,
        channel: ChannelHandle,
        event: RealtimeEvent,
        current_user_id: Option<&str>,
        blocks: &BlockListCache,
    ) -> EventVerdict {
        let bound = match (self.current.as_ref(), current_user_id) {
            (Some(sub), Some(me)) if sub.channel == channel && sub.bound_user_id == me => me,
            _ => return EventVerdict::Drop(DropReason::StaleChannel),
        };
        if event.sender_id == bound {
            return EventVerdict::Drop(DropReason::OwnEvent);
        }
        if blocks.is_blocked(&event.sender_id) {
            return EventVerdict::Drop(DropReason::BlockedByMe);
        }
        if blocks.is_blocked_by(&event.sender_id) {
            return EventVerdict::Drop(DropReason::BlockingMe);
        }
        EventVerdict::Accept(NotificationDraft {
            title: event.title,
            message: event.message,
            category: event.category,
            payload: event.payload,
            sender_id: event.sender_id,
        })
    }
}
