// Async seams to the managed backend. The actor only ever talks to these traits; the
// platform bridge and test mocks implement them.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use flume::Sender;

use crate::error::BackendError;
use crate::state::{BlockRelationships, RealtimeEvent, Session, UserProfile};
use crate::updates::{CoreMsg, InternalEvent};

/// Opaque id of one realtime channel. Allocated by the actor before subscribing so that
/// every delivery can be matched against the currently bound channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelHandle(pub u64);

impl fmt::Display for ChannelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch-{}", self.0)
    }
}

#[async_trait]
pub trait SessionApi: Send + Sync + 'static {
    /// `Ok(None)` means the backend has no active session for this device.
    async fn fetch_session(&self) -> Result<Option<Session>, BackendError>;

    async fn fetch_profile(&self, user_id: &str) -> Result<Option<UserProfile>, BackendError>;
}

#[async_trait]
pub trait RealtimeApi: Send + Sync + 'static {
    async fn subscribe(
        &self,
        user_id: &str,
        channel: ChannelHandle,
        sink: RealtimeSink,
    ) -> Result<(), BackendError>;

    async fn unsubscribe(&self, channel: ChannelHandle);
}

#[async_trait]
pub trait BlockListApi: Send + Sync + 'static {
    async fn fetch_block_relationships(
        &self,
        user_id: &str,
    ) -> Result<BlockRelationships, BackendError>;

    async fn block_user(&self, user_id: &str, target_id: &str) -> Result<(), BackendError>;

    async fn unblock_user(&self, user_id: &str, target_id: &str) -> Result<(), BackendError>;
}

#[async_trait]
pub trait FavoritesApi: Send + Sync + 'static {
    async fn fetch_favorites(&self, user_id: &str) -> Result<Vec<String>, BackendError>;

    async fn set_favorite(
        &self,
        user_id: &str,
        listing_id: &str,
        favorited: bool,
    ) -> Result<(), BackendError>;
}

#[derive(Clone)]
pub struct Backends {
    pub session: Arc<dyn SessionApi>,
    pub realtime: Arc<dyn RealtimeApi>,
    pub block_list: Arc<dyn BlockListApi>,
    pub favorites: Arc<dyn FavoritesApi>,
}

/// Delivery end of one realtime channel. Events are tagged with the channel they came
/// from; the actor drops anything that arrives on a channel it no longer holds.
#[derive(Clone)]
pub struct RealtimeSink {
    channel: ChannelHandle,
    core_sender: Sender<CoreMsg>,
}

impl RealtimeSink {
    pub(crate) fn new(channel: ChannelHandle, core_sender: Sender<CoreMsg>) -> Self {
        Self {
            channel,
            core_sender,
        }
    }

    pub fn channel(&self) -> ChannelHandle {
        self.channel
    }

    /// Never blocks. Returns false once the app has shut down.
    pub fn deliver(&self, event: RealtimeEvent) -> bool {
        self.core_sender
            .send(CoreMsg::Internal(Box::new(InternalEvent::RealtimeEventReceived {
                channel: self.channel,
                event,
            })))
            .is_ok()
    }

    /// Reports that the channel errored or closed. The actor marks the subscription failed
    /// and the next reconnect signal re-establishes it.
    pub fn fail(&self, error: BackendError) -> bool {
        self.core_sender
            .send(CoreMsg::Internal(Box::new(InternalEvent::ChannelFailed {
                channel: self.channel,
                error,
            })))
            .is_ok()
    }
}

impl fmt::Debug for RealtimeSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeSink")
            .field("channel", &self.channel)
            .finish()
    }
}
