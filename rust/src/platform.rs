use std::sync::Arc;

use async_trait::async_trait;

use crate::backend::{
    BlockListApi, Backends, ChannelHandle, FavoritesApi, RealtimeApi, RealtimeSink, SessionApi,
};
use crate::error::BackendError;
use crate::state::{BlockRelationships, Session, UserProfile};

/// Managed-backend calls implemented by the mobile app on top of its SDK. All methods
/// block the calling thread; Rust always invokes them from a blocking pool.
///
/// Realtime events for a channel opened by `subscribe` come back through
/// `FfiApp::deliver_realtime_event` with the same `channel_id`; a later channel error or
/// close goes to `FfiApp::report_channel_error`.
#[uniffi::export(callback_interface)]
pub trait PlatformBackend: Send + Sync + 'static {
    fn fetch_session(&self) -> Result<Option<Session>, BackendError>;
    fn fetch_profile(&self, user_id: String) -> Result<Option<UserProfile>, BackendError>;

    fn subscribe(&self, user_id: String, channel_id: u64) -> Result<(), BackendError>;
    fn unsubscribe(&self, channel_id: u64);

    fn fetch_block_relationships(
        &self,
        user_id: String,
    ) -> Result<BlockRelationships, BackendError>;
    fn block_user(&self, user_id: String, target_id: String) -> Result<(), BackendError>;
    fn unblock_user(&self, user_id: String, target_id: String) -> Result<(), BackendError>;

    fn fetch_favorites(&self, user_id: String) -> Result<Vec<String>, BackendError>;
    fn set_favorite(
        &self,
        user_id: String,
        listing_id: String,
        favorited: bool,
    ) -> Result<(), BackendError>;
}

/// Adapts the blocking `PlatformBackend` to the async seams. Each call runs on tokio's
/// blocking pool so a timed-out caller can move on while the platform call finishes
/// (its result is then dropped).
#[derive(Clone)]
pub struct PlatformBridge {
    platform: Arc<dyn PlatformBackend>,
}

impl std::fmt::Debug for PlatformBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformBridge").finish_non_exhaustive()
    }
}

impl PlatformBridge {
    pub fn new(platform: Arc<dyn PlatformBackend>) -> Self {
        Self { platform }
    }

    pub fn into_backends(self) -> Backends {
        let bridge = Arc::new(self);
        Backends {
            session: bridge.clone(),
            realtime: bridge.clone(),
            block_list: bridge.clone(),
            favorites: bridge,
        }
    }

    async fn call<T, F>(&self, what: &'static str, f: F) -> Result<T, BackendError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn PlatformBackend) -> Result<T, BackendError> + Send + 'static,
    {
        let platform = self.platform.clone();
        match tokio::task::spawn_blocking(move || f(platform.as_ref())).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(call = what, err = %e, "platform: callback panicked");
                Err(BackendError::transport(format!("{what}: platform callback failed")))
            }
        }
    }
}

#[async_trait]
impl SessionApi for PlatformBridge {
    async fn fetch_session(&self) -> Result<Option<Session>, BackendError> {
        self.call("fetch_session", |p| p.fetch_session()).await
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<Option<UserProfile>, BackendError> {
        let user_id = user_id.to_string();
        self.call("fetch_profile", move |p| p.fetch_profile(user_id))
            .await
    }
}

#[async_trait]
impl RealtimeApi for PlatformBridge {
    async fn subscribe(
        &self,
        user_id: &str,
        channel: ChannelHandle,
        _sink: RealtimeSink,
    ) -> Result<(), BackendError> {
        // Deliveries and channel errors come back through FfiApp keyed by channel id.
        let user_id = user_id.to_string();
        self.call("subscribe", move |p| p.subscribe(user_id, channel.0))
            .await
    }

    async fn unsubscribe(&self, channel: ChannelHandle) {
        let _ = self
            .call("unsubscribe", move |p| {
                p.unsubscribe(channel.0);
                Ok(())
            })
            .await;
    }
}

#[async_trait]
impl BlockListApi for PlatformBridge {
    async fn fetch_block_relationships(
        &self,
        user_id: &str,
    ) -> Result<BlockRelationships, BackendError> {
        let user_id = user_id.to_string();
        self.call("fetch_block_relationships", move |p| {
            p.fetch_block_relationships(user_id)
        })
        .await
    }

    async fn block_user(&self, user_id: &str, target_id: &str) -> Result<(), BackendError> {
        let (user_id, target_id) = (user_id.to_string(), target_id.to_string());
        self.call("block_user", move |p| p.block_user(user_id, target_id))
            .await
    }

    async fn unblock_user(&self, user_id: &str, target_id: &str) -> Result<(), BackendError> {
        let (user_id, target_id) = (user_id.to_string(), target_id.to_string());
        self.call("unblock_user", move |p| p.unblock_user(user_id, target_id))
            .await
    }
}

#[async_trait]
impl FavoritesApi for PlatformBridge {
    async fn fetch_favorites(&self, user_id: &str) -> Result<Vec<String>, BackendError> {
        let user_id = user_id.to_string();
        self.call("fetch_favorites", move |p| p.fetch_favorites(user_id))
            .await
    }

    async fn set_favorite(
        &self,
        user_id: &str,
        listing_id: &str,
        favorited: bool,
    ) -> Result<(), BackendError> {
        let (user_id, listing_id) = (user_id.to_string(), listing_id.to_string());
        self.call("set_favorite", move |p| {
            p.set_favorite(user_id, listing_id, favorited)
        })
        .await
    }
}
