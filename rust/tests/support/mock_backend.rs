#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use market_core::{
    BackendError, Backends, BlockListApi, BlockRelationships, ChannelHandle, FavoritesApi,
    RealtimeApi, RealtimeSink, Session, SessionApi, UserProfile,
};

pub fn session(user_id: &str) -> Session {
    Session {
        user_id: user_id.to_string(),
        access_token: format!("token-{user_id}"),
        expires_at: None,
    }
}

/// In-memory stand-in for the managed backend. Every knob is shared so tests can flip
/// behavior while the app is running.
#[derive(Default)]
pub struct MockBackend {
    pub session: Mutex<Option<Session>>,
    pub session_failures: AtomicU32,
    pub session_calls: AtomicU32,

    pub subscribe_fails: AtomicBool,
    pub subscribes: Mutex<Vec<(String, ChannelHandle)>>,
    pub unsubscribes: Mutex<Vec<ChannelHandle>>,
    pub sinks: Mutex<Vec<RealtimeSink>>,

    pub blocked_by_me: Mutex<Vec<String>>,
    pub blocking_me: Mutex<Vec<String>>,
    pub block_write_fails: AtomicBool,

    pub favorites: Mutex<Vec<String>>,
    pub favorite_write_fails: AtomicBool,
}

impl MockBackend {
    pub fn signed_in(user_id: &str) -> Arc<Self> {
        let mock = Self::default();
        *mock.session.lock().unwrap() = Some(session(user_id));
        Arc::new(mock)
    }

    pub fn backends(self: &Arc<Self>) -> Backends {
        Backends {
            session: self.clone(),
            realtime: self.clone(),
            block_list: self.clone(),
            favorites: self.clone(),
        }
    }

    pub fn latest_sink(&self) -> RealtimeSink {
        self.sinks
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no subscription yet")
    }

    pub fn subscribe_count(&self) -> usize {
        self.subscribes.lock().unwrap().len()
    }
}

#[async_trait]
impl SessionApi for MockBackend {
    async fn fetch_session(&self) -> Result<Option<Session>, BackendError> {
        self.session_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .session_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(BackendError::transport("connection reset"));
        }
        Ok(self.session.lock().unwrap().clone())
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<Option<UserProfile>, BackendError> {
        Ok(Some(UserProfile {
            user_id: user_id.to_string(),
            display_name: Some(format!("Seller {user_id}")),
        }))
    }
}

#[async_trait]
impl RealtimeApi for MockBackend {
    async fn subscribe(
        &self,
        user_id: &str,
        channel: ChannelHandle,
        sink: RealtimeSink,
    ) -> Result<(), BackendError> {
        self.subscribes
            .lock()
            .unwrap()
            .push((user_id.to_string(), channel));
        if self.subscribe_fails.load(Ordering::SeqCst) {
            return Err(BackendError::transport("CHANNEL_ERROR"));
        }
        self.sinks.lock().unwrap().push(sink);
        Ok(())
    }

    async fn unsubscribe(&self, channel: ChannelHandle) {
        self.unsubscribes.lock().unwrap().push(channel);
    }
}

#[async_trait]
impl BlockListApi for MockBackend {
    async fn fetch_block_relationships(
        &self,
        _user_id: &str,
    ) -> Result<BlockRelationships, BackendError> {
        Ok(BlockRelationships {
            blocked_by_me: self.blocked_by_me.lock().unwrap().clone(),
            blocking_me: self.blocking_me.lock().unwrap().clone(),
        })
    }

    async fn block_user(&self, _user_id: &str, target_id: &str) -> Result<(), BackendError> {
        if self.block_write_fails.load(Ordering::SeqCst) {
            return Err(BackendError::Rejected {
                message: "permission denied".into(),
            });
        }
        self.blocked_by_me.lock().unwrap().push(target_id.to_string());
        Ok(())
    }

    async fn unblock_user(&self, _user_id: &str, target_id: &str) -> Result<(), BackendError> {
        if self.block_write_fails.load(Ordering::SeqCst) {
            return Err(BackendError::Rejected {
                message: "permission denied".into(),
            });
        }
        self.blocked_by_me.lock().unwrap().retain(|id| id != target_id);
        Ok(())
    }
}

#[async_trait]
impl FavoritesApi for MockBackend {
    async fn fetch_favorites(&self, _user_id: &str) -> Result<Vec<String>, BackendError> {
        Ok(self.favorites.lock().unwrap().clone())
    }

    async fn set_favorite(
        &self,
        _user_id: &str,
        listing_id: &str,
        favorited: bool,
    ) -> Result<(), BackendError> {
        if self.favorite_write_fails.load(Ordering::SeqCst) {
            return Err(BackendError::transport("offline"));
        }
        let mut favs = self.favorites.lock().unwrap();
        favs.retain(|id| id != listing_id);
        if favorited {
            favs.push(listing_id.to_string());
        }
        Ok(())
    }
}
