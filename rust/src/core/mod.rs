mod block_list;
mod config;
mod favorites;
mod in_app;
mod session;
mod subscription;

use std::sync::{Arc, RwLock};
use std::time::Duration;

use flume::Sender;

use crate::actions::AppAction;
use crate::backend::{Backends, ChannelHandle, RealtimeSink};
use crate::error::{BackendError, SubscriptionError};
use crate::state::{now_seconds, AppState, BlockRelationships, FavoritesState};
use crate::updates::{AppUpdate, CoreMsg, InternalEvent};

use block_list::BlockListCache;
use config::Timings;
use favorites::FavoritesCounter;
use in_app::{InAppNotificationQueue, NotificationDraft};
use session::{IdentityChange, SessionMachine};
use subscription::{EstablishOutcome, EventVerdict, SubscriptionManager, SyncPlan};

pub use config::{
    APP_INIT_TIMEOUT, DISPLAY_DURATION, SESSION_FETCH_ATTEMPTS, SESSION_FETCH_TIMEOUT,
    SESSION_REFRESH_THRESHOLD,
};
pub(crate) use session::FetchReport;

/// Upper bound on the final unsubscribe when the app shuts down.
const SHUTDOWN_TEARDOWN_TIMEOUT: Duration = Duration::from_secs(2);

pub(crate) struct AppCore {
    state: AppState,
    rev: u64,
    toast: Option<String>,
    foreground: bool,
    /// Conversation the user currently has open; its messages are not surfaced in-app.
    active_conversation: Option<String>,

    update_sender: Sender<AppUpdate>,
    core_sender: Sender<CoreMsg>,
    shared_state: Arc<RwLock<AppState>>,

    config: config::AppConfig,
    timings: Timings,
    runtime: tokio::runtime::Runtime,
    backends: Backends,

    session: SessionMachine,
    subscriptions: SubscriptionManager,
    notifications: InAppNotificationQueue,
    block_list: BlockListCache,
    favorites: FavoritesCounter,
}

impl AppCore {
    pub(crate) fn new(
        update_sender: Sender<AppUpdate>,
        core_sender: Sender<CoreMsg>,
        data_dir: String,
        shared_state: Arc<RwLock<AppState>>,
        backends: Backends,
    ) -> Self {
        let config = config::load_app_config(&data_dir);
        let timings = config.timings();
        tracing::debug!(?timings, "config loaded");

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_time()
            .build()
            .expect("tokio runtime");

        let this = Self {
            state: AppState::empty(),
            rev: 0,
            toast: None,
            foreground: true,
            active_conversation: None,
            update_sender,
            core_sender,
            shared_state,
            config,
            timings,
            runtime,
            backends,
            session: SessionMachine::new(),
            subscriptions: SubscriptionManager::new(),
            notifications: InAppNotificationQueue::new(timings.display_duration),
            block_list: BlockListCache::new(),
            favorites: FavoritesCounter::new(),
        };

        // Ensure FfiApp.state() has an immediately-available snapshot.
        let snapshot = this.state.clone();
        this.commit_state_snapshot(&snapshot);
        this
    }

    /// Runs once on the actor thread before the first message.
    pub(crate) fn start(&mut self) {
        if self.config.fetch_session_on_start() {
            self.fetch_session();
        }
    }

    fn next_rev(&mut self) -> u64 {
        self.rev += 1;
        self.state.rev = self.rev;
        self.rev
    }

    fn commit_state_snapshot(&self, snapshot: &AppState) {
        match self.shared_state.write() {
            Ok(mut g) => *g = snapshot.clone(),
            Err(poison) => *poison.into_inner() = snapshot.clone(),
        }
    }

    /// Rebuilds the snapshot from the components. They are the only source of truth.
    fn project_state(&mut self) {
        self.state.auth = self.session.state().clone();
        self.state.profile = self.session.profile().cloned();
        self.state.session_fetch_attempts = self.session.attempt_count();
        self.state.session_expiring_soon = self
            .session
            .session()
            .is_some_and(|s| s.expires_within(now_seconds(), SESSION_REFRESH_THRESHOLD));
        self.state.subscription = self.subscriptions.status().clone();
        self.state.active_notification = self.notifications.active().cloned();
        self.state.blocked_user_ids = self.block_list.blocked_ids_sorted();
        self.state.favorites = FavoritesState {
            count: self.favorites.count(),
            listing_ids: self.favorites.listing_ids(),
            listing_counts: self.favorites.listing_counts().clone(),
        };
        self.state.toast = self.toast.clone();
    }

    fn emit_state(&mut self) {
        self.project_state();
        self.next_rev();
        let snapshot = self.state.clone();
        self.commit_state_snapshot(&snapshot);
        let _ = self.update_sender.send(AppUpdate::FullState(snapshot));
    }

    fn emit_subscription_failed(&mut self, user_id: String, message: String) {
        self.emit_state();
        let rev = self.next_rev();
        // Keep snapshot rev in sync with the update stream even though this is a side-effect update.
        let snapshot = self.state.clone();
        self.commit_state_snapshot(&snapshot);
        let _ = self.update_sender.send(AppUpdate::SubscriptionFailed {
            rev,
            user_id,
            message,
        });
    }

    fn toast(&mut self, msg: impl Into<String>) {
        // Stays until the UI clears it, so a rev-gap resync still shows it.
        self.toast = Some(msg.into());
        self.emit_state();
    }

    pub(crate) fn handle_message(&mut self, msg: CoreMsg) {
        match msg {
            CoreMsg::Action(action) => {
                tracing::info!(action = action.tag(), "dispatch");
                self.handle_action(action);
            }
            CoreMsg::Internal(internal) => self.handle_internal(*internal),
            CoreMsg::Shutdown => self.shutdown(),
        }
    }

    fn handle_action(&mut self, action: AppAction) {
        match action {
            // Session
            AppAction::FetchSession => self.fetch_session(),

            // Realtime
            AppAction::SyncSubscription => self.sync_subscription(),

            // In-app notifications
            AppAction::DismissNotification => {
                if self.notifications.dismiss() {
                    self.emit_state();
                }
            }
            AppAction::SetActiveConversation { conversation_id } => {
                self.active_conversation = conversation_id;
            }

            // Block list
            AppAction::BlockUser { user_id } => self.block_user(user_id),
            AppAction::UnblockUser { user_id } => self.unblock_user(user_id),

            // Favorites
            AppAction::ToggleFavorite { listing_id } => {
                let Some(me) = self.current_user() else {
                    self.toast("Sign in to save favorites");
                    return;
                };
                let favorited = self.favorites.toggle(&listing_id);
                self.write_favorite(me, listing_id, favorited);
            }
            AppAction::SetFavorite {
                listing_id,
                favorited,
            } => {
                let Some(me) = self.current_user() else {
                    self.toast("Sign in to save favorites");
                    return;
                };
                if self.favorites.set(&listing_id, favorited) {
                    self.write_favorite(me, listing_id, favorited);
                }
            }
            AppAction::RefreshFavorites => {
                if let Some(me) = self.current_user() {
                    self.fetch_favorites(me);
                }
            }
            AppAction::SetListingFavoriteCount { listing_id, count } => {
                self.favorites.set_listing_count(&listing_id, count);
                self.emit_state();
            }

            // UI
            AppAction::ClearToast => {
                if self.toast.take().is_some() {
                    self.emit_state();
                }
            }

            // Lifecycle
            AppAction::Backgrounded => {
                self.foreground = false;
            }
            AppAction::Foregrounded => {
                self.foreground = true;
                self.sync_subscription();
                // Expiry proximity is time-based; refresh it.
                self.emit_state();
            }
        }
    }

    fn handle_internal(&mut self, internal: InternalEvent) {
        match internal {
            InternalEvent::AuthEventReceived(event) => {
                tracing::info!(event = event.tag(), "auth event");
                if let Some(change) = self.session.apply_auth_event(event) {
                    self.on_identity_changed(change);
                }
                self.emit_state();
            }
            InternalEvent::SessionFetchFinished { token, report } => {
                if let Some(change) = self.session.finish_fetch(token, report) {
                    self.on_identity_changed(change);
                }
                self.emit_state();
            }
            InternalEvent::SubscriptionEstablished {
                channel,
                user_id,
                result,
            } => match self.subscriptions.on_established(channel, &user_id, result) {
                EstablishOutcome::Active => self.emit_state(),
                EstablishOutcome::Failed(err) => {
                    self.emit_subscription_failed(user_id, err.to_string());
                }
                EstablishOutcome::Stale { cleanup: true } => self.spawn_unsubscribe(channel),
                EstablishOutcome::Stale { cleanup: false } => {}
            },
            InternalEvent::RealtimeEventReceived { channel, event } => {
                let verdict = self.subscriptions.filter(
                    channel,
                    event,
                    self.session.user_id(),
                    &self.block_list,
                );
                match verdict {
                    EventVerdict::Accept(draft) => self.show_notification(draft),
                    EventVerdict::Drop(reason) => {
                        tracing::trace!(%channel, ?reason, "realtime: event dropped");
                    }
                }
            }
            InternalEvent::ChannelFailed { channel, error } => {
                if let Some(err) = self.subscriptions.on_channel_error(channel, error) {
                    self.spawn_unsubscribe(channel);
                    let SubscriptionError::Transport { user_id, .. } = &err;
                    let user_id = user_id.clone();
                    self.emit_subscription_failed(user_id, err.to_string());
                }
            }
            InternalEvent::NotificationExpired { id } => {
                if self.notifications.expire(&id) {
                    self.emit_state();
                }
            }
            InternalEvent::BlockListFetched { user_id, result } => {
                if !self.is_current_user(&user_id) {
                    return;
                }
                match result {
                    Ok(BlockRelationships {
                        blocked_by_me,
                        blocking_me,
                    }) => {
                        self.block_list.set_blocked(blocked_by_me);
                        self.block_list.set_blocking_me(blocking_me);
                        tracing::debug!(
                            blocked = self.block_list.blocked_by_me().len(),
                            blocking_me = self.block_list.blocking_me().len(),
                            "block list: loaded"
                        );
                        self.emit_state();
                    }
                    Err(e) => tracing::warn!(%user_id, err = %e, "block list: fetch failed"),
                }
            }
            InternalEvent::BlockWriteFailed {
                user_id,
                target_id,
                error,
            } => {
                if !self.is_current_user(&user_id) {
                    return;
                }
                tracing::warn!(%target_id, err = %error, "block list: write failed");
                self.toast(format!("Could not update block list: {error}"));
                self.fetch_block_list(user_id);
            }
            InternalEvent::FavoritesFetched { user_id, result } => {
                if !self.is_current_user(&user_id) {
                    return;
                }
                match result {
                    Ok(listing_ids) => {
                        self.favorites.replace(listing_ids);
                        self.emit_state();
                    }
                    Err(e) => tracing::warn!(%user_id, err = %e, "favorites: fetch failed"),
                }
            }
            InternalEvent::FavoriteWriteFailed {
                user_id,
                listing_id,
                favorited,
                error,
            } => {
                if !self.is_current_user(&user_id) {
                    return;
                }
                tracing::warn!(%listing_id, err = %error, "favorites: write failed");
                // Refetch only restores the flags; the public counter is rolled back here.
                if favorited {
                    self.favorites.decrement_listing_count(&listing_id);
                } else {
                    self.favorites.increment_listing_count(&listing_id);
                }
                self.toast(format!("Could not update favorites: {error}"));
                self.fetch_favorites(user_id);
            }
        }
    }

    fn current_user(&self) -> Option<String> {
        self.session.user_id().map(str::to_owned)
    }

    fn is_current_user(&self, user_id: &str) -> bool {
        let current = self.session.user_id();
        if current != Some(user_id) {
            tracing::debug!(%user_id, ?current, "discarding result for previous identity");
            return false;
        }
        true
    }

    // Session

    fn fetch_session(&mut self) {
        let token = match self.session.begin_fetch() {
            Ok(token) => token,
            Err(e) => {
                tracing::info!(err = %e, "session: fetch request ignored");
                return;
            }
        };
        self.emit_state();

        let api = self.backends.session.clone();
        let timings = self.timings;
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            let report = session::fetch_session_with_retry(api, timings).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(
                InternalEvent::SessionFetchFinished { token, report },
            )));
        });
    }

    fn on_identity_changed(&mut self, change: IdentityChange) {
        tracing::info!(previous = ?change.previous, current = ?change.current, "identity changed");
        self.block_list.reset();
        self.favorites.reset();
        self.notifications.dismiss();
        self.sync_subscription();
        if let Some(user_id) = change.current {
            self.fetch_block_list(user_id.clone());
            self.fetch_favorites(user_id);
        }
    }

    // Realtime

    fn sync_subscription(&mut self) {
        match self.subscriptions.sync(self.session.user_id()) {
            SyncPlan::Noop => {}
            SyncPlan::Teardown { channel } => {
                self.spawn_unsubscribe(channel);
                self.emit_state();
            }
            SyncPlan::Establish {
                teardown,
                user_id,
                channel,
            } => {
                let realtime = self.backends.realtime.clone();
                let sink = RealtimeSink::new(channel, self.core_sender.clone());
                let tx = self.core_sender.clone();
                self.runtime.spawn(async move {
                    if let Some(old) = teardown {
                        realtime.unsubscribe(old).await;
                    }
                    let result = realtime.subscribe(&user_id, channel, sink).await;
                    let _ = tx.send(CoreMsg::Internal(Box::new(
                        InternalEvent::SubscriptionEstablished {
                            channel,
                            user_id,
                            result,
                        },
                    )));
                });
                self.emit_state();
            }
        }
    }

    fn spawn_unsubscribe(&self, channel: ChannelHandle) {
        let realtime = self.backends.realtime.clone();
        self.runtime.spawn(async move {
            realtime.unsubscribe(channel).await;
            tracing::debug!(%channel, "realtime: unsubscribed");
        });
    }

    // In-app notifications

    fn show_notification(&mut self, draft: NotificationDraft) {
        if !self.foreground {
            tracing::trace!(sender = %draft.sender_id, "in-app: suppressed while backgrounded");
            return;
        }
        if let Some(open) = self.active_conversation.as_deref() {
            if draft.conversation_id().as_deref() == Some(open) {
                tracing::trace!(conversation = %open, "in-app: conversation already open");
                return;
            }
        }
        let ticket = self.notifications.show(draft);
        self.emit_state();

        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            tokio::time::sleep(ticket.after).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(
                InternalEvent::NotificationExpired { id: ticket.id },
            )));
        });
    }

    // Block list

    fn fetch_block_list(&self, user_id: String) {
        let api = self.backends.block_list.clone();
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            let result = api.fetch_block_relationships(&user_id).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::BlockListFetched {
                user_id,
                result,
            })));
        });
    }

    fn block_user(&mut self, target_id: String) {
        let Some(me) = self.current_user() else {
            self.toast("Sign in to block users");
            return;
        };
        if me == target_id {
            self.toast("You cannot block yourself");
            return;
        }
        let before = self.block_list.blocked_by_me().clone();
        if Arc::ptr_eq(&before, &self.block_list.add_blocked(&target_id)) {
            tracing::debug!(%target_id, "block list: already blocked");
            return;
        }
        self.emit_state();

        let api = self.backends.block_list.clone();
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            if let Err(error) = api.block_user(&me, &target_id).await {
                let _ = tx.send(block_write_failed(me, target_id, error));
            }
        });
    }

    fn unblock_user(&mut self, target_id: String) {
        let Some(me) = self.current_user() else {
            self.toast("Sign in to manage blocked users");
            return;
        };
        let before = self.block_list.blocked_by_me().clone();
        if Arc::ptr_eq(&before, &self.block_list.remove_blocked(&target_id)) {
            tracing::debug!(%target_id, "block list: not blocked");
            return;
        }
        self.emit_state();

        let api = self.backends.block_list.clone();
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            if let Err(error) = api.unblock_user(&me, &target_id).await {
                let _ = tx.send(block_write_failed(me, target_id, error));
            }
        });
    }

    // Favorites

    fn fetch_favorites(&self, user_id: String) {
        let api = self.backends.favorites.clone();
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            let result = api.fetch_favorites(&user_id).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::FavoritesFetched {
                user_id,
                result,
            })));
        });
    }

    fn write_favorite(&mut self, me: String, listing_id: String, favorited: bool) {
        if favorited {
            self.favorites.increment_listing_count(&listing_id);
        } else {
            self.favorites.decrement_listing_count(&listing_id);
        }
        self.emit_state();

        let api = self.backends.favorites.clone();
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            if let Err(error) = api.set_favorite(&me, &listing_id, favorited).await {
                let _ = tx.send(CoreMsg::Internal(Box::new(
                    InternalEvent::FavoriteWriteFailed {
                        user_id: me,
                        listing_id,
                        favorited,
                        error,
                    },
                )));
            }
        });
    }

    // Lifecycle

    fn shutdown(&mut self) {
        tracing::info!("shutting down");
        if let SyncPlan::Teardown { channel } = self.subscriptions.sync(None) {
            let realtime = self.backends.realtime.clone();
            let done = self.runtime.block_on(async move {
                tokio::time::timeout(SHUTDOWN_TEARDOWN_TIMEOUT, realtime.unsubscribe(channel)).await
            });
            if done.is_err() {
                tracing::warn!(%channel, "realtime: unsubscribe timed out during shutdown");
            }
        }
    }
}

fn block_write_failed(user_id: String, target_id: String, error: BackendError) -> CoreMsg {
    CoreMsg::Internal(Box::new(InternalEvent::BlockWriteFailed {
        user_id,
        target_id,
        error,
    }))
}
