mod actions;
mod auth_events;
mod backend;
mod core;
mod error;
mod logging;
mod platform;
mod state;
mod updates;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;

use flume::{Receiver, Sender};

use crate::updates::{CoreMsg, InternalEvent};

pub use actions::AppAction;
pub use auth_events::{AuthEventHub, AuthListenerGuard};
pub use backend::*;
pub use core::{
    APP_INIT_TIMEOUT, DISPLAY_DURATION, SESSION_FETCH_ATTEMPTS, SESSION_FETCH_TIMEOUT,
    SESSION_REFRESH_THRESHOLD,
};
pub use error::*;
pub use platform::{PlatformBackend, PlatformBridge};
pub use state::*;
pub use updates::*;

uniffi::setup_scaffolding!();

#[uniffi::export(callback_interface)]
pub trait AppReconciler: Send + Sync + 'static {
    fn reconcile(&self, update: AppUpdate);
}

#[derive(uniffi::Object)]
pub struct FfiApp {
    core_tx: Sender<CoreMsg>,
    update_rx: Receiver<AppUpdate>,
    listening: AtomicBool,
    shared_state: Arc<RwLock<AppState>>,
    auth_events: AuthEventHub,
}

#[uniffi::export]
impl FfiApp {
    #[uniffi::constructor]
    pub fn new(data_dir: String, backend: Box<dyn PlatformBackend>) -> Arc<Self> {
        logging::init_logging(&data_dir);
        tracing::info!(data_dir = %data_dir, "FfiApp::new() starting");
        let bridge = PlatformBridge::new(Arc::from(backend));
        Self::with_backends(data_dir, bridge.into_backends())
    }

    pub fn state(&self) -> AppState {
        match self.shared_state.read() {
            Ok(g) => g.clone(),
            Err(poison) => poison.into_inner().clone(),
        }
    }

    pub fn dispatch(&self, action: AppAction) {
        // Contract: never block caller.
        let _ = self.core_tx.send(CoreMsg::Action(action));
    }

    pub fn listen_for_updates(&self, reconciler: Box<dyn AppReconciler>) {
        if self
            .listening
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // Avoid multiple listeners that would split messages.
            return;
        }

        let rx = self.update_rx.clone();
        thread::spawn(move || {
            while let Ok(update) = rx.recv() {
                reconciler.reconcile(update);
            }
        });
    }

    /// Entry point for the backend auth client's state-change callback.
    pub fn emit_auth_event(&self, event: AuthEvent) {
        self.auth_events.emit(event);
    }

    pub fn deliver_realtime_event(&self, channel_id: u64, event: RealtimeEvent) {
        let _ = self.core_tx.send(CoreMsg::Internal(Box::new(
            InternalEvent::RealtimeEventReceived {
                channel: ChannelHandle(channel_id),
                event,
            },
        )));
    }

    /// The channel opened by `PlatformBackend::subscribe` errored or closed. Send
    /// `AppAction::SyncSubscription` (or `Foregrounded`) to reconnect.
    pub fn report_channel_error(&self, channel_id: u64, message: String) {
        let _ = self.core_tx.send(CoreMsg::Internal(Box::new(InternalEvent::ChannelFailed {
            channel: ChannelHandle(channel_id),
            error: BackendError::transport(message),
        })));
    }

    /// Same as `deliver_realtime_event` for raw channel payloads. Returns false (and drops
    /// the payload) if it does not parse.
    pub fn deliver_realtime_event_json(&self, channel_id: u64, json: String) -> bool {
        match serde_json::from_str::<RealtimeEvent>(&json) {
            Ok(event) => {
                self.deliver_realtime_event(channel_id, event);
                true
            }
            Err(e) => {
                tracing::debug!(channel_id, err = %e, "realtime: unparseable payload dropped");
                false
            }
        }
    }
}

impl FfiApp {
    /// Starts the app actor against arbitrary async backends. Used by `new` and by tests.
    pub fn with_backends(data_dir: String, backends: Backends) -> Arc<Self> {
        let (update_tx, update_rx) = flume::unbounded();
        let (core_tx, core_rx) = flume::unbounded::<CoreMsg>();
        let shared_state = Arc::new(RwLock::new(AppState::empty()));
        let auth_events = AuthEventHub::new();

        // Registered before the actor starts so no early auth event is lost.
        let auth_tx = core_tx.clone();
        let auth_listener = auth_events.listen(move |event| {
            let _ = auth_tx.send(CoreMsg::Internal(Box::new(
                InternalEvent::AuthEventReceived(event),
            )));
        });

        // Actor loop thread (single threaded "app actor").
        let core_tx_for_core = core_tx.clone();
        let shared_for_core = shared_state.clone();
        thread::spawn(move || {
            let _auth_listener = auth_listener;
            let mut core = crate::core::AppCore::new(
                update_tx,
                core_tx_for_core,
                data_dir,
                shared_for_core,
                backends,
            );
            core.start();
            while let Ok(msg) = core_rx.recv() {
                let shutdown = matches!(msg, CoreMsg::Shutdown);
                core.handle_message(msg);
                if shutdown {
                    break;
                }
            }
        });

        Arc::new(Self {
            core_tx,
            update_rx,
            listening: AtomicBool::new(false),
            shared_state,
            auth_events,
        })
    }

    /// The hub auth events are fanned out from. Rust hosts can register extra listeners.
    pub fn auth_events(&self) -> &AuthEventHub {
        &self.auth_events
    }
}

impl Drop for FfiApp {
    fn drop(&mut self) {
        let _ = self.core_tx.send(CoreMsg::Shutdown);
    }
}
