use crate::backend::ChannelHandle;
use crate::core::FetchReport;
use crate::error::BackendError;
use crate::state::{AppState, AuthEvent, BlockRelationships, RealtimeEvent};
use crate::AppAction;

#[derive(uniffi::Enum, Clone, Debug)]
pub enum AppUpdate {
    FullState(AppState),
    /// Side-effect signal: the realtime channel could not be established or dropped after
    /// connecting. The state snapshot also carries `SubscriptionStatus::Failed`.
    SubscriptionFailed {
        rev: u64,
        user_id: String,
        message: String,
    },
}

impl AppUpdate {
    pub fn rev(&self) -> u64 {
        match self {
            AppUpdate::FullState(s) => s.rev,
            AppUpdate::SubscriptionFailed { rev, .. } => *rev,
        }
    }
}

#[derive(Debug)]
pub(crate) enum CoreMsg {
    Action(AppAction),
    Internal(Box<InternalEvent>),
    Shutdown,
}

#[derive(Debug)]
pub(crate) enum InternalEvent {
    // Auth client
    AuthEventReceived(AuthEvent),

    // Session bootstrap
    SessionFetchFinished {
        token: u64,
        report: FetchReport,
    },

    // Realtime channel
    SubscriptionEstablished {
        channel: ChannelHandle,
        user_id: String,
        result: Result<(), BackendError>,
    },
    RealtimeEventReceived {
        channel: ChannelHandle,
        event: RealtimeEvent,
    },
    ChannelFailed {
        channel: ChannelHandle,
        error: BackendError,
    },

    // In-app notification timer
    NotificationExpired {
        id: String,
    },

    // Block list
    BlockListFetched {
        user_id: String,
        result: Result<BlockRelationships, BackendError>,
    },
    BlockWriteFailed {
        user_id: String,
        target_id: String,
        error: BackendError,
    },

    // Favorites
    FavoritesFetched {
        user_id: String,
        result: Result<Vec<String>, BackendError>,
    },
    FavoriteWriteFailed {
        user_id: String,
        listing_id: String,
        favorited: bool,
        error: BackendError,
    },
}
