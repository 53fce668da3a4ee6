#[derive(uniffi::Enum, Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    // Session
    /// Bootstrap (or retry after `AuthState::Error`) the session fetch.
    FetchSession,

    // Realtime
    /// Reconnect signal from the platform; re-runs subscription reconciliation.
    SyncSubscription,

    // In-app notifications
    DismissNotification,
    /// Chat screen the user has open, if any. Messages for it are not shown in-app.
    SetActiveConversation {
        conversation_id: Option<String>,
    },

    // Block list
    BlockUser {
        user_id: String,
    },
    UnblockUser {
        user_id: String,
    },

    // Favorites
    ToggleFavorite {
        listing_id: String,
    },
    SetFavorite {
        listing_id: String,
        favorited: bool,
    },
    RefreshFavorites,
    SetListingFavoriteCount {
        listing_id: String,
        count: u32,
    },

    // UI
    ClearToast,

    // Lifecycle
    Foregrounded,
    Backgrounded,
}

impl AppAction {
    /// Log-safe action tag.
    pub fn tag(&self) -> &'static str {
        match self {
            // Session
            AppAction::FetchSession => "FetchSession",

            // Realtime
            AppAction::SyncSubscription => "SyncSubscription",

            // In-app notifications
            AppAction::DismissNotification => "DismissNotification",
            AppAction::SetActiveConversation { .. } => "SetActiveConversation",

            // Block list
            AppAction::BlockUser { .. } => "BlockUser",
            AppAction::UnblockUser { .. } => "UnblockUser",

            // Favorites
            AppAction::ToggleFavorite { .. } => "ToggleFavorite",
            AppAction::SetFavorite { .. } => "SetFavorite",
            AppAction::RefreshFavorites => "RefreshFavorites",
            AppAction::SetListingFavoriteCount { .. } => "SetListingFavoriteCount",

            // UI
            AppAction::ClearToast => "ClearToast",

            // Lifecycle
            AppAction::Foregrounded => "Foregrounded",
            AppAction::Backgrounded => "Backgrounded",
        }
    }
}
