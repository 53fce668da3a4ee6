use std::collections::HashMap;
use std::time::Duration;

/// Full UI-facing snapshot. Every update the platform receives carries one of these,
/// so a reconciler that misses a rev can always resync from `FfiApp::state()`.
#[derive(uniffi::Record, Clone, Debug, PartialEq)]
pub struct AppState {
    pub rev: u64,
    pub auth: AuthState,
    pub profile: Option<UserProfile>,
    /// Attempts made by the most recent session fetch sequence (0 while none has started).
    pub session_fetch_attempts: u32,
    pub session_expiring_soon: bool,
    pub subscription: SubscriptionStatus,
    pub active_notification: Option<InAppNotification>,
    pub blocked_user_ids: Vec<String>,
    pub favorites: FavoritesState,
    pub toast: Option<String>,
}

impl AppState {
    pub fn empty() -> Self {
        Self {
            rev: 0,
            auth: AuthState::Initializing,
            profile: None,
            session_fetch_attempts: 0,
            session_expiring_soon: false,
            subscription: SubscriptionStatus::Idle,
            active_notification: None,
            blocked_user_ids: vec![],
            favorites: FavoritesState::empty(),
            toast: None,
        }
    }
}

#[derive(uniffi::Enum, Clone, Debug, PartialEq, Eq)]
pub enum AuthState {
    Initializing,
    Fetching,
    Authenticated { session: Session },
    Unauthenticated,
    /// Session bootstrap failed. Recoverable: dispatch `AppAction::FetchSession` again.
    Error { message: String },
}

impl AuthState {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            AuthState::Authenticated { session } => Some(session.user_id.as_str()),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AuthState::Authenticated { .. } | AuthState::Unauthenticated | AuthState::Error { .. }
        )
    }

    pub fn tag(&self) -> &'static str {
        match self {
            AuthState::Initializing => "initializing",
            AuthState::Fetching => "fetching",
            AuthState::Authenticated { .. } => "authenticated",
            AuthState::Unauthenticated => "unauthenticated",
            AuthState::Error { .. } => "error",
        }
    }
}

#[derive(uniffi::Record, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Session {
    pub user_id: String,
    pub access_token: String,
    /// Unix seconds.
    pub expires_at: Option<i64>,
}

// Hand-written so access tokens never reach the logs.
impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Session {
    pub fn is_expired(&self, now_secs: i64) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now_secs)
    }

    pub fn expires_within(&self, now_secs: i64, window: Duration) -> bool {
        self.expires_at
            .is_some_and(|exp| exp.saturating_sub(now_secs) <= window.as_secs() as i64)
    }
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct UserProfile {
    pub user_id: String,
    pub display_name: Option<String>,
}

/// Events emitted by the managed backend's auth client.
#[derive(uniffi::Enum, Clone, Debug, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn { session: Session },
    SignedOut,
    TokenRefreshed { session: Session },
    /// Anything else the auth client reports (`USER_UPDATED`, `PASSWORD_RECOVERY`, ...).
    Other { kind: String },
}

impl AuthEvent {
    pub fn tag(&self) -> &'static str {
        match self {
            AuthEvent::SignedIn { .. } => "SIGNED_IN",
            AuthEvent::SignedOut => "SIGNED_OUT",
            AuthEvent::TokenRefreshed { .. } => "TOKEN_REFRESHED",
            AuthEvent::Other { .. } => "OTHER",
        }
    }
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct FetchAttempt {
    pub attempt_number: u32,
    pub started_at_ms: i64,
    pub outcome: AttemptOutcome,
}

#[derive(uniffi::Enum, Clone, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Timeout,
    Error { message: String },
}

#[derive(uniffi::Enum, Clone, Debug, PartialEq, Eq)]
pub enum SubscriptionStatus {
    Idle,
    Connecting { user_id: String },
    Active { user_id: String },
    /// Recoverable: the next `AppAction::SyncSubscription` re-establishes the channel.
    Failed { user_id: String, message: String },
}

#[derive(
    uniffi::Enum, Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum NotificationCategory {
    Message,
    Notification,
    Offer,
    System,
}

/// Inbound real-time event as delivered by the backend channel.
#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RealtimeEvent {
    pub sender_id: String,
    pub category: NotificationCategory,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub payload: Option<String>,
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct InAppNotification {
    pub id: String,
    pub title: String,
    pub message: String,
    pub category: NotificationCategory,
    pub payload: Option<String>,
    pub sender_id: String,
    pub created_at_ms: i64,
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct FavoritesState {
    pub count: u32,
    pub listing_ids: Vec<String>,
    /// Public favorite counters of listings the UI has seeded or touched.
    pub listing_counts: HashMap<String, u32>,
}

impl FavoritesState {
    pub fn empty() -> Self {
        Self {
            count: 0,
            listing_ids: vec![],
            listing_counts: HashMap::new(),
        }
    }
}

#[derive(uniffi::Record, Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockRelationships {
    pub blocked_by_me: Vec<String>,
    pub blocking_me: Vec<String>,
}

pub fn now_seconds() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
