// Session lifecycle: bootstrap fetch with bounded retries, and transitions driven by the
// backend's auth client.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{timeout, Instant};

use super::config::Timings;
use crate::backend::SessionApi;
use crate::error::{BackendError, SessionError};
use crate::state::{
    now_millis, AttemptOutcome, AuthEvent, AuthState, FetchAttempt, Session, UserProfile,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FetchOutcome {
    Authenticated {
        session: Session,
        profile: Option<UserProfile>,
    },
    NoSession,
    Failed(SessionError),
}

/// Result of one bootstrap sequence, posted back to the actor.
#[derive(Debug, Clone)]
pub(crate) struct FetchReport {
    pub(crate) attempts: Vec<FetchAttempt>,
    pub(crate) outcome: FetchOutcome,
    pub(crate) elapsed: Duration,
}

/// Runs the bootstrap sequence: up to `fetch_attempts` sequential session fetches, each
/// bounded by `fetch_timeout`, then the profile fetch. The whole thing is bounded by
/// `init_ceiling`; hitting it still yields a terminal outcome.
pub(crate) async fn fetch_session_with_retry(
    api: Arc<dyn SessionApi>,
    timings: Timings,
) -> FetchReport {
    let started = Instant::now();
    let mut attempts = Vec::new();
    let mut obtained: Option<Session> = None;

    let bounded = timeout(
        timings.init_ceiling,
        run_bootstrap(api.as_ref(), timings, &mut attempts, &mut obtained),
    )
    .await;

    let outcome = match bounded {
        Ok(outcome) => outcome,
        Err(_) => match obtained {
            Some(session) => {
                tracing::warn!(
                    user_id = %session.user_id,
                    "session: init ceiling hit during profile fetch; continuing without profile"
                );
                FetchOutcome::Authenticated {
                    session,
                    profile: None,
                }
            }
            None => FetchOutcome::Failed(SessionError::InitCeilingExceeded {
                after_ms: timings.init_ceiling.as_millis() as u64,
            }),
        },
    };

    FetchReport {
        attempts,
        outcome,
        elapsed: started.elapsed(),
    }
}

async fn run_bootstrap(
    api: &dyn SessionApi,
    timings: Timings,
    attempts: &mut Vec<FetchAttempt>,
    obtained: &mut Option<Session>,
) -> FetchOutcome {
    let mut last_err = None;
    for attempt_number in 1..=timings.fetch_attempts {
        let started_at_ms = now_millis();
        let result = match timeout(timings.fetch_timeout, api.fetch_session()).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::timeout(timings.fetch_timeout)),
        };

        match result {
            Ok(found) => {
                attempts.push(FetchAttempt {
                    attempt_number,
                    started_at_ms,
                    outcome: AttemptOutcome::Success,
                });
                let Some(session) = found else {
                    return FetchOutcome::NoSession;
                };
                *obtained = Some(session.clone());
                let profile = fetch_profile(api, &session.user_id, timings.fetch_timeout).await;
                return FetchOutcome::Authenticated { session, profile };
            }
            Err(e) => {
                tracing::warn!(attempt = attempt_number, err = %e, "session: fetch attempt failed");
                let outcome = match &e {
                    BackendError::Timeout { .. } => AttemptOutcome::Timeout,
                    other => AttemptOutcome::Error {
                        message: other.to_string(),
                    },
                };
                attempts.push(FetchAttempt {
                    attempt_number,
                    started_at_ms,
                    outcome,
                });
                last_err = Some(e);
            }
        }
    }

    FetchOutcome::Failed(SessionError::ExhaustedRetries {
        attempts: timings.fetch_attempts,
        last: last_err.unwrap_or_else(|| BackendError::transport("no attempts configured")),
    })
}

async fn fetch_profile(
    api: &dyn SessionApi,
    user_id: &str,
    bound: Duration,
) -> Option<UserProfile> {
    match timeout(bound, api.fetch_profile(user_id)).await {
        Ok(Ok(profile)) => profile,
        Ok(Err(e)) => {
            tracing::warn!(%user_id, err = %e, "session: profile fetch failed");
            None
        }
        Err(_) => {
            tracing::warn!(%user_id, "session: profile fetch timed out");
            None
        }
    }
}

/// Identity transition produced by the machine. The actor fans this out to the
/// subscription manager, block list and favorites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IdentityChange {
    pub(crate) previous: Option<String>,
    pub(crate) current: Option<String>,
}

#[derive(Debug)]
pub(crate) struct SessionMachine {
    state: AuthState,
    profile: Option<UserProfile>,
    fetch_token: u64,
    fetch_in_flight: bool,
    attempt_count: u32,
}

impl SessionMachine {
    pub(crate) fn new() -> Self {
        Self {
            state: AuthState::Initializing,
            profile: None,
            fetch_token: 0,
            fetch_in_flight: false,
            attempt_count: 0,
        }
    }

    pub(crate) fn state(&self) -> &AuthState {
        &self.state
    }

    pub(crate) fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    pub(crate) fn user_id(&self) -> Option<&str> {
        self.state.user_id()
    }

    pub(crate) fn session(&self) -> Option<&Session> {
        match &self.state {
            AuthState::Authenticated { session } => Some(session),
            _ => None,
        }
    }

    pub(crate) fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    #[cfg(test)]
    pub(crate) fn fetch_in_flight(&self) -> bool {
        self.fetch_in_flight
    }

    /// Starts a bootstrap sequence and returns its token. Rejects re-entrant calls and
    /// calls outside the bootstrap states.
    pub(crate) fn begin_fetch(&mut self) -> Result<u64, SessionError> {
        if self.fetch_in_flight {
            return Err(SessionError::FetchInFlight);
        }
        match self.state {
            AuthState::Initializing | AuthState::Error { .. } => {}
            ref other => {
                return Err(SessionError::NotBootstrapping { state: other.tag() });
            }
        }
        self.fetch_token = self.fetch_token.wrapping_add(1);
        self.fetch_in_flight = true;
        self.attempt_count = 0;
        tracing::info!(from = self.state.tag(), token = self.fetch_token, "session: fetch started");
        self.state = AuthState::Fetching;
        Ok(self.fetch_token)
    }

    pub(crate) fn finish_fetch(&mut self, token: u64, report: FetchReport) -> Option<IdentityChange> {
        if !self.fetch_in_flight || token != self.fetch_token {
            tracing::debug!(token, current = self.fetch_token, "session: discarding stale fetch report");
            return None;
        }
        self.fetch_in_flight = false;
        self.attempt_count = report.attempts.len() as u32;
        tracing::info!(
            attempts = self.attempt_count,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "session: fetch finished"
        );

        let next = match report.outcome {
            FetchOutcome::Authenticated { session, profile } => {
                self.profile = profile;
                AuthState::Authenticated { session }
            }
            FetchOutcome::NoSession => AuthState::Unauthenticated,
            FetchOutcome::Failed(e) => {
                tracing::error!(err = %e, "session: bootstrap failed");
                AuthState::Error {
                    message: e.to_string(),
                }
            }
        };
        self.transition(next)
    }

    /// Applies an auth client event. Never triggers a fetch; an outstanding bootstrap
    /// fetch is superseded whenever the event changes state.
    pub(crate) fn apply_auth_event(&mut self, event: AuthEvent) -> Option<IdentityChange> {
        let next = match (event, &self.state) {
            (AuthEvent::SignedIn { session }, _) => AuthState::Authenticated { session },
            (AuthEvent::SignedOut, AuthState::Initializing) => {
                tracing::debug!("session: SIGNED_OUT before bootstrap ignored");
                return None;
            }
            (AuthEvent::SignedOut, _) => AuthState::Unauthenticated,
            (AuthEvent::TokenRefreshed { session }, AuthState::Authenticated { .. }) => {
                AuthState::Authenticated { session }
            }
            (AuthEvent::TokenRefreshed { .. }, state) => {
                tracing::debug!(state = state.tag(), "session: TOKEN_REFRESHED outside authenticated ignored");
                return None;
            }
            (AuthEvent::Other { kind }, _) => {
                tracing::trace!(%kind, "session: unrelated auth event");
                return None;
            }
        };

        if self.fetch_in_flight {
            tracing::info!(token = self.fetch_token, "session: auth event supersedes in-flight fetch");
            self.fetch_in_flight = false;
            self.fetch_token = self.fetch_token.wrapping_add(1);
        }
        self.transition(next)
    }

    fn transition(&mut self, next: AuthState) -> Option<IdentityChange> {
        let previous = self.user_id().map(str::to_owned);
        tracing::info!(from = self.state.tag(), to = next.tag(), "session: transition");
        self.state = next;
        let current = self.user_id().map(str::to_owned);

        if self
            .profile
            .as_ref()
            .is_some_and(|p| Some(&p.user_id) != current.as_ref())
        {
            self.profile = None;
        }

        if previous == current {
            return None;
        }
        Some(IdentityChange { previous, current })
    }
}
