use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

pub(crate) const CONFIG_FILE_NAME: &str = "market_config.json";

/// Per-attempt bound for one session fetch.
pub const SESSION_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const SESSION_FETCH_ATTEMPTS: u32 = 3;
/// Hard ceiling on how long the app may sit in `Initializing`/`Fetching`.
pub const APP_INIT_TIMEOUT: Duration = Duration::from_secs(35);
pub const DISPLAY_DURATION: Duration = Duration::from_millis(4000);
/// Sessions closer than this to `expires_at` are reported as expiring soon.
pub const SESSION_REFRESH_THRESHOLD: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub(crate) session_fetch_timeout_ms: Option<u64>,
    pub(crate) app_init_timeout_ms: Option<u64>,
    pub(crate) notification_display_ms: Option<u64>,
    // Kick off the session bootstrap as soon as the actor starts.
    pub(crate) fetch_session_on_start: Option<bool>,
}

pub(crate) fn load_app_config(data_dir: &str) -> AppConfig {
    let path = Path::new(data_dir).join(CONFIG_FILE_NAME);
    if !path.exists() {
        return AppConfig::default();
    }
    match read_app_config(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(path = %path.display(), err = %format!("{e:#}"), "config: falling back to defaults");
            AppConfig::default()
        }
    }
}

fn read_app_config(path: &Path) -> anyhow::Result<AppConfig> {
    let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_slice::<AppConfig>(&bytes).context("parse config json")
}

/// Resolved timing knobs. Defaults are the constants above; the config file may shorten
/// them for development builds and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Timings {
    pub(crate) fetch_timeout: Duration,
    pub(crate) fetch_attempts: u32,
    pub(crate) init_ceiling: Duration,
    pub(crate) display_duration: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            fetch_timeout: SESSION_FETCH_TIMEOUT,
            fetch_attempts: SESSION_FETCH_ATTEMPTS,
            init_ceiling: APP_INIT_TIMEOUT,
            display_duration: DISPLAY_DURATION,
        }
    }
}

impl AppConfig {
    pub(crate) fn timings(&self) -> Timings {
        let mut t = Timings::default();
        if let Some(ms) = self.app_init_timeout_ms.filter(|ms| *ms > 0) {
            t.init_ceiling = Duration::from_millis(ms);
        }
        if let Some(ms) = self.session_fetch_timeout_ms.filter(|ms| *ms > 0) {
            t.fetch_timeout = Duration::from_millis(ms);
        }
        // A single attempt must always fit inside the init ceiling.
        if t.fetch_timeout >= t.init_ceiling {
            t.fetch_timeout = t.init_ceiling / 2;
        }
        if let Some(ms) = self.notification_display_ms.filter(|ms| *ms > 0) {
            t.display_duration = Duration::from_millis(ms);
        }
        t
    }

    pub(crate) fn fetch_session_on_start(&self) -> bool {
        self.fetch_session_on_start.unwrap_or(true)
    }
}
