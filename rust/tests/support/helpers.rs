#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use market_core::{AppReconciler, AppState, AppUpdate, FfiApp};

pub fn wait_until(what: &str, timeout: Duration, f: impl FnMut() -> bool) {
    wait_until_with_poll(what, timeout, Duration::from_millis(10), f);
}

pub fn wait_until_with_poll(
    what: &str,
    timeout: Duration,
    poll: Duration,
    mut f: impl FnMut() -> bool,
) {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if f() {
            return;
        }
        std::thread::sleep(poll);
    }
    panic!("{what}: condition not met within {timeout:?}");
}

pub fn wait_for_state(
    app: &FfiApp,
    what: &str,
    mut f: impl FnMut(&AppState) -> bool,
) -> AppState {
    let mut last = app.state();
    wait_until(what, Duration::from_secs(5), || {
        last = app.state();
        f(&last)
    });
    last
}

/// Short timings so retry and expiry flows finish quickly.
pub fn write_config(data_dir: &str) {
    write_config_json(
        data_dir,
        serde_json::json!({
            "session_fetch_timeout_ms": 200,
            "app_init_timeout_ms": 2000,
            "notification_display_ms": 300,
        }),
    );
}

pub fn write_config_json(data_dir: &str, v: serde_json::Value) {
    let path = std::path::Path::new(data_dir).join("market_config.json");
    std::fs::write(path, serde_json::to_vec(&v).unwrap()).unwrap();
}

#[derive(Clone)]
pub struct Collector(pub Arc<Mutex<Vec<AppUpdate>>>);

impl Collector {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(vec![])))
    }

    pub fn snapshot(&self) -> Vec<AppUpdate> {
        self.0.lock().unwrap().clone()
    }

    pub fn states(&self) -> Vec<AppState> {
        self.snapshot()
            .into_iter()
            .filter_map(|u| match u {
                AppUpdate::FullState(s) => Some(s),
                _ => None,
            })
            .collect()
    }
}

impl AppReconciler for Collector {
    fn reconcile(&self, update: AppUpdate) {
        self.0.lock().unwrap().push(update);
    }
}
