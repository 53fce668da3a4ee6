// Tracing setup for the three places the core runs: the iOS app (unified log plus a
// `market.log` file in the data dir), the Android app (logcat), and desktop test hosts
// (stderr, overridable with `MARKET_LOG`). Only the first call installs a subscriber.

const DEFAULT_FILTER: &str = "market_core=debug,info";

pub fn init_logging(#[allow(unused)] data_dir: &str) {
    #[cfg(target_os = "ios")]
    init_ios(data_dir);

    #[cfg(target_os = "android")]
    init_android();

    #[cfg(not(any(target_os = "ios", target_os = "android")))]
    init_desktop();
}

#[cfg(target_os = "ios")]
fn init_ios(data_dir: &str) {
    use tracing_subscriber::prelude::*;

    // A log file the user can attach to a support ticket; skipped if it cannot be opened.
    let _ = std::fs::create_dir_all(data_dir);
    let file_layer = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(std::path::Path::new(data_dir).join("market.log"))
        .map(|file| {
            tracing_subscriber::fmt::layer()
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
        })
        .ok();

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(DEFAULT_FILTER))
        .with(tracing_oslog::OsLogger::new("com.market.app", "core"))
        .with(file_layer)
        .try_init();
}

#[cfg(target_os = "android")]
fn init_android() {
    use tracing_subscriber::prelude::*;

    let logcat = paranoid_android::layer("market")
        .with_filter(tracing_subscriber::EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::registry().with(logcat).try_init();
}

#[cfg(not(any(target_os = "ios", target_os = "android")))]
fn init_desktop() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("MARKET_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
