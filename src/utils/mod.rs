mod cancel;
mod hash;
mod keys;

pub use cancel::{CancelHandle, CancelSignal};
pub use hash::compute_hash;
pub use keys::{is_valid_key, KEY_MAX_BYTES};

use std::path::PathBuf;

/// The name of the daemon's home folder
pub const DAEMON_FOLDER: &str = ".approval-daemon";

/// The name of the config file inside the daemon folder
pub const CONFIG_FILE: &str = "config.json";

/// Get the path to the daemon folder (~/.approval-daemon)
pub fn get_daemon_home() -> Option<PathBuf> {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .ok()
        .map(|home| PathBuf::from(home).join(DAEMON_FOLDER))
}

/// Current time as milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
