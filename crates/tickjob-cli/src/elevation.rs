//! Administrator check. Registration proceeds either way.

use tracing::warn;

#[cfg(unix)]
pub fn is_elevated() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

/// `net session` only succeeds from an elevated prompt.
#[cfg(windows)]
pub fn is_elevated() -> bool {
    use std::process::{Command, Stdio};

    Command::new("net")
        .arg("session")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(not(any(unix, windows)))]
pub fn is_elevated() -> bool {
    false
}

pub fn warn_if_unelevated() {
    if !is_elevated() {
        warn!("not running as administrator; the scheduler may refuse some jobs");
    }
}
