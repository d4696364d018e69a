//! Password login for xSchedule's web server
//!
//! The device expects `md5_hex(ip + password)` where `ip` is the address the
//! device sees the client connecting from. The client learns that address by
//! first presenting a deliberately wrong credential; the rejection carries it.

use md5::{Digest, Md5};

/// Credential sent to learn the client address the device sees
pub(crate) const PROBE_CREDENTIAL: &str = "bad";

/// Login credential for `seen_ip` and `password`
pub(crate) fn credential(seen_ip: &str, password: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(seen_ip.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Session state guarded by the client's login mutex
#[derive(Debug, Default)]
pub(crate) struct Session {
    pub seen_ip: Option<String>,
    pub logged_in: bool,
}
