//! Candidate identity

use uuid::Uuid;

const HOSTNAME_FILE: &str = "/proc/sys/kernel/hostname";

/// Host name from `HOSTNAME`, then the kernel, then `unknown`
pub fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .or_else(|| std::fs::read_to_string(HOSTNAME_FILE).ok())
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// `<hostname>_<uuid>`, unique even for replicas sharing a host name
pub fn new_identity() -> String {
    format!("{}_{}", hostname(), Uuid::new_v4())
}
