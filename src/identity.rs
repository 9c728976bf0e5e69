//! Who is claiming the lock: user and host resolution.

use std::env;

/// The local user name, from the environment.
pub fn owner_user() -> String {
    env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

/// The local computer name.
///
/// Falls back to environment variables when the hostname lookup fails.
pub fn owner_host() -> String {
    if let Ok(name) = hostname::get() {
        let name = name.to_string_lossy().trim().to_string();
        if !name.is_empty() {
            return name;
        }
    }

    env::var("COMPUTERNAME")
        .or_else(|_| env::var("HOSTNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}
