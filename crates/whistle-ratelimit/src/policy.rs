use std::time::Duration;

use serde_json::{Value, json};
use whistle_core::RunMode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub name: &'static str,
    pub window: Duration,
    /// Requests allowed per key and window.
    pub max: u32,
    pub message: &'static str,
    /// Refund hits for requests that ended successfully.
    pub skip_successful_requests: bool,
}

impl RateLimitPolicy {
    /// Login attempts. Only failed attempts count against the limit.
    pub fn auth(mode: RunMode) -> Self {
        Self {
            name: "auth",
            window: Duration::from_secs(15 * 60),
            max: by_mode(mode, 10, 100),
            message: "Zu viele Anmeldeversuche. Bitte versuchen Sie es später erneut.",
            skip_successful_requests: true,
        }
    }

    /// Report submissions.
    pub fn submit(mode: RunMode) -> Self {
        Self {
            name: "submit",
            window: Duration::from_secs(60 * 60),
            max: by_mode(mode, 10, 100),
            message: "Zu viele Hinweise. Bitte versuchen Sie es später erneut.",
            skip_successful_requests: false,
        }
    }

    /// Everything else under the API.
    pub fn api(mode: RunMode) -> Self {
        Self {
            name: "api",
            window: Duration::from_secs(60),
            max: by_mode(mode, 100, 500),
            message: "Zu viele Anfragen. Bitte verlangsamen Sie.",
            skip_successful_requests: false,
        }
    }

    /// JSON body sent with a 429.
    pub fn rejection_body(&self) -> Value {
        json!({ "error": self.message })
    }
}

fn by_mode(mode: RunMode, production: u32, development: u32) -> u32 {
    if mode.is_production() { production } else { development }
}
