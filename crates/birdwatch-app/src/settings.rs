use std::time::Duration;

use tracing::warn;

pub const BACKEND_URL_ENV: &str = "BIRDWATCH_BACKEND_URL";
pub const POLL_MS_ENV: &str = "BIRDWATCH_POLL_MS";
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8080";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_SURFACE: (u32, u32) = (800, 600);

/// Client-side knobs for talking to the simulation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub backend_url: String,
    /// Cadence of snapshot polls while the run is active.
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    /// Size of the offscreen surface used for PNG export.
    pub surface: (u32, u32),
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_owned(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            surface: DEFAULT_SURFACE,
        }
    }
}

impl ClientSettings {
    /// Defaults overridden by `BIRDWATCH_BACKEND_URL` and `BIRDWATCH_POLL_MS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();
        if let Some(url) = lookup(BACKEND_URL_ENV)
            .map(|raw| raw.trim().to_owned())
            .filter(|raw| !raw.is_empty())
        {
            settings.backend_url = url;
        }
        if let Some(raw) = lookup(POLL_MS_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => settings.poll_interval = Duration::from_millis(ms),
                _ => warn!(value = %raw, "ignoring invalid {POLL_MS_ENV}"),
            }
        }
        settings
    }

    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = url.into();
        self
    }
}
