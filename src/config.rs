//! Scanner configuration: defaults with environment overrides.
//!
//! The environment is populated from `.env.local` / `.env` by [`crate::init`]
//! before this is read, same as every other setting in the app.

use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_LOOKUP_BASE_URL: &str = "https://world.openfoodfacts.org";
pub const DEFAULT_ANALYSIS_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Gap between detection ticks on the live feed.
    pub detection_interval: Duration,
    /// Wall-clock budget for the feed permission/open step.
    pub feed_timeout: Duration,
    pub lookup_timeout: Duration,
    pub analysis_timeout: Duration,
    pub model: String,
    pub jpeg_quality: u8,
    pub lookup_base_url: String,
    pub analysis_base_url: String,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            detection_interval: Duration::from_millis(500),
            feed_timeout: Duration::from_millis(8000),
            lookup_timeout: Duration::from_secs(10),
            analysis_timeout: Duration::from_secs(60),
            model: DEFAULT_MODEL.to_string(),
            jpeg_quality: 80,
            lookup_base_url: DEFAULT_LOOKUP_BASE_URL.to_string(),
            analysis_base_url: DEFAULT_ANALYSIS_BASE_URL.to_string(),
        }
    }
}

impl ScannerConfig {
    /// Build from env vars, keeping the default for anything unset or invalid.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            detection_interval: env_u64("SCAN_INTERVAL_MS")
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.detection_interval),
            feed_timeout: env_u64("FEED_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.feed_timeout),
            lookup_timeout: env_u64("LOOKUP_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.lookup_timeout),
            analysis_timeout: env_u64("ANALYSIS_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.analysis_timeout),
            model: std::env::var("GEMINI_MODEL")
                .ok()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(defaults.model),
            jpeg_quality: env_u64("CAPTURE_JPEG_QUALITY")
                .filter(|q| (1..=100).contains(q))
                .map(|q| q as u8)
                .unwrap_or(defaults.jpeg_quality),
            lookup_base_url: env_url("OFF_BASE_URL").unwrap_or(defaults.lookup_base_url),
            analysis_base_url: env_url("GEMINI_BASE_URL").unwrap_or(defaults.analysis_base_url),
        }
    }
}

fn env_url(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|u| u.trim().trim_end_matches('/').to_string())
        .filter(|u| !u.is_empty())
}

fn env_u64(key: &str) -> Option<u64> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("[CONFIG] Ignoring {}={:?} — not a number", key, raw);
            None
        }
    }
}
