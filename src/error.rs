//! Error taxonomy for the scan pipeline.
//!
//! Only `ScanError` ever reaches the user. Lookup and per-frame detection
//! errors are absorbed where they happen; analysis errors keep their detail
//! for the logs and collapse to `ScanError::AnalysisFailed` at the boundary.

use crate::pipeline::ScanState;
use thiserror::Error;

/// User-facing failures of an acquisition attempt.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Camera permission denied or unavailable")]
    PermissionDenied,
    #[error("Camera timed out — check permissions or upload a photo")]
    AcquisitionTimeout,
    #[error("Camera unavailable: {0}")]
    FeedUnavailable(String),
    #[error("An analysis is already in progress")]
    Busy,
    #[error("Cannot do that while {state:?}")]
    NotReady { state: ScanState },
    #[error("Nothing to analyze — enter a product name")]
    EmptyInput,
    #[error("Could not read uploaded image: {0}")]
    Upload(#[from] std::io::Error),
    #[error("Could not encode captured frame: {0}")]
    Encode(#[from] image::ImageError),
    #[error("Failed to analyze product. Please try again.")]
    AnalysisFailed,
    #[error("Scanner was closed before the result arrived")]
    Discarded,
}

impl ScanError {
    /// Whether the user can retry the same acquisition path.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ScanError::Discarded)
    }
}

/// Failures of the feed port.
#[derive(Debug, Clone, Error)]
pub enum FeedError {
    #[error("permission denied")]
    PermissionDenied,
    #[error("no capture device on this host")]
    Unsupported,
    #[error("device error: {0}")]
    Device(String),
}

impl From<FeedError> for ScanError {
    fn from(err: FeedError) -> Self {
        match err {
            FeedError::PermissionDenied => ScanError::PermissionDenied,
            FeedError::Unsupported => ScanError::FeedUnavailable(err.to_string()),
            FeedError::Device(msg) => ScanError::FeedUnavailable(msg),
        }
    }
}

/// Failures of a single analysis call. Detail for logs only.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("no API key configured")]
    MissingCredential,
    #[error("request failed: {0}")]
    Transport(String),
    #[error("credential rejected ({0})")]
    Auth(u16),
    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("no data returned")]
    EmptyResponse,
    #[error("could not parse response: {0}")]
    Parse(String),
}

impl From<AnalysisError> for ScanError {
    fn from(err: AnalysisError) -> Self {
        log::error!("[LLM] Analysis failed: {}", err);
        ScanError::AnalysisFailed
    }
}

/// Lookup failures never leave the lookup client; kept typed for logging.
#[derive(Debug, Error)]
pub(crate) enum LookupError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("status {0}")]
    Status(u16),
    #[error("invalid lookup URL: {0}")]
    InvalidUrl(String),
    #[error("product unknown to database")]
    Unknown,
}

/// A single frame the recognizer could not read. Swallowed by the detector.
#[derive(Debug, Error)]
#[error("frame not decodable: {0}")]
pub struct DetectError(pub String);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("API key is required")]
    CredentialRequired,
    #[error("credential store: {0}")]
    Store(String),
}

impl From<keyring::Error> for SessionError {
    fn from(err: keyring::Error) -> Self {
        SessionError::Store(err.to_string())
    }
}
