//! Capture domain: public API.
//!
//! Owns the ports the scanner acquires images through: a live feed, a
//! code recognizer for the feed's frames, and the encoding of a captured
//! frame into the bytes the analysis call sends. The feed and the
//! detector loop are owned by the scanner for as long as the feed is live.

pub mod detector;
pub mod ean;

pub use detector::{ContinuousDetector, DetectorHandle, DetectorState};
pub use ean::EanRecognizer;

use crate::error::{DetectError, FeedError};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

/// Opaque payload read from a barcode/QR code. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductCode(String);

impl ProductCode {
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An open capture device.
pub trait LiveFeed: Send + Sync {
    /// The current frame, or None while the device has no data yet.
    fn current_frame(&self) -> Option<DynamicImage>;
    /// Release the device. Must be idempotent.
    fn stop(&self);
}

/// Grants access to a capture device (permission prompt + device open).
pub trait FeedSource: Send + Sync {
    type Feed: LiveFeed + 'static;

    fn open(&self) -> impl Future<Output = Result<Self::Feed, FeedError>> + Send;
}

/// Whether the host can recognize codes at all. Queried once per live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorCapability {
    Available,
    Unavailable,
}

/// Reads a product code out of a single frame.
pub trait CodeRecognizer: Send + Sync {
    fn capability(&self) -> DetectorCapability;
    fn recognize(&self, frame: &DynamicImage) -> Result<Option<ProductCode>, DetectError>;
}

/// Recognizer for hosts without any detection support. Manual capture only.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRecognizer;

impl CodeRecognizer for NoRecognizer {
    fn capability(&self) -> DetectorCapability {
        DetectorCapability::Unavailable
    }

    fn recognize(&self, _frame: &DynamicImage) -> Result<Option<ProductCode>, DetectError> {
        Ok(None)
    }
}

/// Feed source for hosts without a camera. Upload and text paths still work.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFeed;

impl FeedSource for NoFeed {
    type Feed = StillFeed;

    async fn open(&self) -> Result<StillFeed, FeedError> {
        Err(FeedError::Unsupported)
    }
}

/// A feed that shows the same frame forever. Used by the headless driver.
pub struct StillFeed {
    frame: DynamicImage,
    stopped: AtomicBool,
}

impl StillFeed {
    pub fn new(frame: DynamicImage) -> Self {
        Self {
            frame,
            stopped: AtomicBool::new(false),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl LiveFeed for StillFeed {
    fn current_frame(&self) -> Option<DynamicImage> {
        if self.stopped.load(Ordering::SeqCst) {
            return None;
        }
        Some(self.frame.clone())
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Opens a [`StillFeed`] over a fixed image.
pub struct StillFeedSource {
    frame: DynamicImage,
}

impl StillFeedSource {
    pub fn new(frame: DynamicImage) -> Self {
        Self { frame }
    }
}

impl FeedSource for StillFeedSource {
    type Feed = StillFeed;

    async fn open(&self) -> Result<StillFeed, FeedError> {
        Ok(StillFeed::new(self.frame.clone()))
    }
}

/// Image bytes ready for the analysis call.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl CapturedImage {
    /// Encode a feed frame as JPEG. Alpha is dropped since JPEG has none.
    pub fn from_frame(frame: &DynamicImage, quality: u8) -> Result<Self, image::ImageError> {
        let rgb = DynamicImage::ImageRgb8(frame.to_rgb8());
        let mut bytes = Vec::new();
        rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut bytes, quality))?;
        Ok(Self {
            bytes,
            mime_type: "image/jpeg".to_string(),
        })
    }

    /// Wrap uploaded file bytes as-is, sniffing the MIME type.
    pub fn from_upload(bytes: Vec<u8>) -> Self {
        let mime_type = image::guess_format(&bytes)
            .map(|format| format.to_mime_type().to_string())
            .unwrap_or_else(|_| "image/jpeg".to_string());
        Self { bytes, mime_type }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn product_code_rejects_blank() {
        assert!(ProductCode::new("").is_none());
        assert!(ProductCode::new("   ").is_none());
        assert_eq!(ProductCode::new(" 5901234123457 ").unwrap().as_str(), "5901234123457");
    }

    #[test]
    fn frame_encodes_to_jpeg_even_with_alpha() {
        let frame = DynamicImage::ImageRgba8(RgbaImage::from_pixel(16, 8, Rgba([200, 10, 10, 128])));
        let captured = CapturedImage::from_frame(&frame, 80).unwrap();
        assert_eq!(captured.mime_type, "image/jpeg");
        assert_eq!(&captured.bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn upload_mime_is_sniffed() {
        let frame = DynamicImage::ImageRgba8(RgbaImage::new(4, 4));
        let mut png = Vec::new();
        frame
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        assert_eq!(CapturedImage::from_upload(png).mime_type, "image/png");
        assert_eq!(
            CapturedImage::from_upload(b"not an image".to_vec()).mime_type,
            "image/jpeg"
        );
    }

    #[test]
    fn still_feed_goes_dark_after_stop() {
        let feed = StillFeed::new(DynamicImage::ImageRgba8(RgbaImage::new(2, 2)));
        assert!(feed.current_frame().is_some());
        feed.stop();
        feed.stop();
        assert!(feed.is_stopped());
        assert!(feed.current_frame().is_none());
    }
}
