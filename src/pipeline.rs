//! Capture orchestrator: the scan state machine.
//!
//! Idle → LiveFeedInitializing → LiveFeedActive → Capturing → Analyzing → Done
//!
//! - start_live:       open the feed (bounded by `feed_timeout`) and start the detector
//! - on_code_detected: detector hit → capture the frame, lookup, analyze
//! - capture_manual:   same path without a product code
//! - capture_upload / capture_bytes: enter Capturing from any settled state
//! - submit_text:      straight to Analyzing (pipeline_text.rs)
//!
//! At most one capture is in flight (`busy`). The feed and the detector are
//! torn down inside the same critical section that sets `busy`, before any
//! lookup or analysis is awaited. Lookup and analysis calls are never
//! cancelled; a result that arrives after `close` is dropped.

use crate::capture::{
    CapturedImage, CodeRecognizer, ContinuousDetector, DetectorState, FeedSource, LiveFeed,
    ProductCode,
};
use crate::config::ScannerConfig;
use crate::error::{AnalysisError, ScanError};
use crate::llm::{AnalysisClient, HealthyReport};
use crate::lookup::{ProductContext, ProductLookup};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// How the user is acquiring the product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionMode {
    Live,
    Manual,
}

/// Why the last attempt ended in `Failed`. Every reason is re-enterable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    PermissionDenied,
    AcquisitionTimeout,
    FeedUnavailable,
    CaptureFailed,
    AnalysisFailed,
}

impl FailureReason {
    fn of(err: &ScanError) -> Self {
        match err {
            ScanError::PermissionDenied => FailureReason::PermissionDenied,
            ScanError::AcquisitionTimeout => FailureReason::AcquisitionTimeout,
            ScanError::FeedUnavailable(_) => FailureReason::FeedUnavailable,
            ScanError::Upload(_) | ScanError::Encode(_) => FailureReason::CaptureFailed,
            _ => FailureReason::AnalysisFailed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    LiveFeedInitializing,
    LiveFeedActive,
    Capturing,
    Analyzing,
    Done,
    Failed(FailureReason),
}

impl ScanState {
    /// Idle, Done and Failed: nothing is held and a new attempt may start.
    pub fn is_settled(&self) -> bool {
        matches!(self, ScanState::Idle | ScanState::Done | ScanState::Failed(_))
    }

    fn holds_feed(&self) -> bool {
        matches!(self, ScanState::LiveFeedInitializing | ScanState::LiveFeedActive)
    }
}

/// Receives the scanner's outcomes. The session implements this.
pub trait ScanListener: Send + Sync {
    fn on_state(&self, _state: ScanState) {}
    fn on_report(&self, report: HealthyReport);
    fn on_failure(&self, _error: &ScanError) {}
}

pub(crate) struct Inner<T> {
    pub(crate) state: ScanState,
    pub(crate) mode: AcquisitionMode,
    feed: Option<Arc<T>>,
    detector: Option<DetectorState>,
    pub(crate) busy: bool,
    last_detected_code: Option<ProductCode>,
    /// Bumped whenever a pending feed open must be abandoned.
    pub(crate) generation: u64,
    closed: bool,
}

impl<T: LiveFeed> Inner<T> {
    /// Stop the detector first, then the device. Idempotent.
    pub(crate) fn release_feed(&mut self) {
        if let Some(mut detector) = self.detector.take() {
            detector.stop();
        }
        if let Some(feed) = self.feed.take() {
            feed.stop();
            log::info!("[SCAN] Feed released");
        }
    }
}

pub struct Scanner<F, R, L, A, S>
where
    F: FeedSource,
{
    pub(crate) config: ScannerConfig,
    pub(crate) credential: String,
    feed_source: F,
    detector: ContinuousDetector<R>,
    lookup: L,
    pub(crate) analysis: A,
    pub(crate) listener: Arc<S>,
    inner: Mutex<Inner<F::Feed>>,
}

impl<F, R, L, A, S> Scanner<F, R, L, A, S>
where
    F: FeedSource + 'static,
    R: CodeRecognizer + 'static,
    L: ProductLookup + 'static,
    A: AnalysisClient + 'static,
    S: ScanListener + 'static,
{
    pub fn new(
        config: ScannerConfig,
        credential: impl Into<String>,
        feed_source: F,
        recognizer: Arc<R>,
        lookup: L,
        analysis: A,
        listener: Arc<S>,
    ) -> Self {
        let detector = ContinuousDetector::new(recognizer, config.detection_interval);
        Self {
            config,
            credential: credential.into(),
            feed_source,
            detector,
            lookup,
            analysis,
            listener,
            inner: Mutex::new(Inner {
                state: ScanState::Idle,
                mode: AcquisitionMode::Live,
                feed: None,
                detector: None,
                busy: false,
                last_detected_code: None,
                generation: 0,
                closed: false,
            }),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Inner<F::Feed>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> ScanState {
        self.lock().state
    }

    pub fn mode(&self) -> AcquisitionMode {
        self.lock().mode
    }

    pub fn is_busy(&self) -> bool {
        self.lock().busy
    }

    /// True while a feed handle is held.
    pub fn is_live(&self) -> bool {
        self.lock().feed.is_some()
    }

    /// `Some(false)` when the live session runs without code detection.
    pub fn detection_available(&self) -> Option<bool> {
        match self.lock().detector.as_ref()? {
            DetectorState::Running(_) => Some(true),
            DetectorState::Unavailable => Some(false),
        }
    }

    pub fn last_detected_code(&self) -> Option<ProductCode> {
        self.lock().last_detected_code.clone()
    }

    pub(crate) fn notify(&self, state: ScanState) {
        log::info!("[SCAN] State: {:?}", state);
        self.listener.on_state(state);
    }

    /// Check that a new attempt may start. Called with the lock held.
    pub(crate) fn admit(inner: &Inner<F::Feed>) -> Result<(), ScanError> {
        if inner.closed {
            return Err(ScanError::Discarded);
        }
        if inner.busy {
            return Err(ScanError::Busy);
        }
        Ok(())
    }

    /// Enter LIVE mode: acquire the feed and start detection.
    ///
    /// Denial and timeout leave the scanner in `Failed`, from which live
    /// mode can be retried or an upload submitted.
    pub async fn start_live(self: &Arc<Self>) -> Result<(), ScanError> {
        let generation = {
            let mut inner = self.lock();
            Self::admit(&inner)?;
            if !inner.state.is_settled() {
                return Err(ScanError::NotReady { state: inner.state });
            }
            inner.mode = AcquisitionMode::Live;
            inner.last_detected_code = None;
            inner.generation += 1;
            inner.state = ScanState::LiveFeedInitializing;
            inner.generation
        };
        self.notify(ScanState::LiveFeedInitializing);

        let start = std::time::Instant::now();
        let opened = tokio::time::timeout(self.config.feed_timeout, self.feed_source.open()).await;
        let feed = match opened {
            Ok(Ok(feed)) => Arc::new(feed),
            Ok(Err(e)) => return Err(self.fail_acquisition(generation, e.into())),
            Err(_) => {
                log::warn!(
                    "[SCAN] Feed not ready after {}ms",
                    self.config.feed_timeout.as_millis()
                );
                return Err(self.fail_acquisition(generation, ScanError::AcquisitionTimeout));
            }
        };
        log::info!("[SCAN] Feed acquired: {}ms", start.elapsed().as_millis());

        {
            let mut inner = self.lock();
            if inner.generation != generation || inner.state != ScanState::LiveFeedInitializing {
                feed.stop();
                log::info!("[SCAN] Feed arrived after the live session was abandoned");
                return Err(ScanError::Discarded);
            }
            let scanner = Arc::downgrade(self);
            let detector = self.detector.start(feed.clone(), move |code| {
                if let Some(scanner) = scanner.upgrade() {
                    tokio::spawn(async move {
                        let _ = scanner.on_code_detected(code).await;
                    });
                }
            });
            inner.feed = Some(feed);
            inner.detector = Some(detector);
            inner.state = ScanState::LiveFeedActive;
        }
        self.notify(ScanState::LiveFeedActive);
        Ok(())
    }

    fn fail_acquisition(&self, generation: u64, err: ScanError) -> ScanError {
        {
            let mut inner = self.lock();
            if inner.generation != generation {
                return ScanError::Discarded;
            }
            inner.state = ScanState::Failed(FailureReason::of(&err));
        }
        log::warn!("[SCAN] Feed unavailable: {}", err);
        self.notify(ScanState::Failed(FailureReason::of(&err)));
        self.listener.on_failure(&err);
        err
    }

    /// Detector hit. Ignored unless the feed is live and nothing is in flight.
    pub async fn on_code_detected(&self, code: ProductCode) -> Result<HealthyReport, ScanError> {
        let frame = match self.take_frame(Some(&code)) {
            Ok(frame) => frame,
            Err(e) => {
                log::info!("[SCAN] Ignoring detection of {}: {}", code, e);
                return Err(e);
            }
        };
        self.capture_frame(frame, Some(code)).await
    }

    /// User pressed capture on the live feed. No product code is attached.
    pub async fn capture_manual(&self) -> Result<HealthyReport, ScanError> {
        let frame = self.take_frame(None)?;
        self.capture_frame(frame, None).await
    }

    /// Grab the current frame and tear the feed down, atomically with
    /// claiming `busy`.
    fn take_frame(&self, code: Option<&ProductCode>) -> Result<image::DynamicImage, ScanError> {
        let mut inner = self.lock();
        Self::admit(&inner)?;
        if inner.state != ScanState::LiveFeedActive {
            return Err(ScanError::NotReady { state: inner.state });
        }
        let frame = inner
            .feed
            .as_ref()
            .and_then(|feed| feed.current_frame())
            .ok_or_else(|| ScanError::FeedUnavailable("no frame yet".to_string()))?;

        inner.busy = true;
        inner.release_feed();
        inner.last_detected_code = code.cloned();
        inner.state = ScanState::Capturing;
        drop(inner);

        self.notify(ScanState::Capturing);
        Ok(frame)
    }

    async fn capture_frame(
        &self,
        frame: image::DynamicImage,
        code: Option<ProductCode>,
    ) -> Result<HealthyReport, ScanError> {
        let encode_start = std::time::Instant::now();
        let image = match CapturedImage::from_frame(&frame, self.config.jpeg_quality) {
            Ok(image) => image,
            Err(e) => return Err(self.abort_capture(e.into())),
        };
        log::info!(
            "[SCAN] JPEG encode: {}ms ({} bytes)",
            encode_start.elapsed().as_millis(),
            image.bytes.len()
        );
        self.run_capture(image, code).await
    }

    /// File-upload entry point. Works from any settled state and from a
    /// live feed, which is torn down.
    pub async fn capture_upload(&self, path: impl AsRef<Path>) -> Result<HealthyReport, ScanError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            log::warn!("[SCAN] Could not read {}: {}", path.display(), e);
            ScanError::Upload(e)
        })?;
        log::info!("[SCAN] Upload read: {} ({} bytes)", path.display(), bytes.len());
        self.capture_bytes(bytes, None).await
    }

    /// Analyze image bytes that did not come from the feed. A known product
    /// code may be attached to ground the analysis.
    pub async fn capture_bytes(
        &self,
        bytes: Vec<u8>,
        code: Option<ProductCode>,
    ) -> Result<HealthyReport, ScanError> {
        {
            let mut inner = self.lock();
            Self::admit(&inner)?;
            if !inner.state.is_settled() && !inner.state.holds_feed() {
                return Err(ScanError::NotReady { state: inner.state });
            }
            inner.busy = true;
            inner.release_feed();
            inner.generation += 1;
            inner.mode = AcquisitionMode::Manual;
            inner.last_detected_code = code.clone();
            inner.state = ScanState::Capturing;
        }
        self.notify(ScanState::Capturing);
        self.run_capture(CapturedImage::from_upload(bytes), code).await
    }

    /// Capturing → Analyzing → Done/Failed. Caller holds `busy`.
    async fn run_capture(
        &self,
        image: CapturedImage,
        code: Option<ProductCode>,
    ) -> Result<HealthyReport, ScanError> {
        let context = match &code {
            Some(code) => {
                let start = std::time::Instant::now();
                let context = self.lookup.lookup(code).await;
                log::info!(
                    "[SCAN] Lookup {}: {}ms",
                    if context.is_some() { "hit" } else { "miss" },
                    start.elapsed().as_millis()
                );
                context
            }
            None => None,
        };
        let context_json = context.as_ref().map(ProductContext::to_prompt_json);

        self.lock().state = ScanState::Analyzing;
        self.notify(ScanState::Analyzing);

        let start = std::time::Instant::now();
        let result = self
            .analysis
            .analyze_image(&self.credential, &image, context_json.as_deref())
            .await;
        log::info!("[SCAN] Analysis: {}ms", start.elapsed().as_millis());

        let image_url = context.and_then(|c| c.image_url);
        self.finish(result.map(|mut report| {
            report.reconcile_image(image_url.as_deref());
            report
        }))
    }

    /// Release `busy` and settle into Done or Failed, or drop the result
    /// when the scanner was closed meanwhile.
    pub(crate) fn finish(
        &self,
        result: Result<HealthyReport, AnalysisError>,
    ) -> Result<HealthyReport, ScanError> {
        let mut inner = self.lock();
        inner.busy = false;
        if inner.closed {
            inner.state = ScanState::Idle;
            log::info!("[SCAN] Scanner closed, discarding result");
            return Err(ScanError::Discarded);
        }
        match result {
            Ok(report) => {
                inner.state = ScanState::Done;
                drop(inner);
                self.notify(ScanState::Done);
                self.listener.on_report(report.clone());
                Ok(report)
            }
            Err(e) => {
                drop(inner);
                Err(self.settle_failure(e.into()))
            }
        }
    }

    fn abort_capture(&self, err: ScanError) -> ScanError {
        let mut inner = self.lock();
        inner.busy = false;
        if inner.closed {
            inner.state = ScanState::Idle;
            return ScanError::Discarded;
        }
        drop(inner);
        self.settle_failure(err)
    }

    fn settle_failure(&self, err: ScanError) -> ScanError {
        let state = ScanState::Failed(FailureReason::of(&err));
        {
            let mut inner = self.lock();
            inner.state = state;
            inner.last_detected_code = None;
        }
        self.notify(state);
        self.listener.on_failure(&err);
        err
    }

    /// Switch acquisition mode. Cancels a feed or detector that is up or
    /// coming up; an analysis in flight keeps running and still reports.
    ///
    /// Switching to `Live` does not open the feed, call [`Self::start_live`].
    pub fn set_mode(&self, mode: AcquisitionMode) {
        let settled = {
            let mut inner = self.lock();
            if inner.mode == mode {
                return;
            }
            inner.mode = mode;
            inner.generation += 1;
            inner.release_feed();
            if inner.state.holds_feed() {
                inner.state = ScanState::Idle;
                true
            } else {
                false
            }
        };
        log::info!("[SCAN] Mode: {:?}", mode);
        if settled {
            self.notify(ScanState::Idle);
        }
    }

    /// Leave the acquisition view. Releases the feed; an analysis already
    /// in flight is awaited by its caller and its result discarded.
    pub fn close(&self) {
        let mut inner = self.lock();
        if inner.closed {
            return;
        }
        inner.closed = true;
        inner.generation += 1;
        inner.release_feed();
        if !inner.busy {
            inner.state = ScanState::Idle;
        }
        log::info!("[SCAN] Scanner closed");
    }
}

impl<F, R, L, A, S> Drop for Scanner<F, R, L, A, S>
where
    F: FeedSource,
{
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        inner.release_feed();
    }
}
