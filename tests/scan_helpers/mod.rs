//! Shared fakes for the scanner scenario tests.

#![allow(dead_code)]

use healthiswealth_lib::capture::{
    CapturedImage, CodeRecognizer, DetectorCapability, FeedSource, LiveFeed, ProductCode,
    StillFeed,
};
use healthiswealth_lib::error::{AnalysisError, DetectError, FeedError, ScanError};
use healthiswealth_lib::llm::AnalysisClient;
use healthiswealth_lib::lookup::{ProductContext, ProductLookup};
use healthiswealth_lib::settings::MemoryStore;
use healthiswealth_lib::{
    HealthyReport, IngredientFinding, Risk, ScanListener, ScanState, Scanner, ScannerConfig,
    Session,
};
use image::{DynamicImage, RgbaImage};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Feed ───────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
pub enum FeedBehavior {
    Grant,
    GrantAfter(Duration),
    Deny,
    Hang,
}

/// Wraps a shared StillFeed so the test can check it was stopped.
pub struct ObservedFeed(Arc<StillFeed>);

impl LiveFeed for ObservedFeed {
    fn current_frame(&self) -> Option<DynamicImage> {
        self.0.current_frame()
    }

    fn stop(&self) {
        self.0.stop();
    }
}

pub struct FakeFeedSource {
    behavior: FeedBehavior,
    opened: Arc<Mutex<Vec<Arc<StillFeed>>>>,
}

impl FakeFeedSource {
    /// The source plus a handle to every feed it has opened.
    pub fn new(behavior: FeedBehavior) -> (Self, Arc<Mutex<Vec<Arc<StillFeed>>>>) {
        let opened = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                behavior,
                opened: opened.clone(),
            },
            opened,
        )
    }
}

impl FakeFeedSource {
    fn grant(&self) -> ObservedFeed {
        let feed = Arc::new(StillFeed::new(frame()));
        self.opened.lock().unwrap().push(feed.clone());
        ObservedFeed(feed)
    }
}

impl FeedSource for FakeFeedSource {
    type Feed = ObservedFeed;

    async fn open(&self) -> Result<ObservedFeed, FeedError> {
        match self.behavior {
            FeedBehavior::Grant => Ok(self.grant()),
            FeedBehavior::GrantAfter(delay) => {
                tokio::time::sleep(delay).await;
                Ok(self.grant())
            }
            FeedBehavior::Deny => Err(FeedError::PermissionDenied),
            FeedBehavior::Hang => std::future::pending().await,
        }
    }
}

pub fn frame() -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::new(8, 8))
}

// ── Recognizer ─────────────────────────────────────────────────────

/// Sees the same code in every frame.
pub struct FixedRecognizer {
    code: &'static str,
    pub calls: AtomicUsize,
}

impl FixedRecognizer {
    pub fn new(code: &'static str) -> Self {
        Self {
            code,
            calls: AtomicUsize::new(0),
        }
    }
}

impl CodeRecognizer for FixedRecognizer {
    fn capability(&self) -> DetectorCapability {
        DetectorCapability::Available
    }

    fn recognize(&self, _frame: &DynamicImage) -> Result<Option<ProductCode>, DetectError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ProductCode::new(self.code))
    }
}

// ── Lookup ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeLookup {
    products: HashMap<String, ProductContext>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl FakeLookup {
    pub fn with_product(mut self, code: &str, context: ProductContext) -> Self {
        self.products.insert(code.to_string(), context);
        self
    }
}

impl ProductLookup for FakeLookup {
    async fn lookup(&self, code: &ProductCode) -> Option<ProductContext> {
        self.calls.lock().unwrap().push(code.to_string());
        self.products.get(code.as_str()).cloned()
    }
}

// ── Analysis ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct AnalysisLog {
    /// Context passed with each image call.
    pub image_calls: Mutex<Vec<Option<String>>>,
    pub text_calls: Mutex<Vec<String>>,
    pub credentials: Mutex<Vec<String>>,
}

impl AnalysisLog {
    pub fn total_calls(&self) -> usize {
        self.image_calls.lock().unwrap().len() + self.text_calls.lock().unwrap().len()
    }
}

pub struct FakeAnalysis {
    report: HealthyReport,
    fail: bool,
    delay: Duration,
    pub log: Arc<AnalysisLog>,
}

impl FakeAnalysis {
    pub fn returning(report: HealthyReport) -> Self {
        Self {
            report,
            fail: false,
            delay: Duration::ZERO,
            log: Arc::new(AnalysisLog::default()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::returning(report(0, "N/A"))
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    async fn respond(&self) -> Result<HealthyReport, AnalysisError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(AnalysisError::Status {
                status: 503,
                body: "overloaded".into(),
            });
        }
        Ok(self.report.clone())
    }
}

impl AnalysisClient for FakeAnalysis {
    async fn analyze_image(
        &self,
        credential: &str,
        _image: &CapturedImage,
        context: Option<&str>,
    ) -> Result<HealthyReport, AnalysisError> {
        self.log.credentials.lock().unwrap().push(credential.to_string());
        self.log
            .image_calls
            .lock()
            .unwrap()
            .push(context.map(str::to_string));
        self.respond().await
    }

    async fn analyze_text(&self, credential: &str, text: &str) -> Result<HealthyReport, AnalysisError> {
        self.log.credentials.lock().unwrap().push(credential.to_string());
        self.log.text_calls.lock().unwrap().push(text.to_string());
        self.respond().await
    }
}

pub fn report(score: u8, verdict: &str) -> HealthyReport {
    HealthyReport {
        product_name: "Choco Crunch".into(),
        barcode: None,
        product_image: None,
        score,
        sugar_grams: Some(28.0),
        protein_grams: Some(4.5),
        ingredients: vec![
            IngredientFinding {
                name: "Wheat flour".into(),
                risk: Risk::Safe,
                reason: None,
            },
            IngredientFinding {
                name: "Palm oil".into(),
                risk: Risk::Caution,
                reason: Some("saturated fat".into()),
            },
        ],
        analysis_text: "Sugar first, nutrition later.".into(),
        verdict: verdict.into(),
    }
}

// ── Listener ───────────────────────────────────────────────────────

/// The real session, plus a log of every state the scanner announced.
pub struct Recording {
    pub session: Session,
    pub states: Mutex<Vec<ScanState>>,
}

impl Recording {
    pub fn states(&self) -> Vec<ScanState> {
        self.states.lock().unwrap().clone()
    }
}

impl ScanListener for Recording {
    fn on_state(&self, state: ScanState) {
        self.states.lock().unwrap().push(state);
        self.session.on_state(state);
    }

    fn on_report(&self, report: HealthyReport) {
        self.session.on_report(report);
    }

    fn on_failure(&self, error: &ScanError) {
        self.session.on_failure(error);
    }
}

pub type TestScanner<F, R> = Scanner<F, R, FakeLookup, FakeAnalysis, Recording>;

pub const CREDENTIAL: &str = "test-key";

pub fn config() -> ScannerConfig {
    ScannerConfig {
        detection_interval: Duration::from_millis(50),
        feed_timeout: Duration::from_millis(8000),
        ..ScannerConfig::default()
    }
}

pub fn build<F, R>(
    feed: F,
    recognizer: R,
    lookup: FakeLookup,
    analysis: FakeAnalysis,
) -> (Arc<TestScanner<F, R>>, Arc<Recording>)
where
    F: FeedSource + 'static,
    R: CodeRecognizer + 'static,
{
    let recording = Arc::new(Recording {
        session: Session::load(Box::new(MemoryStore::with_value(CREDENTIAL))),
        states: Mutex::new(Vec::new()),
    });
    let scanner = Scanner::new(
        config(),
        CREDENTIAL,
        feed,
        Arc::new(recognizer),
        lookup,
        analysis,
        recording.clone(),
    );
    (Arc::new(scanner), recording)
}

/// Write bytes to a fresh temp file and return its path.
pub fn temp_upload(name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("hiw-upload-{}-{}", std::process::id(), name));
    std::fs::write(&path, bytes).unwrap();
    path
}
