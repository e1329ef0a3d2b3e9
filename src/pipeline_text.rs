//! Text entry pipeline: analyzes a typed product name.
//!
//! Separate from the capture path in pipeline.rs: no feed, no frame, no
//! lookup. The scanner goes from a settled state straight to Analyzing and
//! makes exactly one `analyze_text` call.

use crate::capture::{CodeRecognizer, FeedSource};
use crate::error::ScanError;
use crate::llm::{AnalysisClient, HealthyReport};
use crate::lookup::ProductLookup;
use crate::pipeline::{AcquisitionMode, ScanListener, ScanState, Scanner};

impl<F, R, L, A, S> Scanner<F, R, L, A, S>
where
    F: FeedSource + 'static,
    R: CodeRecognizer + 'static,
    L: ProductLookup + 'static,
    A: AnalysisClient + 'static,
    S: ScanListener + 'static,
{
    /// Analyze free text. Switches the scanner to manual mode, releasing a
    /// live feed if one is up.
    ///
    /// Whitespace-only input is rejected; anything else goes to the model
    /// exactly as typed.
    pub async fn submit_text(&self, text: &str) -> Result<HealthyReport, ScanError> {
        if text.trim().is_empty() {
            return Err(ScanError::EmptyInput);
        }
        log::info!("[SCAN] Text input: {} chars", text.len());

        {
            let mut inner = self.lock();
            Self::admit(&inner)?;
            if matches!(inner.state, ScanState::Capturing | ScanState::Analyzing) {
                return Err(ScanError::NotReady { state: inner.state });
            }
            inner.busy = true;
            inner.release_feed();
            inner.generation += 1;
            inner.mode = AcquisitionMode::Manual;
            inner.state = ScanState::Analyzing;
        }
        self.notify(ScanState::Analyzing);

        let start = std::time::Instant::now();
        let result = self.analysis.analyze_text(&self.credential, text).await;
        log::info!("[SCAN] Text analysis: {}ms", start.elapsed().as_millis());

        self.finish(result)
    }
}
