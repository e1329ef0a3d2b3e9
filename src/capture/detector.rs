//! Continuous detector: polls the live feed for a product code.
//!
//! One tokio task per live session, ticking at a fixed interval. Each tick
//! grabs the current frame and hands it to the recognizer. Frame-level
//! failures are swallowed and retried on the next tick. A code is reported
//! once per distinct detection; the same stable code is not re-reported.
//!
//! The scanner owns the returned handle and must stop it when the feed is
//! torn down. Stopping sets a flag checked before every callback, so a tick
//! already in flight cannot fire after teardown.

use super::{CodeRecognizer, DetectorCapability, LiveFeed, ProductCode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub struct ContinuousDetector<R> {
    recognizer: Arc<R>,
    interval: Duration,
}

/// Detector state for one live session.
///
/// `Unavailable` is permanent for the session: the host cannot recognize
/// codes, so only manual capture is offered. It is not an error.
#[derive(Debug)]
pub enum DetectorState {
    Running(DetectorHandle),
    Unavailable,
}

impl DetectorState {
    pub fn stop(&mut self) {
        if let DetectorState::Running(handle) = self {
            handle.stop();
        }
    }
}

/// Owner handle for a running detection loop. Dropping it stops the loop.
#[derive(Debug)]
pub struct DetectorHandle {
    stopped: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl DetectorHandle {
    pub fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
            log::info!("[DETECT] Detection loop stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst)
    }
}

impl Drop for DetectorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<R: CodeRecognizer + 'static> ContinuousDetector<R> {
    pub fn new(recognizer: Arc<R>, interval: Duration) -> Self {
        Self {
            recognizer,
            interval,
        }
    }

    /// Start polling `feed`, calling `on_code` for each distinct detection.
    ///
    /// Queries the recognizer's capability once; an unavailable recognizer
    /// yields `DetectorState::Unavailable` without spawning anything.
    pub fn start<F, C>(&self, feed: Arc<F>, on_code: C) -> DetectorState
    where
        F: LiveFeed + ?Sized + 'static,
        C: Fn(ProductCode) + Send + Sync + 'static,
    {
        if self.recognizer.capability() == DetectorCapability::Unavailable {
            log::info!("[DETECT] Code detection not supported on this host — manual capture only");
            return DetectorState::Unavailable;
        }

        let stopped = Arc::new(AtomicBool::new(false));
        let flag = stopped.clone();
        let recognizer = self.recognizer.clone();
        let interval = self.interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut last_emitted: Option<ProductCode> = None;

            loop {
                ticker.tick().await;
                if flag.load(Ordering::SeqCst) {
                    break;
                }
                let Some(frame) = feed.current_frame() else {
                    continue;
                };
                match recognizer.recognize(&frame) {
                    Ok(Some(code)) => {
                        if last_emitted.as_ref() == Some(&code) {
                            continue;
                        }
                        if flag.load(Ordering::SeqCst) {
                            break;
                        }
                        log::info!("[DETECT] Code detected: {}", code);
                        last_emitted = Some(code.clone());
                        on_code(code);
                    }
                    Ok(None) => {}
                    Err(e) => log::debug!("[DETECT] {}", e),
                }
            }
        });

        log::info!(
            "[DETECT] Detection loop started ({}ms interval)",
            interval.as_millis()
        );
        DetectorState::Running(DetectorHandle {
            stopped,
            task: Some(task),
        })
    }
}
