//! Session state: which view the user is on and what it holds.
//!
//! Setup (no credential) → Acquisition → Result → Acquisition ...
//! Logout from anywhere goes back to Setup. The session is the scanner's
//! listener: a finished report moves it to Result.

use crate::error::{ScanError, SessionError};
use crate::llm::HealthyReport;
use crate::pipeline::{ScanListener, ScanState};
use crate::settings::{resolve_credential, CredentialStore};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Setup,
    Acquisition,
    Result,
}

struct SessionInner {
    view: View,
    credential: Option<String>,
    report: Option<HealthyReport>,
    scan_state: ScanState,
    last_error: Option<String>,
}

pub struct Session {
    store: Box<dyn CredentialStore>,
    inner: Mutex<SessionInner>,
}

impl Session {
    /// Start a session. A credential from the environment or the store
    /// skips setup.
    pub fn load(store: Box<dyn CredentialStore>) -> Self {
        let credential = resolve_credential(store.as_ref());
        let view = if credential.is_some() {
            View::Acquisition
        } else {
            View::Setup
        };
        log::info!("[SESSION] Loaded, view: {:?}", view);
        Self {
            store,
            inner: Mutex::new(SessionInner {
                view,
                credential,
                report: None,
                scan_state: ScanState::Idle,
                last_error: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn view(&self) -> View {
        self.lock().view
    }

    pub fn credential(&self) -> Option<String> {
        self.lock().credential.clone()
    }

    pub fn report(&self) -> Option<HealthyReport> {
        self.lock().report.clone()
    }

    /// Last state the scanner reported.
    pub fn scan_state(&self) -> ScanState {
        self.lock().scan_state
    }

    /// User-facing message of the last failed attempt, if any.
    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    /// Save the credential entered on the setup view.
    ///
    /// If the store cannot persist it, the key is still used for this run.
    pub fn submit_credential(&self, key: &str) -> Result<(), SessionError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(SessionError::CredentialRequired);
        }
        if let Err(e) = self.store.set(key) {
            log::warn!("[SESSION] Credential not persisted: {}", e);
        }
        let mut inner = self.lock();
        inner.credential = Some(key.to_string());
        inner.view = View::Acquisition;
        log::info!("[SESSION] Credential accepted ({} chars)", key.len());
        Ok(())
    }

    /// Leave the result view for a fresh acquisition.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.report = None;
        inner.last_error = None;
        inner.scan_state = ScanState::Idle;
        if inner.view == View::Result {
            inner.view = View::Acquisition;
        }
    }

    /// Forget the credential, locally and in the store.
    pub fn logout(&self) -> Result<(), SessionError> {
        self.store.delete()?;
        let mut inner = self.lock();
        inner.credential = None;
        inner.report = None;
        inner.last_error = None;
        inner.scan_state = ScanState::Idle;
        inner.view = View::Setup;
        log::info!("[SESSION] Logged out");
        Ok(())
    }
}

impl ScanListener for Session {
    fn on_state(&self, state: ScanState) {
        self.lock().scan_state = state;
    }

    fn on_report(&self, report: HealthyReport) {
        let mut inner = self.lock();
        if inner.view == View::Setup {
            log::info!("[SESSION] Report arrived after logout, dropping it");
            return;
        }
        log::info!("[SESSION] Report ready: {}", report.product_name);
        inner.report = Some(report);
        inner.last_error = None;
        inner.view = View::Result;
    }

    fn on_failure(&self, error: &ScanError) {
        self.lock().last_error = Some(error.to_string());
    }
}
