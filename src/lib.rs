//! HealthIsWealth: scan a food product, get a blunt health report.
//!
//! Library entry point. Domains:
//!   - capture/     : feed + recognizer ports, continuous detector, EAN-13 decoding
//!   - lookup/      : Open Food Facts product lookup
//!   - llm/         : Gemini structured analysis, prompts, schema, report types
//!   - pipeline.rs  : scan state machine (pipeline_text.rs: typed-name entry)
//!   - session.rs   : setup / acquisition / result views
//!   - settings.rs  : credential storage (OS keychain)

pub mod capture;
pub mod config;
pub mod error;
pub mod llm;
pub mod lookup;
pub mod pipeline;
mod pipeline_text;
pub mod session;
pub mod settings;

pub use config::ScannerConfig;
pub use error::ScanError;
pub use llm::{HealthyReport, IngredientFinding, Risk};
pub use pipeline::{AcquisitionMode, FailureReason, ScanListener, ScanState, Scanner};
pub use session::{Session, View};

/// Load `.env.local` → `.env` from the working directory, then start logging.
///
/// Safe to call more than once; only the first logger wins.
pub fn init() {
    let root = std::env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("."));

    'env_load: for env_file in [".env.local", ".env"] {
        let path = root.join(env_file);
        if path.exists() {
            match dotenvy::from_path(&path) {
                Ok(_) => eprintln!("[STARTUP] Loaded {}", path.display()),
                Err(e) => eprintln!("[STARTUP] Failed to load {}: {}", path.display(), e),
            }
            break 'env_load;
        }
    }

    let _ = env_logger::try_init();
}
