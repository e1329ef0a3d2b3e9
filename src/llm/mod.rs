//! LLM domain: structured product analysis.
//!
//! Public API for the analysis layer. External code should only use the
//! items exported here.
//!
//! - gemini.rs : Gemini Flash client (the one production provider)
//! - prompts.rs: system instruction + per-acquisition prompts
//! - schema.rs : response schema handed to the model
//! - parse.rs  : tolerant JSON recovery from model text
//! - types.rs  : HealthyReport and friends

mod gemini;
pub mod parse;
pub mod prompts;
pub mod schema;
pub mod types;

pub use gemini::GeminiAnalysisClient;
pub use types::{HealthyReport, IngredientFinding, Risk};

use crate::capture::CapturedImage;
use crate::error::AnalysisError;
use std::future::Future;

/// Port to the remote analysis service.
///
/// One call per acquisition. Implementations either return a complete
/// report or an error, never a partial one.
pub trait AnalysisClient: Send + Sync {
    /// Analyze a captured image. `context` is the serialized lookup record,
    /// when the code resolved to a known product.
    fn analyze_image(
        &self,
        credential: &str,
        image: &CapturedImage,
        context: Option<&str>,
    ) -> impl Future<Output = Result<HealthyReport, AnalysisError>> + Send;

    /// Analyze a typed product name or description.
    fn analyze_text(
        &self,
        credential: &str,
        text: &str,
    ) -> impl Future<Output = Result<HealthyReport, AnalysisError>> + Send;
}
