//! Recovering a HealthyReport from the model's text output.
//!
//! `responseSchema` should give clean JSON, but models still wrap output in
//! markdown fences now and then. Three strategies, in order:
//! 1. parse the text as-is
//! 2. parse the inside of a ```json / ``` fenced block
//! 3. parse the span from the first `{` to the last `}`

use super::types::HealthyReport;
use regex::Regex;
use std::sync::OnceLock;

fn json_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```json\s*([\s\S]*?)\s*```").expect("valid fence regex"))
}

fn any_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```\s*([\s\S]*?)\s*```").expect("valid fence regex"))
}

/// Strip a markdown code fence if present, returning the fenced body.
pub fn strip_code_fences(text: &str) -> Option<&str> {
    json_fence()
        .captures(text)
        .or_else(|| any_fence().captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// The substring from the first `{` to the last `}`, inclusive.
pub fn outer_braces(text: &str) -> Option<&str> {
    let open = text.find('{')?;
    let close = text.rfind('}')?;
    (open < close).then(|| &text[open..=close])
}

/// Parse model output, trying each recovery strategy in turn.
pub fn parse_report(text: &str) -> Result<HealthyReport, String> {
    let direct_err = match serde_json::from_str::<HealthyReport>(text.trim()) {
        Ok(report) => return Ok(report),
        Err(e) => e,
    };
    log::warn!("[LLM] Direct parse failed: {} — trying recovery", direct_err);

    if let Some(body) = strip_code_fences(text) {
        // A fence was present: its body is the answer or the answer is bad.
        return serde_json::from_str::<HealthyReport>(body).map_err(|e| {
            format!("fenced block is not a valid report: {}", e)
        });
    }

    if let Some(span) = outer_braces(text) {
        return serde_json::from_str::<HealthyReport>(span)
            .map_err(|e| format!("braced span is not a valid report: {}", e));
    }

    Err(format!("no JSON object found ({})", direct_err))
}
