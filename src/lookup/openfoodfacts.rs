//! Open Food Facts product lookup.
//!
//! `GET {base}/api/v2/product/{code}.json`. A product is known only when the
//! payload says `status: 1` and carries a `product` object; everything else
//! (including a 2xx with status 0) is not found.

use super::ProductLookup;
use crate::capture::ProductCode;
use crate::config::ScannerConfig;
use crate::error::LookupError;
use reqwest::Url;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

const USER_AGENT: &str = concat!("healthiswealth/", env!("CARGO_PKG_VERSION"));

/// Normalized product record used to ground the analysis call.
///
/// Serializes with the database's own field names. That JSON is what the
/// model sees as context.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductContext {
    #[serde(rename = "product_name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "brands", skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingredients_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub nutriments: BTreeMap<String, f64>,
}

impl ProductContext {
    /// Build from a raw API payload. `None` unless the product is known.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        if payload.get("status").and_then(Value::as_i64) != Some(1) {
            return None;
        }
        let product = payload.get("product")?.as_object()?;
        let text = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| product.get(*k).and_then(Value::as_str))
                .map(str::trim)
                .find(|s| !s.is_empty())
                .map(str::to_string)
        };

        // Nutriment values come as numbers or numeric strings; units are
        // sibling keys ("sugars_unit") and are dropped here.
        let nutriments: BTreeMap<String, f64> = product
            .get("nutriments")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(key, value)| {
                        let number = match value {
                            Value::Number(n) => n.as_f64(),
                            Value::String(s) => s.trim().parse::<f64>().ok(),
                            _ => None,
                        }?;
                        number.is_finite().then(|| (key.clone(), number))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            name: text(&["product_name", "product_name_en"]),
            brand: text(&["brands"]),
            ingredients_text: text(&["ingredients_text", "ingredients_text_en"]),
            image_url: text(&["image_url"]),
            nutriments,
        })
    }

    /// JSON handed to the analysis prompt.
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            log::warn!("[LOOKUP] Could not serialize context: {}", e);
            String::from("{}")
        })
    }
}

pub struct OpenFoodFactsClient {
    client: reqwest::Client,
    base_url: String,
}

impl OpenFoodFactsClient {
    pub fn new(config: &ScannerConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.lookup_timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("[LOOKUP] Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });
        Self {
            client,
            base_url: config.lookup_base_url.clone(),
        }
    }

    fn product_url(&self, code: &ProductCode) -> Result<Url, LookupError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| LookupError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| LookupError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(["api", "v2", "product"])
            .push(&format!("{}.json", code));
        Ok(url)
    }

    async fn fetch(&self, code: &ProductCode) -> Result<ProductContext, LookupError> {
        let url = self.product_url(code)?;
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }
        let payload: Value = response.json().await?;
        ProductContext::from_payload(&payload).ok_or(LookupError::Unknown)
    }
}

impl ProductLookup for OpenFoodFactsClient {
    async fn lookup(&self, code: &ProductCode) -> Option<ProductContext> {
        let start = std::time::Instant::now();
        match self.fetch(code).await {
            Ok(context) => {
                log::info!(
                    "[LOOKUP] Found {} ({:?}) in {}ms",
                    code,
                    context.name,
                    start.elapsed().as_millis()
                );
                Some(context)
            }
            Err(e) => {
                log::info!(
                    "[LOOKUP] {} not found ({}) — image-only analysis",
                    code,
                    e
                );
                None
            }
        }
    }
}
