//! Analysis response types: HealthyReport and IngredientFinding.
//!
//! These match the response schema in schema.rs field for field.
//! The model returns JSON that deserializes directly into these types;
//! `product_image` is never produced by the model, only injected afterwards
//! from the lookup context.

use serde::{Deserialize, Deserializer, Serialize};

/// The terminal artifact of one acquisition attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthyReport {
    #[serde(rename = "productName")]
    pub product_name: String,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_image: Option<String>,
    /// Always within 0..=100, see [`deserialize_score`].
    #[serde(deserialize_with = "deserialize_score")]
    pub score: u8,
    #[serde(rename = "sugar_g", default)]
    pub sugar_grams: Option<f64>,
    #[serde(rename = "protein_g", default)]
    pub protein_grams: Option<f64>,
    pub ingredients: Vec<IngredientFinding>,
    #[serde(rename = "nutritional_analysis")]
    pub analysis_text: String,
    pub verdict: String,
}

/// Per-ingredient risk classification.
///
/// The only vocabulary accepted from the model. Anything else fails the parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Risk {
    Safe,
    Caution,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientFinding {
    pub name: String,
    pub risk: Risk,
    #[serde(default)]
    pub reason: Option<String>,
}

impl IngredientFinding {
    /// The reason worth showing to the user.
    ///
    /// SAFE findings never render a reason; CAUTION/DANGER render one only
    /// when the model supplied a non-empty string.
    pub fn displayed_reason(&self) -> Option<&str> {
        match self.risk {
            Risk::Safe => None,
            Risk::Caution | Risk::Danger => self
                .reason
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty()),
        }
    }
}

impl HealthyReport {
    /// Take the product image from the lookup. The model never supplies one,
    /// so without a lookup image the field ends up unset.
    pub fn reconcile_image(&mut self, image_url: Option<&str>) {
        self.product_image = image_url.filter(|u| !u.is_empty()).map(str::to_string);
    }

    pub fn count_by_risk(&self, risk: Risk) -> usize {
        self.ingredients.iter().filter(|i| i.risk == risk).count()
    }
}

/// The schema declares `score` as a number, so the model may send 73.5 or 104.
/// Round and clamp into 0..=100; NaN/inf is not a score.
fn deserialize_score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    if !raw.is_finite() {
        return Err(serde::de::Error::custom("score is not a finite number"));
    }
    Ok(raw.round().clamp(0.0, 100.0) as u8)
}
