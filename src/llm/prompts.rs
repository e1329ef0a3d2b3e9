//! Analysis prompt constants.
//!
//! These prompts, together with the response schema in schema.rs, are the
//! contract between the scanner and the model. The risk vocabulary here
//! must stay identical to the schema enum.

/// System instruction: tone and ingredient classification rubric.
pub const SYSTEM_INSTRUCTION: &str = "You are the 'HealthyInformer'. You are a neo-brutalist nutritionist. You do not sugarcoat. You value high protein and low processed sugar. Your verdicts are short, loud, and aggressive. For ingredients, you must classify them as SAFE, CAUTION (for mild additives/sugar), or DANGER (for harmful chemicals, trans fats, high fructose corn syrup).";

/// Prompt for an image with no database context (vision only).
const IMAGE_PROMPT: &str = r#"Analyze this product image.
1. Identify the product name.
2. List main ingredients and classify their risk (SAFE/CAUTION/DANGER).
3. Calculate a health score (0-100) based on sugar, additives, and nutritional value. Be harsh.
4. Provide a brutal, honest verdict."#;

/// Builds the user prompt for an image analysis.
///
/// With lookup context, the model is told to trust the supplied data for
/// ingredients and nutrition and to use the image only for confirmation.
pub fn build_image_prompt(context_json: Option<&str>) -> String {
    match context_json {
        None => IMAGE_PROMPT.to_string(),
        Some(context) => format!(
            r#"I have scanned this product's barcode and retrieved the following data from Open Food Facts:
{context}

Using the image for visual confirmation and the DATA provided above for accuracy:
1. Analyze the ingredients and nutritional values from the data. Prefer the data over anything you infer from the image.
2. List ingredients and classify their risk (SAFE/CAUTION/DANGER).
3. Calculate a health score (0-100).
4. Provide a brutal, honest verdict."#
        ),
    }
}

/// Builds the user prompt for a typed product name or description.
pub fn build_text_prompt(text: &str) -> String {
    format!(
        r#"Analyze this product text/name: "{}". Infer nutritional data, list ingredients with risk (SAFE/CAUTION/DANGER), score it 0-100, and give a brutal verdict."#,
        text.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_prompt_prioritizes_supplied_data() {
        let prompt = build_image_prompt(Some(r#"{"product_name":"Cola"}"#));
        assert!(prompt.contains(r#"{"product_name":"Cola"}"#));
        assert!(prompt.contains("DATA provided above for accuracy"));
        assert!(prompt.contains("image for visual confirmation"));
    }

    #[test]
    fn plain_image_prompt_has_no_context_section() {
        let prompt = build_image_prompt(None);
        assert!(!prompt.contains("Open Food Facts"));
        assert!(prompt.contains("SAFE/CAUTION/DANGER"));
    }

    #[test]
    fn text_prompt_quotes_input() {
        let prompt = build_text_prompt("  Snickers Bar 50g ");
        assert!(prompt.contains(r#""Snickers Bar 50g""#));
    }
}
