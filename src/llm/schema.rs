//! Structured-output schema handed to the model with every analysis request.

use serde_json::json;

/// Response schema for the analysis call, in the service's OpenAPI subset.
///
/// Field names and the SAFE/CAUTION/DANGER enum must match `HealthyReport`.
pub fn report_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "productName": { "type": "STRING" },
            "barcode": { "type": "STRING", "nullable": true },
            "score": {
                "type": "NUMBER",
                "description": "Health score from 0 (worst) to 100 (best)"
            },
            "sugar_g": {
                "type": "NUMBER",
                "nullable": true,
                "description": "Total sugar in grams per serving"
            },
            "protein_g": {
                "type": "NUMBER",
                "nullable": true,
                "description": "Total protein in grams per serving"
            },
            "ingredients": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "name": { "type": "STRING" },
                        "risk": { "type": "STRING", "enum": ["SAFE", "CAUTION", "DANGER"] },
                        "reason": {
                            "type": "STRING",
                            "nullable": true,
                            "description": "Why is it dangerous or caution?"
                        }
                    },
                    "required": ["name", "risk"]
                },
                "description": "List of main ingredients with health risk assessment"
            },
            "nutritional_analysis": {
                "type": "STRING",
                "description": "A short, punchy paragraph analyzing the health benefits and risks."
            },
            "verdict": {
                "type": "STRING",
                "description": "A one or two word neo-brutalist style verdict (e.g. 'PURE TRASH', 'GOLD TIER', 'MID', 'POISON')."
            }
        },
        "required": ["productName", "score", "ingredients", "nutritional_analysis", "verdict"]
    })
}
