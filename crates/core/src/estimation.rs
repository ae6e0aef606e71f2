//! Structured estimation results produced by the external ML service.
//!
//! The raw service response is normalized into [`EstimationResult`] before
//! it is persisted on a completed task, so downstream consumers (the
//! meal-logging subsystem) never see the service's raw JSON shape.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// One detected food item with its estimated mass.
///
/// Materialized only as part of a completed task's result and owned by
/// it -- food items live and die with their parent task record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodItem {
    pub food_name: String,
    /// Estimated mass in grams.
    pub estimated_mass_g: f64,
    /// Model confidence in `[0.0, 1.0]`.
    pub confidence: f64,
    /// How the mass was verified (e.g. `"reference_object"`, `"depth"`).
    pub verification_method: String,
    /// Free-text model reasoning; may be empty.
    #[serde(default)]
    pub reasoning: String,
}

/// The structured payload of a completed estimation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimationResult {
    pub foods: Vec<FoodItem>,
    /// Sum of the per-item estimated masses, in grams.
    #[serde(default)]
    pub total_mass_g: f64,
}

impl EstimationResult {
    /// Normalize a raw service response into an [`EstimationResult`].
    ///
    /// The service must send an object with a `foods` array; anything
    /// else is a malformed response. `total_mass_g` is recomputed from
    /// the items when the service omits it.
    pub fn from_raw(raw: serde_json::Value) -> Result<Self, CoreError> {
        let mut result: EstimationResult = serde_json::from_value(raw)
            .map_err(|e| CoreError::Validation(format!("Malformed estimation result: {e}")))?;

        if result.total_mass_g == 0.0 {
            result.total_mass_g = result.foods.iter().map(|f| f.estimated_mass_g).sum();
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_parses_complete_response() {
        let raw = serde_json::json!({
            "foods": [
                {
                    "food_name": "apple",
                    "estimated_mass_g": 182.0,
                    "confidence": 0.91,
                    "verification_method": "reference_object",
                    "reasoning": "plate diameter used as scale"
                }
            ],
            "total_mass_g": 182.0
        });

        let result = EstimationResult::from_raw(raw).unwrap();
        assert_eq!(result.foods.len(), 1);
        assert_eq!(result.foods[0].food_name, "apple");
        assert_eq!(result.total_mass_g, 182.0);
    }

    #[test]
    fn from_raw_computes_missing_total() {
        let raw = serde_json::json!({
            "foods": [
                {
                    "food_name": "rice",
                    "estimated_mass_g": 210.0,
                    "confidence": 0.8,
                    "verification_method": "depth"
                },
                {
                    "food_name": "kimchi",
                    "estimated_mass_g": 45.5,
                    "confidence": 0.7,
                    "verification_method": "depth"
                }
            ]
        });

        let result = EstimationResult::from_raw(raw).unwrap();
        assert_eq!(result.total_mass_g, 255.5);
        // Omitted reasoning defaults to empty.
        assert!(result.foods[0].reasoning.is_empty());
    }

    #[test]
    fn from_raw_rejects_missing_foods_array() {
        let raw = serde_json::json!({ "mass": 100.0 });
        assert!(EstimationResult::from_raw(raw).is_err());
    }

    #[test]
    fn from_raw_rejects_non_object_response() {
        assert!(EstimationResult::from_raw(serde_json::json!("done")).is_err());
    }
}
