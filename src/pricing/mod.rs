//! The pricing evaluator (spec.md §1: "deterministic price estimation …
//! pure function over a configuration blob"). Out of scope per spec.md §1
//! beyond its contract: `estimate(input, config) -> snapshot`. This is a
//! deliberately small stand-in for that external collaborator — just
//! enough for `POST /v1/estimate` and lead intake to have a real snapshot
//! to carry, not a pricing engine in its own right.

use serde_json::Value;

use crate::error::AppError;

/// `{ base_cents, bedrooms, bathrooms, deep_clean, sqft }` → a snapshot
/// containing the computed total and the inputs that produced it. The
/// snapshot is what `leads::NewLead::estimate_snapshot` carries — it must
/// stay a non-empty JSON object for `leads::intake`'s validation to accept
/// it.
pub fn estimate(input: &Value, config: &Value) -> Result<Value, AppError> {
    let bedrooms = input.get("bedrooms").and_then(Value::as_i64).unwrap_or(1).max(0);
    let bathrooms = input.get("bathrooms").and_then(Value::as_i64).unwrap_or(1).max(0);
    let sqft = input.get("sqft").and_then(Value::as_i64).unwrap_or(0).max(0);
    let deep_clean = input.get("deep_clean").and_then(Value::as_bool).unwrap_or(false);

    let base_cents = config.get("base_cents").and_then(Value::as_i64).unwrap_or(8000);
    let per_bedroom_cents = config.get("per_bedroom_cents").and_then(Value::as_i64).unwrap_or(1500);
    let per_bathroom_cents = config.get("per_bathroom_cents").and_then(Value::as_i64).unwrap_or(1000);
    let per_sqft_cents = config.get("per_sqft_cents").and_then(Value::as_i64).unwrap_or(4);
    let deep_clean_multiplier_pct = config.get("deep_clean_multiplier_pct").and_then(Value::as_i64).unwrap_or(140);

    let subtotal_cents =
        base_cents + bedrooms * per_bedroom_cents + bathrooms * per_bathroom_cents + sqft * per_sqft_cents;
    let total_cents = if deep_clean { subtotal_cents * deep_clean_multiplier_pct / 100 } else { subtotal_cents };

    Ok(serde_json::json!({
        "bedrooms": bedrooms,
        "bathrooms": bathrooms,
        "sqft": sqft,
        "deep_clean": deep_clean,
        "subtotal_cents": subtotal_cents,
        "total_cents": total_cents,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_clean_multiplies_the_subtotal() {
        let input = serde_json::json!({"bedrooms": 2, "bathrooms": 1, "sqft": 1000, "deep_clean": true});
        let plain = serde_json::json!({"bedrooms": 2, "bathrooms": 1, "sqft": 1000, "deep_clean": false});
        let config = serde_json::json!({});
        let deep = estimate(&input, &config).unwrap();
        let base = estimate(&plain, &config).unwrap();
        assert!(deep["total_cents"].as_i64().unwrap() > base["total_cents"].as_i64().unwrap());
    }

    #[test]
    fn negative_inputs_are_clamped_to_zero() {
        let input = serde_json::json!({"bedrooms": -5, "sqft": -100});
        let estimate = estimate(&input, &serde_json::json!({})).unwrap();
        assert_eq!(estimate["bedrooms"], 0);
        assert_eq!(estimate["sqft"], 0);
    }
}
