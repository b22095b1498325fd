//! The chat intent parser (spec.md §1: "rule-based chat that fills
//! structured inputs from natural text … pure over message + state"). Out
//! of scope beyond its contract: `advance(message, state) -> next_state`.
//! This is a small rule-based stand-in, not a natural-language system —
//! it recognizes a handful of keyword patterns well enough to drive
//! `POST /v1/chat/turn` toward a completed estimate input.

use serde_json::{json, Value};

/// One turn: given the caller's free-text `message` and the structured
/// `state` accumulated so far, fill in whatever slot the message answers
/// and report what's still missing.
pub fn advance(message: &str, state: &Value) -> Value {
    let mut filled = state.as_object().cloned().unwrap_or_default();
    let lower = message.to_lowercase();

    if let Some(n) = extract_number_before(&lower, &["bedroom", "bed"]) {
        filled.insert("bedrooms".to_string(), json!(n));
    }
    if let Some(n) = extract_number_before(&lower, &["bathroom", "bath"]) {
        filled.insert("bathrooms".to_string(), json!(n));
    }
    if let Some(n) = extract_number_before(&lower, &["sqft", "square foot", "square feet"]) {
        filled.insert("sqft".to_string(), json!(n));
    }
    if lower.contains("deep clean") || lower.contains("deep-clean") {
        filled.insert("deep_clean".to_string(), json!(true));
    }

    let required = ["bedrooms", "bathrooms", "sqft"];
    let missing: Vec<&str> = required.iter().copied().filter(|k| !filled.contains_key(*k)).collect();

    let prompt = match missing.first() {
        Some(&"bedrooms") => "How many bedrooms?",
        Some(&"bathrooms") => "How many bathrooms?",
        Some(&"sqft") => "About how many square feet?",
        _ => "Got it — ready to generate your estimate.",
    };

    json!({
        "state": Value::Object(filled),
        "missing": missing,
        "prompt": prompt,
        "complete": missing.is_empty(),
    })
}

/// Find the first integer token that appears before one of `keywords` in
/// `text` (e.g. "3 bedrooms" → `Some(3)` for `keywords = ["bedroom"]`).
fn extract_number_before(text: &str, keywords: &[&str]) -> Option<i64> {
    let words: Vec<&str> = text.split_whitespace().collect();
    for (idx, word) in words.iter().enumerate() {
        if keywords.iter().any(|kw| word.contains(kw)) {
            for back in (0..idx).rev().take(2) {
                if let Ok(n) = words[back].trim_matches(|c: char| !c.is_ascii_digit()).parse::<i64>() {
                    return Some(n);
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_bedrooms_from_free_text() {
        let result = advance("we have 3 bedrooms and 2 bathrooms", &json!({}));
        assert_eq!(result["state"]["bedrooms"], 3);
        assert_eq!(result["state"]["bathrooms"], 2);
    }

    #[test]
    fn reports_complete_once_all_required_slots_are_filled() {
        let state = json!({"bedrooms": 2, "bathrooms": 1, "sqft": 1200});
        let result = advance("that's everything", &state);
        assert_eq!(result["complete"], true);
    }

    #[test]
    fn prompts_for_the_next_missing_slot() {
        let result = advance("3 bedrooms", &json!({}));
        assert_eq!(result["missing"][0], "bathrooms");
    }
}
