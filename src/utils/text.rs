//! Keyword and token helpers shared by plan validation and task matching.

use serde_json::Value;

/// Tokens this short ("a", "the", "and") carry too little signal for
/// constraint matching and are dropped.
const MAX_INSIGNIFICANT_LEN: usize = 3;

/// Serialize a JSON payload to lowercase text for keyword containment checks.
///
/// Matching happens against the full serialized form, field names included.
/// This is intentionally naive; see the plan tracker docs for the tradeoff.
pub fn searchable_text(value: &Value) -> String {
    value.to_string().to_lowercase()
}

/// Split a phrase into lowercase tokens longer than three characters.
pub fn significant_tokens(phrase: &str) -> Vec<String> {
    phrase
        .to_lowercase()
        .split_whitespace()
        .filter(|w| w.len() > MAX_INSIGNIFICANT_LEN)
        .map(|w| w.to_string())
        .collect()
}

/// Whether any word of `phrase` (of any length) appears in `text`.
pub fn shares_word(phrase: &str, text: &str) -> bool {
    phrase
        .to_lowercase()
        .split_whitespace()
        .any(|word| text.contains(word))
}

/// Fraction (0..=100) of `keywords` contained in `text`.
/// Returns `None` when the keyword list is empty.
pub fn containment_percentage(keywords: &[String], text: &str) -> Option<f64> {
    if keywords.is_empty() {
        return None;
    }
    let hits = keywords
        .iter()
        .filter(|kw| text.contains(&kw.to_lowercase()))
        .count();
    Some(hits as f64 / keywords.len() as f64 * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_searchable_text_lowercases() {
        let text = searchable_text(&json!({"Action": "Deploy API"}));
        assert!(text.contains("deploy api"));
        assert!(text.contains("action"));
    }

    #[test]
    fn test_significant_tokens_filters_short_words() {
        let tokens = significant_tokens("must include the disclaimer");
        assert_eq!(tokens, vec!["must", "include", "disclaimer"]);
    }

    #[test]
    fn test_shares_word() {
        assert!(shares_word("Implement parser", "we will implement the thing"));
        assert!(!shares_word("deploy service", "write unit tests"));
    }

    #[test]
    fn test_containment_percentage() {
        let kws = vec!["schema".to_string(), "api".to_string()];
        assert_eq!(containment_percentage(&kws, "design the api schema"), Some(100.0));
        assert_eq!(containment_percentage(&kws, "write some code"), Some(0.0));
        assert_eq!(containment_percentage(&[], "anything"), None);
    }
}
