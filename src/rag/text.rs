//! Text helpers shared by strategies and the in-memory store

use std::collections::HashSet;

/// Maximum entities pulled from one query
pub const MAX_ENTITIES: usize = 5;

/// Lowercased terms, split on anything but alphanumerics and hyphens
pub fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '-')
        .map(|term| term.trim_matches('-'))
        .filter(|term| !term.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Fraction of distinct query terms present in `content` (0.0 to 1.0)
pub fn term_overlap(query_terms: &[String], content: &str) -> f32 {
    let wanted: HashSet<&str> = query_terms.iter().map(String::as_str).collect();
    if wanted.is_empty() {
        return 0.0;
    }
    let present: HashSet<String> = terms(content).into_iter().collect();
    let matched = wanted.iter().filter(|term| present.contains(**term)).count();
    matched as f32 / wanted.len() as f32
}

/// Token estimate: ceil(chars / 4)
pub fn estimate_tokens(text: &str) -> u64 {
    let chars = text.chars().count() as u64;
    (chars + 3) / 4
}

/// Heuristic named-entity extraction
///
/// A token counts as an entity when it carries a digit or an inner hyphen,
/// has more than one uppercase letter, or is capitalized mid-sentence.
pub fn extract_entities(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut entities = Vec::new();

    for (index, raw) in text.split_whitespace().enumerate() {
        let token = raw.trim_matches(|c: char| !c.is_alphanumeric() && c != '-');
        let token = token.trim_matches('-');
        if token.chars().count() < 2 {
            continue;
        }

        let has_digit = token.chars().any(|c| c.is_ascii_digit());
        let has_hyphen = token.contains('-');
        let uppercase = token.chars().filter(|c| c.is_uppercase()).count();
        let capitalized = token.chars().next().is_some_and(char::is_uppercase);

        let is_entity = has_digit || has_hyphen || uppercase > 1 || (capitalized && index > 0);
        if is_entity && seen.insert(token.to_lowercase()) {
            entities.push(token.to_string());
            if entities.len() == MAX_ENTITIES {
                break;
            }
        }
    }

    entities
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terms() {
        assert_eq!(
            terms("Glucose, trends (Type-2)!"),
            vec!["glucose", "trends", "type-2"]
        );
    }

    #[test]
    fn test_term_overlap() {
        let query = terms("glucose trends");
        assert_eq!(term_overlap(&query, "Glucose levels over time"), 0.5);
        assert_eq!(term_overlap(&query, "unrelated"), 0.0);
        assert_eq!(term_overlap(&[], "anything"), 0.0);
    }

    #[test]
    fn test_estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens(&"a".repeat(100)), 25);
    }

    #[test]
    fn test_extract_entities() {
        let entities = extract_entities("Compare HbA1c results for Metformin in Type-2 patients");
        assert_eq!(entities, vec!["HbA1c", "Metformin", "Type-2"]);
    }

    #[test]
    fn test_sentence_initial_capital_is_not_an_entity() {
        assert!(extract_entities("Glucose trends").is_empty());
    }

    #[test]
    fn test_entities_deduplicated_and_capped() {
        let entities = extract_entities("x FDA fda A1 B2 C3 D4 E5 F6");
        assert_eq!(entities.len(), MAX_ENTITIES);
        assert_eq!(entities[0], "FDA");
        assert_eq!(entities[1], "A1");
    }
}
