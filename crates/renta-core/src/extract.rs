//! Pattern-based field extraction from a user/assistant exchange.
//!
//! Extraction is deliberately narrow: only the rules in the table below ever
//! produce candidates. Income, deductions and address are filled in on the
//! review surface. To extract more, add a [`Rule`] to the table rather than
//! checking strings elsewhere in the pipeline.
//!
//! Extraction is a pure function of the message pair, so running it twice
//! over the same exchange yields the same candidates.

use crate::schema::Field;
use regex::Regex;

/// Phrase the assistant uses when it asks for the subject's full name
pub const FULL_NAME_TRIGGER: &str = "nombre completo";

/// Eight digits followed by a control letter (DNI shape)
pub const ID_TOKEN_PATTERN: &str = r"(?i)[0-9]{8}[a-z]";

/// A tentative value for a field, not yet merged into the form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionCandidate {
    pub field: Field,
    pub value: String,
}

impl ExtractionCandidate {
    pub fn new(field: Field, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }
}

/// One entry of the extraction rule table
#[derive(Debug, Clone)]
pub enum Rule {
    /// The first match of `pattern` anywhere in the user message becomes the
    /// value of `field`.
    UserToken { field: Field, pattern: Regex },

    /// When the assistant's message contains `trigger`, the user's reply is
    /// read as a full name: the first word goes to `first`, the remaining
    /// words (joined by one space) to `rest`. Single-word replies are ignored.
    NameOnPrompt {
        trigger: String,
        first: Field,
        rest: Field,
    },
}

impl Rule {
    fn apply(&self, user: &str, assistant: &str, out: &mut Vec<ExtractionCandidate>) {
        match self {
            Rule::UserToken { field, pattern } => {
                if let Some(m) = pattern.find(user) {
                    out.push(ExtractionCandidate::new(*field, m.as_str()));
                }
            }
            Rule::NameOnPrompt { trigger, first, rest } => {
                if !assistant.to_lowercase().contains(&trigger.to_lowercase()) {
                    return;
                }
                let words: Vec<&str> = user.split_whitespace().collect();
                if words.len() >= 2 {
                    out.push(ExtractionCandidate::new(*first, words[0]));
                    out.push(ExtractionCandidate::new(*rest, words[1..].join(" ")));
                }
            }
        }
    }
}

/// Runs the rule table over the newest exchange
#[derive(Debug, Clone)]
pub struct Extractor {
    rules: Vec<Rule>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::standard()
    }
}

impl Extractor {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// The production rule table: ID token and full name
    pub fn standard() -> Self {
        let id_pattern = Regex::new(ID_TOKEN_PATTERN).expect("ID token pattern is valid");
        Self::new(vec![
            Rule::UserToken {
                field: Field::Identification,
                pattern: id_pattern,
            },
            Rule::NameOnPrompt {
                trigger: FULL_NAME_TRIGGER.to_string(),
                first: Field::FirstName,
                rest: Field::LastName,
            },
        ])
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Candidates in rule-table order. An empty result is normal.
    pub fn extract(&self, user: &str, assistant: &str) -> Vec<ExtractionCandidate> {
        let mut candidates = Vec::new();
        for rule in &self.rules {
            rule.apply(user, assistant, &mut candidates);
        }
        tracing::debug!("Extracted {} candidate(s)", candidates.len());
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(user: &str, assistant: &str) -> Vec<ExtractionCandidate> {
        Extractor::standard().extract(user, assistant)
    }

    #[test]
    fn test_id_token_in_sentence() {
        let candidates = extract("Mi DNI es 12345678Z", "Gracias, ¿algo más?");
        assert_eq!(
            candidates,
            vec![ExtractionCandidate::new(Field::Identification, "12345678Z")]
        );
    }

    #[test]
    fn test_id_token_is_case_insensitive_and_kept_as_typed() {
        let candidates = extract("es 87654321x", "");
        assert_eq!(candidates[0].value, "87654321x");
    }

    #[test]
    fn test_only_first_id_token_is_used() {
        let candidates = extract("11111111A o quizá 22222222B", "");
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].value, "11111111A");
    }

    #[test]
    fn test_id_token_matches_across_the_whole_message() {
        // No word boundary is required around the token
        let candidates = extract("DNI:12345678Zeta", "");
        assert_eq!(candidates[0].value, "12345678Z");
    }

    #[test]
    fn test_short_number_is_not_an_id() {
        assert!(extract("Tengo 1234567 euros", "").is_empty());
    }

    #[test]
    fn test_full_name_after_trigger() {
        let candidates = extract(
            "Juan Pérez García",
            "Perfecto. ¿Me podrías indicar tu nombre completo?",
        );
        assert_eq!(
            candidates,
            vec![
                ExtractionCandidate::new(Field::FirstName, "Juan"),
                ExtractionCandidate::new(Field::LastName, "Pérez García"),
            ]
        );
    }

    #[test]
    fn test_full_name_collapses_whitespace() {
        let candidates = extract("  Ana   María\tRuiz ", "Dime tu Nombre Completo");
        assert_eq!(candidates[0].value, "Ana");
        assert_eq!(candidates[1].value, "María Ruiz");
    }

    #[test]
    fn test_single_word_name_is_ignored() {
        assert!(extract("Juan", "¿Cuál es tu nombre completo?").is_empty());
    }

    #[test]
    fn test_name_needs_trigger() {
        assert!(extract("Juan Pérez", "¿Dónde vives?").is_empty());
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let extractor = Extractor::standard();
        let first = extractor.extract("Soy 12345678Z", "tu nombre completo");
        let second = extractor.extract("Soy 12345678Z", "tu nombre completo");
        assert_eq!(first, second);
    }

    #[test]
    fn test_custom_rule_table() {
        let extractor = Extractor::new(vec![Rule::UserToken {
            field: Field::PostalCode,
            pattern: Regex::new(r"\b[0-9]{5}\b").unwrap(),
        }]);
        let candidates = extractor.extract("Vivo en el 41001", "");
        assert_eq!(candidates, vec![ExtractionCandidate::new(Field::PostalCode, "41001")]);
    }
}
