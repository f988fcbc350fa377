use super::{Attribute, Vocabulary};

/// Maps free text produced by a vision model onto a closed label set.
pub trait LabelMatcher: Send + Sync {
    /// Always returns a label from the attribute's vocabulary or its fallback.
    fn match_label(&self, attribute: Attribute, answer: &str) -> String;
}

/// Token lookup against the attribute's vocabulary, then its aliases,
/// then the fallback.
#[derive(Debug, Default, Clone, Copy)]
pub struct VocabularyMatcher;

impl LabelMatcher for VocabularyMatcher {
    fn match_label(&self, attribute: Attribute, answer: &str) -> String {
        match_vocabulary(answer, attribute.vocabulary()).to_string()
    }
}

/// First whitespace-delimited token of `answer` that is a vocabulary label.
/// Surrounding punctuation is ignored, except `-` which labels contain.
pub fn match_vocabulary(answer: &str, vocabulary: &Vocabulary) -> &'static str {
    let answer = answer.to_lowercase();

    let token_match = answer
        .split_whitespace()
        .map(|word| word.trim_matches(|c: char| c.is_ascii_punctuation() && c != '-'))
        .find_map(|word| vocabulary.labels.iter().copied().find(|label| *label == word));
    if let Some(label) = token_match {
        return label;
    }

    vocabulary
        .aliases
        .iter()
        .find(|(needle, _)| answer.contains(needle))
        .map(|(_, label)| *label)
        .unwrap_or(vocabulary.fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{CAP_COLORS, HAIR_COLORS, TOP_STYLES};

    #[test]
    fn test_exact_token() {
        assert_eq!(match_vocabulary("brown", &HAIR_COLORS), "brown");
        assert_eq!(match_vocabulary("the hair is gray", &HAIR_COLORS), "gray");
        assert_eq!(match_vocabulary("hoodie", &TOP_STYLES), "hoodie");
    }

    #[test]
    fn test_first_token_wins() {
        assert_eq!(match_vocabulary("red or blue", &CAP_COLORS), "red");
        assert_eq!(match_vocabulary("blue or red", &CAP_COLORS), "blue");
        assert_eq!(match_vocabulary("a shirt under a jacket", &TOP_STYLES), "shirt");
    }

    #[test]
    fn test_substring_is_not_a_token() {
        // "reddish" contains "red" but is not the word "red"
        assert_eq!(match_vocabulary("reddish", &HAIR_COLORS), "unknown");
        assert_eq!(match_vocabulary("blackish-brown", &HAIR_COLORS), "unknown");
    }

    #[test]
    fn test_punctuation_and_case() {
        assert_eq!(match_vocabulary("Blonde.", &HAIR_COLORS), "blonde");
        assert_eq!(match_vocabulary("'none'", &CAP_COLORS), "none");
        assert_eq!(match_vocabulary("T-Shirt!", &TOP_STYLES), "t-shirt");
    }

    #[test]
    fn test_top_aliases() {
        assert_eq!(match_vocabulary("tshirt", &TOP_STYLES), "t-shirt");
        // "shirt" is a label in its own right, so the spaced alias only
        // fires when no word matches
        assert_eq!(match_vocabulary("a plain t shirt", &TOP_STYLES), "shirt");
        assert_eq!(match_vocabulary("two t shirts", &TOP_STYLES), "t-shirt");
        assert_eq!(match_vocabulary("sweatshirt", &TOP_STYLES), "sweater");
    }

    #[test]
    fn test_token_beats_alias() {
        // "hoodie" is a token, so the sweatshirt alias never applies
        assert_eq!(match_vocabulary("sweatshirt hoodie", &TOP_STYLES), "hoodie");
    }

    #[test]
    fn test_fallbacks_never_empty() {
        for answer in ["", "   ", "purple", "i cannot tell"] {
            assert_eq!(match_vocabulary(answer, &HAIR_COLORS), "unknown");
            assert_eq!(match_vocabulary(answer, &CAP_COLORS), "none");
            assert_eq!(match_vocabulary(answer, &TOP_STYLES), "unknown");
        }
    }

    #[test]
    fn test_every_label_matches_itself() {
        for attribute in Attribute::ALL {
            let vocabulary = attribute.vocabulary();
            for label in vocabulary.labels {
                let answer = format!("it is {} today", label);
                assert_eq!(VocabularyMatcher.match_label(attribute, &answer), *label);
            }
        }
    }
}
