//! Content Tier Classifier
//!
//! Priority-ordered keyword scan: RED keywords first, then YELLOW,
//! default GREEN. First match wins - this is a reliability routing
//! decision, not a weighted score. Pure and deterministic for a fixed
//! keyword configuration.

use crate::config::TierKeywords;
use crate::types::Tier;

pub struct TierClassifier {
    red: Vec<String>,
    yellow: Vec<String>,
}

impl TierClassifier {
    pub fn new(keywords: &TierKeywords) -> Self {
        Self {
            red: keywords.red.clone(),
            yellow: keywords.yellow.clone(),
        }
    }

    /// Classify text by keyword membership. RED wins over YELLOW even if
    /// both match.
    pub fn classify(&self, text: &str) -> Tier {
        if self.red.iter().any(|k| text.contains(k.as_str())) {
            return Tier::Red;
        }
        if self.yellow.iter().any(|k| text.contains(k.as_str())) {
            return Tier::Yellow;
        }
        Tier::Green
    }
}

impl Default for TierClassifier {
    fn default() -> Self {
        Self::new(&TierKeywords::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_red_keyword_wins() {
        let classifier = TierClassifier::default();
        assert_eq!(classifier.classify("The Breakdown Voltage is 60V"), Tier::Red);
    }

    #[test]
    fn test_red_beats_yellow_when_both_match() {
        let classifier = TierClassifier::default();
        // Contains both a YELLOW indicator ("Figure") and a RED keyword
        assert_eq!(
            classifier.classify("Figure 3 shows the Breakdown Voltage curve"),
            Tier::Red
        );
    }

    #[test]
    fn test_yellow_keyword() {
        let classifier = TierClassifier::default();
        assert_eq!(classifier.classify("See Table 2 for details"), Tier::Yellow);
    }

    #[test]
    fn test_default_is_green() {
        let classifier = TierClassifier::default();
        assert_eq!(classifier.classify("This chapter introduces the device"), Tier::Green);
    }

    #[test]
    fn test_deterministic() {
        let classifier = TierClassifier::default();
        let text = "LDMOS leakage discussion";
        assert_eq!(classifier.classify(text), classifier.classify(text));
    }

    #[test]
    fn test_custom_keyword_config() {
        let classifier = TierClassifier::new(&TierKeywords {
            red: vec!["critical".to_string()],
            yellow: vec![],
        });
        assert_eq!(classifier.classify("a critical value"), Tier::Red);
        assert_eq!(classifier.classify("Breakdown Voltage"), Tier::Green);
    }
}
