//! Rule-based booking-intent classification over call transcripts.
//!
//! The classifier is a pure function of the transcript text: phrase lists and
//! ordered regex pattern lists, no I/O and no model calls. Two signals gate the
//! overall verdict:
//!
//! - commitment: a strong booking phrase, or at least two distinct phrases from
//!   the broker verification script;
//! - grounding: a load-reference token, or a monetary rate inside the plausible
//!   freight range.
//!
//! `meets_intent_threshold` requires both, which suppresses false positives
//! from casual agreement words or stray numbers.

use regex::Regex;
use rust_decimal::Decimal;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntentWeights {
    pub strong_commitment: u32,
    pub verification_script: u32,
    pub load_reference: u32,
    pub rate_info: u32,
    pub carrier_name: u32,
    pub callback_needed: u32,
}

impl Default for IntentWeights {
    fn default() -> Self {
        Self {
            strong_commitment: 50,
            verification_script: 25,
            load_reference: 15,
            rate_info: 10,
            carrier_name: 5,
            callback_needed: 5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntentClassifierConfig {
    pub strong_commitment_phrases: Vec<String>,
    pub verification_phrases: Vec<String>,
    pub callback_phrases: Vec<String>,
    pub min_plausible_rate: i64,
    pub max_plausible_rate: i64,
    pub weights: IntentWeights,
}

impl Default for IntentClassifierConfig {
    fn default() -> Self {
        Self {
            strong_commitment_phrases: vec![
                "i'll take it".to_string(),
                "i will take it".to_string(),
                "we'll take it".to_string(),
                "we will take it".to_string(),
                "book it".to_string(),
                "book me".to_string(),
                "i'll do it".to_string(),
                "let's book it".to_string(),
                "i accept the load".to_string(),
                "we accept the load".to_string(),
                "sign me up".to_string(),
                "send the rate con".to_string(),
                "send me the rate con".to_string(),
            ],
            verification_phrases: vec![
                "mc number".to_string(),
                "dot number".to_string(),
                "verify your".to_string(),
                "confirm your company".to_string(),
                "confirm the rate".to_string(),
                "for verification".to_string(),
                "carrier packet".to_string(),
                "insurance certificate".to_string(),
            ],
            callback_phrases: vec![
                "call me back".to_string(),
                "call back later".to_string(),
                "give me a call".to_string(),
                "call me at".to_string(),
                "reach me at".to_string(),
            ],
            min_plausible_rate: 100,
            max_plausible_rate: 10_000,
            weights: IntentWeights::default(),
        }
    }
}

/// Result of one transcript classification. Extraction fields are best-effort
/// and independent of the threshold gate; a missed pattern yields `None`,
/// never an error.
#[derive(Clone, Debug, PartialEq)]
pub struct IntentAnalysis {
    pub score: u32,
    pub strong_commitment: bool,
    pub verification_script: bool,
    pub has_load_reference: bool,
    pub has_rate_info: bool,
    pub carrier_name: Option<String>,
    pub rate_offered: Option<Decimal>,
    pub rate_requested: Option<Decimal>,
    pub callback_needed: bool,
    pub load_reference: Option<String>,
    pub meets_intent_threshold: bool,
}

pub struct IntentClassifier {
    config: IntentClassifierConfig,
    load_reference_patterns: Vec<Regex>,
    spelled_load_pattern: Regex,
    rate_patterns: Vec<Regex>,
    rate_requested_patterns: Vec<Regex>,
    carrier_name_patterns: Vec<Regex>,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new(IntentClassifierConfig::default())
    }
}

impl IntentClassifier {
    /// Compiles the ordered pattern lists once. The declared order is
    /// load-bearing: extraction stops at the first pattern that yields a
    /// valid value, it never searches for a "best" match.
    pub fn new(config: IntentClassifierConfig) -> Self {
        let load_reference_patterns = compile(&[
            r"(?i)\bload\s*(?:number|#)?\s*(\d{3,6})\b",
            r"(?i)\breference\s*(?:number)?\s*(\d{3,6})\b",
        ]);
        let spelled_load_pattern = Regex::new(
            r"(?i)\bload\s+((?:(?:zero|one|two|three|four|five|six|seven|eight|nine)[\s-]*){3,6})",
        )
        .expect("spelled load pattern compiles");
        let rate_patterns = compile(&[
            r"\$\s*(\d{3,5})\b",
            r"(?i)\b(\d{3,5})\s*(?:dollars|bucks)\b",
            r"(?i)\brate\D{0,24}?(\d{3,5})\b",
        ]);
        let rate_requested_patterns = compile(&[
            r"(?i)\b(?:can you do|could you do|how about|i need|we need|i want)\s*\$?\s*(\d{3,5})\b",
            r"(?i)\bcounter(?:\s*offer)?\s*(?:at|of)?\s*\$?\s*(\d{3,5})\b",
        ]);
        let carrier_name_patterns = compile(&[
            r"(?i)\bcalling from\s+([a-z][a-z0-9&'\- ]{1,40}?\s(?:trucking|transport|transportation|logistics|freight|carriers|express))\b",
            r"(?i)\b(?:this is|i'm with|i am with|from)\s+([a-z][a-z0-9&'\- ]{1,40}?\s(?:trucking|transport|transportation|logistics|freight|carriers|express))\b",
            r"(?i)\b(?:company|carrier) name is\s+([a-z][a-z0-9&'\- ]{1,40})\b",
        ]);

        Self {
            config,
            load_reference_patterns,
            spelled_load_pattern,
            rate_patterns,
            rate_requested_patterns,
            carrier_name_patterns,
        }
    }

    pub fn config(&self) -> &IntentClassifierConfig {
        &self.config
    }

    pub fn analyze(&self, transcript: &str) -> IntentAnalysis {
        let normalized = transcript.to_lowercase();

        let strong_commitment = self
            .config
            .strong_commitment_phrases
            .iter()
            .any(|phrase| normalized.contains(phrase.as_str()));
        let verification_hits = self
            .config
            .verification_phrases
            .iter()
            .filter(|phrase| normalized.contains(phrase.as_str()))
            .count();
        let verification_script = verification_hits >= 2;

        let load_reference = self.extract_load_reference(transcript);
        let rate_offered = self.extract_rate_offered(transcript);
        let rate_requested = self.extract_rate_requested(transcript);
        let carrier_name = self.extract_carrier_name(transcript);
        let callback_needed =
            self.config.callback_phrases.iter().any(|phrase| normalized.contains(phrase.as_str()));

        let has_load_reference = load_reference.is_some();
        let has_rate_info = rate_offered.is_some();

        let commitment_signal = strong_commitment || verification_script;
        let grounding_signal = has_load_reference || has_rate_info;

        let weights = &self.config.weights;
        let mut score = 0u32;
        if strong_commitment {
            score += weights.strong_commitment;
        }
        if verification_script {
            score += weights.verification_script;
        }
        if has_load_reference {
            score += weights.load_reference;
        }
        if has_rate_info {
            score += weights.rate_info;
        }
        if carrier_name.is_some() {
            score += weights.carrier_name;
        }
        if callback_needed {
            score += weights.callback_needed;
        }

        IntentAnalysis {
            score,
            strong_commitment,
            verification_script,
            has_load_reference,
            has_rate_info,
            carrier_name,
            rate_offered,
            rate_requested,
            callback_needed,
            load_reference,
            meets_intent_threshold: commitment_signal && grounding_signal,
        }
    }

    fn extract_load_reference(&self, transcript: &str) -> Option<String> {
        for pattern in &self.load_reference_patterns {
            if let Some(captures) = pattern.captures(transcript) {
                if let Some(matched) = captures.get(1) {
                    return Some(matched.as_str().to_string());
                }
            }
        }

        self.spelled_load_pattern
            .captures(transcript)
            .and_then(|captures| captures.get(1))
            .map(|matched| spelled_digits_to_string(matched.as_str()))
            .filter(|digits| digits.len() >= 3)
    }

    fn extract_rate_offered(&self, transcript: &str) -> Option<Decimal> {
        first_bounded_amount(
            &self.rate_patterns,
            transcript,
            self.config.min_plausible_rate,
            self.config.max_plausible_rate,
        )
    }

    fn extract_rate_requested(&self, transcript: &str) -> Option<Decimal> {
        first_bounded_amount(
            &self.rate_requested_patterns,
            transcript,
            self.config.min_plausible_rate,
            self.config.max_plausible_rate,
        )
    }

    fn extract_carrier_name(&self, transcript: &str) -> Option<String> {
        for pattern in &self.carrier_name_patterns {
            if let Some(captures) = pattern.captures(transcript) {
                if let Some(matched) = captures.get(1) {
                    let name = matched.as_str().trim();
                    if !name.is_empty() {
                        return Some(name.to_string());
                    }
                }
            }
        }
        None
    }
}

fn compile(sources: &[&str]) -> Vec<Regex> {
    sources
        .iter()
        .map(|source| Regex::new(source).expect("intent pattern compiles"))
        .collect()
}

fn first_bounded_amount(
    patterns: &[Regex],
    transcript: &str,
    min: i64,
    max: i64,
) -> Option<Decimal> {
    for pattern in patterns {
        if let Some(captures) = pattern.captures(transcript) {
            if let Some(matched) = captures.get(1) {
                if let Ok(amount) = matched.as_str().parse::<i64>() {
                    if amount >= min && amount <= max {
                        return Some(Decimal::from(amount));
                    }
                }
            }
        }
    }
    None
}

fn spelled_digits_to_string(spelled: &str) -> String {
    spelled
        .split(|ch: char| ch.is_whitespace() || ch == '-')
        .filter_map(|word| match word.to_ascii_lowercase().as_str() {
            "zero" => Some('0'),
            "one" => Some('1'),
            "two" => Some('2'),
            "three" => Some('3'),
            "four" => Some('4'),
            "five" => Some('5'),
            "six" => Some('6'),
            "seven" => Some('7'),
            "eight" => Some('8'),
            "nine" => Some('9'),
            _ => None,
        })
        .collect()
}
