//! Query keyword extraction.
//!
//! Turns a raw user question into the set of normalized terms that the local
//! knowledge store matches against. No I/O, no network.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\p{L}\p{N}'’]+").expect("token regex is valid"));

/// English stop-words dropped from queries.
const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "almost", "also", "am", "among",
    "an", "and", "any", "are", "around", "as", "at", "be", "became", "because", "been", "before",
    "being", "below", "between", "both", "but", "by", "can", "cannot", "could", "did", "do",
    "does", "doing", "done", "down", "during", "each", "either", "else", "enough", "even",
    "ever", "every", "few", "for", "from", "further", "get", "give", "go", "had", "has", "have",
    "having", "he", "her", "here", "hers", "herself", "him", "himself", "his", "how", "however",
    "i", "if", "in", "into", "is", "it", "its", "itself", "just", "least", "less", "made",
    "make", "many", "may", "me", "might", "more", "most", "much", "must", "my", "myself",
    "neither", "never", "no", "nor", "not", "nothing", "now", "of", "off", "often", "on",
    "once", "one", "only", "or", "other", "others", "otherwise", "our", "ours", "ourselves",
    "out", "over", "own", "please", "put", "quite", "rather", "really", "regarding", "same",
    "say", "see", "seem", "seems", "several", "she", "should", "show", "since", "so", "some",
    "something", "still", "such", "take", "tell", "than", "that", "the", "their", "theirs",
    "them", "themselves", "then", "there", "these", "they", "this", "those", "though",
    "through", "thus", "to", "too", "toward", "under", "until", "up", "upon", "us", "used",
    "using", "various", "very", "via", "was", "we", "well", "were", "what", "whatever", "when",
    "where", "whether", "which", "while", "who", "whole", "whom", "whose", "why", "will",
    "with", "within", "without", "would", "yet", "you", "your", "yours", "yourself",
    "yourselves",
];

/// Suffixes removed by [`Stemming::Light`], longest first.
const LIGHT_SUFFIXES: &[&str] = &["ings", "ing", "ed", "es", "s"];

/// Minimum stem length kept after suffix stripping.
const MIN_STEM_LEN: usize = 3;

/// How extracted tokens are reduced before matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stemming {
    /// Keep the token text as-is.
    #[default]
    Exact,
    /// Strip common English suffixes ("molding" -> "mold").
    Light,
}

impl Stemming {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "exact" | "none" => Some(Stemming::Exact),
            "light" | "stem" => Some(Stemming::Light),
            _ => None,
        }
    }

    /// Reduce one lower-cased token the way [`KeywordExtractor::extract`] does.
    pub fn apply<'a>(&self, token: &'a str) -> &'a str {
        match self {
            Stemming::Exact => token,
            Stemming::Light => light_stem(token),
        }
    }
}

/// Deduplicated, lower-cased query terms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordSet(BTreeSet<String>);

impl KeywordSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, keyword: impl Into<String>) -> bool {
        self.0.insert(keyword.into().to_lowercase())
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.0.contains(keyword)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for KeywordSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = KeywordSet::new();
        for keyword in iter {
            set.insert(keyword);
        }
        set
    }
}

impl fmt::Display for KeywordSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.iter().collect();
        write!(f, "{{{}}}", joined.join(", "))
    }
}

/// Stop-word based keyword extractor.
#[derive(Debug, Clone)]
pub struct KeywordExtractor {
    stopwords: HashSet<&'static str>,
    stemming: Stemming,
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl KeywordExtractor {
    pub fn new() -> Self {
        Self::with_stemming(Stemming::Exact)
    }

    pub fn with_stemming(stemming: Stemming) -> Self {
        Self {
            stopwords: STOPWORDS.iter().copied().collect(),
            stemming,
        }
    }

    pub fn stemming(&self) -> Stemming {
        self.stemming
    }

    /// Extract keywords from free text.
    pub fn extract(&self, query: &str) -> KeywordSet {
        let lowered = query.to_lowercase();
        let mut keywords = KeywordSet::new();

        for token in TOKEN_RE.find_iter(&lowered).map(|m| m.as_str()) {
            let token = strip_possessive(token);
            if token.is_empty() || !token.chars().all(char::is_alphabetic) {
                continue;
            }
            if self.stopwords.contains(token) {
                continue;
            }
            keywords.insert(self.stemming.apply(token));
        }

        debug!(%keywords, stemming = ?self.stemming, "extracted query keywords");
        keywords
    }
}

fn strip_possessive(token: &str) -> &str {
    token
        .strip_suffix("'s")
        .or_else(|| token.strip_suffix("’s"))
        .unwrap_or(token)
}

fn light_stem(token: &str) -> &str {
    if token.ends_with("ss") {
        return token;
    }
    for suffix in LIGHT_SUFFIXES {
        if let Some(stem) = token.strip_suffix(suffix) {
            if stem.chars().count() >= MIN_STEM_LEN {
                return stem;
            }
        }
    }
    token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_content_words_and_drops_stopwords() {
        let extractor = KeywordExtractor::new();
        let keywords = extractor.extract("What is silicone molding?");

        assert!(keywords.contains("silicone"));
        assert!(keywords.contains("molding"));
        assert!(!keywords.contains("what"));
        assert!(!keywords.contains("is"));
        assert_eq!(keywords.len(), 2);
    }

    #[test]
    fn lowercases_and_deduplicates() {
        let extractor = KeywordExtractor::new();
        let keywords = extractor.extract("Silicone SILICONE silicone");
        assert_eq!(keywords.len(), 1);
        assert!(keywords.contains("silicone"));
    }

    #[test]
    fn drops_tokens_that_are_not_purely_alphabetic() {
        let extractor = KeywordExtractor::new();
        let keywords = extractor.extract("3D printing of PneuNets v2 don't");

        assert!(keywords.contains("printing"));
        assert!(keywords.contains("pneunets"));
        assert!(!keywords.contains("3d"));
        assert!(!keywords.contains("v2"));
        assert!(!keywords.iter().any(|k| k.starts_with("don")));
    }

    #[test]
    fn strips_possessive_suffix() {
        let extractor = KeywordExtractor::new();
        let keywords = extractor.extract("the actuator's skin");
        assert!(keywords.contains("actuator"));
        assert!(keywords.contains("skin"));
    }

    #[test]
    fn empty_and_punctuation_only_queries_yield_no_keywords() {
        let extractor = KeywordExtractor::new();
        assert!(extractor.extract("").is_empty());
        assert!(extractor.extract("?!... --- ,,,").is_empty());
    }

    #[test]
    fn light_stemming_reduces_common_suffixes() {
        let extractor = KeywordExtractor::with_stemming(Stemming::Light);
        let keywords = extractor.extract("molding elastomers castings processes");

        assert!(keywords.contains("mold"));
        assert!(keywords.contains("elastomer"));
        assert!(keywords.contains("cast"));
        assert!(keywords.contains("process"));
    }

    #[test]
    fn light_stemming_keeps_short_stems_intact() {
        assert_eq!(light_stem("uses"), "use");
        assert_eq!(light_stem("gas"), "gas");
        assert_eq!(light_stem("stress"), "stress");
    }

    #[test]
    fn apply_matches_extracted_keywords() {
        assert_eq!(Stemming::Light.apply("molding"), "mold");
        assert_eq!(Stemming::Light.apply("mold"), "mold");
        assert_eq!(Stemming::Exact.apply("molding"), "molding");
    }

    #[test]
    fn stemming_parse() {
        assert_eq!(Stemming::parse("exact"), Some(Stemming::Exact));
        assert_eq!(Stemming::parse(" Light "), Some(Stemming::Light));
        assert_eq!(Stemming::parse("lemma"), None);
    }

    #[test]
    fn keyword_set_display_is_sorted() {
        let set: KeywordSet = ["molding", "Casting"].into_iter().collect();
        assert_eq!(set.to_string(), "{casting, molding}");
    }
}
