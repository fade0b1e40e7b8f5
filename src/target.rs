//! Target phrase normalization
//!
//! Speech transcripts arrive as free-form phrases ("The bottles!",
//! "a cell phone"). Detector labels are bare lowercase nouns, so the
//! spoken phrase is reduced to that form before matching.

use serde::{Deserialize, Serialize};

/// Filler articles dropped from transcripts
const ARTICLES: [&str; 3] = ["the", "a", "an"];

/// A normalized detection target derived from a speech transcript
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target(String);

impl Target {
    /// Build a target from a raw speech transcript
    #[must_use]
    pub fn from_transcript(raw: &str) -> Self {
        Self(normalize(raw))
    }

    /// The normalized target string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An empty target disables matching but a scan loop still runs
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalize a raw transcript into a detector-friendly target label
///
/// Lowercases, drops filler articles, strips trailing punctuation from
/// each word, and trims a naive plural `s` from the final word. The
/// function is idempotent: `normalize(normalize(s)) == normalize(s)`.
#[must_use]
pub fn normalize(raw: &str) -> String {
    let lowered = raw.to_lowercase();

    let mut words: Vec<&str> = lowered
        .split_whitespace()
        .map(|w| w.trim_end_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty() && !ARTICLES.contains(w))
        .collect();

    if let Some(last) = words.last_mut() {
        let word: &str = *last;
        if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") {
            *last = &word[..word.len() - 1];
        }
    }

    words.join(" ")
}
