//! Sentence normalization for lexical utterance matching.
//!
//! Reduces a raw sentence to its bag of significant tokens: lowercase,
//! contraction expansion, punctuation stripping, stop-word removal, and
//! deduplication. The output is a set — membership only, no order, no
//! multiplicity. A sentence made entirely of stop words normalizes to the
//! empty set, which is a valid result rather than an error.
//!
//! Pure and allocation-only; safe to call from any stage without locking.

use std::collections::HashSet;

/// Fixed table of common English contractions and their expansions.
///
/// Matched on whole words only (an apostrophe counts as a word character),
/// so `"scant"` is never corrupted by the `"can't"` entry.
const CONTRACTIONS: &[(&str, &str)] = &[
    ("i'm", "i am"),
    ("you're", "you are"),
    ("we're", "we are"),
    ("they're", "they are"),
    ("he's", "he is"),
    ("she's", "she is"),
    ("it's", "it is"),
    ("that's", "that is"),
    ("what's", "what is"),
    ("who's", "who is"),
    ("there's", "there is"),
    ("here's", "here is"),
    ("let's", "let us"),
    ("i've", "i have"),
    ("you've", "you have"),
    ("we've", "we have"),
    ("they've", "they have"),
    ("i'll", "i will"),
    ("you'll", "you will"),
    ("he'll", "he will"),
    ("she'll", "she will"),
    ("it'll", "it will"),
    ("we'll", "we will"),
    ("they'll", "they will"),
    ("i'd", "i would"),
    ("you'd", "you would"),
    ("he'd", "he would"),
    ("she'd", "she would"),
    ("we'd", "we would"),
    ("they'd", "they would"),
    ("won't", "will not"),
    ("can't", "can not"),
    ("don't", "do not"),
    ("doesn't", "does not"),
    ("didn't", "did not"),
    ("shouldn't", "should not"),
    ("couldn't", "could not"),
    ("wouldn't", "would not"),
    ("aren't", "are not"),
    ("isn't", "is not"),
    ("wasn't", "was not"),
    ("weren't", "were not"),
    ("hasn't", "has not"),
    ("haven't", "have not"),
    ("hadn't", "had not"),
];

/// Punctuation stripped after contraction expansion.
const PUNCTUATION: &[char] = &['.', ',', '?', '!', ';', ':', '"', '\''];

/// Function words dropped during normalization.
///
/// Pronouns, articles, auxiliary/linking verbs, prepositions, conjunctions,
/// and a few filler/light verbs that carry no content in short dialogue
/// lines. Membership is tuning policy: content words (nouns, main verbs,
/// adjectives, numbers) must survive.
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "cannot", "could", "did", "do", "does", "doing", "down", "during", "each", "few",
    "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "herself", "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its",
    "itself", "just", "let", "may", "me", "might", "more", "most", "must", "my", "myself", "no",
    "nor", "not", "now", "of", "off", "oh", "ok", "okay", "on", "once", "only", "onto", "or",
    "other", "our", "ours", "ourselves", "out", "over", "own", "sat", "shall", "she", "should",
    "so", "some", "such", "than", "that", "the", "their", "theirs", "them", "themselves", "then",
    "there", "these", "they", "this", "those", "through", "to", "too", "uh", "um", "under",
    "until", "up", "upon", "us", "very", "was", "we", "well", "were", "what", "when", "where",
    "which", "while", "who", "whom", "why", "will", "with", "would", "yeah", "yes", "you", "your",
    "yours", "yourself", "yourselves",
];

/// Returns `true` if `token` is on the stop-word list.
pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.binary_search(&token).is_ok()
}

/// Normalize a sentence into its set of significant tokens.
///
/// Steps, in order: lowercase, contraction expansion (whole-word), punctuation
/// stripping, whitespace tokenization, stop-word removal, deduplication.
pub fn normalize(sentence: &str) -> HashSet<String> {
    let lowered = sentence.to_lowercase();
    let expanded = expand_contractions(&lowered);
    let stripped: String = expanded.chars().filter(|c| !PUNCTUATION.contains(c)).collect();
    stripped
        .split_whitespace()
        .filter(|token| !is_stop_word(token))
        .map(str::to_owned)
        .collect()
}

/// Expand contractions against the fixed table, matching whole words only.
///
/// A word character is an ASCII alphanumeric or an apostrophe, so the scan
/// never rewrites substrings of longer words.
fn expand_contractions(sentence: &str) -> String {
    let mut out = String::with_capacity(sentence.len() + 16);
    let mut word = String::new();
    for ch in sentence.chars() {
        if ch.is_ascii_alphanumeric() || ch == '\'' {
            word.push(ch);
        } else {
            flush_word(&mut out, &word);
            word.clear();
            out.push(ch);
        }
    }
    flush_word(&mut out, &word);
    out
}

fn flush_word(out: &mut String, word: &str) {
    if word.is_empty() {
        return;
    }
    match CONTRACTIONS.iter().find(|(from, _)| *from == word) {
        Some((_, to)) => out.push_str(to),
        None => out.push_str(word),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(tokens: &[&str]) -> HashSet<String> {
        tokens.iter().map(|t| (*t).to_owned()).collect()
    }

    #[test]
    fn stop_word_table_is_sorted() {
        // Binary search membership relies on this.
        let mut sorted = STOP_WORDS.to_vec();
        sorted.sort_unstable();
        assert_eq!(STOP_WORDS, sorted.as_slice());
    }

    #[test]
    fn drops_stop_words_and_punctuation() {
        let tokens = normalize("The cat sat on the mat.");
        assert_eq!(tokens, set(&["cat", "mat"]));
        for token in &tokens {
            assert!(!is_stop_word(token));
            assert!(!token.contains(PUNCTUATION));
        }
    }

    #[test]
    fn keeps_content_words() {
        let tokens = normalize("I am going to the supermarket to buy apples.");
        assert_eq!(tokens, set(&["going", "supermarket", "buy", "apples"]));
    }

    #[test]
    fn contraction_equivalence() {
        assert_eq!(normalize("I'm happy"), normalize("I am happy"));
        assert_eq!(normalize("I'm happy"), set(&["happy"]));
    }

    #[test]
    fn expansion_matches_whole_words_only() {
        // "scant" must not be rewritten by the "can't" entry.
        assert_eq!(normalize("scant supplies won't last"), set(&["scant", "supplies", "last"]));
    }

    #[test]
    fn negative_contractions_expand() {
        assert_eq!(normalize("I don't know, she doesn't either"), set(&["know", "either"]));
        assert_eq!(normalize("won't"), HashSet::new());
    }

    #[test]
    fn empty_and_stop_only_normalize_to_empty_set() {
        assert!(normalize("").is_empty());
        assert!(normalize("   ").is_empty());
        assert!(normalize("it is, and they were!").is_empty());
    }

    #[test]
    fn deduplicates_tokens() {
        assert_eq!(normalize("coffee coffee coffee"), set(&["coffee"]));
    }

    #[test]
    fn idempotent_over_rejoined_output() {
        let sentences = [
            "Yes, I'm looking for apples.",
            "I'd like a medium latte, please.",
            "Excuse me, how can I get to the museum?",
            "He's a doctor. What about your family?",
        ];
        for sentence in sentences {
            let once = normalize(sentence);
            let rejoined = once.iter().cloned().collect::<Vec<_>>().join(" ");
            assert_eq!(normalize(&rejoined), once, "not idempotent for {sentence:?}");
        }
    }
}
