//! Deterministic lexical-overlap judge.
//!
//! Scores how much of the expected line's significant vocabulary the
//! candidate covered. Asymmetric by design: extra words the candidate added
//! do not penalize; missing expected words do.

use crate::judge::{FAIL_FEEDBACK, MatchResult, NO_SPEECH_FEEDBACK, PASS_FEEDBACK, SimilarityJudge};
use crate::normalize::normalize;
use async_trait::async_trait;
use tracing::debug;

/// Minimum coverage of expected significant tokens required to pass.
///
/// Tunable; values between 0.70 and 0.80 all behave reasonably for short
/// dialogue lines.
pub const OVERLAP_THRESHOLD: f32 = 0.70;

/// Token-coverage similarity judge. Pure; no I/O.
#[derive(Debug, Clone)]
pub struct LexicalJudge {
    threshold: f32,
}

impl LexicalJudge {
    /// Create a judge with the given coverage threshold.
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Coverage of the expected line by the candidate, in `0.0..=1.0`.
    ///
    /// Returns `1.0` when both sentences reduce to stop words only (trivially
    /// equal), `0.0` when only the expected side has content.
    pub fn coverage(&self, expected: &str, candidate: &str) -> f32 {
        let expected_tokens = normalize(expected);
        let candidate_tokens = normalize(candidate);
        if expected_tokens.is_empty() {
            return if candidate_tokens.is_empty() { 1.0 } else { 0.0 };
        }
        let hits = expected_tokens.intersection(&candidate_tokens).count();
        hits as f32 / expected_tokens.len() as f32
    }

    fn evaluate(&self, expected: &str, candidate: &str) -> MatchResult {
        if candidate.trim().is_empty() {
            // Never normalize empty input. Two silent sides match vacuously.
            if expected.trim().is_empty() {
                return MatchResult::pass(PASS_FEEDBACK);
            }
            return MatchResult::fail(NO_SPEECH_FEEDBACK);
        }

        let coverage = self.coverage(expected, candidate);
        debug!(coverage, threshold = self.threshold, "lexical judge scored attempt");
        if coverage >= self.threshold {
            MatchResult::pass(PASS_FEEDBACK)
        } else {
            MatchResult::fail(FAIL_FEEDBACK)
        }
    }
}

impl Default for LexicalJudge {
    fn default() -> Self {
        Self::new(OVERLAP_THRESHOLD)
    }
}

#[async_trait]
impl SimilarityJudge for LexicalJudge {
    async fn judge(&self, expected: &str, candidate: &str) -> MatchResult {
        self.evaluate(expected, candidate)
    }
}
