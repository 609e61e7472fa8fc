//! Similarity judging: did the transcribed attempt match the expected line?
//!
//! Two interchangeable strategies implement the same [`SimilarityJudge`]
//! contract:
//!
//! - [`lexical::LexicalJudge`] — deterministic token-coverage scoring against
//!   a fixed threshold. Pure, offline, no I/O.
//! - [`semantic::SemanticJudge`] — delegates the comparison to an external
//!   language-model capability, either as a strict binary classifier or as a
//!   richer critique that also flags grammar and proposes a corrected
//!   rendition of the attempt.
//!
//! Both strategies short-circuit on empty input and never surface an error to
//! the caller: every failure shape maps to a `passed = false` result with a
//! distinguishing feedback message.

pub mod lexical;
pub mod model;
pub mod semantic;

use std::sync::Arc;

use crate::config::{JudgeConfig, JudgeStrategy};
use crate::error::Result;
use async_trait::async_trait;

/// Outcome of one judge invocation. Created fresh per evaluation; immutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// Whether the attempt adequately matched the expected line.
    pub passed: bool,
    /// Human-readable feedback for the practitioner.
    pub feedback: String,
    /// Grammatically corrected rendition of the attempt.
    ///
    /// Populated only by the critique strategy, and only when the model
    /// judged the attempt's grammar imperfect.
    pub corrected: Option<String>,
}

impl MatchResult {
    /// A passing result with the given feedback.
    pub fn pass(feedback: impl Into<String>) -> Self {
        Self {
            passed: true,
            feedback: feedback.into(),
            corrected: None,
        }
    }

    /// A failing result with the given feedback.
    pub fn fail(feedback: impl Into<String>) -> Self {
        Self {
            passed: false,
            feedback: feedback.into(),
            corrected: None,
        }
    }
}

/// Feedback for an empty or whitespace-only attempt.
pub const NO_SPEECH_FEEDBACK: &str =
    "No speech was detected or it was unclear. Please try again.";

/// Feedback for a passing attempt.
pub const PASS_FEEDBACK: &str = "Good job! That's a good match.";

/// Feedback for a failing attempt.
pub const FAIL_FEEDBACK: &str =
    "That's not quite right. Please try matching the sentence more closely.";

/// Strategy contract: compare an expected sentence with a transcribed
/// candidate and produce a [`MatchResult`].
///
/// Implementations must not error out toward the caller; model and transport
/// failures are contained and reported as failing results.
#[async_trait]
pub trait SimilarityJudge: Send + Sync {
    /// Judge one attempt. At most one outbound model call per invocation;
    /// no automatic retries.
    async fn judge(&self, expected: &str, candidate: &str) -> MatchResult;
}

/// Build the configured judge strategy.
///
/// # Errors
///
/// Returns an error if the semantic strategy is selected but the model
/// endpoint configuration is incomplete.
pub fn build_judge(config: &JudgeConfig) -> Result<Arc<dyn SimilarityJudge>> {
    match config.strategy {
        JudgeStrategy::Lexical => Ok(Arc::new(lexical::LexicalJudge::new(
            config.overlap_threshold,
        ))),
        JudgeStrategy::SemanticBinary => {
            let model = model::HttpChatModel::from_config(&config.model)?;
            Ok(Arc::new(semantic::SemanticJudge::new(
                Arc::new(model),
                semantic::SemanticMode::Binary,
            )))
        }
        JudgeStrategy::SemanticCritique => {
            let model = model::HttpChatModel::from_config(&config.model)?;
            Ok(Arc::new(semantic::SemanticJudge::new(
                Arc::new(model),
                semantic::SemanticMode::Critique,
            )))
        }
    }
}
