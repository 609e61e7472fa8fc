//! LLM-backed semantic similarity judge.
//!
//! Delegates the expected-vs-transcribed comparison to an external
//! [`SimilarityModel`] capability in one of two modes:
//!
//! - [`SemanticMode::Binary`] — the model is instructed to answer with
//!   exactly `CORRECT` or `INCORRECT`.
//! - [`SemanticMode::Critique`] — the model returns a JSON critique that
//!   additionally flags grammar issues and proposes a corrected rendition of
//!   the attempt.
//!
//! This module is the main error-containment boundary of the system: a model
//! reply that matches neither keyword, structured output that fails schema
//! validation, and a failed capability call all map to a safe
//! `passed = false` result instead of propagating an error. An uncontained
//! failure here would otherwise strand the session controller mid-evaluation.

use std::sync::Arc;

use crate::judge::model::SimilarityModel;
use crate::judge::{FAIL_FEEDBACK, MatchResult, NO_SPEECH_FEEDBACK, PASS_FEEDBACK, SimilarityJudge};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

/// Feedback when the model reply matched neither keyword nor schema.
pub const UNPARSEABLE_FEEDBACK: &str =
    "I couldn't determine if that was correct. Please try speaking again clearly.";

/// Feedback when the model capability itself failed (timeout, transport, quota).
pub const UNAVAILABLE_FEEDBACK: &str =
    "There was an unexpected problem analyzing your speech. Please try again.";

/// Which reply shape the model is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticMode {
    /// Strict two-token classification: `CORRECT` / `INCORRECT`.
    Binary,
    /// Structured critique with grammar assessment and optional correction.
    Critique,
}

/// Structured reply expected from the model in critique mode.
#[derive(Debug, Deserialize)]
struct CritiqueReply {
    is_correct: bool,
    feedback: String,
    #[serde(default)]
    corrected_transcription: Option<String>,
}

/// Semantic similarity judge over an injected model capability.
pub struct SemanticJudge {
    model: Arc<dyn SimilarityModel>,
    mode: SemanticMode,
}

impl SemanticJudge {
    /// Create a judge for the given model capability and reply mode.
    pub fn new(model: Arc<dyn SimilarityModel>, mode: SemanticMode) -> Self {
        Self { model, mode }
    }

    fn binary_prompt(expected: &str, candidate: &str) -> String {
        format!(
            "You are an AI assistant. Your task is to compare two sentences: an \
             \"Expected Sentence\" and a \"Transcribed Sentence\".\n\n\
             Determine if the \"Transcribed Sentence\" is substantially similar to the \
             \"Expected Sentence\". \"Substantially similar\" means that the core meaning \
             is the same and most of the important words are present, even if there are \
             minor grammatical differences, or some small words are missing or different. \
             This should be roughly equivalent to an 80% match or higher.\n\n\
             Expected Sentence: {expected}\n\
             Transcribed Sentence: {candidate}\n\n\
             Respond with ONLY the word \"CORRECT\" if the sentences are substantially similar.\n\
             Respond with ONLY the word \"INCORRECT\" if they are not.\n\
             Do not provide any other explanation or text."
        )
    }

    fn critique_prompt(expected: &str, candidate: &str) -> String {
        format!(
            "You are an English practice coach. Compare two sentences: an \
             \"Expected Sentence\" and a \"Transcribed Sentence\".\n\n\
             First decide whether the \"Transcribed Sentence\" is substantially similar to \
             the \"Expected Sentence\" (core meaning preserved, most important words \
             present, minor grammatical variance tolerated; roughly an 80% match or \
             higher). Then assess whether the grammar of the \"Transcribed Sentence\" is \
             acceptable; if it is not, produce a grammatically corrected version that \
             keeps the meaning intact.\n\n\
             Expected Sentence: {expected}\n\
             Transcribed Sentence: {candidate}\n\n\
             Reply with ONLY a JSON object, no other text, in exactly this shape:\n\
             {{\"is_correct\": <true|false>, \"feedback\": \"<one or two encouraging \
             sentences for the learner>\", \"corrected_transcription\": \"<corrected \
             sentence, or null if the grammar was already acceptable>\"}}"
        )
    }

    fn parse_binary(reply: &str) -> MatchResult {
        match reply.trim().to_ascii_uppercase().as_str() {
            "CORRECT" => MatchResult::pass(PASS_FEEDBACK),
            "INCORRECT" => MatchResult::fail(FAIL_FEEDBACK),
            other => {
                warn!(reply = other, "model returned neither CORRECT nor INCORRECT");
                MatchResult::fail(UNPARSEABLE_FEEDBACK)
            }
        }
    }

    fn parse_critique(reply: &str, candidate: &str) -> MatchResult {
        let stripped = strip_code_fences(reply);
        let parsed: CritiqueReply = match serde_json::from_str(stripped) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "model critique failed schema validation");
                return MatchResult::fail(UNPARSEABLE_FEEDBACK);
            }
        };

        // A correction equal to the attempt means the grammar was acceptable.
        let corrected = parsed
            .corrected_transcription
            .map(|c| c.trim().to_owned())
            .filter(|c| !c.is_empty() && c != candidate.trim());

        MatchResult {
            passed: parsed.is_correct,
            feedback: if parsed.feedback.trim().is_empty() {
                if parsed.is_correct { PASS_FEEDBACK } else { FAIL_FEEDBACK }.to_owned()
            } else {
                parsed.feedback
            },
            corrected,
        }
    }
}

#[async_trait]
impl SimilarityJudge for SemanticJudge {
    async fn judge(&self, expected: &str, candidate: &str) -> MatchResult {
        if candidate.trim().is_empty() {
            if expected.trim().is_empty() {
                return MatchResult::pass(PASS_FEEDBACK);
            }
            return MatchResult::fail(NO_SPEECH_FEEDBACK);
        }

        let prompt = match self.mode {
            SemanticMode::Binary => Self::binary_prompt(expected, candidate),
            SemanticMode::Critique => Self::critique_prompt(expected, candidate),
        };

        match self.model.complete(&prompt).await {
            Ok(reply) => {
                debug!(mode = ?self.mode, "model reply: {reply}");
                match self.mode {
                    SemanticMode::Binary => Self::parse_binary(&reply),
                    SemanticMode::Critique => Self::parse_critique(&reply, candidate),
                }
            }
            Err(e) => {
                warn!("similarity model unavailable: {e}");
                MatchResult::fail(UNAVAILABLE_FEEDBACK)
            }
        }
    }
}

/// Strip a Markdown code fence wrapper, if present, from a model reply.
fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PracticeError, Result};
    use std::sync::Mutex;

    /// Model fake that replays scripted outcomes in order.
    struct ScriptedModel {
        replies: Mutex<Vec<Result<String>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<String>>) -> Self {
            let mut replies = replies;
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().map(|c| c.len()).unwrap_or(0)
        }
    }

    #[async_trait]
    impl SimilarityModel for ScriptedModel {
        async fn complete(&self, prompt: &str) -> Result<String> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(prompt.to_owned());
            }
            self.replies
                .lock()
                .ok()
                .and_then(|mut r| r.pop())
                .unwrap_or_else(|| Err(PracticeError::Judge("script exhausted".into())))
        }
    }

    fn judge_with(replies: Vec<Result<String>>, mode: SemanticMode) -> (SemanticJudge, Arc<ScriptedModel>) {
        let model = Arc::new(ScriptedModel::new(replies));
        (SemanticJudge::new(Arc::clone(&model) as Arc<dyn SimilarityModel>, mode), model)
    }

    #[tokio::test]
    async fn binary_correct_passes() {
        let (judge, model) = judge_with(vec![Ok("CORRECT".into())], SemanticMode::Binary);
        let result = judge.judge("Great, thank you!", "great thank you").await;
        assert!(result.passed);
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn binary_tolerates_whitespace_and_case() {
        let (judge, _) = judge_with(vec![Ok("  correct \n".into())], SemanticMode::Binary);
        assert!(judge.judge("a", "b").await.passed);
    }

    #[tokio::test]
    async fn binary_incorrect_fails() {
        let (judge, _) = judge_with(vec![Ok("INCORRECT".into())], SemanticMode::Binary);
        let result = judge.judge("Great, thank you!", "grapes").await;
        assert!(!result.passed);
        assert_eq!(result.feedback, FAIL_FEEDBACK);
    }

    #[tokio::test]
    async fn binary_free_text_maps_to_unparseable() {
        let (judge, _) = judge_with(
            vec![Ok("The sentences are fairly close in meaning.".into())],
            SemanticMode::Binary,
        );
        let result = judge.judge("a", "b").await;
        assert!(!result.passed);
        assert_eq!(result.feedback, UNPARSEABLE_FEEDBACK);
    }

    #[tokio::test]
    async fn transport_failure_maps_to_unavailable() {
        let (judge, _) = judge_with(
            vec![Err(PracticeError::Judge("timeout".into()))],
            SemanticMode::Binary,
        );
        let result = judge.judge("a", "b").await;
        assert!(!result.passed);
        assert_eq!(result.feedback, UNAVAILABLE_FEEDBACK);
    }

    #[tokio::test]
    async fn empty_candidate_short_circuits_without_a_model_call() {
        let (judge, model) = judge_with(vec![], SemanticMode::Binary);
        let result = judge.judge("Hello there", "   ").await;
        assert!(!result.passed);
        assert_eq!(result.feedback, NO_SPEECH_FEEDBACK);
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn critique_with_correction() {
        let reply = serde_json::json!({
            "is_correct": true,
            "feedback": "Close! Watch the article before 'latte'.",
            "corrected_transcription": "I'd like a medium latte, please."
        })
        .to_string();
        let (judge, _) = judge_with(vec![Ok(reply)], SemanticMode::Critique);
        let result = judge
            .judge("I'd like a medium latte, please.", "I like medium latte please")
            .await;
        assert!(result.passed);
        assert_eq!(
            result.corrected.as_deref(),
            Some("I'd like a medium latte, please.")
        );
    }

    #[tokio::test]
    async fn critique_omits_correction_when_grammar_was_acceptable() {
        let reply = serde_json::json!({
            "is_correct": true,
            "feedback": "Well done.",
            "corrected_transcription": null
        })
        .to_string();
        let (judge, _) = judge_with(vec![Ok(reply)], SemanticMode::Critique);
        let result = judge.judge("Great, thank you!", "great thank you").await;
        assert!(result.passed);
        assert!(result.corrected.is_none());
    }

    #[tokio::test]
    async fn critique_drops_correction_identical_to_attempt() {
        let reply = serde_json::json!({
            "is_correct": true,
            "feedback": "Nice.",
            "corrected_transcription": "great thank you"
        })
        .to_string();
        let (judge, _) = judge_with(vec![Ok(reply)], SemanticMode::Critique);
        let result = judge.judge("Great, thank you!", "great thank you").await;
        assert!(result.corrected.is_none());
    }

    #[tokio::test]
    async fn critique_schema_violation_maps_to_unparseable() {
        let (judge, _) = judge_with(
            vec![Ok("{\"similar\": \"yes\"}".into())],
            SemanticMode::Critique,
        );
        let result = judge.judge("a", "b").await;
        assert!(!result.passed);
        assert_eq!(result.feedback, UNPARSEABLE_FEEDBACK);
    }

    #[tokio::test]
    async fn critique_accepts_code_fenced_json() {
        let reply = "```json\n{\"is_correct\": false, \"feedback\": \"Missing words.\"}\n```";
        let (judge, _) = judge_with(vec![Ok(reply.into())], SemanticMode::Critique);
        let result = judge.judge("a", "b").await;
        assert!(!result.passed);
        assert_eq!(result.feedback, "Missing words.");
    }
}
