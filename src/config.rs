//! Configuration types for the practice engine.

use serde::{Deserialize, Serialize};

use crate::judge::lexical::OVERLAP_THRESHOLD;

/// Top-level configuration for a practice deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PracticeConfig {
    /// Similarity judge settings.
    pub judge: JudgeConfig,
    /// Session / turn-taking settings.
    pub session: SessionConfig,
}

/// Which similarity strategy to use for a deployment.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JudgeStrategy {
    /// Deterministic token-coverage scoring. Offline, no model required.
    #[default]
    Lexical,
    /// LLM-backed CORRECT/INCORRECT classification.
    SemanticBinary,
    /// LLM-backed critique with grammar correction.
    SemanticCritique,
}

/// Similarity judge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeConfig {
    /// Strategy selected for this deployment.
    pub strategy: JudgeStrategy,
    /// Minimum coverage of expected significant tokens for the lexical
    /// strategy. Observed useful range: 0.70–0.80.
    pub overlap_threshold: f32,
    /// Model endpoint, used by the semantic strategies only.
    pub model: ModelConfig,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            strategy: JudgeStrategy::Lexical,
            overlap_threshold: OVERLAP_THRESHOLD,
            model: ModelConfig::default(),
        }
    }
}

/// Endpoint configuration for the LLM similarity capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Base URL including `/v1` (e.g. `https://api.openai.com/v1`).
    pub base_url: String,
    /// Bearer token. Empty = no auth header.
    pub api_key: String,
    /// Model identifier sent with each request.
    pub model_id: String,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            model_id: "gpt-4o-mini".to_owned(),
            timeout_ms: 10_000,
        }
    }
}

/// Session / turn-taking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// BCP 47 locale passed to the STT and TTS capabilities.
    pub locale: String,
    /// Delay before auto-advancing after a passing attempt, in ms.
    ///
    /// Auto-advance on success is deliberate UX policy: the practitioner sees
    /// the positive feedback briefly, then the dialogue moves on.
    pub auto_advance_delay_ms: u64,
    /// Fallback delay before advancing past a reference line whose TTS
    /// playback failed or is unsupported, in ms.
    pub tts_fallback_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            locale: "en-US".to_owned(),
            auto_advance_delay_ms: 1_500,
            tts_fallback_delay_ms: 3_000,
        }
    }
}
