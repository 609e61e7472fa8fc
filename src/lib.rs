//! Rehearse: a turn-taking engine for spoken dialogue practice.
//!
//! A practitioner works through a scripted two-party dialogue: reference
//! lines are played to them via a text-to-speech capability, practitioner
//! lines are captured via a speech-to-text capability and judged against the
//! script. The engine owns the turn policy and the similarity judging; audio
//! capture and playback are injected behind traits.
//!
//! The pieces:
//!
//! - [`scenario`] — the scripted dialogue catalogue.
//! - [`normalize`] — text normalization shared by the lexical judge.
//! - [`judge`] — similarity strategies (lexical coverage, LLM-backed).
//! - [`speech`] — the injected STT/TTS capability traits.
//! - [`session`] — the turn-taking state machine and its async driver.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rehearse::config::PracticeConfig;
//! use rehearse::judge::build_judge;
//! use rehearse::scenario::Catalogue;
//! use rehearse::session::PracticeSession;
//! use rehearse::test_utils::{ScriptedStt, ScriptedTts};
//!
//! # async fn demo() -> rehearse::Result<()> {
//! let config = PracticeConfig::default();
//! let catalogue = Catalogue::builtin()?;
//! let scenario = Arc::new(catalogue.scenarios[0].clone());
//! let judge = build_judge(&config.judge)?;
//! let stt = Arc::new(ScriptedStt::new([]));
//! let tts = Arc::new(ScriptedTts::completing());
//!
//! let session = PracticeSession::new(scenario, judge, stt, tts, config.session);
//! let commands = session.command_sender();
//! # let _ = commands;
//! session.run().await
//! # }
//! ```

pub mod config;
pub mod error;
pub mod judge;
pub mod normalize;
pub mod scenario;
pub mod session;
pub mod speech;
pub mod test_utils;

pub use config::{JudgeConfig, JudgeStrategy, ModelConfig, PracticeConfig, SessionConfig};
pub use error::{PracticeError, Result};
pub use judge::{MatchResult, SimilarityJudge, build_judge};
pub use scenario::{Catalogue, DialogueLine, Scenario, Speaker};
pub use session::{PracticeSession, SessionCommand, SessionEvent, SessionSnapshot, TurnPhase};
pub use speech::{SpeakOutcome, SttErrorCode, SttEvent, SttProvider, TtsProvider};
