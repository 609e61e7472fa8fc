//! Pure turn-taking state machine for one practice session.
//!
//! Every transition is a pure function of `(current state, event)` producing
//! a new state plus a list of [`Effect`]s for the async driver to execute.
//! The machine owns the single "current line" cursor; it holds no channels,
//! no clocks, and no providers, so the whole turn policy is unit-testable
//! without any async scaffolding.
//!
//! Turn policy, in brief: reference lines auto-play and auto-advance;
//! practitioner lines wait for an explicit recording, are judged exactly once
//! per attempt on the finalized transcript, auto-advance on a pass, and wait
//! for an explicit "next" on a fail (the practitioner may re-record first).

use std::sync::Arc;

use crate::judge::MatchResult;
use crate::scenario::{Scenario, Speaker};
use crate::speech::SttErrorCode;

/// Feedback when a capture ended with no finalized text.
pub const NO_CAPTURE_FEEDBACK: &str = "No speech was captured. Try speaking clearly.";

/// Advisory when reference playback failed and the fallback timer starts.
pub const TTS_FALLBACK_ADVISORY: &str = "Could not play audio. Advancing shortly.";

/// Where the session is within the current line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    /// Waiting for the practitioner to start recording.
    AwaitingLineStart,
    /// Reference line playback is in flight.
    ReferencePlaying,
    /// Practitioner speech capture is in flight.
    Recording,
    /// A judge evaluation is in flight. Exactly one per attempt.
    Evaluating,
    /// Feedback for the last attempt is on display.
    Feedback,
    /// The dialogue is complete. Terminal: no event changes the cursor.
    Finished,
}

/// Commands accepted from the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    StartRecording,
    StopRecording,
    /// Move past a failed attempt (or any displayed feedback).
    AdvanceManually,
    /// Re-speak the current reference line.
    ReplayReferenceLine,
}

/// Everything that can happen to the machine.
#[derive(Debug, Clone)]
pub enum MachineEvent {
    Command(SessionCommand),
    /// Reference playback finished normally.
    TtsFinished,
    /// Reference playback failed or is unsupported.
    TtsFailed,
    /// The bounded fallback delay after a TTS failure elapsed.
    TtsFallbackElapsed,
    /// Interim transcription update. Display-only; never judged.
    SttPartial(String),
    /// A finalized transcription segment.
    SttFinal(String),
    /// The capture ended; the transcript is complete.
    SttEnded,
    /// The STT capability reported an error.
    SttError(SttErrorCode),
    /// A judge evaluation resolved. Stale attempts are discarded.
    EvaluationReady { attempt: u64, result: MatchResult },
    /// The post-pass auto-advance delay elapsed.
    AutoAdvanceElapsed,
}

/// Side effects for the driver. The machine never performs them itself.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Speak a reference line via the TTS capability.
    SpeakLine { text: String },
    /// Begin an STT capture for the current attempt.
    StartCapture,
    /// Ask the running capture to finalize.
    StopCapture,
    /// Cancel the running capture, discarding output.
    AbortCapture,
    /// Cancel outstanding reference playback.
    CancelPlayback,
    /// Invoke the similarity judge once for this attempt.
    Evaluate {
        attempt: u64,
        expected: String,
        candidate: String,
    },
    /// Start the post-pass auto-advance delay.
    ScheduleAutoAdvance,
    /// Start the bounded fallback delay after a TTS failure.
    ScheduleTtsFallback,
    /// Surface an advisory message to the presentation layer.
    Announce { message: String },
}

/// Read-only view of the machine for the presentation layer.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub line_index: usize,
    pub total_lines: usize,
    pub phase: TurnPhase,
    pub speaker: Option<Speaker>,
    pub line_text: Option<String>,
    pub translation: Option<String>,
    pub interim_transcript: String,
    pub final_transcript: String,
    pub last_result: Option<MatchResult>,
    /// Practitioner lines completed so far / in total, for progress display.
    pub practitioner_done: usize,
    pub practitioner_total: usize,
}

/// The turn-taking state machine. See the module docs for the policy.
pub struct SessionMachine {
    scenario: Arc<Scenario>,
    index: usize,
    phase: TurnPhase,
    /// Monotonic per-recording counter; evaluation results carry it back so
    /// results from an abandoned attempt are discarded, never applied.
    attempt: u64,
    interim: String,
    final_text: String,
    last_result: Option<MatchResult>,
}

impl SessionMachine {
    /// Create a machine positioned before the first line.
    pub fn new(scenario: Arc<Scenario>) -> Self {
        Self {
            scenario,
            index: 0,
            phase: TurnPhase::AwaitingLineStart,
            attempt: 0,
            interim: String::new(),
            final_text: String::new(),
            last_result: None,
        }
    }

    /// Enter the first line. Call exactly once before feeding events.
    pub fn start(&mut self) -> Vec<Effect> {
        self.enter_current_line()
    }

    /// Apply one event, returning the effects to execute.
    pub fn handle(&mut self, event: MachineEvent) -> Vec<Effect> {
        // Terminal state absorbs everything: no command or provider event
        // moves the cursor past the end.
        if self.phase == TurnPhase::Finished {
            return Vec::new();
        }

        match event {
            MachineEvent::Command(cmd) => self.handle_command(cmd),
            MachineEvent::TtsFinished | MachineEvent::TtsFallbackElapsed => {
                if self.phase == TurnPhase::ReferencePlaying {
                    self.advance()
                } else {
                    Vec::new()
                }
            }
            MachineEvent::TtsFailed => {
                if self.phase == TurnPhase::ReferencePlaying {
                    vec![
                        Effect::Announce {
                            message: TTS_FALLBACK_ADVISORY.to_owned(),
                        },
                        Effect::ScheduleTtsFallback,
                    ]
                } else {
                    Vec::new()
                }
            }
            MachineEvent::SttPartial(text) => {
                if self.phase == TurnPhase::Recording {
                    self.interim = text;
                }
                Vec::new()
            }
            MachineEvent::SttFinal(text) => {
                if self.phase == TurnPhase::Recording {
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        if !self.final_text.is_empty() {
                            self.final_text.push(' ');
                        }
                        self.final_text.push_str(trimmed);
                    }
                    self.interim.clear();
                }
                Vec::new()
            }
            MachineEvent::SttEnded => self.handle_capture_end(),
            MachineEvent::SttError(code) => {
                if self.phase == TurnPhase::Recording {
                    self.phase = TurnPhase::Feedback;
                    self.last_result = Some(MatchResult::fail(code.advisory()));
                    vec![Effect::Announce {
                        message: code.advisory().to_owned(),
                    }]
                } else {
                    Vec::new()
                }
            }
            MachineEvent::EvaluationReady { attempt, result } => {
                if self.phase == TurnPhase::Evaluating && attempt == self.attempt {
                    let passed = result.passed;
                    self.last_result = Some(result);
                    self.phase = TurnPhase::Feedback;
                    if passed {
                        vec![Effect::ScheduleAutoAdvance]
                    } else {
                        Vec::new()
                    }
                } else {
                    // Result for an abandoned attempt. Discard it.
                    Vec::new()
                }
            }
            MachineEvent::AutoAdvanceElapsed => {
                let passed = self
                    .last_result
                    .as_ref()
                    .is_some_and(|r| r.passed);
                if self.phase == TurnPhase::Feedback && passed {
                    self.advance()
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn handle_command(&mut self, cmd: SessionCommand) -> Vec<Effect> {
        match cmd {
            SessionCommand::StartRecording => {
                let on_practitioner_line = self
                    .current_line()
                    .is_some_and(|l| l.speaker == Speaker::Practitioner);
                // Mutual exclusion: no new recording while a capture or an
                // evaluation for this line is still in flight.
                let can_start = matches!(
                    self.phase,
                    TurnPhase::AwaitingLineStart | TurnPhase::Feedback
                );
                if on_practitioner_line && can_start {
                    self.attempt += 1;
                    self.interim.clear();
                    self.final_text.clear();
                    self.last_result = None;
                    self.phase = TurnPhase::Recording;
                    vec![Effect::StartCapture]
                } else {
                    Vec::new()
                }
            }
            SessionCommand::StopRecording => {
                if self.phase == TurnPhase::Recording {
                    vec![Effect::StopCapture]
                } else {
                    Vec::new()
                }
            }
            SessionCommand::AdvanceManually => {
                if self.phase == TurnPhase::Feedback {
                    self.advance()
                } else {
                    Vec::new()
                }
            }
            SessionCommand::ReplayReferenceLine => {
                if self.phase == TurnPhase::ReferencePlaying {
                    let text = self
                        .current_line()
                        .map(|l| l.text.clone())
                        .unwrap_or_default();
                    vec![Effect::CancelPlayback, Effect::SpeakLine { text }]
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn handle_capture_end(&mut self) -> Vec<Effect> {
        if self.phase != TurnPhase::Recording {
            return Vec::new();
        }
        let candidate = self.final_text.trim().to_owned();
        self.interim.clear();
        if candidate.is_empty() {
            // Empty finalized text is a failed attempt, not an error, and the
            // judge is never invoked for it.
            self.phase = TurnPhase::Feedback;
            self.last_result = Some(MatchResult::fail(NO_CAPTURE_FEEDBACK));
            return Vec::new();
        }
        let expected = self
            .current_line()
            .map(|l| l.text.clone())
            .unwrap_or_default();
        self.phase = TurnPhase::Evaluating;
        vec![Effect::Evaluate {
            attempt: self.attempt,
            expected,
            candidate,
        }]
    }

    /// Move the cursor to the next line, cancelling in-flight speech activity.
    fn advance(&mut self) -> Vec<Effect> {
        self.index += 1;
        let mut effects = vec![Effect::CancelPlayback, Effect::AbortCapture];
        effects.extend(self.enter_current_line());
        effects
    }

    fn enter_current_line(&mut self) -> Vec<Effect> {
        self.interim.clear();
        self.final_text.clear();
        self.last_result = None;
        match self.current_line() {
            None => {
                self.phase = TurnPhase::Finished;
                Vec::new()
            }
            Some(line) if line.speaker == Speaker::Reference => {
                let text = line.text.clone();
                self.phase = TurnPhase::ReferencePlaying;
                vec![Effect::SpeakLine { text }]
            }
            Some(_) => {
                self.phase = TurnPhase::AwaitingLineStart;
                Vec::new()
            }
        }
    }

    /// The line under the cursor, or `None` past the end.
    pub fn current_line(&self) -> Option<&crate::scenario::DialogueLine> {
        self.scenario.dialogue.get(self.index)
    }

    pub fn line_index(&self) -> usize {
        self.index
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase == TurnPhase::Finished
    }

    pub fn last_result(&self) -> Option<&MatchResult> {
        self.last_result.as_ref()
    }

    /// Snapshot the observable state for the presentation layer.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            line_index: self.index,
            total_lines: self.scenario.dialogue.len(),
            phase: self.phase,
            speaker: self.current_line().map(|l| l.speaker),
            line_text: self.current_line().map(|l| l.text.clone()),
            translation: self.current_line().and_then(|l| l.translation.clone()),
            interim_transcript: self.interim.clone(),
            final_transcript: self.final_text.clone(),
            last_result: self.last_result.clone(),
            practitioner_done: self.scenario.practitioner_lines_before(self.index),
            practitioner_total: self.scenario.practitioner_line_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{DialogueLine, Scenario};

    fn line(id: &str, speaker: Speaker, text: &str) -> DialogueLine {
        DialogueLine {
            id: id.to_owned(),
            speaker,
            text: text.to_owned(),
            translation: None,
        }
    }

    fn scenario() -> Arc<Scenario> {
        Arc::new(Scenario {
            id: "test".to_owned(),
            title: "Test".to_owned(),
            description: String::new(),
            icon: "x".to_owned(),
            dialogue: vec![
                line("l1", Speaker::Reference, "Hello! Can I help you?"),
                line("l2", Speaker::Practitioner, "Yes, I'm looking for apples."),
            ],
        })
    }

    fn recording_machine() -> SessionMachine {
        let mut machine = SessionMachine::new(scenario());
        let _ = machine.start();
        let _ = machine.handle(MachineEvent::TtsFinished);
        let effects = machine.handle(MachineEvent::Command(SessionCommand::StartRecording));
        assert_eq!(effects, vec![Effect::StartCapture]);
        machine
    }

    #[test]
    fn reference_line_plays_then_advances() {
        let mut machine = SessionMachine::new(scenario());
        let effects = machine.start();
        assert_eq!(
            effects,
            vec![Effect::SpeakLine {
                text: "Hello! Can I help you?".to_owned()
            }]
        );
        assert_eq!(machine.phase(), TurnPhase::ReferencePlaying);

        let effects = machine.handle(MachineEvent::TtsFinished);
        assert!(effects.contains(&Effect::CancelPlayback));
        assert_eq!(machine.line_index(), 1);
        assert_eq!(machine.phase(), TurnPhase::AwaitingLineStart);
    }

    #[test]
    fn tts_failure_advances_via_fallback_instead_of_stalling() {
        let mut machine = SessionMachine::new(scenario());
        let _ = machine.start();
        let effects = machine.handle(MachineEvent::TtsFailed);
        assert!(effects.contains(&Effect::ScheduleTtsFallback));
        assert_eq!(machine.phase(), TurnPhase::ReferencePlaying);

        let _ = machine.handle(MachineEvent::TtsFallbackElapsed);
        assert_eq!(machine.line_index(), 1);
    }

    #[test]
    fn interim_updates_never_trigger_evaluation() {
        let mut machine = recording_machine();
        for text in ["yes", "yes i'm", "yes i'm looking"] {
            let effects = machine.handle(MachineEvent::SttPartial(text.to_owned()));
            assert!(effects.is_empty());
        }
        assert_eq!(machine.phase(), TurnPhase::Recording);
        assert_eq!(machine.snapshot().interim_transcript, "yes i'm looking");
    }

    #[test]
    fn exactly_one_evaluation_per_finalized_attempt() {
        let mut machine = recording_machine();
        let _ = machine.handle(MachineEvent::SttPartial("yes".to_owned()));
        let _ = machine.handle(MachineEvent::SttFinal("yes, I'm looking".to_owned()));
        let _ = machine.handle(MachineEvent::SttFinal("for apples".to_owned()));
        let effects = machine.handle(MachineEvent::SttEnded);
        assert_eq!(
            effects,
            vec![Effect::Evaluate {
                attempt: 1,
                expected: "Yes, I'm looking for apples.".to_owned(),
                candidate: "yes, I'm looking for apples".to_owned(),
            }]
        );
        assert_eq!(machine.phase(), TurnPhase::Evaluating);

        // A second end-of-capture cannot produce a second evaluation.
        assert!(machine.handle(MachineEvent::SttEnded).is_empty());
        // Nor can a new recording start while the evaluation is pending.
        assert!(
            machine
                .handle(MachineEvent::Command(SessionCommand::StartRecording))
                .is_empty()
        );
        assert_eq!(machine.phase(), TurnPhase::Evaluating);
    }

    #[test]
    fn empty_capture_fails_without_invoking_the_judge() {
        let mut machine = recording_machine();
        let _ = machine.handle(MachineEvent::SttPartial("ye".to_owned()));
        let effects = machine.handle(MachineEvent::SttEnded);
        assert!(effects.is_empty());
        assert_eq!(machine.phase(), TurnPhase::Feedback);
        let result = machine.last_result().expect("result");
        assert!(!result.passed);
        assert_eq!(result.feedback, NO_CAPTURE_FEEDBACK);
    }

    #[test]
    fn passing_result_schedules_auto_advance() {
        let mut machine = recording_machine();
        let _ = machine.handle(MachineEvent::SttFinal("yes i'm looking for apples".to_owned()));
        let _ = machine.handle(MachineEvent::SttEnded);
        let effects = machine.handle(MachineEvent::EvaluationReady {
            attempt: 1,
            result: MatchResult::pass("nice"),
        });
        assert_eq!(effects, vec![Effect::ScheduleAutoAdvance]);
        assert_eq!(machine.phase(), TurnPhase::Feedback);

        let _ = machine.handle(MachineEvent::AutoAdvanceElapsed);
        assert!(machine.is_finished());
    }

    #[test]
    fn failing_result_waits_for_manual_advance() {
        let mut machine = recording_machine();
        let _ = machine.handle(MachineEvent::SttFinal("bananas".to_owned()));
        let _ = machine.handle(MachineEvent::SttEnded);
        let effects = machine.handle(MachineEvent::EvaluationReady {
            attempt: 1,
            result: MatchResult::fail("nope"),
        });
        assert!(effects.is_empty());
        assert_eq!(machine.phase(), TurnPhase::Feedback);

        // A stray auto-advance tick must not move a failed attempt forward.
        assert!(machine.handle(MachineEvent::AutoAdvanceElapsed).is_empty());
        assert_eq!(machine.line_index(), 1);

        let _ = machine.handle(MachineEvent::Command(SessionCommand::AdvanceManually));
        assert!(machine.is_finished());
    }

    #[test]
    fn failed_attempt_can_be_rerecorded() {
        let mut machine = recording_machine();
        let _ = machine.handle(MachineEvent::SttFinal("bananas".to_owned()));
        let _ = machine.handle(MachineEvent::SttEnded);
        let _ = machine.handle(MachineEvent::EvaluationReady {
            attempt: 1,
            result: MatchResult::fail("nope"),
        });

        let effects = machine.handle(MachineEvent::Command(SessionCommand::StartRecording));
        assert_eq!(effects, vec![Effect::StartCapture]);
        assert_eq!(machine.phase(), TurnPhase::Recording);
        assert!(machine.last_result().is_none());
        assert!(machine.snapshot().final_transcript.is_empty());
    }

    #[test]
    fn stale_evaluation_results_are_discarded() {
        let mut machine = recording_machine();
        let _ = machine.handle(MachineEvent::SttFinal("bananas".to_owned()));
        let _ = machine.handle(MachineEvent::SttEnded);
        let _ = machine.handle(MachineEvent::EvaluationReady {
            attempt: 1,
            result: MatchResult::fail("nope"),
        });
        // Re-record: attempt 2 is now in flight.
        let _ = machine.handle(MachineEvent::Command(SessionCommand::StartRecording));
        let _ = machine.handle(MachineEvent::SttFinal("yes looking for apples".to_owned()));
        let _ = machine.handle(MachineEvent::SttEnded);

        // A late result from attempt 1 must not be applied.
        let effects = machine.handle(MachineEvent::EvaluationReady {
            attempt: 1,
            result: MatchResult::pass("stale"),
        });
        assert!(effects.is_empty());
        assert_eq!(machine.phase(), TurnPhase::Evaluating);

        let effects = machine.handle(MachineEvent::EvaluationReady {
            attempt: 2,
            result: MatchResult::pass("fresh"),
        });
        assert_eq!(effects, vec![Effect::ScheduleAutoAdvance]);
    }

    #[test]
    fn stt_error_becomes_failed_attempt_with_advisory() {
        let mut machine = recording_machine();
        let effects = machine.handle(MachineEvent::SttError(SttErrorCode::AudioCapture));
        assert_eq!(
            effects,
            vec![Effect::Announce {
                message: SttErrorCode::AudioCapture.advisory().to_owned()
            }]
        );
        assert_eq!(machine.phase(), TurnPhase::Feedback);
        assert!(!machine.last_result().expect("result").passed);
        // The capture's trailing end event is ignored in Feedback.
        assert!(machine.handle(MachineEvent::SttEnded).is_empty());
    }

    #[test]
    fn replay_restarts_reference_playback() {
        let mut machine = SessionMachine::new(scenario());
        let _ = machine.start();
        let effects =
            machine.handle(MachineEvent::Command(SessionCommand::ReplayReferenceLine));
        assert_eq!(
            effects,
            vec![
                Effect::CancelPlayback,
                Effect::SpeakLine {
                    text: "Hello! Can I help you?".to_owned()
                }
            ]
        );
    }

    #[test]
    fn finished_state_absorbs_all_events() {
        let mut machine = recording_machine();
        let _ = machine.handle(MachineEvent::SttFinal("yes i'm looking for apples".to_owned()));
        let _ = machine.handle(MachineEvent::SttEnded);
        let _ = machine.handle(MachineEvent::EvaluationReady {
            attempt: 1,
            result: MatchResult::pass("nice"),
        });
        let _ = machine.handle(MachineEvent::AutoAdvanceElapsed);
        assert!(machine.is_finished());

        let index = machine.line_index();
        for event in [
            MachineEvent::Command(SessionCommand::StartRecording),
            MachineEvent::Command(SessionCommand::StopRecording),
            MachineEvent::Command(SessionCommand::AdvanceManually),
            MachineEvent::Command(SessionCommand::ReplayReferenceLine),
            MachineEvent::TtsFinished,
            MachineEvent::SttEnded,
            MachineEvent::AutoAdvanceElapsed,
        ] {
            assert!(machine.handle(event).is_empty());
            assert_eq!(machine.line_index(), index);
            assert!(machine.is_finished());
        }
    }

    #[test]
    fn snapshot_tracks_progress() {
        let mut machine = SessionMachine::new(scenario());
        let _ = machine.start();
        let snap = machine.snapshot();
        assert_eq!(snap.practitioner_total, 1);
        assert_eq!(snap.practitioner_done, 0);
        assert_eq!(snap.speaker, Some(Speaker::Reference));

        let _ = machine.handle(MachineEvent::TtsFinished);
        let snap = machine.snapshot();
        assert_eq!(snap.line_index, 1);
        assert_eq!(snap.speaker, Some(Speaker::Practitioner));
    }
}
