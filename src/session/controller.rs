//! Async driver for a practice session.
//!
//! [`PracticeSession`] owns the state machine and executes its effects:
//! spawning playback and evaluation tasks, relaying capture events, and
//! arming the auto-advance and playback-fallback timers. All turn policy
//! lives in [`SessionMachine`]; this module is plumbing only.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{Duration, Sleep, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::error::Result;
use crate::judge::{MatchResult, SimilarityJudge};
use crate::scenario::{Scenario, Speaker};
use crate::session::machine::{
    Effect, MachineEvent, SessionCommand, SessionMachine, SessionSnapshot, TurnPhase,
};
use crate::speech::{SpeakOutcome, SttErrorCode, SttEvent, SttProvider, TtsProvider};

/// Notifications broadcast to observers (UI, logging, tests).
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The cursor moved to a new line.
    LineStarted {
        index: usize,
        speaker: Speaker,
        text: String,
    },
    /// A capture started for the current practitioner line.
    RecordingStarted,
    /// Interim transcription update, display-only.
    InterimTranscript { text: String },
    /// A finalized transcription segment was appended.
    FinalTranscript { text: String },
    /// The finalized attempt was handed to the judge.
    Evaluating,
    /// An attempt resolved, pass or fail.
    Feedback { result: MatchResult },
    /// An advisory message (capture errors, playback fallback).
    Advisory { message: String },
    /// The dialogue is complete.
    Finished,
}

/// Mutable driver state local to one `run` invocation.
struct RunState {
    capture: Option<crate::speech::CaptureHandle>,
    /// Cancels outstanding playback for the current line.
    line_cancel: CancellationToken,
    /// Discriminates playback outcomes across line changes.
    playback_gen: u64,
    auto_advance: Option<Pin<Box<Sleep>>>,
    tts_fallback: Option<Pin<Box<Sleep>>>,
    eval_tx: mpsc::UnboundedSender<(u64, MatchResult)>,
    tts_tx: mpsc::UnboundedSender<(u64, SpeakOutcome)>,
}

/// One practice session over a scenario, driven to completion by `run`.
pub struct PracticeSession {
    machine: SessionMachine,
    config: SessionConfig,
    judge: Arc<dyn SimilarityJudge>,
    stt: Arc<dyn SttProvider>,
    tts: Arc<dyn TtsProvider>,
    cancel: CancellationToken,
    event_tx: Option<broadcast::Sender<SessionEvent>>,
    state_tx: watch::Sender<SessionSnapshot>,
    cmd_tx: mpsc::UnboundedSender<SessionCommand>,
    cmd_rx: mpsc::UnboundedReceiver<SessionCommand>,
}

impl PracticeSession {
    /// Build a session over `scenario` with the given capabilities.
    pub fn new(
        scenario: Arc<Scenario>,
        judge: Arc<dyn SimilarityJudge>,
        stt: Arc<dyn SttProvider>,
        tts: Arc<dyn TtsProvider>,
        config: SessionConfig,
    ) -> Self {
        let machine = SessionMachine::new(scenario);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(machine.snapshot());
        Self {
            machine,
            config,
            judge,
            stt,
            tts,
            cancel: CancellationToken::new(),
            event_tx: None,
            state_tx,
            cmd_tx,
            cmd_rx,
        }
    }

    /// Broadcast session events on the given channel.
    #[must_use]
    pub fn with_events(mut self, events: broadcast::Sender<SessionEvent>) -> Self {
        self.event_tx = Some(events);
        self
    }

    /// Sender for presentation-layer commands.
    pub fn command_sender(&self) -> mpsc::UnboundedSender<SessionCommand> {
        self.cmd_tx.clone()
    }

    /// Observe the session state as it changes.
    pub fn watch_state(&self) -> watch::Receiver<SessionSnapshot> {
        self.state_tx.subscribe()
    }

    /// Token that stops the session when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drive the session until the dialogue finishes or it is cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error only on internal channel failure; capture, playback,
    /// and judge failures are absorbed into the turn flow as feedback.
    pub async fn run(mut self) -> Result<()> {
        let (eval_tx, mut eval_rx) = mpsc::unbounded_channel();
        let (tts_tx, mut tts_rx) = mpsc::unbounded_channel();
        let mut state = RunState {
            capture: None,
            line_cancel: CancellationToken::new(),
            playback_gen: 0,
            auto_advance: None,
            tts_fallback: None,
            eval_tx,
            tts_tx,
        };

        let effects = self.machine.start();
        self.drain(effects, &mut state).await;
        self.emit_line_started();
        self.publish_state();

        while !self.machine.is_finished() {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    debug!("session cancelled");
                    break;
                }
                cmd = self.cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    self.dispatch(MachineEvent::Command(cmd), &mut state).await;
                }
                outcome = tts_rx.recv() => {
                    if let Some((generation, outcome)) = outcome {
                        if generation != state.playback_gen {
                            debug!(generation, "discarding playback outcome from a previous line");
                            continue;
                        }
                        let event = match outcome {
                            SpeakOutcome::Completed => MachineEvent::TtsFinished,
                            SpeakOutcome::Failed | SpeakOutcome::Unsupported => {
                                MachineEvent::TtsFailed
                            }
                        };
                        self.dispatch(event, &mut state).await;
                    }
                }
                ev = next_capture_event(&mut state.capture) => {
                    let machine_event = match ev {
                        SttEvent::Partial(text) => {
                            self.emit(SessionEvent::InterimTranscript { text: text.clone() });
                            MachineEvent::SttPartial(text)
                        }
                        SttEvent::Final(text) => {
                            self.emit(SessionEvent::FinalTranscript { text: text.clone() });
                            MachineEvent::SttFinal(text)
                        }
                        SttEvent::Ended => {
                            state.capture = None;
                            MachineEvent::SttEnded
                        }
                        SttEvent::Error(code) => MachineEvent::SttError(code),
                    };
                    self.dispatch(machine_event, &mut state).await;
                }
                result = eval_rx.recv() => {
                    if let Some((attempt, result)) = result {
                        self.dispatch(MachineEvent::EvaluationReady { attempt, result }, &mut state)
                            .await;
                    }
                }
                () = armed(&mut state.auto_advance) => {
                    state.auto_advance = None;
                    self.dispatch(MachineEvent::AutoAdvanceElapsed, &mut state).await;
                }
                () = armed(&mut state.tts_fallback) => {
                    state.tts_fallback = None;
                    self.dispatch(MachineEvent::TtsFallbackElapsed, &mut state).await;
                }
            }
        }

        // Tear down anything still in flight.
        state.line_cancel.cancel();
        if let Some(handle) = state.capture.take() {
            handle.abort();
        }
        if self.machine.is_finished() {
            self.emit(SessionEvent::Finished);
        }
        self.publish_state();
        Ok(())
    }

    /// Feed one event through the machine, executing effects and any
    /// follow-up events they produce (e.g. a capture that failed to start).
    async fn dispatch(&mut self, event: MachineEvent, state: &mut RunState) {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            let index_before = self.machine.line_index();
            let phase_before = self.machine.phase();
            let effects = self.machine.handle(event);
            let followups = self.apply_effects(effects, state).await;
            self.emit_transitions(index_before, phase_before);
            queue.extend(followups);
        }
        self.publish_state();
    }

    async fn drain(&mut self, effects: Vec<Effect>, state: &mut RunState) {
        let mut queue: VecDeque<MachineEvent> = self.apply_effects(effects, state).await.into();
        while let Some(event) = queue.pop_front() {
            let index_before = self.machine.line_index();
            let phase_before = self.machine.phase();
            let effects = self.machine.handle(event);
            queue.extend(self.apply_effects(effects, state).await);
            self.emit_transitions(index_before, phase_before);
        }
    }

    async fn apply_effects(
        &mut self,
        effects: Vec<Effect>,
        state: &mut RunState,
    ) -> Vec<MachineEvent> {
        let mut followups = Vec::new();
        for effect in effects {
            match effect {
                Effect::SpeakLine { text } => {
                    state.line_cancel.cancel();
                    state.line_cancel = CancellationToken::new();
                    state.playback_gen += 1;
                    self.spawn_speak(text, state);
                }
                Effect::StartCapture => match self.stt.start_capture(&self.config.locale).await {
                    Ok(handle) => {
                        state.capture = Some(handle);
                        self.emit(SessionEvent::RecordingStarted);
                    }
                    Err(error) => {
                        warn!(%error, "speech capture failed to start");
                        followups.push(MachineEvent::SttError(SttErrorCode::AudioCapture));
                    }
                },
                Effect::StopCapture => {
                    if let Some(handle) = &state.capture {
                        handle.stop();
                    }
                }
                Effect::AbortCapture => {
                    if let Some(handle) = state.capture.take() {
                        handle.abort();
                    }
                }
                Effect::CancelPlayback => {
                    state.line_cancel.cancel();
                    state.auto_advance = None;
                    state.tts_fallback = None;
                }
                Effect::Evaluate {
                    attempt,
                    expected,
                    candidate,
                } => {
                    self.emit(SessionEvent::Evaluating);
                    let judge = Arc::clone(&self.judge);
                    let tx = state.eval_tx.clone();
                    tokio::spawn(async move {
                        let result = judge.judge(&expected, &candidate).await;
                        let _ = tx.send((attempt, result));
                    });
                }
                Effect::ScheduleAutoAdvance => {
                    state.auto_advance = Some(Box::pin(sleep(Duration::from_millis(
                        self.config.auto_advance_delay_ms,
                    ))));
                }
                Effect::ScheduleTtsFallback => {
                    state.tts_fallback = Some(Box::pin(sleep(Duration::from_millis(
                        self.config.tts_fallback_delay_ms,
                    ))));
                }
                Effect::Announce { message } => {
                    self.emit(SessionEvent::Advisory { message });
                }
            }
        }
        followups
    }

    fn spawn_speak(&self, text: String, state: &RunState) {
        let tts = Arc::clone(&self.tts);
        let locale = self.config.locale.clone();
        let tx = state.tts_tx.clone();
        let cancel = state.line_cancel.clone();
        let generation = state.playback_gen;
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                outcome = tts.speak(&text, &locale) => {
                    let _ = tx.send((generation, outcome));
                }
            }
        });
    }

    fn emit_transitions(&self, index_before: usize, phase_before: TurnPhase) {
        let phase = self.machine.phase();
        if phase == TurnPhase::Finished {
            return; // Finished is emitted once, after the loop.
        }
        if self.machine.line_index() != index_before {
            self.emit_line_started();
        }
        if phase == TurnPhase::Feedback && phase_before != TurnPhase::Feedback {
            if let Some(result) = self.machine.last_result() {
                self.emit(SessionEvent::Feedback {
                    result: result.clone(),
                });
            }
        }
    }

    fn emit_line_started(&self) {
        if let Some(line) = self.machine.current_line() {
            self.emit(SessionEvent::LineStarted {
                index: self.machine.line_index(),
                speaker: line.speaker,
                text: line.text.clone(),
            });
        }
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }

    fn publish_state(&self) {
        let _ = self.state_tx.send(self.machine.snapshot());
    }
}

/// Await the next capture event; pends forever while no capture is running.
/// A provider closing its channel without an explicit end marker is treated
/// as the capture ending.
async fn next_capture_event(capture: &mut Option<crate::speech::CaptureHandle>) -> SttEvent {
    match capture {
        Some(handle) => handle.next_event().await.unwrap_or(SttEvent::Ended),
        None => std::future::pending().await,
    }
}

/// Await an armed timer; pends forever while disarmed.
async fn armed(slot: &mut Option<Pin<Box<Sleep>>>) {
    match slot {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
