//! Scripted speech capabilities for tests and the terminal demo.
//!
//! These stand in for real microphone and playback backends: captures replay
//! a pre-written event script, playback resolves immediately with a chosen
//! outcome.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{Duration, sleep};

use crate::error::{PracticeError, Result};
use crate::speech::{
    CaptureCommand, CaptureHandle, SpeakOutcome, SttEvent, SttProvider, TtsProvider,
};

/// Replays one scripted event sequence per capture, in order.
pub struct ScriptedStt {
    scripts: Mutex<VecDeque<Vec<SttEvent>>>,
}

impl ScriptedStt {
    pub fn new(scripts: impl IntoIterator<Item = Vec<SttEvent>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
        }
    }

    /// A provider with a single scripted capture.
    pub fn single(events: Vec<SttEvent>) -> Self {
        Self::new([events])
    }

    /// A capture script that utters `text` as one finalized segment.
    pub fn utterance(text: &str) -> Vec<SttEvent> {
        vec![
            SttEvent::Partial(text.to_owned()),
            SttEvent::Final(text.to_owned()),
            SttEvent::Ended,
        ]
    }
}

#[async_trait]
impl SttProvider for ScriptedStt {
    async fn start_capture(&self, _locale: &str) -> Result<CaptureHandle> {
        let script = self
            .scripts
            .lock()
            .map_err(|_| PracticeError::Stt("script lock poisoned".to_owned()))?
            .pop_front()
            .ok_or_else(|| PracticeError::Stt("no scripted capture remaining".to_owned()))?;

        let (event_tx, event_rx) = mpsc::channel(16);
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut script: VecDeque<SttEvent> = script.into();
            while let Some(event) = script.pop_front() {
                tokio::select! {
                    cmd = cmd_rx.recv() => match cmd {
                        Some(CaptureCommand::Stop) => {
                            // Flush remaining finalized segments, then end.
                            if event_tx.send(event).await.is_err() {
                                return;
                            }
                            while let Some(rest) = script.pop_front() {
                                if matches!(rest, SttEvent::Final(_) | SttEvent::Ended)
                                    && event_tx.send(rest).await.is_err()
                                {
                                    return;
                                }
                            }
                            break;
                        }
                        Some(CaptureCommand::Abort) | None => return,
                    },
                    () = sleep(Duration::from_millis(2)) => {
                        if event_tx.send(event).await.is_err() {
                            return;
                        }
                    }
                }
            }
        });
        Ok(CaptureHandle::new(event_rx, cmd_tx))
    }
}

/// Resolves every playback request with a fixed outcome, recording the text.
pub struct ScriptedTts {
    outcome: SpeakOutcome,
    spoken: Mutex<Vec<String>>,
}

impl ScriptedTts {
    pub fn completing() -> Self {
        Self::with_outcome(SpeakOutcome::Completed)
    }

    pub fn failing() -> Self {
        Self::with_outcome(SpeakOutcome::Failed)
    }

    pub fn with_outcome(outcome: SpeakOutcome) -> Self {
        Self {
            outcome,
            spoken: Mutex::new(Vec::new()),
        }
    }

    /// Every text spoken so far, in order.
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TtsProvider for ScriptedTts {
    async fn speak(&self, text: &str, _locale: &str) -> SpeakOutcome {
        if let Ok(mut spoken) = self.spoken.lock() {
            spoken.push(text.to_owned());
        }
        // Yield so cancellation has a chance to race playback, as it would
        // against a real audio backend.
        sleep(Duration::from_millis(1)).await;
        self.outcome
    }
}
