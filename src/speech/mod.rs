//! Injected speech capability interfaces.
//!
//! The engine never touches audio itself: capture and playback are external
//! collaborators behind [`SttProvider`] and [`TtsProvider`]. This keeps the
//! session controller testable with fake providers that deliver scripted
//! events.

use crate::error::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Error categories an STT capability may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SttErrorCode {
    /// The capability heard nothing it could transcribe.
    NoSpeech,
    /// Microphone / audio capture failure.
    AudioCapture,
    /// Microphone permission denied.
    PermissionDenied,
    /// Network failure in a remote recognizer.
    Network,
    /// Capture was aborted before finishing.
    Aborted,
    /// Anything else.
    Other,
}

impl SttErrorCode {
    /// User-facing advisory message for this error category.
    pub fn advisory(self) -> &'static str {
        match self {
            Self::NoSpeech => "No speech was detected. Please try again.",
            Self::AudioCapture => {
                "Audio capture failed. Ensure your microphone is working and permissions are granted."
            }
            Self::PermissionDenied => {
                "Microphone access denied. Please allow microphone access in your settings."
            }
            Self::Network => "Speech recognition is unreachable. Check your connection.",
            Self::Aborted => "Recording was interrupted.",
            Self::Other => "Speech recognition failed. Please try again.",
        }
    }
}

/// Incremental output of one capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SttEvent {
    /// Interim transcription, display-only. Never judged.
    Partial(String),
    /// A finalized transcription segment.
    Final(String),
    /// The capture has ended; no further events follow.
    Ended,
    /// The capability reported an error. May be followed by `Ended`.
    Error(SttErrorCode),
}

/// Control messages sent back to a running capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureCommand {
    /// Finish capturing and finalize pending text.
    Stop,
    /// Cancel capturing, discarding output.
    Abort,
}

/// Handle to one in-flight capture: an event stream plus a control channel.
///
/// Dropping the handle is equivalent to aborting.
pub struct CaptureHandle {
    events: mpsc::Receiver<SttEvent>,
    commands: mpsc::UnboundedSender<CaptureCommand>,
}

impl CaptureHandle {
    /// Pair an event receiver with a command sender.
    pub fn new(
        events: mpsc::Receiver<SttEvent>,
        commands: mpsc::UnboundedSender<CaptureCommand>,
    ) -> Self {
        Self { events, commands }
    }

    /// Receive the next capture event. `None` once the provider side closes.
    pub async fn next_event(&mut self) -> Option<SttEvent> {
        self.events.recv().await
    }

    /// Ask the provider to finish capturing and finalize pending text.
    pub fn stop(&self) {
        let _ = self.commands.send(CaptureCommand::Stop);
    }

    /// Cancel the capture, discarding output.
    pub fn abort(&self) {
        let _ = self.commands.send(CaptureCommand::Abort);
    }
}

/// Speech-to-text capability.
#[async_trait]
pub trait SttProvider: Send + Sync {
    /// Begin one capture in the given locale.
    ///
    /// # Errors
    ///
    /// Returns an error only if capture cannot start at all; failures during
    /// capture are reported as [`SttEvent::Error`] on the handle.
    async fn start_capture(&self, locale: &str) -> Result<CaptureHandle>;
}

/// How one playback request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakOutcome {
    /// Playback finished normally.
    Completed,
    /// Playback started but failed, or could not start.
    Failed,
    /// The capability is absent on this platform.
    Unsupported,
}

/// Text-to-speech capability.
///
/// `speak` never errors: the controller handles [`SpeakOutcome::Failed`] and
/// [`SpeakOutcome::Unsupported`] identically via a timed fallback advance.
#[async_trait]
pub trait TtsProvider: Send + Sync {
    /// Speak the text, resolving when playback ends one way or another.
    async fn speak(&self, text: &str, locale: &str) -> SpeakOutcome;
}
