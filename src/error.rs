//! Error types for the practice engine.

/// Top-level error type for the dialogue practice system.
#[derive(Debug, thiserror::Error)]
pub enum PracticeError {
    /// Scenario catalogue error (malformed or missing dialogue data).
    #[error("scenario error: {0}")]
    Scenario(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Speech-to-text capture error.
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech playback error.
    #[error("TTS error: {0}")]
    Tts(String),

    /// Similarity judge error (model unreachable or malformed reply).
    #[error("judge error: {0}")]
    Judge(String),

    /// Session coordination error.
    #[error("session error: {0}")]
    Session(String),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, PracticeError>;
