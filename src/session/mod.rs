//! Turn-taking session: a pure state machine plus its async driver.

pub mod controller;
pub mod machine;

pub use controller::{PracticeSession, SessionEvent};
pub use machine::{
    Effect, MachineEvent, NO_CAPTURE_FEEDBACK, SessionCommand, SessionMachine, SessionSnapshot,
    TTS_FALLBACK_ADVISORY, TurnPhase,
};
