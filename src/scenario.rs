//! Dialogue scenario catalogue.
//!
//! Scenarios are scripted two-party dialogues: reference lines are spoken to
//! the practitioner, practitioner lines are the ones they must say aloud.
//! The catalogue is static configuration, loaded and validated once at
//! session start and read-only afterwards.

use serde::{Deserialize, Serialize};

use crate::error::{PracticeError, Result};

/// Embedded default catalogue.
const BUILTIN_CATALOGUE: &str = include_str!("../assets/scenarios.toml");

/// Who delivers a dialogue line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Speaker {
    /// The scripted partner; delivered via synthesized speech.
    Reference,
    /// The practitioner; captured via speech recognition and judged.
    Practitioner,
}

/// One line of a dialogue. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueLine {
    /// Unique within the enclosing scenario.
    pub id: String,
    pub speaker: Speaker,
    /// The canonical sentence.
    pub text: String,
    /// Optional translation, carried through unmodified for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
}

/// A scripted practice dialogue with descriptive metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Display icon key for the presentation layer.
    pub icon: String,
    #[serde(rename = "line")]
    pub dialogue: Vec<DialogueLine>,
}

impl Scenario {
    /// Number of practitioner lines in this scenario.
    pub fn practitioner_line_count(&self) -> usize {
        self.dialogue
            .iter()
            .filter(|l| l.speaker == Speaker::Practitioner)
            .count()
    }

    /// Practitioner lines completed before `index`, for progress display.
    pub fn practitioner_lines_before(&self, index: usize) -> usize {
        self.dialogue
            .iter()
            .take(index)
            .filter(|l| l.speaker == Speaker::Practitioner)
            .count()
    }

    /// Fraction of practitioner lines completed before `index`, in `0.0..=1.0`.
    pub fn progress(&self, index: usize) -> f32 {
        let total = self.practitioner_line_count();
        if total == 0 {
            return 0.0;
        }
        self.practitioner_lines_before(index) as f32 / total as f32
    }

    fn validate(&self) -> Result<()> {
        if self.dialogue.is_empty() {
            return Err(PracticeError::Scenario(format!(
                "scenario '{}' has no dialogue lines",
                self.id
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for line in &self.dialogue {
            if !seen.insert(line.id.as_str()) {
                return Err(PracticeError::Scenario(format!(
                    "scenario '{}' has duplicate line id '{}'",
                    self.id, line.id
                )));
            }
            if line.text.trim().is_empty() {
                return Err(PracticeError::Scenario(format!(
                    "scenario '{}' line '{}' has empty text",
                    self.id, line.id
                )));
            }
        }
        Ok(())
    }
}

/// The full set of available scenarios.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalogue {
    #[serde(rename = "scenario")]
    pub scenarios: Vec<Scenario>,
}

impl Catalogue {
    /// Load and validate the embedded catalogue.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded data is malformed; this is fatal at
    /// startup by design.
    pub fn builtin() -> Result<Self> {
        Self::from_toml(BUILTIN_CATALOGUE)
    }

    /// Parse and validate a catalogue from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error on parse failure, an empty catalogue, duplicate
    /// scenario ids, or any scenario failing its own validation.
    pub fn from_toml(text: &str) -> Result<Self> {
        let catalogue: Self = toml::from_str(text)
            .map_err(|e| PracticeError::Scenario(format!("malformed catalogue: {e}")))?;
        catalogue.validate()?;
        Ok(catalogue)
    }

    /// Look up a scenario by id.
    pub fn get(&self, id: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.id == id)
    }

    fn validate(&self) -> Result<()> {
        if self.scenarios.is_empty() {
            return Err(PracticeError::Scenario("catalogue is empty".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for scenario in &self.scenarios {
            if !seen.insert(scenario.id.as_str()) {
                return Err(PracticeError::Scenario(format!(
                    "duplicate scenario id '{}'",
                    scenario.id
                )));
            }
            scenario.validate()?;
        }
        Ok(())
    }
}
