//! Self-playing terminal walkthrough of a practice scenario.
//!
//! Stands in for a real front end: scripted speech capabilities replay the
//! practitioner's lines, the session judges them, and the transcript of the
//! exchange is printed as it happens.
//!
//! Usage: `rehearse-drill [scenario-id] [--mangle]`
//!
//! `--mangle` garbles every attempt so the failure path (feedback plus manual
//! advance) is exercised instead of the auto-advance path.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast;

use rehearse::config::PracticeConfig;
use rehearse::judge::build_judge;
use rehearse::scenario::{Catalogue, Speaker};
use rehearse::session::{PracticeSession, SessionCommand, SessionEvent};
use rehearse::test_utils::{ScriptedStt, ScriptedTts};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut scenario_id = String::from("grocery-store");
    let mut mangle = false;
    for arg in std::env::args().skip(1) {
        if arg == "--mangle" {
            mangle = true;
        } else {
            scenario_id = arg;
        }
    }

    let config = PracticeConfig::default();
    let catalogue = Catalogue::builtin().context("loading scenario catalogue")?;
    let scenario = catalogue
        .get(&scenario_id)
        .with_context(|| format!("no scenario named '{scenario_id}'"))?
        .clone();

    println!("=== {} ===", scenario.title);
    println!("{}\n", scenario.description);

    // One scripted capture per practitioner line, in dialogue order.
    let scripts: Vec<_> = scenario
        .dialogue
        .iter()
        .filter(|line| line.speaker == Speaker::Practitioner)
        .map(|line| {
            let text = if mangle {
                // Content words with no overlap, so every strategy fails it.
                "purple elephants juggle spreadsheets".to_owned()
            } else {
                line.text.clone()
            };
            ScriptedStt::utterance(&text)
        })
        .collect();

    let judge = build_judge(&config.judge)?;
    let stt = Arc::new(ScriptedStt::new(scripts));
    let tts = Arc::new(ScriptedTts::completing());

    let (event_tx, mut events) = broadcast::channel(64);
    let session = PracticeSession::new(Arc::new(scenario), judge, stt, tts, config.session)
        .with_events(event_tx);
    let commands = session.command_sender();
    let runner = tokio::spawn(session.run());

    loop {
        match events.recv().await {
            Ok(SessionEvent::LineStarted {
                speaker: Speaker::Reference,
                text,
                ..
            }) => println!("  partner: {text}"),
            Ok(SessionEvent::LineStarted {
                speaker: Speaker::Practitioner,
                text,
                ..
            }) => {
                println!("  (your line: {text})");
                commands.send(SessionCommand::StartRecording)?;
            }
            Ok(SessionEvent::FinalTranscript { text }) => println!("  you: {text}"),
            Ok(SessionEvent::Feedback { result }) => {
                let verdict = if result.passed { "pass" } else { "fail" };
                println!("  [{verdict}] {}", result.feedback);
                if let Some(corrected) = &result.corrected {
                    println!("  corrected: {corrected}");
                }
                if !result.passed {
                    commands.send(SessionCommand::AdvanceManually)?;
                }
            }
            Ok(SessionEvent::Advisory { message }) => println!("  ! {message}"),
            Ok(SessionEvent::Finished) => {
                println!("\nDialogue complete.");
                break;
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }

    runner.await.context("session task panicked")??;
    Ok(())
}
