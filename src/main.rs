//! Application entry point: voice interview in the terminal.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (writes the defaults on first run).
//! 3. Read the résumé.
//! 4. Create [`tokio`] runtime (multi-thread, 2 workers).
//! 5. Build the [`BackendClient`] and the answer provider (microphone, or
//!    the candidate simulator in test mode).
//! 6. Spawn the session loop and start the interview.
//! 7. Spawn the keyboard thread (`h` hint / resume, `f` finish, `s` start
//!    again, `q` quit).
//! 8. Print caption, hint, alert and evaluation changes until quit.

use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use voice_interview::{
    audio::{CpalInput, PlaybackSink, RodioSink},
    config::{AppConfig, AppPaths},
    services::BackendClient,
    session::{
        AnswerProvider, CaptureSessionManager, InterviewSession, SessionHandle, SessionServices,
        SessionSettings, SessionState, Speaker, TestModeDriver,
    },
};

// ---------------------------------------------------------------------------
// Keyboard thread
// ---------------------------------------------------------------------------

/// Reads single-letter commands from stdin until `q` or end of input.
fn spawn_keyboard(handle: SessionHandle) -> std::io::Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name("keyboard".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                let alive = match line.trim() {
                    "h" => handle.toggle_hint(),
                    "f" => handle.finish(),
                    "s" => handle.start(),
                    "q" => break,
                    "" => true,
                    other => {
                        println!("unknown command {other:?} (h = hint, f = finish, s = start, q = quit)");
                        true
                    }
                };
                if !alive {
                    return;
                }
            }
            handle.shutdown();
        })
}

// ---------------------------------------------------------------------------
// Terminal renderer
// ---------------------------------------------------------------------------

/// Print what changed between two snapshots.
fn render(prev: &SessionState, next: &SessionState) {
    if next.turn != prev.turn {
        println!(
            "── {} ({}/{} questions)",
            next.turn.label(),
            next.questions_asked,
            next.target_questions
        );
    }
    if next.caption != prev.caption && !next.caption.text.is_empty() {
        match next.caption.speaker {
            Speaker::Interviewer => println!("Interviewer: {}", next.caption.text),
            Speaker::Candidate => println!("You: {}", next.caption.text),
            Speaker::None => println!("[{}]", next.caption.text),
        }
    }
    if next.hint_loading && !prev.hint_loading {
        println!("[fetching hint…]");
    }
    if next.hint != prev.hint {
        if let Some(hint) = &next.hint {
            println!("Hint: {hint}\n[press h to resume]");
        }
    }
    if next.alert != prev.alert {
        if let Some(alert) = &next.alert {
            println!("! {alert}");
        }
    }
    if next.evaluation != prev.evaluation {
        if let Some(evaluation) = &next.evaluation {
            println!("\n=== Score: {}/100 ===", evaluation.score);
            println!("{}\n\n{}", evaluation.summary, evaluation.feedback);
            println!("\n[press s to start again, q to quit]");
        }
    }
}

async fn render_loop(handle: SessionHandle) {
    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    let mut prev = SessionState::default();
    loop {
        ticker.tick().await;
        let next = handle.snapshot();
        render(&prev, &next);
        prev = next;
    }
}

// ---------------------------------------------------------------------------
// Session wiring
// ---------------------------------------------------------------------------

async fn run(config: AppConfig, resume_text: String) -> anyhow::Result<()> {
    // 5. Collaborators
    let backend = Arc::new(BackendClient::from_config(&config.backend));
    log::info!("Backend: {}", config.backend.base_url);

    let answers: Box<dyn AnswerProvider> = if config.interview.test_mode {
        log::info!("Test mode: answers come from the candidate simulator");
        Box::new(TestModeDriver::new(backend.clone(), &config.simulation))
    } else {
        let input = CpalInput::new(
            config.audio.input_device.clone(),
            config.endpointer.fft_size,
        );
        Box::new(CaptureSessionManager::new(
            Arc::new(input),
            backend.clone(),
            config.endpointer.clone(),
            config.audio.upload_sample_rate,
        ))
    };

    let sink: Arc<dyn PlaybackSink> =
        Arc::new(RodioSink::new().context("failed to open the audio output")?);

    let services = SessionServices {
        utterances: backend.clone(),
        hints: backend.clone(),
        evaluator: backend,
    };

    // 6. Session loop
    let settings = SessionSettings::from_config(&config, resume_text);
    let session = InterviewSession::new(settings, services, answers, sink);
    let (handle, session_task) = session.spawn();
    handle.start();

    println!("Commands: h = hint / resume, f = finish, s = start again, q = quit");

    // 7. Keyboard
    let _keyboard = spawn_keyboard(handle.clone()).context("failed to spawn keyboard thread")?;

    // 8. Render until the session loop stops
    let renderer = tokio::spawn(render_loop(handle.clone()));
    session_task.await.context("session loop panicked")?;
    renderer.abort();

    log::info!("Voice interview shut down");
    Ok(())
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Voice interview starting up");

    // 2. Configuration (first run writes the defaults out for editing)
    let paths = AppPaths::new();
    let first_run = !paths.settings_file.exists();
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    if first_run {
        match config.save() {
            Ok(()) => log::info!("Wrote default settings to {}", paths.settings_file.display()),
            Err(e) => log::warn!("Could not write default settings: {e:#}"),
        }
    }

    // 3. Résumé
    let resume_text = config.read_resume().unwrap_or_else(|e| {
        log::warn!("{e:#}; interviewing without a résumé");
        String::new()
    });

    // 4. Tokio runtime (2 worker threads)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    rt.block_on(run(config, resume_text))
}
