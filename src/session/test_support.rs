//! Scripted collaborators and a session harness for the session tests.
//!
//! Every double counts its calls so tests can assert on side effects
//! ("the transcriber was never reached") as well as on session state.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::audio::{
    AudioChunk, AudioInput, AudioPayload, CaptureError, InputStream, OpenedInput,
    PlaybackError, PlaybackSink, SharedChunks, SpectrumAnalyser,
};
use crate::config::{EndpointerConfig, SimulationConfig};
use crate::conversation::ConversationMessage;
use crate::services::{
    CandidateSimulator, Evaluation, Evaluator, HintRequest, HintService, ServiceError,
    SimulationRequest, Transcriber, Utterance, UtteranceGenerator, UtteranceRequest,
};

use super::answer::AnswerProvider;
use super::capture::CaptureSessionManager;
use super::machine::{InterviewSession, SessionHandle, SessionServices, SessionSettings};
use super::simulated::TestModeDriver;
use super::state::SessionState;

fn backend_error() -> ServiceError {
    ServiceError::Status {
        status: 500,
        body: "boom".into(),
    }
}

// ---------------------------------------------------------------------------
// MockInput
// ---------------------------------------------------------------------------

const SPEAKING_LEVEL: u8 = 120;

#[derive(Default)]
struct InputCounters {
    opened: AtomicUsize,
    closed: AtomicUsize,
    live: AtomicUsize,
    max_concurrent: AtomicUsize,
}

/// Fake microphone whose spectrum sits at a settable flat level.
pub(crate) struct MockInput {
    level: Arc<AtomicU8>,
    with_audio: bool,
    broken: bool,
    counters: Arc<InputCounters>,
}

impl MockInput {
    fn build(level: u8, with_audio: bool, broken: bool) -> Arc<Self> {
        Arc::new(Self {
            level: Arc::new(AtomicU8::new(level)),
            with_audio,
            broken,
            counters: Arc::default(),
        })
    }

    /// Loud input: the endpointer never fires until [`go_quiet`](Self::go_quiet).
    pub fn speaking() -> Arc<Self> {
        Self::build(SPEAKING_LEVEL, true, false)
    }

    /// Quiet input with buffered audio: end-of-speech after the silence
    /// window.
    pub fn silent() -> Arc<Self> {
        Self::build(0, true, false)
    }

    /// Quiet input that never delivers a sample.
    pub fn silent_without_audio() -> Arc<Self> {
        Self::build(0, false, false)
    }

    /// Every open fails.
    pub fn broken() -> Arc<Self> {
        Self::build(0, true, true)
    }

    pub fn go_quiet(&self) {
        self.level.store(0, Ordering::SeqCst);
    }

    /// Total successful opens.
    pub fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }

    /// Streams currently open.
    pub fn open_now(&self) -> usize {
        self.counters.live.load(Ordering::SeqCst)
    }

    pub fn max_concurrent(&self) -> usize {
        self.counters.max_concurrent.load(Ordering::SeqCst)
    }
}

impl AudioInput for MockInput {
    fn open(&self, chunks: SharedChunks) -> Result<OpenedInput, CaptureError> {
        if self.broken {
            return Err(CaptureError::NoDevice);
        }

        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        let live = self.counters.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_concurrent.fetch_max(live, Ordering::SeqCst);

        if self.with_audio {
            if let Ok(mut buffered) = chunks.lock() {
                buffered.push(AudioChunk {
                    samples: vec![0.25; 1_600],
                    sample_rate: 16_000,
                    channels: 1,
                });
            }
        }

        Ok(OpenedInput {
            stream: Box::new(MockStream {
                counters: Arc::clone(&self.counters),
                closed: false,
            }),
            analyser: Arc::new(ScriptedAnalyser {
                level: Arc::clone(&self.level),
            }),
        })
    }
}

struct MockStream {
    counters: Arc<InputCounters>,
    closed: bool,
}

impl InputStream for MockStream {
    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        self.counters.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.close();
    }
}

struct ScriptedAnalyser {
    level: Arc<AtomicU8>,
}

impl SpectrumAnalyser for ScriptedAnalyser {
    fn frequency_bins(&self) -> Vec<u8> {
        vec![self.level.load(Ordering::SeqCst); 256]
    }
}

// ---------------------------------------------------------------------------
// MockTranscriber
// ---------------------------------------------------------------------------

/// Replies from a queue; the last reply repeats once the queue is down to
/// one entry.
pub(crate) struct MockTranscriber {
    replies: Mutex<VecDeque<Result<String, ServiceError>>>,
    delay: Duration,
    calls: AtomicUsize,
}

impl MockTranscriber {
    fn with_replies(replies: Vec<Result<String, ServiceError>>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn saying(text: &str) -> Arc<Self> {
        Self::with_replies(vec![Ok(text.to_string())], Duration::ZERO)
    }

    /// Takes `delay` to transcribe each answer.
    pub fn slow(text: &str, delay: Duration) -> Arc<Self> {
        Self::with_replies(vec![Ok(text.to_string())], delay)
    }

    pub fn sequence(texts: &[&str]) -> Arc<Self> {
        Self::with_replies(
            texts.iter().map(|t| Ok(t.to_string())).collect(),
            Duration::ZERO,
        )
    }

    pub fn failing() -> Arc<Self> {
        Self::with_replies(vec![Err(backend_error())], Duration::ZERO)
    }

    pub fn failing_then(text: &str) -> Arc<Self> {
        Self::with_replies(
            vec![Err(backend_error()), Ok(text.to_string())],
            Duration::ZERO,
        )
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, _audio: AudioPayload) -> Result<String, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let mut replies = self.replies.lock().unwrap();
        if replies.len() > 1 {
            replies.pop_front().unwrap()
        } else {
            replies.front().cloned().unwrap_or_else(|| Ok(String::new()))
        }
    }
}

// ---------------------------------------------------------------------------
// MockSimulator
// ---------------------------------------------------------------------------

pub(crate) struct MockSimulator {
    reply: Result<String, ServiceError>,
    calls: AtomicUsize,
    last_resume: Mutex<Option<String>>,
}

impl MockSimulator {
    pub fn answering(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
            last_resume: Mutex::new(None),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: Err(backend_error()),
            calls: AtomicUsize::new(0),
            last_resume: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_resume(&self) -> Option<String> {
        self.last_resume.lock().unwrap().clone()
    }
}

#[async_trait]
impl CandidateSimulator for MockSimulator {
    async fn simulate(&self, request: SimulationRequest) -> Result<String, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_resume.lock().unwrap() = Some(request.resume_text);
        self.reply.clone()
    }
}

// ---------------------------------------------------------------------------
// MockSink
// ---------------------------------------------------------------------------

/// Speaker that "plays" for a fixed duration.
pub(crate) struct MockSink {
    duration: Duration,
    broken: bool,
    plays: AtomicUsize,
    stops: AtomicUsize,
}

impl MockSink {
    pub fn lasting(duration: Duration) -> Arc<Self> {
        Arc::new(Self {
            duration,
            broken: false,
            plays: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        })
    }

    pub fn broken() -> Arc<Self> {
        Arc::new(Self {
            duration: Duration::ZERO,
            broken: true,
            plays: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        })
    }

    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlaybackSink for MockSink {
    async fn play(&self, _audio: AudioPayload) -> Result<(), PlaybackError> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        if self.broken {
            return Err(PlaybackError::DeviceThread);
        }
        tokio::time::sleep(self.duration).await;
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// MockEvaluator
// ---------------------------------------------------------------------------

pub(crate) struct MockEvaluator {
    score: u32,
    failures_left: AtomicUsize,
    delay: Duration,
    calls: AtomicUsize,
    histories: Mutex<Vec<Vec<ConversationMessage>>>,
}

impl MockEvaluator {
    fn build(score: u32, failures: usize, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            score,
            failures_left: AtomicUsize::new(failures),
            delay,
            calls: AtomicUsize::new(0),
            histories: Mutex::new(Vec::new()),
        })
    }

    pub fn scoring(score: u32) -> Arc<Self> {
        Self::build(score, 0, Duration::ZERO)
    }

    /// Takes `delay` to answer, so concurrent finish triggers overlap.
    pub fn slow(score: u32, delay: Duration) -> Arc<Self> {
        Self::build(score, 0, delay)
    }

    /// Fails the first request, then scores.
    pub fn failing_once(score: u32) -> Arc<Self> {
        Self::build(score, 1, Duration::ZERO)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Histories submitted for evaluation, in call order.
    pub fn histories(&self) -> Vec<Vec<ConversationMessage>> {
        self.histories.lock().unwrap().clone()
    }
}

#[async_trait]
impl Evaluator for MockEvaluator {
    async fn evaluate(&self, history: Vec<ConversationMessage>) -> Result<Evaluation, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.histories.lock().unwrap().push(history);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(backend_error());
        }

        Ok(Evaluation {
            score: self.score,
            feedback: "Clear answers.".into(),
            summary: "Solid interview.".into(),
        })
    }
}

// ---------------------------------------------------------------------------
// ScriptedGenerator
// ---------------------------------------------------------------------------

pub(crate) fn question(text: &str) -> Utterance {
    Utterance {
        text: text.to_string(),
        audio: AudioPayload::mp3(vec![0xFF, 0xFB, 0x90]),
        is_final: false,
    }
}

pub(crate) fn closing(text: &str) -> Utterance {
    Utterance {
        is_final: true,
        ..question(text)
    }
}

/// Returns queued utterances in order, then a generic follow-up question
/// (or an error, for a failing generator).
pub(crate) struct ScriptedGenerator {
    script: Mutex<VecDeque<Utterance>>,
    failing: bool,
    requests: Mutex<Vec<UtteranceRequest>>,
}

impl ScriptedGenerator {
    pub fn new(script: Vec<Utterance>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            failing: false,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Self::failing_after(Vec::new())
    }

    /// Plays `script`, then fails every later request.
    pub fn failing_after(script: Vec<Utterance>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            failing: true,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<UtteranceRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl UtteranceGenerator for ScriptedGenerator {
    async fn next_utterance(&self, request: UtteranceRequest) -> Result<Utterance, ServiceError> {
        self.requests.lock().unwrap().push(request);
        match self.script.lock().unwrap().pop_front() {
            Some(utterance) => Ok(utterance),
            None if self.failing => Err(backend_error()),
            None => Ok(question("Tell me more about that.")),
        }
    }
}

// ---------------------------------------------------------------------------
// MockHints
// ---------------------------------------------------------------------------

/// Replies from a queue of `(reply, delay)`; the last entry repeats.
pub(crate) struct MockHints {
    replies: Mutex<VecDeque<(Result<String, ServiceError>, Duration)>>,
    requests: Mutex<Vec<HintRequest>>,
}

impl MockHints {
    pub fn answering(text: &str) -> Arc<Self> {
        Self::slow(text, Duration::ZERO)
    }

    pub fn slow(text: &str, delay: Duration) -> Arc<Self> {
        Self::sequence(vec![(Some(text), delay)])
    }

    pub fn failing() -> Arc<Self> {
        Self::sequence(vec![(None, Duration::ZERO)])
    }

    /// One entry per call: `Some(hint)` or `None` for a failure, after the
    /// given delay.
    pub fn sequence(replies: Vec<(Option<&str>, Duration)>) -> Arc<Self> {
        let replies = replies
            .into_iter()
            .map(|(reply, delay)| (reply.map(str::to_string).ok_or_else(backend_error), delay))
            .collect();
        Arc::new(Self {
            replies: Mutex::new(replies),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<HintRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HintService for MockHints {
    async fn hint(&self, request: HintRequest) -> Result<String, ServiceError> {
        self.requests.lock().unwrap().push(request);
        let (reply, delay) = {
            let mut replies = self.replies.lock().unwrap();
            if replies.len() > 1 {
                replies.pop_front().unwrap()
            } else {
                replies.front().cloned().unwrap()
            }
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        reply
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub(crate) fn settings() -> SessionSettings {
    SessionSettings {
        role: "Backend Engineer".into(),
        target_question_count: 3,
        resume_text: "Five years of Rust and Go".into(),
        session_time_limit: None,
        max_silent_retries: Some(5),
        test_mode: false,
    }
}

/// A running session plus the doubles behind it.
pub(crate) struct Harness {
    pub handle: SessionHandle,
    pub task: JoinHandle<()>,
    pub generator: Arc<ScriptedGenerator>,
    pub hints: Arc<MockHints>,
    pub evaluator: Arc<MockEvaluator>,
    pub sink: Arc<MockSink>,
}

pub(crate) struct HarnessBuilder {
    settings: SessionSettings,
    generator: Arc<ScriptedGenerator>,
    hints: Arc<MockHints>,
    evaluator: Arc<MockEvaluator>,
    sink: Arc<MockSink>,
}

impl HarnessBuilder {
    pub fn new(generator: Arc<ScriptedGenerator>) -> Self {
        Self {
            settings: settings(),
            generator,
            hints: MockHints::answering("Start with the outcome, then the details."),
            evaluator: MockEvaluator::scoring(82),
            sink: MockSink::lasting(Duration::from_secs(1)),
        }
    }

    pub fn settings(mut self, f: impl FnOnce(&mut SessionSettings)) -> Self {
        f(&mut self.settings);
        self
    }

    pub fn hints(mut self, hints: Arc<MockHints>) -> Self {
        self.hints = hints;
        self
    }

    pub fn evaluator(mut self, evaluator: Arc<MockEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn sink(mut self, sink: Arc<MockSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Answer with the microphone double.
    pub fn live(self, input: &Arc<MockInput>, transcriber: &Arc<MockTranscriber>) -> Harness {
        let answers = CaptureSessionManager::new(
            input.clone(),
            transcriber.clone(),
            EndpointerConfig::default(),
            16_000,
        );
        self.spawn(Box::new(answers))
    }

    /// Answer with the candidate simulator.
    pub fn simulated(mut self, simulator: &Arc<MockSimulator>) -> Harness {
        self.settings.test_mode = true;
        let answers = TestModeDriver::new(simulator.clone(), &SimulationConfig::default());
        self.spawn(Box::new(answers))
    }

    fn spawn(self, answers: Box<dyn AnswerProvider>) -> Harness {
        let services = SessionServices {
            utterances: self.generator.clone(),
            hints: self.hints.clone(),
            evaluator: self.evaluator.clone(),
        };
        let session = InterviewSession::new(self.settings, services, answers, self.sink.clone());
        let (handle, task) = session.spawn();

        Harness {
            handle,
            task,
            generator: self.generator,
            hints: self.hints,
            evaluator: self.evaluator,
            sink: self.sink,
        }
    }
}

/// Poll the session snapshot (in virtual time) until `pred` holds.
pub(crate) async fn wait_until(
    handle: &SessionHandle,
    what: &str,
    pred: impl Fn(&SessionState) -> bool,
) -> SessionState {
    for _ in 0..20_000 {
        let snapshot = handle.snapshot();
        if pred(&snapshot) {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}: {:#?}", handle.snapshot());
}
