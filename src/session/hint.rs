//! One cached hint per interviewer question.
//!
//! The cached hint belongs to the most recent interviewer question and is
//! invalidated whenever a new interviewer utterance is appended.  A fetch in
//! flight is remembered too, so asking again before it lands does not call
//! the hint service a second time.

#[derive(Debug, Default)]
pub struct HintCache {
    /// `(question, hint)` for the current question.
    entry: Option<(String, String)>,
    /// Question a fetch is currently running for.
    in_flight: Option<String>,
}

impl HintCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached hint for `question`, if any.
    pub fn get(&self, question: &str) -> Option<&str> {
        self.entry
            .as_ref()
            .filter(|(q, _)| q == question)
            .map(|(_, hint)| hint.as_str())
    }

    /// Mark a fetch for `question` as started.  `false` if one is already
    /// running for that question (the caller must not fetch again).
    pub fn begin_fetch(&mut self, question: &str) -> bool {
        if self.in_flight.as_deref() == Some(question) {
            return false;
        }
        self.in_flight = Some(question.to_string());
        true
    }

    /// Record a finished fetch.  Returns `false`, caching nothing, when
    /// `question` is no longer the one being fetched for.
    pub fn finish_fetch(&mut self, question: &str, hint: Option<String>) -> bool {
        if self.in_flight.as_deref() != Some(question) {
            return false;
        }
        self.in_flight = None;
        if let Some(hint) = hint {
            self.entry = Some((question.to_string(), hint));
        }
        true
    }

    /// Forget everything; a new interviewer question is on the table.
    pub fn invalidate(&mut self) {
        self.entry = None;
        self.in_flight = None;
    }
}
