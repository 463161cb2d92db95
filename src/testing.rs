//! Test doubles for the probe and notifier seams.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use speedwatch_adapters::{Notifier, NotifyError, ProbeError, SpeedProbe};
use speedwatch_types::Throughput;

type Fallback = Box<dyn Fn() -> Result<Throughput, ProbeError> + Send + Sync>;

/// Returns queued results in order, then the fallback.
pub struct ScriptedProbe {
    script: Mutex<VecDeque<Result<Throughput, ProbeError>>>,
    fallback: Fallback,
    delay: Option<Duration>,
    calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl std::fmt::Debug for ScriptedProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedProbe")
            .field("remaining", &self.script.lock().len())
            .field("calls", &self.calls())
            .finish()
    }
}

impl ScriptedProbe {
    /// Plays `script`, then fails every call.
    pub fn new(script: Vec<Result<Throughput, ProbeError>>) -> Self {
        Self::with_fallback(script, Box::new(|| Err(ProbeError::Command("script exhausted".into()))))
    }

    pub fn failing(error: impl Fn() -> ProbeError + Send + Sync + 'static) -> Self {
        Self::with_fallback(Vec::new(), Box::new(move || Err(error())))
    }

    pub fn repeating(throughput: Throughput) -> Self {
        Self::with_fallback(Vec::new(), Box::new(move || Ok(throughput)))
    }

    fn with_fallback(script: Vec<Result<Throughput, ProbeError>>, fallback: Fallback) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            delay: None,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Block each call for `delay`, like a real speed test.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls currently inside `probe`.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Most calls ever inside `probe` at the same time.
    pub fn peak_active(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl SpeedProbe for ScriptedProbe {
    fn probe(&self) -> Result<Throughput, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        let next = self.script.lock().pop_front();
        self.active.fetch_sub(1, Ordering::SeqCst);
        next.unwrap_or_else(|| (self.fallback)())
    }

    fn description(&self) -> &str {
        "scripted"
    }
}

/// Records every message; optionally rejects them all.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
    attempts: AtomicUsize,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) -> Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(NotifyError::Rejected("550 mailbox unavailable".into()));
        }
        self.messages.lock().push(message.to_owned());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}
