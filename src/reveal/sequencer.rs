use super::diff::{diff_html, DiffSegment};
use super::variants::{build_variants, RevealVariant};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_FIRST_DELAY: Duration = Duration::from_millis(400);
pub const DEFAULT_SUBSEQUENT_DELAY: Duration = Duration::from_millis(1200);
pub const DEFAULT_DIFF_DURATION: Duration = Duration::from_millis(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealState {
    Idle,
    Revealing(usize),
    /// Highlight of the text new in variant `i` is showing.
    Diffing(usize),
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealTiming {
    pub first_delay: Duration,
    pub subsequent_delay: Duration,
    pub diff_duration: Duration,
}

impl Default for RevealTiming {
    fn default() -> Self {
        Self {
            first_delay: DEFAULT_FIRST_DELAY,
            subsequent_delay: DEFAULT_SUBSEQUENT_DELAY,
            diff_duration: DEFAULT_DIFF_DURATION,
        }
    }
}

/// What the presentation layer should show after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealFrame {
    pub generation: u64,
    pub state: RevealState,
    pub html: String,
    /// Non-empty only while `Diffing`.
    pub highlight: Vec<DiffSegment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextTimer {
    After(Duration),
    /// The last variant is showing; call `RevealMachine::complete`.
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealStep {
    pub frame: RevealFrame,
    pub next: NextTimer,
}

/// Timer-free reveal state machine. Every load bumps the generation and any
/// timer firing with an older generation is ignored.
#[derive(Debug)]
pub struct RevealMachine {
    timing: RevealTiming,
    variants: Vec<RevealVariant>,
    state: RevealState,
    generation: u64,
}

impl RevealMachine {
    pub fn new(timing: RevealTiming) -> Self {
        Self {
            timing,
            variants: Vec::new(),
            state: RevealState::Idle,
            generation: 0,
        }
    }

    pub fn state(&self) -> RevealState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn timing(&self) -> RevealTiming {
        self.timing
    }

    /// Starts a new sequence from `Idle`. The first timer should fire after
    /// `timing().first_delay`.
    pub fn load(&mut self, variants: Vec<RevealVariant>) -> u64 {
        self.generation += 1;
        self.variants = variants;
        self.state = RevealState::Idle;
        self.generation
    }

    pub fn reset(&mut self) {
        self.load(Vec::new());
    }

    pub fn on_timer(&mut self, generation: u64) -> Option<RevealStep> {
        if generation != self.generation {
            return None;
        }

        let next_state = match self.state {
            RevealState::Idle if !self.variants.is_empty() => RevealState::Revealing(0),
            RevealState::Revealing(i) if i + 1 < self.variants.len() => {
                RevealState::Diffing(i + 1)
            }
            RevealState::Diffing(i) => RevealState::Revealing(i),
            _ => return None,
        };
        self.state = next_state;

        let step = match next_state {
            RevealState::Revealing(i) => RevealStep {
                frame: self.frame(next_state, i, Vec::new()),
                next: if i + 1 < self.variants.len() {
                    NextTimer::After(self.timing.subsequent_delay)
                } else {
                    NextTimer::Complete
                },
            },
            RevealState::Diffing(i) => {
                let highlight = diff_html(
                    &self.variants[i - 1].html_content,
                    &self.variants[i].html_content,
                );
                RevealStep {
                    frame: self.frame(next_state, i, highlight),
                    next: NextTimer::After(self.timing.diff_duration),
                }
            }
            RevealState::Idle | RevealState::Done => return None,
        };
        Some(step)
    }

    /// Moves the last revealed variant to `Done`. Returns the final frame
    /// only on the first successful call for `generation`.
    pub fn complete(&mut self, generation: u64) -> Option<RevealFrame> {
        if generation != self.generation {
            return None;
        }
        match self.state {
            RevealState::Revealing(i) if i + 1 == self.variants.len() => {
                self.state = RevealState::Done;
                Some(self.frame(RevealState::Done, i, Vec::new()))
            }
            _ => None,
        }
    }

    fn frame(&self, state: RevealState, index: usize, highlight: Vec<DiffSegment>) -> RevealFrame {
        RevealFrame {
            generation: self.generation,
            state,
            html: self.variants[index].html_content.clone(),
            highlight,
        }
    }
}

/// Runs a `RevealMachine` on tokio timers for one display instance.
///
/// Starting a new sequence cancels the running one first; its pending timer
/// can neither emit frames nor fire its completion callback afterwards.
pub struct RevealDriver {
    machine: Arc<Mutex<RevealMachine>>,
    frames_tx: mpsc::UnboundedSender<RevealFrame>,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

impl RevealDriver {
    pub fn new(timing: RevealTiming, frames_tx: mpsc::UnboundedSender<RevealFrame>) -> Self {
        Self {
            machine: Arc::new(Mutex::new(RevealMachine::new(timing))),
            frames_tx,
            cancel: None,
            task: None,
        }
    }

    /// Builds variants for `full_text` and plays them. Must be called from
    /// within a tokio runtime.
    pub fn start<F>(&mut self, full_text: &str, on_complete: F) -> u64
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();

        let variants = build_variants(full_text);
        let (generation, first_delay) = {
            let mut machine = lock_machine(&self.machine);
            (machine.load(variants), machine.timing().first_delay)
        };

        let token = CancellationToken::new();
        self.cancel = Some(token.clone());
        self.task = Some(tokio::spawn(run_sequence(
            Arc::clone(&self.machine),
            self.frames_tx.clone(),
            token,
            generation,
            first_delay,
            on_complete,
        )));
        generation
    }

    pub fn cancel(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
        lock_machine(&self.machine).reset();
    }

    pub fn state(&self) -> RevealState {
        lock_machine(&self.machine).state()
    }
}

impl Drop for RevealDriver {
    fn drop(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
    }
}

// RevealMachine is plain data; a poisoned lock still guards a usable value.
fn lock_machine(machine: &Mutex<RevealMachine>) -> MutexGuard<'_, RevealMachine> {
    machine.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn run_sequence<F>(
    machine: Arc<Mutex<RevealMachine>>,
    frames_tx: mpsc::UnboundedSender<RevealFrame>,
    token: CancellationToken,
    generation: u64,
    first_delay: Duration,
    on_complete: F,
) where
    F: FnOnce() + Send + 'static,
{
    let mut delay = first_delay;
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }

        let step = lock_machine(&machine).on_timer(generation);
        let Some(step) = step else {
            return;
        };
        let _ = frames_tx.send(step.frame);

        match step.next {
            NextTimer::After(next_delay) => delay = next_delay,
            NextTimer::Complete => {
                let done = lock_machine(&machine).complete(generation);
                if let Some(frame) = done {
                    let _ = frames_tx.send(frame);
                    on_complete();
                }
                return;
            }
        }
    }
}
