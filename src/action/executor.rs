//! Focus-gated action queue
//!
//! The executor owns a FIFO queue of [`Action`]s and two background tasks:
//! one samples window focus on a fixed cadence, the other drains the queue
//! while the window is focused. Losing focus discards everything pending.
//!
//! A stop applies to the queue as it stood when it was signaled: pending
//! actions are dropped at once and the running action ends, but anything
//! enqueued afterwards runs normally.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::primitives::{hold_key, move_pointer_gradually};
use super::{Action, MotionProfile, Routine, Step};
use crate::Result;
use crate::focus::FocusOracle;
use crate::input::SharedInput;

/// Polling cadence of the executor's background tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorTimings {
    /// How often window focus is sampled
    pub focus_poll: Duration,
    /// Pause between iterations of the execution loop
    pub tick: Duration,
}

impl Default for ExecutorTimings {
    fn default() -> Self {
        Self {
            focus_poll: Duration::from_millis(10),
            tick: Duration::from_millis(1),
        }
    }
}

/// State shared with the background tasks
struct Shared {
    window_title: String,
    queue: Mutex<VecDeque<Action>>,
    /// Set while an action popped from the queue is running
    in_flight: AtomicBool,
    /// Written only by the focus task
    window_focused: AtomicBool,
    /// Bumped by every stop, under the queue lock
    stop_generation: AtomicU64,
    /// Stop generation the running action started in
    running_generation: AtomicU64,
    oracle: Arc<dyn FocusOracle>,
    input: SharedInput,
    motion: MotionProfile,
    timings: ExecutorTimings,
}

/// Executes queued actions against the target window
pub struct ActionExecutor {
    shared: Arc<Shared>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ActionExecutor {
    /// Create an executor for the window whose title contains `window_title`.
    ///
    /// Nothing runs until [`ActionExecutor::start`] is called.
    #[must_use]
    pub fn new(
        window_title: impl Into<String>,
        oracle: Arc<dyn FocusOracle>,
        input: SharedInput,
        motion: MotionProfile,
        timings: ExecutorTimings,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                window_title: window_title.into(),
                queue: Mutex::new(VecDeque::new()),
                in_flight: AtomicBool::new(false),
                window_focused: AtomicBool::new(false),
                stop_generation: AtomicU64::new(0),
                running_generation: AtomicU64::new(0),
                oracle,
                input,
                motion,
                timings,
            }),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Launch the focus-poll and execution tasks. Calling this again while
    /// they run does nothing.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if !tasks.is_empty() {
            return;
        }

        tasks.push(tokio::spawn(poll_focus(Arc::clone(&self.shared))));
        tasks.push(tokio::spawn(drain_queue(Arc::clone(&self.shared))));

        tracing::info!(window = %self.shared.window_title, "action executor started");
    }

    /// Stop the background tasks. Pending actions are dropped and a key held
    /// by the running action is released as its task unwinds.
    pub fn shutdown(&self) {
        self.shared.stop("shutdown");

        let mut tasks = self.tasks.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for task in tasks.drain(..) {
            task.abort();
        }
        self.shared.in_flight.store(false, Ordering::Release);
    }

    /// Append an action to the tail of the queue
    pub fn enqueue(&self, action: Action) {
        let pending = {
            let mut queue = self.shared.queue();
            queue.push_back(action);
            queue.len()
        };
        tracing::debug!(%action, pending, "action enqueued");
    }

    /// Discard the queued actions and end the running one. Actions enqueued
    /// after this call are unaffected.
    pub fn signal_stop(&self) {
        self.shared.stop("stop requested");
        tracing::debug!("stop signaled");
    }

    /// Whether the running action has been told to stop and has not ended yet
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.shared.in_flight.load(Ordering::Acquire) && self.shared.running_stopped()
    }

    /// Most recently sampled focus of the target window
    #[must_use]
    pub fn is_window_focused(&self) -> bool {
        self.shared.window_focused.load(Ordering::Acquire)
    }

    /// No action is queued or running
    #[must_use]
    pub fn is_idle(&self) -> bool {
        let queue = self.shared.queue();
        queue.is_empty() && !self.shared.in_flight.load(Ordering::Acquire)
    }

    /// Number of queued actions, excluding one that is running
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.queue().len()
    }

    /// Title the focus check matches against
    #[must_use]
    pub fn window_title(&self) -> &str {
        &self.shared.window_title
    }
}

impl Drop for ActionExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Shared {
    fn queue(&self) -> MutexGuard<'_, VecDeque<Action>> {
        self.queue.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn focused(&self) -> bool {
        self.window_focused.load(Ordering::Acquire)
    }

    /// A stop was signaled after the running action began
    fn running_stopped(&self) -> bool {
        self.stop_generation.load(Ordering::Acquire)
            != self.running_generation.load(Ordering::Acquire)
    }

    /// Open while the window is focused and the running action is not stopped
    fn gate_open(&self) -> bool {
        self.focused() && !self.running_stopped()
    }

    /// Pop the head of the queue, marking it in flight under the same lock
    fn begin_next(&self) -> Option<Action> {
        let mut queue = self.queue();
        let action = queue.pop_front()?;
        self.running_generation
            .store(self.stop_generation.load(Ordering::Acquire), Ordering::Release);
        self.in_flight.store(true, Ordering::Release);
        Some(action)
    }

    /// Clear the queue and close the gate of the running action
    fn stop(&self, reason: &'static str) {
        let discarded = {
            let mut queue = self.queue();
            self.stop_generation.fetch_add(1, Ordering::AcqRel);
            let count = queue.len();
            queue.clear();
            count
        };

        if discarded > 0 {
            tracing::debug!(discarded, reason, "pending actions discarded");
        }
    }

    fn discard_pending(&self, reason: &'static str) {
        let discarded = {
            let mut queue = self.queue();
            let count = queue.len();
            queue.clear();
            count
        };

        if discarded > 0 {
            tracing::debug!(discarded, reason, "pending actions discarded");
        }
    }

    async fn perform(&self, action: Action) -> Result<()> {
        tracing::debug!(%action, "performing action");
        let gate = || self.gate_open();

        match action.routine(&self.motion) {
            Routine::Once(steps) => self.run_steps(&steps, &gate).await,
            Routine::UntilStopped(steps) => {
                let mut repetitions = 0u32;
                while gate() {
                    self.run_steps(&steps, &gate).await?;
                    repetitions += 1;
                    tokio::task::yield_now().await;
                }
                tracing::debug!(%action, repetitions, "continuous action ended");
                Ok(())
            }
        }
    }

    async fn run_steps(&self, steps: &[Step], gate: &(impl Fn() -> bool + Sync)) -> Result<()> {
        for step in steps {
            if !gate() {
                break;
            }
            match *step {
                Step::Key { key, hold } => {
                    hold_key(&self.input, key, hold, gate).await?;
                }
                Step::Pointer {
                    direction,
                    distance,
                    duration,
                } => {
                    move_pointer_gradually(&self.input, direction, distance, duration, gate)
                        .await?;
                }
            }
        }
        Ok(())
    }
}

/// Sample focus of the target window on a fixed cadence
async fn poll_focus(shared: Arc<Shared>) {
    let mut cadence = tokio::time::interval(shared.timings.focus_poll);
    cadence.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        cadence.tick().await;

        let focused = shared.oracle.is_focused(&shared.window_title);
        let was_focused = shared.window_focused.swap(focused, Ordering::AcqRel);
        if focused != was_focused {
            tracing::debug!(window = %shared.window_title, focused, "window focus changed");
        }
    }
}

/// Execute queued actions one at a time while the window is focused
async fn drain_queue(shared: Arc<Shared>) {
    loop {
        if shared.focused() {
            loop {
                if !shared.focused() {
                    break;
                }
                let Some(action) = shared.begin_next() else {
                    break;
                };

                if let Err(e) = shared.perform(action).await {
                    tracing::warn!(%action, error = %e, "action failed");
                }
                shared.in_flight.store(false, Ordering::Release);
            }
        } else {
            shared.discard_pending("window not focused");
        }

        tokio::time::sleep(shared.timings.tick).await;
    }
}
