use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Monotonic exhibition clock advanced by [`Scheduler::tick`].
#[derive(Debug, Default, Clone)]
pub struct PlaybackClock {
    pub time_seconds: f32,
}

impl PlaybackClock {
    pub fn reset(&mut self) {
        self.time_seconds = 0.0;
    }

    pub fn advance(&mut self, delta: f32) {
        self.time_seconds = (self.time_seconds + delta).max(0.0);
    }
}

/// Returned by a task callback to decide whether it runs again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskControl {
    Continue,
    Stop,
}

/// Handle to a scheduled task. Cancelling is idempotent and takes effect
/// before the next time the task would run, including later in the same tick.
#[derive(Debug, Clone, Default)]
pub struct TaskHandle {
    cancelled: Arc<AtomicBool>,
}

impl TaskHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// `true` until the task is cancelled or has stopped itself.
    pub fn is_pending(&self) -> bool {
        !self.cancelled.load(Ordering::SeqCst)
    }
}

enum Cadence {
    EveryFrame,
    Interval { period: f32, elapsed: f32 },
}

type TaskFn = Box<dyn FnMut(f32) -> TaskControl + Send>;

struct Task {
    handle: TaskHandle,
    cadence: Cadence,
    callback: TaskFn,
}

#[derive(Default)]
struct SchedulerState {
    clock: PlaybackClock,
    tasks: Vec<Task>,
    /// Handles of the tasks taken out by the running tick.
    in_flight: Vec<TaskHandle>,
}

/// Cooperative scheduler for animation-frame and interval tasks.
///
/// Cloning yields another handle to the same task list, so modules keep one
/// to schedule their own loops while the host drives [`Scheduler::tick`].
/// Callbacks run without the scheduler lock held and may schedule or cancel
/// other tasks.
#[derive(Clone, Default)]
pub struct Scheduler {
    shared: Arc<Mutex<SchedulerState>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `callback` on every tick until it returns [`TaskControl::Stop`]
    /// or the handle is cancelled. The callback receives the clock time.
    pub fn schedule_frame<F>(&self, callback: F) -> TaskHandle
    where
        F: FnMut(f32) -> TaskControl + Send + 'static,
    {
        self.push(Cadence::EveryFrame, Box::new(callback))
    }

    /// Runs `callback` each time `period_seconds` of clock time has elapsed.
    /// A non-positive period degrades to a frame task.
    pub fn schedule_interval<F>(&self, period_seconds: f32, callback: F) -> TaskHandle
    where
        F: FnMut(f32) -> TaskControl + Send + 'static,
    {
        let cadence = if period_seconds > 0.0 {
            Cadence::Interval {
                period: period_seconds,
                elapsed: 0.0,
            }
        } else {
            Cadence::EveryFrame
        };
        self.push(cadence, Box::new(callback))
    }

    /// Advances the clock by `delta_seconds` and runs every due task once.
    /// Returns how many callbacks ran.
    pub fn tick(&self, delta_seconds: f32) -> usize {
        let delta = delta_seconds.max(0.0);
        let (now, due) = {
            let mut state = self.shared.lock();
            state.clock.advance(delta);
            let due = std::mem::take(&mut state.tasks);
            state.in_flight = due.iter().map(|task| task.handle.clone()).collect();
            (state.clock.time_seconds, due)
        };

        let mut kept = Vec::with_capacity(due.len());
        let mut ran = 0;
        for mut task in due {
            if !task.handle.is_pending() {
                continue;
            }

            let run = match &mut task.cadence {
                Cadence::EveryFrame => true,
                Cadence::Interval { period, elapsed } => {
                    *elapsed += delta;
                    if *elapsed >= *period {
                        *elapsed %= *period;
                        true
                    } else {
                        false
                    }
                }
            };

            if run {
                ran += 1;
                if (task.callback)(now) == TaskControl::Stop {
                    task.handle.cancel();
                }
            }

            if task.handle.is_pending() {
                kept.push(task);
            }
        }

        let mut state = self.shared.lock();
        state.in_flight.clear();
        kept.retain(|task| task.handle.is_pending());
        kept.append(&mut state.tasks);
        state.tasks = kept;
        ran
    }

    /// Current clock time in seconds.
    pub fn now(&self) -> f32 {
        self.shared.lock().clock.time_seconds
    }

    /// Number of tasks that have not been cancelled or stopped.
    pub fn pending(&self) -> usize {
        self.shared
            .lock()
            .tasks
            .iter()
            .filter(|task| task.handle.is_pending())
            .count()
    }

    /// Cancels every task and rewinds the clock. Called from inside a
    /// callback, this also cancels the tasks the current tick has yet to run
    /// or merge back.
    pub fn clear(&self) {
        let mut state = self.shared.lock();
        for task in state.tasks.drain(..) {
            task.handle.cancel();
        }
        for handle in state.in_flight.drain(..) {
            handle.cancel();
        }
        state.clock.reset();
    }

    fn push(&self, cadence: Cadence, callback: TaskFn) -> TaskHandle {
        let handle = TaskHandle::default();
        self.shared.lock().tasks.push(Task {
            handle: handle.clone(),
            cadence,
            callback,
        });
        handle
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("now", &self.now())
            .field("pending", &self.pending())
            .finish()
    }
}
