//! Delayed-task scheduling contract and a virtual-clock implementation.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskStatus {
    Pending,
    Ran,
    Cancelled,
}

/// Revocation handle for a posted task.
#[derive(Clone)]
pub struct TaskHandle {
    status: Rc<Cell<TaskStatus>>,
}

impl TaskHandle {
    /// Revoke the task. A cancelled task never runs, even if its delay has
    /// already expired.
    pub fn cancel(&self) {
        if self.status.get() == TaskStatus::Pending {
            self.status.set(TaskStatus::Cancelled);
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status.get() == TaskStatus::Pending
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TaskHandle").field(&self.status.get()).finish()
    }
}

/// A callback paired with its revocation state. Schedulers store these and
/// call [`run`](ScheduledTask::run) when the delay expires.
pub struct ScheduledTask {
    status: Rc<Cell<TaskStatus>>,
    callback: Box<dyn FnOnce()>,
}

impl ScheduledTask {
    pub fn new(callback: Box<dyn FnOnce()>) -> (Self, TaskHandle) {
        let status = Rc::new(Cell::new(TaskStatus::Pending));
        let handle = TaskHandle {
            status: status.clone(),
        };
        (Self { status, callback }, handle)
    }

    pub fn is_cancelled(&self) -> bool {
        self.status.get() == TaskStatus::Cancelled
    }

    /// Run the callback unless cancelled. Returns whether it ran.
    pub fn run(self) -> bool {
        if self.status.get() != TaskStatus::Pending {
            return false;
        }
        self.status.set(TaskStatus::Ran);
        (self.callback)();
        true
    }
}

/// Capability interface for posting delayed callbacks on the caller's
/// sequence. Callbacks run one at a time, in deadline order.
pub trait TaskScheduler {
    fn now(&self) -> Instant;

    fn post_delayed_task(&self, delay: Duration, task: Box<dyn FnOnce()>) -> TaskHandle;
}

struct QueuedTask {
    deadline: Duration,
    sequence: u64,
    task: ScheduledTask,
}

/// Scheduler driven by an explicit virtual clock.
///
/// Nothing runs until [`advance`](ManualScheduler::advance) or
/// [`run_until_idle`](ManualScheduler::run_until_idle) is called.
pub struct ManualScheduler {
    origin: Instant,
    elapsed: Cell<Duration>,
    next_sequence: Cell<u64>,
    queue: RefCell<Vec<QueuedTask>>,
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Cell::new(Duration::ZERO),
            next_sequence: Cell::new(0),
            queue: RefCell::new(Vec::new()),
        }
    }

    /// Virtual time since creation.
    pub fn elapsed(&self) -> Duration {
        self.elapsed.get()
    }

    /// Tasks still waiting to run, cancelled ones excluded.
    pub fn pending_tasks(&self) -> usize {
        self.queue
            .borrow()
            .iter()
            .filter(|queued| !queued.task.is_cancelled())
            .count()
    }

    /// Move the clock forward by `delta`, running every task that becomes
    /// due, including tasks posted by those tasks. Returns how many ran.
    pub fn advance(&self, delta: Duration) -> usize {
        let target = self.elapsed.get() + delta;
        let mut ran = 0;
        while let Some(queued) = self.pop_due(target) {
            self.elapsed.set(self.elapsed.get().max(queued.deadline));
            if queued.task.run() {
                ran += 1;
            }
        }
        self.elapsed.set(target);
        ran
    }

    /// Run the tasks that are already due without moving the clock.
    pub fn run_until_idle(&self) -> usize {
        self.advance(Duration::ZERO)
    }

    fn pop_due(&self, target: Duration) -> Option<QueuedTask> {
        let mut queue = self.queue.borrow_mut();
        queue.retain(|queued| !queued.task.is_cancelled());
        let position = queue
            .iter()
            .enumerate()
            .filter(|(_, queued)| queued.deadline <= target)
            .min_by_key(|(_, queued)| (queued.deadline, queued.sequence))
            .map(|(i, _)| i)?;
        Some(queue.swap_remove(position))
    }
}

impl TaskScheduler for ManualScheduler {
    fn now(&self) -> Instant {
        self.origin + self.elapsed.get()
    }

    fn post_delayed_task(&self, delay: Duration, task: Box<dyn FnOnce()>) -> TaskHandle {
        let (task, handle) = ScheduledTask::new(task);
        let sequence = self.next_sequence.get();
        self.next_sequence.set(sequence + 1);
        self.queue.borrow_mut().push(QueuedTask {
            deadline: self.elapsed.get() + delay,
            sequence,
            task,
        });
        handle
    }
}
