use std::rc::Rc;
use std::time::{Duration, Instant};

use smol::{LocalExecutor, Timer};

use super::scheduler::{ScheduledTask, TaskHandle, TaskScheduler};

/// Wall-clock scheduler backed by a single-threaded smol executor.
///
/// Tasks only make progress while the executor is being run, e.g. with
/// `smol::block_on(executor.run(future))`.
pub struct LocalTimerScheduler {
    executor: Rc<LocalExecutor<'static>>,
}

impl LocalTimerScheduler {
    pub fn new(executor: Rc<LocalExecutor<'static>>) -> Self {
        Self { executor }
    }
}

impl TaskScheduler for LocalTimerScheduler {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn post_delayed_task(&self, delay: Duration, task: Box<dyn FnOnce()>) -> TaskHandle {
        let (task, handle) = ScheduledTask::new(task);
        self.executor
            .spawn(async move {
                Timer::after(delay).await;
                task.run();
            })
            .detach();
        handle
    }
}
