//! Deferred work: persistence forwarding, energy resets, remote loads and
//! bonded submits.
//!
//! [`TokioScheduler`] runs everything on the current `LocalSet`;
//! [`ManualScheduler`] queues it until a test (or a headless runtime) drives
//! it, so it never needs a tokio context.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::error;

/// A unit of deferred work. Not `Send`: tasks capture `Rc` state.
pub type Task = Box<dyn FnOnce()>;

/// A boxed `!Send` future.
pub type LocalFuture<'a> = Pin<Box<dyn Future<Output = ()> + 'a>>;

pub trait Scheduler {
    /// Run `task` as soon as the current call stack unwinds.
    fn immediate(&self, task: Task);
    /// Run `task` after `delay`.
    fn delayed(&self, delay: Duration, task: Task);
    /// Start `future` in the background.
    fn spawn(&self, future: LocalFuture<'static>);
    /// Resolves once every spawned future has finished, including futures
    /// spawned while waiting.
    fn settle(&self) -> LocalFuture<'_>;
    /// Move a virtual clock forward and run what became due. Real-time
    /// schedulers have no clock to move and return 0.
    fn advance(&self, by: Duration) -> usize {
        let _ = by;
        0
    }
}

// ---------------------------------------------------------------------------
// TokioScheduler
// ---------------------------------------------------------------------------

/// Spawns tasks and futures with [`tokio::task::spawn_local`].
///
/// # Panics
///
/// Scheduling panics when called outside a `tokio::task::LocalSet`.
#[derive(Debug, Default)]
pub struct TokioScheduler {
    /// Handles of spawned futures not yet awaited by `settle`.
    spawned: RefCell<Vec<JoinHandle<()>>>,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scheduler for TokioScheduler {
    fn immediate(&self, task: Task) {
        tokio::task::spawn_local(async move { task() });
    }

    fn delayed(&self, delay: Duration, task: Task) {
        tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            task();
        });
    }

    fn spawn(&self, future: LocalFuture<'static>) {
        let handle = tokio::task::spawn_local(future);
        let mut spawned = self.spawned.borrow_mut();
        spawned.retain(|h| !h.is_finished());
        spawned.push(handle);
    }

    fn settle(&self) -> LocalFuture<'_> {
        Box::pin(async move {
            loop {
                let pending = std::mem::take(&mut *self.spawned.borrow_mut());
                if pending.is_empty() {
                    break;
                }
                for handle in pending {
                    if let Err(err) = handle.await {
                        error!(%err, "spawned task failed");
                    }
                }
            }
        })
    }
}

// ---------------------------------------------------------------------------
// ManualScheduler
// ---------------------------------------------------------------------------

struct Delayed {
    due: Duration,
    seq: u64,
    task: Task,
}

/// Deterministic scheduler with a virtual clock.
///
/// Spawned futures make progress only when [`run_spawned`](Self::run_spawned)
/// polls them or [`settle`](Scheduler::settle) awaits them.
#[derive(Default)]
pub struct ManualScheduler {
    now: Cell<Duration>,
    seq: Cell<u64>,
    ready: RefCell<VecDeque<Task>>,
    delayed: RefCell<Vec<Delayed>>,
    spawned: RefCell<VecDeque<LocalFuture<'static>>>,
}

/// Waker for polling outside an executor; `run_spawned` re-polls anyway.
struct NoopWake;

impl Wake for NoopWake {
    fn wake(self: Arc<Self>) {}
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed so far.
    pub fn now(&self) -> Duration {
        self.now.get()
    }

    /// Run queued immediate tasks, including any they enqueue.
    /// Returns the number of tasks run.
    pub fn run_immediate(&self) -> usize {
        let mut ran = 0;
        loop {
            // Release the borrow before running, tasks may schedule more.
            let next = self.ready.borrow_mut().pop_front();
            let Some(task) = next else { break };
            task();
            ran += 1;
        }
        ran
    }

    /// Move the clock forward and run everything that became due, in due order.
    /// Immediate tasks run first and after each delayed task.
    pub fn advance(&self, by: Duration) -> usize {
        self.now.set(self.now.get() + by);
        let mut ran = self.run_immediate();
        while let Some(task) = self.pop_due() {
            task();
            ran += 1 + self.run_immediate();
        }
        ran
    }

    /// Poll every spawned future once. Finished futures are dropped, the rest
    /// stay queued. Returns the number that finished.
    pub fn run_spawned(&self) -> usize {
        let waker = Waker::from(Arc::new(NoopWake));
        let mut cx = Context::from_waker(&waker);
        let queued = self.spawned.borrow().len();
        let mut finished = 0;
        for _ in 0..queued {
            // Release the borrow before polling, futures may spawn more.
            let next = self.spawned.borrow_mut().pop_front();
            let Some(mut future) = next else { break };
            match future.as_mut().poll(&mut cx) {
                Poll::Ready(()) => finished += 1,
                Poll::Pending => self.spawned.borrow_mut().push_back(future),
            }
        }
        finished
    }

    /// Work still waiting: immediate tasks, delayed tasks and spawned futures.
    pub fn pending(&self) -> usize {
        self.ready.borrow().len() + self.delayed.borrow().len() + self.spawned.borrow().len()
    }

    fn pop_due(&self) -> Option<Task> {
        let now = self.now.get();
        let mut delayed = self.delayed.borrow_mut();
        let index = delayed
            .iter()
            .enumerate()
            .filter(|(_, d)| d.due <= now)
            .min_by_key(|(_, d)| (d.due, d.seq))
            .map(|(i, _)| i)?;
        Some(delayed.swap_remove(index).task)
    }
}

impl Scheduler for ManualScheduler {
    fn immediate(&self, task: Task) {
        self.ready.borrow_mut().push_back(task);
    }

    fn delayed(&self, delay: Duration, task: Task) {
        let seq = self.seq.get();
        self.seq.set(seq + 1);
        self.delayed.borrow_mut().push(Delayed {
            due: self.now.get() + delay,
            seq,
            task,
        });
    }

    fn spawn(&self, future: LocalFuture<'static>) {
        self.spawned.borrow_mut().push_back(future);
    }

    /// Await spawned futures in spawn order, running immediate tasks before
    /// and after each. Delayed tasks wait for [`advance`](Self::advance).
    fn settle(&self) -> LocalFuture<'_> {
        Box::pin(async move {
            loop {
                self.run_immediate();
                let next = self.spawned.borrow_mut().pop_front();
                match next {
                    Some(future) => future.await,
                    None => break,
                }
            }
        })
    }

    fn advance(&self, by: Duration) -> usize {
        ManualScheduler::advance(self, by)
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("now", &self.now.get())
            .field("ready", &self.ready.borrow().len())
            .field("delayed", &self.delayed.borrow().len())
            .field("spawned", &self.spawned.borrow().len())
            .finish()
    }
}
