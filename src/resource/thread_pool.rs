//! Worker pool for blocking resource work.
//!
//! Work closures run on rayon workers and touch only their own buffers.
//! Their results travel back over a crossbeam channel and the matching
//! completion closure runs on the owning thread inside
//! [`ThreadPool::process_completions`].

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use rayon::ThreadPoolBuilder;
use tracing::{debug, info, trace};

use crate::config::ThreadPoolConfig;
use crate::object::{Object, ObjectType};

use super::ResourceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Queued,
    Running,
    Finished,
    Cancelled,
}

#[derive(Debug)]
struct TaskShared {
    id: u64,
    name: String,
    state: Mutex<TaskState>,
    cancel_requested: AtomicBool,
}

/// Handle to a queued task. Cloning does not duplicate the task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    shared: Arc<TaskShared>,
}

impl TaskHandle {
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn state(&self) -> TaskState {
        *self.shared.state.lock()
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.shared.cancel_requested.load(Ordering::Acquire)
    }
}

impl Object for TaskHandle {
    fn object_type(&self) -> ObjectType {
        ObjectType::Task
    }
}

/// What a completion sees. A cancelled task may still carry the result of
/// work that had already started.
#[derive(Debug)]
pub struct TaskOutcome<T> {
    pub result: Option<T>,
    pub cancelled: bool,
}

type AnyResult = Box<dyn Any + Send>;
type Completion = Box<dyn FnOnce(TaskOutcome<AnyResult>)>;

struct PendingTask {
    shared: Arc<TaskShared>,
    complete: Completion,
}

struct Finished {
    id: u64,
    result: AnyResult,
}

pub struct ThreadPool {
    workers: RefCell<Option<rayon::ThreadPool>>,
    inline: bool,
    sender: Sender<Finished>,
    receiver: Receiver<Finished>,
    pending: RefCell<HashMap<u64, PendingTask>>,
    next_id: Cell<u64>,
    destroyed: Cell<bool>,
}

impl ThreadPool {
    pub fn new(config: &ThreadPoolConfig) -> Result<Self, ResourceError> {
        let workers = if config.workers == 0 {
            None
        } else {
            let prefix = config.thread_name.clone();
            let pool = ThreadPoolBuilder::new()
                .num_threads(config.workers)
                .thread_name(move |i| format!("{}-{}", prefix, i))
                .build()
                .map_err(|e| ResourceError::Pool(e.to_string()))?;

            info!("started {} resource workers", config.workers);
            Some(pool)
        };

        Ok(Self::with_workers(workers))
    }

    /// A pool that runs work and completion synchronously inside `queue`.
    pub fn inline() -> Self {
        Self::with_workers(None)
    }

    fn with_workers(workers: Option<rayon::ThreadPool>) -> Self {
        let (sender, receiver) = unbounded();

        Self {
            inline: workers.is_none(),
            workers: RefCell::new(workers),
            sender,
            receiver,
            pending: RefCell::new(HashMap::new()),
            next_id: Cell::new(1),
            destroyed: Cell::new(false),
        }
    }

    pub fn is_inline(&self) -> bool {
        self.inline
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn queue<T, W, C>(&self, name: &str, work: W, complete: C) -> Result<TaskHandle, ResourceError>
    where
        T: Send + 'static,
        W: FnOnce() -> T + Send + 'static,
        C: FnOnce(TaskOutcome<T>) + 'static,
    {
        if self.destroyed.get() {
            return Err(ResourceError::EndOfLife);
        }

        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let shared = Arc::new(TaskShared {
            id,
            name: name.to_string(),
            state: Mutex::new(TaskState::Queued),
            cancel_requested: AtomicBool::new(false),
        });
        let handle = TaskHandle { shared: shared.clone() };

        if self.inline {
            *shared.state.lock() = TaskState::Running;
            let result = work();
            *shared.state.lock() = TaskState::Finished;

            complete(TaskOutcome {
                result: Some(result),
                cancelled: false,
            });
            return Ok(handle);
        }

        let complete: Completion = Box::new(move |outcome: TaskOutcome<AnyResult>| {
            complete(TaskOutcome {
                result: outcome.result.and_then(|r| r.downcast::<T>().ok()).map(|r| *r),
                cancelled: outcome.cancelled,
            })
        });

        self.pending.borrow_mut().insert(
            id,
            PendingTask {
                shared: shared.clone(),
                complete,
            },
        );

        let sender = self.sender.clone();
        let workers = self.workers.borrow();

        match workers.as_ref() {
            Some(pool) => pool.spawn(move || {
                {
                    let mut state = shared.state.lock();

                    if *state != TaskState::Queued {
                        return;
                    }

                    *state = TaskState::Running;
                }

                trace!("task {} '{}' running", shared.id, shared.name);
                let result = work();
                *shared.state.lock() = TaskState::Finished;

                // The pool may be gone already; the completion was flushed as cancelled.
                let _ = sender.send(Finished {
                    id: shared.id,
                    result: Box::new(result),
                });
            }),
            None => return Err(ResourceError::EndOfLife),
        }

        Ok(handle)
    }

    /// Requests cancellation. A task that has not started completes as
    /// cancelled before this returns; a running task finishes and its
    /// completion observes the request. Repeated calls are no-ops.
    pub fn cancel(&self, handle: &TaskHandle) {
        let shared = &handle.shared;
        let previous = {
            let mut state = shared.state.lock();
            let previous = *state;

            if previous == TaskState::Queued {
                *state = TaskState::Cancelled;
            }

            previous
        };

        match previous {
            TaskState::Queued => {
                let task = self.pending.borrow_mut().remove(&shared.id);

                if let Some(task) = task {
                    debug!("task {} '{}' cancelled before start", shared.id, shared.name);
                    (task.complete)(TaskOutcome {
                        result: None,
                        cancelled: true,
                    });
                }
            }
            TaskState::Running | TaskState::Finished => {
                shared.cancel_requested.store(true, Ordering::Release);
            }
            TaskState::Cancelled => {}
        }
    }

    /// Runs the completion of every finished task. Returns how many ran.
    pub fn process_completions(&self) -> usize {
        let mut count = 0;

        while let Ok(finished) = self.receiver.try_recv() {
            let task = self.pending.borrow_mut().remove(&finished.id);

            let Some(task) = task else {
                continue;
            };

            let cancelled = task.shared.cancel_requested.load(Ordering::Acquire);

            (task.complete)(TaskOutcome {
                result: Some(finished.result),
                cancelled,
            });
            count += 1;
        }

        count
    }

    /// Completes everything outstanding as cancelled and stops the workers.
    pub fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }

        let pending: Vec<PendingTask> = self.pending.borrow_mut().drain().map(|(_, task)| task).collect();

        for task in pending {
            *task.shared.state.lock() = TaskState::Cancelled;
            task.shared.cancel_requested.store(true, Ordering::Release);
            (task.complete)(TaskOutcome {
                result: None,
                cancelled: true,
            });
        }

        while self.receiver.try_recv().is_ok() {}

        if self.workers.borrow_mut().take().is_some() {
            info!("resource workers stopped");
        }
    }
}

impl Object for ThreadPool {
    fn object_type(&self) -> ObjectType {
        ObjectType::ThreadPool
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("inline", &self.inline)
            .field("pending", &self.pending.borrow().len())
            .field("destroyed", &self.destroyed.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;
    use std::time::{Duration, Instant};

    fn pool(workers: usize) -> ThreadPool {
        ThreadPool::new(&ThreadPoolConfig {
            workers,
            thread_name: "test-worker".into(),
        })
        .unwrap()
    }

    fn wait_for<F: Fn() -> bool>(pool: &ThreadPool, done: F) {
        let deadline = Instant::now() + Duration::from_secs(5);

        while !done() && Instant::now() < deadline {
            pool.process_completions();
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn inline_pool_completes_synchronously() {
        let pool = ThreadPool::inline();
        let seen = Rc::new(Cell::new(0));
        let s = seen.clone();

        let handle = pool
            .queue("sum", || 2 + 3, move |outcome| s.set(outcome.result.unwrap_or(0)))
            .unwrap();

        assert_eq!(seen.get(), 5);
        assert_eq!(handle.state(), TaskState::Finished);
        pool.cancel(&handle);
        assert_eq!(seen.get(), 5);
    }

    #[test]
    fn completion_runs_on_the_calling_thread() {
        let pool = pool(2);
        let caller = std::thread::current().id();
        let seen = Rc::new(RefCell::new(None));
        let s = seen.clone();

        pool.queue("echo", || "done", move |outcome| {
            assert_eq!(std::thread::current().id(), caller);
            *s.borrow_mut() = outcome.result;
        })
        .unwrap();

        wait_for(&pool, || seen.borrow().is_some());
        assert_eq!(*seen.borrow(), Some("done"));
        assert_eq!(pool.pending_count(), 0);
    }

    #[test]
    fn cancel_is_idempotent_and_destroy_flushes() {
        let pool = pool(1);
        let gate = Arc::new(Mutex::new(()));
        let blocker = gate.lock();
        let calls = Rc::new(Cell::new(0));

        let g = gate.clone();
        let c = calls.clone();
        let first = pool
            .queue("block", move || drop(g.lock()), move |_| c.set(c.get() + 1))
            .unwrap();

        let c = calls.clone();
        let second = pool
            .queue("queued", || 1, move |outcome| {
                assert!(outcome.cancelled);
                c.set(c.get() + 100);
            })
            .unwrap();

        pool.cancel(&second);
        pool.cancel(&second);
        assert_eq!(calls.get(), 100);

        pool.cancel(&first);
        pool.cancel(&first);
        drop(blocker);

        pool.destroy();
        pool.destroy();
        assert_eq!(calls.get(), 101);
        assert!(pool.queue("late", || (), |_| ()).is_err());
    }
}
