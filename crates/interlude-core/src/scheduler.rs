//! Cooperative delayed-task scheduler.
//!
//! A single-threaded priority queue ordered by `(deadline, priority, sequence)`.
//! Tasks are plain values tagged by kind; the caller executes them. Messages
//! from other threads arrive through a crossbeam inbox and are handled on the
//! scheduler thread between tasks, so nothing ever runs concurrently.
//!
//! There is no recurring-task primitive: periodic work re-enters itself.

use std::cell::RefCell;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::ops::ControlFlow;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};

/// Time source used to compute deadlines.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Handle returned by [`Scheduler::enter`], used to cancel a pending task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(u64);

/// One unit of work handed to the [`Scheduler::run`] handler.
#[derive(Debug)]
pub enum Wakeup<T, M> {
    /// A task whose deadline has passed.
    Task(T),
    /// A message received from another thread.
    Message(M),
}

struct Entry<T> {
    deadline: Instant,
    priority: i32,
    seq: u64,
    task: T,
}

impl<T> Entry<T> {
    fn key(&self) -> (Instant, i32, u64) {
        (self.deadline, self.priority, self.seq)
    }
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

struct TaskQueue<T> {
    heap: BinaryHeap<Reverse<Entry<T>>>,
    next_seq: u64,
}

/// Shared handle to a single-threaded task queue.
///
/// Cloning is cheap and every clone sees the same queue, which lets the
/// playback controller schedule and cancel work while the run loop owns
/// the thread.
pub struct Scheduler<T> {
    queue: Rc<RefCell<TaskQueue<T>>>,
    clock: Rc<dyn Clock>,
}

impl<T> Clone for Scheduler<T> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    /// Create a scheduler driven by the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    /// Create a scheduler driven by a custom clock.
    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            queue: Rc::new(RefCell::new(TaskQueue {
                heap: BinaryHeap::new(),
                next_seq: 0,
            })),
            clock: Rc::new(clock),
        }
    }

    /// Current time according to the scheduler clock.
    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Schedule `task` to run once after `delay`.
    ///
    /// Lower `priority` values run first among tasks sharing a deadline;
    /// insertion order breaks any remaining tie.
    pub fn enter(&self, delay: Duration, priority: i32, task: T) -> TaskHandle {
        let deadline = self.now() + delay;
        let mut queue = self.queue.borrow_mut();
        let seq = queue.next_seq;
        queue.next_seq += 1;
        queue.heap.push(Reverse(Entry {
            deadline,
            priority,
            seq,
            task,
        }));
        TaskHandle(seq)
    }

    /// Remove a pending task. Returns `false` if it already ran or was cancelled.
    pub fn cancel(&self, handle: TaskHandle) -> bool {
        self.remove_where(|entry| entry.seq == handle.0) > 0
    }

    /// Remove every pending task matching `predicate`, returning how many were removed.
    pub fn cancel_where(&self, mut predicate: impl FnMut(&T) -> bool) -> usize {
        self.remove_where(|entry| predicate(&entry.task))
    }

    fn remove_where(&self, mut predicate: impl FnMut(&Entry<T>) -> bool) -> usize {
        let mut queue = self.queue.borrow_mut();
        let before = queue.heap.len();
        queue.heap.retain(|Reverse(entry)| !predicate(entry));
        before - queue.heap.len()
    }

    /// Number of pending tasks.
    pub fn len(&self) -> usize {
        self.queue.borrow().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deadline of the earliest pending task.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.queue
            .borrow()
            .heap
            .peek()
            .map(|Reverse(entry)| entry.deadline)
    }

    /// Pop the earliest task if its deadline has passed.
    pub fn pop_due(&self) -> Option<T> {
        let now = self.now();
        let mut queue = self.queue.borrow_mut();
        match queue.heap.peek() {
            Some(Reverse(entry)) if entry.deadline <= now => {
                queue.heap.pop().map(|Reverse(entry)| entry.task)
            }
            _ => None,
        }
    }

    /// Block the calling thread, feeding due tasks and inbox messages to `handler`.
    ///
    /// Due tasks are handled before waiting on the inbox; the wait is bounded
    /// by the next deadline. Returns once `handler` breaks or every sender of
    /// `inbox` is gone.
    pub fn run<M>(
        &self,
        inbox: &Receiver<M>,
        mut handler: impl FnMut(Wakeup<T, M>) -> ControlFlow<()>,
    ) {
        loop {
            while let Some(task) = self.pop_due() {
                if handler(Wakeup::Task(task)).is_break() {
                    return;
                }
            }

            let message = match self.next_deadline() {
                Some(deadline) => {
                    let timeout = deadline.saturating_duration_since(self.now());
                    match inbox.recv_timeout(timeout) {
                        Ok(message) => message,
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => return,
                    }
                }
                None => match inbox.recv() {
                    Ok(message) => message,
                    Err(_) => return,
                },
            };
            if handler(Wakeup::Message(message)).is_break() {
                return;
            }
        }
    }
}

impl<T: Clone> Scheduler<T> {
    /// Pending tasks in execution order.
    pub fn pending(&self) -> Vec<(Instant, T)> {
        let queue = self.queue.borrow();
        let mut entries: Vec<&Entry<T>> = queue.heap.iter().map(|Reverse(entry)| entry).collect();
        entries.sort();
        entries
            .into_iter()
            .map(|entry| (entry.deadline, entry.task.clone()))
            .collect()
    }
}
