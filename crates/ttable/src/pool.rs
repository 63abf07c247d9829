//! Worker pool interface used by the parallel clear
//!
//! The table never spawns threads itself. It hands one zero-fill task to each
//! worker of a [`WorkerPool`] and waits for all of them. [`ThreadPool`] is a
//! stock implementation with persistent named threads; a search engine
//! normally implements the trait for its own search threads instead.

use crossbeam::channel::{self, Receiver, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

/// Unit of work sent to a worker
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Scheduling interface consumed by `TranspositionTable::clear`
///
/// # Safety
///
/// Tasks handed to `run_on_thread` write through raw pointers into memory
/// owned by the caller. An implementation must guarantee that once
/// `wait_on_thread(index)` returns, no task dispatched to worker `index` is
/// still running or will run later. A task may be dropped without running;
/// the caller detects that and does the work itself.
pub unsafe trait WorkerPool {
    /// Number of workers
    fn num_threads(&self) -> usize;

    /// Run `task` on worker `index`
    ///
    /// Returns `false` if the task was not accepted. It is then dropped
    /// without running.
    fn run_on_thread(&self, index: usize, task: Task) -> bool;

    /// Block until every task dispatched to worker `index` has finished
    fn wait_on_thread(&self, index: usize);
}

enum WorkerCommand {
    Run(Task),
    Shutdown,
}

struct Worker {
    ctrl: Sender<WorkerCommand>,
    done: Receiver<()>,
    /// Tasks dispatched but not yet waited for
    pending: AtomicUsize,
    handle: Option<JoinHandle<()>>,
}

/// Pool of persistent worker threads
pub struct ThreadPool {
    workers: Vec<Worker>,
}

impl ThreadPool {
    /// Spawn `size` workers (at least one)
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            let (ctrl_tx, ctrl_rx) = channel::unbounded();
            let (done_tx, done_rx) = channel::unbounded();
            let handle = thread::Builder::new()
                .name(format!("tt-worker-{id}"))
                .spawn(move || worker_loop(ctrl_rx, done_tx))
                .expect("spawn tt worker");
            workers.push(Worker {
                ctrl: ctrl_tx,
                done: done_rx,
                pending: AtomicUsize::new(0),
                handle: Some(handle),
            });
        }
        log::debug!("TT worker pool started: threads={size}");
        Self { workers }
    }

    /// Worker count sized to the machine
    pub fn with_available_parallelism() -> Self {
        Self::new(thread::available_parallelism().map(|n| n.get()).unwrap_or(1))
    }
}

// SAFETY: `wait_on_thread` returns only after one `done` signal per accepted
// task, or once the worker thread has exited and can run nothing more.
unsafe impl WorkerPool for ThreadPool {
    fn num_threads(&self) -> usize {
        self.workers.len()
    }

    fn run_on_thread(&self, index: usize, task: Task) -> bool {
        let worker = &self.workers[index];
        worker.pending.fetch_add(1, Ordering::Relaxed);
        if worker.ctrl.send(WorkerCommand::Run(task)).is_err() {
            // ワーカーが既に終了している
            worker.pending.fetch_sub(1, Ordering::Relaxed);
            log::error!("tt-worker-{index} is gone; task dropped");
            return false;
        }
        true
    }

    fn wait_on_thread(&self, index: usize) {
        let worker = &self.workers[index];
        while worker.pending.load(Ordering::Relaxed) > 0 {
            match worker.done.recv() {
                Ok(()) => {
                    worker.pending.fetch_sub(1, Ordering::Relaxed);
                }
                Err(_) => {
                    log::error!("tt-worker-{index} exited with tasks outstanding");
                    worker.pending.store(0, Ordering::Relaxed);
                }
            }
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        for worker in &self.workers {
            let _ = worker.ctrl.send(WorkerCommand::Shutdown);
        }
        for worker in &mut self.workers {
            if let Some(handle) = worker.handle.take() {
                let _ = handle.join();
            }
        }
    }
}

fn worker_loop(ctrl_rx: Receiver<WorkerCommand>, done_tx: Sender<()>) {
    while let Ok(cmd) = ctrl_rx.recv() {
        match cmd {
            WorkerCommand::Run(task) => {
                // タスクの panic でワーカーを失わない
                if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                    log::error!(
                        "task panicked on {}",
                        thread::current().name().unwrap_or("tt-worker")
                    );
                }
                let _ = done_tx.send(());
            }
            WorkerCommand::Shutdown => break,
        }
    }
}
