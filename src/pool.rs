//! # Pool — Reserved-Handle Worker Threads
//!
//! A small fixed pool of OS threads driven by explicit handles: a caller
//! reserves workers up front (`request`), hands each one a job (`wake`),
//! blocks until the job finishes (`wait`), and returns the worker
//! (`give_back`). There is no queue and no work stealing — the GCD engine
//! plans its own split of masters and inner workers, and the caller thread
//! always doubles as worker 0 rather than sitting idle.
//!
//! Jobs run to completion; there is no cancellation. Dropping the pool
//! shuts the workers down and joins them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Identifies one reserved worker. Handles are dealt out by
/// [`ThreadPool::request`] and stay valid until given back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Handle(usize);

/// Per-worker mailbox: one pending job slot plus a busy flag, each with its
/// own condvar (the worker sleeps on `job_cv`, a waiter on `done_cv`).
struct Slot {
    job: Mutex<Option<Job>>,
    job_cv: Condvar,
    busy: Mutex<bool>,
    done_cv: Condvar,
}

pub struct ThreadPool {
    slots: Vec<Arc<Slot>>,
    free: Mutex<Vec<usize>>,
    shutdown: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Spawn `size` workers (zero is fine: every caller then runs alone).
    pub fn new(size: usize) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut slots = Vec::with_capacity(size);
        let mut threads = Vec::with_capacity(size);
        for _ in 0..size {
            let slot = Arc::new(Slot {
                job: Mutex::new(None),
                job_cv: Condvar::new(),
                busy: Mutex::new(false),
                done_cv: Condvar::new(),
            });
            let worker_slot = Arc::clone(&slot);
            let worker_shutdown = Arc::clone(&shutdown);
            threads.push(thread::spawn(move || worker_loop(worker_slot, worker_shutdown)));
            slots.push(slot);
        }
        let free = Mutex::new((0..size).collect());
        ThreadPool { slots, free, shutdown, threads }
    }

    /// Number of workers in the pool.
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Reserve up to `max` idle workers. May return fewer (or none) when
    /// the pool is small or already reserved.
    pub fn request(&self, max: usize) -> Vec<Handle> {
        let mut free = self.free.lock().unwrap();
        let take = free.len().min(max);
        free.drain(..take).map(Handle).collect()
    }

    /// Hand a reserved worker a job. The worker must be idle: every `wake`
    /// must be paired with a `wait` before the next `wake` on the same
    /// handle.
    pub fn wake(&self, h: Handle, job: impl FnOnce() + Send + 'static) {
        let slot = &self.slots[h.0];
        {
            let mut busy = slot.busy.lock().unwrap();
            debug_assert!(!*busy, "woke a busy worker");
            *busy = true;
        }
        let mut pending = slot.job.lock().unwrap();
        debug_assert!(pending.is_none());
        *pending = Some(Box::new(job));
        slot.job_cv.notify_one();
    }

    /// Block until the handle's last job has finished. Returns immediately
    /// for a worker that was never woken.
    pub fn wait(&self, h: Handle) {
        let slot = &self.slots[h.0];
        let mut busy = slot.busy.lock().unwrap();
        while *busy {
            busy = slot.done_cv.wait(busy).unwrap();
        }
    }

    /// Return a reserved worker to the free list.
    pub fn give_back(&self, h: Handle) {
        self.wait(h);
        self.free.lock().unwrap().push(h.0);
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        for slot in &self.slots {
            let _guard = slot.job.lock().unwrap();
            slot.job_cv.notify_one();
        }
        for t in self.threads.drain(..) {
            let _ = t.join();
        }
    }
}

fn worker_loop(slot: Arc<Slot>, shutdown: Arc<AtomicBool>) {
    loop {
        let job = {
            let mut pending = slot.job.lock().unwrap();
            loop {
                if let Some(job) = pending.take() {
                    break job;
                }
                if shutdown.load(Ordering::SeqCst) {
                    return;
                }
                pending = slot.job_cv.wait(pending).unwrap();
            }
        };
        job();
        let mut busy = slot.busy.lock().unwrap();
        *busy = false;
        slot.done_cv.notify_all();
    }
}
