//! Fixed-size worker pool for read requests.
//!
//! FUSE callbacks arrive on a single dispatch thread. Reads are handed to a
//! fixed set of workers over a bounded channel, so at most `workers` decodes
//! run at once and the dispatch thread blocks once `workers` more are queued.

use log::{error, trace};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct ReadPool {
    sender: Option<SyncSender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl ReadPool {
    /// Start `workers` threads (at least one).
    pub fn new(workers: usize) -> io::Result<Self> {
        let count = workers.max(1);
        let (sender, receiver) = mpsc::sync_channel::<Job>(count);
        let receiver = Arc::new(Mutex::new(receiver));

        let mut handles = Vec::with_capacity(count);
        for i in 0..count {
            let receiver = Arc::clone(&receiver);
            let handle = thread::Builder::new()
                .name(format!("zstdmount-read-{}", i))
                .spawn(move || work(&receiver))?;
            handles.push(handle);
        }

        Ok(Self {
            sender: Some(sender),
            workers: handles,
        })
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue a job, blocking while the queue is full.
    ///
    /// Returns `false` if the workers are gone; the job is dropped unrun.
    pub fn execute<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        match &self.sender {
            Some(sender) => sender.send(Box::new(job)).is_ok(),
            None => false,
        }
    }
}

fn work(receiver: &Mutex<Receiver<Job>>) {
    loop {
        // The guard must be released before running the job.
        let job = match receiver.lock().unwrap_or_else(PoisonError::into_inner).recv() {
            Ok(job) => job,
            Err(_) => break, // channel closed
        };
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            error!("read worker job panicked");
        }
    }
    trace!("read worker exiting");
}

impl Drop for ReadPool {
    fn drop(&mut self) {
        // Closing the channel lets the workers drain the queue and exit.
        drop(self.sender.take());
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn runs_every_job() {
        let done = Arc::new(AtomicUsize::new(0));
        let pool = ReadPool::new(3).unwrap();
        for _ in 0..20 {
            let done = Arc::clone(&done);
            assert!(pool.execute(move || {
                done.fetch_add(1, Ordering::SeqCst);
            }));
        }
        drop(pool);
        assert_eq!(done.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn concurrency_is_bounded_by_worker_count() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let pool = ReadPool::new(2).unwrap();
        assert_eq!(pool.size(), 2);

        for _ in 0..12 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            pool.execute(move || {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(5));
                running.fetch_sub(1, Ordering::SeqCst);
            });
        }
        drop(pool);

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn a_panicking_job_does_not_stop_the_worker() {
        let done = Arc::new(AtomicUsize::new(0));
        let pool = ReadPool::new(1).unwrap();
        pool.execute(|| panic!("bad read"));
        let counter = Arc::clone(&done);
        pool.execute(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        drop(pool);
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}
