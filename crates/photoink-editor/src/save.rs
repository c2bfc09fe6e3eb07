//! Background save worker with in-order delivery.
//!
//! Jobs are compositing (and optionally encoding) work on an immutable
//! snapshot. A single worker thread runs them in submission order, so
//! completions come back in the order saves were issued.

use photoink_core::{Bitmap, SaveError, SaveResult, SaveSettings};
use photoink_render::{Compositor, SceneSnapshot, write_file};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
use std::thread::{self, JoinHandle};

/// Where a finished save goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveTarget {
    Bitmap,
    File(PathBuf),
}

/// Successful result of a save.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutput {
    Bitmap(Bitmap),
    File(PathBuf),
}

/// Callback run on the UI thread when a save completes.
pub(crate) type SaveSink = Box<dyn FnOnce(SaveResult<SaveOutput>)>;

/// Phase 2 input, built on the UI thread.
pub(crate) struct SaveJob {
    pub ticket: u64,
    /// Post-filter base bitmap, delivered whenever the source is ready.
    pub base: Receiver<SaveResult<Arc<Bitmap>>>,
    pub snapshot: SceneSnapshot,
    pub settings: SaveSettings,
    pub target: SaveTarget,
}

struct SaveCompletion {
    ticket: u64,
    result: SaveResult<SaveOutput>,
}

/// A save waiting for its completion, in issue order.
pub(crate) struct PendingSave {
    pub ticket: u64,
    pub clear_after_save: bool,
    pub sink: SaveSink,
}

/// A completion matched with its pending entry, ready to hand to the sink.
pub(crate) struct Delivery {
    pub pending: PendingSave,
    pub result: SaveResult<SaveOutput>,
}

fn execute(job: SaveJob, compositor: &Compositor) -> SaveResult<SaveOutput> {
    let base = job
        .base
        .recv()
        .map_err(|_| SaveError::BitmapUnavailable("source dropped the bitmap request".to_string()))??;
    let bitmap = compositor.flatten(&base, &job.snapshot, &job.settings);
    match job.target {
        SaveTarget::Bitmap => Ok(SaveOutput::Bitmap(bitmap)),
        SaveTarget::File(path) => {
            write_file(&path, &bitmap, &job.settings)?;
            Ok(SaveOutput::File(path))
        }
    }
}

fn run_job(job: SaveJob, compositor: &Compositor) -> SaveCompletion {
    let ticket = job.ticket;
    let result = execute(job, compositor);
    match &result {
        Ok(_) => log::info!("save #{} finished", ticket),
        Err(e) => log::error!("save #{} failed: {}", ticket, e),
    }
    SaveCompletion { ticket, result }
}

struct Worker {
    job_tx: Option<Sender<SaveJob>>,
    done_rx: Receiver<SaveCompletion>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    fn spawn(compositor: Compositor) -> std::io::Result<Self> {
        let (job_tx, job_rx) = channel::<SaveJob>();
        let (done_tx, done_rx) = channel::<SaveCompletion>();
        let thread = thread::Builder::new()
            .name("photoink-save".to_string())
            .spawn(move || {
                log::debug!("save worker started");
                for job in job_rx {
                    if done_tx.send(run_job(job, &compositor)).is_err() {
                        break;
                    }
                }
                log::debug!("save worker exiting");
            })?;
        Ok(Self {
            job_tx: Some(job_tx),
            done_rx,
            thread: Some(thread),
        })
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        // Closing the job channel lets in-flight saves finish, then the loop ends.
        self.job_tx = None;
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Save jobs in flight and their sinks.
pub(crate) struct SaveQueue {
    compositor: Compositor,
    worker: Option<Worker>,
    pending: VecDeque<PendingSave>,
    /// Completions produced without the worker.
    ready: VecDeque<SaveCompletion>,
    next_ticket: u64,
}

impl SaveQueue {
    pub fn new(compositor: Compositor) -> Self {
        Self {
            compositor,
            worker: None,
            pending: VecDeque::new(),
            ready: VecDeque::new(),
            next_ticket: 0,
        }
    }

    pub fn next_ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }

    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Queue a job. Falls back to running it inline if no worker can be started.
    pub fn submit(&mut self, job: SaveJob, pending: PendingSave) {
        self.pending.push_back(pending);
        if self.worker.is_none() {
            match Worker::spawn(self.compositor.clone()) {
                Ok(worker) => self.worker = Some(worker),
                Err(e) => log::error!("failed to start save worker: {}", e),
            }
        }
        let job = match self.worker.as_ref().and_then(|w| w.job_tx.as_ref()) {
            Some(tx) => match tx.send(job) {
                Ok(()) => return,
                Err(err) => err.0,
            },
            None => job,
        };
        self.ready.push_back(run_job(job, &self.compositor));
    }

    /// Completions available now, in issue order.
    pub fn collect_ready(&mut self) -> Vec<Delivery> {
        self.collect(false)
    }

    /// Block until every pending save has completed.
    pub fn collect_all(&mut self) -> Vec<Delivery> {
        self.collect(true)
    }

    fn collect(&mut self, block: bool) -> Vec<Delivery> {
        let mut deliveries = Vec::new();
        while !self.pending.is_empty() {
            let completion = if let Some(done) = self.ready.pop_front() {
                done
            } else if let Some(worker) = &self.worker {
                let received = if block {
                    worker.done_rx.recv().map_err(|_| TryRecvError::Disconnected)
                } else {
                    worker.done_rx.try_recv()
                };
                match received {
                    Ok(done) => done,
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => self.worker_lost(),
                }
            } else {
                self.worker_lost()
            };
            if let Some(pending) = self.pending.pop_front() {
                debug_assert_eq!(pending.ticket, completion.ticket);
                deliveries.push(Delivery {
                    pending,
                    result: completion.result,
                });
            }
        }
        deliveries
    }

    fn worker_lost(&mut self) -> SaveCompletion {
        log::error!("save worker stopped unexpectedly");
        self.worker = None;
        let ticket = self.pending.front().map_or(0, |p| p.ticket);
        SaveCompletion {
            ticket,
            result: Err(SaveError::Io("save worker stopped".to_string())),
        }
    }
}
