//! Worker pool dispatch
//!
//! The broker hands each request to a fixed pool of workers over bounded
//! mpsc channels, round-robin. Submission returns as soon as the job is in
//! a channel; excess submissions queue in front of the pool, and the
//! per-connection rate limiter is what bounds offered load. Queued and
//! in-flight work is lost on restart by design.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::notify::Notifier;
use super::{ProcessingPipeline, ProcessingRequest};

/// One unit of work: a request plus the channel its events go back on
pub struct Job {
    pub request: ProcessingRequest,
    pub notifier: Arc<dyn Notifier>,
}

pub struct JobBroker {
    worker_channels: Vec<mpsc::Sender<Job>>,
    next_worker: AtomicUsize,
}

impl JobBroker {
    /// Create the broker and one receiver per worker for spawning
    pub fn new(num_workers: usize, channel_size: usize) -> (Self, Vec<mpsc::Receiver<Job>>) {
        info!(num_workers, channel_size, "Creating job broker");

        let mut worker_channels = Vec::with_capacity(num_workers);
        let mut worker_receivers = Vec::with_capacity(num_workers);

        for _ in 0..num_workers {
            let (tx, rx) = mpsc::channel(channel_size);
            worker_channels.push(tx);
            worker_receivers.push(rx);
        }

        let broker = Self {
            worker_channels,
            next_worker: AtomicUsize::new(0),
        };

        (broker, worker_receivers)
    }

    /// Hand a job to the next worker (round-robin). Returns false when the
    /// worker's channel has closed; the job is dropped in that case.
    pub async fn submit(&self, job: Job) -> bool {
        let worker_idx =
            self.next_worker.fetch_add(1, Ordering::Relaxed) % self.worker_channels.len();

        match self.worker_channels[worker_idx].send(job).await {
            Ok(()) => {
                debug!(worker_idx, "Job dispatched");
                true
            }
            Err(_) => {
                warn!(worker_idx, "Worker channel closed, job dropped");
                false
            }
        }
    }

    pub fn num_workers(&self) -> usize {
        self.worker_channels.len()
    }

    pub fn health_check(&self) -> bool {
        self.worker_channels.iter().all(|ch| !ch.is_closed())
    }
}

/// Spawn one task per receiver; each worker drains its channel, fully
/// executing one request's pipeline (including the blocking model call)
/// before taking the next.
pub fn spawn_workers(pipeline: Arc<ProcessingPipeline>, receivers: Vec<mpsc::Receiver<Job>>) {
    for (worker_id, mut rx) in receivers.into_iter().enumerate() {
        let pipeline = pipeline.clone();
        tokio::spawn(async move {
            debug!(worker_id, "Worker started");
            while let Some(job) = rx.recv().await {
                pipeline.process(job.request, job.notifier).await;
            }
            debug!(worker_id, "Worker stopped");
        });
    }
}
