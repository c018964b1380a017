// Pose inference workers - each estimator instance runs on the blocking pool
// and takes jobs from a shared queue

use crate::models::image::DecodedImage;
use crate::models::pose::{PoseError, PoseOutcome, PoseResult};
use crate::platform::pose::PoseEstimator;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

/// Jobs waiting for a free estimator
const QUEUE_DEPTH: usize = 64;

struct PoseJob {
    image: DecodedImage,
    reply: oneshot::Sender<PoseResult<PoseOutcome>>,
}

/// Owner of the pose model instances for a batch.
///
/// Created once, shared by reference (or `Arc`) with every caller, and
/// released through `shutdown`, which waits for the workers and closes each
/// estimator. Dropping the queue closes it too; workers then release their
/// estimators once the pending jobs are done.
pub struct PoseQueue {
    sender: Option<mpsc::Sender<PoseJob>>,
    workers: Vec<JoinHandle<()>>,
    model_info: String,
}

impl PoseQueue {
    /// Start one blocking worker per estimator. Must be called inside a
    /// tokio runtime.
    pub fn spawn(estimators: Vec<Box<dyn PoseEstimator>>) -> PoseResult<Self> {
        if estimators.is_empty() {
            return Err(PoseError::InvalidConfig(
                "at least one pose estimator is required".to_string(),
            ));
        }

        let model_info = estimators[0].model_info();
        let (sender, receiver) = mpsc::channel::<PoseJob>(QUEUE_DEPTH);
        let receiver = Arc::new(Mutex::new(receiver));

        let workers: Vec<JoinHandle<()>> = estimators
            .into_iter()
            .enumerate()
            .map(|(id, estimator)| {
                let receiver = receiver.clone();
                tokio::task::spawn_blocking(move || run_worker(id, estimator, receiver))
            })
            .collect();

        tracing::info!(instances = workers.len(), model = %model_info, "pose workers started");

        Ok(Self {
            sender: Some(sender),
            workers,
            model_info,
        })
    }

    pub fn instances(&self) -> usize {
        self.workers.len()
    }

    pub fn model_info(&self) -> &str {
        &self.model_info
    }

    /// Queue an image for inference and wait for its outcome
    pub async fn estimate(&self, image: DecodedImage) -> PoseResult<PoseOutcome> {
        let sender = self.sender.as_ref().ok_or(PoseError::WorkerStopped)?;
        let (reply, answer) = oneshot::channel();

        sender
            .send(PoseJob { image, reply })
            .await
            .map_err(|_| PoseError::WorkerStopped)?;

        answer.await.map_err(|_| PoseError::WorkerStopped)?
    }

    /// Stop accepting jobs, let workers drain, and release every estimator
    pub async fn shutdown(mut self) {
        // Closing the channel ends each worker loop once the queue is empty
        self.sender.take();
        for handle in self.workers.drain(..) {
            if let Err(e) = handle.await {
                tracing::error!("pose worker panicked: {}", e);
            }
        }
    }
}

impl Drop for PoseQueue {
    fn drop(&mut self) {
        self.sender.take();
    }
}

fn run_worker(id: usize, mut estimator: Box<dyn PoseEstimator>, jobs: Arc<Mutex<mpsc::Receiver<PoseJob>>>) {
    loop {
        // The lock is held while waiting for a job, not during inference
        let job = jobs.blocking_lock().blocking_recv();
        let Some(PoseJob { image, reply }) = job else {
            break;
        };

        let outcome = estimator.estimate(&image);
        // The caller may have gone away; nothing to do then
        let _ = reply.send(outcome);
    }

    estimator.close();
    tracing::debug!(worker = id, "pose worker released its model");
}
