//! Worker pool: consumes dispatched jobs and feeds the publisher.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use cadence_queue::JobSource;
use cadence_store::PublishStore;

use crate::Publisher;

/// Pause after a queue receive error before polling again.
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Run `worker_count` parallel workers against a shared job source until
/// shutdown. Each worker processes one post at a time; concurrency safety
/// comes entirely from the store's conditional claim.
pub async fn run_workers<S, J>(
    publisher: Arc<Publisher<S>>,
    source: J,
    worker_count: usize,
    shutdown_rx: watch::Receiver<bool>,
) where
    S: PublishStore + Send + Sync + 'static,
    J: JobSource + Clone + Send + Sync + 'static,
{
    let mut workers = JoinSet::new();

    for worker in 0..worker_count {
        let publisher = Arc::clone(&publisher);
        let source = source.clone();
        let mut shutdown = shutdown_rx.clone();

        workers.spawn(async move {
            info!(worker, "publish worker started");
            loop {
                if *shutdown.borrow() {
                    break;
                }

                tokio::select! {
                    _ = shutdown.changed() => {}
                    next = source.next_job() => match next {
                        Ok(Some(job)) => match publisher.publish_one(job.post_id).await {
                            Ok(outcome) => {
                                debug!(worker, job_id = %job.job_id, ?outcome, "job processed");
                            }
                            Err(e) => {
                                error!(worker, job_id = %job.job_id, error = %e, "failed to persist resolution");
                            }
                        },
                        Ok(None) => {}
                        Err(e) => {
                            error!(worker, error = %e, "queue receive failed");
                            tokio::time::sleep(RECEIVE_ERROR_BACKOFF).await;
                        }
                    }
                }
            }
            info!(worker, "publish worker stopped");
        });
    }

    while workers.join_next().await.is_some() {}
    info!("worker pool drained");
}
