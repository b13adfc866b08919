//! Provides the `BlsVerificationPool`, which verifies BLS signatures on a dedicated thread pool,
//! batching independent jobs so that many signatures share the cost of a single multi-pairing.
//!
//! ## Detail
//!
//! There is a single "manager" task which owns the job queue. Handles send it new jobs over an
//! unbounded channel and receive each result through a `oneshot` channel, so submitting never
//! blocks and the queue needs no lock.
//!
//! Whenever the manager receives a job it is either:
//!
//! - Added to a short-lived buffer, if it is batchable. The buffer is released into the queue
//!   after `max_buffer_wait_ms` or once it holds more than `max_buffered_sigs` sets.
//! - Added to the front of the queue, if it has priority.
//! - Added to the back of the queue otherwise.
//!
//! While fewer than `pool_size` workers are busy, the manager takes a batch of jobs from the
//! queue (see `job::prepare_work`) and runs it on the `rayon` pool. Workers notify the manager
//! when they finish so that it can start the next batch.
//!
//! A batch of default jobs is verified with one randomized check over every set. If that check
//! fails, each job is verified on its own so that an invalid signature only fails its own job.
//! Same-message jobs aggregate all signatures and keys, falling back to verifying each signature
//! when the aggregate check fails.

mod config;
pub mod job;
mod manager;
pub mod metrics;
mod worker;

pub use config::Config;
pub use job::{JobKind, JobOptions};

use bls::{Hash256, PublicKey, Signature, SignatureSet};
use futures::future;
use itertools::Itertools;
use job::{DefaultJob, JobQueueItem, SameMessageJob};
use manager::{InboundEvent, Manager};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// Too many jobs are waiting, the submission was dropped.
    QueueFull,
    /// The pool was closed before the submission.
    PoolClosed,
    /// The pool was closed while the job was waiting.
    QueueAborted,
    /// Verification panicked. Every job in the same batch receives this error.
    WorkerPanicked,
    /// `verify_signature_sets` was called without any signature sets.
    NoSignatureSets,
    /// The pool must be created from within a `tokio` runtime.
    NoRuntime,
    InvalidConfig(String),
    ThreadPool(String),
}

/// State shared between the manager and every handle.
#[derive(Default)]
pub struct PoolStatus {
    queued_jobs: AtomicUsize,
    workers_busy: AtomicUsize,
    closed: AtomicBool,
}

/// A handle to a running pool. Cloning the handle does not create a new pool.
#[derive(Clone)]
pub struct BlsVerificationPool {
    config: Arc<Config>,
    status: Arc<PoolStatus>,
    event_tx: mpsc::UnboundedSender<InboundEvent>,
}

impl BlsVerificationPool {
    /// Starts the worker threads and spawns the manager on the current `tokio` runtime.
    pub fn new(config: Config) -> Result<Self, Error> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| Error::NoRuntime)?;
        let thread_pool = worker::build_thread_pool(config.pool_size)?;

        let status = Arc::new(PoolStatus::default());
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let manager = Manager::new(config.clone(), status.clone(), thread_pool);
        runtime.spawn(manager.run(event_rx));

        debug!(
            pool_size = config.pool_size,
            max_batch_sigs = config.max_batch_sigs,
            "Started BLS verification pool"
        );

        Ok(Self {
            config: Arc::new(config),
            status,
            event_tx,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns `true` if a new submission would be accepted and could start without waiting for a
    /// worker.
    pub fn can_accept_work(&self) -> bool {
        !self.status.closed.load(Ordering::Acquire)
            && self.status.workers_busy.load(Ordering::Acquire) < self.config.pool_size
            && self.status.queued_jobs.load(Ordering::Acquire) < self.config.max_queued_jobs
    }

    /// Verifies `sets`, returning `true` only if every set is valid.
    ///
    /// The jobs are queued before this function returns, the returned future only waits for
    /// their results. Dropping the future does not cancel verification.
    pub fn verify_signature_sets(
        &self,
        sets: Vec<SignatureSet<'static>>,
        opts: JobOptions,
    ) -> impl Future<Output = Result<bool, Error>> + use<> {
        let submission = self.submit_signature_sets(sets, opts);

        async move {
            let receivers = match submission {
                Submission::Done(result) => return result,
                Submission::Queued(receivers) => receivers,
            };

            let mut all_valid = true;
            for result in future::join_all(receivers).await {
                all_valid &= result.map_err(|_| Error::PoolClosed)??;
            }
            Ok(all_valid)
        }
    }

    /// Verifies that each `(pubkey, signature)` pair signs `message`, returning one result per
    /// pair in submission order.
    ///
    /// The jobs are queued before this function returns, the returned future only waits for
    /// their results.
    pub fn verify_signature_sets_same_message(
        &self,
        pairs: Vec<(PublicKey, Signature)>,
        message: Hash256,
        opts: JobOptions,
    ) -> impl Future<Output = Result<Vec<bool>, Error>> + use<> {
        let submission = self.submit_same_message(pairs, message, opts);

        async move {
            let receivers = match submission {
                Submission::Done(result) => return result,
                Submission::Queued(receivers) => receivers,
            };

            let mut results = vec![];
            for result in future::join_all(receivers).await {
                results.extend(result.map_err(|_| Error::PoolClosed)??);
            }
            Ok(results)
        }
    }

    /// Rejects all waiting jobs with `Error::QueueAborted` and waits for in-flight batches to
    /// finish. Later submissions fail with `Error::PoolClosed`.
    pub async fn close(&self) {
        self.status.closed.store(true, Ordering::Release);
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.event_tx.send(InboundEvent::Close(ack_tx)).is_ok() {
            // An error means the manager has already stopped.
            let _ = ack_rx.await;
        }
    }

    fn submit_signature_sets(
        &self,
        sets: Vec<SignatureSet<'static>>,
        opts: JobOptions,
    ) -> Submission<bool> {
        if self.status.closed.load(Ordering::Acquire) {
            return Submission::Done(Err(Error::PoolClosed));
        }
        if sets.is_empty() {
            return Submission::Done(Err(Error::NoSignatureSets));
        }
        record_submission(sets.len(), opts);

        if opts.verify_on_current_thread {
            let _timer = metrics::start_timer(&metrics::BLS_POOL_CURRENT_THREAD_SECONDS);
            return Submission::Done(Ok(bls::verify_signature_sets(sets.iter())));
        }

        self.submit_chunks(sets, |sets, result_tx| {
            JobQueueItem::Default(DefaultJob {
                sets,
                opts,
                added: Instant::now(),
                result_tx,
            })
        })
    }

    fn submit_same_message(
        &self,
        pairs: Vec<(PublicKey, Signature)>,
        message: Hash256,
        opts: JobOptions,
    ) -> Submission<Vec<bool>> {
        if self.status.closed.load(Ordering::Acquire) {
            return Submission::Done(Err(Error::PoolClosed));
        }
        if pairs.is_empty() {
            return Submission::Done(Ok(vec![]));
        }
        record_submission(pairs.len(), opts);

        if opts.verify_on_current_thread {
            let _timer = metrics::start_timer(&metrics::BLS_POOL_CURRENT_THREAD_SECONDS);
            return Submission::Done(Ok(worker::verify_same_message_job(&pairs, message)));
        }

        self.submit_chunks(pairs, |pairs, result_tx| {
            JobQueueItem::SameMessage(SameMessageJob {
                pairs,
                message,
                opts,
                added: Instant::now(),
                result_tx,
            })
        })
    }

    /// Splits `items` into jobs of at most `max_signature_sets_per_job` and sends them to the
    /// manager.
    fn submit_chunks<T, R>(
        &self,
        items: Vec<T>,
        to_job: impl Fn(Vec<T>, oneshot::Sender<Result<R, Error>>) -> JobQueueItem,
    ) -> Submission<R> {
        let mut receivers = vec![];
        for chunk in chunkify(items, self.config.max_signature_sets_per_job) {
            let (result_tx, result_rx) = oneshot::channel();
            if self
                .event_tx
                .send(InboundEvent::Job(to_job(chunk, result_tx)))
                .is_err()
            {
                return Submission::Done(Err(Error::PoolClosed));
            }
            receivers.push(result_rx);
        }
        Submission::Queued(receivers)
    }
}

/// The outcome of submitting work, before awaiting any result.
enum Submission<R> {
    Done(Result<R, Error>),
    Queued(Vec<oneshot::Receiver<Result<R, Error>>>),
}

fn record_submission(sig_count: usize, opts: JobOptions) {
    metrics::inc_counter_by(&metrics::BLS_POOL_SIG_SETS_TOTAL, sig_count as u64);
    if opts.priority {
        metrics::inc_counter_by(&metrics::BLS_POOL_PRIORITIZED_SIG_SETS_TOTAL, sig_count as u64);
    }
    if opts.batchable {
        metrics::inc_counter_by(&metrics::BLS_POOL_BATCHABLE_SIG_SETS_TOTAL, sig_count as u64);
    }
}

/// Splits `items` into the fewest chunks of at most `max_per_chunk`, keeping chunk sizes as even
/// as possible.
fn chunkify<T>(items: Vec<T>, max_per_chunk: usize) -> Vec<Vec<T>> {
    let chunk_count = items.len().div_ceil(max_per_chunk.max(1));
    if chunk_count <= 1 {
        return vec![items];
    }
    let chunk_size = items.len().div_ceil(chunk_count);
    items
        .into_iter()
        .chunks(chunk_size)
        .into_iter()
        .map(|chunk| chunk.collect())
        .collect()
}
