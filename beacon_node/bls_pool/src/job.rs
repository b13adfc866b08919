use crate::Error;
use bls::{Hash256, PublicKey, Signature, SignatureSet};
use std::collections::VecDeque;
use std::time::Instant;
use strum::IntoStaticStr;
use tokio::sync::oneshot;

/// Per-submission scheduling options.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct JobOptions {
    /// Place the job at the front of the queue.
    pub priority: bool,
    /// Hold the job for a short while so it can be batched with others.
    pub batchable: bool,
    /// Verify synchronously on the calling thread, bypassing the queue.
    pub verify_on_current_thread: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum JobKind {
    Default,
    SameMessage,
}

/// Independent signature sets whose validity is reported as a single boolean.
pub struct DefaultJob {
    pub sets: Vec<SignatureSet<'static>>,
    pub opts: JobOptions,
    pub added: Instant,
    pub result_tx: oneshot::Sender<Result<bool, Error>>,
}

/// Signatures over a single message whose validity is reported per signature.
pub struct SameMessageJob {
    pub pairs: Vec<(PublicKey, Signature)>,
    pub message: Hash256,
    pub opts: JobOptions,
    pub added: Instant,
    pub result_tx: oneshot::Sender<Result<Vec<bool>, Error>>,
}

pub enum JobQueueItem {
    Default(DefaultJob),
    SameMessage(SameMessageJob),
}

impl JobQueueItem {
    pub fn kind(&self) -> JobKind {
        match self {
            JobQueueItem::Default(_) => JobKind::Default,
            JobQueueItem::SameMessage(_) => JobKind::SameMessage,
        }
    }

    pub fn opts(&self) -> JobOptions {
        match self {
            JobQueueItem::Default(job) => job.opts,
            JobQueueItem::SameMessage(job) => job.opts,
        }
    }

    /// The number of signature sets verified by this job.
    pub fn sig_count(&self) -> usize {
        match self {
            JobQueueItem::Default(job) => job.sets.len(),
            JobQueueItem::SameMessage(job) => job.pairs.len(),
        }
    }

    /// Fails the job without verifying it.
    ///
    /// The caller may have dropped the receiver already, which is not an error.
    pub fn reject(self, error: Error) {
        match self {
            JobQueueItem::Default(job) => {
                let _ = job.result_tx.send(Err(error));
            }
            JobQueueItem::SameMessage(job) => {
                let _ = job.result_tx.send(Err(error));
            }
        }
    }
}

/// A group of jobs that one worker verifies together.
pub enum PreparedWork {
    Default(Vec<DefaultJob>),
    SameMessage(SameMessageJob),
}

impl PreparedWork {
    pub fn kind(&self) -> JobKind {
        match self {
            PreparedWork::Default(_) => JobKind::Default,
            PreparedWork::SameMessage(_) => JobKind::SameMessage,
        }
    }

    pub fn job_count(&self) -> usize {
        match self {
            PreparedWork::Default(jobs) => jobs.len(),
            PreparedWork::SameMessage(_) => 1,
        }
    }

    pub fn sig_count(&self) -> usize {
        match self {
            PreparedWork::Default(jobs) => jobs.iter().map(|job| job.sets.len()).sum(),
            PreparedWork::SameMessage(job) => job.pairs.len(),
        }
    }

    /// When each job in the batch was submitted.
    pub fn added_times(&self) -> Vec<Instant> {
        match self {
            PreparedWork::Default(jobs) => jobs.iter().map(|job| job.added).collect(),
            PreparedWork::SameMessage(job) => vec![job.added],
        }
    }
}

/// Takes jobs from the front of `queue` for a single worker.
///
/// Default jobs are taken while their summed set count stays within `max_batch_sigs`, a job that
/// would overflow the batch is left at the front of the queue. The first job is always taken,
/// however large. Same-message jobs use a different verification algorithm and are never mixed
/// with default jobs: one at the front is taken on its own, one further back ends the batch.
pub fn prepare_work(
    queue: &mut VecDeque<JobQueueItem>,
    max_batch_sigs: usize,
) -> Option<PreparedWork> {
    let mut jobs = match queue.pop_front()? {
        JobQueueItem::SameMessage(job) => return Some(PreparedWork::SameMessage(job)),
        JobQueueItem::Default(job) => vec![job],
    };
    let mut total_sigs = jobs.iter().map(|job| job.sets.len()).sum::<usize>();

    while let Some(JobQueueItem::Default(next)) = queue.front() {
        let next_sigs = next.sets.len();
        if total_sigs.saturating_add(next_sigs) > max_batch_sigs {
            break;
        }
        let Some(JobQueueItem::Default(job)) = queue.pop_front() else {
            break;
        };
        total_sigs += next_sigs;
        jobs.push(job);
    }

    Some(PreparedWork::Default(jobs))
}
