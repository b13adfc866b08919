use crate::job::{JobQueueItem, prepare_work};
use crate::worker::{self, SendOnDrop};
use crate::{Config, Error, PoolStatus, metrics};
use logging::TimeLatch;
use rayon::ThreadPool;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Messages sent from `BlsVerificationPool` handles to the manager.
pub enum InboundEvent {
    Job(JobQueueItem),
    Close(oneshot::Sender<()>),
}

/// Batchable jobs waiting to be released into the queue.
struct BufferedJobs {
    jobs: Vec<JobQueueItem>,
    prioritized_jobs: Vec<JobQueueItem>,
    sig_count: usize,
    deadline: Instant,
}

impl BufferedJobs {
    fn len(&self) -> usize {
        self.jobs.len() + self.prioritized_jobs.len()
    }
}

/// Owns the job queue and hands prepared batches to workers.
///
/// Only the manager task touches the queue. Handles talk to it through `event_rx` and workers
/// report back through `idle_rx`.
pub struct Manager {
    config: Config,
    status: Arc<PoolStatus>,
    thread_pool: ThreadPool,
    queue: VecDeque<JobQueueItem>,
    buffer: Option<BufferedJobs>,
    workers_busy: usize,
    closing: bool,
    close_waiters: Vec<oneshot::Sender<()>>,
    queue_full_debounce: TimeLatch,
}

impl Manager {
    pub fn new(config: Config, status: Arc<PoolStatus>, thread_pool: ThreadPool) -> Self {
        Self {
            config,
            status,
            thread_pool,
            queue: VecDeque::new(),
            buffer: None,
            workers_busy: 0,
            closing: false,
            close_waiters: vec![],
            queue_full_debounce: TimeLatch::default(),
        }
    }

    /// Runs until the pool is closed, or every handle is dropped, and all in-flight batches have
    /// finished.
    pub async fn run(mut self, mut event_rx: mpsc::UnboundedReceiver<InboundEvent>) {
        let (idle_tx, mut idle_rx) = mpsc::unbounded_channel::<()>();

        loop {
            let buffer_deadline = self.buffer.as_ref().map(|buffer| buffer.deadline);

            tokio::select! {
                // Always check for idle workers first so that a burst of new jobs cannot delay
                // freeing workers.
                biased;

                Some(()) = idle_rx.recv() => {
                    self.workers_busy = self.workers_busy.saturating_sub(1);
                }
                event = event_rx.recv(), if !self.closing => match event {
                    Some(InboundEvent::Job(job)) => self.on_job(job),
                    Some(InboundEvent::Close(ack)) => self.on_close(Some(ack)),
                    None => self.on_close(None),
                },
                () = sleep_until_deadline(buffer_deadline), if buffer_deadline.is_some() => {
                    self.release_buffered_jobs();
                }
            }

            if !self.closing {
                self.spawn_workers(&idle_tx);
            }
            self.update_status();

            if self.closing && self.workers_busy == 0 {
                for ack in self.close_waiters.drain(..) {
                    let _ = ack.send(());
                }
                debug!("BLS verification pool stopped");
                break;
            }
        }
    }

    fn on_job(&mut self, job: JobQueueItem) {
        let queued = self.queue.len() + self.buffer.as_ref().map_or(0, BufferedJobs::len);
        if queued >= self.config.max_queued_jobs {
            metrics::inc_counter(&metrics::BLS_POOL_QUEUE_FULL_TOTAL);
            if self.queue_full_debounce.elapsed() {
                warn!(
                    queue_len = queued,
                    msg = "the system has insufficient resources for load",
                    "BLS verification queue full"
                );
            }
            job.reject(Error::QueueFull);
            return;
        }

        let opts = job.opts();
        if opts.batchable {
            let max_buffer_wait = self.config.max_buffer_wait();
            let buffer = self.buffer.get_or_insert_with(|| BufferedJobs {
                jobs: vec![],
                prioritized_jobs: vec![],
                sig_count: 0,
                deadline: Instant::now() + max_buffer_wait,
            });
            buffer.sig_count += job.sig_count();
            if opts.priority {
                buffer.prioritized_jobs.push(job);
            } else {
                buffer.jobs.push(job);
            }

            if buffer.sig_count > self.config.max_buffered_sigs {
                self.release_buffered_jobs();
            }
        } else if opts.priority {
            self.queue.push_front(job);
        } else {
            self.queue.push_back(job);
        }
    }

    /// Moves all buffered jobs into the queue, prioritized jobs to the front.
    fn release_buffered_jobs(&mut self) {
        let Some(buffer) = self.buffer.take() else {
            return;
        };
        trace!(
            jobs = buffer.len(),
            sig_count = buffer.sig_count,
            "Releasing buffered BLS jobs"
        );
        self.queue.extend(buffer.jobs);
        for job in buffer.prioritized_jobs.into_iter().rev() {
            self.queue.push_front(job);
        }
    }

    /// Rejects every waiting job and stops accepting new ones. In-flight batches still resolve.
    fn on_close(&mut self, ack: Option<oneshot::Sender<()>>) {
        self.closing = true;
        self.status.closed.store(true, Ordering::Release);
        self.close_waiters.extend(ack);

        let buffered = self
            .buffer
            .take()
            .into_iter()
            .flat_map(|buffer| buffer.prioritized_jobs.into_iter().chain(buffer.jobs));
        let aborted = self.queue.drain(..).chain(buffered).fold(0, |count, job| {
            job.reject(Error::QueueAborted);
            count + 1
        });

        debug!(
            aborted_jobs = aborted,
            in_flight = self.workers_busy,
            "Closing BLS verification pool"
        );
    }

    fn spawn_workers(&mut self, idle_tx: &mpsc::UnboundedSender<()>) {
        while self.workers_busy < self.config.pool_size {
            let Some(work) = prepare_work(&mut self.queue, self.config.max_batch_sigs) else {
                break;
            };

            let kind: &str = work.kind().into();
            metrics::inc_counter(&metrics::BLS_POOL_JOB_GROUPS_STARTED_TOTAL);
            metrics::inc_counter_vec_by(
                &metrics::BLS_POOL_JOBS_STARTED_TOTAL,
                &[kind],
                work.job_count() as u64,
            );
            metrics::inc_counter_vec_by(
                &metrics::BLS_POOL_SIG_SETS_STARTED_TOTAL,
                &[kind],
                work.sig_count() as u64,
            );
            for added in work.added_times() {
                metrics::observe_duration(&metrics::BLS_POOL_JOB_WAIT_SECONDS, added.elapsed());
            }

            let send_idle_on_drop = SendOnDrop {
                tx: idle_tx.clone(),
            };
            self.workers_busy += 1;
            self.thread_pool.spawn(move || {
                let _send_idle_on_drop = send_idle_on_drop;
                worker::run(work);
            });
        }
    }

    fn update_status(&self) {
        let queued = self.queue.len() + self.buffer.as_ref().map_or(0, BufferedJobs::len);
        self.status.queued_jobs.store(queued, Ordering::Release);
        self.status
            .workers_busy
            .store(self.workers_busy, Ordering::Release);
        metrics::set_gauge(&metrics::BLS_POOL_QUEUE_LENGTH, queued as i64);
        metrics::set_gauge(&metrics::BLS_POOL_WORKERS_BUSY, self.workers_busy as i64);
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
