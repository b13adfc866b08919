use crate::job::{DefaultJob, PreparedWork, SameMessageJob};
use crate::{Error, metrics};
use bls::{Hash256, PublicKey, Signature, SignatureSet};
use logging::crit;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::panic::{self, AssertUnwindSafe};
use tokio::sync::mpsc;
use tracing::{trace, warn};

/// Builds the thread pool that runs verification, one thread per concurrent batch.
pub fn build_thread_pool(num_threads: usize) -> Result<ThreadPool, Error> {
    ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .thread_name(|i| format!("bls_worker_{i}"))
        .build()
        .map_err(|e| Error::ThreadPool(e.to_string()))
}

/// Verifies every job in `work` and resolves its result channel.
///
/// A panic during verification fails all jobs of the batch with `Error::WorkerPanicked`.
pub fn run(work: PreparedWork) {
    let _timer = metrics::start_timer_vec(&metrics::BLS_POOL_WORKER_SECONDS, &[work.kind().into()]);

    match work {
        PreparedWork::Default(jobs) => {
            let results = catch_panic(|| {
                let job_sets = jobs.iter().map(|job| job.sets.as_slice()).collect::<Vec<_>>();
                verify_default_jobs(&job_sets)
            });
            resolve_default_jobs(jobs, results);
        }
        PreparedWork::SameMessage(job) => {
            let results = catch_panic(|| verify_same_message_job(&job.pairs, job.message));
            resolve_same_message_job(job, results);
        }
    }
}

fn resolve_default_jobs(jobs: Vec<DefaultJob>, results: Result<Vec<bool>, Error>) {
    match results {
        Ok(results) => {
            for (job, is_valid) in jobs.into_iter().zip(results) {
                let _ = job.result_tx.send(Ok(is_valid));
            }
        }
        Err(e) => {
            for job in jobs {
                let _ = job.result_tx.send(Err(e.clone()));
            }
        }
    }
}

fn resolve_same_message_job(job: SameMessageJob, results: Result<Vec<bool>, Error>) {
    let _ = job.result_tx.send(results);
}

fn catch_panic<T>(verify: impl FnOnce() -> T) -> Result<T, Error> {
    panic::catch_unwind(AssertUnwindSafe(verify)).map_err(|_| {
        metrics::inc_counter(&metrics::BLS_POOL_WORKER_PANICS_TOTAL);
        crit!("BLS verification worker panicked");
        Error::WorkerPanicked
    })
}

/// Verifies the sets of each job, returning one result per job.
///
/// All sets are first tried as a single randomized batch. If that fails, each job is verified
/// on its own so that an invalid signature only fails the job that contains it.
pub fn verify_default_jobs(job_sets: &[&[SignatureSet<'static>]]) -> Vec<bool> {
    if let [sets] = job_sets {
        return vec![bls::verify_signature_sets(sets.iter())];
    }

    if bls::verify_signature_sets(job_sets.iter().flat_map(|sets| sets.iter())) {
        let sig_count = job_sets.iter().map(|sets| sets.len()).sum::<usize>();
        metrics::inc_counter_by(&metrics::BLS_POOL_BATCH_SIGS_SUCCESS_TOTAL, sig_count as u64);
        return vec![true; job_sets.len()];
    }

    metrics::inc_counter(&metrics::BLS_POOL_BATCH_RETRIES_TOTAL);
    trace!(jobs = job_sets.len(), "Batch verification failed, retrying jobs individually");
    job_sets
        .iter()
        .map(|sets| bls::verify_signature_sets(sets.iter()))
        .collect()
}

/// Verifies signatures over a single message, returning one result per signature.
///
/// All signatures and public keys are aggregated into a single check. If that fails, each
/// signature is verified on its own.
pub fn verify_same_message_job(pairs: &[(PublicKey, Signature)], message: Hash256) -> Vec<bool> {
    if bls::verify_same_message(pairs.iter().map(|(pk, sig)| (pk, sig)), message) {
        return vec![true; pairs.len()];
    }

    metrics::inc_counter(&metrics::BLS_POOL_SAME_MESSAGE_RETRIES_TOTAL);
    metrics::inc_counter_by(
        &metrics::BLS_POOL_SAME_MESSAGE_RETRY_SETS_TOTAL,
        pairs.len() as u64,
    );
    pairs
        .iter()
        .map(|(pubkey, signature)| signature.verify(pubkey, message))
        .collect()
}

/// Notifies the manager that a worker is free once dropped.
///
/// Created before the worker starts so that the worker is always freed, even after a panic.
pub struct SendOnDrop {
    pub tx: mpsc::UnboundedSender<()>,
}

impl Drop for SendOnDrop {
    fn drop(&mut self) {
        if self.tx.send(()).is_err() {
            warn!(
                msg = "did not free worker, shutdown may be underway",
                "Unable to free worker"
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bls::Keypair;

    fn job_sets(valid: &[bool]) -> Vec<Vec<SignatureSet<'static>>> {
        valid
            .iter()
            .enumerate()
            .map(|(i, valid)| {
                let keypair = Keypair::random();
                let message = Hash256::repeat_byte(i as u8);
                let signed = if *valid {
                    message
                } else {
                    Hash256::repeat_byte(0xff)
                };
                vec![SignatureSet::single_pubkey(
                    keypair.sk.sign(signed),
                    keypair.pk,
                    message,
                )]
            })
            .collect()
    }

    fn as_slices<'a>(
        sets: &'a [Vec<SignatureSet<'static>>],
    ) -> Vec<&'a [SignatureSet<'static>]> {
        sets.iter().map(Vec::as_slice).collect()
    }

    #[test]
    fn valid_batches_pass_every_job() {
        let sets = job_sets(&[true, true, true]);
        assert_eq!(verify_default_jobs(&as_slices(&sets)), vec![true; 3]);
    }

    #[test]
    fn invalid_job_does_not_poison_the_batch() {
        let sets = job_sets(&[true, false, true, true]);
        assert_eq!(
            verify_default_jobs(&as_slices(&sets)),
            vec![true, false, true, true]
        );
    }

    #[test]
    fn single_jobs_are_verified_directly() {
        assert_eq!(verify_default_jobs(&as_slices(&job_sets(&[false]))), vec![false]);
        assert_eq!(verify_default_jobs(&as_slices(&job_sets(&[true]))), vec![true]);
    }

    #[test]
    fn same_message_failures_are_localized() {
        let message = Hash256::repeat_byte(1);
        let keypairs = (0..5).map(|_| Keypair::random()).collect::<Vec<_>>();
        let mut pairs = keypairs
            .iter()
            .map(|kp| (kp.pk, kp.sk.sign(message)))
            .collect::<Vec<_>>();

        assert_eq!(verify_same_message_job(&pairs, message), vec![true; 5]);

        let mut bytes = pairs[3].1.serialize();
        bytes[20] ^= 1;
        pairs[3].1 = Signature::deserialize(&bytes).unwrap();

        assert_eq!(
            verify_same_message_job(&pairs, message),
            vec![true, true, true, false, true]
        );
    }

    #[test]
    fn panics_become_errors() {
        assert_eq!(catch_panic(|| 1), Ok(1));
        assert_eq!(
            catch_panic(|| -> usize { panic!("verification failed") }),
            Err(Error::WorkerPanicked)
        );
    }

    #[test]
    fn dropping_the_guard_frees_the_worker() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        drop(SendOnDrop { tx });
        assert_eq!(rx.try_recv(), Ok(()));
    }
}
