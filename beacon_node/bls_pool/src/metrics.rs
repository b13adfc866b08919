pub use metrics::*;
use std::sync::LazyLock;

/*
 * Queue
 */
pub static BLS_POOL_QUEUE_LENGTH: LazyLock<Result<IntGauge>> = LazyLock::new(|| {
    try_create_int_gauge(
        "bls_pool_queue_length",
        "Count of jobs waiting in the queue or the batchable buffer",
    )
});
pub static BLS_POOL_WORKERS_BUSY: LazyLock<Result<IntGauge>> = LazyLock::new(|| {
    try_create_int_gauge(
        "bls_pool_workers_busy",
        "Count of workers currently verifying a batch",
    )
});
pub static BLS_POOL_QUEUE_FULL_TOTAL: LazyLock<Result<IntCounter>> = LazyLock::new(|| {
    try_create_int_counter(
        "bls_pool_queue_full_total",
        "Count of jobs rejected because the queue was full",
    )
});
pub static BLS_POOL_JOB_WAIT_SECONDS: LazyLock<Result<Histogram>> = LazyLock::new(|| {
    try_create_histogram(
        "bls_pool_job_wait_seconds",
        "Time between a job being submitted and a worker starting it",
    )
});

/*
 * Submissions
 */
pub static BLS_POOL_SIG_SETS_TOTAL: LazyLock<Result<IntCounter>> = LazyLock::new(|| {
    try_create_int_counter(
        "bls_pool_sig_sets_total",
        "Count of signature sets submitted for verification",
    )
});
pub static BLS_POOL_PRIORITIZED_SIG_SETS_TOTAL: LazyLock<Result<IntCounter>> =
    LazyLock::new(|| {
        try_create_int_counter(
            "bls_pool_prioritized_sig_sets_total",
            "Count of signature sets submitted with priority",
        )
    });
pub static BLS_POOL_BATCHABLE_SIG_SETS_TOTAL: LazyLock<Result<IntCounter>> = LazyLock::new(|| {
    try_create_int_counter(
        "bls_pool_batchable_sig_sets_total",
        "Count of signature sets submitted as batchable",
    )
});
pub static BLS_POOL_CURRENT_THREAD_SECONDS: LazyLock<Result<Histogram>> = LazyLock::new(|| {
    try_create_histogram(
        "bls_pool_current_thread_seconds",
        "Time spent verifying signature sets on the submitting thread",
    )
});

/*
 * Workers
 */
pub static BLS_POOL_JOB_GROUPS_STARTED_TOTAL: LazyLock<Result<IntCounter>> = LazyLock::new(|| {
    try_create_int_counter(
        "bls_pool_job_groups_started_total",
        "Count of batches handed to a worker",
    )
});
pub static BLS_POOL_JOBS_STARTED_TOTAL: LazyLock<Result<IntCounterVec>> = LazyLock::new(|| {
    try_create_int_counter_vec(
        "bls_pool_jobs_started_total",
        "Count of jobs handed to a worker",
        &["type"],
    )
});
pub static BLS_POOL_SIG_SETS_STARTED_TOTAL: LazyLock<Result<IntCounterVec>> =
    LazyLock::new(|| {
        try_create_int_counter_vec(
            "bls_pool_sig_sets_started_total",
            "Count of signature sets handed to a worker",
            &["type"],
        )
    });
pub static BLS_POOL_WORKER_SECONDS: LazyLock<Result<HistogramVec>> = LazyLock::new(|| {
    try_create_histogram_vec(
        "bls_pool_worker_seconds",
        "Time spent by a worker verifying one batch",
        &["type"],
    )
});
pub static BLS_POOL_BATCH_RETRIES_TOTAL: LazyLock<Result<IntCounter>> = LazyLock::new(|| {
    try_create_int_counter(
        "bls_pool_batch_retries_total",
        "Count of batches that failed and were re-verified job by job",
    )
});
pub static BLS_POOL_BATCH_SIGS_SUCCESS_TOTAL: LazyLock<Result<IntCounter>> = LazyLock::new(|| {
    try_create_int_counter(
        "bls_pool_batch_sigs_success_total",
        "Count of signature sets verified by a successful multi-job batch",
    )
});
pub static BLS_POOL_SAME_MESSAGE_RETRIES_TOTAL: LazyLock<Result<IntCounter>> =
    LazyLock::new(|| {
        try_create_int_counter(
            "bls_pool_same_message_retries_total",
            "Count of same-message jobs whose aggregate check failed",
        )
    });
pub static BLS_POOL_SAME_MESSAGE_RETRY_SETS_TOTAL: LazyLock<Result<IntCounter>> =
    LazyLock::new(|| {
        try_create_int_counter(
            "bls_pool_same_message_retry_sets_total",
            "Count of signatures re-verified individually after a failed aggregate check",
        )
    });
pub static BLS_POOL_WORKER_PANICS_TOTAL: LazyLock<Result<IntCounter>> = LazyLock::new(|| {
    try_create_int_counter(
        "bls_pool_worker_panics_total",
        "Count of batches that panicked during verification",
    )
});
