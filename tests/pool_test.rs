//! Pool Tests
//!
//! Capacity bounding, status handles and shutdown behaviour of the job pool.

use gobs::pool::{Pool, PoolConfig};
use gobs::PoolError;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tokio_test::{assert_pending, assert_ready};

#[derive(Debug, PartialEq, thiserror::Error)]
enum TestError {
    #[error("general error for testing")]
    AnError,
}

#[test]
fn test_construction() {
    assert!(std::panic::catch_unwind(|| Pool::new(0)).is_err());
    assert!(std::panic::catch_unwind(|| Pool::new(1)).is_ok());

    let err = Pool::try_new(PoolConfig::new(0)).unwrap_err();
    assert_eq!(err, PoolError::InvalidConcurrency(0));

    let pool = Pool::try_new(PoolConfig::new(8).with_name("named")).unwrap();
    assert_eq!(pool.name(), "named");
    assert_eq!(pool.concurrency(), 8);
}

#[tokio::test]
async fn test_jobs() {
    gobs::utils::telemetry::init_tracing();
    let pool = Pool::new(2);

    // A non-error is not reported as a failure
    let ok_job = {
        let pool = pool.clone();
        tokio::spawn(async move {
            let status = pool
                .submit(|| async {
                    sleep(Duration::from_millis(200)).await;
                    Ok(())
                })
                .await;
            status.wait().await
        })
    };

    // The job's error comes back through its status
    let failing_job = {
        let pool = pool.clone();
        tokio::spawn(async move {
            let status = pool
                .submit(|| async {
                    sleep(Duration::from_millis(200)).await;
                    Err(TestError::AnError.into())
                })
                .await;
            status.wait().await
        })
    };

    // Make sure the first two submissions went through
    sleep(Duration::from_millis(1)).await;

    // Both slots are taken, so this submission is queued
    let queued = {
        let pool = pool.clone();
        tokio::spawn(async move {
            let now = Instant::now();
            pool.submit(|| async { Ok(()) }).await;
            now.elapsed()
        })
    };

    assert!(ok_job.await.unwrap().is_ok());
    let err = failing_job.await.unwrap().unwrap_err();
    assert_eq!(err.downcast_ref::<TestError>(), Some(&TestError::AnError));
    assert!(queued.await.unwrap() > Duration::from_millis(150));

    let now = Instant::now();
    pool.submit(|| async {
        sleep(Duration::from_millis(100)).await;
        Ok(())
    })
    .await;
    pool.stop().await;
    assert!(now.elapsed() >= Duration::from_millis(100));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_is_never_exceeded() {
    for concurrency in [1usize, 2, 3, 5] {
        let pool = Pool::new(concurrency);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut statuses = Vec::new();
        for _ in 0..20 {
            let active = active.clone();
            let peak = peak.clone();
            let status = pool
                .submit(move || async move {
                    let now_active = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now_active, Ordering::SeqCst);
                    assert!(now_active <= concurrency);
                    sleep(Duration::from_millis(5)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
                .await;
            statuses.push(status);
        }

        for status in &statuses {
            assert!(status.wait().await.is_ok(), "instrumented job failed");
        }
        pool.stop().await;

        let peak = peak.load(Ordering::SeqCst);
        assert!((1..=concurrency).contains(&peak), "peak {} > {}", peak, concurrency);
        assert_eq!(active.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn test_status_wait_is_repeatable() {
    let pool = Pool::new(1);
    let status = pool
        .submit(|| async { Err(TestError::AnError.into()) })
        .await;

    let first = status.wait().await.unwrap_err();
    let second = status.wait().await.unwrap_err();
    let from_clone = status.clone().wait().await.unwrap_err();

    assert!(first.ptr_eq(&second));
    assert!(first.ptr_eq(&from_clone));
    assert_eq!(first.to_string(), "general error for testing");
    assert!(status.is_done());
}

#[tokio::test]
async fn test_concurrent_waiters() {
    let pool = Pool::new(2);
    let status = pool
        .submit(|| async {
            sleep(Duration::from_millis(50)).await;
            Ok(())
        })
        .await;

    let waiters: Vec<_> = (0..8)
        .map(|_| {
            let status = status.clone();
            tokio::spawn(async move { status.wait().await })
        })
        .collect();

    for waiter in waiters {
        assert!(waiter.await.unwrap().is_ok());
    }
}

#[tokio::test]
async fn test_submit_suspends_only_on_admission() {
    let pool = Pool::new(1);
    let running = pool
        .submit(|| async {
            sleep(Duration::from_millis(50)).await;
            Ok(())
        })
        .await;
    assert!(!running.is_done());

    let mut blocked = tokio_test::task::spawn(pool.submit(|| async { Ok(()) }));
    assert_pending!(blocked.poll());

    let mut waiting = tokio_test::task::spawn(running.wait());
    assert_pending!(waiting.poll());

    running.wait().await.unwrap();
    // Slot is handed back right after the status resolves
    sleep(Duration::from_millis(20)).await;

    let admitted = assert_ready!(blocked.poll());
    assert!(admitted.wait().await.is_ok());
    assert!(assert_ready!(waiting.poll()).is_ok());
}

#[tokio::test]
async fn test_failures_do_not_affect_other_jobs() {
    let pool = Pool::new(2);
    let failing = pool
        .submit(|| async { Err(anyhow::anyhow!("first job failed")) })
        .await;
    let panicking = pool
        .submit(|| async {
            panic!("second job panicked");
        })
        .await;
    let healthy = pool.submit(|| async { Ok(()) }).await;

    assert_eq!(failing.wait().await.unwrap_err().to_string(), "first job failed");
    assert_eq!(
        panicking.wait().await.unwrap_err().to_string(),
        "job panicked: second job panicked"
    );
    assert!(healthy.wait().await.is_ok());
    pool.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_waits_for_every_job() {
    let pool = Pool::new(2);
    let finished = Arc::new(AtomicUsize::new(0));

    for i in 0..4u64 {
        let finished = finished.clone();
        pool.submit(move || async move {
            sleep(Duration::from_millis(20 * (i + 1))).await;
            finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await;
    }

    pool.stop().await;
    assert_eq!(finished.load(Ordering::SeqCst), 4);
    assert!(pool.is_stopped());
}

#[tokio::test]
async fn test_stop_waits_for_pending_submitter() {
    let pool = Pool::new(1);
    let finished = Arc::new(AtomicUsize::new(0));

    let first = finished.clone();
    pool.submit(move || async move {
        sleep(Duration::from_millis(50)).await;
        first.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .await;

    // Blocks on admission until the first job frees the only slot
    let submitter = {
        let pool = pool.clone();
        let second = finished.clone();
        tokio::spawn(async move {
            pool.submit(move || async move {
                second.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
        })
    };
    sleep(Duration::from_millis(5)).await;
    assert!(!submitter.is_finished());

    pool.stop().await;
    assert_eq!(finished.load(Ordering::SeqCst), 2);

    let status = submitter.await.unwrap();
    assert!(status.wait().await.is_ok());
}

#[tokio::test]
async fn test_status_outlives_pool_handle() {
    let done = Arc::new(AtomicBool::new(false));
    let status = {
        let pool = Pool::new(1);
        let done = done.clone();
        pool.submit(move || async move {
            sleep(Duration::from_millis(10)).await;
            done.store(true, Ordering::SeqCst);
            Ok(())
        })
        .await
    };

    assert!(status.wait().await.is_ok());
    assert!(done.load(Ordering::SeqCst));
}
