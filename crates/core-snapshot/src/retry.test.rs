#![allow(clippy::unwrap_used, clippy::expect_used)]
use super::*;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

#[tokio::test]
async fn succeeds_on_first_try_without_sleeping() {
    let calls = AtomicUsize::new(0);
    let result: Result<u32, Error> = with_commit_retry("commit", || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(7)
    })
    .await;

    assert_eq!(result.unwrap(), 7);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn succeeds_after_some_failures() {
    let calls = AtomicUsize::new(0);
    let result: Result<u32, Error> = with_commit_retry("commit", || {
        let attempt = calls.fetch_add(1, Ordering::SeqCst);
        async move {
            if attempt < 2 {
                Err(Error::invalid_operation("transient git failure"))
            } else {
                Ok(42)
            }
        }
    })
    .await;

    assert_eq!(result.unwrap(), 42);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn returns_last_error_after_exhausting_retries() {
    let calls = AtomicUsize::new(0);
    let result: Result<u32, Error> = with_commit_retry("commit", || {
        let attempt = calls.fetch_add(1, Ordering::SeqCst);
        async move { Err(Error::invalid_operation(format!("failure #{attempt}"))) }
    })
    .await;

    let err = result.unwrap_err();
    assert!(err.to_string().contains("failure #3"));
    assert_eq!(calls.load(Ordering::SeqCst), 1 + BACKOFF.len());
}
