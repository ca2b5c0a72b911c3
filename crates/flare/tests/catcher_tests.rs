//! Catcher lifecycle and delivery tests.
//!
//! Exercises the asynchronous path end to end: many producer threads, one
//! worker, install/uninstall transitions, re-entrant reports from the
//! catcher itself, and worker survival across a panicking callback.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use flare::{here, AnyIssue, Issue, IssueRecord, LocalStream, Severity, StreamConfig};

fn silent_config() -> StreamConfig {
    StreamConfig {
        debug: "null".into(),
        log: "null".into(),
        info: "null".into(),
        warning: "null".into(),
        error: "null".into(),
        fatal: "null".into(),
    }
}

fn issue(message: &str) -> AnyIssue {
    AnyIssue::new(
        "test.CatcherIssue",
        IssueRecord::new(here!(), Severity::Error, message),
    )
}

/// Wait until `predicate` holds or the timeout expires.
fn wait_for(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    predicate()
}

#[test]
fn test_concurrent_producers_deliver_all_clones() {
    let stream = Arc::new(LocalStream::new(silent_config()).unwrap());
    let received: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&received);
    let guard = stream
        .install(move |issue| {
            sink.lock().unwrap().push(issue.message().to_string());
        })
        .unwrap();

    let mut producers = Vec::new();
    for t in 0..10 {
        let stream = Arc::clone(&stream);
        producers.push(thread::spawn(move || {
            for i in 0..10 {
                let issue = issue(&format!("t{t}-i{i}"));
                stream.report(Severity::Warning, &issue).unwrap();
            }
        }));
    }
    for producer in producers {
        producer.join().unwrap();
    }

    assert!(
        wait_for(Duration::from_secs(10), || received.lock().unwrap().len() == 100),
        "catcher received {} of 100 issues",
        received.lock().unwrap().len()
    );

    let messages = received.lock().unwrap();
    let distinct: HashSet<&String> = messages.iter().collect();
    assert_eq!(distinct.len(), 100, "each clone is a distinct issue");
    drop(messages);
    drop(guard);
}

#[test]
fn test_single_producer_delivery_is_fifo() {
    let stream = Arc::new(LocalStream::new(silent_config()).unwrap());
    let received: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&received);
    let _guard = stream
        .install(move |issue| {
            sink.lock().unwrap().push(issue.message().to_string());
        })
        .unwrap();

    for i in 0..50 {
        let issue = issue(&format!("i{i:02}"));
        stream.report(Severity::Error, &issue).unwrap();
    }

    assert!(wait_for(Duration::from_secs(5), || {
        received.lock().unwrap().len() == 50
    }));
    // One producer, one queue: delivery order matches report order.
    let expected: Vec<String> = (0..50).map(|i| format!("i{i:02}")).collect();
    assert_eq!(received.lock().unwrap().as_slice(), expected.as_slice());
}

#[test]
fn test_catcher_sees_reported_severity() {
    let stream = Arc::new(LocalStream::new(silent_config()).unwrap());
    let severities: Arc<Mutex<Vec<Severity>>> = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&severities);
    let _guard = stream
        .install(move |issue| sink.lock().unwrap().push(issue.severity()))
        .unwrap();

    // Constructed at Error, reported at Debug: the clone carries Debug.
    let issue = issue("escalation");
    stream.report(Severity::Debug, &issue).unwrap();

    assert!(wait_for(Duration::from_secs(5), || {
        !severities.lock().unwrap().is_empty()
    }));
    assert_eq!(severities.lock().unwrap()[0], Severity::Debug);
    // The caller's issue is untouched; only the queued clone was stamped.
    assert_eq!(issue.severity(), Severity::Error);
}

#[test]
fn test_report_from_catcher_dispatches_synchronously() {
    let stream = Arc::new(LocalStream::new(silent_config()).unwrap());
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&seen);
    let inner_stream = Arc::clone(&stream);
    let _guard = stream
        .install(move |caught| {
            sink.lock().unwrap().push(caught.message().to_string());
            // A report from the worker thread must not re-enter the queue,
            // otherwise this would recurse forever.
            let follow_up = issue("from-catcher");
            inner_stream.report(Severity::Info, &follow_up).unwrap();
        })
        .unwrap();

    let first = issue("from-producer");
    stream.report(Severity::Error, &first).unwrap();

    assert!(wait_for(Duration::from_secs(5), || {
        !seen.lock().unwrap().is_empty()
    }));
    // Only the producer's issue reaches the catcher; the follow-up went to
    // the stream chain.
    thread::sleep(Duration::from_millis(50));
    assert_eq!(seen.lock().unwrap().as_slice(), ["from-producer".to_string()]);
}

#[test]
fn test_worker_survives_panicking_catcher() {
    let stream = Arc::new(LocalStream::new(silent_config()).unwrap());
    let received: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&received);
    let _guard = stream
        .install(move |issue| {
            if issue.message() == "boom" {
                panic!("catcher exploded");
            }
            sink.lock().unwrap().push(issue.message().to_string());
        })
        .unwrap();

    stream.report(Severity::Error, &issue("boom")).unwrap();
    stream.report(Severity::Error, &issue("after")).unwrap();

    assert!(
        wait_for(Duration::from_secs(5), || {
            received.lock().unwrap().contains(&"after".to_string())
        }),
        "worker died after catcher panic"
    );
}

#[test]
fn test_install_twice_then_reinstall() {
    let stream = LocalStream::new(silent_config()).unwrap();
    let guard = stream.install(|_| {}).unwrap();
    assert!(matches!(
        stream.install(|_| {}),
        Err(flare::FlareError::CatcherAlreadyInstalled)
    ));
    drop(guard);
    // Uninstall through the guard makes room for a fresh catcher.
    let _guard = stream.install(|_| {}).unwrap();
}

#[test]
fn test_uninstall_when_idle_is_noop() {
    let stream = LocalStream::new(silent_config()).unwrap();
    stream.uninstall();
    stream.uninstall();
}
