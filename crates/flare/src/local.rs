//! Process-wide dispatch front end and the asynchronous issue catcher.
//!
//! Without a catcher, `report` forwards synchronously to the
//! [`StreamManager`]. Installing a catcher starts a dedicated worker
//! thread; from then on every report from a non-worker thread is cloned,
//! stamped with the reported severity, and queued for the catcher.
//! Reports made *by* the catcher itself go back to the synchronous path,
//! so a catcher can keep reporting without deadlocking on its own queue.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, LazyLock, Mutex, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use tracing::{debug, error};

use crate::config::FlareConfig;
use crate::error::FlareError;
use crate::issue::Issue;
use crate::severity::Severity;
use crate::stream::manager::StreamManager;

type Catcher = dyn Fn(&dyn Issue) + Send + Sync;

struct QueueState {
    issues: VecDeque<Box<dyn Issue>>,
    terminated: bool,
}

struct Shared {
    queue: Mutex<QueueState>,
    available: Condvar,
}

struct WorkerState {
    handle: JoinHandle<()>,
    thread_id: ThreadId,
}

pub struct LocalStream {
    manager: StreamManager,
    shared: Arc<Shared>,
    worker: Mutex<Option<WorkerState>>,
}

static INSTANCE: LazyLock<LocalStream> = LazyLock::new(|| {
    let config = FlareConfig::load();
    LocalStream::new(config.streams).unwrap_or_else(|err| {
        tracing::warn!("stream configuration rejected ({err}); using defaults");
        LocalStream::with_defaults()
    })
});

impl LocalStream {
    /// The process-wide instance, configured from [`FlareConfig::load`] on
    /// first use. Initialize (by reporting or touching it) before the first
    /// report you care about; teardown happens implicitly at process exit.
    pub fn instance() -> &'static LocalStream {
        &INSTANCE
    }

    /// An isolated instance over the given stream configuration. Embedders
    /// and tests own its lifecycle; dropping it uninstalls any catcher.
    pub fn new(config: crate::config::StreamConfig) -> Result<Self, FlareError> {
        Ok(Self::with_manager(StreamManager::new(&config)?))
    }

    fn with_defaults() -> Self {
        Self::with_manager(StreamManager::default())
    }

    fn with_manager(manager: StreamManager) -> Self {
        Self {
            manager,
            shared: Arc::new(Shared {
                queue: Mutex::new(QueueState {
                    issues: VecDeque::new(),
                    terminated: false,
                }),
                available: Condvar::new(),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Report `issue` with the given severity.
    ///
    /// Synchronous path (no catcher, or called from the worker thread):
    /// blocks for the duration of the stream chain's sends; a failing sink
    /// aborts the rest of the chain and propagates. Asynchronous path:
    /// clones the issue, stamps the clone, enqueues, and returns without
    /// waiting for delivery.
    pub fn report(&self, severity: Severity, issue: &dyn Issue) -> Result<(), FlareError> {
        let worker_thread = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|w| w.thread_id);
        match worker_thread {
            Some(worker_id) if thread::current().id() != worker_id => {
                let mut clone = issue.clone_issue();
                clone.record_mut().set_severity(severity);
                let mut queue = self
                    .shared
                    .queue
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                queue.issues.push_back(clone);
                drop(queue);
                self.shared.available.notify_one();
                Ok(())
            }
            _ => {
                if issue.severity() != severity {
                    let mut stamped = issue.clone_issue();
                    stamped.record_mut().set_severity(severity);
                    self.manager.dispatch(severity, stamped.as_ref())
                } else {
                    self.manager.dispatch(severity, issue)
                }
            }
        }
    }

    /// Install a catcher and start its worker thread.
    ///
    /// Fails with [`FlareError::CatcherAlreadyInstalled`] if a catcher is
    /// active. The returned guard uninstalls on drop; [`Self::uninstall`]
    /// may also be called directly.
    pub fn install<F>(&self, catcher: F) -> Result<CatcherGuard<'_>, FlareError>
    where
        F: Fn(&dyn Issue) + Send + Sync + 'static,
    {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.is_some() {
            return Err(FlareError::CatcherAlreadyInstalled);
        }
        {
            let mut queue = self
                .shared
                .queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            queue.terminated = false;
            queue.issues.clear();
        }
        let shared = Arc::clone(&self.shared);
        let catcher: Arc<Catcher> = Arc::new(catcher);
        let handle = thread::Builder::new()
            .name("flare-catcher".to_string())
            .spawn(move || worker_loop(shared, catcher))
            .map_err(|e| FlareError::sink("catcher-worker", e))?;
        let thread_id = handle.thread().id();
        debug!("issue catcher installed");
        *worker = Some(WorkerState { handle, thread_id });
        Ok(CatcherGuard { stream: self })
    }

    /// Stop the worker and remove the catcher. Blocks until the worker has
    /// exited (unbounded: a stuck catcher stalls teardown). Issues still
    /// queued are discarded. No-op when no catcher is installed. Must not
    /// be called from inside the catcher callback, which runs on the worker
    /// thread being joined.
    pub fn uninstall(&self) {
        let state = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(state) = state else {
            return;
        };
        {
            let mut queue = self
                .shared
                .queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            queue.terminated = true;
        }
        self.shared.available.notify_one();
        let _ = state.handle.join();
        debug!("issue catcher removed");
    }
}

impl Drop for LocalStream {
    fn drop(&mut self) {
        self.uninstall();
    }
}

/// Uninstalls the catcher when dropped.
#[must_use = "dropping the guard uninstalls the catcher"]
pub struct CatcherGuard<'a> {
    stream: &'a LocalStream,
}

impl Drop for CatcherGuard<'_> {
    fn drop(&mut self) {
        self.stream.uninstall();
    }
}

fn worker_loop(shared: Arc<Shared>, catcher: Arc<Catcher>) {
    let mut state = shared.queue.lock().unwrap_or_else(PoisonError::into_inner);
    loop {
        while !state.terminated && state.issues.is_empty() {
            state = shared
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if state.terminated {
            return;
        }
        while let Some(issue) = state.issues.pop_front() {
            // The catcher runs without the lock so producers never block on
            // the callback.
            drop(state);
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| catcher(issue.as_ref())));
            if outcome.is_err() {
                error!("issue catcher panicked; issue dropped: {}", issue.as_ref());
            }
            drop(issue);
            state = shared.queue.lock().unwrap_or_else(PoisonError::into_inner);
            if state.terminated {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StreamConfig;
    use crate::here;
    use crate::issue::{AnyIssue, IssueRecord};

    fn silent() -> LocalStream {
        LocalStream::new(StreamConfig {
            debug: "null".into(),
            log: "null".into(),
            info: "null".into(),
            warning: "null".into(),
            error: "null".into(),
            fatal: "null".into(),
        })
        .unwrap()
    }

    fn issue(message: &str) -> AnyIssue {
        AnyIssue::new(
            "test.Issue",
            IssueRecord::new(here!(), Severity::Error, message),
        )
    }

    #[test]
    fn test_install_twice_fails() {
        let stream = silent();
        let _guard = stream.install(|_| {}).unwrap();
        assert!(matches!(
            stream.install(|_| {}),
            Err(FlareError::CatcherAlreadyInstalled)
        ));
    }

    #[test]
    fn test_uninstall_without_catcher_is_noop() {
        let stream = silent();
        stream.uninstall();
        stream.uninstall();
    }

    #[test]
    fn test_reinstall_after_uninstall() {
        let stream = silent();
        let guard = stream.install(|_| {}).unwrap();
        drop(guard);
        let _guard = stream.install(|_| {}).unwrap();
    }

    #[test]
    fn test_synchronous_report_without_catcher() {
        let stream = silent();
        let issue = issue("sync");
        assert!(stream.report(Severity::Warning, &issue).is_ok());
    }
}
