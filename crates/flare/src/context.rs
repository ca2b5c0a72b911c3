//! Provenance of an issue: where in the code it was raised and by which
//! process. Immutable once constructed.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::sync::LazyLock;

/// Identity of the running process, captured once and shared by every
/// locally captured [`Context`].
#[derive(Debug, Clone)]
struct ProcessIdentity {
    host: String,
    pid: u32,
    cwd: String,
    uid: u32,
    user: String,
    app: String,
}

static PROCESS: LazyLock<ProcessIdentity> = LazyLock::new(ProcessIdentity::capture);

impl ProcessIdentity {
    fn capture() -> Self {
        let host = nix::unistd::gethostname()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());
        let uid = unsafe { libc::getuid() };
        let user = nix::unistd::User::from_uid(nix::unistd::Uid::from_raw(uid))
            .ok()
            .flatten()
            .map(|u| u.name)
            .unwrap_or_else(|| env::var("USER").unwrap_or_default());
        let cwd = env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let app = env::var("FLARE_APPLICATION_NAME")
            .ok()
            .or_else(application_from_args)
            .unwrap_or_else(|| "unknown".to_string());
        Self {
            host,
            pid: std::process::id(),
            cwd,
            uid,
            user,
            app,
        }
    }
}

fn application_from_args() -> Option<String> {
    let argv0 = env::args().next()?;
    Path::new(&argv0)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
}

#[cfg(target_os = "linux")]
fn current_tid() -> i64 {
    (unsafe { libc::gettid() }) as i64
}

#[cfg(not(target_os = "linux"))]
fn current_tid() -> i64 {
    0
}

/// Immutable provenance record attached to every issue.
///
/// Captured locally at the report call site (see [`Context::capture`] and
/// the [`here!`](crate::here) macro), or reconstructed from a serialized
/// representation that crossed a process boundary ([`Context::remote`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    pub package: String,
    pub file: String,
    pub function: String,
    pub line: u32,
    pub host: String,
    pub pid: u32,
    pub tid: i64,
    pub cwd: String,
    pub uid: u32,
    pub user: String,
    pub app: String,
}

impl Context {
    /// Capture a context for the current process at the given source
    /// position. Thread id is read per call; the rest of the process
    /// identity is captured once and reused.
    pub fn capture(package: &str, file: &str, line: u32, function: &str) -> Self {
        let process = &*PROCESS;
        Self {
            package: package.to_string(),
            file: file.to_string(),
            function: function.to_string(),
            line,
            host: process.host.clone(),
            pid: process.pid,
            tid: current_tid(),
            cwd: process.cwd.clone(),
            uid: process.uid,
            user: process.user.clone(),
            app: process.app.clone(),
        }
    }

    /// Reconstruct a context that describes another process, e.g. one read
    /// back from the foreign-boundary shape. All fields are taken verbatim.
    #[allow(clippy::too_many_arguments)]
    pub fn remote(
        package: String,
        file: String,
        function: String,
        line: u32,
        host: String,
        pid: u32,
        tid: i64,
        cwd: String,
        uid: u32,
        user: String,
        app: String,
    ) -> Self {
        Self {
            package,
            file,
            function,
            line,
            host,
            pid,
            tid,
            cwd,
            uid,
            user,
            app,
        }
    }

    /// Compact source position, used by the human-readable stream.
    pub fn position(&self) -> String {
        format!("{}:{} [{}]", self.file, self.line, self.function)
    }
}
