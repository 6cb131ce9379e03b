//! Content-addressed local caching of remote-only inputs, plus best-effort
//! staged uploads, built on a retrying external-command executor.
//!
//! Cache keys hash the remote *path string*, not file content; a present
//! local file is the sole hit test and nothing is ever invalidated.

use std::{
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context as _;
use sha2::Digest as _;
use tracing::{debug, info, warn};

use crate::error::{ShowreelError, ShowreelResult};

pub const REMOTE_SCHEME: &str = "manifold://";

pub fn is_remote_path(path: &str) -> bool {
    path.starts_with(REMOTE_SCHEME)
}

/// Strip the remote scheme by splitting on the first double-slash.
/// Non-prefixed paths are already local and come back unchanged.
pub fn strip_scheme(path: &str) -> &str {
    if !is_remote_path(path) {
        return path;
    }
    match path.split_once("//") {
        Some((_, rest)) => rest,
        None => path,
    }
}

/// Deterministic cache key for a remote path string.
pub fn path_digest(path: &str) -> String {
    let digest = sha2::Sha256::digest(path.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// An external command, held as argv rather than a shell line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl RemoteCommand {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Seam for executing external transfer commands, so callers can substitute
/// a recording implementation in tests.
pub trait CommandRunner: Send {
    /// Run the command to completion and return its exit code.
    fn run(&mut self, command: &RemoteCommand) -> ShowreelResult<i32>;
}

/// Runs commands as real child processes.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&mut self, command: &RemoteCommand) -> ShowreelResult<i32> {
        let status = std::process::Command::new(&command.program)
            .args(&command.args)
            .status()
            .with_context(|| format!("failed to spawn '{command}'"))?;
        Ok(status.code().unwrap_or(-1))
    }
}

pub const RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Execute `command` up to `retries + 1` times with a fixed backoff between
/// attempts. The terminal error carries the last nonzero exit status.
pub fn run_with_retry(
    runner: &mut dyn CommandRunner,
    command: &RemoteCommand,
    retries: u32,
) -> ShowreelResult<()> {
    let mut last_status = -1;
    for attempt in 0..=retries {
        match runner.run(command) {
            Ok(0) => return Ok(()),
            Ok(status) => {
                last_status = status;
                warn!(%command, status, attempt, "command exited nonzero");
            }
            Err(err) => {
                warn!(%command, %err, attempt, "command could not be executed");
            }
        }
        if attempt < retries {
            std::thread::sleep(RETRY_BACKOFF);
        }
    }
    Err(ShowreelError::Command {
        command: command.to_string(),
        status: last_status,
    })
}

/// Local cache for `manifold://` inputs and staging area for uploads.
pub struct RemoteCache {
    cache_dir: PathBuf,
    retries: u32,
    runner: Box<dyn CommandRunner>,
}

impl RemoteCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            retries: 0,
            runner: Box::new(SystemRunner),
        }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_runner(mut self, runner: Box<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Resolve `path` to something readable on local disk.
    ///
    /// Remote paths map to `cache_dir / sha256(path)` and are fetched once;
    /// while the local file exists, repeated calls never re-fetch, even if
    /// the remote content has changed since. Local paths pass through.
    ///
    /// Concurrent first-time downloads of the same path race (check then
    /// fetch, no locking); both may fetch, the content is identical.
    pub fn download_if_remote(&mut self, path: &str) -> ShowreelResult<PathBuf> {
        if !is_remote_path(path) {
            return Ok(PathBuf::from(path));
        }

        let local = self.cache_dir.join(path_digest(path));
        if local.exists() {
            debug!(path, local = %local.display(), "remote path already cached");
            return Ok(local);
        }

        std::fs::create_dir_all(&self.cache_dir)
            .with_context(|| format!("create cache dir '{}'", self.cache_dir.display()))?;

        info!(path, local = %local.display(), "fetching remote file");
        let command = RemoteCommand::new(
            "manifold",
            [
                "get",
                strip_scheme(path),
                &local.display().to_string(),
                "--overwrite",
            ],
        );
        run_with_retry(self.runner.as_mut(), &command, self.retries)?;
        Ok(local)
    }

    /// Deterministic staging directory for a remote destination.
    pub fn staging_dir(&self, remote_dir: &str) -> PathBuf {
        self.cache_dir.join(path_digest(remote_dir))
    }

    /// Recursively upload a local directory to the remote store.
    pub fn upload_dir(&mut self, local_dir: &Path, remote_dir: &str) -> ShowreelResult<()> {
        info!(local = %local_dir.display(), remote_dir, "uploading directory");
        let command = RemoteCommand::new(
            "manifold",
            [
                "putr",
                &local_dir.display().to_string(),
                strip_scheme(remote_dir),
                "--overwrite",
            ],
        );
        run_with_retry(self.runner.as_mut(), &command, self.retries)
    }

    pub fn mkdirs(&mut self, remote_dir: &str) -> ShowreelResult<()> {
        let command = RemoteCommand::new("manifold", ["mkdirs", strip_scheme(remote_dir)]);
        run_with_retry(self.runner.as_mut(), &command, self.retries)
    }

    /// Acquire a staging directory for `remote_dir`, run `f` with it, then
    /// upload the staged files.
    ///
    /// Upload timing is explicit (right after `f` returns `Ok`) and upload
    /// failures surface as errors, rather than firing from a finalizer. If
    /// `f` fails, nothing is uploaded.
    pub fn with_upload<T>(
        &mut self,
        remote_dir: &str,
        f: impl FnOnce(&Path) -> ShowreelResult<T>,
    ) -> ShowreelResult<T> {
        let staging = self.staging_dir(remote_dir);
        std::fs::create_dir_all(&staging)
            .with_context(|| format!("create staging dir '{}'", staging.display()))?;
        let value = f(&staging)?;
        self.upload_dir(&staging, remote_dir)?;
        Ok(value)
    }
}
