//! Running terraform as a child process.
//!
//! [`Executor`] is the seam between the [`Manager`](crate::Manager) and the
//! real binary. [`CliExecutor`] spawns terraform; [`MockExecutor`] records
//! invocations for tests.

use crate::binary::BinaryPath;
use crate::error::{Error, Result};
use statekit::Secret;
use std::collections::HashMap;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

/// How much combined output is kept for `bbl latest-error`.
pub const TAIL_CAPACITY: usize = 64 * 1024;

/// Result of one terraform invocation.
#[derive(Debug, Clone, Default)]
pub struct Output {
    /// Exit code, `None` if killed by a signal
    pub code: Option<i32>,
    /// Everything written to stdout
    pub stdout: String,
    /// Tail of stdout and stderr as they were interleaved
    pub combined: String,
}

impl Output {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs terraform subcommands.
pub trait Executor {
    /// Run terraform with `args` in `dir`, with `env` added to the
    /// environment. A non-zero exit is not an error at this level.
    fn run(&self, dir: &Path, args: &[String], env: &[(String, Secret)]) -> Result<Output>;
}

// ============================================================================
// TailBuffer
// ============================================================================

/// Keeps the last `capacity` bytes written to it.
#[derive(Debug, Clone)]
pub struct TailBuffer {
    capacity: usize,
    bytes: Vec<u8>,
}

impl TailBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            bytes: Vec::new(),
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
        if self.bytes.len() > self.capacity {
            let excess = self.bytes.len() - self.capacity;
            self.bytes.drain(..excess);
        }
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

// ============================================================================
// CliExecutor
// ============================================================================

/// Spawns the real terraform binary.
#[derive(Debug, Clone)]
pub struct CliExecutor {
    binary: BinaryPath,
    debug: bool,
}

impl CliExecutor {
    /// `debug` echoes terraform's output to the terminal as it runs.
    pub fn new(binary: BinaryPath, debug: bool) -> Self {
        Self { binary, debug }
    }
}

impl Executor for CliExecutor {
    fn run(&self, dir: &Path, args: &[String], env: &[(String, Secret)]) -> Result<Output> {
        let program = self.binary.binary()?;
        let command = args.first().cloned().unwrap_or_default();
        log::debug!("running terraform {} in {}", args.join(" "), dir.display());

        let mut child = Command::new(&program)
            .args(args)
            .current_dir(dir)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.expose())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Spawn {
                command: command.clone(),
                source,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let tail = Mutex::new(TailBuffer::new(TAIL_CAPACITY));
        let debug = self.debug;

        let captured = thread::scope(|s| {
            let tail = &tail;
            let err = s.spawn(move || match stderr {
                Some(pipe) => drain(pipe, tail, debug.then(io::stderr)),
                None => Ok(Vec::new()),
            });
            let out = match stdout {
                Some(pipe) => drain(pipe, tail, debug.then(io::stdout)),
                None => Ok(Vec::new()),
            };
            let err = reader_result(err.join());
            out.and_then(|stdout| err.map(|()| stdout))
        });

        let status = child.wait().map_err(|source| Error::Spawn {
            command: command.clone(),
            source,
        })?;
        let stdout = captured.map_err(|source| Error::Spawn { command, source })?;

        Ok(Output {
            code: status.code(),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            combined: tail.into_inner().unwrap_or_else(PoisonError::into_inner).contents(),
        })
    }
}

/// Outcome of the stderr reader thread. A panic there would silently
/// truncate the tail, so it is surfaced as an error.
fn reader_result(joined: thread::Result<io::Result<Vec<u8>>>) -> io::Result<()> {
    match joined {
        Ok(result) => result.map(drop),
        Err(_) => Err(io::Error::other("stderr reader thread panicked")),
    }
}

/// Copy `pipe` into `tail` (and `echo`) until EOF, returning everything read.
fn drain(
    mut pipe: impl Read,
    tail: &Mutex<TailBuffer>,
    mut echo: Option<impl Write>,
) -> io::Result<Vec<u8>> {
    let mut captured = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = pipe.read(&mut chunk)?;
        if n == 0 {
            return Ok(captured);
        }
        let bytes = &chunk[..n];
        if let Some(w) = echo.as_mut() {
            let _ = w.write_all(bytes).and_then(|()| w.flush());
        }
        tail.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(bytes);
        captured.extend_from_slice(bytes);
    }
}

// ============================================================================
// MockExecutor
// ============================================================================

/// Canned response for one terraform subcommand.
#[derive(Debug, Clone, Default)]
pub struct MockResponse {
    pub code: i32,
    pub stdout: String,
    pub output: String,
    /// Written to the `-state=` path, if the invocation has one
    pub tf_state: Option<String>,
}

impl MockResponse {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Self::default()
        }
    }

    pub fn failure(code: i32, output: impl Into<String>) -> Self {
        Self {
            code,
            output: output.into(),
            ..Self::default()
        }
    }

    pub fn stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self
    }

    pub fn tf_state(mut self, tf_state: impl Into<String>) -> Self {
        self.tf_state = Some(tf_state.into());
        self
    }
}

/// A recorded invocation.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub dir: PathBuf,
    pub args: Vec<String>,
    /// Names of the extra environment variables (values are not kept)
    pub env: Vec<String>,
}

/// In-memory executor. Clones share recorded calls and responses.
#[derive(Debug, Clone, Default)]
pub struct MockExecutor {
    responses: Arc<Mutex<HashMap<String, MockResponse>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to `subcommand` (e.g. `apply`) with `response`. Unconfigured
    /// subcommands succeed with no output.
    pub fn respond(&self, subcommand: &str, response: MockResponse) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(subcommand.to_string(), response);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// First argument of every call, in order.
    pub fn subcommands(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| c.args.into_iter().next())
            .collect()
    }
}

impl Executor for MockExecutor {
    fn run(&self, dir: &Path, args: &[String], env: &[(String, Secret)]) -> Result<Output> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(MockCall {
                dir: dir.to_path_buf(),
                args: args.to_vec(),
                env: env.iter().map(|(k, _)| k.clone()).collect(),
            });

        let subcommand = args.first().map(String::as_str).unwrap_or_default();
        let response = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(subcommand)
            .cloned()
            .unwrap_or_default();

        if let Some(tf_state) = &response.tf_state
            && let Some(state_path) = args.iter().find_map(|a| a.strip_prefix("-state="))
        {
            let path = dir.join(state_path);
            fs::write(&path, tf_state).map_err(|e| Error::io(&path, e))?;
        }

        let mut tail = TailBuffer::new(TAIL_CAPACITY);
        tail.push(response.output.as_bytes());
        tail.push(response.stdout.as_bytes());

        Ok(Output {
            code: Some(response.code),
            stdout: response.stdout,
            combined: tail.contents(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_tail_buffer_keeps_the_end() {
        let mut tail = TailBuffer::new(8);
        tail.push(b"0123");
        tail.push(b"456789");
        assert_eq!(tail.contents(), "23456789");
    }

    #[test]
    fn test_tail_buffer_under_capacity() {
        let mut tail = TailBuffer::new(TAIL_CAPACITY);
        tail.push(b"Apply complete!");
        assert_eq!(tail.contents(), "Apply complete!");
    }

    #[test]
    fn test_stderr_reader_failures_are_errors() {
        assert!(reader_result(Ok(Ok(b"warning".to_vec()))).is_ok());

        let read = reader_result(Ok(Err(io::Error::other("broken pipe")))).unwrap_err();
        assert_eq!(read.to_string(), "broken pipe");

        let panicked = reader_result(Err(Box::new("boom"))).unwrap_err();
        assert_eq!(panicked.to_string(), "stderr reader thread panicked");
    }

    #[test]
    fn test_mock_records_and_writes_state() {
        let temp = TempDir::new().unwrap();
        let mock = MockExecutor::new();
        mock.respond(
            "apply",
            MockResponse::failure(1, "boom").tf_state("half-done"),
        );

        let args = vec!["apply".to_string(), "-state=tfstate".to_string()];
        let env = vec![("TF_VAR_secret".to_string(), Secret::new("s"))];
        let output = mock.run(temp.path(), &args, &env).unwrap();

        assert!(!output.success());
        assert_eq!(output.combined, "boom");
        assert_eq!(
            fs::read_to_string(temp.path().join("tfstate")).unwrap(),
            "half-done"
        );
        assert_eq!(mock.subcommands(), vec!["apply"]);
        assert_eq!(mock.calls()[0].env, vec!["TF_VAR_secret"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_cli_executor_captures_output() {
        use flate2::Compression;
        use flate2::write::GzEncoder;

        let script = b"#!/bin/sh\necho \"out $1\"\necho err >&2\nexit 3\n";
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(script).unwrap();
        let compressed: &'static [u8] = Box::leak(encoder.finish().unwrap().into_boxed_slice());

        let temp = TempDir::new().unwrap();
        let binary = BinaryPath::with_embedded(compressed, 0, temp.path().join("bin"));
        let executor = CliExecutor::new(binary, false);

        let output = executor
            .run(temp.path(), &["plan".to_string()], &[])
            .unwrap();

        assert_eq!(output.code, Some(3));
        assert_eq!(output.stdout, "out plan\n");
        assert!(output.combined.contains("out plan"));
        assert!(output.combined.contains("err"));
    }
}
