//! Supervisor Process
//!
//! Runs the process-parallel strategy: spawns worker processes, hands them
//! work items over IPC and collects their outputs.
//!
//! Each worker is the gilbench binary itself started with the hidden worker
//! flag. It talks to us over a dedicated pipe pair on fds 3/4 and owns its
//! own interpreter lock, which is the whole point of this strategy.

use gilbench_core::{
    ExecutionResult, ItemFailure, RunError, ShardOutcome, Strategy, Timer, WorkQueue, assemble,
    check_worker_count,
};
use gilbench_ipc::{
    FailureKind, FrameError, FrameReader, FrameWriter, GilSettings, IPC_FD_ENV, PROTOCOL_VERSION,
    Payload, SupervisorCommand, WORKER_FLAG, WorkerCapabilities, WorkerMessage,
};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use std::os::unix::io::{FromRawFd, RawFd};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;

/// How long a freshly spawned worker gets to say `Hello`
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on a single poll, so a dead worker is noticed promptly
const POLL_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(#[from] std::io::Error),

    #[error("IPC error: {0}")]
    IpcError(String),

    #[error("Worker crashed: {0}")]
    WorkerCrashed(String),

    #[error("Timeout waiting for worker")]
    Timeout,

    #[error("Work unit not available in worker: {0}")]
    UnknownUnit(String),

    #[error("Worker protocol error: expected {expected}, got {got}")]
    ProtocolError { expected: String, got: String },
}

impl From<FrameError> for SupervisorError {
    fn from(e: FrameError) -> Self {
        SupervisorError::IpcError(e.to_string())
    }
}

/// What a worker reported for one work item
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    /// The unit returned a value
    Output(Payload),
    /// The unit raised or panicked
    Failed { kind: FailureKind, message: String },
}

/// Result of polling for data
#[derive(Debug)]
enum PollResult {
    DataAvailable,
    Timeout,
    PipeClosed,
    Error(std::io::Error),
}

/// Wait for data to be available on a file descriptor with timeout
fn wait_for_data(fd: RawFd, timeout_ms: i32) -> PollResult {
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };

    let result = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };

    if result < 0 {
        PollResult::Error(std::io::Error::last_os_error())
    } else if result == 0 {
        PollResult::Timeout
    } else if pollfd.revents & libc::POLLIN != 0 {
        // Even if the pipe is closing there may be a final message to read
        PollResult::DataAvailable
    } else if pollfd.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
        PollResult::PipeClosed
    } else {
        PollResult::Timeout
    }
}

/// Create a close-on-exec pipe pair, returning (read_fd, write_fd).
///
/// Workers are spawned concurrently from several pool threads, so the flag
/// must be set atomically or one child could inherit another child's pipe
/// and keep it open.
#[cfg(target_os = "linux")]
fn create_pipe() -> Result<(RawFd, RawFd), std::io::Error> {
    let mut fds = [0 as RawFd; 2];
    let ret = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) };
    if ret != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok((fds[0], fds[1]))
}

#[cfg(not(target_os = "linux"))]
fn create_pipe() -> Result<(RawFd, RawFd), std::io::Error> {
    let mut fds = [0 as RawFd; 2];
    let ret = unsafe { libc::pipe(fds.as_mut_ptr()) };
    if ret != 0 {
        return Err(std::io::Error::last_os_error());
    }
    for &fd in &fds {
        unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFD);
            libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC);
        }
    }
    Ok((fds[0], fds[1]))
}

/// Close a raw file descriptor.
fn close_fd(fd: RawFd) {
    unsafe {
        libc::close(fd);
    }
}

/// Send SIGTERM to a process. Returns `Err` if the signal could not be delivered.
fn send_sigterm(pid: u32) -> Result<(), std::io::Error> {
    let ret = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if ret == -1 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Clear close-on-exec on a descriptor that must survive into the worker.
///
/// Only async-signal-safe calls: this runs between fork and exec.
unsafe fn keep_on_exec(fd: RawFd) -> std::io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags < 0 || unsafe { libc::fcntl(fd, libc::F_SETFD, flags & !libc::FD_CLOEXEC) } < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

/// Move `fd` onto `target` in the child. `dup2` onto a different number
/// yields a descriptor without close-on-exec.
unsafe fn install_fd(fd: RawFd, target: RawFd) -> std::io::Result<()> {
    if fd == target {
        return unsafe { keep_on_exec(fd) };
    }
    if unsafe { libc::dup2(fd, target) } < 0 {
        return Err(std::io::Error::last_os_error());
    }
    unsafe { libc::close(fd) };
    Ok(())
}

/// Worker process handle
pub struct WorkerHandle {
    child: Child,
    reader: FrameReader<std::fs::File>,
    writer: FrameWriter<std::fs::File>,
    capabilities: Option<WorkerCapabilities>,
    item_timeout: Option<Duration>,
    msg_read_fd: RawFd,
}

impl WorkerHandle {
    /// Spawn `binary` as a worker using fd 3/4 for IPC, and wait for its `Hello`.
    ///
    /// `item_timeout` bounds every `execute` call; `None` waits forever.
    pub fn spawn(binary: &Path, item_timeout: Option<Duration>) -> Result<Self, SupervisorError> {
        // cmd_pipe: supervisor writes commands → worker reads from fd 3
        let (cmd_read, cmd_write) = create_pipe()?;
        // msg_pipe: worker writes messages from fd 4 → supervisor reads
        let (msg_read, msg_write) = match create_pipe() {
            Ok(fds) => fds,
            Err(e) => {
                close_fd(cmd_read);
                close_fd(cmd_write);
                return Err(SupervisorError::SpawnFailed(e));
            }
        };

        let mut command = Command::new(binary);
        command
            .arg(WORKER_FLAG)
            .env(IPC_FD_ENV, "3,4")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());

        unsafe {
            command.pre_exec(move || {
                // Parent-side ends first, so they can't be mistaken for 3/4 below
                libc::close(cmd_write);
                libc::close(msg_read);

                // Keep msg_write out of the way of fd 3
                let mut msg_fd = msg_write;
                if msg_fd == 3 {
                    msg_fd = libc::fcntl(msg_fd, libc::F_DUPFD_CLOEXEC, 5);
                    if msg_fd < 0 {
                        return Err(std::io::Error::last_os_error());
                    }
                }

                install_fd(cmd_read, 3)?;
                install_fd(msg_fd, 4)?;
                Ok(())
            });
        }

        let child = match command.spawn() {
            Ok(c) => c,
            Err(e) => {
                close_fd(cmd_read);
                close_fd(cmd_write);
                close_fd(msg_read);
                close_fd(msg_write);
                return Err(SupervisorError::SpawnFailed(e));
            }
        };

        // Close the child-side ends in the parent
        close_fd(cmd_read);
        close_fd(msg_write);

        let writer_file = unsafe { std::fs::File::from_raw_fd(cmd_write) };
        let reader_file = unsafe { std::fs::File::from_raw_fd(msg_read) };

        let mut handle = Self {
            child,
            reader: FrameReader::new(reader_file),
            writer: FrameWriter::new(writer_file),
            capabilities: None,
            item_timeout,
            msg_read_fd: msg_read,
        };
        tracing::debug!(pid = handle.pid(), binary = %binary.display(), "spawned worker");

        handle.wait_for_hello()?;
        Ok(handle)
    }

    /// Wait for Hello message from worker and validate protocol version
    fn wait_for_hello(&mut self) -> Result<(), SupervisorError> {
        match self.recv(Some(HANDSHAKE_TIMEOUT))? {
            WorkerMessage::Hello(caps) => {
                if caps.protocol_version != PROTOCOL_VERSION {
                    return Err(SupervisorError::ProtocolError {
                        expected: format!("protocol version {}", PROTOCOL_VERSION),
                        got: format!("protocol version {}", caps.protocol_version),
                    });
                }
                self.capabilities = Some(caps);
                Ok(())
            }
            other => Err(SupervisorError::ProtocolError {
                expected: "Hello".to_string(),
                got: format!("{:?}", other),
            }),
        }
    }

    /// Get worker capabilities
    pub fn capabilities(&self) -> Option<&WorkerCapabilities> {
        self.capabilities.as_ref()
    }

    /// OS process id of the worker
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Ask the worker to build `unit` with its own interpreter lock.
    pub fn load(&mut self, unit: &str, gil: GilSettings) -> Result<(), SupervisorError> {
        self.writer.write(&SupervisorCommand::Load {
            unit: unit.to_string(),
            gil,
        })?;

        match self.recv(Some(HANDSHAKE_TIMEOUT))? {
            WorkerMessage::Loaded { unit: loaded } if loaded == unit => Ok(()),
            WorkerMessage::Failure {
                kind: FailureKind::UnknownUnit,
                ..
            } => Err(SupervisorError::UnknownUnit(unit.to_string())),
            other => Err(SupervisorError::ProtocolError {
                expected: format!("Loaded {{ unit: {:?} }}", unit),
                got: format!("{:?}", other),
            }),
        }
    }

    /// Run the loaded unit on one argument.
    ///
    /// A timeout or a dead worker is an `Err`; a unit that raised is an
    /// `Ok(ItemOutcome::Failed)` and the worker stays usable.
    pub fn execute(&mut self, index: u64, argument: &Payload) -> Result<ItemOutcome, SupervisorError> {
        self.writer.write(&SupervisorCommand::Execute {
            index,
            argument: argument.clone(),
        })?;

        let msg = match self.recv(self.item_timeout) {
            Ok(msg) => msg,
            Err(SupervisorError::Timeout) => {
                tracing::warn!(pid = self.pid(), index, "work item timed out, killing worker");
                self.terminate();
                return Err(SupervisorError::Timeout);
            }
            Err(e) => return Err(e),
        };

        match msg {
            WorkerMessage::Output { index: got, value } if got == index => {
                Ok(ItemOutcome::Output(value))
            }
            WorkerMessage::Failure {
                index: Some(got),
                kind,
                message,
            } if got == index => Ok(ItemOutcome::Failed { kind, message }),
            other => Err(SupervisorError::ProtocolError {
                expected: format!("Output/Failure for item {}", index),
                got: format!("{:?}", other),
            }),
        }
    }

    /// Receive the next message, polling so that timeouts and crashes are noticed.
    ///
    /// The timeout and crash checks cover the wait for the start of a frame.
    /// Once the first bytes are in, the rest of the frame is read without a
    /// deadline, so a worker that stalls mid-frame blocks this call.
    fn recv(&mut self, timeout: Option<Duration>) -> Result<WorkerMessage, SupervisorError> {
        let start = Instant::now();

        // Buffered bytes are invisible to poll
        while !self.reader.has_buffered_data() {
            let slice = match timeout {
                Some(timeout) => {
                    let remaining = timeout.saturating_sub(start.elapsed());
                    if remaining.is_zero() {
                        return Err(SupervisorError::Timeout);
                    }
                    remaining.min(POLL_SLICE)
                }
                None => POLL_SLICE,
            };

            match wait_for_data(self.msg_read_fd, slice.as_millis() as i32) {
                PollResult::DataAvailable => break,
                PollResult::Timeout => {
                    if !self.is_alive() {
                        return Err(SupervisorError::WorkerCrashed(
                            "Worker process exited unexpectedly".to_string(),
                        ));
                    }
                }
                PollResult::PipeClosed => {
                    return Err(SupervisorError::WorkerCrashed(
                        "Worker pipe closed unexpectedly".to_string(),
                    ));
                }
                PollResult::Error(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                PollResult::Error(e) => {
                    return Err(SupervisorError::WorkerCrashed(format!("Pipe error: {}", e)));
                }
            }
        }

        match self.reader.read::<WorkerMessage>() {
            Ok(msg) => Ok(msg),
            Err(FrameError::EndOfStream) => Err(SupervisorError::WorkerCrashed(
                "Worker closed connection unexpectedly".to_string(),
            )),
            Err(e) => {
                if !self.is_alive() {
                    return Err(SupervisorError::WorkerCrashed(format!(
                        "Worker crashed during read: {}",
                        e
                    )));
                }
                Err(e.into())
            }
        }
    }

    /// Shutdown the worker gracefully
    pub fn shutdown(mut self) -> Result<(), SupervisorError> {
        self.writer.write(&SupervisorCommand::Shutdown)?;
        let _ = self.child.wait();
        tracing::debug!(pid = self.pid(), "worker shut down");
        Ok(())
    }

    /// Check if worker process is still running
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// SIGTERM, brief grace period, then SIGKILL; always reaps the child.
    fn terminate(&mut self) {
        if self.is_alive() {
            let _ = send_sigterm(self.child.id());
            std::thread::sleep(Duration::from_millis(50));
            if self.is_alive() {
                tracing::warn!(pid = self.pid(), "worker ignored SIGTERM, killing");
                let _ = self.child.kill();
            }
        }
        let _ = self.child.wait();
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Process-parallel strategy runner.
///
/// Every call builds its own pool of worker processes and tears all of them
/// down before returning, on success and on failure alike.
#[derive(Debug, Clone)]
pub struct ProcessPool {
    binary: PathBuf,
    gil: GilSettings,
    item_timeout: Option<Duration>,
}

impl ProcessPool {
    /// Pool whose workers are `binary`, each with its own lock built from `gil`
    pub fn new(binary: PathBuf, gil: GilSettings, item_timeout: Option<Duration>) -> Self {
        Self {
            binary,
            gil,
            item_timeout,
        }
    }

    /// Worker binary path
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Run the registered unit `unit` over `batch` on up to `worker_count` processes.
    ///
    /// Arguments are expected to be validated already. The timing covers
    /// process creation, handshakes, execution and teardown.
    pub fn run(
        &self,
        unit: &str,
        batch: &[Payload],
        worker_count: usize,
    ) -> Result<ExecutionResult, RunError> {
        check_worker_count(worker_count, batch.len())?;
        if batch.is_empty() {
            return Ok(ExecutionResult::empty());
        }

        let workers = worker_count.min(batch.len());
        let queue = WorkQueue::new(batch);
        let timer = Timer::start();

        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("gilbench-supervisor-{}", i))
            .build()
            .map_err(|e| infrastructure(format!("Failed to build worker pool: {}", e)))?;

        let outcomes: Vec<Result<ShardOutcome, SupervisorError>> = pool.install(|| {
            (0..workers)
                .into_par_iter()
                .map(|_| self.drive(unit, &queue))
                .collect()
        });

        let mut shards = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            shards.push(outcome.map_err(|e| infrastructure(e.to_string()))?);
        }

        let outputs = assemble(Strategy::ProcessParallel, batch.len(), shards)?;
        Ok(ExecutionResult::new(outputs, timer.stop()))
    }

    /// Own one worker process for the duration of the run, feeding it items
    /// from the shared queue until the queue is drained or aborted.
    fn drive(&self, unit: &str, queue: &WorkQueue<'_>) -> Result<ShardOutcome, SupervisorError> {
        let mut worker = match WorkerHandle::spawn(&self.binary, self.item_timeout)
            .and_then(|mut worker| worker.load(unit, self.gil).map(|()| worker))
        {
            Ok(worker) => worker,
            Err(e) => {
                queue.abort();
                return Err(e);
            }
        };

        let mut outcome = ShardOutcome::default();
        while let Some((index, argument)) = queue.claim() {
            let failure = match worker.execute(index as u64, argument) {
                Ok(ItemOutcome::Output(value)) => {
                    outcome.completed.push((index, value));
                    continue;
                }
                Ok(ItemOutcome::Failed { message, .. }) => message,
                Err(SupervisorError::Timeout) => match self.item_timeout {
                    Some(limit) => format!("work item timed out after {:?}", limit),
                    None => "work item timed out".to_string(),
                },
                Err(SupervisorError::WorkerCrashed(message)) => {
                    format!("worker process died: {}", message)
                }
                Err(e) => {
                    queue.abort();
                    return Err(e);
                }
            };

            queue.abort();
            outcome.failure = Some(ItemFailure {
                index,
                message: failure,
            });
            break;
        }

        let shutdown = if worker.is_alive() {
            worker.shutdown()
        } else {
            Ok(())
        };
        settle(outcome, shutdown)
    }
}

/// Combine a shard's outcome with the result of shutting its worker down.
///
/// A recorded item failure outranks a failed shutdown.
fn settle(
    outcome: ShardOutcome,
    shutdown: Result<(), SupervisorError>,
) -> Result<ShardOutcome, SupervisorError> {
    let Err(e) = shutdown else {
        return Ok(outcome);
    };
    match outcome.failure.as_ref().map(|failure| failure.index) {
        Some(index) => {
            tracing::warn!(index, error = %e, "worker shutdown failed after item failure");
            Ok(outcome)
        }
        None => Err(e),
    }
}

fn infrastructure(message: String) -> RunError {
    RunError::Infrastructure {
        strategy: Strategy::ProcessParallel,
        message,
    }
}
