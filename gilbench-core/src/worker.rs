//! Worker Process Entry Point
//!
//! Handles the worker side of the process-parallel strategy. A worker is the
//! gilbench binary started with the hidden worker flag: it builds one unit by
//! name, owns its own interpreter lock, and executes work items until told
//! to shut down.
//!
//! On Unix, uses fd 3/4 for IPC (set via `GILBENCH_IPC_FD`) and installs a
//! SIGTERM handler for graceful shutdown. On non-Unix, falls back to
//! stdin/stdout and skips signal handling.

use crate::gil::Interpreter;
use crate::unit::{WorkUnit, find_unit, invoke_caught};
use gilbench_ipc::{
    FailureKind, FrameError, FrameReader, FrameWriter, IPC_FD_ENV, Payload, SupervisorCommand,
    WorkerCapabilities, WorkerMessage,
};
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(unix)]
use std::os::unix::io::FromRawFd;

/// Global flag set by SIGTERM handler to request graceful shutdown.
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Check if a graceful shutdown has been requested via SIGTERM.
pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::Relaxed)
}

/// Install a SIGTERM handler that sets the `SHUTDOWN_REQUESTED` flag.
/// The handler is async-signal-safe (only sets an atomic).
#[cfg(unix)]
fn install_sigterm_handler() {
    unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = sigterm_handler as *const () as usize;
        sa.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&mut sa.sa_mask);
        libc::sigaction(libc::SIGTERM, &sa, std::ptr::null_mut());
    }
}

#[cfg(unix)]
extern "C" fn sigterm_handler(_sig: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::Relaxed);
}

#[cfg(not(unix))]
fn install_sigterm_handler() {}

/// IPC transport: either inherited fd pair or stdin/stdout fallback.
enum IpcTransport {
    #[cfg(unix)]
    Fds { read_fd: i32, write_fd: i32 },
    Stdio,
}

fn parse_fd_pair(value: &str) -> Option<(i32, i32)> {
    let (r, w) = value.split_once(',')?;
    Some((r.trim().parse().ok()?, w.trim().parse().ok()?))
}

fn detect_transport() -> IpcTransport {
    #[cfg(unix)]
    if let Ok(val) = std::env::var(IPC_FD_ENV) {
        if let Some((read_fd, write_fd)) = parse_fd_pair(&val) {
            return IpcTransport::Fds { read_fd, write_fd };
        }
        tracing::warn!(
            "invalid {}={:?} (expected <read_fd>,<write_fd>), falling back to stdio",
            IPC_FD_ENV,
            val
        );
    }
    IpcTransport::Stdio
}

struct LoadedUnit {
    unit: Box<dyn WorkUnit>,
    interpreter: Interpreter,
}

/// Worker main loop
pub struct WorkerMain {
    reader: FrameReader<Box<dyn std::io::Read>>,
    writer: FrameWriter<Box<dyn std::io::Write>>,
    loaded: Option<LoadedUnit>,
}

impl WorkerMain {
    /// Create a new worker, using fd 3/4 if `GILBENCH_IPC_FD` is set, otherwise stdin/stdout.
    pub fn new() -> Self {
        match detect_transport() {
            #[cfg(unix)]
            IpcTransport::Fds { read_fd, write_fd } => {
                // The supervisor dup2'd these descriptors in before exec; we own them
                let read_file = unsafe { std::fs::File::from_raw_fd(read_fd) };
                let write_file = unsafe { std::fs::File::from_raw_fd(write_fd) };
                Self::with_transport(Box::new(read_file), Box::new(write_file))
            }
            IpcTransport::Stdio => {
                Self::with_transport(Box::new(std::io::stdin()), Box::new(std::io::stdout()))
            }
        }
    }

    /// Create a worker over an arbitrary reader/writer pair
    pub fn with_transport(reader: Box<dyn std::io::Read>, writer: Box<dyn std::io::Write>) -> Self {
        Self {
            reader: FrameReader::new(reader),
            writer: FrameWriter::new(writer),
            loaded: None,
        }
    }

    /// Run the worker main loop until `Shutdown`, SIGTERM or the supervisor hangs up.
    pub fn run(&mut self) -> Result<(), FrameError> {
        install_sigterm_handler();

        self.writer
            .write(&WorkerMessage::Hello(WorkerCapabilities::default()))?;

        loop {
            if shutdown_requested() {
                break;
            }

            let command: SupervisorCommand = match self.reader.read() {
                Ok(command) => command,
                // Supervisor went away; nothing left to report to
                Err(FrameError::EndOfStream) => break,
                Err(e) => return Err(e),
            };

            match command {
                SupervisorCommand::Load { unit, gil } => self.load(&unit, gil)?,
                SupervisorCommand::Execute { index, argument } => {
                    self.execute(index, &argument)?;
                }
                SupervisorCommand::Shutdown => break,
            }
        }

        Ok(())
    }

    fn load(&mut self, name: &str, gil: gilbench_ipc::GilSettings) -> Result<(), FrameError> {
        let Some(def) = find_unit(name) else {
            self.loaded = None;
            return self.writer.write(&WorkerMessage::Failure {
                index: None,
                kind: FailureKind::UnknownUnit,
                message: format!("work unit not registered in worker binary: {}", name),
            });
        };

        tracing::debug!(unit = name, gil = gil.enabled, "worker loaded unit");
        self.loaded = Some(LoadedUnit {
            unit: (def.build)(),
            interpreter: Interpreter::new(gil),
        });
        self.writer.write(&WorkerMessage::Loaded {
            unit: name.to_string(),
        })
    }

    fn execute(&mut self, index: u64, argument: &Payload) -> Result<(), FrameError> {
        let Some(loaded) = &self.loaded else {
            return self.writer.write(&WorkerMessage::Failure {
                index: Some(index),
                kind: FailureKind::UnknownUnit,
                message: "no work unit loaded".to_string(),
            });
        };

        let mut gil = loaded.interpreter.acquire();
        let message = match invoke_caught(loaded.unit.as_ref(), argument, &mut gil) {
            Ok(value) => WorkerMessage::Output { index, value },
            Err(failure) => WorkerMessage::Failure {
                index: Some(index),
                kind: failure.kind,
                message: failure.message,
            },
        };
        drop(gil);
        self.writer.write(&message)
    }
}

impl Default for WorkerMain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gilbench_ipc::GilSettings;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    /// Writer that keeps its bytes reachable after the worker is done
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn script(commands: &[SupervisorCommand]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut writer = FrameWriter::new(&mut buf);
            for command in commands {
                writer.write(command).unwrap();
            }
        }
        buf
    }

    fn replies(bytes: Vec<u8>) -> Vec<WorkerMessage> {
        let mut reader = FrameReader::new(Cursor::new(bytes));
        let mut out = Vec::new();
        loop {
            match reader.read::<WorkerMessage>() {
                Ok(msg) => out.push(msg),
                Err(FrameError::EndOfStream) => break,
                Err(e) => panic!("unexpected frame error: {e}"),
            }
        }
        out
    }

    fn run_script(commands: &[SupervisorCommand]) -> Vec<WorkerMessage> {
        let output = SharedBuf::default();
        let mut worker = WorkerMain::with_transport(
            Box::new(Cursor::new(script(commands))),
            Box::new(output.clone()),
        );
        worker.run().unwrap();
        let bytes = output.0.lock().unwrap().clone();
        replies(bytes)
    }

    #[test]
    fn test_parse_fd_pair() {
        assert_eq!(parse_fd_pair("3,4"), Some((3, 4)));
        assert_eq!(parse_fd_pair(" 3 , 4 "), Some((3, 4)));
        assert_eq!(parse_fd_pair("3"), None);
        assert_eq!(parse_fd_pair("a,4"), None);
    }

    #[test]
    fn test_worker_session() {
        let messages = run_script(&[
            SupervisorCommand::Load {
                unit: "prime-sum".to_string(),
                gil: GilSettings::default(),
            },
            SupervisorCommand::Execute {
                index: 3,
                argument: Payload::Integer(10),
            },
            SupervisorCommand::Shutdown,
        ]);

        assert_eq!(messages.len(), 3);
        assert!(matches!(messages[0], WorkerMessage::Hello(_)));
        assert!(matches!(&messages[1], WorkerMessage::Loaded { unit } if unit == "prime-sum"));
        match &messages[2] {
            WorkerMessage::Output { index, value } => {
                assert_eq!(*index, 3);
                assert_eq!(*value, Payload::Integer(17));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_worker_reports_item_failure_and_keeps_going() {
        let messages = run_script(&[
            SupervisorCommand::Load {
                unit: "probe".to_string(),
                gil: GilSettings::disabled(),
            },
            SupervisorCommand::Execute {
                index: 0,
                argument: Payload::Integer(-1),
            },
            SupervisorCommand::Execute {
                index: 1,
                argument: Payload::Integer(5),
            },
        ]);

        assert!(matches!(
            &messages[2],
            WorkerMessage::Failure {
                index: Some(0),
                kind: FailureKind::Raised,
                ..
            }
        ));
        assert!(matches!(
            &messages[3],
            WorkerMessage::Output {
                index: 1,
                value: Payload::Integer(5)
            }
        ));
    }

    #[test]
    fn test_worker_rejects_unknown_unit() {
        let messages = run_script(&[
            SupervisorCommand::Load {
                unit: "guarded-increment".to_string(),
                gil: GilSettings::default(),
            },
            SupervisorCommand::Execute {
                index: 0,
                argument: Payload::Integer(1),
            },
        ]);

        assert!(matches!(
            &messages[1],
            WorkerMessage::Failure {
                index: None,
                kind: FailureKind::UnknownUnit,
                ..
            }
        ));
        assert!(matches!(
            &messages[2],
            WorkerMessage::Failure {
                index: Some(0),
                kind: FailureKind::UnknownUnit,
                ..
            }
        ));
    }
}
