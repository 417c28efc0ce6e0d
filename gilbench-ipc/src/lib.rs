#![warn(missing_docs)]
//! gilbench IPC Protocol
//!
//! Wire protocol between the process-parallel supervisor and its worker
//! processes. Messages are rkyv-serialized and carried in length-prefixed
//! frames over a pipe pair.
//!
//! A worker session looks like:
//!
//! ```text
//! worker      -> Hello(caps)
//! supervisor  -> Load { unit, gil }
//! worker      -> Loaded { unit }            | Failure { kind: UnknownUnit }
//! supervisor  -> Execute { index, argument }
//! worker      -> Output { index, value }    | Failure { index, .. }
//!   ... repeated ...
//! supervisor  -> Shutdown
//! ```

mod framing;
mod messages;

pub use framing::{FrameError, FrameReader, FrameWriter, MAX_FRAME_SIZE, read_frame, write_frame};
pub use messages::{
    FailureKind, GilSettings, Payload, SupervisorCommand, WorkerCapabilities, WorkerMessage,
};

/// Protocol version for compatibility checking
pub const PROTOCOL_VERSION: u32 = 1;

/// Environment variable carrying the worker's `<read_fd>,<write_fd>` pair
pub const IPC_FD_ENV: &str = "GILBENCH_IPC_FD";

/// Hidden CLI flag that turns the binary into a worker process
pub const WORKER_FLAG: &str = "--gil-worker";
