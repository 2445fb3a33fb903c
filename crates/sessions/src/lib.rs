//! Workspace-scoped session manager.
//!
//! A session is a long-lived child process whose state lives inside the
//! workspace at `.sessions/<sess_id>/{metadata.json, input.log,
//! output.log}`. Each session is supervised by a detached *holder*
//! process (`delta-sessions hold`, spawned by `start`) that pumps
//! `input.log` to the child's stdin and the child's output to
//! `output.log`; the metadata records both the child `pid` and the
//! `holder_pid`.
//!
//! The engine invokes the same operations for its termination cleanup
//! contract: on any run ending other than WAITING_FOR_INPUT, every
//! session in the workspace is ended (SIGTERM, then SIGKILL after a
//! bounded grace period).

pub mod holder;
pub mod manager;

pub use holder::run_holder;
pub use manager::{pid_alive, SessionManager, DEFAULT_GRACE};
