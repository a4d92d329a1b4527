//! nutshell - an in-process emulation of a Unix-like shell
//!
//! Pipelines of cooperative async programs over an in-memory virtual
//! filesystem: a line parser, a process kernel driving suspendable
//! programs through events, streams between stages, and a pluggable
//! program contract. No OS processes, no threads, no real file
//! descriptors; the host supplies a terminal and drives the whole
//! thing from a single-threaded executor.
//!
//! ```no_run
//! use nutshell::{image, CaptureTerminal, Kernel, Shell};
//!
//! let terminal = CaptureTerminal::new();
//! let kernel = Kernel::new(image::default_image()?, terminal.clone());
//! let mut shell = Shell::new(kernel);
//! futures_lite::future::block_on(shell.execute("echo hi | grep hi"));
//! # Ok::<(), nutshell::PathError>(())
//! ```

pub mod colors;
pub mod context;
pub mod executor;
pub mod flags;
pub mod image;
pub mod kernel;
pub mod parser;
pub mod programs;
pub mod stream;
pub mod terminal;
pub mod vfs;

pub use colors::Color;
pub use context::Context;
pub use executor::{ExecError, Shell};
pub use kernel::{resolve_path, Kernel, ProcessEvent, Program, ProgramResult};
pub use parser::{parse_line, ParseError, ParsedCommand, Redirect, RedirectKind};
pub use stream::Stream;
pub use terminal::{BoundTerminal, CaptureTerminal, Terminal};
pub use vfs::{NodeId, NodeKind, PathError, Vfs};
