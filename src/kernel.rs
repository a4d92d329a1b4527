//! Process table and the scheduler core.
//!
//! A [`Program`] is the unit of cooperative work: it consumes a stdin
//! [`Stream`], an argv and a [`Context`], emits [`ProcessEvent`]s through
//! the context, and resolves to an exit code. [`Kernel::run`] registers a
//! process, drives its program to completion on the current (single)
//! logical thread and forwards every event to the caller as it arrives.
//!
//! There is no cancellation: once started, a process runs to completion
//! or error.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use futures_lite::future::{self, BoxedLocal};
use tracing::debug;

use crate::context::Context;
use crate::stream::Stream;
use crate::terminal::{BoundTerminal, Terminal, TerminalSlot};
use crate::vfs::{PathError, Vfs};

/// What a program's future resolves to: an exit code, or a filesystem
/// error it let escape. The kernel converts an escaped error into one
/// stderr line and exit code 1.
pub type ProgramResult = Result<i32, PathError>;

pub type ProgramFuture = BoxedLocal<ProgramResult>;

/// The program contract: stdin stream, argv, capability context.
pub type Program = Rc<dyn Fn(Stream, Vec<String>, Context) -> ProgramFuture>;

/// One event produced by a running process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Stdout(String),
    Stderr(String),
    Exited(i32),
}

/// A registered process. The working directory is shared with the
/// spawner so directory changes made by the process outlive it.
#[derive(Debug)]
pub struct Process {
    pub id: u32,
    pub working_directory: Rc<RefCell<String>>,
}

pub struct Kernel {
    vfs: Rc<RefCell<Vfs>>,
    processes: RefCell<HashMap<u32, Rc<Process>>>,
    last_pid: Cell<u32>,
    terminal: TerminalSlot,
}

impl Kernel {
    pub fn new(vfs: Vfs, terminal: Rc<dyn Terminal>) -> Rc<Self> {
        Rc::new(Self {
            vfs: Rc::new(RefCell::new(vfs)),
            processes: RefCell::new(HashMap::new()),
            last_pid: Cell::new(0),
            terminal: TerminalSlot::new(terminal),
        })
    }

    pub fn vfs(&self) -> &Rc<RefCell<Vfs>> {
        &self.vfs
    }

    /// The console terminal, for output of stages without a redirect.
    pub fn terminal(&self) -> Rc<dyn Terminal> {
        self.terminal.terminal()
    }

    /// Exclusive terminal binding for a running program.
    pub fn try_bind_terminal(&self) -> Option<BoundTerminal> {
        self.terminal.try_bind()
    }

    /// End the current terminal session, if any. The pipeline driver
    /// calls this after every pipeline joins.
    pub fn close_terminal(&self) {
        self.terminal.close();
    }

    pub fn process_count(&self) -> usize {
        self.processes.borrow().len()
    }

    /// Run one program to completion as a registered process.
    ///
    /// Every event the program emits is forwarded to `on_event` in emit
    /// order; the final [`ProcessEvent::Exited`] is delivered after all
    /// output events. Returns the exit code.
    #[allow(clippy::too_many_arguments)]
    pub async fn run(
        self: &Rc<Self>,
        stdin: Stream,
        program: Program,
        args: Vec<String>,
        stdout_to_console: bool,
        working_directory: Rc<RefCell<String>>,
        variables: HashMap<String, String>,
        on_event: &mut dyn FnMut(ProcessEvent),
    ) -> i32 {
        let id = self.last_pid.get() + 1;
        self.last_pid.set(id);
        let process = Rc::new(Process {
            id,
            working_directory,
        });
        self.processes.borrow_mut().insert(id, Rc::clone(&process));
        debug!(pid = id, "spawn");

        let (events_tx, events_rx) = async_channel::unbounded();
        let mut variables = variables;
        variables.insert("PWD".to_string(), process.working_directory.borrow().clone());
        let ctx = Context::new(
            Rc::clone(self),
            Rc::clone(&process),
            events_tx.clone(),
            stdout_to_console,
            variables,
        );

        let running = program(stdin, args, ctx);
        let producer = async move {
            let code = match running.await {
                Ok(code) => code,
                Err(error) => {
                    let _ = events_tx.try_send(ProcessEvent::Stderr(format!("{error}\n")));
                    1
                }
            };
            let _ = events_tx.try_send(ProcessEvent::Exited(code));
            events_tx.close();
            code
        };
        let consumer = async {
            while let Ok(event) = events_rx.recv().await {
                on_event(event);
            }
        };
        let (code, ()) = future::zip(producer, consumer).await;

        self.processes.borrow_mut().remove(&id);
        debug!(pid = id, code, "exit");
        code
    }
}

/// Resolve `path` against `working_directory`.
///
/// Absolute paths start over at the root; `..` pops a segment (never past
/// the root), `.` and empty segments are dropped.
pub fn resolve_path(working_directory: &str, path: &str) -> String {
    let mut parts: Vec<&str> = if path.starts_with('/') || working_directory == "/" {
        vec![""]
    } else {
        working_directory.split('/').collect()
    };

    for segment in path.split('/') {
        match segment {
            ".." => {
                if parts.len() > 1 {
                    parts.pop();
                }
            }
            "" | "." => {}
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    if joined.is_empty() {
        "/".to_string()
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::CaptureTerminal;
    use futures_lite::future::block_on;

    #[test]
    fn test_resolve_path() {
        assert_eq!(resolve_path("/home/guest", ".."), "/home");
        assert_eq!(resolve_path("/home/guest", "../.."), "/");
        assert_eq!(resolve_path("/home/guest", "../../.."), "/");
        assert_eq!(resolve_path("/home/guest", "/x"), "/x");
        assert_eq!(resolve_path("/home/guest", "docs"), "/home/guest/docs");
        assert_eq!(resolve_path("/home/guest", "./docs/."), "/home/guest/docs");
        assert_eq!(resolve_path("/", "a//b"), "/a/b");
        assert_eq!(resolve_path("/", "."), "/");
    }

    fn test_kernel() -> Rc<Kernel> {
        Kernel::new(Vfs::new(), CaptureTerminal::new())
    }

    fn wd(path: &str) -> Rc<RefCell<String>> {
        Rc::new(RefCell::new(path.to_string()))
    }

    #[test]
    fn test_run_forwards_events_then_exit() {
        let kernel = test_kernel();
        let program: Program = Rc::new(|_stdin, _args, ctx: Context| {
            Box::pin(async move {
                ctx.write_stdout("one\n");
                ctx.write_stderr("two\n");
                Ok(7)
            })
        });

        let mut events = Vec::new();
        let code = block_on(kernel.run(
            Stream::closed(),
            program,
            vec![],
            true,
            wd("/"),
            HashMap::new(),
            &mut |event| events.push(event),
        ));

        assert_eq!(code, 7);
        assert_eq!(
            events,
            vec![
                ProcessEvent::Stdout("one\n".into()),
                ProcessEvent::Stderr("two\n".into()),
                ProcessEvent::Exited(7),
            ]
        );
        assert_eq!(kernel.process_count(), 0);
    }

    #[test]
    fn test_escaped_path_error_becomes_stderr_and_code_1() {
        let kernel = test_kernel();
        let program: Program = Rc::new(|_stdin, _args, ctx: Context| {
            Box::pin(async move {
                ctx.open("/no/such/path")?;
                Ok(0)
            })
        });

        let mut events = Vec::new();
        let code = block_on(kernel.run(
            Stream::closed(),
            program,
            vec![],
            true,
            wd("/"),
            HashMap::new(),
            &mut |event| events.push(event),
        ));

        assert_eq!(code, 1);
        assert_eq!(
            events,
            vec![
                ProcessEvent::Stderr("/no not exists\n".into()),
                ProcessEvent::Exited(1),
            ]
        );
    }

    #[test]
    fn test_pids_are_monotonic() {
        let kernel = test_kernel();
        let mut saw = Vec::new();
        for _ in 0..3 {
            let program: Program = Rc::new(|_stdin, _args, ctx: Context| {
                Box::pin(async move { Ok(ctx.process_id() as i32) })
            });
            saw.push(block_on(kernel.run(
                Stream::closed(),
                program,
                vec![],
                true,
                wd("/"),
                HashMap::new(),
                &mut |_| {},
            )));
        }
        assert_eq!(saw, vec![1, 2, 3]);
    }

    #[test]
    fn test_variables_snapshot_gets_pwd() {
        let kernel = test_kernel();
        let program: Program = Rc::new(|_stdin, _args, ctx: Context| {
            Box::pin(async move {
                ctx.write_stdout(ctx.variables()["PWD"].clone());
                Ok(0)
            })
        });
        let mut events = Vec::new();
        block_on(kernel.run(
            Stream::closed(),
            program,
            vec![],
            true,
            wd("/home/guest"),
            HashMap::new(),
            &mut |event| events.push(event),
        ));
        assert_eq!(events[0], ProcessEvent::Stdout("/home/guest".into()));
    }
}
