//! The capability context: everything a running program may touch.
//!
//! Each spawn gets a fresh context closed over its own process, so every
//! filesystem path a program passes in is resolved against that process's
//! working directory before it reaches the [`Vfs`]. Output happens by
//! emitting [`ProcessEvent`]s; the kernel forwards them to the pipeline
//! driver in emit order.

use std::cell::Ref;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::colors::{self, Color};
use crate::kernel::{resolve_path, Kernel, Process, ProcessEvent, Program};
use crate::terminal::BoundTerminal;
use crate::vfs::{NodeId, PathError, Vfs};

#[derive(Clone)]
pub struct Context {
    kernel: Rc<Kernel>,
    process: Rc<Process>,
    events: async_channel::Sender<ProcessEvent>,
    stdout_to_console: bool,
    variables: HashMap<String, String>,
}

impl Context {
    pub(crate) fn new(
        kernel: Rc<Kernel>,
        process: Rc<Process>,
        events: async_channel::Sender<ProcessEvent>,
        stdout_to_console: bool,
        variables: HashMap<String, String>,
    ) -> Self {
        Self {
            kernel,
            process,
            events,
            stdout_to_console,
            variables,
        }
    }

    pub fn process_id(&self) -> u32 {
        self.process.id
    }

    /// Whether this stage's stdout ends up on the console (no redirect,
    /// last pipeline stage). Programs use it to decide on decoration,
    /// like grep's match coloring.
    pub fn stdout_to_console(&self) -> bool {
        self.stdout_to_console
    }

    /// Per-process snapshot of the environment, `PWD` included.
    pub fn variables(&self) -> &HashMap<String, String> {
        &self.variables
    }

    /// Resolve `path` against this process's working directory.
    pub fn get_path_to(&self, path: &str) -> String {
        resolve_path(&self.process.working_directory.borrow(), path)
    }

    /// Read access to the whole tree. Do not hold the borrow across a
    /// mutating context call.
    pub fn vfs(&self) -> Ref<'_, Vfs> {
        self.kernel.vfs().borrow()
    }

    pub fn open(&self, path: &str) -> Result<Option<NodeId>, PathError> {
        self.kernel.vfs().borrow().find(&self.get_path_to(path))
    }

    pub fn remove(&self, path: &str) -> Result<(), PathError> {
        self.kernel
            .vfs()
            .borrow_mut()
            .remove(&self.get_path_to(path))
    }

    pub fn create_file(&self, path: &str, content: &str) -> Result<NodeId, PathError> {
        self.kernel
            .vfs()
            .borrow_mut()
            .make_file(&self.get_path_to(path), content)
    }

    pub fn create_directory(&self, path: &str) -> Result<Option<NodeId>, PathError> {
        self.kernel
            .vfs()
            .borrow_mut()
            .make_directory(&self.get_path_to(path))
    }

    /// Install an executable node bound to `program`.
    pub fn install_program(&self, path: &str, program: Program) -> Result<NodeId, PathError> {
        self.kernel
            .vfs()
            .borrow_mut()
            .make_sys_file(&self.get_path_to(path), program)
    }

    /// Content of the file at `path`; a missing or non-file node is a
    /// [`PathError`].
    pub fn read_file(&self, path: &str) -> Result<String, PathError> {
        let resolved = self.get_path_to(path);
        let vfs = self.kernel.vfs().borrow();
        match vfs.find(&resolved)? {
            Some(id) => vfs
                .read_file(id)
                .map(str::to_string)
                .ok_or(PathError::IsAFile(resolved)),
            None => Err(PathError::NotExists(resolved)),
        }
    }

    /// Replace a file's content in place.
    pub fn update_file(&self, id: NodeId, content: impl Into<String>) {
        self.kernel.vfs().borrow_mut().write_file(id, content);
    }

    /// Resolve the target, verify it exists and is directory-like, then
    /// commit it as the working directory. Anything else is a silent
    /// no-op.
    pub fn change_working_directory(&self, path: &str) {
        let resolved = self.get_path_to(path);
        let is_directory = matches!(
            self.kernel.vfs().borrow().find(&resolved),
            Ok(Some(id)) if self.kernel.vfs().borrow().node(id).is_directory_like()
        );
        if is_directory {
            *self.process.working_directory.borrow_mut() = resolved;
        } else {
            debug!(path = resolved, "cd target is not a directory");
        }
    }

    /// Emit a stdout chunk exactly as given.
    pub fn write_stdout(&self, data: impl Into<String>) {
        let _ = self.events.try_send(ProcessEvent::Stdout(data.into()));
    }

    /// Emit a stderr chunk exactly as given.
    pub fn write_stderr(&self, data: impl Into<String>) {
        let _ = self.events.try_send(ProcessEvent::Stderr(data.into()));
    }

    /// Emit a stdout line, appending the newline if `data` lacks one.
    pub fn out(&self, data: &str) {
        self.write_stdout(with_newline(data));
    }

    /// Emit a stderr line, appending the newline if `data` lacks one.
    pub fn err(&self, data: &str) {
        self.write_stderr(with_newline(data));
    }

    /// Wrap `text` in the escape sequence for `color`.
    pub fn color(&self, color: Color, text: &str) -> String {
        colors::paint(color, text)
    }

    /// Take the terminal over exclusively, if no other process holds it.
    pub fn try_bind_terminal(&self) -> Option<BoundTerminal> {
        self.kernel.try_bind_terminal()
    }
}

fn with_newline(data: &str) -> String {
    if data.ends_with('\n') {
        data.to_string()
    } else {
        format!("{data}\n")
    }
}
