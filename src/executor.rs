//! The pipeline driver: one input line in, a joined pipeline out.
//!
//! [`Shell::run_line`] parses the line, resolves every command name
//! against `PATH` before anything starts (an unknown name aborts the
//! whole pipeline atomically), wires the stages together with streams
//! and redirect sinks, spawns them all concurrently through
//! [`Kernel::run`] and waits for every stage to finish. There is no
//! aggregate exit code; each stage's code travels in its own
//! [`ProcessEvent::Exited`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use futures_lite::future::{self, BoxedLocal};
use thiserror::Error;
use tracing::{debug, warn};

use crate::colors::{self, Color};
use crate::image::{ENV_PATH, HOME_PATH};
use crate::kernel::{resolve_path, Kernel, ProcessEvent, Program};
use crate::parser::{parse_line, ParseError, Redirect, RedirectKind};
use crate::stream::Stream;
use crate::terminal::Terminal;
use crate::vfs::{NodeId, PathError, Vfs};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("Command '{0}' not found")]
    CommandNotFound(String),
    #[error("{0} is not a file")]
    RedirectTarget(String),
}

/// One resolved pipeline stage, ready to spawn.
struct Stage {
    program: Program,
    args: Vec<String>,
    redirects: Vec<Redirect>,
}

/// Where a stage's stdout or stderr chunks go.
#[derive(Clone)]
enum Sink {
    Console {
        terminal: Rc<dyn Terminal>,
        /// Console stderr is tinted red unless the chunk already
        /// carries an escape sequence.
        tint: bool,
    },
    Pipe(Stream),
    File {
        vfs: Rc<RefCell<Vfs>>,
        id: NodeId,
    },
}

impl Sink {
    fn write(&self, data: &str) {
        match self {
            Sink::Console { terminal, tint } => {
                if *tint && !colors::has_escape(data) {
                    terminal.write(&colors::paint(Color::Red, data));
                } else {
                    terminal.write(data);
                }
            }
            Sink::Pipe(stream) => stream.write(data),
            Sink::File { vfs, id } => vfs.borrow_mut().append_file(*id, data),
        }
    }

    fn close(&self) {
        if let Sink::Pipe(stream) = self {
            stream.close();
        }
    }
}

/// The interactive engine: owns the environment snapshot and the
/// working directory, shares the kernel with every spawn.
pub struct Shell {
    kernel: Rc<Kernel>,
    variables: HashMap<String, String>,
    working_directory: Rc<RefCell<String>>,
}

impl Shell {
    /// A shell over `kernel`, with the environment loaded from the
    /// image's env file and the working directory at home.
    pub fn new(kernel: Rc<Kernel>) -> Self {
        let variables = read_env_file(&kernel.vfs().borrow());
        Self {
            kernel,
            variables,
            working_directory: Rc::new(RefCell::new(HOME_PATH.to_string())),
        }
    }

    pub fn kernel(&self) -> &Rc<Kernel> {
        &self.kernel
    }

    pub fn variables(&self) -> &HashMap<String, String> {
        &self.variables
    }

    pub fn working_directory(&self) -> String {
        self.working_directory.borrow().clone()
    }

    /// Run one input line, reporting any failure on the console the way
    /// the prompt does: command-not-found in plain text, everything else
    /// in red.
    pub async fn execute(&mut self, line: &str) {
        if let Err(error) = self.run_line(line).await {
            let terminal = self.kernel.terminal();
            match &error {
                ExecError::CommandNotFound(_) => terminal.write(&format!("{error}\n")),
                _ => terminal.write(&format!(
                    "{}\n",
                    colors::paint(Color::Red, &error.to_string())
                )),
            }
        }
    }

    /// Parse and run one input line. Command names are resolved before
    /// any stage spawns; an unknown name aborts the whole pipeline.
    pub async fn run_line(&mut self, line: &str) -> Result<(), ExecError> {
        let parsed = parse_line(line)?;
        if parsed.is_empty() {
            return Ok(());
        }

        let commands = self.path_commands()?;
        let mut stages = Vec::with_capacity(parsed.len());
        for mut command in parsed {
            let name = if command.args.is_empty() {
                String::new()
            } else {
                command.args.remove(0)
            };
            let program = commands
                .get(&name)
                .cloned()
                .ok_or(ExecError::CommandNotFound(name))?;
            stages.push(Stage {
                program,
                args: command.args,
                redirects: command.redirects,
            });
        }

        debug!(stages = stages.len(), "pipeline start");
        self.run_pipeline(stages).await;
        Ok(())
    }

    async fn run_pipeline(&self, stages: Vec<Stage>) {
        let count = stages.len();
        let streams: Vec<Stream> = (1..count).map(|_| Stream::new()).collect();
        let console = self.kernel.terminal();
        let mut running: Vec<BoxedLocal<()>> = Vec::with_capacity(count);

        for (i, stage) in stages.into_iter().enumerate() {
            let stdin = if i == 0 {
                Stream::closed()
            } else {
                streams[i - 1].clone()
            };
            let stdout_redirect = stage.redirects.iter().find(|r| r.fd == 1).cloned();
            let stderr_redirect = stage.redirects.iter().find(|r| r.fd == 2).cloned();

            let sinks = self.stage_sinks(
                &stdout_redirect,
                &stderr_redirect,
                i,
                count,
                &streams,
                &console,
            );
            let (stdout_sink, stderr_sink) = match sinks {
                Ok(sinks) => sinks,
                Err(error) => {
                    // Only this stage is aborted; its output pipe closes
                    // so downstream stages see end-of-input.
                    warn!(%error, stage = i, "stage aborted");
                    console.write(&format!(
                        "{}\n",
                        colors::paint(Color::Red, &error.to_string())
                    ));
                    if i + 1 < count {
                        streams[i].close();
                    }
                    continue;
                }
            };

            // A redirected stdout leaves the pipe to the next stage
            // unwritten; close it so downstream does not wait forever.
            if stdout_redirect.is_some() && i + 1 < count {
                streams[i].close();
            }

            let to_console = stdout_redirect.is_none() && i + 1 == count;
            let kernel = Rc::clone(&self.kernel);
            let variables = self.variables.clone();
            let working_directory = Rc::clone(&self.working_directory);
            let Stage { program, args, .. } = stage;
            running.push(Box::pin(async move {
                kernel
                    .run(
                        stdin,
                        program,
                        args,
                        to_console,
                        working_directory,
                        variables,
                        &mut |event| match event {
                            ProcessEvent::Stdout(data) => stdout_sink.write(&data),
                            ProcessEvent::Stderr(data) => stderr_sink.write(&data),
                            ProcessEvent::Exited(_) => {
                                stdout_sink.close();
                                stderr_sink.close();
                            }
                        },
                    )
                    .await;
            }));
        }

        // Join-all: fold the stage futures into one.
        let mut join: BoxedLocal<()> = Box::pin(async {});
        for stage_future in running {
            join = Box::pin(async move {
                future::zip(join, stage_future).await;
            });
        }
        join.await;

        // A program may have left the terminal bound; the session ends
        // with the pipeline.
        self.kernel.close_terminal();
    }

    fn stage_sinks(
        &self,
        stdout_redirect: &Option<Redirect>,
        stderr_redirect: &Option<Redirect>,
        index: usize,
        count: usize,
        streams: &[Stream],
        console: &Rc<dyn Terminal>,
    ) -> Result<(Sink, Sink), ExecError> {
        let stdout_sink = match stdout_redirect {
            Some(redirect) => {
                self.open_write_sink(&redirect.target, redirect.kind == RedirectKind::Append)?
            }
            None if index + 1 < count => Sink::Pipe(streams[index].clone()),
            None => Sink::Console {
                terminal: Rc::clone(console),
                tint: false,
            },
        };
        let stderr_sink = match stderr_redirect {
            Some(redirect) if redirect.kind == RedirectKind::DupOut && redirect.target == "1" => {
                stdout_sink.clone()
            }
            Some(redirect) => {
                self.open_write_sink(&redirect.target, redirect.kind == RedirectKind::Append)?
            }
            None => Sink::Console {
                terminal: Rc::clone(console),
                tint: true,
            },
        };
        Ok((stdout_sink, stderr_sink))
    }

    /// Open-or-create the redirect target as a file sink; a non-append
    /// redirect truncates before the first write.
    fn open_write_sink(&self, target: &str, append: bool) -> Result<Sink, ExecError> {
        let path = resolve_path(&self.working_directory.borrow(), target);
        let vfs = Rc::clone(self.kernel.vfs());
        let found = vfs.borrow().find(&path)?;
        let id = match found {
            Some(id) => {
                if vfs.borrow().read_file(id).is_none() {
                    return Err(ExecError::RedirectTarget(path));
                }
                id
            }
            None => vfs.borrow_mut().make_file(&path, "")?,
        };
        if !append {
            vfs.borrow_mut().write_file(id, "");
        }
        Ok(Sink::File { vfs, id })
    }

    /// Rebuild the command table from `PATH` (`;`-separated directories,
    /// scanned in order; a later entry overrides an earlier one of the
    /// same name).
    fn path_commands(&self) -> Result<HashMap<String, Program>, PathError> {
        let mut commands = HashMap::new();
        let Some(path_value) = self.variables.get("PATH") else {
            return Ok(commands);
        };
        let vfs = self.kernel.vfs().borrow();
        for dir_path in path_value
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            let dir = vfs.find_directory(dir_path)?;
            for &child in vfs.children(dir) {
                if let Some(program) = vfs.program(child) {
                    commands.insert(vfs.node(child).name.clone(), program);
                }
            }
        }
        Ok(commands)
    }
}

/// Newline-separated `KEY=VALUE` records; malformed lines are skipped.
fn read_env_file(vfs: &Vfs) -> HashMap<String, String> {
    let mut variables = HashMap::new();
    let Ok(Some(id)) = vfs.find(ENV_PATH) else {
        return variables;
    };
    let Some(content) = vfs.read_file(id) else {
        return variables;
    };
    for line in content.lines() {
        if let Some((key, value)) = line.split_once('=') {
            if !key.trim().is_empty() {
                variables.insert(key.to_string(), value.to_string());
            }
        }
    }
    variables
}
