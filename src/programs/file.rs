//! Filesystem programs: cat, ls, mkdir, rm, cp.
//!
//! Path errors are propagated with `?`; the kernel turns an escaped
//! error into a single stderr line and exit code 1.

use std::rc::Rc;

use crate::kernel::Program;
use crate::vfs::PathError;

/// Print each named file's content verbatim; with no arguments, pass
/// stdin through unchanged.
pub fn cat() -> Program {
    Rc::new(|stdin, args, ctx| {
        Box::pin(async move {
            if args.is_empty() {
                while let Some(chunk) = stdin.recv().await {
                    ctx.write_stdout(chunk);
                }
                return Ok(0);
            }
            for path in &args {
                let content = ctx.read_file(path)?;
                ctx.write_stdout(content);
            }
            Ok(0)
        })
    })
}

/// List a directory's child names, tab-separated on one line.
pub fn ls() -> Program {
    Rc::new(|_stdin, args, ctx| {
        Box::pin(async move {
            let path = args.first().map(String::as_str).unwrap_or(".");
            let resolved = ctx.get_path_to(path);
            let names: Vec<String> = {
                let vfs = ctx.vfs();
                let dir = vfs.find_directory(&resolved)?;
                vfs.children(dir)
                    .iter()
                    .map(|&child| vfs.node(child).name.clone())
                    .collect()
            };
            ctx.write_stdout(format!("{}\n", names.join("\t")));
            Ok(0)
        })
    })
}

/// Create a directory and any missing parents.
pub fn mkdir() -> Program {
    Rc::new(|_stdin, args, ctx| {
        Box::pin(async move {
            let Some(path) = args.first() else {
                ctx.err("mkdir: missing operand");
                return Ok(1);
            };
            ctx.create_directory(path)?;
            Ok(0)
        })
    })
}

/// Unlink a node. Removing a missing path is not an error.
pub fn rm() -> Program {
    Rc::new(|_stdin, args, ctx| {
        Box::pin(async move {
            let Some(path) = args.first() else {
                ctx.err("rm: missing operand");
                return Ok(1);
            };
            ctx.remove(path)?;
            Ok(0)
        })
    })
}

/// Copy a file. A trailing `/` on the target keeps the source name;
/// otherwise the target's last segment is the new name. An existing
/// node under the target name is rejected.
pub fn cp() -> Program {
    Rc::new(|_stdin, args, ctx| {
        Box::pin(async move {
            let (Some(source), Some(target)) = (args.first(), args.get(1)) else {
                ctx.err("Failed to copy");
                return Ok(1);
            };

            let source_path = ctx.get_path_to(source);
            let content = {
                let vfs = ctx.vfs();
                match vfs.find(&source_path)? {
                    Some(id) => vfs.read_file(id).map(str::to_string),
                    None => None,
                }
            };
            let Some(content) = content else {
                ctx.err("Failed to copy");
                return Ok(1);
            };

            let (dir_path, name) = if target.ends_with('/') {
                let source_name = source_path
                    .rsplit('/')
                    .next()
                    .unwrap_or_default()
                    .to_string();
                (ctx.get_path_to(target), source_name)
            } else {
                let resolved = ctx.get_path_to(target);
                match resolved.rfind('/') {
                    Some(0) => ("/".to_string(), resolved[1..].to_string()),
                    Some(split) => (
                        resolved[..split].to_string(),
                        resolved[split + 1..].to_string(),
                    ),
                    None => ("/".to_string(), resolved),
                }
            };

            let duplicate = {
                let vfs = ctx.vfs();
                match vfs.find(&dir_path)? {
                    Some(dir) if vfs.node(dir).is_directory_like() => {
                        vfs.child_by_name(dir, &name).is_some()
                    }
                    _ => return Ok(1),
                }
            };
            if duplicate {
                return Err(PathError::AlreadyExists);
            }

            let target_path = if dir_path == "/" {
                format!("/{name}")
            } else {
                format!("{dir_path}/{name}")
            };
            ctx.create_file(&target_path, &content)?;
            Ok(0)
        })
    })
}
