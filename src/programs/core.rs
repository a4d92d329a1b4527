//! Core programs: echo, printf, env, cd.

use std::rc::Rc;

use itertools::Itertools;

use crate::image::HOME_PATH;
use crate::kernel::Program;

/// Print the arguments joined by single spaces, newline-terminated.
pub fn echo() -> Program {
    Rc::new(|_stdin, args, ctx| {
        Box::pin(async move {
            ctx.out(&args.join(" "));
            Ok(0)
        })
    })
}

/// Print the first argument with `\n`, `\t` and `\\` escapes
/// interpreted. No newline is added.
pub fn printf() -> Program {
    Rc::new(|_stdin, args, ctx| {
        Box::pin(async move {
            if let Some(format) = args.first() {
                ctx.write_stdout(unescape(format));
            }
            Ok(0)
        })
    })
}

fn unescape(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('\\') => result.push('\\'),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }
    result
}

/// Print every environment variable as `KEY=VALUE`, sorted by key.
pub fn env() -> Program {
    Rc::new(|_stdin, _args, ctx| {
        Box::pin(async move {
            for (key, value) in ctx.variables().iter().sorted() {
                ctx.out(&format!("{key}={value}"));
            }
            Ok(0)
        })
    })
}

/// Change the working directory; no argument means home.
pub fn cd() -> Program {
    Rc::new(|_stdin, args, ctx| {
        Box::pin(async move {
            let target = args.first().map(String::as_str).unwrap_or(HOME_PATH);
            ctx.change_working_directory(target);
            Ok(0)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r"a\nb\tc"), "a\nb\tc");
        assert_eq!(unescape(r"back\\slash"), r"back\slash");
        assert_eq!(unescape(r"unknown\q"), r"unknown\q");
        assert_eq!(unescape("trailing\\"), "trailing\\");
    }
}
