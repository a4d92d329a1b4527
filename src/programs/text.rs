//! Text programs: grep.

use std::rc::Rc;

use regex::Regex;

use crate::colors::Color;
use crate::flags::parse_args;
use crate::kernel::Program;

/// Filter stdin to the lines matching a pattern.
///
/// Matches are highlighted when writing straight to the console, or when
/// `--color` is given explicitly; `--color=false` always disables it. A
/// trailing chunk without a newline goes to stderr if it matches
/// (preserved behavior).
pub fn grep() -> Program {
    Rc::new(|stdin, args, ctx| {
        Box::pin(async move {
            let parsed = match parse_args(&args) {
                Ok(parsed) => parsed,
                Err(error) => {
                    ctx.err(&error.to_string());
                    return Ok(2);
                }
            };
            let pattern = parsed
                .positional
                .first()
                .map(String::as_str)
                .unwrap_or("")
                .to_string();
            let regex = match Regex::new(&pattern) {
                Ok(regex) => regex,
                Err(error) => {
                    ctx.err(&format!("grep: {error}"));
                    return Ok(2);
                }
            };
            let colored = parsed.value("color") != Some("false")
                && (ctx.stdout_to_console() || parsed.has("color"));

            let mut buffer = String::new();
            while let Some(chunk) = stdin.recv().await {
                buffer.push_str(&chunk);
                while let Some(index) = buffer.find('\n') {
                    let line = buffer[..index].to_string();
                    buffer.drain(..=index);
                    emit_line(&ctx, &regex, &pattern, &line, colored);
                }
            }
            if !buffer.is_empty() && regex.is_match(&buffer) {
                ctx.err(&buffer);
            }
            Ok(0)
        })
    })
}

fn emit_line(
    ctx: &crate::context::Context,
    regex: &Regex,
    pattern: &str,
    line: &str,
    colored: bool,
) {
    if pattern.is_empty() {
        ctx.out(line);
        return;
    }
    if !regex.is_match(line) {
        return;
    }
    if colored {
        let highlighted = regex.replace_all(line, |captures: &regex::Captures<'_>| {
            ctx.color(Color::Magenta, &captures[0])
        });
        ctx.out(&highlighted);
    } else {
        ctx.out(line);
    }
}
