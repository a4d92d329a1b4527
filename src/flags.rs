//! Flag parsing for program argv.
//!
//! Programs that take options run their argv (after the command name)
//! through [`parse_args`]. The grammar is deliberately small: long flags
//! with `=` or space-separated values, `--` to end option parsing, and
//! short clusters where every letter is an independent boolean.

use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlagError {
    #[error("invalid flag name: --{0}")]
    InvalidFlagName(String),
    #[error("invalid flag: -{0}")]
    InvalidShortFlag(char),
}

/// A flag is either a bare switch or carries a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagValue {
    Switch,
    Value(String),
}

impl FlagValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FlagValue::Switch => None,
            FlagValue::Value(v) => Some(v),
        }
    }
}

/// Result of parsing an argv: named flags plus positional arguments in
/// their original order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedArgs {
    pub flags: HashMap<String, FlagValue>,
    pub positional: Vec<String>,
}

impl ParsedArgs {
    /// Whether `name` was given at all, as a switch or with a value.
    pub fn has(&self, name: &str) -> bool {
        self.flags.contains_key(name)
    }

    /// The value of `name`, if the flag was given one.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.flags.get(name).and_then(FlagValue::as_str)
    }
}

fn valid_long_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Parse an argv (with the command name already stripped) into flags and
/// positionals.
///
/// `--name=value` binds directly. A bare `--name` consumes the next token
/// as its value unless that token starts with `-`, in which case the flag
/// is a switch. `--` ends flag parsing. A short cluster `-abc` sets each
/// letter as an independent switch; letters never attach values.
pub fn parse_args(args: &[String]) -> Result<ParsedArgs, FlagError> {
    let mut parsed = ParsedArgs::default();
    let mut iter = args.iter().peekable();
    let mut flags_done = false;

    while let Some(arg) = iter.next() {
        if flags_done {
            parsed.positional.push(arg.clone());
            continue;
        }

        if arg == "--" {
            flags_done = true;
        } else if let Some(long) = arg.strip_prefix("--") {
            if let Some((name, value)) = long.split_once('=') {
                if !valid_long_name(name) {
                    return Err(FlagError::InvalidFlagName(name.to_string()));
                }
                parsed
                    .flags
                    .insert(name.to_string(), FlagValue::Value(value.to_string()));
            } else {
                if !valid_long_name(long) {
                    return Err(FlagError::InvalidFlagName(long.to_string()));
                }
                // Value only when the next token is not itself flag-like.
                let value = match iter.peek() {
                    Some(next) if !next.starts_with('-') => {
                        Some(iter.next().cloned().unwrap_or_default())
                    }
                    _ => None,
                };
                let value = match value {
                    Some(v) => FlagValue::Value(v),
                    None => FlagValue::Switch,
                };
                parsed.flags.insert(long.to_string(), value);
            }
        } else if let Some(cluster) = arg.strip_prefix('-') {
            if cluster.is_empty() {
                parsed.positional.push(arg.clone());
                continue;
            }
            for letter in cluster.chars() {
                if !letter.is_ascii_alphabetic() {
                    return Err(FlagError::InvalidShortFlag(letter));
                }
                parsed.flags.insert(letter.to_string(), FlagValue::Switch);
            }
        } else {
            parsed.positional.push(arg.clone());
        }
    }

    Ok(parsed)
}
