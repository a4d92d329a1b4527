//! Line parser: turns one raw input line into pipe-separated commands
//! with their redirects.
//!
//! Tokenization rules: whitespace splits words outside quotes; single- and
//! double-quoted spans suppress all special characters until the matching
//! quote, and the quotes themselves are stripped (no escape sequences
//! inside quotes). Recognized operators are `|`, `>`, `>>`, `<`, `<<`,
//! `>&`, `<&`, each optionally prefixed by a single digit pinning an
//! explicit file descriptor (`2>`, `2>>`, `2>&`).

use thiserror::Error;

/// A parse failure; the whole line is rejected before anything runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty command before pipe")]
    EmptyCommandBeforePipe,
    #[error("missing redirect target after {0}")]
    MissingRedirectTarget(String),
}

/// Redirect operator kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// `>` — truncate and write.
    Write,
    /// `>>` — append.
    Append,
    /// `<` — read from file.
    Read,
    /// `<<` — heredoc-style read.
    ReadHeredoc,
    /// `>&` — duplicate an output descriptor.
    DupOut,
    /// `<&` — duplicate an input descriptor.
    DupIn,
}

impl RedirectKind {
    /// The descriptor assumed when the operator carries no digit prefix:
    /// 1 for the `>` family, 0 for the `<` family.
    fn default_fd(self) -> u32 {
        match self {
            RedirectKind::Write | RedirectKind::Append | RedirectKind::DupOut => 1,
            RedirectKind::Read | RedirectKind::ReadHeredoc | RedirectKind::DupIn => 0,
        }
    }

    fn from_op(op: &str) -> Option<Self> {
        match op {
            ">" => Some(RedirectKind::Write),
            ">>" => Some(RedirectKind::Append),
            "<" => Some(RedirectKind::Read),
            "<<" => Some(RedirectKind::ReadHeredoc),
            ">&" => Some(RedirectKind::DupOut),
            "<&" => Some(RedirectKind::DupIn),
            _ => None,
        }
    }
}

impl std::fmt::Display for RedirectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match self {
            RedirectKind::Write => ">",
            RedirectKind::Append => ">>",
            RedirectKind::Read => "<",
            RedirectKind::ReadHeredoc => "<<",
            RedirectKind::DupOut => ">&",
            RedirectKind::DupIn => "<&",
        };
        f.write_str(op)
    }
}

/// One parsed redirect: `[N]op target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub fd: u32,
    pub kind: RedirectKind,
    pub target: String,
}

/// One pipeline stage: argv (first element is the command name) plus its
/// redirects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCommand {
    pub args: Vec<String>,
    pub redirects: Vec<Redirect>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    /// A plain word; quoted spans always end up here, so a quoted `|` is
    /// an argument, not a pipe.
    Word(String),
    /// An operator recognized outside quotes.
    Op(String),
}

impl Token {
    fn text(&self) -> &str {
        match self {
            Token::Word(s) | Token::Op(s) => s,
        }
    }
}

/// Parse one raw line into its pipeline stages.
pub fn parse_line(input: &str) -> Result<Vec<ParsedCommand>, ParseError> {
    let tokens = tokenize(input);
    let mut commands = Vec::new();
    let mut current = ParsedCommand::default();

    let mut iter = tokens.into_iter().peekable();
    while let Some(token) = iter.next() {
        match token {
            Token::Op(op) if op == "|" => {
                if current.args.is_empty() {
                    return Err(ParseError::EmptyCommandBeforePipe);
                }
                commands.push(std::mem::take(&mut current));
            }
            Token::Op(op) => {
                let (fd, kind) = parse_redirect_op(&op);
                // The target is the very next token, taken verbatim.
                let target = iter
                    .next()
                    .ok_or(ParseError::MissingRedirectTarget(op))?
                    .text()
                    .to_string();
                current.redirects.push(Redirect { fd, kind, target });
            }
            Token::Word(word) => current.args.push(word),
        }
    }

    if !current.args.is_empty() || !current.redirects.is_empty() {
        commands.push(current);
    }
    Ok(commands)
}

fn parse_redirect_op(op: &str) -> (u32, RedirectKind) {
    let mut chars = op.chars();
    let first = chars.next().unwrap_or_default();
    if let Some(digit) = first.to_digit(10) {
        let kind = RedirectKind::from_op(chars.as_str()).unwrap_or(RedirectKind::Write);
        (digit, kind)
    } else {
        // Tokenizer only emits operators from the fixed set.
        let kind = RedirectKind::from_op(op).unwrap_or(RedirectKind::Write);
        (kind.default_fd(), kind)
    }
}

fn tokenize(input: &str) -> Vec<Token> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_single = false;
    let mut in_double = false;
    // Quoted content must survive as a Word even when it spells an
    // operator, so we remember whether the accumulator saw a quote.
    let mut quoted = false;

    let mut flush = |current: &mut String, quoted: &mut bool, tokens: &mut Vec<Token>| {
        if !current.is_empty() || *quoted {
            tokens.push(Token::Word(std::mem::take(current)));
        }
        *quoted = false;
    };

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];

        if in_single {
            if c == '\'' {
                in_single = false;
            } else {
                current.push(c);
            }
            i += 1;
            continue;
        }
        if in_double {
            if c == '"' {
                in_double = false;
            } else {
                current.push(c);
            }
            i += 1;
            continue;
        }

        match c {
            '\'' => {
                in_single = true;
                quoted = true;
                i += 1;
            }
            '"' => {
                in_double = true;
                quoted = true;
                i += 1;
            }
            c if c.is_whitespace() => {
                flush(&mut current, &mut quoted, &mut tokens);
                i += 1;
            }
            '|' | '<' | '>' => {
                flush(&mut current, &mut quoted, &mut tokens);
                let next = chars.get(i + 1).copied();
                if (c == '>' || c == '<') && next == Some(c) {
                    tokens.push(Token::Op(format!("{c}{c}")));
                    i += 2;
                } else if (c == '>' || c == '<') && next == Some('&') {
                    tokens.push(Token::Op(format!("{c}&")));
                    i += 2;
                } else {
                    tokens.push(Token::Op(c.to_string()));
                    i += 1;
                }
            }
            c if c.is_ascii_digit()
                && matches!(chars.get(i + 1), Some('>') | Some('<')) =>
            {
                flush(&mut current, &mut quoted, &mut tokens);
                let op_char = chars[i + 1];
                let mut op = String::new();
                op.push(c);
                op.push(op_char);
                i += 2;
                // The digit prefixes the whole operator: 2>>, 2>&, 0<&.
                if chars.get(i) == Some(&op_char) || chars.get(i) == Some(&'&') {
                    op.push(chars[i]);
                    i += 1;
                }
                tokens.push(Token::Op(op));
            }
            c => {
                current.push(c);
                i += 1;
            }
        }
    }

    flush(&mut current, &mut quoted, &mut tokens);
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        let mut cmds = parse_line(line).unwrap();
        assert_eq!(cmds.len(), 1);
        cmds.remove(0).args
    }

    #[test]
    fn test_whitespace_splits_words() {
        assert_eq!(args("echo  hello   world"), vec!["echo", "hello", "world"]);
    }

    #[test]
    fn test_single_quotes_preserve_whitespace() {
        assert_eq!(args("echo 'a b'"), vec!["echo", "a b"]);
    }

    #[test]
    fn test_double_quotes_strip_quotes() {
        assert_eq!(args("echo \"a|b > c\""), vec!["echo", "a|b > c"]);
    }

    #[test]
    fn test_quoted_empty_string_is_a_token() {
        assert_eq!(args("echo ''"), vec!["echo", ""]);
    }

    #[test]
    fn test_pipeline_split() {
        let cmds = parse_line("echo a | grep a | cat").unwrap();
        assert_eq!(cmds.len(), 3);
        assert_eq!(cmds[0].args, vec!["echo", "a"]);
        assert_eq!(cmds[1].args, vec!["grep", "a"]);
        assert_eq!(cmds[2].args, vec!["cat"]);
    }

    #[test]
    fn test_empty_command_before_pipe() {
        assert_eq!(
            parse_line("| cat"),
            Err(ParseError::EmptyCommandBeforePipe)
        );
        assert_eq!(
            parse_line("echo a | | cat"),
            Err(ParseError::EmptyCommandBeforePipe)
        );
    }

    #[test]
    fn test_redirect_defaults() {
        let cmds = parse_line("echo hi > out.txt").unwrap();
        assert_eq!(
            cmds[0].redirects,
            vec![Redirect {
                fd: 1,
                kind: RedirectKind::Write,
                target: "out.txt".into()
            }]
        );

        let cmds = parse_line("cat < in.txt").unwrap();
        assert_eq!(cmds[0].redirects[0].fd, 0);
        assert_eq!(cmds[0].redirects[0].kind, RedirectKind::Read);
    }

    #[test]
    fn test_dup_fd_defaults() {
        let cmds = parse_line("cmd >& 1").unwrap();
        assert_eq!(cmds[0].redirects[0].fd, 1);
        assert_eq!(cmds[0].redirects[0].kind, RedirectKind::DupOut);

        let cmds = parse_line("cmd <& 0").unwrap();
        assert_eq!(cmds[0].redirects[0].fd, 0);
        assert_eq!(cmds[0].redirects[0].kind, RedirectKind::DupIn);
    }

    #[test]
    fn test_digit_prefixed_redirect() {
        let cmds = parse_line("cmd 2> errs").unwrap();
        assert_eq!(
            cmds[0].redirects,
            vec![Redirect {
                fd: 2,
                kind: RedirectKind::Write,
                target: "errs".into()
            }]
        );
    }

    #[test]
    fn test_stderr_to_stdout() {
        let cmds = parse_line("cmd 2>&1").unwrap();
        assert_eq!(
            cmds[0].redirects,
            vec![Redirect {
                fd: 2,
                kind: RedirectKind::DupOut,
                target: "1".into()
            }]
        );
    }

    #[test]
    fn test_missing_redirect_target() {
        assert_eq!(
            parse_line("echo hi >"),
            Err(ParseError::MissingRedirectTarget(">".into()))
        );
    }

    #[test]
    fn test_digit_prefix_covers_whole_operator() {
        let cmds = parse_line("cmd 2>> errs").unwrap();
        assert_eq!(
            cmds[0].redirects,
            vec![Redirect {
                fd: 2,
                kind: RedirectKind::Append,
                target: "errs".into()
            }]
        );
    }

    #[test]
    fn test_redirect_target_taken_verbatim() {
        // The target token is consumed as-is, even when it spells an
        // operator.
        let cmds = parse_line("cmd > > file").unwrap();
        assert_eq!(cmds[0].redirects[0].target, ">");
        assert_eq!(cmds[0].args, vec!["cmd", "file"]);
    }

    #[test]
    fn test_quoted_pipe_is_an_argument() {
        assert_eq!(args("echo '|'"), vec!["echo", "|"]);
    }

    #[test]
    fn test_trailing_redirect_only_command_is_kept() {
        let cmds = parse_line("> out.txt").unwrap();
        assert_eq!(cmds.len(), 1);
        assert!(cmds[0].args.is_empty());
        assert_eq!(cmds[0].redirects.len(), 1);
    }

    #[test]
    fn test_empty_line() {
        assert_eq!(parse_line(""), Ok(vec![]));
        assert_eq!(parse_line("   "), Ok(vec![]));
    }
}
