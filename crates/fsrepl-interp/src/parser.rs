//! Statement parser.
//!
//! One line of input becomes one [`Statement`]: a command name followed by
//! arguments separated by runs of spaces or tabs. There is no quoting,
//! escaping, or comment syntax. Commands that declare a literal tail (see
//! [`Grammar`]) receive everything after their fixed arguments as a single
//! verbatim argument, internal and trailing whitespace included.

use std::io::BufRead;
use std::ops::Range;

use fsrepl_types::error::{ReplError, Result};

/// Per-command parsing rules consulted while tokenizing.
pub trait Grammar {
    /// Number of fixed arguments that precede the literal tail of `command`,
    /// or `None` when every argument is a plain token.
    fn tail_position(&self, command: &str) -> Option<usize>;
}

/// A grammar where no command has a literal tail.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainGrammar;

impl Grammar for PlainGrammar {
    fn tail_position(&self, _command: &str) -> Option<usize> {
        None
    }
}

/// A parsed statement. Owns its line; the command and arguments are byte
/// ranges into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    line: String,
    command: Range<usize>,
    args: Vec<Range<usize>>,
}

impl Statement {
    pub fn command(&self) -> &str {
        &self.line[self.command.clone()]
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(|r| &self.line[r.clone()])
    }

    pub fn args(&self) -> Vec<&str> {
        self.args.iter().map(|r| &self.line[r.clone()]).collect()
    }

    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// The line as read, without its line terminator.
    pub fn line(&self) -> &str {
        &self.line
    }
}

/// Outcome of reading one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    Statement(Statement),
    /// Empty or whitespace-only line.
    Blank,
    EndOfInput,
}

fn is_separator(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

/// Offset of the first non-separator byte at or after `pos`.
fn skip_separators(bytes: &[u8], pos: usize) -> Option<usize> {
    bytes[pos..]
        .iter()
        .position(|&b| !is_separator(b))
        .map(|n| pos + n)
}

fn next_token(bytes: &[u8], pos: usize) -> Option<Range<usize>> {
    let start = skip_separators(bytes, pos)?;
    let end = bytes[start..]
        .iter()
        .position(|&b| is_separator(b))
        .map_or(bytes.len(), |n| start + n);
    Some(start..end)
}

fn strip_line_terminator(line: &mut String) {
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
}

/// Tokenize a single line. Returns `Ok(None)` for a blank line.
///
/// More than `max_args` plain tokens is an invalid statement. A literal tail
/// counts as one argument no matter how many words it holds.
pub fn parse_line<G: Grammar + ?Sized>(
    mut line: String,
    grammar: &G,
    max_args: usize,
) -> Result<Option<Statement>> {
    strip_line_terminator(&mut line);
    let bytes = line.as_bytes();
    let Some(command) = next_token(bytes, 0) else {
        return Ok(None);
    };
    let tail_at = grammar.tail_position(&line[command.clone()]);

    let mut args = Vec::new();
    let mut pos = command.end;
    loop {
        if tail_at == Some(args.len()) {
            if let Some(start) = skip_separators(bytes, pos) {
                args.push(start..bytes.len());
            }
            break;
        }
        let Some(token) = next_token(bytes, pos) else {
            break;
        };
        if args.len() == max_args {
            return Err(ReplError::InvalidStatement(format!(
                "more than {max_args} arguments"
            )));
        }
        pos = token.end;
        args.push(token);
    }

    Ok(Some(Statement {
        line,
        command,
        args,
    }))
}

/// Read and parse the next line from `input`.
///
/// A final line without a terminator still counts. Read faults surface as
/// [`ReplError::Io`]; a line that is not UTF-8 is an invalid statement and
/// has been consumed.
pub fn parse_statement<R, G>(input: &mut R, grammar: &G, max_args: usize) -> Result<Parsed>
where
    R: BufRead + ?Sized,
    G: Grammar + ?Sized,
{
    let mut buf = Vec::new();
    if input.read_until(b'\n', &mut buf)? == 0 {
        return Ok(Parsed::EndOfInput);
    }
    let line = String::from_utf8(buf)
        .map_err(|_| ReplError::InvalidStatement("line is not valid UTF-8".into()))?;
    Ok(match parse_line(line, grammar, max_args)? {
        Some(stmt) => Parsed::Statement(stmt),
        None => Parsed::Blank,
    })
}
