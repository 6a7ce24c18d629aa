//! The statement loop.

use std::io::{BufRead, Write};

use fsrepl_types::error::{ReplError, Result};

use crate::interpreter::CommandRegistry;
use crate::parser::{Parsed, parse_statement};
use crate::session::Session;

/// Replay statements from `input` until end of stream.
///
/// Blank lines are skipped. Lines that fail to parse are logged and skipped.
/// Every other statement is dispatched; its output goes to `output` and a
/// failure is logged without stopping the loop. Output is flushed after each
/// statement. Returns the status of the
/// last dispatched statement (0 when none ran). Only a read fault on
/// `input` or a write fault on `output` ends the loop early.
pub fn run<R, W>(
    registry: &CommandRegistry,
    session: &mut Session<'_>,
    input: &mut R,
    output: &mut W,
) -> Result<i32>
where
    R: BufRead + ?Sized,
    W: Write + ?Sized,
{
    let mut status = 0;
    loop {
        let stmt = match parse_statement(input, registry, session.max_args) {
            Ok(Parsed::Statement(stmt)) => stmt,
            Ok(Parsed::Blank) => continue,
            Ok(Parsed::EndOfInput) => break,
            Err(ReplError::Io(e)) => return Err(ReplError::Io(e)),
            Err(e) => {
                log::error!("failed to parse statement: {e}");
                continue;
            },
        };

        log::debug!("{}({})", stmt.command(), stmt.args().join(", "));
        status = match registry.execute(&stmt, session) {
            Ok(out) => {
                out.render(output)?;
                // A shell child writes to the same stream.
                output.flush()?;
                0
            },
            Err(e) => {
                let rc = e.status();
                log::error!("{}: {e} (rc = {rc})", stmt.command());
                rc
            },
        };
    }
    output.flush()?;
    log::debug!("end of input, status {status}");
    Ok(status)
}
