//! fsrepl entry point.
//!
//! Replays statement scripts against an in-memory storage through a single
//! interpreter session. The exit code is 0 when the last statement succeeded
//! and 1 otherwise. Set `RUST_LOG=debug` to trace every storage call.

mod cli;

use std::fs::File;
use std::io::{self, BufReader, Write};

use anyhow::{Context, Result};

use fsrepl_interp::{CommandRegistry, Session, register_builtins, run};
use fsrepl_storage::MemoryStorage;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = cli::parse_args(std::env::args().skip(1))?;

    let mut registry = CommandRegistry::new();
    register_builtins(&mut registry);

    if opts.help {
        println!("{}\n\ncommands:\n{}", cli::USAGE, registry.help_text());
        return Ok(());
    }

    let config = cli::load_config(opts.config.as_deref())?;
    log::debug!("session config: {config:?}");

    let mut storage = MemoryStorage::new();
    let status = {
        let mut session = Session::new(&mut storage, &config);
        let stdout = io::stdout();
        let mut out = stdout.lock();
        replay_all(&registry, &mut session, &opts.scripts, &mut out)?
    };

    log::info!("final status {status}");
    std::process::exit(if status == 0 { 0 } else { 1 });
}

/// Run each script in order (stdin when the list is empty) and return the
/// status of the last one.
fn replay_all(
    registry: &CommandRegistry,
    session: &mut Session<'_>,
    scripts: &[String],
    out: &mut dyn Write,
) -> Result<i32> {
    if scripts.is_empty() {
        return replay_stdin(registry, session, &mut *out);
    }
    let mut status = 0;
    for script in scripts {
        status = if script == "-" {
            replay_stdin(registry, session, &mut *out)?
        } else {
            log::info!("replaying {script}");
            let file = File::open(script).with_context(|| format!("failed to open {script}"))?;
            run(registry, session, &mut BufReader::new(file), &mut *out)
                .with_context(|| format!("failed to replay {script}"))?
        };
    }
    Ok(status)
}

fn replay_stdin(
    registry: &CommandRegistry,
    session: &mut Session<'_>,
    out: &mut dyn Write,
) -> Result<i32> {
    let stdin = io::stdin();
    let status = run(registry, session, &mut stdin.lock(), &mut *out).context("failed to read stdin")?;
    Ok(status)
}

#[cfg(test)]
mod tests {
    use fsrepl_storage::Storage;
    use fsrepl_types::config::ReplConfig;

    use super::*;

    #[test]
    fn scripts_share_one_session() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("one.txt");
        let second = dir.path().join("two.txt");
        writeln!(File::create(&first).unwrap(), "create /f 644\nwrite 0 0 2 hi").unwrap();
        writeln!(File::create(&second).unwrap(), "read 0 0 2\nclose 0").unwrap();

        let mut registry = CommandRegistry::new();
        register_builtins(&mut registry);
        let mut storage = MemoryStorage::new();
        let mut out = Vec::new();
        let status = {
            let mut session = Session::new(&mut storage, &ReplConfig::default());
            let scripts = [first, second].map(|p| p.to_string_lossy().into_owned());
            replay_all(&registry, &mut session, &scripts, &mut out).unwrap()
        };
        assert_eq!(status, 0);
        assert_eq!(out, b"0\n2\n2\nhi");
        assert_eq!(storage.stat("/f").unwrap().size, 2);
    }

    #[test]
    fn missing_script_is_an_error() {
        let mut registry = CommandRegistry::new();
        register_builtins(&mut registry);
        let mut storage = MemoryStorage::new();
        let mut session = Session::new(&mut storage, &ReplConfig::default());
        let scripts = ["/definitely/not/here.txt".to_string()];
        let err = replay_all(&registry, &mut session, &scripts, &mut io::sink()).unwrap_err();
        assert!(err.to_string().contains("failed to open"));
    }

    #[test]
    fn last_script_status_is_returned() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fail.txt");
        writeln!(File::create(&script).unwrap(), "stat /nope").unwrap();
        let mut registry = CommandRegistry::new();
        register_builtins(&mut registry);
        let mut storage = MemoryStorage::new();
        let mut session = Session::new(&mut storage, &ReplConfig::default());
        let scripts = [script.to_string_lossy().into_owned()];
        let status = replay_all(&registry, &mut session, &scripts, &mut io::sink()).unwrap();
        assert_eq!(status, -2);
    }
}
