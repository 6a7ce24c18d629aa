//! Command-line options.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use fsrepl_types::config::{CONFIG_ENV, ReplConfig};

pub const USAGE: &str = "usage: fsrepl [--config PATH] [SCRIPT...]

Replays one statement per line from each SCRIPT in order, or from stdin when
no script is given. A SCRIPT of '-' reads stdin.";

/// Parsed command line.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Options {
    pub config: Option<PathBuf>,
    pub scripts: Vec<String>,
    pub help: bool,
}

/// Parse arguments (without the program name).
pub fn parse_args<I>(args: I) -> Result<Options>
where
    I: IntoIterator<Item = String>,
{
    let mut opts = Options::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => opts.help = true,
            "--config" => {
                let path = args.next().context("--config needs a path")?;
                opts.config = Some(PathBuf::from(path));
            },
            "--" => {
                opts.scripts.extend(args.by_ref());
            },
            _ => {
                if let Some(path) = arg.strip_prefix("--config=") {
                    opts.config = Some(PathBuf::from(path));
                } else if arg.starts_with('-') && arg != "-" {
                    bail!("unknown option '{arg}'\n{USAGE}");
                } else {
                    opts.scripts.push(arg);
                }
            },
        }
    }
    Ok(opts)
}

/// Config file named on the command line, else by the environment.
pub fn config_path(flag: Option<&Path>, env: Option<String>) -> Option<PathBuf> {
    flag.map(Path::to_path_buf)
        .or_else(|| env.filter(|v| !v.is_empty()).map(PathBuf::from))
}

/// Load the session config, falling back to defaults when no file is named.
pub fn load_config(flag: Option<&Path>) -> Result<ReplConfig> {
    match config_path(flag, std::env::var(CONFIG_ENV).ok()) {
        Some(path) => ReplConfig::load(&path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(ReplConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_arguments() {
        assert_eq!(parse_args(Vec::new()).unwrap(), Options::default());
    }

    #[test]
    fn config_and_scripts() {
        let opts = parse_args(args(&["--config", "repl.toml", "a.txt", "-", "b.txt"])).unwrap();
        assert_eq!(opts.config, Some(PathBuf::from("repl.toml")));
        assert_eq!(opts.scripts, ["a.txt", "-", "b.txt"]);
        assert!(!opts.help);
    }

    #[test]
    fn config_with_equals() {
        let opts = parse_args(args(&["--config=x.toml"])).unwrap();
        assert_eq!(opts.config, Some(PathBuf::from("x.toml")));
    }

    #[test]
    fn missing_config_value() {
        assert!(parse_args(args(&["--config"])).is_err());
    }

    #[test]
    fn unknown_option() {
        let err = parse_args(args(&["-v"])).unwrap_err();
        assert!(err.to_string().contains("unknown option '-v'"));
    }

    #[test]
    fn double_dash_ends_options() {
        let opts = parse_args(args(&["--", "--help"])).unwrap();
        assert!(!opts.help);
        assert_eq!(opts.scripts, ["--help"]);
    }

    #[test]
    fn help_flag() {
        assert!(parse_args(args(&["-h"])).unwrap().help);
    }

    #[test]
    fn flag_beats_environment() {
        let flag = PathBuf::from("flag.toml");
        assert_eq!(
            config_path(Some(flag.as_path()), Some("env.toml".into())),
            Some(flag.clone())
        );
        assert_eq!(
            config_path(None, Some("env.toml".into())),
            Some(PathBuf::from("env.toml"))
        );
        assert_eq!(config_path(None, Some(String::new())), None);
        assert_eq!(config_path(None, None), None);
    }

    #[test]
    fn load_config_from_flag() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "file_capacity = 8").unwrap();
        let config = load_config(Some(f.path())).unwrap();
        assert_eq!(config.file_capacity, 8);
    }

    #[test]
    fn load_config_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let err = load_config(Some(path.as_path())).unwrap_err();
        assert!(format!("{err:#}").contains("missing.toml"));
    }
}
