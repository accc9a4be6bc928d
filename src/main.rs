use clap::{CommandFactory, Parser};
use foam_dict::{Dictionary, LookupError, ReadError};
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Read the specified dictionary file and look up a key value.
#[derive(Parser, Debug)]
#[command(name = "foam-lookup-entry", version, about)]
struct CliArgs {
    /// Dictionary file where to look for the key. Read from standard input if omitted.
    #[arg(long, value_name = "dictionary")]
    dict: Option<PathBuf>,

    /// Key to look up. Use dot-syntax to access sub-dictionaries: a.b.c.d looks
    /// up d in sub-dictionary c of sub-dictionary b of a.
    #[arg(long, value_name = "value")]
    key: Option<String>,

    /// Fail silently with exit status > 0.
    #[arg(long)]
    batch: bool,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("no key to look up, use -key")]
    MissingKeyArgument,
    #[error("File: {} is not found.", .0.display())]
    DictionaryFileNotFound(PathBuf),
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
}

impl CliError {
    fn exit_code(&self) -> u8 {
        match self {
            CliError::MissingKeyArgument => 1,
            CliError::DictionaryFileNotFound(_) => 1 << 1,
            CliError::Lookup(LookupError::KeyNotFound { .. })
            | CliError::Lookup(LookupError::KeyNotFoundInSubdict { .. }) => 1 << 2,
            CliError::Lookup(LookupError::SubdictNotFound(_)) => 1 << 3,
            CliError::Read(_) => 1 << 4,
        }
    }

    /// Tell the user what went wrong. Nothing goes to stderr in batch mode.
    fn report(&self, batch: bool) {
        if !batch {
            match self {
                CliError::MissingKeyArgument => {
                    eprintln!("{}", CliArgs::command().render_help());
                }
                err => eprintln!("{}", err),
            }
        }
        if let CliError::DictionaryFileNotFound(_) = self {
            println!();
        }
    }
}

const OPTIONS: &[&str] = &["dict", "key", "batch", "help", "version"];

/// Accept the single-dash long options (`-dict`, `-key`, `-batch`) by
/// rewriting them to the `--` form.
fn normalize_args(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    args.into_iter()
        .enumerate()
        .map(|(index, arg)| {
            let single_dash = arg.to_str().and_then(|s| {
                let name = s.strip_prefix('-')?;
                let option = name.split('=').next().unwrap_or(name);
                (index > 0 && !name.starts_with('-') && OPTIONS.contains(&option))
                    .then(|| OsString::from(format!("-{}", s)))
            });
            single_dash.unwrap_or(arg)
        })
        .collect()
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_dictionary(args: &CliArgs) -> Result<Dictionary, CliError> {
    match &args.dict {
        Some(path) => {
            if !path.exists() {
                return Err(CliError::DictionaryFileNotFound(path.clone()));
            }
            Ok(foam_dict::read_file(path)?)
        }
        None => Ok(foam_dict::read(io::stdin().lock())?),
    }
}

fn run(args: &CliArgs) -> Result<String, CliError> {
    let key = args.key.as_deref().ok_or(CliError::MissingKeyArgument)?;
    let dict = read_dictionary(args)?;
    Ok(foam_dict::lookup(&dict, key)?)
}

fn main() -> ExitCode {
    let argv = normalize_args(std::env::args_os());
    let args = match CliArgs::try_parse_from(&argv) {
        Ok(args) => args,
        Err(err) if !err.use_stderr() => {
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            if !argv.iter().any(|arg| arg == "--batch") {
                let _ = err.print();
            }
            return ExitCode::from(1);
        }
    };

    if !args.batch {
        init_logging();
    }

    match run(&args) {
        Ok(value) => {
            let mut stdout = io::stdout().lock();
            match writeln!(stdout, "{}", value) {
                Ok(()) => ExitCode::SUCCESS,
                Err(_) => ExitCode::FAILURE,
            }
        }
        Err(err) => {
            err.report(args.batch);
            ExitCode::from(err.exit_code())
        }
    }
}
