//! Purpose: `tsvrec` CLI entry point for inspecting record tables.
//! Role: Binary crate root; parses args, runs commands, writes results on stdout.
//! Invariants: `header` and `dump` emit JSON; `escape`/`unescape` emit text lines.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueHint, error::ErrorKind as ClapErrorKind};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;
use tsvrec::api::{Error, ErrorKind, Rows, escape, to_exit_code};

#[derive(Parser, Debug)]
#[command(name = "tsvrec", version, about = "Inspect tab-separated record tables")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the header columns of a table as JSON.
    Header {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },
    /// Print each data row as a JSON object keyed by header column.
    Dump {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        #[arg(long, help = "Stop after this many rows")]
        limit: Option<u64>,
    },
    /// Escape each stdin line so it fits in a single cell.
    Escape,
    /// Decode each escaped stdin line back to its raw text.
    Unescape,
}

#[derive(Serialize)]
struct HeaderReport<'a> {
    path: String,
    columns: &'a [String],
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(code) => code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<i32, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let code = if err.kind() == ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand {
                    2
                } else {
                    0
                };
                return Ok(code);
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Try `tsvrec --help`."));
            }
        },
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Command::Header { file } => header(&file, &mut out)?,
        Command::Dump { file, limit } => dump(&file, limit, &mut out)?,
        Command::Escape => transform_lines(io::stdin().lock(), &mut out, |line| {
            escape::encode(line).into_owned()
        })?,
        Command::Unescape => transform_lines(io::stdin().lock(), &mut out, |line| {
            escape::decode(line).into_owned()
        })?,
    }
    out.flush().map_err(stdout_error)?;
    Ok(0)
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn open_rows(path: &Path) -> Result<Rows, Error> {
    if !path.exists() {
        return Err(Error::new(ErrorKind::NotFound)
            .with_message("table file not found")
            .with_path(path));
    }
    Rows::open(path)
}

fn header(path: &Path, out: &mut impl Write) -> Result<(), Error> {
    let rows = open_rows(path)?;
    let report = HeaderReport {
        path: path.display().to_string(),
        columns: rows.header(),
    };
    let json = serde_json::to_string(&report).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("json encode failed")
            .with_source(err)
    })?;
    writeln!(out, "{json}").map_err(stdout_error)
}

fn dump(path: &Path, limit: Option<u64>, out: &mut impl Write) -> Result<(), Error> {
    let mut rows = open_rows(path)?;
    let header = rows.header().to_vec();
    let mut emitted = 0u64;
    while limit.is_none_or(|limit| emitted < limit) {
        let Some(cells) = rows.next().transpose()? else {
            break;
        };
        writeln!(out, "{}", row_json(&header, cells)).map_err(stdout_error)?;
        emitted += 1;
    }
    tracing::debug!(path = %path.display(), rows = emitted, "dumped table");
    Ok(())
}

fn row_json(header: &[String], cells: Vec<String>) -> Value {
    let mut object = Map::new();
    for (name, cell) in header.iter().zip(cells) {
        object.insert(name.clone(), Value::String(cell));
    }
    Value::Object(object)
}

fn transform_lines<R, W, F>(input: R, out: &mut W, transform: F) -> Result<(), Error>
where
    R: BufRead,
    W: Write,
    F: Fn(&str) -> String,
{
    for line in input.lines() {
        let line = line.map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read stdin")
                .with_source(err)
        })?;
        writeln!(out, "{}", transform(&line)).map_err(stdout_error)?;
    }
    Ok(())
}

fn stdout_error(err: io::Error) -> Error {
    Error::new(ErrorKind::Io)
        .with_message("failed to write stdout")
        .with_source(err)
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("{}", error_text(err));
        return;
    }

    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> &str {
    err.message().unwrap_or(match err.kind() {
        ErrorKind::Internal => "internal error",
        ErrorKind::Usage => "usage error",
        ErrorKind::Schema => "invalid record schema",
        ErrorKind::Unsupported => "unsupported value type",
        ErrorKind::Format => "malformed table",
        ErrorKind::Parse => "invalid cell value",
        ErrorKind::NotFound => "not found",
        ErrorKind::Busy => "resource is busy",
        ErrorKind::Permission => "permission denied",
        ErrorKind::Io => "i/o error",
    })
}

/// Optional table context carried by `err`, in display order.
fn error_context(err: &Error) -> Vec<(&'static str, String)> {
    let mut context = Vec::new();
    if let Some(hint) = err.hint() {
        context.push(("hint", hint.to_string()));
    }
    if let Some(path) = err.path() {
        context.push(("path", path.display().to_string()));
    }
    if let Some(column) = err.column() {
        context.push(("column", column.to_string()));
    }
    if let Some(value_type) = err.value_type() {
        context.push(("type", value_type.to_string()));
    }
    context
}

fn error_causes(err: &Error) -> Vec<String> {
    std::iter::successors(err.source(), |&source| source.source())
        .map(|source| source.to_string())
        .collect()
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    for (name, value) in error_context(err) {
        inner.insert(name.to_string(), json!(value));
    }
    if let Some(line) = err.line() {
        inner.insert("line".to_string(), json!(line));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }
    json!({ "error": inner })
}

fn error_text(err: &Error) -> String {
    let mut lines = vec![format!("error: {}", error_message(err))];
    lines.extend(
        error_context(err)
            .into_iter()
            .map(|(name, value)| format!("{name}: {value}")),
    );
    if let Some(line) = err.line() {
        lines.push(format!("line: {line}"));
    }
    if let Some(cause) = error_causes(err).first() {
        lines.push(format!("caused by: {cause}"));
    }
    lines.join("\n")
}

/// First non-empty line of clap's rendered error, without its `error:` label.
fn clap_error_summary(err: &clap::Error) -> String {
    err.to_string()
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.strip_prefix("error:").unwrap_or(line).trim().to_string())
        .unwrap_or_else(|| "invalid arguments".to_string())
}
