//! fdstream: deadline-bounded reads and writes on the standard streams.

use std::borrow::Cow;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use fdstream_core::config::LogFormat;
use fdstream_core::logging::init_logging;
use fdstream_core::{Config, ReadKind, ReadOutcome, ReadStatus, Selector, Stream};
use fdstream_sys::{AccessMode, FileDescriptor, StdioDescriptor};
use serde::Serialize;

#[derive(Parser)]
#[command(
    name = "fdstream",
    version,
    about = "Deadline-bounded line, exact and read-all I/O on stdin/stdout"
)]
struct Cli {
    /// TOML config file.
    #[arg(long, global = true, env = "FDSTREAM_CONFIG")]
    config: Option<PathBuf>,

    /// Log level filter (overridden by RUST_LOG).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format: pretty or json.
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read from stdin and print what arrived.
    Read {
        /// `l` (line), `L` (line with newline), `a` (to end) or a byte count.
        #[arg(long, short, default_value = "l")]
        format: String,

        /// Timeout in caller units; -1 or absent follows the blocking mode.
        #[arg(long, short, allow_negative_numbers = true)]
        timeout: Option<i64>,

        /// Timeout units per second (1000 = milliseconds, 1 = seconds).
        #[arg(long)]
        divisor: Option<u32>,

        /// Number of reads to perform; stops early at end of stream.
        #[arg(long, default_value_t = 1)]
        repeat: usize,

        /// Treat stdin as persistently non-blocking.
        #[arg(long)]
        nonblocking: bool,

        /// Print one JSON record per read.
        #[arg(long)]
        json: bool,
    },

    /// Write text to stdout in a single call.
    Write {
        text: String,

        /// Append a newline.
        #[arg(long)]
        newline: bool,
    },

    /// Report blocking mode and access mode of stdin and stdout.
    Probe,
}

#[derive(Serialize)]
struct ReadRecord<'a> {
    status: &'static str,
    bytes: usize,
    data: Cow<'a, str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorRecord>,
}

#[derive(Serialize)]
struct ErrorRecord {
    code: i32,
    message: String,
}

#[derive(Serialize)]
struct ProbeRecord {
    fd: i64,
    non_blocking: bool,
    access: &'static str,
}

#[derive(Serialize)]
struct ProbeReport {
    stdin: ProbeRecord,
    stdout: ProbeRecord,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("fdstream: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    init_logging(&config.logging).context("failed to initialize logging")?;

    match cli.command {
        Command::Read {
            format,
            timeout,
            divisor,
            repeat,
            nonblocking,
            json,
        } => {
            if let Some(divisor) = divisor {
                config.engine.timeout_divisor = divisor;
            }
            let selector: Selector = format.parse()?;
            let mut stream =
                Stream::stdio(StdioDescriptor::Stdin).try_with_config(config.engine)?;
            stream.set_nonblocking(nonblocking);
            run_read(&mut stream, &selector, timeout, repeat, json)
        }
        Command::Write { text, newline } => {
            let mut stream = Stream::stdio(StdioDescriptor::Stdout).with_config(config.engine);
            let mut buf = text.into_bytes();
            if newline {
                buf.push(b'\n');
            }
            stream.write(&buf).context("write to stdout failed")?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Probe => run_probe(),
    }
}

fn status_name(status: &ReadStatus) -> &'static str {
    match status {
        ReadStatus::Complete => "complete",
        ReadStatus::Eof => "eof",
        ReadStatus::TimedOut => "timeout",
        ReadStatus::Failed(_) => "error",
    }
}

fn print_outcome(outcome: &ReadOutcome, kind: ReadKind, json: bool) -> anyhow::Result<()> {
    let mut out = std::io::stdout().lock();
    if json {
        let record = ReadRecord {
            status: status_name(&outcome.status),
            bytes: outcome.data.len(),
            data: String::from_utf8_lossy(&outcome.data),
            error: match &outcome.status {
                ReadStatus::Failed(err) => Some(ErrorRecord {
                    code: err.code,
                    message: err.message.clone(),
                }),
                _ => None,
            },
        };
        serde_json::to_writer(&mut out, &record)?;
        writeln!(out)?;
    } else {
        out.write_all(&outcome.data)?;
        if kind == ReadKind::Line && outcome.is_complete() {
            writeln!(out)?;
        }
        match &outcome.status {
            ReadStatus::Complete => {}
            ReadStatus::Eof => eprintln!("fdstream: end of stream"),
            ReadStatus::TimedOut => eprintln!("fdstream: timed out"),
            ReadStatus::Failed(err) => eprintln!("fdstream: {err}"),
        }
    }
    out.flush()?;
    Ok(())
}

fn run_read(
    stream: &mut Stream,
    selector: &Selector,
    timeout: Option<i64>,
    repeat: usize,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let kind = selector.clone().into_kind()?;
    for _ in 0..repeat {
        let outcome = stream.read_request(selector.clone(), timeout)?;
        tracing::debug!(
            status = status_name(&outcome.status),
            bytes = outcome.data.len(),
            "read finished"
        );
        print_outcome(&outcome, kind, json)?;
        match outcome.status {
            ReadStatus::Complete | ReadStatus::TimedOut => {}
            ReadStatus::Eof => break,
            ReadStatus::Failed(_) => return Ok(ExitCode::FAILURE),
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn access_name(mode: AccessMode) -> &'static str {
    match mode {
        AccessMode::ReadOnly => "read-only",
        AccessMode::WriteOnly => "write-only",
        AccessMode::ReadWrite => "read-write",
    }
}

fn probe(which: StdioDescriptor) -> anyhow::Result<ProbeRecord> {
    let fd = FileDescriptor::borrow_stdio(which);
    let non_blocking = fd
        .is_non_blocking()
        .with_context(|| format!("failed to query {which:?} blocking mode"))?;
    let access = fd
        .access_mode()
        .with_context(|| format!("failed to query {which:?} access mode"))?;
    Ok(ProbeRecord {
        fd: fdstream_core::Descriptor::raw_id(&fd),
        non_blocking,
        access: access_name(access),
    })
}

fn run_probe() -> anyhow::Result<ExitCode> {
    let report = ProbeReport {
        stdin: probe(StdioDescriptor::Stdin)?,
        stdout: probe(StdioDescriptor::Stdout)?,
    };
    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, &report)?;
    writeln!(out)?;
    Ok(ExitCode::SUCCESS)
}
