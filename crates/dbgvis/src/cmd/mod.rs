use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use dbgvis_session::{RunMode, SessionConfig};

use crate::exit::{session_error, CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod info;
pub mod play;
pub mod serve;
pub mod version;
pub mod view;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Listen for a viewer and stream a demo scene to it.
    Serve(ServeArgs),
    /// Connect to a producer and print the frames it sends.
    View(ViewArgs),
    /// Print frames from a recording.
    Play(PlayArgs),
    /// Summarize the frame index of a recording.
    Info(InfoArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::View(args) => view::run(args, format),
        Command::Play(args) => play::run(args, format),
        Command::Info(args) => info::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Connection and recording options shared by `serve` and `view`.
#[derive(Args, Debug, Default)]
pub struct SessionArgs {
    /// JSON session configuration; flags override its values.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Host to listen on or connect to.
    #[arg(long, env = "DBGVIS_HOST")]
    pub host: Option<String>,
    /// TCP port.
    #[arg(long, short = 'p', env = "DBGVIS_PORT")]
    pub port: Option<u16>,
    /// Name announced to the peer.
    #[arg(long)]
    pub app_name: Option<String>,
    /// Record the primitive stream to this file.
    #[arg(long, value_name = "FILE")]
    pub stream_file: Option<PathBuf>,
    /// Record received remote commands to this file.
    #[arg(long, value_name = "FILE")]
    pub command_record_file: Option<PathBuf>,
}

impl SessionArgs {
    /// Build the session configuration for `mode`.
    pub fn to_config(&self, mode: RunMode) -> CliResult<SessionConfig> {
        let mut config = match &self.config {
            Some(path) => SessionConfig::from_json_file(path)
                .map_err(|err| session_error("config load failed", err))?,
            None => SessionConfig::default(),
        };
        config.mode = mode;
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(name) = &self.app_name {
            config.app_name = name.clone();
        }
        if self.stream_file.is_some() {
            config.stream_file = self.stream_file.clone();
        }
        if self.command_record_file.is_some() {
            config.command_record_file = self.command_record_file.clone();
        }
        config
            .validate()
            .map_err(|err| session_error("invalid configuration", err))?;
        Ok(config)
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub session: SessionArgs,
    /// Exit after N frames have been acknowledged.
    #[arg(long)]
    pub frames: Option<u32>,
    /// Time between frames, in milliseconds.
    #[arg(long, default_value = "16")]
    pub interval_ms: u64,
}

#[derive(Args, Debug)]
pub struct ViewArgs {
    #[command(flatten)]
    pub session: SessionArgs,
    /// Exit after printing N frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// How long to keep retrying the connection (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    /// Send a command to the producer once connected. Repeatable.
    #[arg(long = "command", value_name = "COMMAND")]
    pub commands: Vec<String>,
}

#[derive(Args, Debug)]
pub struct PlayArgs {
    /// Recording to play.
    pub path: PathBuf,
    /// First frame to print.
    #[arg(long, default_value = "0")]
    pub from: usize,
    /// Print at most N frames.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Recording to inspect.
    pub path: PathBuf,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse durations like `5s`, `500ms` or a bare number of seconds.
pub fn parse_timeout(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "timeout must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid timeout value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "timeout must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

/// Flag cleared by Ctrl-C.
pub fn install_ctrlc_handler() -> CliResult<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        flag.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;
    Ok(running)
}
