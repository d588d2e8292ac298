use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use logbox::config::{ByteSize, Config, FileMode};
use std::net::SocketAddr;
use std::path::PathBuf;

const TIME_FORMAT_HELP: &str = "\
TIME FORMAT (history-path):
    %Y  year (2006)
    %M  month, zero padded (01, 12)
    %D  day, zero padded (01, 31)
    %h  hour, zero padded (00, 23)
    %m  minute, zero padded (00, 59)
    %s  second, zero padded (00, 59)
    %Z  zone offset (+0700, -0330); without it times are UTC

ENVIRONMENT:
    LOGBOX_CONFIG                  config file path
    LOGBOX__OUTPUT__PATH           active log file
    LOGBOX__ROTATION__<KEY>        any [rotation] key, e.g. LOGBOX__ROTATION__MAX_SIZE=50M
    RUST_LOG                       log filter for diagnostics on stderr";

#[derive(Parser, Debug)]
#[command(name = "logbox", version)]
#[command(about = "Rotating log writer", long_about = None, after_long_help = TIME_FORMAT_HELP)]
pub struct Cli {
    /// Config file (default: $LOGBOX_CONFIG or ./logbox.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Copy STDIN into OUT, echoing it to STDOUT
    Write(WriteArgs),
    /// Write everything received on the configured listeners into OUT
    Serve(ServeArgs),
    /// List compressed history entries, newest first
    History(HistoryArgs),
    /// Rotate OUT now and wait for compression
    Rotate(TargetArgs),
    /// Print the resolved configuration
    Config(TargetArgs),
}

#[derive(clap::Args, Debug)]
pub struct TargetArgs {
    /// Active log file (overrides output.path)
    pub out: Option<PathBuf>,

    #[command(flatten)]
    pub rotation: RotationArgs,
}

/// Overrides for the `[rotation]` section
#[derive(clap::Args, Debug, Default)]
pub struct RotationArgs {
    /// History root; `{out}` expands to the output path
    #[arg(long, short = 'r')]
    pub history_dir: Option<String>,

    /// Directory template inside the history root
    #[arg(long, short = 'p')]
    pub history_path: Option<String>,

    /// Y yearly, M monthly, W weekly, D daily, h hourly, m minutely
    #[arg(long, short = 'd')]
    pub duration: Option<String>,

    /// Rotate past this size (100, 100K, 50M, 1G); negative disables
    #[arg(long, short = 'S', allow_hyphen_values = true)]
    pub max_size: Option<ByteSize>,

    /// Compressed entries to keep; 0 keeps all
    #[arg(long, short = 'C', allow_hyphen_values = true)]
    pub history_count: Option<i64>,

    /// Octal mode for created files (0640)
    #[arg(long, short = 'm')]
    pub file_mode: Option<FileMode>,

    /// Octal mode for created directories (0750)
    #[arg(long, short = 'M')]
    pub dir_mode: Option<FileMode>,
}

#[derive(clap::Args, Debug)]
pub struct WriteArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Do not echo input to STDOUT
    #[arg(long)]
    pub silent: bool,
}

#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// TCP address to accept streams on (repeatable)
    #[arg(long)]
    pub tcp: Vec<SocketAddr>,

    /// UDP address to receive datagrams on (repeatable)
    #[arg(long)]
    pub udp: Vec<SocketAddr>,

    /// HTTP address to accept POST bodies on (repeatable)
    #[arg(long)]
    pub http: Vec<SocketAddr>,
}

#[derive(clap::Args, Debug)]
pub struct HistoryArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Only entries at or after this RFC 3339 instant
    #[arg(long)]
    pub from: Option<DateTime<Utc>>,

    /// Only entries at or before this RFC 3339 instant
    #[arg(long)]
    pub to: Option<DateTime<Utc>>,

    /// Print JSON instead of one line per entry
    #[arg(long)]
    pub json: bool,
}

impl TargetArgs {
    /// Apply command line overrides on top of loaded configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(out) = &self.out {
            config.output.path = Some(out.clone());
        }

        let args = &self.rotation;
        let rotation = &mut config.rotation;
        if let Some(dir) = &args.history_dir {
            rotation.history_dir = dir.clone();
        }
        if let Some(path) = &args.history_path {
            rotation.history_path = path.clone();
        }
        if let Some(duration) = &args.duration {
            rotation.duration = duration.clone();
        }
        if let Some(size) = args.max_size {
            rotation.max_size = size;
        }
        if let Some(count) = args.history_count {
            rotation.history_count = count;
        }
        if args.file_mode.is_some() {
            rotation.file_mode = args.file_mode;
        }
        if args.dir_mode.is_some() {
            rotation.dir_mode = args.dir_mode;
        }
    }
}

impl ServeArgs {
    /// Listeners given on the command line replace the configured ones
    pub fn apply(&self, config: &mut Config) {
        self.target.apply(config);
        if !(self.tcp.is_empty() && self.udp.is_empty() && self.http.is_empty()) {
            config.listen.tcp = self.tcp.clone();
            config.listen.udp = self.udp.clone();
            config.listen.http = self.http.clone();
        }
    }
}
