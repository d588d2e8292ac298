mod cli;
mod server;

use clap::Parser;
use cli::{Cli, Commands, HistoryArgs, TargetArgs, WriteArgs};
use logbox::config::{Config, ConfigError, validation};
use logbox::rotation::Rotator;
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

const STDIN_BUFFER_SIZE: usize = 64 * 1024;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    // Stdout carries the tee and command output, diagnostics go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Write(args) => {
            let config = load_config(cli.config.as_deref(), |c| {
                args.target.apply(c);
                if args.silent {
                    c.output.silent = true;
                }
            })?;
            let rotator = build_rotator(&config)?;
            let silent = config.output.silent;
            tokio::task::spawn_blocking(move || write_stdin(&rotator, silent)).await??;
        }
        Commands::Serve(args) => {
            let config = load_config(cli.config.as_deref(), |c| args.apply(c))?;
            let rotator = Arc::new(build_rotator(&config)?);
            server::run(config.listen, rotator).await?;
        }
        Commands::History(args) => history(cli.config.as_deref(), &args)?,
        Commands::Rotate(args) => {
            let config = load_config(cli.config.as_deref(), |c| args.apply(c))?;
            let rotator = build_rotator(&config)?;
            tokio::task::spawn_blocking(move || rotate(&rotator)).await??;
        }
        Commands::Config(args) => print_config(cli.config.as_deref(), &args)?,
    }

    Ok(())
}

fn load_config(
    path: Option<&Path>,
    overrides: impl FnOnce(&mut Config),
) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let _ = dotenvy::dotenv();
            Config::load_from_path(path.to_path_buf())?
        }
        None => Config::load()?,
    };
    overrides(&mut config);
    validation::validate(&config)?;
    Ok(config)
}

fn build_rotator(config: &Config) -> Result<Rotator, AnyError> {
    let rotator = Rotator::new(config.output_path()?, config.rotation_options()?)?;
    Ok(rotator)
}

/// Copy stdin into the rotator until EOF, optionally echoing to stdout
fn write_stdin(rotator: &Rotator, silent: bool) -> io::Result<()> {
    let mut input = io::stdin().lock();
    let mut stdout = io::stdout().lock();
    let mut buf = vec![0u8; STDIN_BUFFER_SIZE];

    loop {
        let n = match input.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        rotator.write(&buf[..n])?;
        if !silent {
            stdout.write_all(&buf[..n])?;
            stdout.flush()?;
        }
    }

    rotator.close()?;
    Ok(())
}

fn rotate(rotator: &Rotator) -> Result<(), AnyError> {
    match rotator.rotate()? {
        Some(entry) => {
            rotator.close()?;
            // Report the compressed file when compression finished
            let at = Some(entry.timestamp());
            let retired = rotator.history(at, at)?.into_iter().next().unwrap_or(entry);
            println!("{}", retired.abs_path().display());
        }
        None => {
            rotator.close()?;
            return Err(format!("rotation of {} was abandoned", rotator.path().display()).into());
        }
    }
    Ok(())
}

fn history(path: Option<&Path>, args: &HistoryArgs) -> Result<(), AnyError> {
    let config = load_config(path, |c| args.target.apply(c))?;
    let rotator = build_rotator(&config)?;
    let entries = rotator.history(args.from, args.to)?;

    if args.json {
        let listing: Vec<_> = entries
            .iter()
            .map(|entry| {
                serde_json::json!({
                    "timestamp": entry.timestamp().to_rfc3339(),
                    "path": entry.abs_path(),
                    "compressed": entry.is_compressed(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&listing)?);
    } else {
        for entry in &entries {
            println!("{}\t{}", entry.timestamp().to_rfc3339(), entry.abs_path().display());
        }
    }

    info!(entries = entries.len(), "History listed");
    Ok(())
}

fn print_config(path: Option<&Path>, args: &TargetArgs) -> Result<(), AnyError> {
    let config = load_config(path, |c| args.apply(c))?;
    // Options are resolved only to surface errors before printing
    if config.output.path.is_some() {
        config.rotation_options()?;
    }
    print!("{}", config.to_toml()?);
    Ok(())
}
