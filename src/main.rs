//! Terminal front end: loads the config, starts a session against Unsplash,
//! redraws on every state change and turns typed lines into commands.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use pelican_slideshow::config::Configuration;
use pelican_slideshow::session::SlideshowHandle;
use pelican_slideshow::source::UnsplashSource;
use pelican_slideshow::view::{self, Input};

#[derive(Debug, Parser)]
#[command(
    name = "pelican-slideshow",
    version,
    about = "Step through random pelican photos from Unsplash"
)]
struct Args {
    /// Path to YAML config; defaults are used when omitted
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Unsplash access key (overrides the config file)
    #[arg(long, env = "UNSPLASH_ACCESS_KEY", hide_env_values = true)]
    access_key: Option<String>,

    /// Override the auto-advance period, e.g. "2s" or "1500ms"
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    interval: Option<Duration>,

    /// Start playing once the first photo is shown
    #[arg(long)]
    autoplay: bool,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"))
        .add_directive(format!("pelican_slideshow={level}").parse()?);
    // Logs go to stderr so they do not interleave with the frames on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
    Ok(())
}

fn load_config(args: &Args) -> Result<Configuration> {
    let mut cfg = match &args.config {
        Some(path) => Configuration::from_yaml_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Configuration::default(),
    };
    if let Some(key) = &args.access_key {
        cfg.access_key = Some(key.clone());
    }
    if let Some(interval) = args.interval {
        cfg.interval = interval;
    }
    cfg.autoplay |= args.autoplay;
    cfg.validated().context("invalid configuration values")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose)?;

    let cfg = load_config(&args)?;
    tracing::info!("configuration: {cfg:#?}");

    let source = Arc::new(UnsplashSource::new(&cfg).context("failed to build http client")?);
    let cancel = CancellationToken::new();
    let (session, task) = SlideshowHandle::spawn_with_cancel(source, &cfg, cancel.clone());

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; shutting down");
            cancel.cancel();
        });
    }

    // Plain thread rather than spawn_blocking: a reader parked in `lines()`
    // must not hold up runtime shutdown after `q`.
    let (line_tx, mut line_rx) = mpsc::channel::<String>(16);
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if line_tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    tracing::warn!("stdin read failed: {err}");
                    break;
                }
            }
        }
    });

    session.load_initial().await?;
    if cfg.autoplay {
        session.play().await?;
    }

    let mut snapshots = session.subscribe();
    println!("{}", view::render(&snapshots.borrow_and_update()));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                println!("\n{}", view::render(&snapshots.borrow_and_update()));
            }

            maybe_line = line_rx.recv() => {
                let Some(line) = maybe_line else {
                    tracing::info!("stdin closed; shutting down");
                    break;
                };
                let command = match view::parse_input(&line) {
                    Some(Input::Quit) => break,
                    Some(Input::TogglePlay) => view::toggle_command(&session.snapshot()),
                    Some(Input::Command(command)) => command,
                    None => {
                        println!("unknown command {line:?}");
                        continue;
                    }
                };
                if view::available(command, &session.snapshot()) {
                    session.send(command).await?;
                } else {
                    println!("still loading; only pause is available");
                }
            }
        }
    }

    session.shutdown();
    task.await.context("session task panicked")??;
    Ok(())
}
