//! `ttyreplay` command-line player.
//!
//! ```text
//! ttyreplay play session.json --speed 2
//! ttyreplay dump session.json --keystrokes
//! ttyreplay live ws://recorder:8080/socket 3f9c --secret hunter2
//! ```
//!
//! Keys while playing: space pauses/resumes, `n`/`p` step, `+`/`-` change
//! speed, `q` quits. The status line is shown in the terminal title.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use crossterm::event::{Event, EventStream};
use futures::StreamExt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ttyreplay::config::env::EnvConfig;
use ttyreplay::config::file::{self as config_file, FileConfig};
use ttyreplay::headless::{MemoryLog, MemoryRenderer};
use ttyreplay::terminal::{FileLog, RawModeGuard, TerminalRenderer, key_command, show_status};
use ttyreplay::transport::{AckSender, websocket};
use ttyreplay::{
    Acknowledge, Command, Engine, Feed, KeystrokeLog, PlaybackConfig, PlaybackError, Player,
    PlayerHandle, Request, Result, load_recording,
};

#[derive(Parser, Debug)]
#[command(
    name = "ttyreplay",
    about = "Replay recorded terminal sessions, or tail live ones",
    version
)]
struct Cli {
    /// Config file (default: ./ttyreplay.toml or ~/.config/ttyreplay/ttyreplay.toml)
    #[arg(long, global = true, env = "TTYREPLAY_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log filter when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long = "log-level", global = true, value_name = "FILTER")]
    log_level: Option<String>,

    /// Initial playback speed
    #[arg(long, global = true)]
    speed: Option<f64>,

    /// Cap pauses between events, in milliseconds
    #[arg(long = "max-idle-ms", global = true, value_name = "MS")]
    max_idle_ms: Option<u64>,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Play a recording file
    Play {
        /// Recording to play
        file: PathBuf,

        /// Write the keystroke log to this file
        #[arg(long, value_name = "PATH")]
        keystrokes: Option<PathBuf>,

        /// Resize the terminal window to follow the recording
        #[arg(long)]
        resize: bool,
    },

    /// Print the final terminal output of a recording
    Dump {
        /// Recording to dump
        file: PathBuf,

        /// Also print the keystroke log
        #[arg(long)]
        keystrokes: bool,
    },

    /// Tail a session from a recorder server
    Live {
        /// WebSocket URL of the recorder, e.g. ws://host:8080/socket
        url: String,

        /// Session key
        key: String,

        /// Viewer secret
        #[arg(long, env = "TTYREPLAY_SECRET")]
        secret: Option<String>,

        /// Download a finished session instead of tailing
        #[arg(long)]
        download: bool,

        /// Write the keystroke log to this file
        #[arg(long, value_name = "PATH")]
        keystrokes: Option<PathBuf>,
    },
}

fn config_dirs() -> Vec<PathBuf> {
    let cwd = std::env::current_dir().ok();
    let home = std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config/ttyreplay"));
    cwd.into_iter().chain(home).collect()
}

fn build_config(cli: &Cli) -> Result<PlaybackConfig> {
    let mut config = PlaybackConfig::default();

    let path = cli.config.clone().or_else(|| config_file::find(config_dirs()));
    if let Some(path) = path {
        config = FileConfig::load(&path)?.apply(config);
    }
    config = EnvConfig::default().apply(config);

    if let Some(speed) = cli.speed {
        config.speed = speed;
    }
    if let Some(ms) = cli.max_idle_ms {
        config.max_idle = Some(Duration::from_millis(ms));
    }
    if let Some(level) = &cli.log_level {
        config.log_level.clone_from(level);
    }
    Ok(config)
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| PlaybackError::config(format!("invalid log filter: {e}")))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| PlaybackError::config(e.to_string()))
}

/// Forward key presses to the player and mirror its status into the title.
async fn drive(handle: &PlayerHandle) -> Result<()> {
    let mut keys = EventStream::new();
    let mut status = handle.watch_status();
    let mut title = std::io::stdout();

    loop {
        tokio::select! {
            key = keys.next() => match key {
                Some(Ok(Event::Key(key))) => {
                    if let Some(command) = key_command(&key) {
                        let quit = command == Command::Shutdown;
                        handle.send(command).await?;
                        if quit {
                            return Ok(());
                        }
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(PlaybackError::io_context("reading keys", e)),
                None => return Ok(()),
            },
            changed = status.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let current = status.borrow_and_update().clone();
                show_status(&mut title, &current)?;
            }
        }
    }
}

async fn interactive<K, A>(
    player: Player<TerminalRenderer<std::io::Stdout>, K, A>,
    handle: PlayerHandle,
) -> Result<()>
where
    K: KeystrokeLog + 'static,
    A: Acknowledge + 'static,
{
    let _raw = RawModeGuard::enable()?;
    let task = player.spawn();

    let outcome = match handle.play().await {
        Ok(()) => drive(&handle).await,
        Err(e) => Err(e),
    };
    let _ = handle.shutdown().await;

    // The task's own error explains a stopped player better than the handle's.
    let engine = task
        .await
        .map_err(|e| PlaybackError::transport(format!("player task failed: {e}")))?;
    engine?;
    outcome
}

async fn play(
    config: PlaybackConfig,
    file: &Path,
    keystrokes: Option<&Path>,
    resize: bool,
) -> Result<()> {
    let recording = load_recording(file)?;
    if !recording.complete {
        warn!(path = %file.display(), "recording is still being written");
    }
    info!(events = recording.events.len(), "loaded recording");

    let renderer = TerminalRenderer::stdout(config.cell_metrics).resize_terminal(resize);
    match keystrokes {
        Some(path) => {
            let mut engine = Engine::replay(renderer, FileLog::create(path)?, config);
            engine.load(recording.events);
            let (player, handle) = Player::new(engine);
            interactive(player, handle).await
        }
        None => {
            let mut engine = Engine::replay(renderer, MemoryLog::new(), config);
            engine.load(recording.events);
            let (player, handle) = Player::new(engine);
            interactive(player, handle).await
        }
    }
}

async fn dump(config: PlaybackConfig, file: &Path, keystrokes: bool) -> Result<()> {
    let recording = load_recording(file)?;
    let renderer = MemoryRenderer::with_metrics(config.cell_metrics);
    let log = MemoryLog::new();

    let mut engine = Engine::replay(renderer.clone(), log.clone(), config);
    engine.load(recording.events);
    if let Some(last) = engine.events().len().checked_sub(1) {
        engine.move_to_event(last).await?;
    }
    info!(status = %engine.status(), "dumped recording");

    let mut out = std::io::stdout().lock();
    out.write_all(&renderer.output())?;
    if keystrokes {
        writeln!(out, "\r\n--- keystrokes ---")?;
        writeln!(out, "{}", log.text())?;
    }
    out.flush()?;
    Ok(())
}

async fn live(
    config: PlaybackConfig,
    url: &str,
    request: Request,
    download: bool,
    keystrokes: Option<&Path>,
) -> Result<()> {
    let feed = websocket::connect(url, &request).await?;
    let renderer = TerminalRenderer::stdout(config.cell_metrics);

    match keystrokes {
        Some(path) => {
            let log = FileLog::create(path)?;
            let (player, handle) = feed_player(renderer, log, feed, config, download);
            interactive(player, handle).await
        }
        None => {
            let (player, handle) = feed_player(renderer, MemoryLog::new(), feed, config, download);
            interactive(player, handle).await
        }
    }
}

fn feed_player<K: KeystrokeLog + 'static>(
    renderer: TerminalRenderer<std::io::Stdout>,
    log: K,
    feed: Feed,
    config: PlaybackConfig,
    download: bool,
) -> (Player<TerminalRenderer<std::io::Stdout>, K, AckSender>, PlayerHandle) {
    if download {
        Player::download(renderer, log, feed, config)
    } else {
        Player::live(renderer, log, feed, config)
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = build_config(&cli)?;
    init_logging(&config.log_level)?;

    match cli.action {
        Action::Play {
            file,
            keystrokes,
            resize,
        } => play(config, &file, keystrokes.as_deref(), resize).await,
        Action::Dump { file, keystrokes } => dump(config, &file, keystrokes).await,
        Action::Live {
            url,
            key,
            secret,
            download,
            keystrokes,
        } => {
            let request = match secret {
                Some(secret) => Request::viewer_get(secret, key),
                None => Request::get(key),
            };
            live(config, &url, request, download, keystrokes.as_deref()).await
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ttyreplay: {e}");
            ExitCode::FAILURE
        }
    }
}
