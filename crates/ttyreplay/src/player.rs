//! The player task.
//!
//! A [`Player`] owns an [`Engine`] and drives it from one loop that waits on
//! three things at once: operator commands from [`PlayerHandle`]s, the event
//! feed, and the engine's armed deadline. Every engine mutation happens in
//! that loop, so nothing else ever touches engine state, and the deadline is
//! read fresh on each iteration so a cancelled timer cannot fire.
//!
//! # Example
//!
//! ```no_run
//! use ttyreplay::headless::{MemoryLog, MemoryRenderer};
//! use ttyreplay::{Engine, PlaybackConfig, Player, SessionEvent};
//!
//! # async fn example() -> ttyreplay::Result<()> {
//! let engine = Engine::replay(MemoryRenderer::new(), MemoryLog::new(), PlaybackConfig::default());
//! let (player, handle) = Player::new(engine);
//! let task = player.spawn();
//!
//! handle.load(vec![SessionEvent::incoming(0, "hi"), SessionEvent::stop(10)]).await?;
//! handle.play().await?;
//! handle.shutdown().await?;
//! task.await.map_err(|e| ttyreplay::PlaybackError::transport(e.to_string()))??;
//! # Ok(())
//! # }
//! ```

use std::future;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::config::PlaybackConfig;
use crate::engine::{Engine, PlaybackStatus};
use crate::error::{PlaybackError, Result};
use crate::event::SessionEvent;
use crate::render::{KeystrokeLog, Renderer};
use crate::transport::{Acknowledge, AckSender, Feed, Inbound};

/// Command queue depth.
const COMMAND_CAPACITY: usize = 32;

/// Operator commands.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Resume playback.
    Play,
    /// Pause playback.
    Pause,
    /// Play if paused, pause if playing.
    Toggle,
    /// Step forward one event.
    Next,
    /// Step back one event.
    Prev,
    /// Show the state right after the given event.
    Seek(usize),
    /// Speed up by one step.
    IncreaseSpeed,
    /// Slow down by one step.
    DecreaseSpeed,
    /// Set an exact speed.
    SetSpeed(f64),
    /// Append events.
    Load(Vec<SessionEvent>),
    /// Treat the session as live.
    SetLive,
    /// The live session is gone.
    SetDisconnected,
    /// Clear everything.
    Reset,
    /// Stop the player task.
    Shutdown,
}

#[derive(Debug)]
struct Envelope {
    command: Command,
    done: oneshot::Sender<()>,
}

/// Control surface for a running [`Player`].
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    commands: mpsc::Sender<Envelope>,
    status: watch::Receiver<PlaybackStatus>,
}

impl PlayerHandle {
    /// Send a command and wait until the player has carried it out.
    pub async fn send(&self, command: Command) -> Result<()> {
        let (done, wait) = oneshot::channel();
        self.commands
            .send(Envelope { command, done })
            .await
            .map_err(|_| PlaybackError::PlayerStopped)?;
        wait.await.map_err(|_| PlaybackError::PlayerStopped)
    }

    /// Resume playback.
    pub async fn play(&self) -> Result<()> {
        self.send(Command::Play).await
    }

    /// Pause playback.
    pub async fn pause(&self) -> Result<()> {
        self.send(Command::Pause).await
    }

    /// Toggle between playing and paused.
    pub async fn toggle(&self) -> Result<()> {
        self.send(Command::Toggle).await
    }

    /// Step forward one event.
    pub async fn next(&self) -> Result<()> {
        self.send(Command::Next).await
    }

    /// Step back one event.
    pub async fn prev(&self) -> Result<()> {
        self.send(Command::Prev).await
    }

    /// Seek to just after event `index`.
    pub async fn seek(&self, index: usize) -> Result<()> {
        self.send(Command::Seek(index)).await
    }

    /// Speed up by one step.
    pub async fn increase_speed(&self) -> Result<()> {
        self.send(Command::IncreaseSpeed).await
    }

    /// Slow down by one step.
    pub async fn decrease_speed(&self) -> Result<()> {
        self.send(Command::DecreaseSpeed).await
    }

    /// Set an exact speed.
    pub async fn set_speed(&self, speed: f64) -> Result<()> {
        self.send(Command::SetSpeed(speed)).await
    }

    /// Append events.
    pub async fn load(&self, events: Vec<SessionEvent>) -> Result<()> {
        self.send(Command::Load(events)).await
    }

    /// Treat the session as live.
    pub async fn set_live(&self) -> Result<()> {
        self.send(Command::SetLive).await
    }

    /// Mark the live session as gone.
    pub async fn set_disconnected(&self) -> Result<()> {
        self.send(Command::SetDisconnected).await
    }

    /// Clear all events and state.
    pub async fn reset(&self) -> Result<()> {
        self.send(Command::Reset).await
    }

    /// Stop the player task.
    pub async fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown).await
    }

    /// Latest published status.
    #[must_use]
    pub fn status(&self) -> PlaybackStatus {
        self.status.borrow().clone()
    }

    /// Subscribe to status updates.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<PlaybackStatus> {
        self.status.clone()
    }
}

/// Drives an [`Engine`] from commands, a feed and the engine's timer.
#[derive(Debug)]
pub struct Player<R, K, A> {
    engine: Engine<R, K, A>,
    commands: mpsc::Receiver<Envelope>,
    feed: Option<mpsc::UnboundedReceiver<Inbound>>,
    status: watch::Sender<PlaybackStatus>,
}

impl<R, K> Player<R, K, AckSender>
where
    R: Renderer + 'static,
    K: KeystrokeLog + 'static,
{
    /// A player tailing a live feed.
    pub fn live(renderer: R, log: K, feed: Feed, config: PlaybackConfig) -> (Self, PlayerHandle) {
        let (inbound, acks) = feed.into_parts();
        let mut engine = Engine::new(renderer, log, acks, config);
        engine.set_live();
        let (player, handle) = Self::new(engine);
        (player.with_feed(inbound), handle)
    }

    /// A player downloading a finished session from a feed.
    ///
    /// Events are acknowledged as they arrive and playback starts once the
    /// `session-stop` is received.
    pub fn download(
        renderer: R,
        log: K,
        feed: Feed,
        config: PlaybackConfig,
    ) -> (Self, PlayerHandle) {
        let (inbound, acks) = feed.into_parts();
        let (player, handle) = Self::new(Engine::new(renderer, log, acks, config));
        (player.with_feed(inbound), handle)
    }
}

impl<R, K, A> Player<R, K, A>
where
    R: Renderer + 'static,
    K: KeystrokeLog + 'static,
    A: Acknowledge + 'static,
{
    /// Wrap an engine.
    pub fn new(engine: Engine<R, K, A>) -> (Self, PlayerHandle) {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (status_tx, status_rx) = watch::channel(engine.status());
        let player = Self {
            engine,
            commands: commands_rx,
            feed: None,
            status: status_tx,
        };
        let handle = PlayerHandle {
            commands: commands_tx,
            status: status_rx,
        };
        (player, handle)
    }

    /// Attach an event feed.
    #[must_use]
    pub fn with_feed(mut self, inbound: mpsc::UnboundedReceiver<Inbound>) -> Self {
        self.feed = Some(inbound);
        self
    }

    /// The engine being driven.
    pub const fn engine(&self) -> &Engine<R, K, A> {
        &self.engine
    }

    /// Run on a new task.
    pub fn spawn(self) -> JoinHandle<Result<Engine<R, K, A>>> {
        tokio::spawn(self.run())
    }

    /// Run until shut down or every handle is dropped, then give the engine
    /// back.
    ///
    /// Renderer failures end the loop with an error.
    pub async fn run(mut self) -> Result<Engine<R, K, A>> {
        loop {
            while self.engine.wants_step() {
                self.engine.process_next_event().await?;
            }
            self.publish();

            let deadline = self.engine.deadline();
            tokio::select! {
                biased;

                envelope = self.commands.recv() => {
                    let Some(Envelope { command, done }) = envelope else {
                        debug!("all player handles dropped");
                        break;
                    };
                    let shutdown = command == Command::Shutdown;
                    self.handle(command).await?;
                    self.publish();
                    let _ = done.send(());
                    if shutdown {
                        break;
                    }
                }
                () = wait_until(deadline) => {
                    self.engine.process_next_event().await?;
                }
                inbound = next_inbound(&mut self.feed) => {
                    self.on_inbound(inbound).await?;
                }
            }
        }

        self.publish();
        Ok(self.engine)
    }

    fn publish(&self) {
        self.status.send_replace(self.engine.status());
    }

    async fn handle(&mut self, command: Command) -> Result<()> {
        debug!(?command, "player command");
        match command {
            Command::Play => self.engine.play().await,
            Command::Pause => {
                self.engine.pause();
                Ok(())
            }
            Command::Toggle => self.engine.toggle().await,
            Command::Next => self.engine.next().await,
            Command::Prev => self.engine.prev().await,
            Command::Seek(index) => self.engine.move_to_event(index).await,
            Command::IncreaseSpeed => self.engine.increase_speed().await,
            Command::DecreaseSpeed => self.engine.decrease_speed().await,
            Command::SetSpeed(speed) => self.engine.change_speed(speed).await,
            Command::Load(events) => {
                self.engine.load(events);
                Ok(())
            }
            Command::SetLive => {
                self.engine.set_live();
                Ok(())
            }
            Command::SetDisconnected => {
                self.engine.set_disconnected();
                Ok(())
            }
            Command::Reset => self.engine.reset(),
            Command::Shutdown => Ok(()),
        }
    }

    async fn on_inbound(&mut self, inbound: Option<Inbound>) -> Result<()> {
        let Some(Inbound::Events(events)) = inbound else {
            debug!("feed closed");
            self.feed = None;
            self.engine.set_disconnected();
            return Ok(());
        };

        let stop = events.iter().any(SessionEvent::is_stop);
        let count = events.len();
        self.engine.load(events);

        if self.engine.is_live() {
            while self.engine.wants_step() {
                self.engine.process_next_event().await?;
            }
            if stop {
                self.engine.set_disconnected();
            }
        } else {
            self.engine.acknowledge_receipt(count).await;
            if stop {
                self.engine.play().await?;
            }
        }
        Ok(())
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => future::pending().await,
    }
}

async fn next_inbound(feed: &mut Option<mpsc::UnboundedReceiver<Inbound>>) -> Option<Inbound> {
    match feed {
        Some(inbound) => inbound.recv().await,
        None => future::pending().await,
    }
}
