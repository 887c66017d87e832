//! The session playback engine.
//!
//! An [`Engine`] owns the event sequence and a cursor into it. Each step
//! applies the event under the cursor to in-memory state (metadata, output
//! buffers, a pending resize), flushes the buffers to the renderer and
//! keystroke log, and arms the timer for the next event. The engine never
//! sleeps itself: it exposes the armed deadline and something else (the
//! [`player`](crate::player), or a test) calls
//! [`process_next_event`](Engine::process_next_event) when it passes.
//!
//! # Replay and live feeds
//!
//! A replay ends at its last event or at a `session-stop`. A live feed has
//! no end: when the cursor catches up the engine goes idle until more events
//! are [loaded](Engine::load). Each live event is acknowledged once the flush
//! that made it visible has completed, which is what paces the sender.
//!
//! # Seeking
//!
//! [`move_to_event`](Engine::move_to_event) rebuilds the state after a given
//! event without pacing and with a single flush. Forward seeks apply only the
//! events between the cursor and the target; backward seeks reset the
//! renderer to its initial size and replay from the first event. Seeking
//! never acknowledges: live events are counted once, the first time they are
//! applied or played past, however often a seek replays them.

mod status;
mod timer;

use std::mem;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace, warn};

pub use status::{PlaybackState, PlaybackStatus};
pub use timer::ArmedTimer;

use crate::config::PlaybackConfig;
use crate::error::Result;
use crate::event::{Direction, EventKind, RequestKind, SessionEvent};
use crate::keystrokes::escape_keystrokes;
use crate::metadata::{SessionMetadata, TerminalType};
use crate::render::{CellMetrics, Geometry, KeystrokeLog, Renderer};
use crate::transport::{Acknowledge, NoAck};

/// Result of applying one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Keep going.
    Continue,
    /// The event was a `session-stop`.
    Stop,
}

/// Output accumulated between flushes.
#[derive(Debug, Default)]
struct Buffers {
    terminal: Vec<u8>,
    /// Already escaped, one event at a time.
    keystrokes: String,
    resize: Option<Geometry>,
}

impl Buffers {
    fn clear(&mut self) {
        self.terminal.clear();
        self.keystrokes.clear();
        self.resize = None;
    }
}

/// Append server output, turning bare `\n` into `\r\n`.
fn push_normalized(buf: &mut Vec<u8>, data: &[u8]) {
    let mut prev = None;
    for &byte in data {
        if byte == b'\n' && prev != Some(b'\r') {
            buf.push(b'\r');
        }
        buf.push(byte);
        prev = Some(byte);
    }
}

/// Apply one event to metadata and buffers.
fn apply(
    event: &SessionEvent,
    session: &mut SessionMetadata,
    buffers: &mut Buffers,
    metrics: CellMetrics,
) -> Applied {
    trace!(%event, "applying event");
    match &event.kind {
        EventKind::SessionStart(start) => session.merge_start(start),
        EventKind::WindowResize(resize) => {
            session.merge_resize(resize);
            buffers.resize = Some(metrics.geometry(resize.term_rows, resize.term_cols));
        }
        EventKind::Message(message) => match message.decode() {
            Ok(data) => match message.direction {
                Direction::Incoming => push_normalized(&mut buffers.terminal, &data),
                Direction::Outgoing if data.as_slice() == [0] => {}
                Direction::Outgoing => buffers.keystrokes.push_str(&escape_keystrokes(&data)),
                Direction::Other => {}
            },
            Err(err) => warn!(%event, %err, "skipping undecodable message"),
        },
        EventKind::Request(request) => match request.kind() {
            RequestKind::Exec => {
                session.terminal_type = Some(TerminalType::Exec);
                match request.exec_command() {
                    Ok(command) => buffers.keystrokes.push_str(&escape_keystrokes(&command)),
                    Err(err) => warn!(%event, %err, "skipping undecodable exec request"),
                }
            }
            RequestKind::Pty => session.terminal_type = Some(TerminalType::Pty),
            RequestKind::Other => {}
        },
        EventKind::SessionStop => return Applied::Stop,
        EventKind::Unknown => {}
    }
    Applied::Continue
}

/// The playback engine.
///
/// `R` draws the terminal, `K` shows keystrokes and `A` acknowledges live
/// events back to the feed.
#[derive(Debug)]
pub struct Engine<R, K, A = NoAck> {
    config: PlaybackConfig,
    renderer: R,
    log: K,
    acks: A,
    events: Vec<SessionEvent>,
    index: usize,
    paused: bool,
    speed: f64,
    session: SessionMetadata,
    buffers: Buffers,
    timer: Option<ArmedTimer>,
    saved_delay: Duration,
    stopped: bool,
    pending_acks: usize,
    /// Live events `..acked` have been counted for acknowledgement.
    acked: usize,
}

impl<R: Renderer, K: KeystrokeLog> Engine<R, K, NoAck> {
    /// Create an engine for recordings, which need no acknowledgements.
    pub fn replay(renderer: R, log: K, config: PlaybackConfig) -> Self {
        Self::new(renderer, log, NoAck, config)
    }
}

impl<R: Renderer, K: KeystrokeLog, A: Acknowledge> Engine<R, K, A> {
    /// Create a paused engine with no events.
    pub fn new(renderer: R, log: K, acks: A, config: PlaybackConfig) -> Self {
        let speed = config.clamp_speed(config.speed);
        Self {
            config,
            renderer,
            log,
            acks,
            events: Vec::new(),
            index: 0,
            paused: true,
            speed,
            session: SessionMetadata::default(),
            buffers: Buffers::default(),
            timer: None,
            saved_delay: Duration::ZERO,
            stopped: false,
            pending_acks: 0,
            acked: 0,
        }
    }

    /// The renderer.
    pub const fn renderer(&self) -> &R {
        &self.renderer
    }

    /// The keystroke log.
    pub const fn keystroke_log(&self) -> &K {
        &self.log
    }

    /// The acknowledger.
    pub const fn acknowledger(&self) -> &A {
        &self.acks
    }

    /// The configuration.
    pub const fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    /// All loaded events.
    pub fn events(&self) -> &[SessionEvent] {
        &self.events
    }

    /// Index of the next event to apply.
    pub const fn event_index(&self) -> usize {
        self.index
    }

    /// Current speed multiplier.
    pub const fn speed(&self) -> f64 {
        self.speed
    }

    /// Session metadata gathered so far.
    pub const fn session(&self) -> &SessionMetadata {
        &self.session
    }

    /// Whether the feed is live.
    pub const fn is_live(&self) -> bool {
        self.session.live
    }

    /// Whether playback is paused. Ended playback also counts as paused.
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether a replay has played out.
    pub fn is_ended(&self) -> bool {
        !self.is_live() && (self.index >= self.events.len() || self.stopped)
    }

    /// The armed timer, if any.
    pub const fn timer(&self) -> Option<ArmedTimer> {
        self.timer
    }

    /// When the armed timer fires.
    pub fn deadline(&self) -> Option<Instant> {
        self.timer.map(|timer| timer.deadline())
    }

    /// Remaining delay captured by the last pause or seek.
    pub const fn saved_delay(&self) -> Duration {
        self.saved_delay
    }

    /// Time until the armed timer fires, zero when none is armed.
    pub fn time_to_next_event(&self) -> Duration {
        self.timer.map_or(Duration::ZERO, |timer| timer.remaining())
    }

    /// Live events applied but not yet acknowledged.
    pub const fn pending_acks(&self) -> usize {
        self.pending_acks
    }

    /// Whether a live feed has events waiting and nothing scheduled.
    ///
    /// While paused only events never applied before qualify, so a seek
    /// back into a live session stays where it was put.
    pub fn wants_step(&self) -> bool {
        self.is_live()
            && self.timer.is_none()
            && self.index < self.events.len()
            && (!self.paused || self.index >= self.acked)
    }

    /// Current state.
    pub fn state(&self) -> PlaybackState {
        if self.is_ended() {
            PlaybackState::Ended
        } else if self.paused {
            PlaybackState::Paused
        } else {
            PlaybackState::Playing
        }
    }

    /// Snapshot for status displays.
    pub fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            event_index: self.index,
            event_count: self.events.len(),
            time_to_next_event: self.time_to_next_event(),
            speed: self.speed,
            state: self.state(),
            live: self.session.live,
            feed: self.session.feed,
            terminal_type: self.session.terminal_type,
            client_host: self.session.client_host.clone(),
            server_host: self.session.server_host.clone(),
        }
    }

    /// Append events to the sequence.
    pub fn load(&mut self, events: impl IntoIterator<Item = SessionEvent>) {
        let before = self.events.len();
        self.events.extend(events);
        debug!(
            added = self.events.len() - before,
            total = self.events.len(),
            "loaded events"
        );
    }

    /// Apply one event to the engine state without flushing.
    pub fn action_event(&mut self, event: &SessionEvent) -> Applied {
        let metrics = self.renderer.cell_metrics();
        apply(event, &mut self.session, &mut self.buffers, metrics)
    }

    /// Apply the event at `index` from the sequence.
    fn apply_at(&mut self, index: usize) -> Applied {
        let metrics = self.renderer.cell_metrics();
        let applied = apply(
            &self.events[index],
            &mut self.session,
            &mut self.buffers,
            metrics,
        );
        if applied == Applied::Stop && !self.session.live {
            self.stopped = true;
        }
        applied
    }

    /// Commit buffered output.
    ///
    /// A pending resize goes first, then keystrokes, then terminal bytes.
    /// Returns once the renderer has consumed the terminal bytes.
    pub async fn write_buffers(&mut self) -> Result<()> {
        if let Some(geometry) = self.buffers.resize.take() {
            self.renderer.resize(geometry)?;
        }
        if !self.buffers.keystrokes.is_empty() {
            let keystrokes = mem::take(&mut self.buffers.keystrokes);
            self.log.append(&keystrokes)?;
        }
        if !self.buffers.terminal.is_empty() {
            let terminal = mem::take(&mut self.buffers.terminal);
            self.renderer.write(&terminal).await?;
        }
        Ok(())
    }

    /// Count live events before `end` for acknowledgement. Each event is
    /// counted at most once, however often seeks replay it.
    fn count_acks_until(&mut self, end: usize) {
        if self.is_live() && end > self.acked {
            self.pending_acks += end - self.acked;
            self.acked = end;
        }
    }

    async fn send_acks(&mut self) {
        while self.pending_acks > 0 {
            if let Err(err) = self.acks.ack().await {
                warn!(%err, pending = self.pending_acks, "dropping acknowledgements");
                self.pending_acks = 0;
                return;
            }
            self.pending_acks -= 1;
        }
    }

    /// Acknowledge `count` events on receipt rather than on playback.
    ///
    /// Used when downloading a finished session over a transport that
    /// expects an acknowledgement per event.
    pub async fn acknowledge_receipt(&mut self, count: usize) {
        for _ in 0..count {
            if let Err(err) = self.acks.ack().await {
                warn!(%err, "download acknowledgement failed");
                return;
            }
        }
    }

    /// Scaled delay between two events of the sequence.
    fn gap(&self, from: usize, to: usize) -> Duration {
        let (Some(from), Some(to)) = (self.events.get(from), self.events.get(to)) else {
            return Duration::ZERO;
        };
        let millis = (to.offset.saturating_sub(from.offset) as f64 / self.speed)
            .round()
            .max(0.0);
        let delay = Duration::from_millis(millis as u64);
        match self.config.max_idle {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    fn arm(&mut self, delay: Duration) {
        debug!(index = self.index, ?delay, "arming timer");
        self.timer = Some(ArmedTimer::start(delay));
    }

    /// Arm for the event under the cursor, or settle if there is none.
    fn schedule_next(&mut self) {
        if self.stopped {
            debug!(index = self.index, "session stopped");
            self.paused = true;
        } else if self.index < self.events.len() {
            let delay = self.gap(self.index - 1, self.index);
            self.arm(delay);
        } else if !self.is_live() {
            debug!("replay ended");
            self.paused = true;
        }
    }

    /// Take one scheduling step.
    ///
    /// Called when the timer fires, and for live feeds when events arrive
    /// while idle. A paused replay does nothing; a paused live feed applies
    /// the event but holds its output (and acknowledgement) until
    /// [`play`](Self::play).
    pub async fn process_next_event(&mut self) -> Result<()> {
        self.timer = None;
        if self.paused && !self.is_live() {
            return Ok(());
        }

        if self.index < self.events.len() {
            self.apply_at(self.index);
            self.count_acks_until(self.index + 1);
            if self.paused {
                self.index += 1;
                return Ok(());
            }
            self.write_buffers().await?;
            self.send_acks().await;
            self.index += 1;
            self.schedule_next();
        } else if !self.is_live() {
            self.paused = true;
        }
        Ok(())
    }

    /// Stop applying events, remembering how long was left on the timer.
    pub fn pause(&mut self) {
        if self.paused {
            return;
        }
        self.paused = true;
        if let Some(timer) = self.timer.take() {
            self.saved_delay = timer.remaining();
        }
        debug!(index = self.index, saved = ?self.saved_delay, "paused");
    }

    /// Resume playback.
    ///
    /// Output and acknowledgements held while paused are flushed first; the
    /// timer is then re-armed with the delay saved at pause. An ended replay
    /// only flushes.
    pub async fn play(&mut self) -> Result<()> {
        if !self.paused {
            return Ok(());
        }
        if self.is_ended() {
            return self.write_buffers().await;
        }
        self.paused = false;
        self.count_acks_until(self.index);
        self.write_buffers().await?;
        self.send_acks().await;
        if self.index < self.events.len() {
            let delay = mem::take(&mut self.saved_delay);
            self.arm(delay);
        }
        Ok(())
    }

    /// Pause if playing, play if paused.
    pub async fn toggle(&mut self) -> Result<()> {
        if self.paused {
            self.play().await
        } else {
            self.pause();
            Ok(())
        }
    }

    /// Change speed, rescaling the time left until the next event.
    pub async fn change_speed(&mut self, speed: f64) -> Result<()> {
        let speed = self.config.clamp_speed(speed);
        if self.paused {
            self.speed = speed;
            return Ok(());
        }
        let old = self.speed;
        self.pause();
        self.speed = speed;
        self.saved_delay = self.saved_delay.mul_f64(old / speed);
        debug!(old, new = speed, "speed changed");
        self.play().await
    }

    /// Speed up by one step.
    pub async fn increase_speed(&mut self) -> Result<()> {
        self.change_speed(self.speed + self.config.speed_step).await
    }

    /// Slow down by one step.
    pub async fn decrease_speed(&mut self) -> Result<()> {
        self.change_speed(self.speed - self.config.speed_step).await
    }

    /// Show the state right after event `target`, paused.
    ///
    /// Does nothing when `target` is out of range or is the event applied
    /// last. Never acknowledges; live events skipped over are acknowledged
    /// on the next [`play`](Self::play).
    pub async fn move_to_event(&mut self, target: usize) -> Result<()> {
        if target >= self.events.len() || self.index.checked_sub(1) == Some(target) {
            return Ok(());
        }
        self.pause();
        self.timer = None;

        let live = self.is_live();
        let from = if target >= self.index {
            self.index
        } else {
            self.renderer.reset()?;
            self.log.clear()?;
            self.buffers.clear();
            self.buffers.resize = Some(self.config.initial_geometry);
            self.session = self.session.mode_only();
            self.stopped = false;
            0
        };
        debug!(from, target, "seeking");

        let metrics = self.renderer.cell_metrics();
        for event in &self.events[from..=target] {
            if apply(event, &mut self.session, &mut self.buffers, metrics) == Applied::Stop && !live
            {
                self.stopped = true;
            }
        }
        self.write_buffers().await?;

        self.index = target + 1;
        self.saved_delay = self.gap(target, self.index);
        Ok(())
    }

    /// Step forward one event.
    pub async fn next(&mut self) -> Result<()> {
        self.move_to_event(self.index).await
    }

    /// Step back one event.
    pub async fn prev(&mut self) -> Result<()> {
        match self.index.checked_sub(2) {
            Some(target) => self.move_to_event(target).await,
            None => Ok(()),
        }
    }

    /// Treat the feed as a live tail.
    pub const fn set_live(&mut self) {
        self.session.set_live();
    }

    /// The live feed is gone; play out what was received as a replay.
    pub fn set_disconnected(&mut self) {
        self.session.set_disconnected();
        self.pending_acks = 0;
        if self.paused || self.timer.is_some() {
            return;
        }
        if self.index < self.events.len() {
            self.arm(Duration::ZERO);
        } else {
            self.paused = true;
        }
    }

    /// Drop all events and state, and return the renderer to its initial
    /// size.
    pub fn reset(&mut self) -> Result<()> {
        self.timer = None;
        self.saved_delay = Duration::ZERO;
        self.events.clear();
        self.index = 0;
        self.paused = true;
        self.speed = self.config.clamp_speed(self.config.speed);
        self.session = SessionMetadata::default();
        self.buffers.clear();
        self.stopped = false;
        self.pending_acks = 0;
        self.acked = 0;
        self.renderer.reset()?;
        self.log.clear()?;
        self.renderer.resize(self.config.initial_geometry)?;
        debug!("engine reset");
        Ok(())
    }

    /// Give back the renderer, keystroke log and acknowledger.
    pub fn into_parts(self) -> (R, K, A) {
        (self.renderer, self.log, self.acks)
    }
}
