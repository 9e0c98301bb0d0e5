//! The slideshow session: a bounded photo cache with a cursor, driven by user
//! commands, an auto-advance timer, and at most one outstanding fetch.
//!
//! The session runs as a single task that owns all state. Callers talk to it
//! through a [`SlideshowHandle`] and observe it through `watch` snapshots
//! published after every mutation.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use futures::FutureExt;
use futures::future::{BoxFuture, OptionFuture};
use tokio::select;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Configuration;
use crate::error::{SessionError, SourceError};
use crate::photo::Photo;
use crate::source::ImageSource;

/// Actions a presentation layer can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    LoadInitial,
    Next,
    Previous,
    Play,
    Pause,
}

/// Why a fetch was started; decides how its result lands in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Initial,
    Forward,
}

/// Outcome of a forward step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Forward {
    /// A fetch is already in flight; nothing changed.
    Ignored,
    /// Moved to the next cached photo without I/O.
    Advanced,
    /// At the newest photo; the caller must start a fetch.
    NeedsFetch,
}

/// Snapshot of a session. Cheap enough to clone on every change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideshowState {
    pub cache: VecDeque<Photo>,
    pub cursor: usize,
    pub is_playing: bool,
    pub is_loading: bool,
    pub last_error: Option<SessionError>,
    capacity: usize,
}

impl SlideshowState {
    /// Empty state holding at most `capacity` photos (clamped to at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            cache: VecDeque::with_capacity(capacity + 1),
            cursor: 0,
            is_playing: false,
            is_loading: false,
            last_error: None,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The photo under the cursor, if any has loaded.
    pub fn current(&self) -> Option<&Photo> {
        self.cache.get(self.cursor)
    }

    /// Claims the fetch slot for the first photo.
    ///
    /// Returns `false` when the cache already has photos or a fetch is in
    /// flight; the state is untouched in that case.
    pub fn begin_initial(&mut self) -> bool {
        if self.is_loading || !self.cache.is_empty() {
            return false;
        }
        self.is_loading = true;
        self.last_error = None;
        true
    }

    /// Moves forward within the cache, or claims the fetch slot when the
    /// cursor is on the newest photo.
    pub fn step_forward(&mut self) -> Forward {
        if self.is_loading {
            return Forward::Ignored;
        }
        if self.cursor + 1 < self.cache.len() {
            self.cursor += 1;
            self.last_error = None;
            return Forward::Advanced;
        }
        self.is_loading = true;
        self.last_error = None;
        Forward::NeedsFetch
    }

    /// Moves back one photo, or records [`SessionError::NoMoreImages`].
    pub fn step_back(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            self.last_error = None;
        } else {
            self.last_error = Some(SessionError::NoMoreImages);
        }
    }

    pub fn play(&mut self) {
        self.is_playing = true;
        self.last_error = None;
    }

    pub fn pause(&mut self) {
        self.is_playing = false;
    }

    /// Applies the result of the fetch started by [`begin_initial`] or
    /// [`step_forward`], releasing the fetch slot either way.
    ///
    /// A successful forward fetch appends, evicts from the front past the
    /// capacity, and puts the cursor on the new photo.
    ///
    /// [`begin_initial`]: Self::begin_initial
    /// [`step_forward`]: Self::step_forward
    pub fn complete_fetch(&mut self, kind: FetchKind, result: Result<Photo, SourceError>) {
        self.is_loading = false;
        match result {
            Ok(photo) => {
                match kind {
                    FetchKind::Initial => {
                        self.cache.clear();
                        self.cache.push_back(photo);
                    }
                    FetchKind::Forward => {
                        self.cache.push_back(photo);
                        while self.cache.len() > self.capacity {
                            self.cache.pop_front();
                        }
                    }
                }
                self.cursor = self.cache.len() - 1;
                self.last_error = None;
            }
            Err(err) => {
                self.last_error = Some(SessionError::from(&err));
            }
        }
    }
}

/// Periodic trigger for auto-advance. Disarmed means no tick will ever fire;
/// arming schedules the first tick one full period from now.
#[derive(Debug)]
pub struct AutoAdvance {
    period: Duration,
    interval: Option<Interval>,
}

impl AutoAdvance {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            interval: None,
        }
    }

    /// Starts ticking. A no-op while already armed, so the running schedule
    /// is kept.
    pub fn arm(&mut self) {
        if self.interval.is_none() {
            let mut interval = interval_at(Instant::now() + self.period, self.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            self.interval = Some(interval);
        }
    }

    /// Stops ticking. Safe to call any number of times.
    pub fn disarm(&mut self) {
        self.interval = None;
    }

    pub fn is_armed(&self) -> bool {
        self.interval.is_some()
    }

    /// Resolves on the next tick; never resolves while disarmed.
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending().await,
        }
    }
}

#[derive(Debug)]
struct Request {
    command: Command,
    applied: oneshot::Sender<()>,
}

struct InFlight {
    kind: FetchKind,
    fetch: BoxFuture<'static, Result<Photo, SourceError>>,
}

struct Session<S> {
    source: Arc<S>,
    state: SlideshowState,
    timer: AutoAdvance,
    in_flight: Option<InFlight>,
    snapshots: watch::Sender<SlideshowState>,
    /// `(cursor, cache length)` at the last publish.
    position: (usize, usize),
}

impl<S: ImageSource> Session<S> {
    fn apply(&mut self, command: Command) {
        debug!(?command, cursor = self.state.cursor, "applying command");
        match command {
            Command::LoadInitial => {
                if self.state.begin_initial() {
                    self.start_fetch(FetchKind::Initial);
                } else {
                    debug!("load-initial ignored");
                }
            }
            Command::Next => match self.state.step_forward() {
                Forward::Ignored => debug!("next ignored; fetch in flight"),
                Forward::Advanced => {}
                Forward::NeedsFetch => self.start_fetch(FetchKind::Forward),
            },
            Command::Previous => self.state.step_back(),
            Command::Play => self.state.play(),
            Command::Pause => self.state.pause(),
        }
        self.publish();
    }

    fn start_fetch(&mut self, kind: FetchKind) {
        let source = Arc::clone(&self.source);
        debug!(?kind, "starting fetch");
        self.in_flight = Some(InFlight {
            kind,
            fetch: async move { source.fetch_one().await }.boxed(),
        });
    }

    fn finish(&mut self, kind: FetchKind, result: Result<Photo, SourceError>) {
        match &result {
            Ok(photo) => info!(?kind, id = %photo.id, "photo fetched"),
            Err(err) => warn!(?kind, status = ?err.status_code(), "fetch failed: {err}"),
        }
        self.state.complete_fetch(kind, result);
        self.publish();
    }

    // Every mutation goes through here so the timer always matches the state.
    // Any move of the displayed photo restarts the period.
    fn publish(&mut self) {
        let position = (self.state.cursor, self.state.cache.len());
        let moved = position != self.position;
        self.position = position;
        if self.state.is_playing && !self.state.is_loading {
            if moved {
                self.timer.disarm();
            }
            self.timer.arm();
        } else {
            self.timer.disarm();
        }
        self.snapshots.send_replace(self.state.clone());
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Request>,
        cancel: CancellationToken,
    ) -> Result<()> {
        loop {
            select! {
                // Commands before ticks: a tick never fires after a pause
                // has been acknowledged.
                biased;

                _ = cancel.cancelled() => {
                    info!("cancel received; ending slideshow session");
                    break;
                }

                maybe_req = commands.recv() => match maybe_req {
                    Some(Request { command, applied }) => {
                        self.apply(command);
                        let _ = applied.send(());
                    }
                    None => {
                        info!("all handles dropped; ending slideshow session");
                        break;
                    }
                },

                Some(result) = OptionFuture::from(self.in_flight.as_mut().map(|f| &mut f.fetch)),
                    if self.in_flight.is_some() =>
                {
                    if let Some(InFlight { kind, .. }) = self.in_flight.take() {
                        self.finish(kind, result);
                    }
                }

                _ = self.timer.tick() => {
                    debug!("auto-advance tick");
                    self.apply(Command::Next);
                }
            }
        }
        self.timer.disarm();
        Ok(())
    }
}

/// Client side of a running session. Clones share the same session; the
/// session ends when every handle is dropped or [`shutdown`](Self::shutdown)
/// is called.
#[derive(Debug, Clone)]
pub struct SlideshowHandle {
    commands: mpsc::Sender<Request>,
    snapshots: watch::Receiver<SlideshowState>,
    cancel: CancellationToken,
}

impl SlideshowHandle {
    /// Spawns the session task on the current runtime.
    pub fn spawn<S: ImageSource>(
        source: Arc<S>,
        cfg: &Configuration,
    ) -> (Self, JoinHandle<Result<()>>) {
        Self::spawn_with_cancel(source, cfg, CancellationToken::new())
    }

    /// Like [`spawn`](Self::spawn), ending the session when `cancel` fires.
    pub fn spawn_with_cancel<S: ImageSource>(
        source: Arc<S>,
        cfg: &Configuration,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<Result<()>>) {
        let state = SlideshowState::new(cfg.cache_capacity);
        let (snap_tx, snap_rx) = watch::channel(state.clone());
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let session = Session {
            source,
            state,
            timer: AutoAdvance::new(cfg.interval),
            in_flight: None,
            snapshots: snap_tx,
            position: (0, 0),
        };
        let task = tokio::spawn(session.run(cmd_rx, cancel.clone()));
        let handle = Self {
            commands: cmd_tx,
            snapshots: snap_rx,
            cancel,
        };
        (handle, task)
    }

    /// Sends `command` and waits until the session has applied it. For
    /// commands that fetch, this returns once the fetch has started.
    pub async fn send(&self, command: Command) -> Result<()> {
        let (applied, ack) = oneshot::channel();
        self.commands
            .send(Request { command, applied })
            .await
            .map_err(|_| anyhow!("slideshow session has shut down"))?;
        ack.await
            .map_err(|_| anyhow!("slideshow session ended before applying {command:?}"))
    }

    pub async fn load_initial(&self) -> Result<()> {
        self.send(Command::LoadInitial).await
    }

    pub async fn next(&self) -> Result<()> {
        self.send(Command::Next).await
    }

    pub async fn previous(&self) -> Result<()> {
        self.send(Command::Previous).await
    }

    pub async fn play(&self) -> Result<()> {
        self.send(Command::Play).await
    }

    /// Stops auto-advance. No tick fires once this has returned.
    pub async fn pause(&self) -> Result<()> {
        self.send(Command::Pause).await
    }

    /// Latest published state.
    pub fn snapshot(&self) -> SlideshowState {
        self.snapshots.borrow().clone()
    }

    /// A receiver that is notified after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<SlideshowState> {
        self.snapshots.clone()
    }

    /// Waits until no fetch is in flight and returns that state.
    pub async fn settled(&self) -> Result<SlideshowState> {
        let mut rx = self.subscribe();
        let state = rx
            .wait_for(|s| !s.is_loading)
            .await
            .map_err(|_| anyhow!("slideshow session has shut down"))?;
        Ok(state.clone())
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photo::{PhotoUrls, PhotoUser};

    fn photo(id: &str) -> Photo {
        let url = format!("https://images.example.test/{id}");
        Photo {
            id: id.to_owned(),
            alt_description: None,
            description: None,
            urls: PhotoUrls {
                raw: url.clone(),
                full: url.clone(),
                regular: url.clone(),
                small: url.clone(),
                thumb: url,
            },
            user: PhotoUser {
                id: "u".into(),
                username: "u".into(),
                name: "U".into(),
            },
            width: 10,
            height: 10,
        }
    }

    fn ids(state: &SlideshowState) -> Vec<&str> {
        state.cache.iter().map(|p| p.id.as_str()).collect()
    }

    fn loaded(ids: &[&str]) -> SlideshowState {
        let mut state = SlideshowState::new(5);
        assert!(state.begin_initial());
        state.complete_fetch(FetchKind::Initial, Ok(photo(ids[0])));
        for id in &ids[1..] {
            assert_eq!(state.step_forward(), Forward::NeedsFetch);
            state.complete_fetch(FetchKind::Forward, Ok(photo(id)));
        }
        state
    }

    #[test]
    fn starts_empty() {
        let state = SlideshowState::new(5);
        assert!(state.cache.is_empty());
        assert_eq!(state.cursor, 0);
        assert!(!state.is_playing && !state.is_loading);
        assert!(state.last_error.is_none());
        assert!(state.current().is_none());
    }

    #[test]
    fn initial_load_is_single_shot() {
        let mut state = SlideshowState::new(5);
        assert!(state.begin_initial());
        assert!(state.is_loading);
        assert!(!state.begin_initial(), "second call while loading");
        state.complete_fetch(FetchKind::Initial, Ok(photo("a")));
        assert!(!state.is_loading);
        assert!(!state.begin_initial(), "cache already populated");
        assert_eq!(ids(&state), ["a"]);
        assert_eq!(state.cursor, 0);
    }

    #[test]
    fn initial_failure_keeps_cache_empty() {
        let mut state = SlideshowState::new(5);
        state.begin_initial();
        state.complete_fetch(
            FetchKind::Initial,
            Err(SourceError::Transport("API Error".into())),
        );
        assert!(!state.is_loading);
        assert!(state.cache.is_empty());
        assert_eq!(state.last_error.as_ref().unwrap().to_string(), "API Error");
        assert!(state.begin_initial(), "retry allowed after failure");
    }

    #[test]
    fn forward_uses_cache_before_fetching() {
        let mut state = loaded(&["a", "b", "c"]);
        state.step_back();
        state.step_back();
        assert_eq!(state.cursor, 0);
        assert_eq!(state.step_forward(), Forward::Advanced);
        assert_eq!(state.step_forward(), Forward::Advanced);
        assert!(!state.is_loading);
        assert_eq!(state.step_forward(), Forward::NeedsFetch);
        assert!(state.is_loading);
        assert_eq!(state.step_forward(), Forward::Ignored);
    }

    #[test]
    fn evicts_oldest_and_keeps_newest_five() {
        let state = loaded(&["p0", "p1", "p2", "p3", "p4", "p5", "p6"]);
        assert_eq!(ids(&state), ["p2", "p3", "p4", "p5", "p6"]);
        assert_eq!(state.cursor, 4);
        assert_eq!(state.current().unwrap().id, "p6");
    }

    #[test]
    fn forward_failure_leaves_cache_and_cursor() {
        let mut state = loaded(&["a", "b"]);
        assert_eq!(state.step_forward(), Forward::NeedsFetch);
        state.complete_fetch(
            FetchKind::Forward,
            Err(SourceError::Status {
                status: 500,
                reason: "Internal Server Error".into(),
            }),
        );
        assert_eq!(ids(&state), ["a", "b"]);
        assert_eq!(state.cursor, 1);
        assert!(matches!(
            state.last_error,
            Some(SessionError::Fetch {
                status: Some(500),
                ..
            })
        ));
    }

    #[test]
    fn forward_from_empty_cache_lands_on_valid_index() {
        let mut state = SlideshowState::new(5);
        assert_eq!(state.step_forward(), Forward::NeedsFetch);
        state.complete_fetch(FetchKind::Forward, Ok(photo("a")));
        assert_eq!(state.cursor, 0);
        assert_eq!(state.current().unwrap().id, "a");
    }

    #[test]
    fn back_at_oldest_reports_no_more_images() {
        let mut state = loaded(&["a"]);
        state.step_back();
        assert_eq!(state.cursor, 0);
        assert_eq!(state.last_error, Some(SessionError::NoMoreImages));
        assert_eq!(ids(&state), ["a"]);
    }

    #[test]
    fn successful_moves_clear_error() {
        let mut state = loaded(&["a", "b"]);
        state.step_back();
        state.step_back();
        assert!(state.last_error.is_some());
        state.step_forward();
        assert!(state.last_error.is_none());

        state.step_back();
        state.step_back();
        state.play();
        assert!(state.is_playing);
        assert!(state.last_error.is_none());
    }

    #[test]
    fn pause_is_idempotent() {
        let mut state = SlideshowState::new(5);
        state.pause();
        state.pause();
        assert!(!state.is_playing);
        state.play();
        state.pause();
        state.pause();
        assert!(!state.is_playing);
    }

    #[test]
    fn fetch_result_after_back_step_jumps_to_newest() {
        let mut state = loaded(&["a", "b"]);
        assert_eq!(state.step_forward(), Forward::NeedsFetch);
        state.step_back();
        assert_eq!(state.cursor, 0);
        state.complete_fetch(FetchKind::Forward, Ok(photo("c")));
        assert_eq!(state.cursor, 2);
        assert_eq!(state.current().unwrap().id, "c");
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut state = SlideshowState::new(0);
        assert_eq!(state.capacity(), 1);
        state.begin_initial();
        state.complete_fetch(FetchKind::Initial, Ok(photo("a")));
        state.step_forward();
        state.complete_fetch(FetchKind::Forward, Ok(photo("b")));
        assert_eq!(ids(&state), ["b"]);
        assert_eq!(state.cursor, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_waits_a_full_period_after_arming() {
        let mut timer = AutoAdvance::new(Duration::from_secs(2));
        assert!(!timer.is_armed());
        let start = Instant::now();
        timer.arm();
        timer.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(2));
        timer.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn disarmed_timer_never_fires() {
        let mut timer = AutoAdvance::new(Duration::from_millis(10));
        timer.arm();
        timer.disarm();
        timer.disarm();
        let fired = tokio::time::timeout(Duration::from_secs(1), timer.tick()).await;
        assert!(fired.is_err());
    }
}
