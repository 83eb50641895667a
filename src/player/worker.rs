use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::machine::{AudioSession, Effect, PlayerEvent, PlayerMachine, PlayerState};
use super::{LoadedTrack, MediaElement, PlayerConfig, PlayerError, TrackLoader};

// Commands processed by the player worker, one at a time
enum PlayerCommand {
    Event {
        event: PlayerEvent,
        reply: oneshot::Sender<AudioSession>,
    },
    Snapshot(oneshot::Sender<AudioSession>),
}

// posted back by the load task on its own channel, so it never keeps the worker alive
type LoadResult = Result<LoadedTrack, PlayerError>;

/// Cloneable control surface of a running player.
///
/// Dropping every handle tears the player down.
#[derive(Clone)]
pub struct PlayerHandle {
    tx: mpsc::Sender<PlayerCommand>,
    updates: watch::Receiver<AudioSession>,
}

impl PlayerHandle {
    async fn send(&self, event: PlayerEvent) -> Result<AudioSession, PlayerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(PlayerCommand::Event { event, reply })
            .await
            .map_err(|_| PlayerError::Closed)?;
        rx.await.map_err(|_| PlayerError::Closed)
    }

    pub async fn request_play(&self) -> Result<AudioSession, PlayerError> {
        self.send(PlayerEvent::RequestPlay).await
    }

    pub async fn toggle_play_pause(&self) -> Result<AudioSession, PlayerError> {
        self.send(PlayerEvent::TogglePlayPause).await
    }

    pub async fn set_volume(&self, volume: f32) -> Result<AudioSession, PlayerError> {
        self.send(PlayerEvent::SetVolume(volume)).await
    }

    pub async fn toggle_mute(&self) -> Result<AudioSession, PlayerError> {
        self.send(PlayerEvent::ToggleMute).await
    }

    pub async fn viewport_entered(&self) -> Result<AudioSession, PlayerError> {
        self.send(PlayerEvent::ViewportEntered).await
    }

    // media element reached the end of the track
    pub async fn ended(&self) -> Result<AudioSession, PlayerError> {
        self.send(PlayerEvent::Ended).await
    }

    pub async fn snapshot(&self) -> Result<AudioSession, PlayerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(PlayerCommand::Snapshot(reply))
            .await
            .map_err(|_| PlayerError::Closed)?;
        rx.await.map_err(|_| PlayerError::Closed)
    }

    /// Latest session, updated after every processed command.
    pub fn subscribe(&self) -> watch::Receiver<AudioSession> {
        self.updates.clone()
    }

    /// Cancels any in-flight load, releases the track and stops the worker.
    pub async fn teardown(self) -> Result<AudioSession, PlayerError> {
        self.send(PlayerEvent::Teardown).await
    }
}

pub fn spawn_player<L, E>(loader: L, element: E, config: PlayerConfig) -> PlayerHandle
where
    L: TrackLoader,
    E: MediaElement,
{
    let (tx, rx) = mpsc::channel(32);
    let (load_tx, load_rx) = mpsc::channel(1);
    let machine = PlayerMachine::new(&config);
    let (updates_tx, updates) = watch::channel(machine.snapshot());

    let worker = PlayerWorker {
        machine,
        loader: Arc::new(loader),
        element,
        source_url: config.source_url,
        load_tx,
        updates: updates_tx,
        load_task: None,
        staged: None,
    };
    tokio::spawn(worker.run(rx, load_rx));

    PlayerHandle { tx, updates }
}

struct PlayerWorker<L, E> {
    machine: PlayerMachine,
    loader: Arc<L>,
    element: E,
    source_url: String,
    load_tx: mpsc::Sender<LoadResult>,
    updates: watch::Sender<AudioSession>,
    load_task: Option<JoinHandle<()>>,
    staged: Option<LoadedTrack>,
}

impl<L: TrackLoader, E: MediaElement> PlayerWorker<L, E> {
    async fn run(
        mut self,
        mut rx: mpsc::Receiver<PlayerCommand>,
        mut load_rx: mpsc::Receiver<LoadResult>,
    ) {
        debug!("Player worker started for {}", self.source_url);

        loop {
            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(PlayerCommand::Event { event, reply }) => {
                        let done = event == PlayerEvent::Teardown;
                        self.dispatch(event).await;
                        let _ = reply.send(self.machine.snapshot());
                        if done {
                            break;
                        }
                    }
                    Some(PlayerCommand::Snapshot(reply)) => {
                        let _ = reply.send(self.machine.snapshot());
                    }
                    // every handle dropped
                    None => break,
                },
                Some(result) = load_rx.recv() => {
                    self.load_task = None;
                    match result {
                        Ok(track) => {
                            self.staged = Some(track);
                            self.dispatch(PlayerEvent::LoadSucceeded).await;
                        }
                        Err(e) => self.dispatch(PlayerEvent::LoadFailed(e.to_string())).await,
                    }
                }
            }
        }

        // handles went away without an explicit teardown: cancel the load, release the track
        if self.machine.state() != PlayerState::Unloaded || self.load_task.is_some() {
            self.dispatch(PlayerEvent::Teardown).await;
        }
        info!("Player for {} released", self.source_url);
    }

    async fn dispatch(&mut self, event: PlayerEvent) {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            for effect in self.machine.handle(event) {
                if let Some(next) = self.perform(effect).await {
                    queue.push_back(next);
                }
            }
        }
        self.updates.send_replace(self.machine.snapshot());
    }

    // Carry out one effect, returning the event its completion produces, if any
    async fn perform(&mut self, effect: Effect) -> Option<PlayerEvent> {
        match effect {
            Effect::StartLoad => {
                let tx = self.load_tx.clone();
                let loader = Arc::clone(&self.loader);
                let url = self.source_url.clone();
                self.load_task = Some(tokio::spawn(async move {
                    let result = loader.load(&url).await;
                    let _ = tx.send(result).await;
                }));
                None
            }
            Effect::CancelLoad => {
                if let Some(task) = self.load_task.take() {
                    task.abort();
                }
                self.staged = None;
                None
            }
            Effect::Attach => {
                if let Some(track) = self.staged.take() {
                    debug!("Attaching {} ({} bytes)", track.source_url, track.bytes.len());
                    self.element.attach(track);
                }
                None
            }
            Effect::Discard => {
                self.staged = None;
                None
            }
            Effect::ApplyVolume(volume) => {
                self.element.set_volume(volume);
                None
            }
            Effect::Seek(position) => {
                self.element.seek(position);
                None
            }
            Effect::Play => match self.element.play().await {
                Ok(()) => Some(PlayerEvent::PlaybackStarted),
                Err(e) => Some(PlayerEvent::PlaybackRejected(e.to_string())),
            },
            Effect::Pause => {
                self.element.pause();
                None
            }
            Effect::Release => {
                self.element.release();
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    struct StubLoader {
        calls: Arc<AtomicUsize>,
        // when set, loads wait for a notification
        gate: Option<Arc<Notify>>,
        fail: bool,
    }

    impl StubLoader {
        fn instant(calls: Arc<AtomicUsize>) -> Self {
            Self { calls, gate: None, fail: false }
        }
    }

    impl TrackLoader for StubLoader {
        async fn load(&self, url: &str) -> Result<LoadedTrack, PlayerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail {
                return Err(PlayerError::EmptyTrack);
            }
            Ok(LoadedTrack {
                source_url: url.to_string(),
                content_type: Some("audio/mpeg".into()),
                bytes: vec![0xff, 0xfb, 0x90],
            })
        }
    }

    #[derive(Clone, Default)]
    struct RecordingElement {
        log: Arc<Mutex<Vec<String>>>,
        // number of play() calls to reject before allowing
        blocked_plays: Arc<AtomicUsize>,
    }

    impl RecordingElement {
        fn push(&self, entry: String) {
            self.log.lock().unwrap().push(entry);
        }

        fn entries(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    impl MediaElement for RecordingElement {
        fn attach(&mut self, track: LoadedTrack) {
            self.push(format!("attach {}", track.bytes.len()));
        }

        fn seek(&mut self, position_secs: f64) {
            self.push(format!("seek {position_secs}"));
        }

        fn set_volume(&mut self, volume: f32) {
            self.push(format!("volume {volume}"));
        }

        async fn play(&mut self) -> Result<(), PlayerError> {
            let blocked = self
                .blocked_plays
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if blocked {
                self.push("play blocked".into());
                return Err(PlayerError::PlaybackBlocked("NotAllowedError".into()));
            }
            self.push("play".into());
            Ok(())
        }

        fn pause(&mut self) {
            self.push("pause".into());
        }

        fn release(&mut self) {
            self.push("release".into());
        }
    }

    // resolves once the worker task has exited and dropped its side of the watch
    async fn wait_for_shutdown(updates: &mut watch::Receiver<AudioSession>) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while updates.changed().await.is_ok() {}
        })
        .await
        .expect("player worker kept running after its handles were dropped");
    }

    fn config() -> PlayerConfig {
        let mut config = PlayerConfig::new("http://localhost/api/audio");
        config.start_muted = false;
        config
    }

    async fn wait_for(handle: &PlayerHandle, f: impl Fn(&AudioSession) -> bool) -> AudioSession {
        let mut updates = handle.subscribe();
        let session = tokio::time::timeout(Duration::from_secs(5), updates.wait_for(|s| f(s)))
            .await
            .expect("player never reached the expected state")
            .expect("player worker stopped");
        session.clone()
    }

    #[tokio::test]
    async fn toggle_from_unloaded_plays_from_offset() {
        let calls = Arc::new(AtomicUsize::new(0));
        let element = RecordingElement::default();
        let handle = spawn_player(StubLoader::instant(calls.clone()), element.clone(), config());

        let session = handle.toggle_play_pause().await.unwrap();
        assert!(!session.is_playing);

        let session = wait_for(&handle, |s| s.is_playing).await;
        assert_eq!(session.state, PlayerState::Ready { playing: true });
        assert_eq!(session.playback_position_seconds, 30.0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(element.entries(), vec!["attach 3", "volume 0.5", "seek 30", "play"]);
    }

    #[tokio::test]
    async fn ended_restarts_at_offset() {
        let element = RecordingElement::default();
        let handle = spawn_player(
            StubLoader::instant(Arc::new(AtomicUsize::new(0))),
            element.clone(),
            config(),
        );
        handle.request_play().await.unwrap();
        wait_for(&handle, |s| s.is_playing).await;

        let session = handle.ended().await.unwrap();
        assert!(session.is_playing);
        let log = element.entries();
        assert_eq!(&log[log.len() - 2..], ["seek 30", "play"]);
    }

    #[tokio::test]
    async fn autoplay_block_leaves_player_paused() {
        let element = RecordingElement::default();
        element.blocked_plays.store(1, Ordering::SeqCst);
        let handle = spawn_player(
            StubLoader::instant(Arc::new(AtomicUsize::new(0))),
            element.clone(),
            PlayerConfig::new("http://localhost/api/audio"),
        );

        handle.viewport_entered().await.unwrap();
        let session = wait_for(&handle, |s| s.is_loaded).await;
        assert!(!session.is_playing);
        assert!(session.is_muted);
        assert!(session.last_error.is_none());

        // user click retries
        let session = handle.toggle_play_pause().await.unwrap();
        assert!(session.is_playing);
        assert!(element.entries().contains(&"play blocked".to_string()));
    }

    #[tokio::test]
    async fn duplicate_requests_share_one_load() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());
        let loader = StubLoader {
            calls: calls.clone(),
            gate: Some(gate.clone()),
            fail: false,
        };
        let handle = spawn_player(loader, RecordingElement::default(), config());

        assert_eq!(handle.request_play().await.unwrap().state, PlayerState::Loading);
        assert_eq!(handle.toggle_play_pause().await.unwrap().state, PlayerState::Loading);
        assert_eq!(handle.request_play().await.unwrap().state, PlayerState::Loading);

        gate.notify_one();
        wait_for(&handle, |s| s.is_playing).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn teardown_cancels_in_flight_load() {
        let gate = Arc::new(Notify::new());
        let loader = StubLoader {
            calls: Arc::new(AtomicUsize::new(0)),
            gate: Some(gate.clone()),
            fail: false,
        };
        let element = RecordingElement::default();
        let handle = spawn_player(loader, element.clone(), config());
        let probe = handle.clone();

        handle.request_play().await.unwrap();
        let session = handle.teardown().await.unwrap();
        assert_eq!(session.state, PlayerState::Unloaded);

        gate.notify_one();
        assert!(matches!(probe.snapshot().await, Err(PlayerError::Closed)));
        assert!(element.entries().is_empty());
    }

    #[tokio::test]
    async fn teardown_releases_attached_track() {
        let element = RecordingElement::default();
        let handle = spawn_player(
            StubLoader::instant(Arc::new(AtomicUsize::new(0))),
            element.clone(),
            config(),
        );
        handle.request_play().await.unwrap();
        wait_for(&handle, |s| s.is_playing).await;

        handle.teardown().await.unwrap();
        let log = element.entries();
        assert_eq!(&log[log.len() - 2..], ["pause", "release"]);
    }

    #[tokio::test]
    async fn failed_load_is_reported_and_retryable() {
        let calls = Arc::new(AtomicUsize::new(0));
        let loader = StubLoader {
            calls: calls.clone(),
            gate: None,
            fail: true,
        };
        let handle = spawn_player(loader, RecordingElement::default(), config());

        handle.request_play().await.unwrap();
        let session = wait_for(&handle, |s| s.last_error.is_some()).await;
        assert_eq!(session.state, PlayerState::Unloaded);

        let session = handle.toggle_play_pause().await.unwrap();
        assert_eq!(session.state, PlayerState::Loading);
        wait_for(&handle, |s| s.last_error.is_some()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn volume_and_mute_controls() {
        let element = RecordingElement::default();
        let handle = spawn_player(
            StubLoader::instant(Arc::new(AtomicUsize::new(0))),
            element.clone(),
            config(),
        );
        handle.request_play().await.unwrap();
        wait_for(&handle, |s| s.is_playing).await;

        let session = handle.set_volume(0.0).await.unwrap();
        assert!(session.is_muted);
        let session = handle.set_volume(0.7).await.unwrap();
        assert!(!session.is_muted);

        let muted = handle.toggle_mute().await.unwrap();
        assert!(muted.is_muted);
        assert_eq!(muted.volume, 0.7);
        let unmuted = handle.toggle_mute().await.unwrap();
        assert_eq!(unmuted.effective_volume(), 0.7);

        let log = element.entries();
        assert_eq!(&log[log.len() - 2..], ["volume 0", "volume 0.7"]);
    }

    #[tokio::test]
    async fn dropping_handles_while_loading_cancels_the_load() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());
        let loader = StubLoader {
            calls: calls.clone(),
            gate: Some(gate.clone()),
            fail: false,
        };
        let element = RecordingElement::default();
        let handle = spawn_player(loader, element.clone(), config());
        let mut updates = handle.subscribe();

        handle.request_play().await.unwrap();
        drop(handle);

        // the pending fetch must not keep the worker alive
        wait_for_shutdown(&mut updates).await;
        assert_eq!(updates.borrow().state, PlayerState::Unloaded);

        gate.notify_one();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(element.entries().is_empty());
    }

    #[tokio::test]
    async fn dropping_handles_while_playing_releases_the_track() {
        let element = RecordingElement::default();
        let handle = spawn_player(
            StubLoader::instant(Arc::new(AtomicUsize::new(0))),
            element.clone(),
            config(),
        );
        handle.request_play().await.unwrap();
        wait_for(&handle, |s| s.is_playing).await;

        let mut updates = handle.subscribe();
        drop(handle);
        wait_for_shutdown(&mut updates).await;

        assert_eq!(updates.borrow().state, PlayerState::Unloaded);
        let log = element.entries();
        assert_eq!(&log[log.len() - 2..], ["pause", "release"]);
        assert_eq!(log.iter().filter(|e| e.starts_with("attach")).count(), 1);
    }
}
