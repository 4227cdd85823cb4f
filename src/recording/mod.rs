mod buffer;
mod events;
pub mod metadata;
mod model;
mod queue;

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::activity::{Activity, VideoCategory};
use crate::error::RecorderError;
use crate::settings::RecorderSettings;

use self::events::{emit_status, status_channel};
use self::model::{TimerEvent, TimerKind};

pub use buffer::{cleanup_buffer_directory, list_buffer_files, BufferFileInfo, CleanupResult};
pub use metadata::{metadata_sidecar_path, read_metadata, write_metadata, Metadata};
pub(crate) use model::{BUFFER_RESTART_INTERVAL, ENCODER_SETTLE_DELAY, WROTE_FILE_TIMEOUT};
pub use model::{
    engine_signal_channel, EncoderState, EngineSignal, EngineSignalReceiver, EngineSignalSender,
    FinalizeMode, RecorderStatus, VideoQueueItem,
};
pub use queue::{sanitize_file_name, SidecarQueue, VideoQueue};

/// The video capture backend. Acknowledgements arrive asynchronously as [`EngineSignal`]s
/// on the channel handed to [`BufferedRecorder::new`].
pub trait CaptureEngine: Send + 'static {
    fn start(&mut self) -> Result<(), RecorderError>;
    fn stop(&mut self) -> Result<(), RecorderError>;
}

struct ScheduledTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

pub(crate) enum RecorderEvent {
    Engine(EngineSignal),
    Timer(TimerEvent),
    SignalsClosed,
}

/// Keeps a rolling buffer recording while the game runs and cuts activity clips out of it.
///
/// An unpromoted buffer is restarted periodically so it never grows unbounded; promoting it
/// for an activity cancels that restart until the activity is finalized.
pub struct BufferedRecorder<E: CaptureEngine, Q: VideoQueue> {
    engine: E,
    queue: Q,
    settings: RecorderSettings,
    state: EncoderState,
    promoted: bool,
    process_running: bool,
    buffer_started_at: Option<DateTime<Utc>>,
    engine_rx: EngineSignalReceiver,
    timer_tx: mpsc::UnboundedSender<TimerEvent>,
    timer_rx: mpsc::UnboundedReceiver<TimerEvent>,
    restart_timer: Option<ScheduledTimer>,
    resume_timer: Option<ScheduledTimer>,
    next_timer_generation: u64,
    shutdown_rx: watch::Receiver<bool>,
    status_tx: broadcast::Sender<RecorderStatus>,
    status: RecorderStatus,
}

impl<E: CaptureEngine, Q: VideoQueue> BufferedRecorder<E, Q> {
    pub fn new(
        settings: RecorderSettings,
        engine: E,
        engine_rx: EngineSignalReceiver,
        queue: Q,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        Self {
            engine,
            queue,
            settings,
            state: EncoderState::Offline,
            promoted: false,
            process_running: false,
            buffer_started_at: None,
            engine_rx,
            timer_tx,
            timer_rx,
            restart_timer: None,
            resume_timer: None,
            next_timer_generation: 0,
            shutdown_rx,
            status_tx: status_channel(),
            status: RecorderStatus::WaitingForGame,
        }
    }

    pub fn state(&self) -> EncoderState {
        self.state
    }

    pub fn is_promoted(&self) -> bool {
        self.promoted
    }

    pub fn status(&self) -> RecorderStatus {
        self.status
    }

    pub fn buffer_started_at(&self) -> Option<DateTime<Utc>> {
        self.buffer_started_at
    }

    pub fn status_sender(&self) -> broadcast::Sender<RecorderStatus> {
        self.status_tx.clone()
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<RecorderStatus> {
        self.status_tx.subscribe()
    }

    fn set_status(&mut self, status: RecorderStatus) {
        if self.status != status {
            self.status = status;
            emit_status(&self.status_tx, status);
        }
    }

    fn shutting_down(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    pub fn process_started(&mut self) {
        tracing::info!("Game process detected");
        self.process_running = true;
        self.start_buffer();
    }

    /// Marks the game as gone. No buffer resumes after this; call [`Self::stop_buffer`]
    /// once any open activity has been finalized.
    pub fn process_stopped(&mut self) {
        tracing::info!("Game process exited");
        self.process_running = false;
        self.cancel_resume();
    }

    pub fn start_buffer(&mut self) {
        if self.state != EncoderState::Offline {
            tracing::debug!(state = ?self.state, "Buffer already running");
            return;
        }
        if !self.process_running || self.shutting_down() {
            tracing::debug!("Not starting buffer while the game is not running");
            return;
        }

        self.cancel_resume();
        self.state = EncoderState::Starting;
        if let Err(error) = self.engine.start() {
            tracing::warn!("Failed to start buffer recording: {error}");
            self.state = EncoderState::Offline;
            self.schedule_resume();
        }
    }

    /// Stops the buffer without producing a clip and prunes old buffer files.
    pub async fn stop_buffer(&mut self) {
        self.cancel_restart();
        self.cancel_resume();

        match self.state {
            EncoderState::Recording => {
                if let Err(error) = self.stop_engine().await {
                    tracing::warn!("Buffer did not stop cleanly: {error}");
                }
            }
            EncoderState::Starting => {
                if let Err(error) = self.engine.stop() {
                    tracing::warn!("Failed to stop starting buffer: {error}");
                }
                self.state = EncoderState::Offline;
            }
            EncoderState::Offline | EncoderState::Stopping => {}
        }

        self.promoted = false;
        self.buffer_started_at = None;
        self.cleanup_buffer();
        self.set_status(RecorderStatus::WaitingForGame);
    }

    /// Marks the running buffer as belonging to an activity. Refused unless the buffer is
    /// recording; promoting twice is a no-op.
    pub fn promote(&mut self) -> bool {
        if self.state != EncoderState::Recording {
            tracing::warn!(state = ?self.state, "Cannot promote buffer that is not recording");
            return false;
        }
        if self.promoted {
            return true;
        }

        self.cancel_restart();
        self.promoted = true;
        self.set_status(RecorderStatus::Recording);
        tracing::info!("Buffer promoted to activity recording");
        true
    }

    /// Waits for the overrun, stops the buffer, and queues the clip for the activity.
    pub async fn finalize(&mut self, activity: Activity, mode: FinalizeMode) {
        let category = activity.category();
        self.set_status(RecorderStatus::SavingVideo);

        let overrun = Duration::from_secs(activity.overrun());
        if !overrun.is_zero() {
            tracing::debug!(category = %category, overrun_secs = overrun.as_secs(), "Waiting for overrun");
            tokio::select! {
                _ = tokio::time::sleep(overrun) => {}
                _ = wait_for_shutdown(&mut self.shutdown_rx) => {
                    tracing::info!("Shutdown requested during overrun");
                }
            }
        }

        if self.state != EncoderState::Recording {
            tracing::warn!(category = %category, state = ?self.state, "No running buffer to cut activity from");
            self.after_finalize();
            return;
        }

        let buffer_started_at = self.buffer_started_at;
        let buffer_file = match self.stop_engine().await {
            Ok(path) => path,
            Err(error) => {
                tracing::error!(category = %category, "Dropping activity video: {error}");
                self.after_finalize();
                return;
            }
        };

        match self.build_queue_item(&activity, mode, buffer_file, buffer_started_at) {
            Ok(Some(item)) => {
                let file_name = item.file_name.clone();
                match self.queue.enqueue(item) {
                    Ok(()) => tracing::info!(category = %category, file_name = %file_name, "Queued activity video"),
                    Err(error) => tracing::error!("Failed to queue activity video: {error}"),
                }
            }
            Ok(None) => {}
            Err(error) => {
                tracing::error!(category = %category, "Discarding activity video: {error}");
            }
        }

        self.after_finalize();
    }

    /// Finalizes without trimming or duration filters; the clip keeps the whole buffer.
    pub async fn force_stop(&mut self, activity: Activity) {
        self.finalize(activity, FinalizeMode::Forced).await;
    }

    fn build_queue_item(
        &self,
        activity: &Activity,
        mode: FinalizeMode,
        buffer_file: PathBuf,
        buffer_started_at: Option<DateTime<Utc>>,
    ) -> Result<Option<VideoQueueItem>, RecorderError> {
        let metadata = activity.metadata()?;

        if mode == FinalizeMode::Normal && activity.category() == VideoCategory::Raids {
            let duration = activity.duration_secs()?;
            let minimum = self.settings.min_encounter_duration_secs as f64;
            if duration < minimum {
                tracing::info!(
                    duration_secs = duration,
                    minimum_secs = minimum,
                    "Discarding short raid encounter"
                );
                return Ok(None);
            }
        }

        let relative_start = match (mode, buffer_started_at) {
            (FinalizeMode::Normal, Some(buffer_started_at)) => {
                let offset_ms = (activity.start_date() - buffer_started_at)
                    .num_milliseconds()
                    .max(0);
                offset_ms as f64 / 1000.0
            }
            _ => 0.0,
        };

        Ok(Some(VideoQueueItem {
            buffer_file,
            metadata,
            file_name: sanitize_file_name(&activity.file_name()?),
            relative_start,
        }))
    }

    fn after_finalize(&mut self) {
        self.promoted = false;
        if self.process_running && !self.shutting_down() {
            self.schedule_resume();
        } else {
            self.set_status(RecorderStatus::WaitingForGame);
        }
    }

    pub(crate) async fn next_event(&mut self) -> RecorderEvent {
        tokio::select! {
            Some(signal) = self.engine_rx.recv() => RecorderEvent::Engine(signal),
            Some(timer) = self.timer_rx.recv() => RecorderEvent::Timer(timer),
            else => RecorderEvent::SignalsClosed,
        }
    }

    pub(crate) async fn handle_event(&mut self, event: RecorderEvent) {
        match event {
            RecorderEvent::Engine(signal) => self.on_engine_signal(signal),
            RecorderEvent::Timer(timer) => self.handle_timer(timer).await,
            RecorderEvent::SignalsClosed => {
                tracing::warn!("Recorder event channels closed");
            }
        }
    }

    fn on_engine_signal(&mut self, signal: EngineSignal) {
        match signal {
            EngineSignal::Started => {
                if self.state != EncoderState::Starting {
                    tracing::debug!(state = ?self.state, "Ignoring unexpected engine start");
                    return;
                }
                self.state = EncoderState::Recording;
                self.promoted = false;
                self.buffer_started_at = Some(Utc::now());
                self.schedule_restart();
                self.set_status(RecorderStatus::ReadyToRecord);
                tracing::info!("Buffer recording started");
            }
            EngineSignal::Stopped => {
                if self.state == EncoderState::Offline {
                    return;
                }
                tracing::warn!(state = ?self.state, "Capture engine stopped unexpectedly");
                self.cancel_restart();
                self.state = EncoderState::Offline;
                self.promoted = false;
                self.buffer_started_at = None;
                self.schedule_resume();
            }
            EngineSignal::WroteFile(path) => {
                tracing::debug!(path = %path.display(), "Ignoring stale buffer file");
            }
        }
    }

    async fn handle_timer(&mut self, event: TimerEvent) {
        let slot = match event.kind {
            TimerKind::BufferRestart => &mut self.restart_timer,
            TimerKind::BufferResume => &mut self.resume_timer,
        };
        if slot.as_ref().map(|timer| timer.generation) != Some(event.generation) {
            tracing::trace!(kind = ?event.kind, generation = event.generation, "Ignoring stale timer");
            return;
        }
        *slot = None;

        match event.kind {
            TimerKind::BufferRestart => self.restart_buffer().await,
            TimerKind::BufferResume => self.start_buffer(),
        }
    }

    async fn restart_buffer(&mut self) {
        if self.state != EncoderState::Recording || self.promoted {
            return;
        }

        tracing::debug!("Restarting idle buffer");
        match self.stop_engine().await {
            Ok(path) => tracing::debug!(path = %path.display(), "Idle buffer written"),
            Err(error) => tracing::warn!("Idle buffer did not stop cleanly: {error}"),
        }
        self.cleanup_buffer();
        self.schedule_resume();
    }

    fn drain_stale_signals(&mut self) {
        while let Ok(signal) = self.engine_rx.try_recv() {
            tracing::debug!(signal = ?signal, "Discarding stale engine signal");
        }
    }

    async fn stop_engine(&mut self) -> Result<PathBuf, RecorderError> {
        self.cancel_restart();
        self.drain_stale_signals();
        self.state = EncoderState::Stopping;

        let result = match self.engine.stop() {
            Ok(()) => self.await_wrote_file().await,
            Err(error) => Err(error),
        };

        self.state = EncoderState::Offline;
        self.buffer_started_at = None;
        result
    }

    async fn await_wrote_file(&mut self) -> Result<PathBuf, RecorderError> {
        let timeout = self.settings.stop_ack_timeout();
        let engine_rx = &mut self.engine_rx;
        let shutdown_rx = &mut self.shutdown_rx;

        let wrote_file = async {
            while let Some(signal) = engine_rx.recv().await {
                if let EngineSignal::WroteFile(path) = signal {
                    return Ok(path);
                }
            }
            Err(RecorderError::EngineSignalsClosed)
        };

        tokio::select! {
            biased;
            result = tokio::time::timeout(timeout, wrote_file) => {
                result.unwrap_or_else(|_| Err(RecorderError::WroteTimeout(timeout)))
            }
            _ = wait_for_shutdown(shutdown_rx) => Err(RecorderError::ShutdownRequested),
        }
    }

    fn cleanup_buffer(&self) {
        match cleanup_buffer_directory(
            &self.settings.buffer_directory,
            self.settings.buffer_files_to_keep,
        ) {
            Ok(result) => {
                if result.deleted_count > 0 {
                    tracing::info!(
                        deleted_count = result.deleted_count,
                        freed_bytes = result.freed_bytes,
                        "Pruned buffer files"
                    );
                }
            }
            Err(error) => tracing::warn!("Buffer cleanup failed: {error}"),
        }
    }

    fn schedule(&mut self, kind: TimerKind, delay: Duration) -> ScheduledTimer {
        self.next_timer_generation = self.next_timer_generation.wrapping_add(1);
        let generation = self.next_timer_generation;
        let timer_tx = self.timer_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = timer_tx.send(TimerEvent { kind, generation });
        });

        ScheduledTimer { generation, handle }
    }

    fn schedule_restart(&mut self) {
        self.cancel_restart();
        let timer = self.schedule(TimerKind::BufferRestart, self.settings.buffer_restart_interval());
        self.restart_timer = Some(timer);
    }

    fn schedule_resume(&mut self) {
        if !self.process_running || self.shutting_down() {
            return;
        }
        self.cancel_resume();
        let timer = self.schedule(TimerKind::BufferResume, self.settings.settle_delay());
        self.resume_timer = Some(timer);
    }

    fn cancel_restart(&mut self) {
        if let Some(timer) = self.restart_timer.take() {
            timer.handle.abort();
        }
    }

    fn cancel_resume(&mut self) {
        if let Some(timer) = self.resume_timer.take() {
            timer.handle.abort();
        }
    }
}

impl<E: CaptureEngine, Q: VideoQueue> Drop for BufferedRecorder<E, Q> {
    fn drop(&mut self) {
        self.cancel_restart();
        self.cancel_resume();
    }
}

async fn wait_for_shutdown(shutdown_rx: &mut watch::Receiver<bool>) {
    if shutdown_rx.wait_for(|requested| *requested).await.is_err() {
        std::future::pending::<()>().await;
    }
}
