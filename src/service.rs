use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::combat_log::LogLine;
use crate::dispatcher::{ActivityDispatcher, DispatchAction};
use crate::recording::{
    BufferedRecorder, CaptureEngine, EngineSignalReceiver, FinalizeMode, RecorderStatus,
    VideoQueue,
};
use crate::settings::RecorderSettings;

#[derive(Debug)]
pub enum ServiceMessage {
    Log(LogLine),
    /// The log tailer saw no line for the given period.
    DataTimeout(Duration),
    ProcessStarted,
    ProcessStopped,
    ManualHotkey(DateTime<Utc>),
    Shutdown,
}

/// Cloneable front door to a running [`RecorderService`].
#[derive(Clone)]
pub struct RecorderHandle {
    message_tx: mpsc::UnboundedSender<ServiceMessage>,
    status_tx: broadcast::Sender<RecorderStatus>,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl RecorderHandle {
    pub fn send(&self, message: ServiceMessage) -> Result<(), String> {
        self.message_tx
            .send(message)
            .map_err(|_| "Recorder service is not running".to_string())
    }

    pub fn log_line(&self, line: LogLine) -> Result<(), String> {
        self.send(ServiceMessage::Log(line))
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<RecorderStatus> {
        self.status_tx.subscribe()
    }

    /// Interrupts any pending engine wait, then asks the service loop to exit.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        if self.send(ServiceMessage::Shutdown).is_err() {
            tracing::debug!("Recorder service already stopped");
        }
    }
}

/// Single writer over the dispatcher and the recorder. Log lines, process signals, engine
/// acknowledgements and recorder timers are handled strictly one at a time.
pub struct RecorderService<E: CaptureEngine, Q: VideoQueue> {
    dispatcher: ActivityDispatcher,
    recorder: BufferedRecorder<E, Q>,
    message_rx: mpsc::UnboundedReceiver<ServiceMessage>,
    data_timeout: Duration,
}

impl<E: CaptureEngine, Q: VideoQueue> RecorderService<E, Q> {
    pub fn new(
        settings: RecorderSettings,
        engine: E,
        engine_rx: EngineSignalReceiver,
        queue: Q,
    ) -> (Self, RecorderHandle) {
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let data_timeout = settings.data_timeout();
        let recorder = BufferedRecorder::new(settings.clone(), engine, engine_rx, queue, shutdown_rx);

        let handle = RecorderHandle {
            message_tx,
            status_tx: recorder.status_sender(),
            shutdown_tx: Arc::new(shutdown_tx),
        };
        let service = Self {
            dispatcher: ActivityDispatcher::new(settings),
            recorder,
            message_rx,
            data_timeout,
        };

        (service, handle)
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        tracing::info!(
            data_timeout_ms = self.data_timeout.as_millis() as u64,
            "Recorder service started"
        );

        let quiet_timer = tokio::time::sleep(self.data_timeout);
        tokio::pin!(quiet_timer);
        let mut quiet_timer_armed = false;

        loop {
            tokio::select! {
                message = self.message_rx.recv() => {
                    let Some(message) = message else {
                        tracing::info!("All recorder handles dropped");
                        break;
                    };

                    match message {
                        ServiceMessage::Log(line) => {
                            quiet_timer.as_mut().reset(Instant::now() + self.data_timeout);
                            quiet_timer_armed = true;
                            let actions = self.dispatcher.handle_line(&line);
                            self.apply(actions).await;
                        }
                        ServiceMessage::DataTimeout(elapsed) => {
                            let actions = self.dispatcher.handle_data_timeout(elapsed);
                            self.apply(actions).await;
                        }
                        ServiceMessage::ProcessStarted => self.recorder.process_started(),
                        ServiceMessage::ProcessStopped => {
                            quiet_timer_armed = false;
                            self.stop_for_process_exit().await;
                        }
                        ServiceMessage::ManualHotkey(at) => {
                            let actions = self.dispatcher.handle_manual_hotkey(at);
                            self.apply(actions).await;
                        }
                        ServiceMessage::Shutdown => break,
                    }
                }
                event = self.recorder.next_event() => {
                    self.recorder.handle_event(event).await;
                }
                () = &mut quiet_timer, if quiet_timer_armed => {
                    quiet_timer_armed = false;
                    let actions = self.dispatcher.handle_data_timeout(self.data_timeout);
                    self.apply(actions).await;
                }
            }
        }

        self.stop_for_process_exit().await;
        tracing::info!("Recorder service stopped");
    }

    async fn stop_for_process_exit(&mut self) {
        self.recorder.process_stopped();
        let actions = self.dispatcher.handle_process_stopped();
        self.apply(actions).await;
        self.recorder.stop_buffer().await;
    }

    async fn apply(&mut self, actions: Vec<DispatchAction>) {
        for action in actions {
            match action {
                DispatchAction::StartRecording => {
                    if !self.recorder.promote() {
                        self.dispatcher.drop_activity();
                    }
                }
                DispatchAction::StopRecording(activity) => {
                    self.recorder.finalize(*activity, FinalizeMode::Normal).await;
                }
                DispatchAction::ForceStop(activity) => {
                    self.recorder.force_stop(*activity).await;
                }
            }
        }
    }
}

pub fn spawn_recorder_service<E: CaptureEngine, Q: VideoQueue>(
    settings: RecorderSettings,
    engine: E,
    engine_rx: EngineSignalReceiver,
    queue: Q,
) -> (RecorderHandle, JoinHandle<()>) {
    let (service, handle) = RecorderService::new(settings, engine, engine_rx, queue);
    (handle, service.spawn())
}
