//! Gameplay recorder core: turns combat-log events into activities and cuts activity clips
//! out of a rolling buffer recording.

pub mod activity;
pub mod combat_log;
pub mod dispatcher;
pub mod error;
pub mod game_data;
pub mod logging;
pub mod recording;
pub mod service;
pub mod settings;

pub use activity::{Activity, ActivityKind, VideoCategory};
pub use combat_log::{LogArg, LogEventType, LogLine};
pub use dispatcher::{ActivityDispatcher, DispatchAction};
pub use error::{ActivityError, MetadataError, RecorderError, SettingsError};
pub use recording::{BufferedRecorder, CaptureEngine, Metadata, VideoQueue};
pub use service::{spawn_recorder_service, RecorderHandle, RecorderService, ServiceMessage};
pub use settings::{load_settings, save_settings, RecorderSettings};
