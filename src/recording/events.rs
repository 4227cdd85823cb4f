use tokio::sync::broadcast;

use super::model::RecorderStatus;

pub(crate) const STATUS_CHANNEL_CAPACITY: usize = 16;

pub(crate) fn status_channel() -> broadcast::Sender<RecorderStatus> {
    broadcast::channel(STATUS_CHANNEL_CAPACITY).0
}

pub(super) fn emit_status(status_tx: &broadcast::Sender<RecorderStatus>, status: RecorderStatus) {
    if let Err(error) = status_tx.send(status) {
        tracing::trace!("No listeners for recorder status {:?}", error.0);
    }
}
