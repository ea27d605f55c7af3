use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

use crate::{error::MitterError, types::Direction};

/// Broadcast event stream type used by view subscribers.
pub type EventStream = broadcast::Receiver<PaginationEvent>;

/// Signals a view sends to a pagination runtime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaginationCommand {
    /// A viewport edge was reached; fetch more in `direction` if idle.
    RequestMore(Direction),
    /// Clear exhaustion for `direction`, for example after a realtime delivery.
    Rearm(Direction),
    /// The view was torn down.
    Close,
}

/// Notifications a pagination manager emits for its view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaginationEvent {
    /// A fetch started or finished. Drives loading indicators.
    LoadingChanged {
        channel_id: String,
        direction: Direction,
        loading: bool,
    },
    /// The accumulated view changed.
    ViewUpdated {
        channel_id: String,
        /// Number of messages now held.
        len: usize,
    },
    /// No further data in `direction`. Not an error.
    Exhausted {
        channel_id: String,
        direction: Direction,
    },
    /// A fetch failed; previously loaded messages are untouched.
    LoadFailed {
        channel_id: String,
        direction: Direction,
        error: MitterError,
        /// Whether re-issuing the request may succeed.
        retry_available: bool,
    },
}

/// Errors returned by pagination channel operations.
#[derive(Debug, Error)]
pub enum PaginationChannelError {
    /// The runtime stopped and dropped its command receiver.
    #[error("pagination runtime is no longer accepting commands")]
    CommandChannelClosed,
}

/// Command/event channel pair used by a pagination runtime and its view.
#[derive(Clone, Debug)]
pub struct PaginationChannels {
    command_tx: mpsc::Sender<PaginationCommand>,
    event_tx: broadcast::Sender<PaginationEvent>,
}

impl PaginationChannels {
    /// Buffers are at least one slot. The receiver goes to the runtime.
    pub fn new(
        command_buffer: usize,
        event_buffer: usize,
    ) -> (Self, mpsc::Receiver<PaginationCommand>) {
        let (command_tx, command_rx) = mpsc::channel(command_buffer.max(1));
        let event_tx = broadcast::Sender::new(event_buffer.max(1));
        (Self { command_tx, event_tx }, command_rx)
    }

    /// Sender a [`PaginationManager`](crate::PaginationManager) emits into.
    pub fn event_sender(&self) -> broadcast::Sender<PaginationEvent> {
        self.event_tx.clone()
    }

    /// Events emitted after this call. Slow subscribers see `RecvError::Lagged`.
    pub fn subscribe(&self) -> EventStream {
        self.event_tx.subscribe()
    }

    /// Waits for buffer space; fails once the runtime has stopped.
    pub async fn send_command(
        &self,
        command: PaginationCommand,
    ) -> Result<(), PaginationChannelError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| PaginationChannelError::CommandChannelClosed)
    }
}
