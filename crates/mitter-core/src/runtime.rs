//! Command-driven pagination runtime.
//!
//! A view that cannot await `request_more` itself (a render loop, a UI thread)
//! spawns a runtime and talks to it through [`PaginationCommand`]s, reading
//! results back as [`PaginationEvent`]s.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{
    channel::{EventStream, PaginationChannelError, PaginationChannels, PaginationCommand},
    gateway::FetchGateway,
    pagination::{PaginationManager, RequestOutcome},
    types::{ChannelReferencingMessage, Direction},
};

const COMMAND_BUFFER: usize = 32;
const EVENT_BUFFER: usize = 256;

/// Handle to a spawned pagination runtime.
///
/// Dropping the handle does not stop the runtime; send
/// [`PaginationCommand::Close`] or call [`PaginationHandle::shutdown`].
pub struct PaginationHandle<G> {
    channels: PaginationChannels,
    manager: PaginationManager<G>,
    stop: CancellationToken,
}

impl<G> Clone for PaginationHandle<G> {
    fn clone(&self) -> Self {
        Self {
            channels: self.channels.clone(),
            manager: self.manager.clone(),
            stop: self.stop.clone(),
        }
    }
}

impl<G> std::fmt::Debug for PaginationHandle<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginationHandle")
            .field("manager", &self.manager)
            .finish_non_exhaustive()
    }
}

impl<G: FetchGateway + 'static> PaginationHandle<G> {
    pub async fn send(&self, command: PaginationCommand) -> Result<(), PaginationChannelError> {
        self.channels.send_command(command).await
    }

    pub async fn request_more(&self, direction: Direction) -> Result<(), PaginationChannelError> {
        self.send(PaginationCommand::RequestMore(direction)).await
    }

    pub fn subscribe(&self) -> EventStream {
        self.channels.subscribe()
    }

    /// The manager driven by this runtime, for direct reads.
    pub fn manager(&self) -> &PaginationManager<G> {
        &self.manager
    }

    pub fn current_view(&self) -> Vec<ChannelReferencingMessage> {
        self.manager.current_view()
    }

    pub fn is_loading(&self) -> bool {
        self.manager.is_loading()
    }

    /// Close the manager and stop the runtime. A fetch already issued still
    /// runs to completion; its page is discarded instead of merged.
    pub fn shutdown(&self) {
        self.manager.close();
        self.stop.cancel();
    }
}

/// Spawn a runtime paging `channel_id` through `gateway` on the current tokio runtime.
pub fn spawn_pagination_runtime<G: FetchGateway + 'static>(
    channel_id: impl Into<String>,
    limit: u16,
    gateway: G,
) -> PaginationHandle<G> {
    let (channels, command_rx) = PaginationChannels::new(COMMAND_BUFFER, EVENT_BUFFER);
    let manager = PaginationManager::with_events(channel_id, limit, gateway, channels.event_sender());
    let stop = CancellationToken::new();

    let runtime = PaginationRuntime {
        manager: manager.clone(),
        command_rx,
        stop: stop.clone(),
    };
    tokio::spawn(async move {
        runtime.run().await;
    });

    PaginationHandle {
        channels,
        manager,
        stop,
    }
}

struct PaginationRuntime<G> {
    manager: PaginationManager<G>,
    command_rx: mpsc::Receiver<PaginationCommand>,
    stop: CancellationToken,
}

impl<G: FetchGateway + 'static> PaginationRuntime<G> {
    async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.stop.cancelled() => break,
                command = self.command_rx.recv() => {
                    let Some(command) = command else {
                        break;
                    };
                    if !self.handle_command(command) {
                        break;
                    }
                }
            }
        }

        self.manager.close();
        self.stop.cancel();
        debug!(channel_id = %self.manager.channel_id(), "pagination runtime stopped");
    }

    /// Returns `false` once the runtime should stop.
    fn handle_command(&self, command: PaginationCommand) -> bool {
        match command {
            PaginationCommand::RequestMore(direction) => {
                if self.manager.is_loading() {
                    trace!(channel_id = %self.manager.channel_id(), ?direction, "fetch in flight, dropping request");
                    return true;
                }
                let manager = self.manager.clone();
                // Fetches run off the command loop so `Close` is observed mid-fetch.
                // They are never cancelled; a closed manager discards the page.
                // Failures are already reported as `LoadFailed` events.
                tokio::spawn(async move {
                    if let Ok(RequestOutcome::Discarded) = manager.request_more(direction).await {
                        trace!(channel_id = %manager.channel_id(), ?direction, "runtime fetch discarded after close");
                    }
                });
                true
            }
            PaginationCommand::Rearm(direction) => {
                self.manager.rearm(direction);
                true
            }
            PaginationCommand::Close => false,
        }
    }
}
