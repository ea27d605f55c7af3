//! Turns viewport scroll positions into pagination commands.

use tracing::{debug, trace};

use crate::{
    channel::{PaginationCommand, PaginationEvent},
    retry::RetryPolicy,
    types::Direction,
};

const DEFAULT_THRESHOLD_PX: f32 = 120.0;
const DEFAULT_COOLDOWN_MS: u64 = 400;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryConfig {
    /// Distance from an edge, in pixels, at which loading starts.
    pub threshold_px: f32,
    /// Minimum gap between two requests in the same direction.
    pub cooldown_ms: u64,
    pub retry: RetryPolicy,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            threshold_px: DEFAULT_THRESHOLD_PX,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Default, Clone)]
struct EdgeTracker {
    exhausted: bool,
    last_requested_ms: Option<u64>,
    failures: u32,
    retry_not_before_ms: u64,
    retry_blocked: bool,
}

/// Decides when a view's scroll position should ask for another page.
///
/// Feed it every [`PaginationEvent`] for its channel via [`BoundaryTrigger::observe`]
/// and call [`BoundaryTrigger::signal`] on each scroll. After a failed fetch the
/// next signal is held back by the retry policy; a non-retryable failure stops
/// automatic retries until [`BoundaryTrigger::clear_failure`].
#[derive(Debug, Clone)]
pub struct BoundaryTrigger {
    channel_id: String,
    config: BoundaryConfig,
    loading: bool,
    backward: EdgeTracker,
    forward: EdgeTracker,
}

impl BoundaryTrigger {
    pub fn new(channel_id: impl Into<String>, config: BoundaryConfig) -> Self {
        Self {
            channel_id: channel_id.into(),
            config,
            loading: false,
            backward: EdgeTracker::default(),
            forward: EdgeTracker::default(),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_exhausted(&self, direction: Direction) -> bool {
        self.edge(direction).exhausted
    }

    /// The viewport is `distance_px` away from its `direction` edge.
    pub fn signal(
        &mut self,
        direction: Direction,
        distance_px: f32,
        now_ms: u64,
    ) -> Option<PaginationCommand> {
        if distance_px > self.config.threshold_px || self.loading {
            return None;
        }

        let cooldown_ms = self.config.cooldown_ms;
        let edge = self.edge_mut(direction);
        if edge.exhausted || edge.retry_blocked || now_ms < edge.retry_not_before_ms {
            return None;
        }
        if let Some(last) = edge.last_requested_ms
            && now_ms.saturating_sub(last) < cooldown_ms
        {
            return None;
        }

        edge.last_requested_ms = Some(now_ms);
        self.loading = true;
        trace!(channel_id = %self.channel_id, ?direction, distance_px, "viewport edge reached");
        Some(PaginationCommand::RequestMore(direction))
    }

    /// Update tracking from an event emitted for this view's channel.
    pub fn observe(&mut self, event: &PaginationEvent, now_ms: u64) {
        match event {
            PaginationEvent::LoadingChanged {
                channel_id,
                loading,
                ..
            } if *channel_id == self.channel_id => {
                self.loading = *loading;
            }
            PaginationEvent::ViewUpdated { channel_id, .. } if *channel_id == self.channel_id => {
                self.backward.failures = 0;
                self.forward.failures = 0;
            }
            PaginationEvent::Exhausted {
                channel_id,
                direction,
            } if *channel_id == self.channel_id => {
                let edge = self.edge_mut(*direction);
                edge.exhausted = true;
                edge.failures = 0;
            }
            PaginationEvent::LoadFailed {
                channel_id,
                direction,
                error,
                retry_available,
            } if *channel_id == self.channel_id => {
                let delay = self.config.retry.delay_after(self.edge(*direction).failures, error);
                let edge = self.edge_mut(*direction);
                edge.failures = edge.failures.saturating_add(1);
                edge.retry_not_before_ms = now_ms.saturating_add(delay.as_millis() as u64);
                edge.retry_blocked = !retry_available;
                let failures = edge.failures;
                debug!(
                    channel_id = %self.channel_id,
                    ?direction,
                    failures,
                    delay_ms = delay.as_millis() as u64,
                    retry_available,
                    "backing off after failed page"
                );
            }
            _ => {}
        }
    }

    /// Allow loading again in `direction`, for example after new messages arrived.
    pub fn rearm(&mut self, direction: Direction) -> PaginationCommand {
        self.edge_mut(direction).exhausted = false;
        PaginationCommand::Rearm(direction)
    }

    /// Re-enable automatic requests after a failure, e.g. on a user's retry tap.
    pub fn clear_failure(&mut self, direction: Direction) {
        let edge = self.edge_mut(direction);
        edge.failures = 0;
        edge.retry_not_before_ms = 0;
        edge.retry_blocked = false;
    }

    fn edge(&self, direction: Direction) -> &EdgeTracker {
        match direction {
            Direction::Backward => &self.backward,
            Direction::Forward => &self.forward,
        }
    }

    fn edge_mut(&mut self, direction: Direction) -> &mut EdgeTracker {
        match direction {
            Direction::Backward => &mut self.backward,
            Direction::Forward => &mut self.forward,
        }
    }
}
