use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use crate::{
    channel::{EventStream, PaginationEvent},
    error::MitterError,
    gateway::FetchGateway,
    page::CursorPage,
    store::{MergeReport, MessageStore, Upsert},
    types::{ChannelReferencingMessage, Cursor, Direction, PageRequest, clamp_page_limit},
};

const DEFAULT_EVENT_BUFFER: usize = 64;

/// Pagination phase as seen from one direction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaginationState {
    /// No fetch in flight; `request_more` will fetch.
    Idle,
    /// The single permitted fetch is in flight in this direction.
    Fetching,
    /// No more data in this direction.
    Exhausted,
    /// The last fetch in this direction failed; `request_more` retries.
    Failed,
}

/// Why a `request_more` call did nothing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SkipReason {
    /// Another fetch is in flight.
    InFlight,
    /// The direction has no more data.
    Exhausted,
    /// The manager was closed.
    Closed,
}

/// Result of a `request_more` call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// A page was fetched and merged.
    Fetched {
        report: MergeReport,
        /// The page was the last one in the requested direction.
        exhausted: bool,
    },
    /// Nothing was fetched.
    Skipped(SkipReason),
    /// The manager was closed while the fetch ran; the page was dropped.
    Discarded,
}

#[derive(Debug, Default)]
struct Edge {
    cursor: Option<Cursor>,
    exhausted: bool,
    last_error: Option<MitterError>,
}

#[derive(Debug, Default)]
struct PagerState {
    store: MessageStore,
    in_flight: Option<Direction>,
    backward: Edge,
    forward: Edge,
    closed: bool,
}

impl PagerState {
    fn edge(&self, direction: Direction) -> &Edge {
        match direction {
            Direction::Backward => &self.backward,
            Direction::Forward => &self.forward,
        }
    }

    fn edge_mut(&mut self, direction: Direction) -> &mut Edge {
        match direction {
            Direction::Backward => &mut self.backward,
            Direction::Forward => &mut self.forward,
        }
    }

    fn phase(&self, direction: Direction) -> PaginationState {
        let edge = self.edge(direction);
        if self.in_flight == Some(direction) {
            PaginationState::Fetching
        } else if edge.exhausted {
            PaginationState::Exhausted
        } else if edge.last_error.is_some() {
            PaginationState::Failed
        } else {
            PaginationState::Idle
        }
    }

    /// Check-and-claim of the single fetch slot. Returns the cursor to fetch from.
    fn begin(&mut self, direction: Direction) -> Result<Option<Cursor>, SkipReason> {
        if self.closed {
            return Err(SkipReason::Closed);
        }
        if self.in_flight.is_some() {
            return Err(SkipReason::InFlight);
        }
        if self.edge(direction).exhausted {
            return Err(SkipReason::Exhausted);
        }
        self.in_flight = Some(direction);
        Ok(self.next_cursor(direction))
    }

    fn next_cursor(&self, direction: Direction) -> Option<Cursor> {
        if let Some(cursor) = &self.edge(direction).cursor {
            return Some(cursor.clone());
        }
        let boundary = match direction {
            Direction::Backward => self.store.oldest(),
            Direction::Forward => self.store.newest(),
        };
        boundary.map(ChannelReferencingMessage::cursor)
    }

    fn complete(&mut self, direction: Direction, page: CursorPage) -> (MergeReport, bool) {
        let exhausted = page.is_final(direction);
        let next = page.cursor_for(direction).cloned();
        let report = self.store.merge(page.into_items());

        let edge = self.edge_mut(direction);
        edge.cursor = next;
        edge.exhausted = exhausted;
        edge.last_error = None;
        self.in_flight = None;
        (report, exhausted)
    }

    fn fail(&mut self, direction: Direction, error: MitterError) {
        self.edge_mut(direction).last_error = Some(error);
        self.in_flight = None;
    }
}

/// Releases the fetch slot if a `request_more` future is dropped mid-fetch.
struct FetchSlot<'a> {
    state: &'a Mutex<PagerState>,
    direction: Direction,
    armed: bool,
}

impl FetchSlot<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for FetchSlot<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.in_flight == Some(self.direction) {
            state.in_flight = None;
        }
    }
}

/// Walks one channel's history in both directions and accumulates a single
/// canonical-ordered, de-duplicated message sequence.
///
/// At most one fetch is in flight at a time across both directions. A
/// `request_more` observed while a fetch is running is a silent no-op, not a
/// queued request. The manager never retries on its own.
///
/// Clones share state, so a clone can be moved into a spawned task.
pub struct PaginationManager<G> {
    channel_id: Arc<str>,
    limit: u16,
    gateway: Arc<G>,
    state: Arc<Mutex<PagerState>>,
    events: broadcast::Sender<PaginationEvent>,
}

impl<G> Clone for PaginationManager<G> {
    fn clone(&self) -> Self {
        Self {
            channel_id: self.channel_id.clone(),
            limit: self.limit,
            gateway: self.gateway.clone(),
            state: self.state.clone(),
            events: self.events.clone(),
        }
    }
}

impl<G> std::fmt::Debug for PaginationManager<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginationManager")
            .field("channel_id", &self.channel_id)
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}

impl<G: FetchGateway> PaginationManager<G> {
    /// Create a manager for `channel_id`. `limit` is clamped to the platform maximum.
    pub fn new(channel_id: impl Into<String>, limit: u16, gateway: G) -> Self {
        let (events, _) = broadcast::channel(DEFAULT_EVENT_BUFFER);
        Self::with_events(channel_id, limit, gateway, events)
    }

    /// Create a manager that emits into an existing event channel.
    pub fn with_events(
        channel_id: impl Into<String>,
        limit: u16,
        gateway: G,
        events: broadcast::Sender<PaginationEvent>,
    ) -> Self {
        let channel_id: String = channel_id.into();
        let limit = clamp_page_limit(limit);
        debug!(%channel_id, limit, "creating pagination manager");
        Self {
            channel_id: channel_id.into(),
            limit,
            gateway: Arc::new(gateway),
            state: Arc::new(Mutex::new(PagerState::default())),
            events,
        }
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Effective page size after clamping.
    pub fn limit(&self) -> u16 {
        self.limit
    }

    pub fn subscribe(&self) -> EventStream {
        self.events.subscribe()
    }

    /// Fetch the next page in `direction` unless a fetch is already in flight
    /// or the direction is exhausted.
    ///
    /// On failure the store is left untouched, the direction moves to
    /// [`PaginationState::Failed`] and the error is returned; calling again retries.
    pub async fn request_more(&self, direction: Direction) -> Result<RequestOutcome, MitterError> {
        let cursor = {
            let mut state = self.lock();
            match state.begin(direction) {
                Ok(cursor) => cursor,
                Err(reason) => {
                    trace!(channel_id = %self.channel_id, ?direction, ?reason, "skipping page request");
                    return Ok(RequestOutcome::Skipped(reason));
                }
            }
        };
        let slot = FetchSlot {
            state: &*self.state,
            direction,
            armed: true,
        };

        self.emit_loading(direction, true);
        let request = PageRequest::new(&*self.channel_id, direction, cursor, self.limit);
        debug!(
            channel_id = %self.channel_id,
            ?direction,
            before = ?request.before,
            after = ?request.after,
            limit = request.limit,
            "fetching page"
        );
        let result = self.gateway.fetch_page(request).await;
        slot.disarm();

        let mut state = self.lock();
        if state.closed {
            state.in_flight = None;
            drop(state);
            debug!(channel_id = %self.channel_id, ?direction, "manager closed during fetch, discarding page");
            return Ok(RequestOutcome::Discarded);
        }

        match result {
            Ok(page) => {
                let (report, exhausted) = state.complete(direction, page);
                let len = state.store.len();
                drop(state);

                debug!(
                    channel_id = %self.channel_id,
                    ?direction,
                    inserted = report.inserted,
                    replaced = report.replaced,
                    unchanged = report.unchanged,
                    exhausted,
                    len,
                    "merged page"
                );
                self.emit_loading(direction, false);
                if report.changed() {
                    self.emit(PaginationEvent::ViewUpdated {
                        channel_id: self.channel_id.to_string(),
                        len,
                    });
                }
                if exhausted {
                    self.emit(PaginationEvent::Exhausted {
                        channel_id: self.channel_id.to_string(),
                        direction,
                    });
                }
                Ok(RequestOutcome::Fetched { report, exhausted })
            }
            Err(error) => {
                state.fail(direction, error.clone());
                drop(state);

                warn!(channel_id = %self.channel_id, ?direction, %error, "page fetch failed");
                self.emit_loading(direction, false);
                self.emit(PaginationEvent::LoadFailed {
                    channel_id: self.channel_id.to_string(),
                    direction,
                    retry_available: error.is_retryable(),
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    /// Canonical-ordered, de-duplicated messages loaded so far.
    pub fn current_view(&self) -> Vec<ChannelReferencingMessage> {
        self.lock().store.view()
    }

    pub fn len(&self) -> usize {
        self.lock().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().store.is_empty()
    }

    pub fn state(&self, direction: Direction) -> PaginationState {
        self.lock().phase(direction)
    }

    /// Whether a fetch is in flight in either direction.
    pub fn is_loading(&self) -> bool {
        self.lock().in_flight.is_some()
    }

    /// Error of the last failed fetch in `direction`, cleared by the next success.
    pub fn last_error(&self, direction: Direction) -> Option<MitterError> {
        self.lock().edge(direction).last_error.clone()
    }

    /// Allow fetching again in an exhausted direction.
    pub fn rearm(&self, direction: Direction) {
        let mut state = self.lock();
        if state.edge(direction).exhausted {
            debug!(channel_id = %self.channel_id, ?direction, "re-arming exhausted direction");
            state.edge_mut(direction).exhausted = false;
        }
    }

    /// Place a message obtained elsewhere (for example a send response) into the view.
    ///
    /// Messages for other channels are ignored. Returns whether the view changed.
    pub fn push_message(&self, message: ChannelReferencingMessage) -> bool {
        if message.channel_id != *self.channel_id {
            warn!(
                channel_id = %self.channel_id,
                other = %message.channel_id,
                "ignoring message pushed for another channel"
            );
            return false;
        }

        let mut state = self.lock();
        if state.closed {
            return false;
        }
        let changed = state.store.upsert(message) != Upsert::Unchanged;
        let len = state.store.len();
        drop(state);

        if changed {
            self.emit(PaginationEvent::ViewUpdated {
                channel_id: self.channel_id.to_string(),
                len,
            });
        }
        changed
    }

    /// Mark the consuming view as torn down. In-flight results are discarded.
    pub fn close(&self) {
        let mut state = self.lock();
        if !state.closed {
            debug!(channel_id = %self.channel_id, "closing pagination manager");
            state.closed = true;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, PagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit_loading(&self, direction: Direction, loading: bool) {
        self.emit(PaginationEvent::LoadingChanged {
            channel_id: self.channel_id.to_string(),
            direction,
            loading,
        });
    }

    /// Best-effort fan-out; having no subscribers is not an error.
    fn emit(&self, event: PaginationEvent) {
        if self.events.send(event).is_err() {
            trace!(channel_id = %self.channel_id, "pagination event dropped, no subscribers");
        }
    }
}
