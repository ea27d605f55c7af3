//! Fixtures shared by unit tests.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::{
    error::MitterError,
    gateway::FetchGateway,
    page::CursorPage,
    types::{
        ChannelReferencingMessage, Direction, EntityMetadata, PageRequest, SENT_TIME_EVENT_TYPE,
        TimelineEvent,
    },
};

pub(crate) const CHANNEL: &str = "chan-1";

pub(crate) fn message(n: u64) -> ChannelReferencingMessage {
    message_with_body(n, &format!("message {n}"))
}

pub(crate) fn message_with_body(n: u64, body: &str) -> ChannelReferencingMessage {
    let mut message = message_at(&format!("m{n:02}"), n * 1_000);
    message.text_payload = body.to_owned();
    message
}

/// Message `message_id` sent at `sent_ms`; `0` leaves it undated.
pub(crate) fn message_at(message_id: &str, sent_ms: u64) -> ChannelReferencingMessage {
    let timeline_events = if sent_ms == 0 {
        Vec::new()
    } else {
        vec![TimelineEvent {
            event_type: SENT_TIME_EVENT_TYPE.to_owned(),
            event_time_ms: sent_ms,
            subject: message_id.to_owned(),
        }]
    };
    ChannelReferencingMessage {
        channel_id: CHANNEL.to_owned(),
        message_id: message_id.to_owned(),
        sender_id: "alice".to_owned(),
        payload_type: "Standard".to_owned(),
        text_payload: String::new(),
        timeline_events,
        entity_metadata: EntityMetadata::default(),
    }
}

/// In-memory channel answering page requests the way the list endpoint does.
#[derive(Default)]
pub(crate) struct FakeChannel {
    messages: Mutex<Vec<ChannelReferencingMessage>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<PageRequest>>,
    fail_next: Mutex<Option<MitterError>>,
    hold: Option<Arc<Notify>>,
}

impl FakeChannel {
    pub(crate) fn with_messages(count: u64) -> Self {
        let channel = Self::default();
        channel.push((1..=count).map(message));
        channel
    }

    /// Every fetch waits for a `notify_one` on the returned handle before answering.
    pub(crate) fn held(count: u64) -> (Self, Arc<Notify>) {
        let release = Arc::new(Notify::new());
        let mut channel = Self::with_messages(count);
        channel.hold = Some(release.clone());
        (channel, release)
    }

    pub(crate) fn push(&self, items: impl IntoIterator<Item = ChannelReferencingMessage>) {
        let mut messages = self.messages.lock().expect("fixture lock");
        messages.extend(items);
        messages.sort_by_key(|m| m.order_key());
    }

    pub(crate) fn fail_next(&self, error: MitterError) {
        *self.fail_next.lock().expect("fixture lock") = Some(error);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().expect("fixture lock").clone()
    }
}

#[async_trait]
impl FetchGateway for FakeChannel {
    async fn fetch_page(&self, request: PageRequest) -> Result<CursorPage, MitterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .expect("fixture lock")
            .push(request.clone());

        if let Some(release) = &self.hold {
            release.notified().await;
        }
        if let Some(error) = self.fail_next.lock().expect("fixture lock").take() {
            return Err(error);
        }

        let messages = self.messages.lock().expect("fixture lock").clone();
        let limit = usize::from(request.limit);
        let key_of = |id: &str| {
            messages
                .iter()
                .find(|m| m.message_id == id)
                .map(|m| m.order_key())
        };

        let candidates: Vec<_> = match request.direction() {
            Direction::Forward => {
                let anchor = request.after.as_ref().and_then(|a| key_of(a.as_str()));
                messages
                    .iter()
                    .filter(|m| anchor.as_ref().is_none_or(|a| &m.order_key() > a))
                    .cloned()
                    .collect()
            }
            Direction::Backward => {
                let anchor = request.before.as_ref().and_then(|b| key_of(b.as_str()));
                messages
                    .iter()
                    .rev()
                    .filter(|m| anchor.as_ref().is_none_or(|a| &m.order_key() < a))
                    .cloned()
                    .collect()
            }
        };

        let has_more = candidates.len() > limit;
        let items = candidates.into_iter().take(limit).collect();
        CursorPage::from_items(request.direction(), items, has_more)
    }
}
